// Three-way stream demultiplexer over one patch container.
//
// The header declares two compressed lengths; from those we derive three
// disjoint byte ranges (control, diff, extra) and open an independent
// bzip2 decoder over each. Cursors are never shared between streams,
// never read backward, and never reopened mid-run.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use bzip2::read::BzDecoder;

use super::PatchError;
use super::control::ControlTriple;
use super::header::PatchHeader;

// ---------------------------------------------------------------------------
// PatchStreams
// ---------------------------------------------------------------------------

/// The three decompression cursors of one patch container.
///
/// Each stream wraps its own reader positioned at the start of its byte
/// range. Dropping the struct releases all underlying handles, on success
/// and failure alike.
pub struct PatchStreams<R: Read> {
    control: BzDecoder<R>,
    diff: BzDecoder<R>,
    extra: BzDecoder<R>,
}

impl<R: Read> std::fmt::Debug for PatchStreams<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchStreams").finish_non_exhaustive()
    }
}

impl<'a> PatchStreams<&'a [u8]> {
    /// Demultiplex an in-memory patch container.
    ///
    /// `data` is the whole container including the 32-byte header. The
    /// declared range bounds are checked against the buffer length before
    /// any slice is taken.
    pub fn from_bytes(data: &'a [u8], header: &PatchHeader) -> Result<Self, PatchError> {
        check_lengths(header)?;
        let ctrl_start = header.ctrl_offset() as usize;
        let diff_start = usize::try_from(header.diff_offset())
            .ok()
            .filter(|&off| off <= data.len());
        let extra_start = usize::try_from(header.extra_offset())
            .ok()
            .filter(|&off| off <= data.len());
        let (Some(diff_start), Some(extra_start)) = (diff_start, extra_start) else {
            return Err(PatchError::Corrupt(format!(
                "declared stream lengths exceed container size {}",
                data.len()
            )));
        };

        Ok(Self {
            control: BzDecoder::new(&data[ctrl_start..diff_start]),
            diff: BzDecoder::new(&data[diff_start..extra_start]),
            extra: BzDecoder::new(&data[extra_start..]),
        })
    }
}

impl PatchStreams<File> {
    /// Open a patch file and position three independent handles at the
    /// start of each stream's byte range.
    pub fn open(path: &Path, header: &PatchHeader) -> Result<Self, PatchError> {
        check_lengths(header)?;
        let file_len = std::fs::metadata(path)?.len();
        if header.extra_offset() > file_len {
            return Err(PatchError::Corrupt(format!(
                "declared stream lengths exceed container size {file_len}"
            )));
        }

        let open_at = |offset: u64| -> Result<File, PatchError> {
            let mut f = File::open(path)?;
            f.seek(SeekFrom::Start(offset))?;
            Ok(f)
        };

        log::trace!(
            "opening streams of {}: control@{}, diff@{}, extra@{}",
            path.display(),
            header.ctrl_offset(),
            header.diff_offset(),
            header.extra_offset()
        );

        Ok(Self {
            control: BzDecoder::new(open_at(header.ctrl_offset())?),
            diff: BzDecoder::new(open_at(header.diff_offset())?),
            extra: BzDecoder::new(open_at(header.extra_offset())?),
        })
    }
}

impl<R: Read> PatchStreams<R> {
    /// Decode the next control triple from the control stream.
    pub fn read_control(&mut self) -> Result<ControlTriple, PatchError> {
        ControlTriple::read_from(&mut self.control)
    }

    /// Fill `buf` from the diff stream. Anything short of `buf.len()`
    /// decompressed bytes is corruption.
    pub fn read_diff(&mut self, buf: &mut [u8]) -> Result<(), PatchError> {
        read_exact_or_corrupt(&mut self.diff, buf, "diff")
    }

    /// Fill `buf` from the extra stream, with the same exact-length contract.
    pub fn read_extra(&mut self, buf: &mut [u8]) -> Result<(), PatchError> {
        read_exact_or_corrupt(&mut self.extra, buf, "extra")
    }
}

/// Headers built by `PatchHeader::parse` never carry negative lengths, but
/// the offset arithmetic below must not trust a hand-constructed one.
fn check_lengths(header: &PatchHeader) -> Result<(), PatchError> {
    if header.ctrl_len < 0 || header.diff_len < 0 {
        return Err(PatchError::Corrupt(format!(
            "negative stream length: ctrl_len={}, diff_len={}",
            header.ctrl_len, header.diff_len
        )));
    }
    Ok(())
}

/// `read(n) -> exactly n` over a decompressor: a short read or any decoder
/// error state other than a clean end maps to `Corrupt`.
fn read_exact_or_corrupt<R: Read>(
    r: &mut R,
    buf: &mut [u8],
    stream: &str,
) -> Result<(), PatchError> {
    match r.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(PatchError::Corrupt(
            format!("{stream} stream ended {} bytes early", buf.len()),
        )),
        Err(e) => Err(PatchError::Corrupt(format!("{stream} stream error: {e}"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
