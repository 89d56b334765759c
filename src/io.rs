// File-level adapter for patch application.
//
// Provides `apply_file()` which loads the source fully into memory, opens
// the three demultiplexed streams over the patch file, reconstructs the
// target in memory, and writes it out in full. Optionally computes a
// SHA-256 of the output (feature-gated behind `file-io`).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::patch::{self, NoProgress, PatchError, PatchHeader, PatchStreams, Progress};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `apply_file()`.
#[derive(Debug, Clone)]
pub struct ApplyStats {
    /// Source file size in bytes.
    pub source_size: u64,
    /// Patch container size in bytes.
    pub patch_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// SHA-256 of the reconstructed output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file-level patch application, carrying the path on which
/// the operation failed where one is known.
#[derive(Debug)]
pub enum IoError {
    /// I/O error on a named file.
    Io { path: std::path::PathBuf, error: io::Error },
    /// Patch parsing/application error.
    Patch(PatchError),
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, error } => write!(f, "{}: {error}", path.display()),
            Self::Patch(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { error, .. } => Some(error),
            Self::Patch(e) => Some(e),
        }
    }
}

impl From<PatchError> for IoError {
    fn from(e: PatchError) -> Self {
        Self::Patch(e)
    }
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> IoError + '_ {
    move |error| IoError::Io {
        path: path.to_path_buf(),
        error,
    }
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// apply_file
// ---------------------------------------------------------------------------

/// Apply a patch file to a source file, writing the result to `output_path`.
///
/// The source is read fully into memory and the target is materialized in
/// memory before anything is written; there are no partial writes, and a
/// failed run leaves any partially written output undefined for callers.
pub fn apply_file(
    source_path: &Path,
    patch_path: &Path,
    output_path: &Path,
) -> Result<ApplyStats, IoError> {
    apply_file_with_progress(source_path, patch_path, output_path, &mut NoProgress)
}

/// Like [`apply_file`], with a progress observer that may cancel the run.
pub fn apply_file_with_progress<P: Progress>(
    source_path: &Path,
    patch_path: &Path,
    output_path: &Path,
    progress: &mut P,
) -> Result<ApplyStats, IoError> {
    // Read source fully into memory.
    let source = std::fs::read(source_path).map_err(io_at(source_path))?;
    let source_size = source.len() as u64;

    // Read the fixed header, then open the three streams over the file.
    let patch_size = std::fs::metadata(patch_path).map_err(io_at(patch_path))?.len();
    let header = {
        let mut f = File::open(patch_path).map_err(io_at(patch_path))?;
        let mut preamble = [0u8; patch::header::HEADER_SIZE];
        let n = read_up_to(&mut f, &mut preamble).map_err(io_at(patch_path))?;
        PatchHeader::parse(&preamble[..n]).map_err(annotate(patch_path))?
    };
    let mut streams = PatchStreams::open(patch_path, &header).map_err(annotate(patch_path))?;

    // Reconstruct.
    let output = patch::apply_streams(&source, &mut streams, header.new_size as u64, progress)
        .map_err(annotate(patch_path))?;
    let output_size = output.len() as u64;

    #[cfg(feature = "file-io")]
    let output_sha256 = {
        let mut h = sha2::Sha256::new();
        h.update(&output);
        Some(h.finalize().into())
    };
    #[cfg(not(feature = "file-io"))]
    let output_sha256: Option<[u8; 32]> = None;

    // Write the completed target in full.
    let out_file = File::create(output_path).map_err(io_at(output_path))?;
    let mut writer = BufWriter::with_capacity(BUF_SIZE, out_file);
    writer.write_all(&output).map_err(io_at(output_path))?;
    writer.flush().map_err(io_at(output_path))?;

    Ok(ApplyStats {
        source_size,
        patch_size,
        output_size,
        output_sha256,
    })
}

/// Read as many bytes as the file yields, up to `buf.len()`. A container
/// shorter than the header is a format error, not an I/O error, so the
/// short read must not fail here.
fn read_up_to(f: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    use std::io::Read;
    let mut filled = 0;
    while filled < buf.len() {
        let n = f.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Attach the patch path to errors that do not already carry one.
fn annotate(path: &Path) -> impl FnOnce(PatchError) -> IoError + '_ {
    move |e| match e {
        PatchError::Io(error) => IoError::Io {
            path: path.to_path_buf(),
            error,
        },
        other => IoError::Patch(other),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
