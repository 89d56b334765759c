// BSDIFF40 container header: 32-byte fixed preamble.
//
// Layout (all integers 8-byte sign-magnitude, see `offt`):
//   0   8   magic "BSDIFF40"
//   8   8   compressed control-block length
//   16  8   compressed diff-block length
//   24  8   target file size
// The three bzip2 streams follow back to back.

use std::io::{self, Write};

use super::{PatchError, offt};

/// The 8-byte magic tag opening every patch container.
pub const MAGIC: [u8; 8] = *b"BSDIFF40";

/// Total size of the fixed preamble.
pub const HEADER_SIZE: usize = 32;

// ---------------------------------------------------------------------------
// PatchHeader
// ---------------------------------------------------------------------------

/// Parsed patch container header. Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchHeader {
    /// Compressed length of the control block, in bytes.
    pub ctrl_len: i64,
    /// Compressed length of the diff block, in bytes.
    pub diff_len: i64,
    /// Size of the reconstructed target, in bytes.
    pub new_size: i64,
}

impl PatchHeader {
    /// Parse the first 32 bytes of a patch container.
    ///
    /// Rejects a wrong magic, a container shorter than 32 bytes, and
    /// negative length fields.
    pub fn parse(data: &[u8]) -> Result<Self, PatchError> {
        let Some(raw) = data.get(..HEADER_SIZE) else {
            return Err(PatchError::Format(format!(
                "container truncated: {} bytes, need at least {HEADER_SIZE}",
                data.len()
            )));
        };
        if raw[..8] != MAGIC {
            return Err(PatchError::Format(format!(
                "bad magic: expected {:?}, got {:?}",
                String::from_utf8_lossy(&MAGIC),
                String::from_utf8_lossy(&raw[..8])
            )));
        }

        let field = |off: usize| offt::decode(raw[off..off + 8].try_into().unwrap());
        let header = Self {
            ctrl_len: field(8),
            diff_len: field(16),
            new_size: field(24),
        };

        if header.ctrl_len < 0 || header.diff_len < 0 || header.new_size < 0 {
            return Err(PatchError::Format(format!(
                "negative header field: ctrl_len={}, diff_len={}, new_size={}",
                header.ctrl_len, header.diff_len, header.new_size
            )));
        }

        log::debug!(
            "patch header: ctrl_len={}, diff_len={}, new_size={}",
            header.ctrl_len,
            header.diff_len,
            header.new_size
        );
        Ok(header)
    }

    /// Emit the 32-byte preamble. Inverse of [`PatchHeader::parse`].
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&MAGIC)?;
        w.write_all(&offt::encode(self.ctrl_len))?;
        w.write_all(&offt::encode(self.diff_len))?;
        w.write_all(&offt::encode(self.new_size))
    }

    /// Byte offset of the compressed control block within the container.
    #[inline]
    pub fn ctrl_offset(&self) -> u64 {
        HEADER_SIZE as u64
    }

    /// Byte offset of the compressed diff block within the container.
    /// Saturates on absurd lengths; callers compare against the real
    /// container size before using the offset.
    #[inline]
    pub fn diff_offset(&self) -> u64 {
        (HEADER_SIZE as u64).saturating_add(self.ctrl_len as u64)
    }

    /// Byte offset of the compressed extra block within the container.
    /// The extra block runs from here to end of file.
    #[inline]
    pub fn extra_offset(&self) -> u64 {
        self.diff_offset().saturating_add(self.diff_len as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
