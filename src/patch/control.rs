// Control triples: the 24-byte records driving reconstruction.
//
// The decompressed control block is a sequence of three consecutive 8-byte
// sign-magnitude integers (add, copy, seek) meaning: add `add` diff bytes
// combined with source bytes, copy `copy` extra bytes verbatim, then seek
// the source cursor by `seek` (any sign).

use std::io::Read;

use super::{PatchError, offt};

/// One decoded control record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlTriple {
    /// Bytes to read from the diff stream and combine with source bytes.
    pub add: i64,
    /// Bytes to copy verbatim from the extra stream.
    pub copy: i64,
    /// Signed adjustment applied to the source cursor after the copy.
    pub seek: i64,
}

impl ControlTriple {
    /// Decode the next 24-byte record from the control stream.
    ///
    /// Negative `add` or `copy` lengths indicate corruption; `seek` may be
    /// any sign.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, PatchError> {
        let triple = Self {
            add: offt::read_from(r)?,
            copy: offt::read_from(r)?,
            seek: offt::read_from(r)?,
        };
        if triple.add < 0 || triple.copy < 0 {
            return Err(PatchError::Corrupt(format!(
                "negative control length: add={}, copy={}",
                triple.add, triple.copy
            )));
        }
        Ok(triple)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
