// BSDIFF40 sign-magnitude integer encoding.
//
// 8 bytes, little-endian: the low 7 bytes (byte 0 least significant) form a
// 56-bit unsigned magnitude, the low 7 bits of byte 7 extend it to 63 bits,
// and bit 7 of byte 7 is a sign flag over the magnitude. This is NOT two's
// complement: a negative-zero encoding exists and decodes to 0.
// Identical to the reference bspatch `offtin` / bsdiff `offtout`.

use std::io::Read;

use super::PatchError;

/// Encoded width of every integer field in the format.
pub const OFFT_SIZE: usize = 8;

/// Largest magnitude representable in the wire format (63 bits).
pub const MAX_MAGNITUDE: i64 = i64::MAX;

// ---------------------------------------------------------------------------
// Decode / encode
// ---------------------------------------------------------------------------

/// Decode an 8-byte sign-magnitude field.
#[inline]
pub fn decode(buf: [u8; OFFT_SIZE]) -> i64 {
    let raw = u64::from_le_bytes(buf);
    let magnitude = (raw & !(1 << 63)) as i64;
    if raw & (1 << 63) != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Encode an integer into the 8-byte sign-magnitude form.
///
/// The inverse of [`decode`] for every value; `i64::MIN` has no magnitude
/// representation and saturates to the most negative encodable value.
#[inline]
pub fn encode(value: i64) -> [u8; OFFT_SIZE] {
    let magnitude = value.unsigned_abs().min(MAX_MAGNITUDE as u64);
    let raw = if value < 0 {
        magnitude | (1 << 63)
    } else {
        magnitude
    };
    raw.to_le_bytes()
}

// ---------------------------------------------------------------------------
// Streaming read
// ---------------------------------------------------------------------------

/// Read exactly 8 bytes from `r` and decode them.
///
/// A short read means the stream ended inside an integer field, which is
/// only ever caused by a truncated or garbled patch.
pub fn read_from<R: Read>(r: &mut R) -> Result<i64, PatchError> {
    let mut buf = [0u8; OFFT_SIZE];
    match r.read_exact(&mut buf) {
        Ok(()) => Ok(decode(buf)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(PatchError::Corrupt(
            "stream ended inside an integer field".into(),
        )),
        Err(e) => Err(PatchError::Corrupt(format!("stream read failed: {e}"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
