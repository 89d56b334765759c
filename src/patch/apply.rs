// Patch application: the control-triple reconstruction loop.
//
// Walks the source buffer and the target buffer in lockstep under the
// control stream: each triple adds diff bytes combined with source bytes,
// copies extra bytes verbatim, then seeks the source cursor. The target is
// complete exactly when the write cursor reaches the declared size.

use std::io::Read;

use super::header::PatchHeader;
use super::streams::PatchStreams;
use super::{NoProgress, PatchError, Progress};

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Apply an in-memory patch container to an in-memory source.
///
/// `patch` is the whole container including the 32-byte header. Returns the
/// reconstructed target buffer.
///
/// # Example
///
/// ```no_run
/// let old = std::fs::read("app-1.0.bin")?;
/// let patch = std::fs::read("app-1.0-to-1.1.patch")?;
/// let new = oxipatch::patch::apply(&old, &patch)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn apply(old: &[u8], patch: &[u8]) -> Result<Vec<u8>, PatchError> {
    apply_with_progress(old, patch, &mut NoProgress)
}

/// Like [`apply`], with a progress observer that may cancel the run.
pub fn apply_with_progress<P: Progress>(
    old: &[u8],
    patch: &[u8],
    progress: &mut P,
) -> Result<Vec<u8>, PatchError> {
    let header = PatchHeader::parse(patch)?;
    let mut streams = PatchStreams::from_bytes(patch, &header)?;
    apply_streams(old, &mut streams, header.new_size as u64, progress)
}

/// The reconstruction loop itself, generic over the stream backing.
///
/// Used directly by the file adapter, which opens the streams over the
/// patch file instead of an in-memory buffer.
pub fn apply_streams<R: Read, P: Progress>(
    old: &[u8],
    streams: &mut PatchStreams<R>,
    new_size: u64,
    progress: &mut P,
) -> Result<Vec<u8>, PatchError> {
    let size = usize::try_from(new_size).map_err(|_| PatchError::Alloc { bytes: new_size })?;

    let mut new: Vec<u8> = Vec::new();
    new.try_reserve_exact(size)
        .map_err(|_| PatchError::Alloc { bytes: new_size })?;
    new.resize(size, 0);

    let old_size = old.len() as i64;
    let mut old_pos: i64 = 0;
    let mut new_pos: usize = 0;
    let mut triples: u64 = 0;

    while new_pos < size {
        if !progress.report(new_pos as u64, new_size) {
            return Err(PatchError::Cancelled);
        }

        let ctrl = streams.read_control()?;
        triples += 1;
        log::trace!(
            "triple {triples}: add={}, copy={}, seek={} (old_pos={old_pos}, new_pos={new_pos})",
            ctrl.add,
            ctrl.copy,
            ctrl.seek
        );

        // Add step: diff bytes combined with source bytes.
        let add = checked_len(ctrl.add, size - new_pos, "add")?;
        streams.read_diff(&mut new[new_pos..new_pos + add])?;
        combine(&mut new[new_pos..new_pos + add], old, old_pos, old_size);
        new_pos += add;
        old_pos = old_pos.saturating_add(add as i64);

        // Copy step: extra bytes, verbatim.
        let copy = checked_len(ctrl.copy, size - new_pos, "copy")?;
        streams.read_extra(&mut new[new_pos..new_pos + copy])?;
        new_pos += copy;

        // Seek step: the source cursor may leave [0, old_size); combination
        // is simply disabled until it re-enters range.
        old_pos = old_pos.saturating_add(ctrl.seek);
    }

    log::debug!("reconstructed {new_pos} bytes from {triples} control triples");
    Ok(new)
}

// ---------------------------------------------------------------------------
// Loop helpers
// ---------------------------------------------------------------------------

/// Bounds-check a control length against the remaining target space.
/// Rejection happens before any byte of the step is written.
fn checked_len(len: i64, remaining: usize, step: &str) -> Result<usize, PatchError> {
    // len is non-negative (checked at triple decode); remaining <= isize::MAX.
    if len as u64 > remaining as u64 {
        return Err(PatchError::Corrupt(format!(
            "{step} length {len} exceeds remaining target space {remaining}"
        )));
    }
    Ok(len as usize)
}

/// Add source bytes into freshly read diff bytes, with u8 wraparound.
///
/// Only the part of `[old_pos, old_pos + dst.len())` that lies inside
/// `[0, old_size)` participates; diff bytes outside it stand as literals.
fn combine(dst: &mut [u8], old: &[u8], old_pos: i64, old_size: i64) {
    let begin = old_pos.clamp(0, old_size);
    let end = old_pos.saturating_add(dst.len() as i64).clamp(0, old_size);
    if begin >= end {
        return;
    }
    // begin >= old_pos here, so the offset into dst is non-negative.
    let dst_off = (begin - old_pos) as usize;
    let src = &old[begin as usize..end as usize];
    for (d, s) in dst[dst_off..dst_off + src.len()].iter_mut().zip(src) {
        *d = d.wrapping_add(*s);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use bzip2::write::BzEncoder;
    use bzip2::Compression;

    use crate::patch::offt;

    fn bz(data: &[u8]) -> Vec<u8> {
        let mut enc = BzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    /// Build a patch container from raw (uncompressed) streams.
    fn build_patch(triples: &[(i64, i64, i64)], diff: &[u8], extra: &[u8], new_size: i64) -> Vec<u8> {
        let mut ctrl = Vec::new();
        for &(add, copy, seek) in triples {
            ctrl.extend_from_slice(&offt::encode(add));
            ctrl.extend_from_slice(&offt::encode(copy));
            ctrl.extend_from_slice(&offt::encode(seek));
        }
        let (ctrl, diff, extra) = (bz(&ctrl), bz(diff), bz(extra));
        let header = PatchHeader {
            ctrl_len: ctrl.len() as i64,
            diff_len: diff.len() as i64,
            new_size,
        };
        let mut out = Vec::new();
        header.write_to(&mut out).unwrap();
        out.extend_from_slice(&ctrl);
        out.extend_from_slice(&diff);
        out.extend_from_slice(&extra);
        out
    }

    #[test]
    fn abc_to_abd_single_triple() {
        // "abc" -> "abd": one triple (add=3, copy=0, seek=0),
        // diff = [0, 0, 1] since 0x64 - 0x63 = 1.
        let patch = build_patch(&[(3, 0, 0)], &[0, 0, 1], b"", 3);
        let new = apply(b"abc", &patch).unwrap();
        assert_eq!(new, b"abd");
    }

    #[test]
    fn copy_only_patch_ignores_source() {
        let patch = build_patch(&[(0, 5, 0)], b"", b"hello", 5);
        assert_eq!(apply(b"unrelated", &patch).unwrap(), b"hello");
        assert_eq!(apply(b"", &patch).unwrap(), b"hello");
    }

    #[test]
    fn byte_combination_wraps_modulo_256() {
        let patch = build_patch(&[(1, 0, 0)], &[0xFF], b"", 1);
        let new = apply(&[0x02], &patch).unwrap();
        assert_eq!(new, [0x01]);
    }

    #[test]
    fn out_of_range_source_cursor_leaves_diff_literal() {
        // First triple seeks backward past the start of the source; the
        // second triple's add step must leave the diff bytes unmodified.
        let patch = build_patch(
            &[(0, 0, -10), (3, 0, 0)],
            &[0x11, 0x22, 0x33],
            b"",
            3,
        );
        let new = apply(&[0xAA, 0xBB, 0xCC], &patch).unwrap();
        assert_eq!(new, [0x11, 0x22, 0x33]);
    }

    #[test]
    fn source_cursor_reenters_range_mid_add() {
        // old_pos starts at -1: the first diff byte stays literal, the
        // remaining two combine with old[0] and old[1].
        let patch = build_patch(&[(0, 0, -1), (3, 0, 0)], &[5, 5, 5], b"", 3);
        let new = apply(&[10, 20, 30], &patch).unwrap();
        assert_eq!(new, [5, 15, 25]);
    }

    #[test]
    fn seek_forward_skips_source_bytes() {
        // Combine against old[0..2], skip two source bytes, then combine
        // against old[4..6].
        let old = [1u8, 2, 3, 4, 5, 6];
        let patch = build_patch(&[(2, 0, 2), (2, 0, 0)], &[0, 0, 0, 0], b"", 4);
        let new = apply(&old, &patch).unwrap();
        assert_eq!(new, [1, 2, 5, 6]);
    }

    #[test]
    fn add_overshoot_is_rejected_before_write() {
        let patch = build_patch(&[(4, 0, 0)], &[0; 4], b"", 3);
        let err = apply(b"abc", &patch).unwrap_err();
        assert!(matches!(err, PatchError::Corrupt(_)));
    }

    #[test]
    fn copy_overshoot_is_rejected() {
        let patch = build_patch(&[(0, 9, 0)], b"", &[0; 9], 3);
        let err = apply(b"abc", &patch).unwrap_err();
        assert!(matches!(err, PatchError::Corrupt(_)));
    }

    #[test]
    fn truncated_control_stream_is_corrupt() {
        // new_size says 6 but the control stream holds one triple for 3.
        let patch = build_patch(&[(0, 3, 0)], b"", b"abc", 6);
        let err = apply(b"", &patch).unwrap_err();
        assert!(matches!(err, PatchError::Corrupt(_)));
    }

    #[test]
    fn short_diff_stream_is_corrupt() {
        let patch = build_patch(&[(4, 0, 0)], &[0; 2], b"", 4);
        let err = apply(b"abcd", &patch).unwrap_err();
        assert!(matches!(err, PatchError::Corrupt(_)));
    }

    #[test]
    fn empty_target_needs_no_triples() {
        let patch = build_patch(&[], b"", b"", 0);
        assert_eq!(apply(b"whatever", &patch).unwrap(), b"");
    }

    #[test]
    fn mixed_add_and_copy() {
        // target = combine("abc") ++ "XY" ++ combine("f")
        // old = "abcdef"; after add(3) old_pos=3, seek 2 -> 5.
        let old = b"abcdef";
        let patch = build_patch(
            &[(3, 2, 2), (1, 0, 0)],
            &[0, 0, 0, 1],
            b"XY",
            6,
        );
        let new = apply(old, &patch).unwrap();
        assert_eq!(&new, b"abcXYg");
    }

    #[test]
    fn progress_observer_sees_every_triple() {
        let patch = build_patch(&[(0, 2, 0), (0, 2, 0)], b"", b"wxyz", 4);
        let mut seen = Vec::new();
        let mut obs = |done: u64, total: u64| {
            seen.push((done, total));
            true
        };
        apply_with_progress(b"", &patch, &mut obs).unwrap();
        assert_eq!(seen, vec![(0, 4), (2, 4)]);
    }

    #[test]
    fn cancellation_aborts_the_run() {
        let patch = build_patch(&[(0, 2, 0), (0, 2, 0)], b"", b"wxyz", 4);
        let mut obs = |done: u64, _total: u64| done < 2;
        let err = apply_with_progress(b"", &patch, &mut obs).unwrap_err();
        assert!(matches!(err, PatchError::Cancelled));
    }

    #[test]
    fn whole_file_replacement_via_literal_add() {
        // diff[i] = target[i] - old[i] (0 past the end of old): one add
        // triple can rewrite any file into any other.
        let old = b"short";
        let target = b"a considerably longer replacement";
        let diff: Vec<u8> = target
            .iter()
            .enumerate()
            .map(|(i, &t)| t.wrapping_sub(old.get(i).copied().unwrap_or(0)))
            .collect();
        let patch = build_patch(&[(target.len() as i64, 0, 0)], &diff, b"", target.len() as i64);
        assert_eq!(apply(old, &patch).unwrap(), target);
    }
}
