// BSDIFF40 patch container parsing and application.
//
// A patch is a 32-byte header followed by three bzip2 streams: a control
// block (24-byte triples driving the reconstruction), a diff block (bytes
// added to source bytes) and an extra block (bytes copied verbatim).
//
// Submodules, leaf-first:
//   - `offt`: the format's 8-byte sign-magnitude integer codec
//   - `header`: the 32-byte fixed preamble
//   - `control`: the (add, copy, seek) control triple
//   - `streams`: three independent decompression cursors over one container
//   - `apply`: the reconstruction loop

pub mod apply;
pub mod control;
pub mod header;
pub mod offt;
pub mod streams;

pub use apply::{apply, apply_streams, apply_with_progress};
pub use control::ControlTriple;
pub use header::PatchHeader;
pub use streams::PatchStreams;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors raised while parsing or applying a patch.
///
/// All variants are terminal for the invocation: there is no retry or
/// partial-result policy, and a partially written output must be treated
/// as invalid by callers.
#[derive(Debug)]
pub enum PatchError {
    /// I/O error on the source, patch, or output file.
    Io(std::io::Error),
    /// Bad magic or truncated/invalid header.
    Format(String),
    /// Corrupt patch body: bounds violation, short decompressed read,
    /// or decoder error state.
    Corrupt(String),
    /// Target buffer allocation failure.
    Alloc { bytes: u64 },
    /// The progress observer requested cancellation.
    Cancelled,
}

impl std::fmt::Display for PatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Format(msg) => write!(f, "invalid patch header: {msg}"),
            Self::Corrupt(msg) => write!(f, "corrupt patch: {msg}"),
            Self::Alloc { bytes } => write!(f, "failed to allocate {bytes} bytes for target"),
            Self::Cancelled => write!(f, "cancelled by progress observer"),
        }
    }
}

impl std::error::Error for PatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PatchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Progress observer
// ---------------------------------------------------------------------------

/// Observes reconstruction progress and may request cancellation.
///
/// `report` is invoked once per control triple, before the triple is
/// processed, with the number of target bytes written so far and the total
/// target size. Returning `false` aborts the run with
/// [`PatchError::Cancelled`]; no further target bytes are written.
pub trait Progress {
    fn report(&mut self, bytes_done: u64, total_bytes: u64) -> bool;
}

impl<F: FnMut(u64, u64) -> bool> Progress for F {
    fn report(&mut self, bytes_done: u64, total_bytes: u64) -> bool {
        self(bytes_done, total_bytes)
    }
}

/// No-op observer that never cancels.
pub struct NoProgress;

impl Progress for NoProgress {
    fn report(&mut self, _bytes_done: u64, _total_bytes: u64) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
