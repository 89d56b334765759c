//! Oxipatch: BSDIFF40 binary patch application in Rust.
//!
//! The crate provides:
//! - The patch container format and reconstruction engine (`patch`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! Only the consumer side of the bsdiff scheme is implemented: a patch
//! produced by a bsdiff-compatible generator is applied to a source file to
//! reconstruct the target, all-or-nothing.
//!
//! # Quick Start
//!
//! ```no_run
//! let old = std::fs::read("app-1.0.bin")?;
//! let patch = std::fs::read("update.patch")?;
//!
//! let new = oxipatch::patch::apply(&old, &patch)?;
//! std::fs::write("app-1.1.bin", &new)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod io;
pub mod patch;

#[cfg(feature = "cli")]
pub mod cli;
