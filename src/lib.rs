//! Byte Patch: streaming byte-range patching
//!
//! Rewrites a byte stream by applying an ordered list of edits, without holding
//! the input or output in memory. Built for swapping segments inside binary
//! containers (metadata blocks in image files and the like) while every other
//! byte passes through untouched.
//!
//! # Architecture
//!
//! Every change is an [`Edit`]: drop `size` source bytes at `offset` and emit
//! `data` in their place. Overwrites, insertions and deletions are the same
//! primitive with different `size`/`data` lengths. Locating the ranges to edit
//! is the caller's job; this crate only applies them.
//!
//! - [`EditSet`] validates that edits are ascending and disjoint
//! - [`PatchReader`] applies an edit set to any [`std::io::Read`] on demand
//! - [`apply`] drains a reader into any [`std::io::Write`]
//! - [`file::apply_to_path`] patches files with an atomic replace
//!
//! # Example
//!
//! ```
//! use byte_patch::{Edit, EditSet, PatchReader};
//! use std::io::Read;
//!
//! let edits = EditSet::new(vec![
//!     Edit::new(2, 3, "xyz"),
//!     Edit::insert(10, "!"),
//! ])?;
//!
//! let mut patched = Vec::new();
//! PatchReader::new(&b"ABCDEFGHIJ"[..], &edits).read_to_end(&mut patched)?;
//! assert_eq!(patched, b"ABxyzFGHIJ!");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod apply;
pub mod edit;
pub mod error;
pub mod file;
pub mod manifest;
pub mod reader;

// Re-exports
pub use apply::{apply, apply_direct, apply_with_buffer, ApplyError, DEFAULT_BUFFER_SIZE};
pub use edit::{Edit, EditKind, EditSet};
pub use error::{InvalidEdit, PatchError};
pub use file::{apply_to_path, dry_run, dry_run_with_buffer, ApplyReport, FileError};
pub use manifest::{load_edit_set, load_from_path, load_from_str, Manifest, ManifestError};
pub use reader::{PatchReader, Phase, PullError, DEFAULT_SCRATCH_SIZE};
