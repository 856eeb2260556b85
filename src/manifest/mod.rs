//! TOML edit manifests.
//!
//! A manifest lists edits against one source file so they can be kept next to
//! the file they patch and applied from the command line.

pub mod loader;
pub mod schema;

pub use loader::{load_edit_set, load_from_path, load_from_str, ManifestError};
pub use schema::{EditDefinition, Manifest, Metadata, Payload, ValidationError, ValidationIssue};
