//! Patching files on disk.
//!
//! The engine itself writes straight into whatever sink it is given. These
//! helpers stream into a temporary file next to the destination and only
//! rename it into place once every byte was written, so a failed run leaves
//! the destination untouched.

use crate::apply::{apply_with_buffer, ApplyError, DEFAULT_BUFFER_SIZE};
use crate::edit::EditSet;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("Failed to open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed to patch {path}: {source}")]
    Apply { path: PathBuf, source: ApplyError },

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Outcome of patching one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub input: PathBuf,
    /// `None` for a dry run
    pub output: Option<PathBuf>,
    pub input_len: u64,
    pub output_len: u64,
    pub edits: usize,
}

/// Patch `input` into `output`, replacing `output` atomically.
///
/// `input` and `output` may be the same path.
pub fn apply_to_path(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    edits: &EditSet,
) -> Result<ApplyReport, FileError> {
    apply_to_path_with_buffer(input, output, edits, DEFAULT_BUFFER_SIZE)
}

pub fn apply_to_path_with_buffer(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    edits: &EditSet,
    buffer_size: usize,
) -> Result<ApplyReport, FileError> {
    let input = input.as_ref();
    let output = output.as_ref();
    let (source, input_len, permissions) = open_input(input)?;

    let write_error = |source| FileError::Write {
        path: output.to_path_buf(),
        source,
    };

    // Create tempfile in same directory to ensure same filesystem
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(write_error)?;

    let output_len = {
        let mut sink = io::BufWriter::new(temp.as_file_mut());
        let written =
            apply_with_buffer(source, &mut sink, edits, buffer_size).map_err(|source| {
                FileError::Apply {
                    path: input.to_path_buf(),
                    source,
                }
            })?;
        sink.flush().map_err(write_error)?;
        written
    };

    temp.as_file().set_permissions(permissions).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(output).map_err(|e| write_error(e.error))?;

    tracing::debug!(
        input = %input.display(),
        output = %output.display(),
        input_len,
        output_len,
        "patched file"
    );

    Ok(ApplyReport {
        input: input.to_path_buf(),
        output: Some(output.to_path_buf()),
        input_len,
        output_len,
        edits: edits.len(),
    })
}

/// Stream `input` through `edits` without writing anything, to check that the
/// edits fit the file.
pub fn dry_run(input: impl AsRef<Path>, edits: &EditSet) -> Result<ApplyReport, FileError> {
    dry_run_with_buffer(input, edits, DEFAULT_BUFFER_SIZE)
}

/// [`dry_run`] with an intermediate buffer of `buffer_size` bytes.
pub fn dry_run_with_buffer(
    input: impl AsRef<Path>,
    edits: &EditSet,
    buffer_size: usize,
) -> Result<ApplyReport, FileError> {
    let input = input.as_ref();
    let (source, input_len, _) = open_input(input)?;

    let output_len =
        apply_with_buffer(source, &mut io::sink(), edits, buffer_size).map_err(
            |source| FileError::Apply {
                path: input.to_path_buf(),
                source,
            },
        )?;

    Ok(ApplyReport {
        input: input.to_path_buf(),
        output: None,
        input_len,
        output_len,
        edits: edits.len(),
    })
}

fn open_input(path: &Path) -> Result<(File, u64, fs::Permissions), FileError> {
    let open_error = |source| FileError::Open {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(open_error)?;
    let metadata = file.metadata().map_err(open_error)?;
    Ok((file, metadata.len(), metadata.permissions()))
}
