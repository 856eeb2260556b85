use crate::edit::{Edit, EditSet};
use crate::error::PatchError;
use crate::manifest::schema::{Manifest, Payload, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ManifestError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
    Payload {
        index: usize,
        path: PathBuf,
        source: std::io::Error,
    },
    Edits {
        path: Option<PathBuf>,
        source: PatchError,
    },
}

impl ManifestError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ManifestError::Toml { path: None, source } => ManifestError::Toml {
                path: Some(path),
                source,
            },
            ManifestError::Validation { path: None, source } => ManifestError::Validation {
                path: Some(path),
                source,
            },
            ManifestError::Edits { path: None, source } => ManifestError::Edits {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::Io { path, source } => {
                write!(
                    f,
                    "failed to read edit manifest from {}: {}",
                    path.display(),
                    source
                )
            }
            ManifestError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse edit manifest TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse edit manifest TOML: {}", source),
            },
            ManifestError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid edit manifest ({}): {}", path.display(), source),
                None => write!(f, "invalid edit manifest: {}", source),
            },
            ManifestError::Payload {
                index,
                path,
                source,
            } => write!(
                f,
                "failed to read payload for edit #{} from {}: {}",
                index,
                path.display(),
                source
            ),
            ManifestError::Edits { path, source } => match path {
                Some(path) => write!(f, "edit manifest {}: {}", path.display(), source),
                None => write!(f, "edit manifest: {}", source),
            },
        }
    }
}

impl std::error::Error for ManifestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ManifestError::Io { source, .. } => Some(source),
            ManifestError::Toml { source, .. } => Some(source),
            ManifestError::Validation { source, .. } => Some(source),
            ManifestError::Payload { source, .. } => Some(source),
            ManifestError::Edits { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<Manifest, ManifestError> {
    let manifest: Manifest = toml_edit::de::from_str(input)
        .map_err(|source| ManifestError::Toml { path: None, source })?;
    manifest
        .validate()
        .map_err(|source| ManifestError::Validation { path: None, source })?;
    Ok(manifest)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// Load a manifest and build its edit set, resolving payload files against
/// the manifest's directory.
pub fn load_edit_set(path: impl AsRef<Path>) -> Result<(Manifest, EditSet), ManifestError> {
    let path = path.as_ref();
    let manifest = load_from_path(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let edits = manifest
        .to_edit_set(base_dir)
        .map_err(|error| error.with_path(path))?;
    Ok((manifest, edits))
}

impl Manifest {
    /// Build the edit set, reading `file` payloads relative to `base_dir`.
    pub fn to_edit_set(&self, base_dir: &Path) -> Result<EditSet, ManifestError> {
        let mut edits = Vec::with_capacity(self.edits.len());

        for (index, definition) in self.edits.iter().enumerate() {
            let data = match definition.payload() {
                Payload::None => Vec::new(),
                Payload::Text(text) => text.as_bytes().to_vec(),
                Payload::Bytes(bytes) => bytes.to_vec(),
                Payload::File(file) => {
                    let path = base_dir.join(file);
                    fs::read(&path).map_err(|source| ManifestError::Payload {
                        index,
                        path,
                        source,
                    })?
                }
            };
            edits.push(Edit::new(definition.offset, definition.size, data));
        }

        EditSet::new(edits).map_err(|source| ManifestError::Edits { path: None, source })
    }
}
