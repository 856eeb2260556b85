use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Manifest {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub edits: Vec<EditDefinition>,
}

impl Manifest {
    /// Check each edit definition on its own. Ordering and overlap between
    /// edits are checked when the edit set is built.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.edits.is_empty() {
            issues.push(ValidationIssue::EmptyEditList);
        }

        for (index, edit) in self.edits.iter().enumerate() {
            let given = edit.payload_fields();
            if given.len() > 1 {
                issues.push(ValidationIssue::ConflictingPayload {
                    index,
                    fields: given,
                });
            } else if given.is_empty() && edit.size == 0 {
                issues.push(ValidationIssue::MissingPayload {
                    index,
                    offset: edit.offset,
                });
            }

            if let Some(file) = &edit.file {
                if file.as_os_str().is_empty() {
                    issues.push(ValidationIssue::EmptyPath { index });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One `[[edits]]` entry.
///
/// Replacement bytes come from at most one of `text`, `bytes` or `file`; with
/// none of them the edit deletes `size` bytes.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct EditDefinition {
    pub offset: u64,
    #[serde(default)]
    pub size: u64,
    /// UTF-8 replacement text
    #[serde(default)]
    pub text: Option<String>,
    /// Raw replacement bytes
    #[serde(default)]
    pub bytes: Option<Vec<u8>>,
    /// File holding the replacement bytes, relative to the manifest
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Where an edit's replacement bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    None,
    Text(&'a str),
    Bytes(&'a [u8]),
    File(&'a Path),
}

impl EditDefinition {
    fn payload_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.text.is_some() {
            fields.push("text");
        }
        if self.bytes.is_some() {
            fields.push("bytes");
        }
        if self.file.is_some() {
            fields.push("file");
        }
        fields
    }

    /// The payload source; assumes the manifest passed validation.
    pub fn payload(&self) -> Payload<'_> {
        if let Some(text) = &self.text {
            Payload::Text(text)
        } else if let Some(bytes) = &self.bytes {
            Payload::Bytes(bytes)
        } else if let Some(file) = &self.file {
            Payload::File(file)
        } else {
            Payload::None
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyEditList,
    MissingPayload {
        index: usize,
        offset: u64,
    },
    ConflictingPayload {
        index: usize,
        fields: Vec<&'static str>,
    },
    EmptyPath {
        index: usize,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyEditList => write!(f, "manifest contains no edits"),
            ValidationIssue::MissingPayload { index, offset } => write!(
                f,
                "edit #{index} at offset {offset} has size 0 and no text, bytes or file"
            ),
            ValidationIssue::ConflictingPayload { index, fields } => write!(
                f,
                "edit #{index} sets more than one payload field: {}",
                fields.join(", ")
            ),
            ValidationIssue::EmptyPath { index } => {
                write!(f, "edit #{index} has an empty payload file path")
            }
        }
    }
}
