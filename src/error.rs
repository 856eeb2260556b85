use std::io;
use thiserror::Error;

/// Why an edit list was rejected by [`EditSet::new`](crate::EditSet::new).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidEdit {
    #[error("offset {offset} does not follow previous offset {previous}")]
    NotAscending { previous: u64, offset: u64 },

    #[error("range starting at {offset} overlaps previous range ending at {previous_end}")]
    Overlap { previous_end: u64, offset: u64 },

    #[error("range {offset}+{size} overflows u64")]
    RangeOverflow { offset: u64, size: u64 },

    #[error("edit at {offset} neither consumes nor emits bytes")]
    Empty { offset: u64 },
}

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Invalid edit set at edit #{index}: {reason}")]
    InvalidEditSet { index: usize, reason: InvalidEdit },

    #[error("Source ended at byte {source_offset}, edits expect it to reach byte {expected}")]
    UnexpectedEndOfSource { source_offset: u64, expected: u64 },

    /// A sink returned `Ok(0)` for a non-empty chunk. Ordinary partial writes
    /// are not errors; the rest of the chunk is offered again.
    #[error("Sink accepted {accepted} of {offered} bytes without reporting an error")]
    ShortWrite { accepted: usize, offered: usize },

    #[error("Patch reader already failed and cannot be resumed")]
    ReaderFailed,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<PatchError> for io::Error {
    /// Source and sink errors come back out unchanged; engine errors are wrapped
    /// so `io::Error::into_inner` can recover them.
    fn from(err: PatchError) -> Self {
        match err {
            PatchError::Io(error) => error,
            other => {
                let kind = match &other {
                    PatchError::UnexpectedEndOfSource { .. } => io::ErrorKind::UnexpectedEof,
                    PatchError::ShortWrite { .. } => io::ErrorKind::WriteZero,
                    PatchError::InvalidEditSet { .. } => io::ErrorKind::InvalidInput,
                    _ => io::ErrorKind::Other,
                };
                io::Error::new(kind, other)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_passes_through_unchanged() {
        let original = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let converted: io::Error = PatchError::Io(original).into();
        assert_eq!(converted.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(converted.to_string(), "denied");
        assert!(converted.get_ref().is_some());
    }

    #[test]
    fn test_engine_error_is_recoverable_from_io_error() {
        let converted: io::Error = PatchError::UnexpectedEndOfSource {
            source_offset: 3,
            expected: 8,
        }
        .into();
        assert_eq!(converted.kind(), io::ErrorKind::UnexpectedEof);

        let inner = converted.into_inner().unwrap();
        let patch_error = inner.downcast::<PatchError>().unwrap();
        assert!(matches!(
            *patch_error,
            PatchError::UnexpectedEndOfSource {
                source_offset: 3,
                expected: 8
            }
        ));
    }

    #[test]
    fn test_short_write_maps_to_write_zero() {
        let converted: io::Error = PatchError::ShortWrite {
            accepted: 1,
            offered: 4,
        }
        .into();
        assert_eq!(converted.kind(), io::ErrorKind::WriteZero);
    }
}
