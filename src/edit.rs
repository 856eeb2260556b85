use crate::error::{InvalidEdit, PatchError};

/// A single byte-range edit against a source stream.
///
/// `size` source bytes starting at `offset` are dropped and `data` is emitted in
/// their place. The relation between `size` and `data.len()` decides what the
/// edit does; see [`EditKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// Source position the edit applies at
    pub offset: u64,
    /// Number of source bytes consumed starting at `offset`
    pub size: u64,
    /// Bytes emitted in place of the consumed range
    pub data: Vec<u8>,
}

/// Effective kind of an [`Edit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// `size == data.len()`
    Overwrite,
    /// `size == 0`, data present
    Insert,
    /// `size > 0`, no data
    Delete,
    /// Both non-zero, different lengths
    Replace,
}

impl EditKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EditKind::Overwrite => "overwrite",
            EditKind::Insert => "insert",
            EditKind::Delete => "delete",
            EditKind::Replace => "replace",
        }
    }
}

impl std::fmt::Display for EditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Edit {
    pub fn new(offset: u64, size: u64, data: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            size,
            data: data.into(),
        }
    }

    /// Replace `data.len()` bytes at `offset` in place.
    pub fn overwrite(offset: u64, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self::new(offset, data.len() as u64, data)
    }

    pub fn insert(offset: u64, data: impl Into<Vec<u8>>) -> Self {
        Self::new(offset, 0, data)
    }

    pub fn delete(offset: u64, size: u64) -> Self {
        Self::new(offset, size, Vec::new())
    }

    pub fn kind(&self) -> EditKind {
        let len = self.data.len() as u64;
        if self.size == len {
            EditKind::Overwrite
        } else if self.size == 0 {
            EditKind::Insert
        } else if len == 0 {
            EditKind::Delete
        } else {
            EditKind::Replace
        }
    }

    /// End of the consumed source range (exclusive), `None` on overflow.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }

    /// Change in stream length caused by this edit.
    ///
    /// Widened to `i128` so every `size` a valid [`EditSet`] admits fits.
    pub fn len_delta(&self) -> i128 {
        self.data.len() as i128 - i128::from(self.size)
    }
}

/// An ordered, validated, immutable list of [`Edit`]s.
///
/// Offsets strictly increase and consumed ranges never overlap. The set does not
/// refer to any source, so one set can drive any number of
/// [`PatchReader`](crate::PatchReader)s, including concurrently from several
/// threads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSet {
    edits: Vec<Edit>,
}

impl EditSet {
    /// Validate `edits` and build a set from them.
    ///
    /// Fails with [`PatchError::InvalidEditSet`] naming the first offending edit
    /// when offsets are not strictly ascending, ranges overlap, a range overflows,
    /// or an edit neither consumes nor emits anything.
    pub fn new(edits: Vec<Edit>) -> Result<Self, PatchError> {
        let mut previous: Option<(u64, u64)> = None;

        for (index, edit) in edits.iter().enumerate() {
            let invalid = |reason| PatchError::InvalidEditSet { index, reason };

            if edit.size == 0 && edit.data.is_empty() {
                return Err(invalid(InvalidEdit::Empty {
                    offset: edit.offset,
                }));
            }

            let end = edit.end().ok_or_else(|| {
                invalid(InvalidEdit::RangeOverflow {
                    offset: edit.offset,
                    size: edit.size,
                })
            })?;

            if let Some((previous_offset, previous_end)) = previous {
                if edit.offset <= previous_offset {
                    return Err(invalid(InvalidEdit::NotAscending {
                        previous: previous_offset,
                        offset: edit.offset,
                    }));
                }
                if edit.offset < previous_end {
                    return Err(invalid(InvalidEdit::Overlap {
                        previous_end,
                        offset: edit.offset,
                    }));
                }
            }

            previous = Some((edit.offset, end));
        }

        Ok(Self { edits })
    }

    /// The identity transform.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Edit> {
        self.edits.iter()
    }

    pub fn as_slice(&self) -> &[Edit] {
        &self.edits
    }

    pub fn get(&self, index: usize) -> Option<&Edit> {
        self.edits.get(index)
    }

    /// Length of the patched stream for a source of `source_len` bytes.
    ///
    /// Returns `None` when the source is too short to hold the last edit's range,
    /// which is exactly when patching would fail with
    /// [`PatchError::UnexpectedEndOfSource`].
    pub fn output_len(&self, source_len: u64) -> Option<u64> {
        if let Some(last) = self.edits.last() {
            // validated on construction
            let end = last.offset + last.size;
            if end > source_len {
                return None;
            }
        }

        let removed: u64 = self.edits.iter().map(|e| e.size).sum();
        let added: u64 = self.edits.iter().map(|e| e.data.len() as u64).sum();
        Some(source_len - removed + added)
    }

    /// Patch an in-memory buffer.
    pub fn apply_to_slice(&self, source: &[u8]) -> Result<Vec<u8>, PatchError> {
        let capacity = self
            .output_len(source.len() as u64)
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(source.len());
        let mut output = Vec::with_capacity(capacity);

        crate::apply::apply(source, &mut output, self).map_err(|e| e.error)?;
        Ok(output)
    }

    pub fn into_vec(self) -> Vec<Edit> {
        self.edits
    }
}

impl<'a> IntoIterator for &'a EditSet {
    type Item = &'a Edit;
    type IntoIter = std::slice::Iter<'a, Edit>;

    fn into_iter(self) -> Self::IntoIter {
        self.edits.iter()
    }
}

impl TryFrom<Vec<Edit>> for EditSet {
    type Error = PatchError;

    fn try_from(edits: Vec<Edit>) -> Result<Self, Self::Error> {
        Self::new(edits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(result: Result<EditSet, PatchError>) -> (usize, InvalidEdit) {
        match result {
            Err(PatchError::InvalidEditSet { index, reason }) => (index, reason),
            other => panic!("expected InvalidEditSet, got {other:?}"),
        }
    }

    #[test]
    fn test_edit_kinds() {
        assert_eq!(Edit::new(2, 3, "xyz").kind(), EditKind::Overwrite);
        assert_eq!(Edit::insert(2, "123").kind(), EditKind::Insert);
        assert_eq!(Edit::delete(1, 2).kind(), EditKind::Delete);
        assert_eq!(Edit::new(1, 2, "long").kind(), EditKind::Replace);
        assert_eq!(Edit::new(1, 5, "ab").kind(), EditKind::Replace);
    }

    #[test]
    fn test_overwrite_constructor_uses_data_length() {
        let edit = Edit::overwrite(4, "abc");
        assert_eq!(edit.size, 3);
        assert_eq!(edit.len_delta(), 0);
    }

    #[test]
    fn test_len_delta() {
        assert_eq!(Edit::insert(0, "abc").len_delta(), 3);
        assert_eq!(Edit::delete(0, 5).len_delta(), -5);
        assert_eq!(Edit::new(0, 2, "abcd").len_delta(), 2);
    }

    #[test]
    fn test_len_delta_of_huge_deletes() {
        let half = Edit::delete(0, 1 << 63);
        assert!(EditSet::new(vec![half.clone()]).is_ok());
        assert_eq!(half.len_delta(), -(1i128 << 63));

        let all = Edit::delete(0, u64::MAX);
        assert!(EditSet::new(vec![all.clone()]).is_ok());
        assert_eq!(all.len_delta(), -i128::from(u64::MAX));
        assert!(all.len_delta() < 0);
    }

    #[test]
    fn test_empty_set_is_valid() {
        let set = EditSet::new(Vec::new()).unwrap();
        assert!(set.is_empty());
        assert_eq!(set, EditSet::empty());
    }

    #[test]
    fn test_ascending_disjoint_edits_accepted() {
        let set = EditSet::new(vec![
            Edit::delete(0, 2),
            Edit::insert(2, "x"),
            Edit::overwrite(5, "yy"),
        ])
        .unwrap();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_duplicate_offset_rejected() {
        let (index, why) = reason(EditSet::new(vec![
            Edit::insert(3, "a"),
            Edit::insert(3, "b"),
        ]));
        assert_eq!(index, 1);
        assert_eq!(
            why,
            InvalidEdit::NotAscending {
                previous: 3,
                offset: 3
            }
        );
    }

    #[test]
    fn test_descending_offset_rejected() {
        let (index, why) = reason(EditSet::new(vec![
            Edit::overwrite(8, "a"),
            Edit::overwrite(2, "b"),
        ]));
        assert_eq!(index, 1);
        assert!(matches!(why, InvalidEdit::NotAscending { .. }));
    }

    #[test]
    fn test_overlapping_ranges_rejected() {
        let (index, why) = reason(EditSet::new(vec![
            Edit::delete(2, 4),
            Edit::overwrite(5, "z"),
        ]));
        assert_eq!(index, 1);
        assert_eq!(
            why,
            InvalidEdit::Overlap {
                previous_end: 6,
                offset: 5
            }
        );
    }

    #[test]
    fn test_range_overflow_rejected() {
        let (index, why) = reason(EditSet::new(vec![Edit::delete(u64::MAX, 2)]));
        assert_eq!(index, 0);
        assert!(matches!(why, InvalidEdit::RangeOverflow { .. }));
    }

    #[test]
    fn test_no_op_edit_rejected() {
        let (_, why) = reason(EditSet::new(vec![Edit::new(4, 0, Vec::new())]));
        assert_eq!(why, InvalidEdit::Empty { offset: 4 });
    }

    #[test]
    fn test_output_len() {
        let set = EditSet::new(vec![
            Edit::insert(0, "abc"),
            Edit::delete(2, 3),
            Edit::new(6, 1, "xy"),
        ])
        .unwrap();
        assert_eq!(set.output_len(10), Some(10 + 3 - 3 + 1));
        assert_eq!(set.output_len(7), Some(8));
        assert_eq!(set.output_len(6), None);
        assert_eq!(EditSet::empty().output_len(0), Some(0));
    }

    #[test]
    fn test_apply_to_slice_scenarios() {
        let overwrite = EditSet::new(vec![Edit::new(2, 3, "xyz")]).unwrap();
        assert_eq!(overwrite.apply_to_slice(b"ABCDEFGHIJ").unwrap(), b"ABxyzFGHIJ");

        let insert = EditSet::new(vec![Edit::insert(2, "123")]).unwrap();
        assert_eq!(insert.apply_to_slice(b"ABCDE").unwrap(), b"AB123CDE");

        let delete = EditSet::new(vec![Edit::delete(1, 2)]).unwrap();
        assert_eq!(delete.apply_to_slice(b"ABCDE").unwrap(), b"ADE");
    }

    #[test]
    fn test_apply_to_slice_reports_short_source() {
        let set = EditSet::new(vec![Edit::delete(3, 10)]).unwrap();
        let err = set.apply_to_slice(b"ABCDE").unwrap_err();
        assert!(matches!(
            err,
            PatchError::UnexpectedEndOfSource {
                source_offset: 5,
                expected: 13
            }
        ));
    }
}
