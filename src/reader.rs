//! Incremental patching transducer.
//!
//! [`PatchReader`] sits between a source stream and its consumer and yields the
//! patched stream on demand. Memory use is bounded by the caller's buffer and a
//! fixed scratch buffer, independent of the stream length or edit sizes.

use crate::edit::{Edit, EditSet};
use crate::error::PatchError;
use std::io::{self, Read};
use thiserror::Error;

/// Default size of the buffer used to drop consumed source bytes.
pub const DEFAULT_SCRATCH_SIZE: usize = 4096;

/// Where a [`PatchReader`] is in its traversal of the current edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Copying unedited source bytes up to the current edit's offset
    CopyingPreface,
    /// Emitting the current edit's data
    EmittingEditData,
    /// Reading and dropping the source bytes the current edit consumes
    DiscardingSourceBytes,
    /// All edits done, copying the rest of the source
    PassThrough,
    /// Source exhausted
    Done,
    /// An error terminated the reader
    Failed,
}

/// A pull that failed after placing `written` bytes into the caller's buffer.
///
/// The bytes are valid output; the reader is terminated.
#[derive(Error, Debug)]
#[error("{error} (after {written} bytes in this pull)")]
pub struct PullError {
    pub written: usize,
    #[source]
    pub error: PatchError,
}

/// Applies an [`EditSet`] to a source stream as it is read.
///
/// Each call to [`pull`](Self::pull) or [`Read::read`] returns at least one byte
/// until the patched stream ends. A call may return fewer bytes than requested:
/// it ends after a pass-through read, and after a preface read that leaves the
/// current edit's offset unreached. Edit data and discards never end a call
/// early.
///
/// Not reusable: after end of stream or an error, build a new reader.
#[derive(Debug)]
pub struct PatchReader<'e, R> {
    source: R,
    edits: &'e EditSet,
    phase: Phase,
    /// Bytes consumed from the source so far
    source_offset: u64,
    /// Index of the current edit
    edit_index: usize,
    /// Bytes of the current edit's data already produced
    data_emitted: usize,
    scratch: Vec<u8>,
    /// Error held back by `Read::read` so it can first return partial output
    deferred: Option<PatchError>,
}

impl<'e, R: Read> PatchReader<'e, R> {
    pub fn new(source: R, edits: &'e EditSet) -> Self {
        Self::with_scratch_size(source, edits, DEFAULT_SCRATCH_SIZE)
    }

    /// Create a reader whose discard buffer holds `scratch_size` bytes.
    ///
    /// Discards use the caller's buffer instead whenever that is larger.
    pub fn with_scratch_size(source: R, edits: &'e EditSet, scratch_size: usize) -> Self {
        let mut reader = Self {
            source,
            edits,
            phase: Phase::PassThrough,
            source_offset: 0,
            edit_index: 0,
            data_emitted: 0,
            scratch: vec![0; scratch_size.max(1)],
            deferred: None,
        };
        reader.enter_edit();
        reader
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn source_offset(&self) -> u64 {
        self.source_offset
    }

    pub fn edit_index(&self) -> usize {
        self.edit_index
    }

    pub fn data_emitted(&self) -> usize {
        self.data_emitted
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    /// Fill `buf` with the next chunk of patched output.
    ///
    /// Returns the number of bytes written; `Ok(0)` for a non-empty `buf` means
    /// the patched stream has ended. On failure the error carries the number of
    /// bytes already written to `buf` in this call, and every later pull fails
    /// with [`PatchError::ReaderFailed`].
    pub fn pull(&mut self, buf: &mut [u8]) -> Result<usize, PullError> {
        if self.phase == Phase::Failed {
            return Err(PullError {
                written: 0,
                error: PatchError::ReaderFailed,
            });
        }

        let mut written = 0;
        while written < buf.len() {
            let phase = self.phase;
            let out = &mut buf[written..];
            let step = match phase {
                Phase::CopyingPreface => self.copy_preface(out),
                Phase::EmittingEditData => Ok(self.emit_edit_data(out)),
                Phase::DiscardingSourceBytes => self.discard_consumed(out).map(|()| 0),
                Phase::PassThrough => self.pass_through(out),
                Phase::Done | Phase::Failed => break,
            };

            match step {
                Ok(n) => written += n,
                Err(error) => {
                    tracing::debug!(
                        source_offset = self.source_offset,
                        edit_index = self.edit_index,
                        written,
                        error = %error,
                        "patch reader failed"
                    );
                    self.phase = Phase::Failed;
                    return Err(PullError { written, error });
                }
            }

            // the source may have nothing more ready
            let copying = matches!(phase, Phase::CopyingPreface | Phase::PassThrough);
            if copying && self.phase == phase {
                break;
            }
        }

        Ok(written)
    }

    fn current_edit(&self) -> &'e Edit {
        let edits: &'e EditSet = self.edits;
        &edits.as_slice()[self.edit_index]
    }

    /// Pick the phase for the edit at `edit_index`, or pass-through past the end.
    fn enter_edit(&mut self) {
        self.data_emitted = 0;
        self.phase = match self.edits.get(self.edit_index) {
            None => Phase::PassThrough,
            Some(edit) if self.source_offset < edit.offset => Phase::CopyingPreface,
            Some(edit) if !edit.data.is_empty() => Phase::EmittingEditData,
            Some(_) => Phase::DiscardingSourceBytes,
        };
        tracing::trace!(
            edit_index = self.edit_index,
            source_offset = self.source_offset,
            phase = ?self.phase,
            "entering edit"
        );
    }

    fn finish_edit(&mut self) {
        self.edit_index += 1;
        self.enter_edit();
    }

    fn copy_preface(&mut self, out: &mut [u8]) -> Result<usize, PatchError> {
        let edit = self.current_edit();
        let remaining = edit.offset - self.source_offset;
        let want = usize::try_from(remaining).map_or(out.len(), |r| r.min(out.len()));

        let n = read_source(&mut self.source, &mut out[..want])?;
        if n == 0 {
            return Err(PatchError::UnexpectedEndOfSource {
                source_offset: self.source_offset,
                expected: edit.offset,
            });
        }
        self.source_offset += n as u64;

        if self.source_offset == edit.offset {
            self.phase = if edit.data.is_empty() {
                Phase::DiscardingSourceBytes
            } else {
                Phase::EmittingEditData
            };
        }
        Ok(n)
    }

    fn emit_edit_data(&mut self, out: &mut [u8]) -> usize {
        let edit = self.current_edit();
        let pending = &edit.data[self.data_emitted..];
        let n = pending.len().min(out.len());
        out[..n].copy_from_slice(&pending[..n]);
        self.data_emitted += n;

        if self.data_emitted == edit.data.len() {
            if edit.size == 0 {
                self.finish_edit();
            } else {
                self.phase = Phase::DiscardingSourceBytes;
            }
        }
        n
    }

    /// Drop the current edit's consumed range. `out` is the unfilled part of the
    /// caller's buffer and serves as the discard buffer when it is larger than
    /// the scratch buffer.
    fn discard_consumed(&mut self, out: &mut [u8]) -> Result<(), PatchError> {
        let edit = self.current_edit();
        let end = edit.offset + edit.size;
        let tmp: &mut [u8] = if out.len() > self.scratch.len() {
            out
        } else {
            self.scratch.as_mut_slice()
        };

        while self.source_offset < end {
            let remaining = end - self.source_offset;
            let want = usize::try_from(remaining).map_or(tmp.len(), |r| r.min(tmp.len()));
            let n = read_source(&mut self.source, &mut tmp[..want])?;
            if n == 0 {
                return Err(PatchError::UnexpectedEndOfSource {
                    source_offset: self.source_offset,
                    expected: end,
                });
            }
            self.source_offset += n as u64;
        }

        self.finish_edit();
        Ok(())
    }

    fn pass_through(&mut self, out: &mut [u8]) -> Result<usize, PatchError> {
        let n = read_source(&mut self.source, out)?;
        self.source_offset += n as u64;
        if n == 0 {
            tracing::trace!(source_offset = self.source_offset, "source exhausted");
            self.phase = Phase::Done;
        }
        Ok(n)
    }
}

/// Read once from `source`, retrying interrupted reads.
fn read_source<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize, PatchError> {
    loop {
        match source.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PatchError::Io(e)),
        }
    }
}

impl<R: Read> Read for PatchReader<'_, R> {
    /// `Read` cannot return bytes and an error together, so an error that
    /// follows partial output is reported by the next call.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(error) = self.deferred.take() {
            return Err(error.into());
        }

        match self.pull(buf) {
            Ok(n) => Ok(n),
            Err(PullError { written: 0, error }) => Err(error.into()),
            Err(PullError { written, error }) => {
                self.deferred = Some(error);
                Ok(written)
            }
        }
    }
}
