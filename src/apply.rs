//! Drain a patched stream into a sink.

use crate::edit::EditSet;
use crate::error::PatchError;
use crate::reader::{PatchReader, PullError};
use std::io::{self, Read, Write};
use thiserror::Error;

/// Size of the intermediate buffer used by [`apply`].
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Failure while applying edits; `written` bytes already reached the sink and
/// stay there.
#[derive(Error, Debug)]
#[error("{error} (after writing {written} bytes)")]
pub struct ApplyError {
    pub written: u64,
    #[source]
    pub error: PatchError,
}

/// Copy `source` to `sink` with `edits` applied, returning the bytes written.
pub fn apply<R, W>(source: R, sink: &mut W, edits: &EditSet) -> Result<u64, ApplyError>
where
    R: Read,
    W: Write + ?Sized,
{
    apply_with_buffer(source, sink, edits, DEFAULT_BUFFER_SIZE)
}

/// [`apply`] with an intermediate buffer of `buffer_size` bytes.
pub fn apply_with_buffer<R, W>(
    source: R,
    sink: &mut W,
    edits: &EditSet,
    buffer_size: usize,
) -> Result<u64, ApplyError>
where
    R: Read,
    W: Write + ?Sized,
{
    let mut reader = PatchReader::new(source, edits);
    let mut buf = vec![0; buffer_size.max(1)];
    let mut written = 0u64;

    loop {
        let (n, failure) = match reader.pull(&mut buf) {
            Ok(0) => break,
            Ok(n) => (n, None),
            Err(PullError { written: n, error }) => (n, Some(error)),
        };

        // partial output goes out before the pull error is reported
        let pushed = push(sink, &buf[..n]);
        written += pushed.accepted as u64;
        if let Some(error) = pushed.error.or(failure) {
            return Err(ApplyError { written, error });
        }
    }

    tracing::debug!(written, edits = edits.len(), "applied edit set");
    Ok(written)
}

/// Push-based variant of [`apply`] that writes edit data straight from `edits`
/// instead of staging it in the intermediate buffer.
///
/// Produces the same bytes and errors as [`apply`].
pub fn apply_direct<R, W>(mut source: R, sink: &mut W, edits: &EditSet) -> Result<u64, ApplyError>
where
    R: Read,
    W: Write + ?Sized,
{
    let mut copier = Copier {
        sink,
        buf: vec![0; DEFAULT_BUFFER_SIZE],
        read: 0,
        written: 0,
    };

    match copier.run(&mut source, edits) {
        Ok(()) => Ok(copier.written),
        Err(error) => Err(copier.fail(error)),
    }
}

struct Pushed {
    accepted: usize,
    error: Option<PatchError>,
}

/// Write all of `chunk`, stopping at the first error or zero-length write.
fn push<W: Write + ?Sized>(sink: &mut W, chunk: &[u8]) -> Pushed {
    let mut accepted = 0;
    while accepted < chunk.len() {
        match sink.write(&chunk[accepted..]) {
            Ok(0) => {
                return Pushed {
                    accepted,
                    error: Some(PatchError::ShortWrite {
                        accepted,
                        offered: chunk.len(),
                    }),
                }
            }
            Ok(n) => accepted += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Pushed {
                    accepted,
                    error: Some(PatchError::Io(e)),
                }
            }
        }
    }
    Pushed {
        accepted,
        error: None,
    }
}

struct Copier<'w, W: ?Sized> {
    sink: &'w mut W,
    buf: Vec<u8>,
    /// Source bytes consumed
    read: u64,
    /// Bytes accepted by the sink
    written: u64,
}

impl<W: Write + ?Sized> Copier<'_, W> {
    fn run<R: Read>(&mut self, source: &mut R, edits: &EditSet) -> Result<(), PatchError> {
        for edit in edits {
            self.copy_exact(source, edit.offset)?;
            self.write(&edit.data)?;
            self.discard_exact(source, edit.offset + edit.size)?;
        }
        self.copy_to_end(source)
    }

    fn fail(&self, error: PatchError) -> ApplyError {
        tracing::debug!(
            read = self.read,
            written = self.written,
            error = %error,
            "direct apply failed"
        );
        ApplyError {
            written: self.written,
            error,
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), PatchError> {
        let pushed = push(&mut *self.sink, data);
        self.written += pushed.accepted as u64;
        pushed.error.map_or(Ok(()), Err)
    }

    /// Read one chunk of at most `limit` bytes into the buffer.
    fn fill<R: Read>(&mut self, source: &mut R, limit: u64) -> Result<usize, PatchError> {
        let want = usize::try_from(limit).map_or(self.buf.len(), |l| l.min(self.buf.len()));
        loop {
            match source.read(&mut self.buf[..want]) {
                Ok(n) => {
                    self.read += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(PatchError::Io(e)),
            }
        }
    }

    /// Copy source bytes to the sink until `end` source bytes are consumed.
    fn copy_exact<R: Read>(&mut self, source: &mut R, end: u64) -> Result<(), PatchError> {
        while self.read < end {
            let n = self.fill(source, end - self.read)?;
            if n == 0 {
                return Err(self.short_source(end));
            }
            let pushed = push(&mut *self.sink, &self.buf[..n]);
            self.written += pushed.accepted as u64;
            if let Some(error) = pushed.error {
                return Err(error);
            }
        }
        Ok(())
    }

    fn discard_exact<R: Read>(&mut self, source: &mut R, end: u64) -> Result<(), PatchError> {
        while self.read < end {
            if self.fill(source, end - self.read)? == 0 {
                return Err(self.short_source(end));
            }
        }
        Ok(())
    }

    fn copy_to_end<R: Read>(&mut self, source: &mut R) -> Result<(), PatchError> {
        loop {
            let n = self.fill(source, u64::MAX)?;
            if n == 0 {
                return Ok(());
            }
            let pushed = push(&mut *self.sink, &self.buf[..n]);
            self.written += pushed.accepted as u64;
            if let Some(error) = pushed.error {
                return Err(error);
            }
        }
    }

    fn short_source(&self, expected: u64) -> PatchError {
        PatchError::UnexpectedEndOfSource {
            source_offset: self.read,
            expected,
        }
    }
}
