//! Record sources: where the copy loop gets record bytes from

use splatlod_core::{Error, RecordCodec, Result, Schema};
use std::io::{self, Read};

/// Supplies raw records by index
///
/// Callers request indices in strictly ascending order, which lets a stream
/// source serve records in a single forward pass.
pub trait RecordSource {
    fn record(&mut self, index: usize) -> Result<&[u8]>;

    /// Called once after the last requested record
    ///
    /// Fails if the source turns out to hold fewer records than declared.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Forward-only source over a reader positioned at the first body byte
///
/// Unselected records are read through and discarded, so only one record is
/// resident at a time.
pub struct StreamSource<R> {
    reader: R,
    record_width: usize,
    record_count: usize,
    next: usize,
    buffer: Vec<u8>,
}

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R, schema: &Schema) -> Self {
        Self {
            reader,
            record_width: schema.record_width(),
            record_count: schema.record_count(),
            next: 0,
            buffer: vec![0u8; schema.record_width()],
        }
    }

    fn skip(&mut self, records: usize) -> Result<()> {
        if records == 0 {
            return Ok(());
        }
        let bytes = records as u64 * self.record_width as u64;
        let skipped = io::copy(&mut self.reader.by_ref().take(bytes), &mut io::sink())?;
        if skipped < bytes {
            return Err(self.truncated());
        }
        Ok(())
    }

    fn truncated(&self) -> Error {
        Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "source body ends before record {} of {} declared records",
                self.next, self.record_count
            ),
        ))
    }
}

impl<R: Read> RecordSource for StreamSource<R> {
    fn record(&mut self, index: usize) -> Result<&[u8]> {
        if index >= self.record_count {
            return Err(Error::IndexOutOfRange {
                index,
                count: self.record_count,
            });
        }
        if index < self.next {
            return Err(Error::InvalidData(format!(
                "record {} requested after record {}; stream sources are forward-only",
                index,
                self.next - 1
            )));
        }

        self.skip(index - self.next)?;
        self.next = index;
        match self.reader.read_exact(&mut self.buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(self.truncated()),
            Err(e) => return Err(e.into()),
        }
        self.next = index + 1;
        Ok(&self.buffer)
    }

    fn finish(&mut self) -> Result<()> {
        let remaining = self.record_count - self.next;
        self.skip(remaining)?;
        self.next = self.record_count;
        Ok(())
    }
}

/// Random-access source over a buffer holding the whole file
pub struct MappedSource<'a> {
    buffer: &'a [u8],
    codec: RecordCodec,
}

impl<'a> MappedSource<'a> {
    /// Wrap `buffer`, checking that it holds the full declared body
    pub fn new(buffer: &'a [u8], schema: &Schema) -> Result<Self> {
        let expected = schema.file_len();
        let actual = buffer.len() as u64;
        if actual < expected {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "source holds {} bytes but its header declares {} records ({} bytes in total)",
                    actual,
                    schema.record_count(),
                    expected
                ),
            )));
        }
        if actual > expected {
            tracing::warn!(
                "ignoring {} trailing bytes after the declared body",
                actual - expected
            );
        }

        Ok(Self {
            buffer,
            codec: RecordCodec::new(schema),
        })
    }
}

impl RecordSource for MappedSource<'_> {
    fn record(&mut self, index: usize) -> Result<&[u8]> {
        self.codec.read_record(self.buffer, index)
    }
}
