//! Attribute-preserving downsampling of binary PLY point clouds
//!
//! A run parses the header, draws the retention set, writes the rewritten
//! header and then copies the retained records verbatim in ascending index
//! order. Field values are never decoded, so every attribute of a retained
//! record (including fields this crate has never heard of) survives byte for
//! byte.
//!
//! The destination is written in one forward pass. Because the retained
//! count is known once sampling finishes, the header goes out before the
//! body and no seeking is ever needed.

use crate::header::{read_header, PlyHeader};
use crate::options::DownsampleOptions;
use crate::progress::{CancelFlag, Progress, ProgressSink, Stage};
use crate::source::{MappedSource, RecordSource, StreamSource};
use serde::{Deserialize, Serialize};
use splatlod_algorithms::{RetentionSet, UniformSampler};
use splatlod_core::{Error, RecordCodec, Result};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub original_count: usize,
    pub retained_count: usize,
    pub record_width: usize,
    pub bytes_written: u64,
}

/// Parsed source header plus the records selected from it
#[derive(Debug, Clone)]
pub struct Plan {
    header: PlyHeader,
    retention: RetentionSet,
}

impl Plan {
    pub fn header(&self) -> &PlyHeader {
        &self.header
    }

    pub fn retention(&self) -> &RetentionSet {
        &self.retention
    }

    /// Header of the file this plan produces
    pub fn output_header(&self) -> PlyHeader {
        self.header.with_record_count(self.retention.len())
    }
}

/// Configurable downsampler
///
/// # Example
/// ```rust
/// use splatlod_io::{Downsampler, DownsampleOptions};
///
/// let source = b"ply\nformat binary_little_endian 1.0\nelement vertex 4\nproperty uchar v\nend_header\n\x00\x01\x02\x03".to_vec();
/// let mut output = Vec::new();
///
/// let summary = Downsampler::new(DownsampleOptions::default().with_seed(1))
///     .run(&source[..], &mut output, 0.5)
///     .unwrap();
/// assert_eq!(summary.retained_count, 2);
/// ```
pub struct Downsampler {
    options: DownsampleOptions,
    sampler: UniformSampler,
    sink: Option<Arc<dyn ProgressSink>>,
    cancel: Option<CancelFlag>,
}

impl Downsampler {
    pub fn new(options: DownsampleOptions) -> Self {
        let sampler = UniformSampler::from_seed_option(options.seed);
        Self {
            options,
            sampler,
            sink: None,
            cancel: None,
        }
    }

    /// Report stage changes and copy progress to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Abort with [`Error::Cancelled`] once `flag` is set
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn options(&self) -> &DownsampleOptions {
        &self.options
    }

    /// Downsample a PLY stream into `dest`
    ///
    /// Header and ratio errors are raised before anything is written to `dest`.
    /// Unselected records are read and discarded, so `source` need not be
    /// seekable.
    pub fn run<R: Read, W: Write>(&mut self, source: R, dest: W, keep_ratio: f64) -> Result<Summary> {
        let result = self.run_stream(source, dest, keep_ratio);
        self.finish(result)
    }

    /// Downsample a PLY file held entirely in `buffer` (e.g. a memory map)
    pub fn run_mapped<W: Write>(&mut self, buffer: &[u8], dest: W, keep_ratio: f64) -> Result<Summary> {
        let result = self.run_buffer(buffer, dest, keep_ratio);
        self.finish(result)
    }

    fn run_stream<R: Read, W: Write>(&mut self, source: R, dest: W, keep_ratio: f64) -> Result<Summary> {
        let mut reader = BufReader::with_capacity(self.options.io_buffer_capacity(), source);
        let plan = self.plan(&mut reader, keep_ratio)?;
        let mut records = StreamSource::new(reader, plan.header().schema());
        self.execute(&plan, &mut records, dest)
    }

    fn run_buffer<W: Write>(&mut self, buffer: &[u8], dest: W, keep_ratio: f64) -> Result<Summary> {
        let mut reader = buffer;
        let plan = self.plan(&mut reader, keep_ratio)?;
        let mut records = MappedSource::new(buffer, plan.header().schema())?;
        self.execute(&plan, &mut records, dest)
    }

    /// Parse the header and select the records to keep; writes nothing
    ///
    /// `reader` is left at the first body byte.
    pub fn plan<R: BufRead>(&mut self, reader: &mut R, keep_ratio: f64) -> Result<Plan> {
        self.stage(Stage::ParsingHeader);
        let header = read_header(reader)?;
        let schema = header.schema();
        info!(
            "Parsed header: {} records of {} bytes ({} fields, {})",
            schema.record_count(),
            schema.record_width(),
            schema.fields().len(),
            header.format().as_str()
        );

        self.stage(Stage::Sampling);
        let retention = self.sampler.select(schema.record_count(), keep_ratio)?;
        info!(
            "Keeping {} of {} records ({:.1}%)",
            retention.len(),
            schema.record_count(),
            keep_ratio * 100.0
        );

        Ok(Plan { header, retention })
    }

    /// Write the output header and copy the planned records from `source`
    pub(crate) fn execute<S: RecordSource, W: Write>(
        &self,
        plan: &Plan,
        source: &mut S,
        dest: W,
    ) -> Result<Summary> {
        let schema = plan.header.schema();
        let codec = RecordCodec::new(schema);
        let total = plan.retention.len();
        let mut dest = CountingWriter::new(dest);

        self.stage(Stage::WritingHeader);
        let header_len = plan.header.write_to(&mut dest, total)?;

        self.stage(Stage::Copying);
        self.report(Progress { completed: 0, total });
        let interval = self.options.report_interval();

        for (copied, index) in plan.retention.iter().enumerate() {
            if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
                return Err(Error::Cancelled {
                    completed: copied,
                    total,
                });
            }

            let record = source.record(index)?;
            codec.write_record(&mut dest, record)?;

            let completed = copied + 1;
            if completed % interval == 0 && completed < total {
                debug!("Copied {}/{} records", completed, total);
                self.report(Progress { completed, total });
            }
        }
        source.finish()?;
        dest.flush()?;
        self.report(Progress { completed: total, total });

        let expected = header_len + total as u64 * codec.record_width() as u64;
        if dest.written() != expected {
            return Err(Error::InconsistentOutput {
                expected,
                actual: dest.written(),
            });
        }

        Ok(Summary {
            original_count: schema.record_count(),
            retained_count: total,
            record_width: codec.record_width(),
            bytes_written: dest.written(),
        })
    }

    /// Emit the terminal event for `result`
    pub(crate) fn finish(&self, result: Result<Summary>) -> Result<Summary> {
        match &result {
            Ok(summary) => {
                info!(
                    "Downsample complete: {}/{} records, {} bytes written",
                    summary.retained_count, summary.original_count, summary.bytes_written
                );
                if let Some(sink) = &self.sink {
                    sink.completed(summary);
                }
            }
            Err(e) => {
                tracing::error!("Downsample failed ({}): {}", e.kind(), e);
                if let Some(sink) = &self.sink {
                    sink.failed(e);
                }
            }
        }
        result
    }

    pub(crate) fn stage(&self, stage: Stage) {
        debug!("Stage: {:?}", stage);
        if let Some(sink) = &self.sink {
            sink.stage_changed(stage);
        }
    }

    fn report(&self, progress: Progress) {
        if let Some(sink) = &self.sink {
            sink.progress(progress);
        }
    }
}

/// Downsample a PLY stream with default options
pub fn downsample<R: Read, W: Write>(source: R, dest: W, keep_ratio: f64) -> Result<Summary> {
    Downsampler::new(DownsampleOptions::default()).run(source, dest, keep_ratio)
}

/// Writer that counts the bytes passed through it
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    fn written(&self) -> u64 {
        self.written
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
