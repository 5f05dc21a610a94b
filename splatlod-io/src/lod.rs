//! File-level downsampling and LOD pyramid generation
//!
//! Output files are staged in a temporary file next to the destination and
//! renamed into place only after the copy has been verified, so a failed or
//! cancelled run never leaves a partial file at the destination path.

use crate::downsample::{Downsampler, Summary};
use crate::mmap::MmapReader;
use crate::options::DownsampleOptions;
use crate::source::{MappedSource, StreamSource};
use splatlod_algorithms::validate_keep_ratio;
use splatlod_core::{Error, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

impl Downsampler {
    /// Downsample the PLY file at `input` into `output`
    ///
    /// The destination is created (or replaced) only when the run succeeds.
    pub fn run_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &mut self,
        input: P,
        output: Q,
        keep_ratio: f64,
    ) -> Result<Summary> {
        let result = self.run_file_inner(input.as_ref(), output.as_ref(), keep_ratio);
        self.finish(result)
    }

    fn run_file_inner(&mut self, input: &Path, output: &Path, keep_ratio: f64) -> Result<Summary> {
        validate_keep_ratio(keep_ratio)?;
        info!("Downsampling {} -> {}", input.display(), output.display());

        let file = File::open(input)?;
        let mapped = if self.options().use_mmap {
            MmapReader::new(&file)?
        } else {
            None
        };

        match mapped {
            Some(map) => {
                debug!("Reading {} through a memory map ({} bytes)", input.display(), map.len());
                let buffer = map.as_slice();
                let mut reader = buffer;
                let plan = self.plan(&mut reader, keep_ratio)?;
                let mut records = MappedSource::new(buffer, plan.header().schema())?;
                self.write_staged(output, |this, dest| this.execute(&plan, &mut records, dest))
            }
            None => {
                let mut reader = BufReader::with_capacity(self.options().io_buffer_capacity(), file);
                let plan = self.plan(&mut reader, keep_ratio)?;
                let mut records = StreamSource::new(reader, plan.header().schema());
                self.write_staged(output, |this, dest| this.execute(&plan, &mut records, dest))
            }
        }
    }

    /// Run `write` against a temporary file and move it to `output` on success
    fn write_staged<F>(&self, output: &Path, write: F) -> Result<Summary>
    where
        F: FnOnce(&Self, &mut BufWriter<&File>) -> Result<Summary>,
    {
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let staged = tempfile::Builder::new()
            .prefix(".splatlod-")
            .suffix(".ply.tmp")
            .tempfile_in(dir)?;

        let summary = {
            let mut writer = BufWriter::with_capacity(self.options().io_buffer_capacity(), staged.as_file());
            let summary = write(self, &mut writer)?;
            writer.flush()?;
            summary
        };

        let on_disk = staged.as_file().metadata()?.len();
        if on_disk != summary.bytes_written {
            return Err(Error::InconsistentOutput {
                expected: summary.bytes_written,
                actual: on_disk,
            });
        }

        staged.persist(output).map_err(|e| Error::Io(e.error))?;
        debug!("Wrote {} ({} bytes)", output.display(), on_disk);
        Ok(summary)
    }
}

/// Downsample `input` into `output` with the given options
pub fn downsample_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    keep_ratio: f64,
    options: &DownsampleOptions,
) -> Result<Summary> {
    Downsampler::new(options.clone()).run_file(input, output, keep_ratio)
}

/// One level of a LOD pyramid
#[derive(Debug, Clone, PartialEq)]
pub struct LodLevel {
    pub keep_ratio: f64,
    pub path: PathBuf,
}

impl LodLevel {
    pub fn new<P: Into<PathBuf>>(keep_ratio: f64, path: P) -> Self {
        Self {
            keep_ratio,
            path: path.into(),
        }
    }
}

/// Conventional output path for a LOD level: `<out_dir>/<stem>_lod<ratio>.ply`
///
/// ```rust
/// use splatlod_io::lod_output_path;
/// use std::path::Path;
///
/// let path = lod_output_path("out", "scenes/garden.ply", 0.25);
/// assert_eq!(path, Path::new("out/garden_lod0.25.ply"));
/// ```
pub fn lod_output_path<D: AsRef<Path>, P: AsRef<Path>>(out_dir: D, input: P, keep_ratio: f64) -> PathBuf {
    let stem = input
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "points".to_string());
    out_dir
        .as_ref()
        .join(format!("{}_lod{}.ply", stem, keep_ratio))
}

/// Build levels for `ratios` using [`lod_output_path`]
pub fn lod_levels<D: AsRef<Path>, P: AsRef<Path>>(out_dir: D, input: P, ratios: &[f64]) -> Vec<LodLevel> {
    ratios
        .iter()
        .map(|&ratio| LodLevel::new(ratio, lod_output_path(&out_dir, &input, ratio)))
        .collect()
}

/// Write one downsampled file per level from a single source
///
/// All ratios are validated before any file is written. Each level is drawn
/// independently from the full source.
pub fn generate_lods<P: AsRef<Path>>(
    input: P,
    levels: &[LodLevel],
    options: &DownsampleOptions,
) -> Result<Vec<Summary>> {
    Downsampler::new(options.clone()).run_lods(input, levels)
}

impl Downsampler {
    /// [`generate_lods`] reporting every level to this downsampler's sink
    pub fn run_lods<P: AsRef<Path>>(&mut self, input: P, levels: &[LodLevel]) -> Result<Vec<Summary>> {
        for level in levels {
            validate_keep_ratio(level.keep_ratio)?;
        }

        let input = input.as_ref();
        let mut summaries = Vec::with_capacity(levels.len());
        for (i, level) in levels.iter().enumerate() {
            info!(
                "LOD {}/{}: keep {:.1}% -> {}",
                i + 1,
                levels.len(),
                level.keep_ratio * 100.0,
                level.path.display()
            );
            if let Some(parent) = level.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            summaries.push(self.run_file(input, &level.path, level.keep_ratio)?);
        }
        Ok(summaries)
    }
}
