mod config;
mod progress_bar;

use anyhow::Context;
use clap::{Parser, Subcommand};
use progress_bar::BarSink;
use serde::Serialize;
use splatlod_core::{FieldValue, RecordCodec};
use splatlod_io::{lod_levels, read_header, DownsampleOptions, Downsampler, Summary};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Subcommand)]
enum Commands {
    /// Write a uniformly downsampled copy of a PLY file
    Reduce {
        #[arg(value_name = "INPUT")]
        /// The input binary .ply file
        input: PathBuf,

        #[arg(value_name = "KEEP_RATIO")]
        /// Fraction of records to keep, in (0, 1]
        keep_ratio: f64,

        #[arg(value_name = "OUTPUT")]
        /// The output .ply file
        output: PathBuf,
    },

    /// Write one downsampled file per level from a single source
    Lods {
        #[arg(value_name = "INPUT")]
        /// The input binary .ply file
        input: PathBuf,

        #[arg(short, long, value_delimiter = ',', required = true)]
        /// Comma-separated keep ratios, e.g. 0.5,0.25,0.1
        levels: Vec<f64>,

        #[arg(short, long)]
        /// Directory for `<stem>_lod<ratio>.ply` outputs; defaults to the input's directory
        out_dir: Option<PathBuf>,
    },

    /// Print the header layout and the first record of a PLY file
    Inspect {
        #[arg(value_name = "INPUT")]
        /// The input binary .ply file
        input: PathBuf,

        #[arg(long)]
        /// Print the report as JSON
        json: bool,
    },
}

#[derive(Parser)]
#[command(name = "splatlod", version, about, long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    /// Seed the sampler for reproducible output
    seed: Option<u64>,

    #[arg(short, long, global = true)]
    /// Only log warnings and hide the progress bar
    quiet: bool,

    #[arg(long, global = true)]
    /// Always stream the source instead of memory mapping it
    no_mmap: bool,

    #[arg(long, global = true, value_name = "RECORDS")]
    /// Records copied between progress updates
    progress_interval: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<splatlod_core::Error>())
                .map(|error| error.kind().to_string())
                .unwrap_or_else(|| "Error".to_string());
            eprintln!("{}: {:#}", kind, e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::Config::from_env()?;
    let options = apply_overrides(config.downsample_options(), &cli);
    info!("Options: {:?}", options);

    match cli.command {
        Commands::Reduce {
            input,
            keep_ratio,
            output,
        } => {
            let sink = Arc::new(BarSink::new(!cli.quiet));
            let result = Downsampler::new(options)
                .with_sink(sink.clone())
                .run_file(&input, &output, keep_ratio);
            sink.finish();

            let summary = result.with_context(|| format!("failed to downsample {}", input.display()))?;
            print_summary(&output, &summary);
        }
        Commands::Lods {
            input,
            levels,
            out_dir,
        } => {
            let out_dir = out_dir.unwrap_or_else(|| default_out_dir(&input));
            let levels = lod_levels(&out_dir, &input, &levels);

            let sink = Arc::new(BarSink::new(!cli.quiet));
            let result = Downsampler::new(options)
                .with_sink(sink.clone())
                .run_lods(&input, &levels);
            sink.finish();

            let summaries = result.with_context(|| format!("failed to build LODs of {}", input.display()))?;
            for (level, summary) in levels.iter().zip(&summaries) {
                print_summary(&level.path, summary);
            }
        }
        Commands::Inspect { input, json } => {
            let report = inspect(&input).with_context(|| format!("failed to inspect {}", input.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }
        }
    }

    Ok(())
}

/// Command-line flags take precedence over the environment
fn apply_overrides(mut options: DownsampleOptions, cli: &Cli) -> DownsampleOptions {
    if let Some(seed) = cli.seed {
        options = options.with_seed(seed);
    }
    if cli.no_mmap {
        options = options.with_mmap(false);
    }
    if let Some(interval) = cli.progress_interval {
        options = options.with_progress_interval(interval);
    }
    options
}

fn default_out_dir(input: &Path) -> PathBuf {
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn print_summary(output: &Path, summary: &Summary) {
    println!(
        "{}: kept {}/{} records ({} bytes)",
        output.display(),
        summary.retained_count,
        summary.original_count,
        summary.bytes_written
    );
}

#[derive(Debug, Serialize)]
struct InspectReport {
    format: &'static str,
    version: String,
    record_count: usize,
    record_width: usize,
    header_len: u64,
    file_len: u64,
    comments: Vec<String>,
    obj_info: Vec<String>,
    fields: Vec<FieldReport>,
}

#[derive(Debug, Serialize)]
struct FieldReport {
    name: String,
    field_type: String,
    offset: usize,
    first_value: Option<FieldValue>,
}

fn inspect(input: &Path) -> anyhow::Result<InspectReport> {
    let mut reader = BufReader::new(File::open(input)?);
    let header = read_header(&mut reader)?;
    let schema = header.schema();
    let codec = RecordCodec::new(schema);

    let first_record = if schema.record_count() > 0 {
        let mut record = vec![0u8; codec.record_width()];
        reader
            .read_exact(&mut record)
            .context("body ends before the first record")?;
        Some(record)
    } else {
        None
    };

    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut offset = 0;
    for (i, field) in schema.fields().iter().enumerate() {
        let first_value = match &first_record {
            Some(record) => Some(codec.decode_field(record, i)?),
            None => None,
        };
        fields.push(FieldReport {
            name: field.name.clone(),
            field_type: field.field_type.to_string(),
            offset,
            first_value,
        });
        offset += field.byte_width();
    }

    Ok(InspectReport {
        format: header.format().as_str(),
        version: header.version().to_string(),
        record_count: schema.record_count(),
        record_width: schema.record_width(),
        header_len: schema.header_len(),
        file_len: schema.file_len(),
        comments: header.comments().to_vec(),
        obj_info: header.obj_info().to_vec(),
        fields,
    })
}

impl InspectReport {
    fn print(&self) {
        println!("format:       {} {}", self.format, self.version);
        println!("records:      {}", self.record_count);
        println!("record width: {} bytes", self.record_width);
        println!("header:       {} bytes", self.header_len);
        println!("expected len: {} bytes", self.file_len);
        for comment in &self.comments {
            println!("comment:      {}", comment);
        }
        for info in &self.obj_info {
            println!("obj_info:     {}", info);
        }
        println!();
        println!("{:<6} {:<24} {:<8} first record", "offset", "field", "type");
        for field in &self.fields {
            let value = field
                .first_value
                .map(|v| v.as_f64().to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("{:<6} {:<24} {:<8} {}", field.offset, field.name, field.field_type, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_reduce() {
        let parsed = cli(&["splatlod", "--seed", "7", "reduce", "in.ply", "0.25", "out.ply"]);
        assert_eq!(parsed.seed, Some(7));
        match parsed.command {
            Commands::Reduce { keep_ratio, .. } => assert_eq!(keep_ratio, 0.25),
            _ => panic!("expected reduce"),
        }
    }

    #[test]
    fn test_parse_lods() {
        let parsed = cli(&["splatlod", "lods", "scene.ply", "--levels", "0.5,0.25", "--no-mmap"]);
        assert!(parsed.no_mmap);
        match parsed.command {
            Commands::Lods { levels, out_dir, .. } => {
                assert_eq!(levels, vec![0.5, 0.25]);
                assert_eq!(out_dir, None);
            }
            _ => panic!("expected lods"),
        }
        assert!(Cli::try_parse_from(["splatlod", "lods", "scene.ply"]).is_err());
    }

    #[test]
    fn test_overrides() {
        let parsed = cli(&["splatlod", "--progress-interval", "0", "--no-mmap", "inspect", "a.ply"]);
        let options = apply_overrides(DownsampleOptions::default().with_seed(1), &parsed);
        assert_eq!(options.progress_interval, 1);
        assert!(!options.use_mmap);
        assert_eq!(options.seed, Some(1));
    }

    #[test]
    fn test_default_out_dir() {
        assert_eq!(default_out_dir(Path::new("scene.ply")), PathBuf::from("."));
        assert_eq!(default_out_dir(Path::new("data/scene.ply")), PathBuf::from("data"));
    }

    #[test]
    fn test_inspect_report() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"ply\nformat binary_little_endian 1.0\ncomment test\nelement vertex 2\nproperty float x\nproperty uchar opacity\nend_header\n")
            .unwrap();
        file.write_all(&1.5f32.to_le_bytes()).unwrap();
        file.write_all(&[200, 0, 0, 0, 0, 0]).unwrap();
        file.flush().unwrap();

        let report = inspect(file.path()).unwrap();
        assert_eq!(report.record_count, 2);
        assert_eq!(report.record_width, 5);
        assert_eq!(report.comments, ["test"]);
        assert_eq!(report.fields[1].offset, 4);
        assert_eq!(report.fields[0].first_value, Some(FieldValue::Float32(1.5)));
        assert_eq!(report.fields[1].first_value, Some(FieldValue::UInt8(200)));
    }
}
