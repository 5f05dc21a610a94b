//! In-memory downsampling scenarios
//!
//! These tests drive [`Downsampler::run`] and [`Downsampler::run_mapped`]
//! over fixture buffers and check that retained records are exact copies of
//! their source records, in source order.

use super::{fixture_ply, fixture_ply_big_endian, output_ids, source_record, RecordingSink, RECORD_WIDTH};
use crate::downsample::{downsample, Downsampler, Summary};
use crate::header::read_header;
use crate::options::DownsampleOptions;
use crate::progress::{CancelFlag, Progress, ProgressSink, ProgressTracker, Stage};
use byteorder::{BigEndian, ByteOrder};
use splatlod_core::{Error, ErrorKind};
use std::io::Cursor;
use std::sync::Arc;

fn seeded(seed: u64) -> Downsampler {
    Downsampler::new(DownsampleOptions::default().with_seed(seed))
}

#[test]
fn test_keeps_tenth_of_records() {
    let source = fixture_ply(1000);
    let mut output = Vec::new();

    let summary = seeded(7).run(&source[..], &mut output, 0.1).unwrap();
    assert_eq!(summary.original_count, 1000);
    assert_eq!(summary.retained_count, 100);
    assert_eq!(summary.record_width, RECORD_WIDTH);
    assert_eq!(summary.bytes_written, output.len() as u64);

    let header = read_header(&mut Cursor::new(&output[..])).unwrap();
    assert_eq!(header.schema().record_count(), 100);
    assert_eq!(output.len() - header.len() as usize, 900);
    assert_eq!(header.comments(), ["generated by splatlod tests"]);

    let ids = output_ids(&output);
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "records must stay in source order");
    let body = &output[header.len() as usize..];
    for (record, id) in body.chunks_exact(RECORD_WIDTH).zip(&ids) {
        assert_eq!(record, source_record(&source, *id));
    }
}

#[test]
fn test_full_ratio_is_byte_identical() {
    let source = fixture_ply(257);
    let mut output = Vec::new();
    let summary = seeded(1).run(&source[..], &mut output, 1.0).unwrap();

    assert_eq!(summary.retained_count, 257);
    assert_eq!(output, source);
}

#[test]
fn test_rounding_of_retained_count() {
    let mut output = Vec::new();
    let summary = seeded(3).run(&fixture_ply(1000)[..], &mut output, 0.333).unwrap();
    assert_eq!(summary.retained_count, 333);

    output.clear();
    let summary = seeded(3).run(&fixture_ply(3)[..], &mut output, 0.5).unwrap();
    assert_eq!(summary.retained_count, 2);
    assert_eq!(output_ids(&output).len(), 2);
}

#[test]
fn test_ratio_rounding_to_zero_writes_empty_body() {
    let source = fixture_ply(10);
    let mut output = Vec::new();
    let summary = seeded(5).run(&source[..], &mut output, 0.01).unwrap();

    assert_eq!(summary.retained_count, 0);
    let header = read_header(&mut Cursor::new(&output[..])).unwrap();
    assert_eq!(header.schema().record_count(), 0);
    assert_eq!(output.len() as u64, header.len());
    assert!(String::from_utf8_lossy(&output).contains("element vertex 0\n"));
}

#[test]
fn test_empty_source() {
    let source = fixture_ply(0);
    let mut output = Vec::new();
    let summary = downsample(&source[..], &mut output, 0.5).unwrap();

    assert_eq!(summary.original_count, 0);
    assert_eq!(summary.retained_count, 0);
    assert_eq!(output, source);
}

#[test]
fn test_invalid_ratio_writes_nothing() {
    let source = fixture_ply(10);
    for ratio in [0.0, -0.5, 1.01, f64::NAN] {
        let mut output = Vec::new();
        let err = seeded(1).run(&source[..], &mut output, ratio).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRatio);
        assert!(output.is_empty());
    }
}

#[test]
fn test_header_errors_write_nothing() {
    let cases: [(&[u8], ErrorKind); 4] = [
        (b"not a ply file\n", ErrorKind::MalformedHeader),
        (b"ply\nformat binary_little_endian 1.0\nelement vertex 2\nproperty float x\n", ErrorKind::MalformedHeader),
        (
            b"ply\nformat binary_little_endian 1.0\nelement vertex 1\nproperty float x\nelement face 1\nproperty list uchar int vertex_indices\nend_header\n",
            ErrorKind::UnsupportedElementBlock,
        ),
        (
            b"ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nend_header\n1.0\n",
            ErrorKind::UnsupportedFormat,
        ),
    ];

    for (source, kind) in cases {
        let mut output = Vec::new();
        let err = seeded(1).run(source, &mut output, 0.5).unwrap_err();
        assert_eq!(err.kind(), kind, "unexpected error {}", err);
        assert!(output.is_empty());
    }
}

#[test]
fn test_truncated_body_is_io_failure() {
    let mut source = fixture_ply(100);
    source.truncate(source.len() - 5);

    let mut output = Vec::new();
    let err = seeded(2).run(&source[..], &mut output, 1.0).unwrap_err();
    assert!(matches!(err, Error::Io(_)));

    let err = seeded(2).run_mapped(&source, Vec::new(), 1.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
}

#[test]
fn test_truncated_last_record_fails_on_both_paths() {
    let mut source = fixture_ply(1000);
    source.truncate(source.len() - RECORD_WIDTH);

    let mut output = Vec::new();
    let err = seeded(7).run(&source[..], &mut output, 0.1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);

    let err = seeded(7).run_mapped(&source, Vec::new(), 0.1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
}

#[test]
fn test_overflowing_count_is_malformed() {
    let source = b"ply\nformat binary_little_endian 1.0\nelement vertex 9223372036854775807\nproperty float x\nend_header\n";
    let err = seeded(1).run_mapped(source, Vec::new(), 1e-18).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedHeader);

    let err = seeded(1).run(&source[..], Vec::new(), 1e-18).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedHeader);
}

#[test]
fn test_big_endian_records_copied_verbatim() {
    let source = fixture_ply_big_endian(10);
    let mut output = Vec::new();
    let summary = seeded(11).run(&source[..], &mut output, 0.5).unwrap();
    assert_eq!(summary.retained_count, 5);

    let header = read_header(&mut Cursor::new(&output[..])).unwrap();
    assert!(String::from_utf8_lossy(&output[..header.len() as usize]).contains("format binary_big_endian 1.0\n"));
    for record in output[header.len() as usize..].chunks_exact(RECORD_WIDTH) {
        let x = BigEndian::read_f32(&record[0..4]);
        let y = BigEndian::read_f32(&record[4..8]);
        assert_eq!(y, -x);
        assert_eq!(record[8], 200);
    }
}

#[test]
fn test_mapped_and_streamed_runs_agree() {
    let source = fixture_ply(5000);
    let mut streamed = Vec::new();
    let mut mapped = Vec::new();

    seeded(42).run(&source[..], &mut streamed, 0.37).unwrap();
    seeded(42).run_mapped(&source, &mut mapped, 0.37).unwrap();
    assert_eq!(streamed, mapped);
    assert_eq!(output_ids(&streamed).len(), 1850);
}

#[test]
fn test_same_seed_same_output() {
    let source = fixture_ply(300);
    let mut first = Vec::new();
    let mut second = Vec::new();
    seeded(99).run(&source[..], &mut first, 0.25).unwrap();
    seeded(99).run(&source[..], &mut second, 0.25).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_stage_sequence() {
    let sink = Arc::new(RecordingSink::default());
    let mut downsampler = seeded(4).with_sink(sink.clone());
    downsampler.run(&fixture_ply(50)[..], Vec::new(), 0.5).unwrap();

    assert_eq!(
        *sink.stages.lock().unwrap(),
        vec![
            Stage::ParsingHeader,
            Stage::Sampling,
            Stage::WritingHeader,
            Stage::Copying,
            Stage::Completed,
        ]
    );
}

#[test]
fn test_failure_stage_sequence() {
    let sink = Arc::new(RecordingSink::default());
    let mut downsampler = seeded(4).with_sink(sink.clone());
    let _ = downsampler.run(&b"ply\nformat binary_little_endian 1.0\n"[..], Vec::new(), 0.5);

    assert_eq!(
        *sink.stages.lock().unwrap(),
        vec![Stage::ParsingHeader, Stage::Errored(ErrorKind::MalformedHeader)]
    );
    assert!(sink.progress.lock().unwrap().is_empty());
}

#[test]
fn test_progress_reported_at_interval() {
    let sink = Arc::new(RecordingSink::default());
    let options = DownsampleOptions::default().with_seed(8).with_progress_interval(10);
    let mut downsampler = Downsampler::new(options).with_sink(sink.clone());
    downsampler.run(&fixture_ply(1000)[..], Vec::new(), 0.1).unwrap();

    let progress = sink.progress.lock().unwrap();
    assert_eq!(progress.len(), 11);
    assert_eq!(progress[0], Progress { completed: 0, total: 100 });
    assert_eq!(progress[1], Progress { completed: 10, total: 100 });
    assert_eq!(progress[10], Progress { completed: 100, total: 100 });
    assert!(progress.windows(2).all(|w| w[0].completed < w[1].completed));
}

#[test]
fn test_cancelled_run() {
    let tracker = ProgressTracker::new();
    let flag = CancelFlag::new();
    flag.cancel();

    let mut downsampler = seeded(6)
        .with_sink(Arc::new(tracker.clone()))
        .with_cancel_flag(flag);
    let err = downsampler.run(&fixture_ply(100)[..], Vec::new(), 0.5).unwrap_err();

    assert!(matches!(err, Error::Cancelled { completed: 0, total: 50 }));
    assert_eq!(tracker.snapshot().stage, Stage::Errored(ErrorKind::Cancelled));
}

#[test]
fn test_tracker_ends_completed() {
    let tracker = ProgressTracker::new();
    let mut downsampler = seeded(6).with_sink(Arc::new(tracker.clone()));
    downsampler.run(&fixture_ply(200)[..], Vec::new(), 0.5).unwrap();

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.stage, Stage::Completed);
    assert_eq!(snapshot.completed, 100);
    assert_eq!(snapshot.percent(), 100.0);
    assert_eq!(snapshot.message.as_deref(), Some("Kept 100/200 records"));
}

#[test]
fn test_status_serializes() {
    let summary = Summary {
        original_count: 10,
        retained_count: 5,
        record_width: 9,
        bytes_written: 145,
    };
    let value = serde_json::to_value(summary).unwrap();
    assert_eq!(value["retained_count"], 5);

    assert_eq!(serde_json::to_string(&Stage::Copying).unwrap(), r#"{"stage":"copying"}"#);
    assert_eq!(
        serde_json::to_string(&Stage::Errored(ErrorKind::Cancelled)).unwrap(),
        r#"{"stage":"errored","error":"cancelled"}"#
    );
}

#[test]
fn test_sink_trait_object_forwarding() {
    let tracker = Arc::new(ProgressTracker::new());
    let sink: Arc<dyn ProgressSink> = tracker.clone();
    sink.stage_changed(Stage::Sampling);
    assert_eq!(tracker.snapshot().stage, Stage::Sampling);
}

#[test]
fn test_plan_previews_output() {
    let source = fixture_ply(40);
    let mut reader = &source[..];
    let plan = seeded(1).plan(&mut reader, 0.25).unwrap();

    assert_eq!(plan.header().schema().record_count(), 40);
    assert_eq!(plan.retention().len(), 10);
    assert_eq!(plan.output_header().schema().record_count(), 10);
    assert_eq!(reader.len(), 40 * RECORD_WIDTH);
}
