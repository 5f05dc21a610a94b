//! Test modules for splatlod-io
//!
//! Scenario tests for in-memory and file-level downsampling. The fixtures
//! build splat-like PLY files whose `x` field doubles as a unique record id,
//! so every output record can be traced back to its source record.

pub mod downsample_tests;

use byteorder::{BigEndian, ByteOrder as _, LittleEndian, WriteBytesExt};
use std::io::Cursor;

use crate::header::read_header;
use crate::progress::{Progress, ProgressSink, Stage};
use std::sync::Mutex;

/// Width of one fixture record: float x, float y, uchar opacity
pub const RECORD_WIDTH: usize = 9;

pub fn fixture_header(count: usize, format: &str) -> String {
    format!(
        "ply\nformat {} 1.0\ncomment generated by splatlod tests\nelement vertex {}\nproperty float x\nproperty float y\nproperty uchar opacity\nend_header\n",
        format, count
    )
}

/// Little-endian PLY with `count` records; record `i` has `x == i`
pub fn fixture_ply(count: usize) -> Vec<u8> {
    let mut bytes = fixture_header(count, "binary_little_endian").into_bytes();
    for i in 0..count {
        bytes.write_f32::<LittleEndian>(i as f32).unwrap();
        bytes.write_f32::<LittleEndian>(i as f32 * 0.5).unwrap();
        bytes.write_u8((i % 251) as u8).unwrap();
    }
    bytes
}

pub fn fixture_ply_big_endian(count: usize) -> Vec<u8> {
    let mut bytes = fixture_header(count, "binary_big_endian").into_bytes();
    for i in 0..count {
        bytes.write_f32::<BigEndian>(i as f32).unwrap();
        bytes.write_f32::<BigEndian>(-(i as f32)).unwrap();
        bytes.write_u8(200).unwrap();
    }
    bytes
}

/// Record `index` of a fixture produced by [`fixture_ply`]
pub fn source_record(source: &[u8], index: usize) -> &[u8] {
    let header = read_header(&mut Cursor::new(source)).unwrap();
    let start = header.len() as usize + index * RECORD_WIDTH;
    &source[start..start + RECORD_WIDTH]
}

/// Ids (the `x` field) of every record in a little-endian fixture output
pub fn output_ids(output: &[u8]) -> Vec<usize> {
    let mut cursor = Cursor::new(output);
    let header = read_header(&mut cursor).unwrap();
    let body = &output[header.len() as usize..];
    assert_eq!(body.len(), header.schema().record_count() * RECORD_WIDTH);
    body.chunks_exact(RECORD_WIDTH)
        .map(|record| LittleEndian::read_f32(&record[..4]) as usize)
        .collect()
}

/// Sink that records every event it receives
#[derive(Default)]
pub struct RecordingSink {
    pub stages: Mutex<Vec<Stage>>,
    pub progress: Mutex<Vec<Progress>>,
}

impl ProgressSink for RecordingSink {
    fn stage_changed(&self, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }

    fn progress(&self, progress: Progress) {
        self.progress.lock().unwrap().push(progress);
    }
}
