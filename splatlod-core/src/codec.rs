//! Fixed-width record codec
//!
//! Once the schema fixes the record width, a record is an opaque byte span:
//! the downsampling path only locates, reads and appends spans and never
//! interprets field values. Typed access ([`RecordCodec::decode_field`] and
//! [`RecordCodec::encode_field`]) is available for inspection and tooling.

use crate::schema::{ByteOrder, FieldType, Schema};
use crate::{Error, Result};
use byteorder::{BigEndian, ByteOrder as Endian, LittleEndian};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// A single decoded field value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Float32(f32),
    Float64(f64),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Int8(_) => FieldType::Int8,
            FieldValue::UInt8(_) => FieldType::UInt8,
            FieldValue::Int16(_) => FieldType::Int16,
            FieldValue::UInt16(_) => FieldType::UInt16,
            FieldValue::Int32(_) => FieldType::Int32,
            FieldValue::UInt32(_) => FieldType::UInt32,
            FieldValue::Float32(_) => FieldType::Float32,
            FieldValue::Float64(_) => FieldType::Float64,
        }
    }

    /// Widen to f64
    pub fn as_f64(&self) -> f64 {
        match *self {
            FieldValue::Int8(v) => v as f64,
            FieldValue::UInt8(v) => v as f64,
            FieldValue::Int16(v) => v as f64,
            FieldValue::UInt16(v) => v as f64,
            FieldValue::Int32(v) => v as f64,
            FieldValue::UInt32(v) => v as f64,
            FieldValue::Float32(v) => v as f64,
            FieldValue::Float64(v) => v,
        }
    }
}

/// Locates, reads and writes records of one schema
#[derive(Debug, Clone)]
pub struct RecordCodec {
    record_width: usize,
    record_count: usize,
    body_offset: u64,
    byte_order: ByteOrder,
    // (offset inside record, type) per field, in schema order
    fields: Vec<(usize, FieldType)>,
}

impl RecordCodec {
    pub fn new(schema: &Schema) -> Self {
        let mut offset = 0;
        let fields = schema
            .fields()
            .iter()
            .map(|field| {
                let entry = (offset, field.field_type);
                offset += field.byte_width();
                entry
            })
            .collect();

        Self {
            record_width: schema.record_width(),
            record_count: schema.record_count(),
            body_offset: schema.header_len(),
            byte_order: schema.byte_order(),
            fields,
        }
    }

    pub fn record_width(&self) -> usize {
        self.record_width
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Absolute byte offset of record `index` in the source file
    pub fn record_offset(&self, index: usize) -> Result<u64> {
        self.check_index(index)?;
        Ok(self.body_offset + index as u64 * self.record_width as u64)
    }

    /// Borrow record `index` from a buffer holding the whole file
    pub fn read_record<'a>(&self, buffer: &'a [u8], index: usize) -> Result<&'a [u8]> {
        let start = self.record_offset(index)?;
        let end = start + self.record_width as u64;
        if end > buffer.len() as u64 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "record {} ends at byte {} but the source holds {} bytes",
                    index,
                    end,
                    buffer.len()
                ),
            )));
        }
        // end fits in usize because it is bounded by buffer.len()
        Ok(&buffer[start as usize..end as usize])
    }

    /// Append one raw record verbatim
    pub fn write_record<W: Write + ?Sized>(&self, dest: &mut W, raw: &[u8]) -> Result<()> {
        if raw.len() != self.record_width {
            return Err(Error::InvalidData(format!(
                "record span is {} bytes, schema requires {}",
                raw.len(),
                self.record_width
            )));
        }
        dest.write_all(raw)?;
        Ok(())
    }

    /// Decode field `field_index` of a single record span
    pub fn decode_field(&self, record: &[u8], field_index: usize) -> Result<FieldValue> {
        let (offset, field_type) = self.field_slot(record, field_index)?;
        let bytes = &record[offset..offset + field_type.byte_width()];
        Ok(match self.byte_order {
            ByteOrder::Little => decode_value::<LittleEndian>(field_type, bytes),
            ByteOrder::Big => decode_value::<BigEndian>(field_type, bytes),
        })
    }

    /// Overwrite field `field_index` of a single record span
    pub fn encode_field(&self, record: &mut [u8], field_index: usize, value: FieldValue) -> Result<()> {
        let (offset, field_type) = self.field_slot(record, field_index)?;
        if value.field_type() != field_type {
            return Err(Error::InvalidData(format!(
                "field {} is {}, got a {} value",
                field_index,
                field_type,
                value.field_type()
            )));
        }
        let bytes = &mut record[offset..offset + field_type.byte_width()];
        match self.byte_order {
            ByteOrder::Little => encode_value::<LittleEndian>(value, bytes),
            ByteOrder::Big => encode_value::<BigEndian>(value, bytes),
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.record_count {
            return Err(Error::IndexOutOfRange {
                index,
                count: self.record_count,
            });
        }
        Ok(())
    }

    fn field_slot(&self, record: &[u8], field_index: usize) -> Result<(usize, FieldType)> {
        if record.len() != self.record_width {
            return Err(Error::InvalidData(format!(
                "record span is {} bytes, schema requires {}",
                record.len(),
                self.record_width
            )));
        }
        self.fields.get(field_index).copied().ok_or_else(|| {
            Error::InvalidData(format!(
                "field index {} out of range for {} fields",
                field_index,
                self.fields.len()
            ))
        })
    }
}

fn decode_value<E: Endian>(field_type: FieldType, bytes: &[u8]) -> FieldValue {
    match field_type {
        FieldType::Int8 => FieldValue::Int8(bytes[0] as i8),
        FieldType::UInt8 => FieldValue::UInt8(bytes[0]),
        FieldType::Int16 => FieldValue::Int16(E::read_i16(bytes)),
        FieldType::UInt16 => FieldValue::UInt16(E::read_u16(bytes)),
        FieldType::Int32 => FieldValue::Int32(E::read_i32(bytes)),
        FieldType::UInt32 => FieldValue::UInt32(E::read_u32(bytes)),
        FieldType::Float32 => FieldValue::Float32(E::read_f32(bytes)),
        FieldType::Float64 => FieldValue::Float64(E::read_f64(bytes)),
    }
}

fn encode_value<E: Endian>(value: FieldValue, bytes: &mut [u8]) {
    match value {
        FieldValue::Int8(v) => bytes[0] = v as u8,
        FieldValue::UInt8(v) => bytes[0] = v,
        FieldValue::Int16(v) => E::write_i16(bytes, v),
        FieldValue::UInt16(v) => E::write_u16(bytes, v),
        FieldValue::Int32(v) => E::write_i32(bytes, v),
        FieldValue::UInt32(v) => E::write_u32(bytes, v),
        FieldValue::Float32(v) => E::write_f32(bytes, v),
        FieldValue::Float64(v) => E::write_f64(bytes, v),
    }
}
