//! Record schema: typed field descriptors and the layout they imply

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Scalar field types a record may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl FieldType {
    /// Canonical size of one value in bytes
    pub fn byte_width(self) -> usize {
        match self {
            FieldType::Int8 | FieldType::UInt8 => 1,
            FieldType::Int16 | FieldType::UInt16 => 2,
            FieldType::Int32 | FieldType::UInt32 | FieldType::Float32 => 4,
            FieldType::Float64 => 8,
        }
    }

    /// Canonical PLY type token
    pub fn name(self) -> &'static str {
        match self {
            FieldType::Int8 => "int8",
            FieldType::UInt8 => "uint8",
            FieldType::Int16 => "int16",
            FieldType::UInt16 => "uint16",
            FieldType::Int32 => "int32",
            FieldType::UInt32 => "uint32",
            FieldType::Float32 => "float32",
            FieldType::Float64 => "float64",
        }
    }

    /// Parse a PLY type token, accepting both the sized names and the classic aliases
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "int8" | "char" => Some(FieldType::Int8),
            "uint8" | "uchar" => Some(FieldType::UInt8),
            "int16" | "short" => Some(FieldType::Int16),
            "uint16" | "ushort" => Some(FieldType::UInt16),
            "int32" | "int" => Some(FieldType::Int32),
            "uint32" | "uint" => Some(FieldType::UInt32),
            "float32" | "float" => Some(FieldType::Float32),
            "float64" | "double" => Some(FieldType::Float64),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_token(s).ok_or_else(|| Error::malformed(format!("unrecognized property type '{}'", s)))
    }
}

/// Byte order of the binary body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    Little,
    Big,
}

/// One named, typed field of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    pub fn byte_width(&self) -> usize {
        self.field_type.byte_width()
    }
}

/// Layout of the record block of a point-cloud file
///
/// Field order is the on-disk order. Records are packed with no padding
/// between fields or between records, so the body of a well-formed file is
/// exactly `record_count * record_width()` bytes starting at `header_len`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
    record_count: usize,
    header_len: u64,
    byte_order: ByteOrder,
}

impl Schema {
    /// Build a schema, rejecting empty field lists, duplicate field names and
    /// layouts whose total length does not fit in a `u64`
    pub fn new(
        fields: Vec<FieldDescriptor>,
        record_count: usize,
        header_len: u64,
        byte_order: ByteOrder,
    ) -> Result<Self> {
        if fields.is_empty() {
            return Err(Error::malformed("record block declares no properties"));
        }

        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::malformed(format!("duplicate property '{}'", field.name)));
            }
        }

        let record_width: usize = fields.iter().map(FieldDescriptor::byte_width).sum();
        (record_count as u64)
            .checked_mul(record_width as u64)
            .and_then(|body| body.checked_add(header_len))
            .ok_or_else(|| {
                Error::malformed(format!(
                    "{} records of {} bytes overflow the addressable file length",
                    record_count, record_width
                ))
            })?;

        Ok(Self {
            fields,
            record_count,
            header_len,
            byte_order,
        })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Offset of the first body byte
    pub fn header_len(&self) -> u64 {
        self.header_len
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Size of one record in bytes
    pub fn record_width(&self) -> usize {
        self.fields.iter().map(FieldDescriptor::byte_width).sum()
    }

    /// Expected body length in bytes
    ///
    /// Saturates rather than wrapping for schemas that bypassed [`Schema::new`].
    pub fn body_len(&self) -> u64 {
        (self.record_count as u64).saturating_mul(self.record_width() as u64)
    }

    /// Expected total file length in bytes
    pub fn file_len(&self) -> u64 {
        self.header_len.saturating_add(self.body_len())
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Byte offset of a field inside a record
    pub fn field_offset(&self, field_index: usize) -> Option<usize> {
        if field_index >= self.fields.len() {
            return None;
        }
        Some(self.fields[..field_index].iter().map(FieldDescriptor::byte_width).sum())
    }

    /// Same layout with a different record count and header length
    pub fn with_layout(&self, record_count: usize, header_len: u64) -> Self {
        Self {
            fields: self.fields.clone(),
            record_count,
            header_len,
            byte_order: self.byte_order,
        }
    }
}
