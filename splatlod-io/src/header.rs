//! PLY header parsing and rewriting
//!
//! The header is kept line by line exactly as read so it can be re-emitted
//! byte for byte; only the `element vertex` line changes when the record
//! count does.

use splatlod_core::{ByteOrder, Error, FieldDescriptor, FieldType, Result, Schema};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

/// Upper bound on header size; a source without `end_header` in this many
/// bytes is rejected instead of being scanned to the end.
pub const MAX_HEADER_LEN: usize = 1024 * 1024;

const MAGIC: &str = "ply";
const SENTINEL: &str = "end_header";
const RECORD_ELEMENT: &str = "vertex";

/// PLY body encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl PlyFormat {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "ascii" => Some(PlyFormat::Ascii),
            "binary_little_endian" => Some(PlyFormat::BinaryLittleEndian),
            "binary_big_endian" => Some(PlyFormat::BinaryBigEndian),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlyFormat::Ascii => "ascii",
            PlyFormat::BinaryLittleEndian => "binary_little_endian",
            PlyFormat::BinaryBigEndian => "binary_big_endian",
        }
    }
}

/// Parsed header of a binary PLY point cloud
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyHeader {
    schema: Schema,
    format: PlyFormat,
    version: String,
    comments: Vec<String>,
    obj_info: Vec<String>,
    // raw lines including their terminators
    lines: Vec<String>,
    vertex_line: usize,
}

impl PlyHeader {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn format(&self) -> PlyFormat {
        self.format
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn obj_info(&self) -> &[String] {
        &self.obj_info
    }

    /// Length of the header in bytes, i.e. the offset of the body
    pub fn len(&self) -> u64 {
        self.schema.header_len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Header bytes declaring `record_count` records
    ///
    /// Every line other than the vertex element line is emitted verbatim. The
    /// vertex line itself is kept verbatim when the count is unchanged.
    pub fn render(&self, record_count: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len() as usize + 16);
        for (i, line) in self.lines.iter().enumerate() {
            if i == self.vertex_line && record_count != self.schema.record_count() {
                let terminator = line_terminator(line);
                out.extend_from_slice(
                    format!("element {} {}{}", RECORD_ELEMENT, record_count, terminator).as_bytes(),
                );
            } else {
                out.extend_from_slice(line.as_bytes());
            }
        }
        out
    }

    /// Header describing the same fields with `record_count` records
    pub fn with_record_count(&self, record_count: usize) -> PlyHeader {
        let rendered_len = self.render(record_count).len() as u64;
        let mut lines = self.lines.clone();
        if record_count != self.schema.record_count() {
            let terminator = line_terminator(&lines[self.vertex_line]).to_string();
            lines[self.vertex_line] = format!("element {} {}{}", RECORD_ELEMENT, record_count, terminator);
        }

        PlyHeader {
            schema: self.schema.with_layout(record_count, rendered_len),
            format: self.format,
            version: self.version.clone(),
            comments: self.comments.clone(),
            obj_info: self.obj_info.clone(),
            lines,
            vertex_line: self.vertex_line,
        }
    }

    /// Write the header for `record_count` records, returning the bytes written
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W, record_count: usize) -> Result<u64> {
        let bytes = self.render(record_count);
        writer.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }
}

/// Read a PLY header from the start of `reader`
///
/// On success the reader is positioned at the first byte of the binary body.
pub fn read_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader> {
    let mut consumed: usize = 0;
    let mut raw = Vec::new();
    let mut lines = Vec::new();

    let mut format = None;
    let mut version = String::new();
    let mut comments = Vec::new();
    let mut obj_info = Vec::new();
    let mut vertex: Option<(usize, usize)> = None; // (line index, record count)
    let mut fields = Vec::new();

    loop {
        raw.clear();
        let limit = (MAX_HEADER_LEN - consumed) as u64;
        let n = reader.by_ref().take(limit).read_until(b'\n', &mut raw)?;
        if n == 0 {
            if consumed >= MAX_HEADER_LEN {
                return Err(Error::MalformedHeader(format!(
                    "no '{}' within the first {} bytes",
                    SENTINEL, MAX_HEADER_LEN
                )));
            }
            return Err(Error::MalformedHeader(format!(
                "unexpected end of file before '{}'",
                SENTINEL
            )));
        }
        consumed += n;

        let line = std::str::from_utf8(&raw)
            .map_err(|_| Error::MalformedHeader(format!("header line {} is not valid text", lines.len() + 1)))?
            .to_string();
        let content = line.trim_end_matches(&['\n', '\r'][..]);
        let line_no = lines.len();
        let tokens: Vec<&str> = content.split_whitespace().collect();

        if line_no == 0 {
            if content.trim() != MAGIC {
                return Err(Error::MalformedHeader("missing 'ply' magic line".to_string()));
            }
            lines.push(line);
            continue;
        }

        let keyword = match tokens.first() {
            Some(keyword) => *keyword,
            None => {
                lines.push(line);
                continue;
            }
        };

        match keyword {
            "format" => {
                if format.is_some() {
                    return Err(Error::MalformedHeader("duplicate 'format' line".to_string()));
                }
                if vertex.is_some() {
                    return Err(Error::MalformedHeader("'format' must precede element declarations".to_string()));
                }
                if tokens.len() != 3 {
                    return Err(Error::MalformedHeader(format!("invalid format line: '{}'", content)));
                }
                let parsed = PlyFormat::from_token(tokens[1])
                    .ok_or_else(|| Error::MalformedHeader(format!("unknown format '{}'", tokens[1])))?;
                if parsed == PlyFormat::Ascii {
                    return Err(Error::UnsupportedFormat(
                        "ascii PLY bodies are not supported; convert to a binary encoding".to_string(),
                    ));
                }
                format = Some(parsed);
                version = tokens[2].to_string();
            }
            "comment" => comments.push(directive_text(content, keyword)),
            "obj_info" => obj_info.push(directive_text(content, keyword)),
            "element" => {
                if tokens.len() != 3 {
                    return Err(Error::MalformedHeader(format!("invalid element line: '{}'", content)));
                }
                let name = tokens[1];
                if name != RECORD_ELEMENT {
                    return Err(Error::UnsupportedElementBlock(format!(
                        "element '{}'; only a single '{}' block is supported",
                        name, RECORD_ELEMENT
                    )));
                }
                if vertex.is_some() {
                    return Err(Error::MalformedHeader(format!("duplicate '{}' element", RECORD_ELEMENT)));
                }
                vertex = Some((line_no, parse_count(tokens[2])?));
            }
            "property" => {
                if vertex.is_none() {
                    return Err(Error::MalformedHeader("property declared before any element".to_string()));
                }
                if tokens.get(1) == Some(&"list") {
                    return Err(Error::UnsupportedElementBlock(format!(
                        "list property '{}' gives records a variable width",
                        tokens.last().copied().unwrap_or_default()
                    )));
                }
                if tokens.len() != 3 {
                    return Err(Error::MalformedHeader(format!("invalid property line: '{}'", content)));
                }
                let field_type: FieldType = tokens[1].parse()?;
                fields.push(FieldDescriptor::new(tokens[2], field_type));
            }
            SENTINEL => {
                if tokens.len() != 1 {
                    return Err(Error::MalformedHeader(format!("invalid sentinel line: '{}'", content)));
                }
                lines.push(line);
                break;
            }
            other => {
                return Err(Error::MalformedHeader(format!("unknown header keyword '{}'", other)));
            }
        }

        lines.push(line);
    }

    let format = format.ok_or_else(|| Error::MalformedHeader("missing 'format' line".to_string()))?;
    let (vertex_line, record_count) =
        vertex.ok_or_else(|| Error::MalformedHeader(format!("missing '{}' element", RECORD_ELEMENT)))?;
    let byte_order = match format {
        PlyFormat::BinaryBigEndian => ByteOrder::Big,
        _ => ByteOrder::Little,
    };

    let schema = Schema::new(fields, record_count, consumed as u64, byte_order)?;

    Ok(PlyHeader {
        schema,
        format,
        version,
        comments,
        obj_info,
        lines,
        vertex_line,
    })
}

/// Read only the header of a PLY file
pub fn read_header_file<P: AsRef<Path>>(path: P) -> Result<PlyHeader> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    read_header(&mut reader)
}

fn parse_count(token: &str) -> Result<usize> {
    let count: i64 = token
        .parse()
        .map_err(|_| Error::MalformedHeader(format!("unparsable element count '{}'", token)))?;
    if count < 0 {
        return Err(Error::MalformedHeader(format!("negative element count {}", count)));
    }
    usize::try_from(count).map_err(|_| Error::MalformedHeader(format!("element count {} too large", count)))
}

fn directive_text(content: &str, keyword: &str) -> String {
    content
        .trim_start()
        .strip_prefix(keyword)
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn line_terminator(line: &str) -> &str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}
