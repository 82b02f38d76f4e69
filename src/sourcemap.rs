//! Source map model and VLQ mappings codec
//!
//! Implements the subset of the source map v3 format the pipeline needs:
//! decoding a fragment's `mappings` string, shifting it by a generated-line
//! offset, and re-encoding the merged result. Loaders hand maps around as
//! [`SourceMap`] values; JSON (de)serialization goes through serde.

use crate::error::Error;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// A source map in the v3 JSON format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub mappings: String,
}

impl SourceMap {
    /// A map with no sources and no mappings
    pub fn new() -> Self {
        SourceMap {
            version: 3,
            file: None,
            sources: Vec::new(),
            sources_content: None,
            names: Vec::new(),
            mappings: String::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::SourceMap(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::SourceMap(e.to_string()))
    }

    /// Render as a `data:` URI for inline source map comments
    pub fn to_data_uri(&self) -> Result<String, Error> {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;
        let json = self.to_json()?;
        Ok(format!(
            "data:application/json;base64,{}",
            STANDARD.encode(json.as_bytes())
        ))
    }
}

impl Default for SourceMap {
    fn default() -> Self {
        Self::new()
    }
}

/// One decoded mapping segment on a generated line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub generated_column: i64,
    pub source: Option<SourcePosition>,
}

/// Original position a segment points at (indices into `sources`/`names`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourcePosition {
    pub source: i64,
    pub line: i64,
    pub column: i64,
    pub name: Option<i64>,
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

static BASE64_LOOKUP: Lazy<[i8; 256]> = Lazy::new(|| {
    let mut table = [-1i8; 256];
    for (value, byte) in BASE64_ALPHABET.iter().enumerate() {
        table[*byte as usize] = value as i8;
    }
    table
});

const VLQ_BASE_SHIFT: u32 = 5;
const VLQ_BASE_MASK: i64 = 0b11111;
const VLQ_CONTINUATION_BIT: i64 = 0b100000;

/// Append one VLQ-encoded value to `out`
pub fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = vlq & VLQ_BASE_MASK;
        vlq >>= VLQ_BASE_SHIFT;
        if vlq > 0 {
            digit |= VLQ_CONTINUATION_BIT;
        }
        out.push(BASE64_ALPHABET[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Decode one VLQ value starting at `pos`, advancing `pos` past it
fn decode_vlq(bytes: &[u8], pos: &mut usize) -> Result<i64, Error> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = *bytes
            .get(*pos)
            .ok_or_else(|| Error::SourceMap("truncated VLQ sequence".to_string()))?;
        *pos += 1;
        let digit = BASE64_LOOKUP[byte as usize];
        if digit < 0 {
            return Err(Error::SourceMap(format!(
                "invalid base64 character '{}' in mappings",
                byte as char
            )));
        }
        if shift >= 64 {
            return Err(Error::SourceMap("VLQ value too large".to_string()));
        }
        let digit = digit as i64;
        result += (digit & VLQ_BASE_MASK) << shift;
        if digit & VLQ_CONTINUATION_BIT == 0 {
            break;
        }
        shift += VLQ_BASE_SHIFT;
    }
    let negative = result & 1 == 1;
    result >>= 1;
    Ok(if negative { -result } else { result })
}

/// Decode a `mappings` string into absolute segments, one `Vec` per
/// generated line
pub fn decode_mappings(mappings: &str) -> Result<Vec<Vec<Segment>>, Error> {
    let mut lines = Vec::new();
    // Source, line, column and name accumulators persist across lines;
    // the generated column resets on every line.
    let mut source: i64 = 0;
    let mut original_line: i64 = 0;
    let mut original_column: i64 = 0;
    let mut name: i64 = 0;

    for line in mappings.split(';') {
        let mut segments = Vec::new();
        let mut generated_column: i64 = 0;
        for raw in line.split(',') {
            if raw.is_empty() {
                continue;
            }
            let bytes = raw.as_bytes();
            let mut pos = 0;
            generated_column += decode_vlq(bytes, &mut pos)?;
            let position = if pos < bytes.len() {
                source += decode_vlq(bytes, &mut pos)?;
                original_line += decode_vlq(bytes, &mut pos)?;
                original_column += decode_vlq(bytes, &mut pos)?;
                let name_index = if pos < bytes.len() {
                    name += decode_vlq(bytes, &mut pos)?;
                    Some(name)
                } else {
                    None
                };
                Some(SourcePosition {
                    source,
                    line: original_line,
                    column: original_column,
                    name: name_index,
                })
            } else {
                None
            };
            segments.push(Segment {
                generated_column,
                source: position,
            });
        }
        lines.push(segments);
    }
    Ok(lines)
}

/// Encode absolute segments back into a `mappings` string
pub fn encode_mappings(lines: &[Vec<Segment>]) -> String {
    let mut out = String::new();
    let mut previous_source: i64 = 0;
    let mut previous_line: i64 = 0;
    let mut previous_column: i64 = 0;
    let mut previous_name: i64 = 0;

    for (line_index, segments) in lines.iter().enumerate() {
        if line_index > 0 {
            out.push(';');
        }
        let mut previous_generated_column: i64 = 0;
        for (segment_index, segment) in segments.iter().enumerate() {
            if segment_index > 0 {
                out.push(',');
            }
            encode_vlq(segment.generated_column - previous_generated_column, &mut out);
            previous_generated_column = segment.generated_column;
            if let Some(position) = segment.source {
                encode_vlq(position.source - previous_source, &mut out);
                previous_source = position.source;
                encode_vlq(position.line - previous_line, &mut out);
                previous_line = position.line;
                encode_vlq(position.column - previous_column, &mut out);
                previous_column = position.column;
                if let Some(name) = position.name {
                    encode_vlq(name - previous_name, &mut out);
                    previous_name = name;
                }
            }
        }
    }
    out
}
