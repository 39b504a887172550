//! XML property-list reader producing an untyped value tree.
//!
//! Only the subset analyzers emit is understood: `dict`, `array`, `key`,
//! `string`, `integer`, `real`, `true`, `false`, `date`, and `data`. Data
//! payloads are kept as their base64 text.

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::errors::{IngestError, IngestResult};

/// Nesting depth beyond which a document is rejected.
pub const MAX_NESTING_DEPTH: usize = 64;

#[derive(Clone, Debug, PartialEq)]
pub enum PlistValue {
    Dict(IndexMap<String, PlistValue>),
    Array(Vec<PlistValue>),
    String(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Date(String),
    Data(String),
}

impl PlistValue {
    /// Element name used in type-mismatch messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PlistValue::Dict(_) => "dict",
            PlistValue::Array(_) => "array",
            PlistValue::String(_) => "string",
            PlistValue::Integer(_) => "integer",
            PlistValue::Real(_) => "real",
            PlistValue::Boolean(_) => "boolean",
            PlistValue::Date(_) => "date",
            PlistValue::Data(_) => "data",
        }
    }
}

/// Parse a whole plist document. Returns `Ok(None)` when the input holds no
/// value at all (zero bytes, whitespace, or an empty `<plist/>`).
pub fn parse_document(bytes: &[u8]) -> IngestResult<Option<PlistValue>> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(None);
    }

    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut root: Option<PlistValue> = None;
    let mut inside_plist = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                let name = element_name(&start);
                if name == "plist" && !inside_plist {
                    inside_plist = true;
                } else if root.is_some() {
                    return Err(IngestError::malformed(format!(
                        "unexpected <{name}> after the root value"
                    )));
                } else {
                    root = Some(read_value(&mut reader, &name, 1)?);
                }
            }
            Event::Empty(start) => {
                let name = element_name(&start);
                if name != "plist" || inside_plist {
                    if root.is_some() {
                        return Err(IngestError::malformed(format!(
                            "unexpected <{name}/> after the root value"
                        )));
                    }
                    root = Some(empty_value(&name)?);
                }
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                if name != "plist" {
                    return Err(IngestError::malformed(format!("stray </{name}>")));
                }
                inside_plist = false;
            }
            Event::Text(text) => {
                let raw = text.unescape().map_err(|e| IngestError::malformed(e.to_string()))?;
                if !raw.trim().is_empty() {
                    return Err(IngestError::malformed("text outside of a plist value"));
                }
            }
            Event::Eof => break,
            // Declarations, doctype, comments, processing instructions.
            _ => {}
        }
        buf.clear();
    }

    if inside_plist {
        return Err(IngestError::malformed("unterminated <plist>"));
    }
    Ok(root)
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

fn empty_value(name: &str) -> IngestResult<PlistValue> {
    Ok(match name {
        "dict" => PlistValue::Dict(IndexMap::new()),
        "array" => PlistValue::Array(Vec::new()),
        "string" => PlistValue::String(String::new()),
        "data" => PlistValue::Data(String::new()),
        "true" => PlistValue::Boolean(true),
        "false" => PlistValue::Boolean(false),
        other => {
            return Err(IngestError::malformed(format!(
                "<{other}/> cannot be empty"
            )))
        }
    })
}

/// Read the value whose start tag `name` was just consumed.
fn read_value(reader: &mut Reader<&[u8]>, name: &str, depth: usize) -> IngestResult<PlistValue> {
    if depth > MAX_NESTING_DEPTH {
        return Err(IngestError::malformed(format!(
            "nesting deeper than {MAX_NESTING_DEPTH} levels"
        )));
    }
    match name {
        "dict" => read_dict(reader, depth),
        "array" => read_array(reader, depth),
        "string" => Ok(PlistValue::String(read_text(reader, name)?)),
        "date" => Ok(PlistValue::Date(read_text(reader, name)?.trim().to_string())),
        "data" => Ok(PlistValue::Data(
            read_text(reader, name)?
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect(),
        )),
        "integer" => {
            let text = read_text(reader, name)?;
            let trimmed = text.trim();
            trimmed
                .parse::<i64>()
                .map(PlistValue::Integer)
                .map_err(|_| IngestError::malformed(format!("invalid integer {trimmed:?}")))
        }
        "real" => {
            let text = read_text(reader, name)?;
            let trimmed = text.trim();
            trimmed
                .parse::<f64>()
                .map(PlistValue::Real)
                .map_err(|_| IngestError::malformed(format!("invalid real {trimmed:?}")))
        }
        "true" | "false" => {
            read_text(reader, name)?;
            Ok(PlistValue::Boolean(name == "true"))
        }
        other => Err(IngestError::malformed(format!("unknown plist element <{other}>"))),
    }
}

fn read_dict(reader: &mut Reader<&[u8]>, depth: usize) -> IngestResult<PlistValue> {
    let mut entries = IndexMap::new();
    let mut pending_key: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(start) => {
                let name = element_name(&start);
                if name == "key" {
                    if let Some(key) = pending_key.as_deref() {
                        return Err(IngestError::malformed(format!(
                            "dict key {key:?} has no value"
                        )));
                    }
                    pending_key = Some(read_text(reader, "key")?);
                } else {
                    let key = pending_key.take().ok_or_else(|| {
                        IngestError::malformed(format!("<{name}> in dict without a key"))
                    })?;
                    let value = read_value(reader, &name, depth + 1)?;
                    entries.insert(key, value);
                }
            }
            Event::Empty(start) => {
                let name = element_name(&start);
                if name == "key" {
                    if let Some(key) = pending_key.as_deref() {
                        return Err(IngestError::malformed(format!(
                            "dict key {key:?} has no value"
                        )));
                    }
                    pending_key = Some(String::new());
                } else {
                    let key = pending_key.take().ok_or_else(|| {
                        IngestError::malformed(format!("<{name}/> in dict without a key"))
                    })?;
                    entries.insert(key, empty_value(&name)?);
                }
            }
            Event::End(end) => {
                if end.name().as_ref() != b"dict" {
                    return Err(IngestError::malformed("mismatched closing tag in dict"));
                }
                if let Some(key) = pending_key {
                    return Err(IngestError::malformed(format!(
                        "dict key {key:?} has no value"
                    )));
                }
                return Ok(PlistValue::Dict(entries));
            }
            Event::Eof => return Err(IngestError::malformed("unterminated <dict>")),
            Event::Text(text) => {
                let raw = text.unescape().map_err(|e| IngestError::malformed(e.to_string()))?;
                if !raw.trim().is_empty() {
                    return Err(IngestError::malformed("stray text inside <dict>"));
                }
            }
            _ => {}
        }
        buf.clear();
    }
}

fn read_array(reader: &mut Reader<&[u8]>, depth: usize) -> IngestResult<PlistValue> {
    let mut items = Vec::new();
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(start) => {
                let name = element_name(&start);
                items.push(read_value(reader, &name, depth + 1)?);
            }
            Event::Empty(start) => items.push(empty_value(&element_name(&start))?),
            Event::End(end) => {
                if end.name().as_ref() != b"array" {
                    return Err(IngestError::malformed("mismatched closing tag in array"));
                }
                return Ok(PlistValue::Array(items));
            }
            Event::Eof => return Err(IngestError::malformed("unterminated <array>")),
            Event::Text(text) => {
                let raw = text.unescape().map_err(|e| IngestError::malformed(e.to_string()))?;
                if !raw.trim().is_empty() {
                    return Err(IngestError::malformed("stray text inside <array>"));
                }
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Collect character data up to the closing tag of a leaf element.
fn read_text(reader: &mut Reader<&[u8]>, name: &str) -> IngestResult<String> {
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Text(chunk) => {
                let raw = chunk.unescape().map_err(|e| IngestError::malformed(e.to_string()))?;
                text.push_str(&raw);
            }
            Event::CData(chunk) => {
                text.push_str(&String::from_utf8_lossy(&chunk.into_inner()));
            }
            Event::End(end) => {
                if end.name().as_ref() != name.as_bytes() {
                    return Err(IngestError::malformed(format!(
                        "expected </{name}>, found </{}>",
                        String::from_utf8_lossy(end.name().as_ref())
                    )));
                }
                return Ok(text);
            }
            Event::Start(_) | Event::Empty(_) => {
                return Err(IngestError::malformed(format!(
                    "<{name}> must only contain text"
                )))
            }
            Event::Eof => return Err(IngestError::malformed(format!("unterminated <{name}>"))),
            _ => {}
        }
        buf.clear();
    }
}
