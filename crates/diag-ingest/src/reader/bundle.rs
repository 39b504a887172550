//! Decoding of a plist value tree into a [`DiagnosticBundle`].
//!
//! Absent fields are never an error; a field that is present with the wrong
//! element type is. The one structural requirement is that every file index
//! resolves within the bundle's `files` array.

use indexmap::IndexMap;
use tracing::debug;

use crate::errors::{IngestError, IngestResult};
use crate::models::{
    Diagnostic, DiagnosticBundle, Location, PathElement, PathEvent, PathPoint, SchemaGeneration,
    SourceRange,
};
use crate::reader::plist::{parse_document, PlistValue};

type Dict = IndexMap<String, PlistValue>;

/// Parse raw bundle bytes. Empty input and bundles without a `diagnostics`
/// array both yield an empty bundle.
pub fn read_bundle(bytes: &[u8]) -> IngestResult<DiagnosticBundle> {
    match parse_document(bytes)? {
        None => Ok(DiagnosticBundle::empty()),
        Some(PlistValue::Dict(root)) => decode_bundle(&root),
        Some(other) => Err(IngestError::malformed(format!(
            "bundle root must be a dict, found {}",
            other.type_name()
        ))),
    }
}

/// Read and parse a bundle file.
pub fn read_bundle_file(path: &std::path::Path) -> IngestResult<DiagnosticBundle> {
    let bytes = std::fs::read(path)?;
    read_bundle(&bytes)
}

fn decode_bundle(root: &Dict) -> IngestResult<DiagnosticBundle> {
    let files = match root.get("files") {
        None => Vec::new(),
        Some(value) => as_array(value, "files")?
            .iter()
            .enumerate()
            .map(|(i, f)| as_string(f, &format!("files[{i}]")).map(str::to_string))
            .collect::<IngestResult<Vec<_>>>()?,
    };

    let raw_diagnostics = match root.get("diagnostics") {
        None => &[][..],
        Some(value) => as_array(value, "diagnostics")?.as_slice(),
    };

    let mut diagnostics = Vec::with_capacity(raw_diagnostics.len());
    for (index, value) in raw_diagnostics.iter().enumerate() {
        let dict = as_dict(value, &format!("diagnostics[{index}]"))?;
        let diagnostic = decode_diagnostic(dict)
            .map_err(|e| prefix_error(e, &format!("diagnostics[{index}]")))?;
        if let Some(bad) = diagnostic.file_indices().find(|&i| i >= files.len()) {
            return Err(IngestError::malformed(format!(
                "diagnostics[{index}] references file index {bad} but the bundle lists {} files",
                files.len()
            )));
        }
        diagnostics.push(diagnostic);
    }

    let generation = diagnostics.iter().map(SchemaGeneration::of).min();

    Ok(DiagnosticBundle {
        files,
        diagnostics,
        generation,
        clang_version: opt_string(root, "clang_version")?,
    })
}

fn decode_diagnostic(dict: &Dict) -> IngestResult<Diagnostic> {
    let path = match dict.get("path") {
        None => Vec::new(),
        Some(value) => decode_path(as_array(value, "path")?)?,
    };

    let notes = match dict.get("notes") {
        None => Vec::new(),
        Some(value) => as_array(value, "notes")?
            .iter()
            .enumerate()
            .map(|(i, n)| decode_event(as_dict(n, &format!("notes[{i}]"))?))
            .collect::<IngestResult<Vec<_>>>()?,
    };

    // Older producers occasionally omit the top-level location; the last
    // path element is the defect point in that case.
    let location = match dict.get("location") {
        Some(value) => decode_location(value, "location")?,
        None => path
            .last()
            .map(PathElement::location)
            .ok_or_else(|| IngestError::malformed("diagnostic has neither location nor path"))?,
    };

    let function_offset = match dict.get("issue_hash_function_offset") {
        None => None,
        Some(PlistValue::Integer(n)) => Some(*n),
        Some(PlistValue::String(s)) => Some(s.trim().parse::<i64>().map_err(|_| {
            IngestError::malformed(format!("issue_hash_function_offset {s:?} is not a number"))
        })?),
        Some(other) => return Err(type_mismatch("issue_hash_function_offset", "string", other)),
    };

    Ok(Diagnostic {
        category: opt_string(dict, "category")?.unwrap_or_default(),
        type_: opt_string(dict, "type")?.unwrap_or_default(),
        description: opt_string(dict, "description")?.unwrap_or_default(),
        checker_name: opt_string(dict, "check_name")?.filter(|n| !n.trim().is_empty()),
        location,
        context_name: opt_string(dict, "issue_context")?,
        context_kind: opt_string(dict, "issue_context_kind")?,
        path,
        notes,
        embedded_hash: opt_string(dict, "issue_hash_content_of_line_in_context")?,
        function_offset,
    })
}

fn decode_path(pieces: &[PlistValue]) -> IngestResult<Vec<PathElement>> {
    let mut elements = Vec::new();
    for (index, piece) in pieces.iter().enumerate() {
        let field = format!("path[{index}]");
        let dict = as_dict(piece, &field)?;
        match opt_string(dict, "kind")?.as_deref() {
            Some("event") => elements.push(PathElement::Event(decode_event(dict)?)),
            Some("control") => {
                for point in decode_control(dict)? {
                    // Consecutive edges share their joint; keep one point per hop.
                    if elements.last() != Some(&PathElement::Point(point)) {
                        elements.push(PathElement::Point(point));
                    }
                }
            }
            other => debug!("skipping {field} with kind {other:?}"),
        }
    }
    Ok(elements)
}

fn decode_event(dict: &Dict) -> IngestResult<PathEvent> {
    let location = dict
        .get("location")
        .ok_or_else(|| IngestError::malformed("event without location"))
        .and_then(|v| decode_location(v, "location"))?;
    let ranges = match dict.get("ranges") {
        None => Vec::new(),
        Some(value) => as_array(value, "ranges")?
            .iter()
            .map(|r| decode_range(r, "ranges[]"))
            .collect::<IngestResult<Vec<_>>>()?,
    };
    let depth = match dict.get("depth") {
        None => 0,
        Some(value) => u32::try_from(as_integer(value, "depth")?)
            .map_err(|_| IngestError::malformed("depth out of range"))?,
    };
    Ok(PathEvent {
        location,
        message: opt_string(dict, "message")?.unwrap_or_default(),
        extended_message: opt_string(dict, "extended_message")?,
        depth,
        ranges,
    })
}

/// Each control edge contributes the start of its source range and the
/// start of its destination range.
fn decode_control(dict: &Dict) -> IngestResult<Vec<PathPoint>> {
    let Some(edges) = dict.get("edges") else {
        return Ok(Vec::new());
    };
    let mut points = Vec::new();
    for (index, edge) in as_array(edges, "edges")?.iter().enumerate() {
        let edge = as_dict(edge, &format!("edges[{index}]"))?;
        for side in ["start", "end"] {
            if let Some(range) = edge.get(side) {
                let range = decode_range(range, side)?;
                points.push(PathPoint {
                    location: range.start,
                });
            }
        }
    }
    Ok(points)
}

fn decode_range(value: &PlistValue, field: &str) -> IngestResult<SourceRange> {
    let bounds = as_array(value, field)?;
    match bounds.as_slice() {
        [start, end] => Ok(SourceRange {
            start: decode_location(start, field)?,
            end: decode_location(end, field)?,
        }),
        [single] => {
            let loc = decode_location(single, field)?;
            Ok(SourceRange {
                start: loc,
                end: loc,
            })
        }
        _ => Err(IngestError::malformed(format!(
            "{field} must hold one or two locations, found {}",
            bounds.len()
        ))),
    }
}

fn decode_location(value: &PlistValue, field: &str) -> IngestResult<Location> {
    let dict = as_dict(value, field)?;
    let number = |key: &str| -> IngestResult<u32> {
        let raw = match dict.get(key) {
            Some(v) => as_integer(v, &format!("{field}.{key}"))?,
            None => {
                return Err(IngestError::malformed(format!("{field} is missing {key}")));
            }
        };
        u32::try_from(raw)
            .map_err(|_| IngestError::malformed(format!("{field}.{key} out of range: {raw}")))
    };
    Ok(Location {
        line: number("line")?,
        column: number("col")?,
        file_index: number("file")? as usize,
    })
}

// ---------------------------------------------------------------------------
// Typed accessors
// ---------------------------------------------------------------------------

fn type_mismatch(field: &str, expected: &str, found: &PlistValue) -> IngestError {
    IngestError::malformed(format!(
        "{field} must be {expected}, found {}",
        found.type_name()
    ))
}

fn prefix_error(err: IngestError, prefix: &str) -> IngestError {
    match err {
        IngestError::MalformedBundle(msg) => IngestError::MalformedBundle(format!("{prefix}: {msg}")),
        other => other,
    }
}

fn as_dict<'a>(value: &'a PlistValue, field: &str) -> IngestResult<&'a Dict> {
    match value {
        PlistValue::Dict(d) => Ok(d),
        other => Err(type_mismatch(field, "dict", other)),
    }
}

fn as_array<'a>(value: &'a PlistValue, field: &str) -> IngestResult<&'a Vec<PlistValue>> {
    match value {
        PlistValue::Array(a) => Ok(a),
        other => Err(type_mismatch(field, "array", other)),
    }
}

fn as_string<'a>(value: &'a PlistValue, field: &str) -> IngestResult<&'a str> {
    match value {
        PlistValue::String(s) => Ok(s),
        other => Err(type_mismatch(field, "string", other)),
    }
}

fn as_integer(value: &PlistValue, field: &str) -> IngestResult<i64> {
    match value {
        PlistValue::Integer(n) => Ok(*n),
        other => Err(type_mismatch(field, "integer", other)),
    }
}

fn opt_string(dict: &Dict, key: &str) -> IngestResult<Option<String>> {
    dict.get(key)
        .map(|v| as_string(v, key).map(str::to_string))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata;

    #[test]
    fn test_empty_file_is_empty_bundle() {
        let bundle = read_bundle(testdata::EMPTY_FILE.as_bytes()).unwrap();
        assert!(bundle.is_empty());
        assert!(bundle.files.is_empty());
        assert_eq!(bundle.generation, None);
    }

    #[test]
    fn test_no_bug_bundle() {
        let bundle = read_bundle(testdata::CLANG37_NOERROR.as_bytes()).unwrap();
        assert!(bundle.is_empty());
        assert_eq!(bundle.clang_version.as_deref(), Some("clang version 3.7.0"));
    }

    #[test]
    fn test_unnamed_generation() {
        let bundle = read_bundle(testdata::CLANG36_UNNAMED.as_bytes()).unwrap();
        assert_eq!(bundle.files, vec!["test.cpp", "./test.h"]);
        assert_eq!(bundle.diagnostics.len(), 3);
        assert_eq!(bundle.generation, Some(SchemaGeneration::Unnamed));
        assert!(bundle.diagnostics.iter().all(|d| d.checker_name.is_none()));
    }

    #[test]
    fn test_named_unhashed_generation() {
        let bundle = read_bundle(testdata::CLANG37.as_bytes()).unwrap();
        assert_eq!(bundle.generation, Some(SchemaGeneration::NamedUnhashed));
        let div = &bundle.diagnostics[0];
        assert_eq!(div.checker_name.as_deref(), Some("core.DivideZero"));
        assert_eq!(div.context_name.as_deref(), Some("generate_id"));
        assert_eq!(div.context_kind.as_deref(), Some("function"));
        assert_eq!(
            div.location,
            Location {
                file_index: 1,
                line: 7,
                column: 14
            }
        );
        assert!(!div.has_embedded_hash());
    }

    #[test]
    fn test_named_hashed_generation() {
        let bundle = read_bundle(testdata::CLANG40.as_bytes()).unwrap();
        assert_eq!(bundle.generation, Some(SchemaGeneration::NamedHashed));
        let div = &bundle.diagnostics[0];
        assert_eq!(
            div.embedded_hash.as_deref(),
            Some("79e31a6ba028f0b7d9779faf4a6cb9cf")
        );
        assert_eq!(div.function_offset, Some(2));
    }

    #[test]
    fn test_path_events_and_control_points() {
        let bundle = read_bundle(testdata::CLANG37.as_bytes()).unwrap();
        let div = &bundle.diagnostics[0];
        let kinds: Vec<&str> = div
            .path
            .iter()
            .map(|e| match e {
                PathElement::Event(_) => "event",
                PathElement::Point(_) => "point",
            })
            .collect();
        assert_eq!(kinds, vec!["event", "point", "point", "event"]);
        let last = div.path.last().unwrap();
        assert_eq!(last.message(), Some("Division by zero"));
        assert_eq!(last.location(), div.location);
        let PathElement::Event(first) = &div.path[0] else {
            panic!("expected event");
        };
        assert_eq!(first.ranges.len(), 1);
        assert_eq!(first.depth, 0);
    }

    #[test]
    fn test_missing_diagnostics_key() {
        let xml = "<plist><dict><key>files</key><array><string>a.c</string></array></dict></plist>";
        let bundle = read_bundle(xml.as_bytes()).unwrap();
        assert!(bundle.is_empty());
        assert_eq!(bundle.files, vec!["a.c"]);
    }

    #[test]
    fn test_dangling_file_index_is_malformed() {
        let xml = "<plist><dict>
            <key>files</key><array><string>a.c</string></array>
            <key>diagnostics</key><array><dict>
              <key>description</key><string>Division by zero</string>
              <key>location</key><dict>
                <key>line</key><integer>3</integer>
                <key>col</key><integer>1</integer>
                <key>file</key><integer>4</integer>
              </dict>
            </dict></array>
          </dict></plist>";
        let err = read_bundle(xml.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), "malformed_bundle");
        assert!(err.to_string().contains("file index 4"));
    }

    #[test]
    fn test_type_mismatch_is_malformed() {
        let xml = "<plist><dict>
            <key>files</key><string>a.c</string>
          </dict></plist>";
        let err = read_bundle(xml.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("files must be array"));
    }

    #[test]
    fn test_location_falls_back_to_last_path_element() {
        let xml = "<plist><dict>
            <key>files</key><array><string>a.c</string></array>
            <key>diagnostics</key><array><dict>
              <key>path</key><array><dict>
                <key>kind</key><string>event</string>
                <key>message</key><string>here</string>
                <key>location</key><dict>
                  <key>line</key><integer>9</integer>
                  <key>col</key><integer>2</integer>
                  <key>file</key><integer>0</integer>
                </dict>
              </dict></array>
            </dict></array>
          </dict></plist>";
        let bundle = read_bundle(xml.as_bytes()).unwrap();
        let diag = &bundle.diagnostics[0];
        assert_eq!(diag.location.line, 9);
        assert_eq!(diag.category, "");
        assert_eq!(diag.checker_name, None);
    }

    #[test]
    fn test_non_dict_root_is_malformed() {
        let err = read_bundle(b"<plist><array/></plist>").unwrap_err();
        assert!(err.to_string().contains("root must be a dict"));
    }
}
