//! Stable identity hashes for diagnostics.
//!
//! Both hashes are SHA-256 over a canonical string, truncated to
//! [`IDENTITY_HASH_HEX_LEN`] lowercase hex characters. A canonical string is
//! a sequence of fields, each written as `<byte length>:<text>` and joined
//! with `|`, so no field content can collide with a delimiter.
//!
//! `content_hash` fields: `content`, scheme version, checker name, context
//! name, the defect line with whitespace runs collapsed, then the nearest
//! non-blank lines above and below (`context_window` of each, newline
//! separated). Line numbers never enter it.
//!
//! When the defect line cannot be read the hash is built from `degraded`,
//! scheme version, checker name, context name, file path, line and column,
//! and the result is flagged as degraded.
//!
//! `context_hash` fields: `context`, scheme version, checker name, context
//! name, and the defect's line offset from the line holding the opening `{`
//! of its enclosing context's body, the same origin the analyzer uses for
//! `issue_hash_function_offset` (`@<line>` when no context start could be
//! established).

use std::collections::HashMap;
use std::sync::LazyLock;

use parking_lot::Mutex;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::config::IngestConfig;
use crate::hashing::source::SourceProvider;
use crate::models::{IdentityHashes, NormalizedDiagnostic, HASH_SCHEME_VERSION, IDENTITY_HASH_HEX_LEN};

static QUALIFIER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^.*::").unwrap());

/// How the context offset was established.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextOffset {
    /// Supplied by the analyzer as `issue_hash_function_offset`.
    Declared(i64),
    /// Found by scanning back to the context's declaration, then forward to
    /// its body.
    Scanned(i64),
    /// No context start available; the absolute defect line is used.
    Absolute(u32),
}

impl ContextOffset {
    fn canonical(self) -> String {
        match self {
            ContextOffset::Declared(n) | ContextOffset::Scanned(n) => n.to_string(),
            ContextOffset::Absolute(line) => format!("@{line}"),
        }
    }
}

/// Hashes the diagnostics of one bundle. Declaration patterns are compiled
/// once per context name and kept for the engine's lifetime.
pub struct HashEngine<'a> {
    sources: &'a dyn SourceProvider,
    context_window: usize,
    max_context_scan: u32,
    declarations: Mutex<HashMap<String, Option<Regex>>>,
}

impl<'a> HashEngine<'a> {
    pub fn new(sources: &'a dyn SourceProvider, config: &IngestConfig) -> Self {
        Self {
            sources,
            context_window: config.context_window,
            max_context_scan: u32::try_from(config.max_context_scan).unwrap_or(u32::MAX),
            declarations: Mutex::new(HashMap::new()),
        }
    }

    /// Compute both hashes for a diagnostic whose primary location lies in
    /// `file_path`.
    pub fn compute(&self, diagnostic: &NormalizedDiagnostic, file_path: &str) -> IdentityHashes {
        let location = diagnostic.raw.location;
        let context_name = diagnostic.raw.context_name.as_deref().unwrap_or("");
        let version = HASH_SCHEME_VERSION.to_string();

        let (content_hash, degraded) = match self.sources.read_source_line(file_path, location.line) {
            Some(line_text) => {
                let (above, below) = self.neighbour_lines(file_path, location.line);
                let canonical = canonical_string(&[
                    "content",
                    &version,
                    &diagnostic.checker_name,
                    context_name,
                    &normalize_line(&line_text),
                    &above.join("\n"),
                    &below.join("\n"),
                ]);
                (digest_canonical(&canonical), false)
            }
            None => {
                let canonical = canonical_string(&[
                    "degraded",
                    &version,
                    &diagnostic.checker_name,
                    context_name,
                    file_path,
                    &location.line.to_string(),
                    &location.column.to_string(),
                ]);
                (digest_canonical(&canonical), true)
            }
        };

        let offset = self.context_offset(diagnostic, file_path);
        let context_canonical = canonical_string(&[
            "context",
            &version,
            &diagnostic.checker_name,
            context_name,
            &offset.canonical(),
        ]);

        IdentityHashes {
            content_hash,
            context_hash: digest_canonical(&context_canonical),
            degraded,
        }
    }

    /// Up to `context_window` non-blank lines on each side, nearest first
    /// scanning outwards, returned in file order.
    fn neighbour_lines(&self, file_path: &str, line: u32) -> (Vec<String>, Vec<String>) {
        if self.context_window == 0 {
            return (Vec::new(), Vec::new());
        }
        let window = u32::try_from(self.context_window).unwrap_or(u32::MAX);
        let limit = self.max_context_scan.max(window);

        let mut above = Vec::new();
        let mut cursor = line;
        while above.len() < self.context_window && cursor > 1 && line - cursor < limit {
            cursor -= 1;
            let Some(text) = self.sources.read_source_line(file_path, cursor) else {
                break;
            };
            let normalized = normalize_line(&text);
            if !normalized.is_empty() {
                above.push(normalized);
            }
        }
        above.reverse();

        let mut below = Vec::new();
        let mut cursor = line;
        while below.len() < self.context_window && cursor - line < limit {
            cursor += 1;
            let Some(text) = self.sources.read_source_line(file_path, cursor) else {
                break;
            };
            let normalized = normalize_line(&text);
            if !normalized.is_empty() {
                below.push(normalized);
            }
        }

        (above, below)
    }

    fn context_offset(&self, diagnostic: &NormalizedDiagnostic, file_path: &str) -> ContextOffset {
        let location = diagnostic.raw.location;
        if let Some(offset) = diagnostic.raw.function_offset {
            return ContextOffset::Declared(offset);
        }
        let Some(context_name) = diagnostic.raw.context_name.as_deref() else {
            return ContextOffset::Absolute(location.line);
        };
        match self.find_context_start(context_name, file_path, location.line) {
            Some(start) => ContextOffset::Scanned(i64::from(location.line - start)),
            None => ContextOffset::Absolute(location.line),
        }
    }

    /// Line of the opening `{` of the body enclosing `line`: the nearest
    /// line at or above `line` that declares `context_name` (the unqualified
    /// name followed by `(`), then the first line from there on holding `{`.
    /// A declaration without a brace before `line` counts from itself.
    fn find_context_start(&self, context_name: &str, file_path: &str, line: u32) -> Option<u32> {
        let declaration = self.declaration_pattern(context_name)?;
        let lowest = line.saturating_sub(self.max_context_scan).max(1);
        let declared_at = (lowest..=line).rev().find(|&candidate| {
            self.sources
                .read_source_line(file_path, candidate)
                .is_some_and(|text| declaration.is_match(&text))
        })?;
        let body_at = (declared_at..=line)
            .find(|&candidate| {
                self.sources
                    .read_source_line(file_path, candidate)
                    .is_some_and(|text| text.contains('{'))
            })
            .unwrap_or(declared_at);
        Some(body_at)
    }

    fn declaration_pattern(&self, context_name: &str) -> Option<Regex> {
        let mut declarations = self.declarations.lock();
        declarations
            .entry(context_name.to_string())
            .or_insert_with(|| {
                let bare = QUALIFIER_RE.replace(context_name.trim(), "");
                if bare.is_empty() {
                    return None;
                }
                Regex::new(&format!(r"\b{}\s*\(", regex::escape(&bare))).ok()
            })
            .clone()
    }
}

/// Collapse every whitespace run to one space and trim both ends.
pub fn normalize_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn canonical_string(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| format!("{}:{}", f.len(), f))
        .collect::<Vec<_>>()
        .join("|")
}

pub fn digest_canonical(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..IDENTITY_HASH_HEX_LEN].to_string()
}
