//! Shared typed models used across reading, normalization, hashing, and
//! assembly.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Contract constants
// ---------------------------------------------------------------------------

/// Checker name assigned when neither the bundle nor the checker table can
/// name the checker.
pub const UNRESOLVED_CHECKER: &str = "NOT FOUND";

/// Version tag baked into every canonical hash string. Bumping it changes
/// every stored identity, so it only moves together with a migration.
pub const HASH_SCHEME_VERSION: u32 = 1;

/// Width of the identity hashes in hex characters (128 bits).
pub const IDENTITY_HASH_HEX_LEN: usize = 32;

// ---------------------------------------------------------------------------
// 1. Raw bundle
// ---------------------------------------------------------------------------

/// A point in a source file, as written in the bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub file_index: usize,
    pub line: u32,
    pub column: u32,
}

/// A `[start, end]` source range attached to an event or a control edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceRange {
    pub start: Location,
    pub end: Location,
}

/// One element of a bug path.
#[derive(Clone, Debug, PartialEq)]
pub enum PathElement {
    /// A narrated step: where it happens and what the analyzer says about it.
    Event(PathEvent),
    /// A pure control-flow location.
    Point(PathPoint),
}

impl PathElement {
    pub fn location(&self) -> Location {
        match self {
            PathElement::Event(event) => event.location,
            PathElement::Point(point) => point.location,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            PathElement::Event(event) => Some(event.message.as_str()),
            PathElement::Point(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PathEvent {
    pub location: Location,
    pub message: String,
    pub extended_message: Option<String>,
    pub depth: u32,
    pub ranges: Vec<SourceRange>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathPoint {
    pub location: Location,
}

/// One defect finding exactly as the analyzer emitted it. Every optional
/// field is optional because some schema generation leaves it out.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub category: String,
    pub type_: String,
    pub description: String,
    pub checker_name: Option<String>,
    pub location: Location,
    pub context_name: Option<String>,
    pub context_kind: Option<String>,
    pub path: Vec<PathElement>,
    pub notes: Vec<PathEvent>,
    /// `issue_hash_content_of_line_in_context`, when the analyzer wrote one.
    pub embedded_hash: Option<String>,
    /// `issue_hash_function_offset`: line offset of the defect from the start
    /// of its enclosing context, when the analyzer wrote one.
    pub function_offset: Option<i64>,
}

impl Diagnostic {
    pub fn has_embedded_hash(&self) -> bool {
        self.embedded_hash
            .as_deref()
            .is_some_and(|h| !h.trim().is_empty())
    }

    /// Every file index this diagnostic refers to, primary location first.
    pub fn file_indices(&self) -> impl Iterator<Item = usize> + '_ {
        let path_indices = self.path.iter().flat_map(|element| {
            let ranges: &[SourceRange] = match element {
                PathElement::Event(event) => &event.ranges,
                PathElement::Point(_) => &[],
            };
            std::iter::once(element.location().file_index).chain(
                ranges
                    .iter()
                    .flat_map(|r| [r.start.file_index, r.end.file_index]),
            )
        });
        let note_indices = self.notes.iter().map(|n| n.location.file_index);
        std::iter::once(self.location.file_index)
            .chain(path_indices)
            .chain(note_indices)
    }
}

/// Which plist generation produced a bundle, resolved once at parse time.
///
/// Ordered from oldest to newest; a bundle mixing diagnostics of different
/// shapes is tagged with the oldest shape it contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaGeneration {
    /// No checker names, no embedded hashes.
    Unnamed,
    /// Checker names present, hashes computed downstream (clang 3.7 era).
    NamedUnhashed,
    /// Checker names and embedded hashes present (clang 3.8 and later).
    NamedHashed,
}

impl SchemaGeneration {
    pub fn of(diagnostic: &Diagnostic) -> Self {
        match (
            diagnostic.checker_name.is_some(),
            diagnostic.has_embedded_hash(),
        ) {
            (true, true) => SchemaGeneration::NamedHashed,
            (true, false) => SchemaGeneration::NamedUnhashed,
            (false, _) => SchemaGeneration::Unnamed,
        }
    }
}

/// Parsed form of one analyzer invocation's output.
#[derive(Clone, Debug, PartialEq)]
pub struct DiagnosticBundle {
    pub files: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub generation: Option<SchemaGeneration>,
    pub clang_version: Option<String>,
}

impl DiagnosticBundle {
    pub fn empty() -> Self {
        Self {
            files: Vec::new(),
            diagnostics: Vec::new(),
            generation: None,
            clang_version: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn file_path(&self, index: usize) -> Option<&str> {
        self.files.get(index).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// 2. Normalized diagnostic
// ---------------------------------------------------------------------------

/// Where a resolved checker name came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckerProvenance {
    Declared,
    Inferred,
    Unresolved,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedDiagnostic {
    pub raw: Diagnostic,
    pub checker_name: String,
    pub provenance: CheckerProvenance,
}

impl NormalizedDiagnostic {
    pub fn is_unresolved(&self) -> bool {
        self.provenance == CheckerProvenance::Unresolved
    }
}

// ---------------------------------------------------------------------------
// 3. Hashes
// ---------------------------------------------------------------------------

/// Both identity hashes for one diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityHashes {
    pub content_hash: String,
    pub context_hash: String,
    /// Set when source text was unavailable and `content_hash` fell back to
    /// location-only canonicalization.
    pub degraded: bool,
}

// ---------------------------------------------------------------------------
// 4. Emitted records
// ---------------------------------------------------------------------------

/// A location with its file index resolved to the bundle path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ReportLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BugPathStepKind {
    Event,
    Point,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct BugPathStep {
    pub kind: BugPathStepKind,
    pub location: ReportLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One stable record per unique defect.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub check_name: String,
    pub checker_provenance: CheckerProvenance,
    pub category: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub description: String,
    pub location: ReportLocation,
    pub context_name: Option<String>,
    pub context_kind: Option<String>,
    pub content_hash: String,
    pub context_hash: String,
    pub hash_degraded: bool,
    /// The analyzer's own content hash, kept only for declared checker names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzer_hash: Option<String>,
    pub bug_path: Vec<BugPathStep>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<BugPathStep>,
}

/// A bundle file path and the digest of its bytes. `content_hash` is `None`
/// when the file could not be read at ingestion time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub path: String,
    pub content_hash: Option<String>,
    #[serde(skip)]
    pub content: Option<std::sync::Arc<[u8]>>,
}
