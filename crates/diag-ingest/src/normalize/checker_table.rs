//! Description to checker-name lookup for bundles that predate `check_name`.
//!
//! The table is configuration data: a built-in set covering the analyzer
//! checkers known when this crate was built, replaceable by a JSON file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;
use serde::Deserialize;
use tracing::info;

use crate::errors::{IngestError, IngestResult};

/// `(description, checker)` pairs matched verbatim.
const BUILTIN_EXACT: &[(&str, &str)] = &[
    ("Division by zero", "core.DivideZero"),
    ("Dereference of null pointer", "core.NullDereference"),
    ("Dereference of undefined pointer value", "core.NullDereference"),
    ("Called function pointer is null (null dereference)", "core.CallAndMessage"),
    ("Called function pointer is an uninitialized pointer value", "core.CallAndMessage"),
    ("Function call argument is an uninitialized value", "core.CallAndMessage"),
    ("The left operand of '==' is a garbage value", "core.UndefinedBinaryOperatorResult"),
    ("Undefined or garbage value returned to caller", "core.uninitialized.UndefReturn"),
    ("Assigned value is garbage or undefined", "core.uninitialized.Assign"),
    ("Branch condition evaluates to a garbage value", "core.uninitialized.Branch"),
    ("Potential memory leak", "unix.Malloc"),
    ("Use of memory after it is freed", "unix.Malloc"),
    ("Attempt to free released memory", "unix.Malloc"),
    ("Null pointer passed as an argument to a 'nonnull' parameter", "core.NonNullParamChecker"),
    ("Call to 'malloc' has an allocation size of 0 bytes", "unix.API"),
    ("Call to function 'strcpy' is insecure as it does not provide bounding of the memory buffer. Replace unbounded copy functions with analogous functions that support length arguments such as 'strlcpy'. CWE-119", "security.insecureAPI.strcpy"),
    ("Call to function 'gets' is extremely insecure as it can always result in a buffer overflow", "security.insecureAPI.gets"),
];

/// `(pattern, checker)` pairs tried in order after the exact table misses.
const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    (r"^Value stored to '.+' is never read$", "deadcode.DeadStores"),
    (r"^Value stored to '.+' during its initialization is never read$", "deadcode.DeadStores"),
    (r"^Although the value stored to '.+' is used in the enclosing expression, the value is never actually read from '.+'$", "deadcode.DeadStores"),
    (r"^Access to field '.+' results in a dereference of a null pointer", "core.NullDereference"),
    (r"^Address of stack memory associated with local variable '.+' returned to caller$", "core.StackAddressEscape"),
    (r"^Memory is never released; potential leak of memory pointed to by '.+'$", "unix.Malloc"),
    (r"^Potential leak of memory pointed to by '.+'$", "unix.Malloc"),
];

#[derive(Debug, Deserialize)]
struct TableFile {
    checkers: Vec<TableEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableEntry {
    checker: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
}

/// Immutable lookup table; share it by reference or through an `Arc`.
#[derive(Debug, Default)]
pub struct CheckerTable {
    exact: HashMap<String, String>,
    patterns: Vec<(Regex, String)>,
}

impl CheckerTable {
    pub fn builtin() -> Self {
        let exact = BUILTIN_EXACT
            .iter()
            .map(|(d, c)| (d.to_string(), c.to_string()))
            .collect();
        let patterns = BUILTIN_PATTERNS
            .iter()
            .filter_map(|(p, c)| Regex::new(p).ok().map(|re| (re, c.to_string())))
            .collect();
        Self { exact, patterns }
    }

    pub fn from_json_str(json: &str) -> IngestResult<Self> {
        let file: TableFile = serde_json::from_str(json)
            .map_err(|e| IngestError::Config(format!("checker table: {e}")))?;
        let mut table = Self::default();
        for (index, entry) in file.checkers.into_iter().enumerate() {
            let checker = entry.checker.trim().to_string();
            if checker.is_empty() {
                return Err(IngestError::Config(format!(
                    "checker table entry {index} has an empty checker name"
                )));
            }
            match (entry.description, entry.pattern) {
                (Some(description), None) => {
                    table.exact.entry(description).or_insert(checker);
                }
                (None, Some(pattern)) => {
                    table.patterns.push((Regex::new(&pattern)?, checker));
                }
                _ => {
                    return Err(IngestError::Config(format!(
                        "checker table entry {index} needs exactly one of description or pattern"
                    )))
                }
            }
        }
        Ok(table)
    }

    pub fn from_path(path: &Path) -> IngestResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&json)?;
        info!(
            "loaded checker table from {}: {} descriptions, {} patterns",
            path.display(),
            table.exact.len(),
            table.patterns.len()
        );
        Ok(table)
    }

    /// The checker a description belongs to, if the table knows it.
    pub fn lookup(&self, description: &str) -> Option<&str> {
        let description = description.trim();
        if let Some(checker) = self.exact.get(description) {
            return Some(checker.as_str());
        }
        self.patterns
            .iter()
            .find(|(re, _)| re.is_match(description))
            .map(|(_, checker)| checker.as_str())
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reloadable holder for the active table. Pipelines take a snapshot at
/// the start of a bundle and keep it until the bundle is done.
#[derive(Clone, Debug)]
pub struct CheckerTableHandle {
    current: Arc<RwLock<Arc<CheckerTable>>>,
}

impl CheckerTableHandle {
    pub fn new(table: CheckerTable) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    pub fn snapshot(&self) -> Arc<CheckerTable> {
        self.current.read().clone()
    }

    pub fn replace(&self, table: CheckerTable) {
        *self.current.write() = Arc::new(table);
    }

    /// Load a table from disk and swap it in. On error the active table is
    /// left untouched.
    pub fn reload_from(&self, path: &Path) -> IngestResult<()> {
        let table = CheckerTable::from_path(path)?;
        self.replace(table);
        Ok(())
    }
}

impl Default for CheckerTableHandle {
    fn default() -> Self {
        Self::new(CheckerTable::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_patterns_compile() {
        let table = CheckerTable::builtin();
        assert_eq!(table.patterns.len(), BUILTIN_PATTERNS.len());
        assert_eq!(table.len(), BUILTIN_EXACT.len() + BUILTIN_PATTERNS.len());
    }

    #[test]
    fn test_exact_lookup() {
        let table = CheckerTable::builtin();
        assert_eq!(table.lookup("Division by zero"), Some("core.DivideZero"));
        assert_eq!(table.lookup("  Division by zero "), Some("core.DivideZero"));
    }

    #[test]
    fn test_pattern_lookup() {
        let table = CheckerTable::builtin();
        assert_eq!(
            table.lookup("Value stored to 'unused' is never read"),
            Some("deadcode.DeadStores")
        );
    }

    #[test]
    fn test_unknown_description() {
        let table = CheckerTable::builtin();
        assert_eq!(table.lookup("Something no checker says"), None);
        assert_eq!(table.lookup(""), None);
    }

    #[test]
    fn test_json_table() {
        let json = r#"{"checkers": [
            {"checker": "core.DivideZero", "description": "Division by zero"},
            {"checker": "alpha.Custom", "pattern": "^Custom .* found$"}
        ]}"#;
        let table = CheckerTable::from_json_str(json).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("Custom thing found"), Some("alpha.Custom"));
        assert_eq!(table.lookup("Value stored to 'x' is never read"), None);
    }

    #[test]
    fn test_json_table_rejects_ambiguous_entry() {
        let json = r#"{"checkers": [
            {"checker": "a.B", "description": "x", "pattern": "y"}
        ]}"#;
        let err = CheckerTable::from_json_str(json).unwrap_err();
        assert_eq!(err.kind(), "config_error");
    }

    #[test]
    fn test_json_table_rejects_bad_regex() {
        let json = r#"{"checkers": [{"checker": "a.B", "pattern": "("}]}"#;
        let err = CheckerTable::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("invalid checker pattern"));
    }

    #[test]
    fn test_handle_reload_keeps_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkers.json");
        std::fs::write(
            &path,
            r#"{"checkers": [{"checker": "x.Renamed", "description": "Division by zero"}]}"#,
        )
        .unwrap();

        let handle = CheckerTableHandle::default();
        let before = handle.snapshot();
        handle.reload_from(&path).unwrap();
        let after = handle.snapshot();

        assert_eq!(before.lookup("Division by zero"), Some("core.DivideZero"));
        assert_eq!(after.lookup("Division by zero"), Some("x.Renamed"));
    }

    #[test]
    fn test_handle_reload_failure_keeps_table() {
        let handle = CheckerTableHandle::default();
        let missing = Path::new("/nonexistent/checkers.json");
        assert!(handle.reload_from(missing).is_err());
        assert_eq!(
            handle.snapshot().lookup("Division by zero"),
            Some("core.DivideZero")
        );
    }
}
