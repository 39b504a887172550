//! Checker-name resolution across schema generations.

use tracing::debug;

use crate::models::{CheckerProvenance, Diagnostic, NormalizedDiagnostic, UNRESOLVED_CHECKER};
use crate::normalize::checker_table::CheckerTable;

/// Resolve the checker name of one diagnostic. Never fails: an unknown
/// description yields [`UNRESOLVED_CHECKER`] with `Unresolved` provenance.
///
/// A declared name always wins over the table, even when the table maps the
/// same description to a different checker.
pub fn normalize(raw: Diagnostic, table: &CheckerTable) -> NormalizedDiagnostic {
    if let Some(declared) = raw.checker_name.as_deref().map(str::trim) {
        if let Some(inferred) = table.lookup(&raw.description) {
            if inferred != declared {
                debug!(
                    "declared checker {declared:?} differs from table entry {inferred:?} for {:?}",
                    raw.description
                );
            }
        }
        let checker_name = declared.to_string();
        return NormalizedDiagnostic {
            raw,
            checker_name,
            provenance: CheckerProvenance::Declared,
        };
    }

    match table.lookup(&raw.description) {
        Some(inferred) => {
            let checker_name = inferred.to_string();
            NormalizedDiagnostic {
                raw,
                checker_name,
                provenance: CheckerProvenance::Inferred,
            }
        }
        None => NormalizedDiagnostic {
            raw,
            checker_name: UNRESOLVED_CHECKER.to_string(),
            provenance: CheckerProvenance::Unresolved,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;

    fn diagnostic(description: &str, checker_name: Option<&str>) -> Diagnostic {
        Diagnostic {
            category: "Logic error".to_string(),
            type_: "Division by zero".to_string(),
            description: description.to_string(),
            checker_name: checker_name.map(str::to_string),
            location: Location {
                file_index: 0,
                line: 7,
                column: 14,
            },
            context_name: Some("generate_id".to_string()),
            context_kind: Some("function".to_string()),
            path: Vec::new(),
            notes: Vec::new(),
            embedded_hash: None,
            function_offset: None,
        }
    }

    #[test]
    fn test_declared_name_used_verbatim() {
        let table = CheckerTable::builtin();
        let n = normalize(diagnostic("Division by zero", Some("core.DivideZero")), &table);
        assert_eq!(n.checker_name, "core.DivideZero");
        assert_eq!(n.provenance, CheckerProvenance::Declared);
    }

    #[test]
    fn test_inferred_from_description() {
        let table = CheckerTable::builtin();
        let n = normalize(diagnostic("Division by zero", None), &table);
        assert_eq!(n.checker_name, "core.DivideZero");
        assert_eq!(n.provenance, CheckerProvenance::Inferred);
    }

    #[test]
    fn test_unmatched_description_is_sentinel() {
        let table = CheckerTable::builtin();
        let n = normalize(diagnostic("Address of stack memory leaks", None), &table);
        assert_eq!(n.checker_name, UNRESOLVED_CHECKER);
        assert_eq!(n.checker_name, "NOT FOUND");
        assert!(n.is_unresolved());
    }

    #[test]
    fn test_declared_wins_over_conflicting_table() {
        let table = CheckerTable::builtin();
        let n = normalize(diagnostic("Division by zero", Some("alpha.Renamed")), &table);
        assert_eq!(n.checker_name, "alpha.Renamed");
        assert_eq!(n.provenance, CheckerProvenance::Declared);
    }

    #[test]
    fn test_empty_table_never_fails() {
        let table = CheckerTable::default();
        let n = normalize(diagnostic("Division by zero", None), &table);
        assert!(n.is_unresolved());
        assert_eq!(n.raw.description, "Division by zero");
    }
}
