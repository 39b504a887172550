//! Report assembly: dedup, file registry, and canonical report records.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use crate::assemble::files::FileRegistry;
use crate::errors::{IngestError, IngestResult};
use crate::hashing::source::SourceProvider;
use crate::models::{
    BugPathStep, BugPathStepKind, CheckerProvenance, IdentityHashes, Location,
    NormalizedDiagnostic, PathElement, PathEvent, Report, ReportLocation,
};

/// What a bundle contributes to storage.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssembledReports {
    pub reports: Vec<Report>,
    pub files: FileRegistry,
    pub duplicates_dropped: usize,
}

/// Identity of a finding for duplicate detection: primary location plus the
/// ordered path with messages. A diagnostic without a path falls back to its
/// description so distinct path-less findings at one spot stay apart.
#[derive(Hash, PartialEq, Eq)]
struct PathSignature<'a> {
    location: Location,
    steps: Vec<(Location, Option<&'a str>)>,
    description: Option<&'a str>,
}

impl<'a> PathSignature<'a> {
    fn of(diagnostic: &'a NormalizedDiagnostic) -> Self {
        let raw = &diagnostic.raw;
        let steps: Vec<_> = raw
            .path
            .iter()
            .map(|element| (element.location(), element.message()))
            .collect();
        let description = steps.is_empty().then_some(raw.description.as_str());
        Self {
            location: raw.location,
            steps,
            description,
        }
    }
}

/// Build reports in bundle order from normalized diagnostics and their
/// hashes (`hashes[i]` belongs to `diagnostics[i]`). Inputs are only read.
pub fn assemble(
    files: &[String],
    diagnostics: &[NormalizedDiagnostic],
    hashes: &[IdentityHashes],
    sources: &dyn SourceProvider,
) -> IngestResult<AssembledReports> {
    if diagnostics.len() != hashes.len() {
        return Err(IngestError::malformed(format!(
            "{} diagnostics but {} hash results",
            diagnostics.len(),
            hashes.len()
        )));
    }

    let mut seen: HashSet<PathSignature<'_>> = HashSet::with_capacity(diagnostics.len());
    let mut referenced: BTreeSet<usize> = BTreeSet::new();
    let mut reports = Vec::with_capacity(diagnostics.len());
    let mut duplicates_dropped = 0;

    for (diagnostic, identity) in diagnostics.iter().zip(hashes) {
        if !seen.insert(PathSignature::of(diagnostic)) {
            duplicates_dropped += 1;
            debug!(
                "dropping duplicate {} finding at line {}",
                diagnostic.checker_name, diagnostic.raw.location.line
            );
            continue;
        }
        referenced.extend(diagnostic.raw.file_indices());
        reports.push(build_report(files, diagnostic, identity)?);
    }

    let mut registry = FileRegistry::new();
    for index in referenced {
        registry.register(resolve(files, index)?, sources);
    }

    Ok(AssembledReports {
        reports,
        files: registry,
        duplicates_dropped,
    })
}

fn resolve(files: &[String], index: usize) -> IngestResult<&str> {
    files
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| IngestError::malformed(format!("file index {index} out of range")))
}

fn report_location(files: &[String], location: Location) -> IngestResult<ReportLocation> {
    Ok(ReportLocation {
        file: resolve(files, location.file_index)?.to_string(),
        line: location.line,
        column: location.column,
    })
}

fn event_step(files: &[String], event: &PathEvent) -> IngestResult<BugPathStep> {
    Ok(BugPathStep {
        kind: BugPathStepKind::Event,
        location: report_location(files, event.location)?,
        message: Some(event.message.clone()),
    })
}

fn build_report(
    files: &[String],
    diagnostic: &NormalizedDiagnostic,
    identity: &IdentityHashes,
) -> IngestResult<Report> {
    let raw = &diagnostic.raw;

    let bug_path = raw
        .path
        .iter()
        .map(|element| match element {
            PathElement::Event(event) => event_step(files, event),
            PathElement::Point(point) => Ok(BugPathStep {
                kind: BugPathStepKind::Point,
                location: report_location(files, point.location)?,
                message: None,
            }),
        })
        .collect::<IngestResult<Vec<_>>>()?;

    let notes = raw
        .notes
        .iter()
        .map(|note| event_step(files, note))
        .collect::<IngestResult<Vec<_>>>()?;

    let analyzer_hash = match diagnostic.provenance {
        CheckerProvenance::Declared if raw.has_embedded_hash() => raw.embedded_hash.clone(),
        _ => None,
    };

    Ok(Report {
        check_name: diagnostic.checker_name.clone(),
        checker_provenance: diagnostic.provenance,
        category: raw.category.clone(),
        type_: raw.type_.clone(),
        description: raw.description.clone(),
        location: report_location(files, raw.location)?,
        context_name: raw.context_name.clone(),
        context_kind: raw.context_kind.clone(),
        content_hash: identity.content_hash.clone(),
        context_hash: identity.context_hash.clone(),
        hash_degraded: identity.degraded,
        analyzer_hash,
        bug_path,
        notes,
    })
}
