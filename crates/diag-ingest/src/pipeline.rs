//! Per-bundle ingestion pipeline and Rayon-based batch ingestion.
//!
//! read -> normalize -> hash -> assemble, sequential within one bundle.
//! Bundles are independent, so a batch fans them out over a pool bounded by
//! `IngestConfig::workers`; one failing bundle never affects its siblings.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::assemble::{assemble, FileRegistry};
use crate::config::IngestConfig;
use crate::errors::{IngestError, IngestResult};
use crate::hashing::{FsSourceProvider, HashEngine, SourceProvider};
use crate::models::{
    CheckerProvenance, DiagnosticBundle, IdentityHashes, NormalizedDiagnostic, Report,
    SchemaGeneration,
};
use crate::normalize::{normalize, CheckerTable, CheckerTableHandle};
use crate::reader::read_bundle;

pub const BUNDLE_EXTENSION: &str = "plist";

/// Everything one bundle yields.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub generation: Option<SchemaGeneration>,
    pub clang_version: Option<String>,
    pub reports: Vec<Report>,
    pub files: FileRegistry,
    pub duplicates_dropped: usize,
}

impl IngestOutcome {
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Reports whose content hash had to fall back to location only.
    pub fn degraded_count(&self) -> usize {
        self.reports.iter().filter(|r| r.hash_degraded).count()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded_count() > 0
    }

    /// Reports whose checker name is the unresolved sentinel.
    pub fn unresolved_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.checker_provenance == CheckerProvenance::Unresolved)
            .count()
    }

    pub fn to_json(&self) -> IngestResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Ingest one bundle held in memory.
pub fn ingest(
    bytes: &[u8],
    table: &CheckerTable,
    sources: &dyn SourceProvider,
    config: &IngestConfig,
) -> IngestResult<IngestOutcome> {
    let started = Instant::now();
    let DiagnosticBundle {
        files,
        diagnostics,
        generation,
        clang_version,
    } = read_bundle(bytes)?;
    if diagnostics.is_empty() {
        return Ok(IngestOutcome {
            generation,
            clang_version,
            ..IngestOutcome::default()
        });
    }

    let normalized: Vec<NormalizedDiagnostic> = diagnostics
        .into_iter()
        .map(|raw| normalize(raw, table))
        .collect();

    let unresolved = normalized.iter().filter(|n| n.is_unresolved()).count();
    if unresolved > 0 {
        warn!("{unresolved} diagnostics have no resolvable checker name");
    }

    let engine = HashEngine::new(sources, config);
    let hashes = normalized
        .iter()
        .map(|diagnostic| {
            let index = diagnostic.raw.location.file_index;
            let path = files.get(index).ok_or_else(|| {
                IngestError::malformed(format!("file index {index} out of range"))
            })?;
            Ok(engine.compute(diagnostic, path))
        })
        .collect::<IngestResult<Vec<IdentityHashes>>>()?;

    let assembled = assemble(&files, &normalized, &hashes, sources)?;
    let outcome = IngestOutcome {
        generation,
        clang_version,
        reports: assembled.reports,
        files: assembled.files,
        duplicates_dropped: assembled.duplicates_dropped,
    };

    info!(
        "ingested bundle: {} reports, {} files, {} degraded, {} duplicates dropped in {}ms",
        outcome.reports.len(),
        outcome.files.len(),
        outcome.degraded_count(),
        outcome.duplicates_dropped,
        started.elapsed().as_millis()
    );
    Ok(outcome)
}

/// One bundle's result inside a batch.
#[derive(Debug)]
pub struct BundleResult {
    pub path: PathBuf,
    pub outcome: IngestResult<IngestOutcome>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleStatus {
    Ok,
    Degraded,
    Failed,
}

impl BundleResult {
    pub fn status(&self) -> BundleStatus {
        match &self.outcome {
            Ok(outcome) if outcome.is_degraded() => BundleStatus::Degraded,
            Ok(_) => BundleStatus::Ok,
            Err(_) => BundleStatus::Failed,
        }
    }
}

/// Where an [`Ingestor`] reads source text from.
enum Sources {
    /// A caller-owned provider used for every bundle as is.
    Shared(Arc<dyn SourceProvider>),
    /// A fresh filesystem provider per bundle under an optional root, so
    /// cached file contents never outlive one ingestion.
    PerBundle(Option<PathBuf>),
}

/// Long-lived ingestion front end: configuration, the active checker table,
/// and where each pipeline it runs reads sources from.
pub struct Ingestor {
    config: IngestConfig,
    table: CheckerTableHandle,
    sources: Sources,
}

impl Ingestor {
    pub fn new(
        config: IngestConfig,
        table: CheckerTableHandle,
        sources: Arc<dyn SourceProvider>,
    ) -> IngestResult<Self> {
        Self::with_sources(config, table, Sources::Shared(sources))
    }

    fn with_sources(
        config: IngestConfig,
        table: CheckerTableHandle,
        sources: Sources,
    ) -> IngestResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            table,
            sources,
        })
    }

    /// Filesystem sources under `config.source_root`, re-read for every
    /// bundle, and the checker table from `config.checker_table` or the
    /// built-in one.
    pub fn from_config(config: IngestConfig) -> IngestResult<Self> {
        let table = match &config.checker_table {
            Some(path) => CheckerTable::from_path(path)?,
            None => CheckerTable::builtin(),
        };
        let sources = Sources::PerBundle(config.source_root.clone());
        Self::with_sources(config, CheckerTableHandle::new(table), sources)
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn checker_table(&self) -> &CheckerTableHandle {
        &self.table
    }

    pub fn ingest_bytes(&self, bytes: &[u8]) -> IngestResult<IngestOutcome> {
        let table = self.table.snapshot();
        match &self.sources {
            Sources::Shared(sources) => ingest(bytes, &table, sources.as_ref(), &self.config),
            Sources::PerBundle(root) => {
                let sources = FsSourceProvider::new(root.clone());
                ingest(bytes, &table, &sources, &self.config)
            }
        }
    }

    pub fn ingest_file(&self, path: &Path) -> IngestResult<IngestOutcome> {
        info!("ingesting bundle {}", path.display());
        let bytes = std::fs::read(path)?;
        self.ingest_bytes(&bytes)
    }

    fn ingest_logged(&self, path: &Path) -> BundleResult {
        let outcome = self.ingest_file(path);
        if let Err(e) = &outcome {
            warn!("bundle {} failed: {e}", path.display());
        }
        BundleResult {
            path: path.to_path_buf(),
            outcome,
        }
    }

    /// Ingest several bundles concurrently. Results come back in input
    /// order, one per path.
    pub fn ingest_batch(&self, paths: &[PathBuf]) -> Vec<BundleResult> {
        if paths.is_empty() {
            return vec![];
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.max(1))
            .build();

        let results: Vec<BundleResult> = match pool {
            Ok(pool) => pool.install(|| {
                paths
                    .par_iter()
                    .map(|path| self.ingest_logged(path))
                    .collect()
            }),
            Err(e) => {
                warn!("thread pool unavailable ({e}), ingesting sequentially");
                paths.iter().map(|path| self.ingest_logged(path)).collect()
            }
        };

        let failed = results
            .iter()
            .filter(|r| r.status() == BundleStatus::Failed)
            .count();
        info!(
            "batch finished: {} bundles, {} failed",
            results.len(),
            failed
        );
        results
    }

    /// Discover and ingest every bundle below `dir`.
    pub fn ingest_directory(&self, dir: &Path) -> IngestResult<Vec<BundleResult>> {
        let paths = discover_bundles(dir)?;
        Ok(self.ingest_batch(&paths))
    }
}

/// Every `*.plist` file below `dir`, sorted for a deterministic batch order.
pub fn discover_bundles(dir: &Path) -> IngestResult<Vec<PathBuf>> {
    let mut bundles = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|e| match e.into_io_error() {
            Some(io) => IngestError::Io(io),
            None => IngestError::Config(format!("cannot walk {}", dir.display())),
        })?;
        let is_bundle = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(BUNDLE_EXTENSION));
        if is_bundle {
            bundles.push(entry.into_path());
        }
    }
    bundles.sort();
    Ok(bundles)
}
