//! Ingestion settings, with environment overrides.

use std::path::PathBuf;

use crate::errors::{IngestError, IngestResult};

pub const ENV_WORKERS: &str = "DIAG_INGEST_WORKERS";
pub const ENV_CONTEXT_WINDOW: &str = "DIAG_INGEST_CONTEXT_WINDOW";
pub const ENV_MAX_CONTEXT_SCAN: &str = "DIAG_INGEST_MAX_CONTEXT_SCAN";
pub const ENV_SOURCE_ROOT: &str = "DIAG_INGEST_SOURCE_ROOT";
pub const ENV_CHECKER_TABLE: &str = "DIAG_INGEST_CHECKER_TABLE";

pub const DEFAULT_CONTEXT_WINDOW: usize = 1;
pub const MAX_CONTEXT_WINDOW: usize = 8;
pub const DEFAULT_MAX_CONTEXT_SCAN: usize = 2000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestConfig {
    /// Upper bound on bundles ingested concurrently by a batch.
    pub workers: usize,
    /// Non-blank neighbour lines taken on each side of the defect line.
    pub context_window: usize,
    /// Lines scanned backwards when looking for the enclosing context.
    pub max_context_scan: usize,
    /// Base for resolving relative bundle paths when reading sources.
    pub source_root: Option<PathBuf>,
    /// JSON checker table replacing the built-in one.
    pub checker_table: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            context_window: DEFAULT_CONTEXT_WINDOW,
            max_context_scan: DEFAULT_MAX_CONTEXT_SCAN,
            source_root: None,
            checker_table: None,
        }
    }
}

impl IngestConfig {
    /// Defaults overridden by any `DIAG_INGEST_*` variables that are set.
    pub fn from_env() -> IngestResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`IngestConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> IngestResult<Self> {
        let mut config = Self::default();
        if let Some(value) = non_empty(lookup(ENV_WORKERS)) {
            config.workers = parse_count(ENV_WORKERS, &value)?.max(1);
        }
        if let Some(value) = non_empty(lookup(ENV_CONTEXT_WINDOW)) {
            config.context_window = parse_count(ENV_CONTEXT_WINDOW, &value)?;
        }
        if let Some(value) = non_empty(lookup(ENV_MAX_CONTEXT_SCAN)) {
            config.max_context_scan = parse_count(ENV_MAX_CONTEXT_SCAN, &value)?;
        }
        if let Some(value) = non_empty(lookup(ENV_SOURCE_ROOT)) {
            config.source_root = Some(PathBuf::from(value));
        }
        if let Some(value) = non_empty(lookup(ENV_CHECKER_TABLE)) {
            config.checker_table = Some(PathBuf::from(value));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> IngestResult<()> {
        if self.workers == 0 {
            return Err(IngestError::Config("workers must be at least 1".into()));
        }
        if self.context_window > MAX_CONTEXT_WINDOW {
            return Err(IngestError::Config(format!(
                "context_window {} exceeds maximum {MAX_CONTEXT_WINDOW}",
                self.context_window
            )));
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_count(key: &str, value: &str) -> IngestResult<usize> {
    value
        .parse::<usize>()
        .map_err(|_| IngestError::Config(format!("{key}={value:?} is not a non-negative integer")))
}
