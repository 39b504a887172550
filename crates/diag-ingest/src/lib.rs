//! Diagnostic bundle ingestion for static-analyzer output.
//!
//! A bundle (one analyzer invocation's plist) is read into typed
//! diagnostics, normalized onto canonical checker names, given stable
//! identity hashes, and assembled into deduplicated reports plus a
//! content-addressed file registry. Bundles from every analyzer generation
//! go through the same pipeline; batches fan out over a worker pool with
//! per-bundle failure isolation.

pub mod assemble;
pub mod config;
pub mod errors;
pub mod hashing;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod reader;

#[cfg(test)]
mod testdata;

pub use assemble::{assemble, AssembledReports, FileRegistry};
pub use config::IngestConfig;
pub use errors::{IngestError, IngestResult};
pub use hashing::{FsSourceProvider, HashEngine, MemorySourceProvider, SourceProvider};
pub use models::{
    DiagnosticBundle, NormalizedDiagnostic, Report, SchemaGeneration, UNRESOLVED_CHECKER,
};
pub use normalize::{normalize, CheckerTable, CheckerTableHandle};
pub use pipeline::{discover_bundles, ingest, BundleResult, BundleStatus, Ingestor, IngestOutcome};
pub use reader::{read_bundle, read_bundle_file};
