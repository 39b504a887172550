//! Error types for the diagnostic ingestion core.

/// Bundle-scoped failures. Recoverable conditions (empty bundles, unresolved
/// checker names, unreadable sources) are reported through result data and
/// never show up here.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Malformed bundle: {0}")]
    MalformedBundle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<quick_xml::Error> for IngestError {
    fn from(err: quick_xml::Error) -> Self {
        IngestError::MalformedBundle(format!("XML syntax: {err}"))
    }
}

impl From<regex::Error> for IngestError {
    fn from(err: regex::Error) -> Self {
        IngestError::Config(format!("invalid checker pattern: {err}"))
    }
}

impl IngestError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        IngestError::MalformedBundle(msg.into())
    }

    /// Short machine-readable cause label used in batch summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::MalformedBundle(_) => "malformed_bundle",
            IngestError::Io(_) => "io_error",
            IngestError::Config(_) => "config_error",
            IngestError::Json(_) => "json_error",
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
