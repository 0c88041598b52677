use thiserror::Error;

/// Failures scoped to a single record, a single external call, or the
/// configuration itself. Batch-level I/O failures stay `anyhow` at the call
/// sites.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A field in a raw record could not be parsed or was missing. Fails that
    /// record only; the batch continues.
    #[error("malformed {field}: {detail}")]
    MalformedField { field: &'static str, detail: String },

    /// Invalid `feed_mode` in the settings file. Fatal before any feed I/O.
    #[error("unknown feed mode {0:?} (expected one of: batch, point, frame, off)")]
    UnknownFeedMode(String),

    /// The search engine or load generator rejected a call. The item is
    /// skipped and the run continues.
    #[error("search service error: {0}")]
    ExternalService(String),
}

impl PipelineError {
    pub fn malformed(field: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedField {
            field,
            detail: detail.into(),
        }
    }
}
