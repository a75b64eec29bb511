use thiserror::Error;

/// Failures raised while loading. Variants split into batch-scoped ones, recovered at
/// the batch boundary, and run-fatal ones (see [`Error::is_fatal`]).
#[derive(Debug, Error)]
pub enum Error {
    #[error("source: {0}")]
    Source(String),
    #[error("source page not ready after {0:?}")]
    SourceTimeout(std::time::Duration),
    #[error("enrichment request failed: {0}")]
    EnrichmentTransport(String),
    #[error("enrichment service returned status {0}")]
    EnrichmentStatus(u16),
    #[error("decoding enrichment response: {0}")]
    EnrichmentDecode(#[source] serde_json::Error),
    #[error("enrichment returned {got} keys for {expected} names")]
    EnrichmentMisaligned { expected: usize, got: usize },
    #[error("encoding document {id}: {source}")]
    Encode { id: String, #[source] source: serde_json::Error },
    #[error("bulk submission failed: {0}")]
    SubmissionTransport(String),
    #[error("bulk submission rejected with status {status}")]
    SubmissionRejected { status: u16 },
    #[error("decoding bulk response: {0}")]
    ResponseDecode(#[source] serde_json::Error),
    #[error("document {id} not created (status {status}): {reason}")]
    DocumentRejected { id: String, status: u16, reason: String },
    #[error("batch worker failed: {0}")]
    Worker(String),
    #[error("run cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the run must stop. Only submission failures are isolated to their batch.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::SubmissionTransport(_) | Error::SubmissionRejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
