use thiserror::Error;

/// Failure taxonomy for the retrieval and alarm pipelines.
///
/// Insufficient evidence is deliberately absent: a rejected confidence gate
/// is a normal outcome that produces the fixed fallback answer, not an error.
#[derive(Debug, Error)]
pub enum CopilotError {
    #[error("index unavailable: build or load an index before querying")]
    IndexUnavailable,
    #[error("embedding model mismatch: index built with '{expected}', configured provider is '{found}'")]
    EmbeddingVersionMismatch { expected: String, found: String },
    #[error("no data for tag '{tag}' in the requested window")]
    NoDataInWindow { tag: String },
    #[error("retrieval timed out after {timeout_ms} ms")]
    RetrievalTimeout { timeout_ms: u64 },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CopilotError {
    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        CopilotError::Storage(err.to_string())
    }
}
