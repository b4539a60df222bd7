use thiserror::Error;

/// Classification used by the scheduler to decide retry eligibility.
///
/// Every error raised anywhere in the pipeline (agents, the LLM gateway,
/// source connectors, the state store) reduces to one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input rejected before work started. Never retried.
    Validation,
    /// May succeed on retry (rate limit, network reset, 5xx).
    Transient,
    /// Definitive failure (400/404, malformed upstream output). Not retried.
    Permanent,
    /// Treated identically to `Transient`.
    Timeout,
    /// Originated from an external cancel or a sibling's critical failure.
    Cancelled,
    /// Programmer error or invariant violation. Fatal to the job.
    Internal,
}

/// Unified error type for the orchestration core.
#[derive(Error, Debug)]
pub enum ForgeError {
    /// Input failed validation before any work began.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A call failed in a way that may succeed if retried.
    #[error("transient failure: {0}")]
    Transient(String),

    /// A call failed in a way retrying cannot fix.
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// A suspension point exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The job or task was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// An invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),

    /// An outbound HTTP call failed; classified as transient by default.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON (de)serialization error; classified as internal.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error; classified as internal.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForgeError {
    /// Classifies this error for retry/cancellation decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForgeError::Validation(_) => ErrorKind::Validation,
            ForgeError::Transient(_) => ErrorKind::Transient,
            ForgeError::Permanent(_) => ErrorKind::Permanent,
            ForgeError::Timeout(_) => ErrorKind::Timeout,
            ForgeError::Cancelled => ErrorKind::Cancelled,
            ForgeError::Internal(_) => ErrorKind::Internal,
            ForgeError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    ErrorKind::Transient
                } else if let Some(status) = e.status() {
                    if status.is_server_error() || status.as_u16() == 429 {
                        ErrorKind::Transient
                    } else {
                        ErrorKind::Permanent
                    }
                } else {
                    ErrorKind::Transient
                }
            }
            ForgeError::Json(_) | ForgeError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for [`ForgeError::Transient`].
    pub fn transient(msg: impl Into<String>) -> Self {
        ForgeError::Transient(msg.into())
    }

    /// Shorthand for [`ForgeError::Permanent`].
    pub fn permanent(msg: impl Into<String>) -> Self {
        ForgeError::Permanent(msg.into())
    }

    /// Shorthand for [`ForgeError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        ForgeError::Validation(msg.into())
    }

    /// True if a task that failed with this error is eligible for retry
    /// (subject to the node's remaining retry budget).
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient | ErrorKind::Timeout)
    }
}

/// A convenience `Result` alias using [`ForgeError`].
pub type ForgeResult<T> = Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(ForgeError::transient("rate limited").is_retryable());
        assert!(ForgeError::Timeout("slow".into()).is_retryable());
    }

    #[test]
    fn permanent_and_validation_are_not_retryable() {
        assert!(!ForgeError::permanent("bad request").is_retryable());
        assert!(!ForgeError::validation("topic too short").is_retryable());
        assert!(!ForgeError::Cancelled.is_retryable());
    }
}
