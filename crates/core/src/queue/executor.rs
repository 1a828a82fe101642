//! Remote executor contract: the narrow seam to the remote service.

use async_trait::async_trait;
use thiserror::Error;

use super::model::MutationType;

/// Retry policy classification for execution failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
}

/// One dispatch handed to the remote executor. `entity_id` has already been
/// reconciled to a server id where a mapping exists.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionRequest<'a> {
    pub mutation_type: MutationType,
    pub entity_id: &'a str,
    pub payload: &'a str,
}

/// Successful execution result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Server-assigned id for create-type mutations.
    pub server_assigned_id: Option<String>,
}

impl ExecutionOutcome {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_server_id(id: impl Into<String>) -> Self {
        Self {
            server_assigned_id: Some(id.into()),
        }
    }
}

/// Typed execution failure.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Could not reach the remote service at all.
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    /// Transient server-side condition (5xx-equivalent, throttling).
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The request as sent will never succeed (validation failure, conflict).
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("no executor capability for mutation type {0:?}")]
    Unsupported(MutationType),
}

impl ExecutionError {
    /// Classify for retry policy. Permanent failures are abandoned without
    /// spending the retry budget.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Network(_) | Self::Timeout | Self::Server { .. } => RetryClass::Retryable,
            Self::Rejected { .. } | Self::Unsupported(_) => RetryClass::Permanent,
        }
    }
}

/// Performs the actual network call for one mutation.
///
/// Supplied externally; the sync engine depends only on this contract, not on
/// any concrete HTTP client.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(
        &self,
        request: ExecutionRequest<'_>,
    ) -> std::result::Result<ExecutionOutcome, ExecutionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_class_separates_transient_from_terminal() {
        let transient = ExecutionError::Server {
            status: 503,
            message: "upstream unavailable".to_string(),
        };
        assert_eq!(transient.retry_class(), RetryClass::Retryable);
        assert_eq!(ExecutionError::Timeout.retry_class(), RetryClass::Retryable);
        assert_eq!(
            ExecutionError::Network("dns failure".to_string()).retry_class(),
            RetryClass::Retryable
        );

        let terminal = ExecutionError::Rejected {
            status: 422,
            message: "rating out of range".to_string(),
        };
        assert_eq!(terminal.retry_class(), RetryClass::Permanent);
        assert_eq!(
            ExecutionError::Unsupported(MutationType::UploadImage).retry_class(),
            RetryClass::Permanent
        );
    }
}
