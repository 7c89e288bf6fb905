//! Error taxonomy for a sync cycle.
//!
//! Every variant carries owned text so errors can be kept in a `CycleResult`
//! and exposed through the status endpoint after the cycle is over.

use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("authentication to the monitoring source failed: {0}")]
    Auth(String),

    #[error("monitoring source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("monitoring source returned a malformed service tree: {0}")]
    SourceMalformed(String),

    #[error("status page unavailable: {0}")]
    TargetUnavailable(String),

    #[error("status page state is inconsistent: {0}")]
    TargetInconsistent(String),

    #[error("failed to {operation}: {reason}")]
    ApplyFailed { operation: String, reason: String },

    #[error("alert delivery failed: {0}")]
    AlertDeliveryFailed(String),
}

impl SyncError {
    pub fn apply_failed(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::ApplyFailed {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-readable tag, used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::SourceMalformed(_) => "source_malformed",
            Self::TargetUnavailable(_) => "target_unavailable",
            Self::TargetInconsistent(_) => "target_inconsistent",
            Self::ApplyFailed { .. } => "apply_failed",
            Self::AlertDeliveryFailed(_) => "alert_delivery_failed",
        }
    }
}

impl Serialize for SyncError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_failed_renders_operation_and_reason() {
        let err = SyncError::apply_failed("create component 'Tokyo'", "HTTP 422");
        assert_eq!(err.to_string(), "failed to create component 'Tokyo': HTTP 422");
        assert_eq!(err.kind(), "apply_failed");
    }
}
