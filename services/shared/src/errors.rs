/// Shared error types for the submission pipeline services
///
/// Design Philosophy:
/// - One discriminated error kind per failure class so callers branch on
///   the variant, never on message text
/// - Retryability is a property of the kind, queried via `is_retryable()`
/// - Terminal outcomes always carry enough context to diagnose without
///   re-running (address, attempts, last observed cause)
use std::time::Duration;

use solana_sdk::{pubkey::Pubkey, signature::Signature};
use thiserror::Error;

/// Failure taxonomy for every pipeline operation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The ledger could not be reached or the connection dropped mid-call.
    /// Transient: safe to retry the same request.
    #[error("ledger transport error: {0}")]
    Transport(String),

    /// The ledger explicitly refused the request. Retrying the same request
    /// cannot succeed and only wastes fees.
    #[error("ledger rejected request: {0}")]
    Rejected(String),

    /// On-ledger state at {address} disagrees with what the caller declared.
    /// Requires operator intervention, never auto-resolved.
    #[error("provisioning conflict at {address}: {reason}")]
    ProvisioningConflict { address: Pubkey, reason: String },

    /// Fee parameters could not be fetched. Transient: the next attempt
    /// refetches them anyway.
    #[error("fee estimation failed: {0}")]
    Estimation(String),

    /// A requested top-up of {address} did not reflect in the balance
    /// within the configured wait. Counts as a failed attempt; the next
    /// attempt re-verifies funding from scratch.
    #[error("top-up of {address} not visible after {waited:?}")]
    TopUpTimeout { address: Pubkey, waited: Duration },

    /// The confirmation wait for a submitted transaction expired. The
    /// transaction may still have landed; re-query before resubmitting.
    #[error("confirmation wait expired for {signature}")]
    ConfirmTimeout { signature: Signature },

    /// The caller cancelled the operation. The ledger-side effect may or
    /// may not have landed; re-query to find out.
    #[error("operation cancelled")]
    Cancelled,

    /// All attempts were used up. Carries the last error observed so the
    /// failure can be diagnosed without re-running.
    #[error("gave up after {attempts} attempt(s): {last_error}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        last_error: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Whether a fresh attempt of the identical request can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Transport(_)
                | PipelineError::Estimation(_)
                | PipelineError::ConfirmTimeout { .. }
                | PipelineError::TopUpTimeout { .. }
        )
    }

    /// Stable machine-readable kind label, logged alongside failures.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Transport(_) => "transport",
            PipelineError::Rejected(_) => "rejected",
            PipelineError::ProvisioningConflict { .. } => "provisioning_conflict",
            PipelineError::Estimation(_) => "estimation",
            PipelineError::TopUpTimeout { .. } => "top_up_timeout",
            PipelineError::ConfirmTimeout { .. } => "confirm_timeout",
            PipelineError::Cancelled => "cancelled",
            PipelineError::ExhaustedRetries { .. } => "exhausted_retries",
        }
    }
}

// Convenience type alias
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability_by_kind() {
        assert!(PipelineError::Transport("connection reset".into()).is_retryable());
        assert!(PipelineError::Estimation("fee fetch failed".into()).is_retryable());
        assert!(PipelineError::TopUpTimeout {
            address: Pubkey::new_unique(),
            waited: Duration::from_secs(30),
        }
        .is_retryable());
        assert!(!PipelineError::Rejected("invalid signature".into()).is_retryable());
        assert!(!PipelineError::Cancelled.is_retryable());
        assert!(!PipelineError::ProvisioningConflict {
            address: Pubkey::new_unique(),
            reason: "owner mismatch".into(),
        }
        .is_retryable());
    }

    #[test]
    fn test_exhausted_retries_carries_cause() {
        let err = PipelineError::ExhaustedRetries {
            attempts: 5,
            last_error: Box::new(PipelineError::Transport("503".into())),
        };
        assert!(!err.is_retryable());
        let text = err.to_string();
        assert!(text.contains("5 attempt"));
        assert!(text.contains("503"));
    }

    #[test]
    fn test_conflict_display_names_address() {
        let address = Pubkey::new_unique();
        let err = PipelineError::ProvisioningConflict {
            address,
            reason: "data length 8, expected 16".into(),
        };
        assert!(err.to_string().contains(&address.to_string()));
        assert_eq!(err.kind(), "provisioning_conflict");
    }
}
