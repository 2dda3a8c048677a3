//! Fee and rent budgeting
//!
//! Computes the lamports a payer must hold before an operation is
//! attempted. Parameters are fetched fresh on every call since network
//! fees and rent schedules drift over time.

use shared::{FeeBudget, FeeParameters, PipelineError, PipelineResult};
use std::sync::Arc;

use crate::ledger::LedgerClient;

/// Default safety buffer on the per-signature fee. A heuristic, not a
/// derived value; tune per deployment.
pub const DEFAULT_FEE_SAFETY_MULTIPLIER: u64 = 100;

#[derive(Clone)]
pub struct FeeEstimator {
    ledger: Arc<dyn LedgerClient>,
    safety_multiplier: u64,
}

impl FeeEstimator {
    pub fn new(ledger: Arc<dyn LedgerClient>, safety_multiplier: u64) -> Self {
        Self {
            ledger,
            safety_multiplier,
        }
    }

    /// Budget for an operation that provisions `data_size` bytes of account
    /// data (0 when no account is being created) and carries
    /// `expected_signatures` signatures.
    pub async fn estimate(
        &self,
        data_size: usize,
        expected_signatures: usize,
    ) -> PipelineResult<FeeBudget> {
        let params = self
            .ledger
            .fee_parameters(data_size)
            .await
            .map_err(|err| match err {
                PipelineError::Transport(msg) => PipelineError::Estimation(msg),
                other => other,
            })?;

        Ok(Self::budget_from(
            params,
            data_size,
            expected_signatures,
            self.safety_multiplier,
        ))
    }

    /// Pure budget arithmetic, separated out so it is testable without a
    /// ledger.
    pub fn budget_from(
        params: FeeParameters,
        data_size: usize,
        expected_signatures: usize,
        safety_multiplier: u64,
    ) -> FeeBudget {
        let rent_exempt_minimum = if data_size == 0 {
            0
        } else {
            params.rent_exempt_minimum
        };
        let signature_fee = params
            .lamports_per_signature
            .saturating_mul(expected_signatures as u64)
            .saturating_mul(safety_multiplier);

        FeeBudget {
            rent_exempt_minimum,
            signature_fee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> FeeParameters {
        FeeParameters {
            lamports_per_signature: 5_000,
            rent_exempt_minimum: 1_000_000,
        }
    }

    #[test]
    fn test_budget_for_sixteen_byte_account() {
        let budget = FeeEstimator::budget_from(params(), 16, 1, 100);
        assert_eq!(budget.rent_exempt_minimum, 1_000_000);
        assert_eq!(budget.signature_fee, 500_000);
        assert_eq!(budget.total(), 1_500_000);
    }

    #[test]
    fn test_budget_without_account_creation_skips_rent() {
        let budget = FeeEstimator::budget_from(params(), 0, 1, 100);
        assert_eq!(budget.rent_exempt_minimum, 0);
        assert_eq!(budget.total(), 500_000);
    }

    #[test]
    fn test_budget_scales_with_signature_count() {
        let budget = FeeEstimator::budget_from(params(), 16, 3, 100);
        assert_eq!(budget.signature_fee, 1_500_000);
    }

    #[test]
    fn test_budget_never_overflows() {
        let params = FeeParameters {
            lamports_per_signature: u64::MAX,
            rent_exempt_minimum: u64::MAX,
        };
        let budget = FeeEstimator::budget_from(params, 16, 2, 100);
        assert_eq!(budget.total(), u64::MAX);
    }
}
