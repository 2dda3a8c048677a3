//! Submission orchestration
//!
//! Drives a single logical submission through funding, submit, confirm and
//! retry. Per submission the states are:
//! Pending -> Submitted -> { Confirmed | RejectedTerminal |
//! TransportRetry(->Pending) | TimedOutRecheck(-> Confirmed | Pending) }.
//! Terminal: Confirmed, RejectedTerminal, ExhaustedRetries.

use async_trait::async_trait;
use backoff::backoff::Backoff;
use shared::{Confirmation, PipelineError, PipelineResult, SubmissionResult, TransactionPlan};
use solana_sdk::{pubkey::Pubkey, signature::Keypair};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::estimator::FeeEstimator;
use crate::ledger::LedgerClient;
use crate::retry::RetryPolicy;

const BALANCE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Probe for whether a transaction's intended ledger-side effect is
/// observable, used after a confirmation timeout to decide whether a retry
/// would double-submit.
#[async_trait]
pub trait EffectCheck: Send + Sync {
    async fn landed(&self) -> PipelineResult<bool>;
}

pub struct SubmissionOrchestrator {
    ledger: Arc<dyn LedgerClient>,
    estimator: FeeEstimator,
    retry: RetryPolicy,
    confirm_timeout: Duration,
    top_up_timeout: Duration,
}

impl SubmissionOrchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        estimator: FeeEstimator,
        retry: RetryPolicy,
        confirm_timeout: Duration,
        top_up_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            estimator,
            retry,
            confirm_timeout,
            top_up_timeout,
        }
    }

    /// Submit `plan` with funding verification, confirmation waiting and
    /// bounded retries.
    ///
    /// `data_size` is the account data footprint the submission provisions
    /// (0 when it creates nothing) and feeds the per-attempt fee budget.
    /// `recheck` resolves an expired confirmation wait by observing the
    /// transaction's side effect; without it the timed-out signature's
    /// status is re-queried before a timeout counts as a failed attempt.
    pub async fn submit_with_retry(
        &self,
        plan: &TransactionPlan,
        signers: &[Arc<Keypair>],
        data_size: usize,
        recheck: Option<&dyn EffectCheck>,
        cancel: &CancellationToken,
    ) -> PipelineResult<Confirmation> {
        let mut backoff = self.retry.create_backoff();
        let mut last_error: Option<PipelineError> = None;
        let mut attempt = 0u32;

        while self.retry.has_attempts_left(attempt) {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            match self
                .attempt_once(plan, signers, data_size, attempt, recheck, cancel)
                .await
            {
                Ok(confirmation) => {
                    info!(
                        payer = %plan.payer,
                        signature = %confirmation.signature,
                        slot = ?confirmation.slot,
                        attempts = confirmation.attempts,
                        "submission confirmed"
                    );
                    return Ok(confirmation);
                }
                Err(err) if err.is_retryable() => {
                    warn!(
                        payer = %plan.payer,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        kind = err.kind(),
                        error = %err,
                        "attempt failed, will retry"
                    );
                    last_error = Some(err);
                }
                Err(err) => {
                    warn!(
                        payer = %plan.payer,
                        attempt,
                        kind = err.kind(),
                        error = %err,
                        "terminal submission failure"
                    );
                    return Err(err);
                }
            }

            if self.retry.has_attempts_left(attempt) {
                let delay = backoff.next_backoff().unwrap_or(self.retry.max_interval);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                    _ = sleep(delay) => {}
                }
            }
        }

        Err(PipelineError::ExhaustedRetries {
            attempts: attempt,
            last_error: Box::new(
                last_error.unwrap_or_else(|| PipelineError::Transport("no attempt made".into())),
            ),
        })
    }

    async fn attempt_once(
        &self,
        plan: &TransactionPlan,
        signers: &[Arc<Keypair>],
        data_size: usize,
        attempt: u32,
        recheck: Option<&dyn EffectCheck>,
        cancel: &CancellationToken,
    ) -> PipelineResult<Confirmation> {
        // Fee parameters drift; refresh the budget for every attempt.
        let budget = self
            .estimator
            .estimate(data_size, signers.len().max(1))
            .await?;

        // Fees drift and earlier attempts spend lamports; verify funding
        // before every attempt, not just the first.
        self.ensure_funded(&plan.payer, budget.total(), cancel)
            .await?;

        match self
            .ledger
            .submit(plan, signers, self.confirm_timeout, cancel)
            .await?
        {
            SubmissionResult::Confirmed { signature, slot } => Ok(Confirmation {
                signature,
                slot: Some(slot),
                attempts: attempt,
            }),
            SubmissionResult::TimedOut { signature } => {
                warn!(%signature, attempt, "confirmation wait expired");
                // The transaction may have landed despite the expired wait;
                // re-query before a retry that could double-submit.
                if let Some(check) = recheck {
                    if check.landed().await? {
                        info!(%signature, "side effect landed despite confirmation timeout");
                        return Ok(Confirmation {
                            signature,
                            slot: None,
                            attempts: attempt,
                        });
                    }
                } else if let Some(slot) = self.ledger.signature_status(&signature).await? {
                    info!(%signature, slot, "transaction landed despite confirmation timeout");
                    return Ok(Confirmation {
                        signature,
                        slot: Some(slot),
                        attempts: attempt,
                    });
                }
                Err(PipelineError::ConfirmTimeout { signature })
            }
        }
    }

    /// Verify the payer can cover `required` lamports, topping up and
    /// polling the balance when it cannot.
    async fn ensure_funded(
        &self,
        payer: &Pubkey,
        required: u64,
        cancel: &CancellationToken,
    ) -> PipelineResult<()> {
        let balance = self.ledger.balance(payer).await?;
        if balance >= required {
            return Ok(());
        }

        info!(
            %payer,
            balance,
            required,
            "payer underfunded, requesting top-up"
        );
        let receipt = self.ledger.request_top_up(payer, required).await?;
        debug!(%payer, %receipt, "top-up requested");

        let started = Instant::now();
        loop {
            if self.ledger.balance(payer).await? >= required {
                info!(%payer, required, "top-up visible");
                return Ok(());
            }
            if started.elapsed() >= self.top_up_timeout {
                return Err(PipelineError::TopUpTimeout {
                    address: *payer,
                    waited: started.elapsed(),
                });
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                _ = sleep(BALANCE_POLL_INTERVAL) => {}
            }
        }
    }
}
