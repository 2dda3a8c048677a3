//! Idempotent account provisioning
//!
//! Account creation is not idempotent at the transport layer: resubmitting
//! an already-landed creation fails with a conflict. The provisioner makes
//! it idempotent at the application layer by re-checking existence before
//! every creation attempt and serializing concurrent callers per derived
//! address, so at most one creation transaction is ever in flight per
//! address.

use async_trait::async_trait;
use shared::{AccountState, PipelineError, PipelineResult, TransactionPlan};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    system_instruction,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::estimator::FeeEstimator;
use crate::ledger::LedgerClient;
use crate::orchestrator::{EffectCheck, SubmissionOrchestrator};

/// Deterministic address from (base, seed, owning program). Pure; no
/// network call.
pub fn derive_address(base: &Pubkey, seed: &str, owner: &Pubkey) -> PipelineResult<Pubkey> {
    Pubkey::create_with_seed(base, seed, owner)
        .map_err(|e| PipelineError::Rejected(format!("seed derivation failed: {e}")))
}

pub struct AccountProvisioner {
    ledger: Arc<dyn LedgerClient>,
    estimator: FeeEstimator,
    orchestrator: Arc<SubmissionOrchestrator>,
    /// One gate per derived address; losers of a creation race block here,
    /// then re-query and observe the winner's account.
    inflight: Mutex<HashMap<Pubkey, Arc<Mutex<()>>>>,
}

impl AccountProvisioner {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        estimator: FeeEstimator,
        orchestrator: Arc<SubmissionOrchestrator>,
    ) -> Self {
        Self {
            ledger,
            estimator,
            orchestrator,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Ensure the account derived from (payer, seed, program_owner) exists
    /// with `data_size` bytes owned by `program_owner`, creating it at most
    /// once. Returns the derived address.
    pub async fn ensure_account(
        &self,
        payer: &Arc<Keypair>,
        seed: &str,
        program_owner: &Pubkey,
        data_size: usize,
        cancel: &CancellationToken,
    ) -> PipelineResult<Pubkey> {
        let base = payer.pubkey();
        let address = derive_address(&base, seed, program_owner)?;

        let gate = self.gate_for(&address).await;
        let _guard = gate.lock().await;

        if let Some(existing) = self.ledger.account(&address).await? {
            validate_existing(&address, &existing, program_owner, data_size)?;
            debug!(%address, "account already provisioned");
            return Ok(address);
        }

        let budget = self.estimator.estimate(data_size, 1).await?;
        info!(
            %address,
            seed,
            owner = %program_owner,
            data_size,
            lamports = budget.rent_exempt_minimum,
            "account absent, creating"
        );

        let instruction = system_instruction::create_account_with_seed(
            &base,
            &address,
            &base,
            seed,
            budget.rent_exempt_minimum,
            data_size as u64,
            program_owner,
        );
        let plan = TransactionPlan::new(vec![instruction], base);
        let landed_check = AccountExists {
            ledger: Arc::clone(&self.ledger),
            address,
        };

        self.orchestrator
            .submit_with_retry(
                &plan,
                &[Arc::clone(payer)],
                data_size,
                Some(&landed_check),
                cancel,
            )
            .await?;

        Ok(address)
    }

    async fn gate_for(&self, address: &Pubkey) -> Arc<Mutex<()>> {
        let mut map = self.inflight.lock().await;
        map.entry(*address)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Existing on-ledger state must match what the caller declared; creation
/// is a one-time operation, so a mismatch is never "fixed" here.
fn validate_existing(
    address: &Pubkey,
    existing: &AccountState,
    program_owner: &Pubkey,
    data_size: usize,
) -> PipelineResult<()> {
    if existing.owner != *program_owner {
        return Err(PipelineError::ProvisioningConflict {
            address: *address,
            reason: format!("owner {}, expected {}", existing.owner, program_owner),
        });
    }
    if existing.data_len() != data_size {
        return Err(PipelineError::ProvisioningConflict {
            address: *address,
            reason: format!("data length {}, expected {}", existing.data_len(), data_size),
        });
    }
    Ok(())
}

struct AccountExists {
    ledger: Arc<dyn LedgerClient>,
    address: Pubkey,
}

#[async_trait]
impl EffectCheck for AccountExists {
    async fn landed(&self) -> PipelineResult<bool> {
        Ok(self.ledger.account(&self.address).await?.is_some())
    }
}
