//! Ledger access boundary
//!
//! `LedgerClient` is the only surface through which the pipeline touches the
//! remote ledger; everything above it is testable against an in-memory mock.
//! `RpcLedgerClient` is the production implementation over the blocking
//! Solana RPC client, multiplexed round-robin across the configured
//! endpoints.

use async_trait::async_trait;
use shared::{AccountState, FeeParameters, PipelineError, PipelineResult, SubmissionResult, TransactionPlan};
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    rpc_client::RpcClient,
    rpc_custom_error,
    rpc_request::RpcError,
};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    message::Message,
    pubkey::Pubkey,
    signature::{read_keypair_file, Keypair, Signature},
    system_instruction,
    transaction::Transaction,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Narrow interface over the remote ledger.
///
/// All methods are safe for concurrent use; implementations must not hold
/// mutable state across calls beyond connection plumbing.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch the account at `address`, or `None` if it does not exist.
    async fn account(&self, address: &Pubkey) -> PipelineResult<Option<AccountState>>;

    /// Current fee inputs for an account of `data_size` bytes. Callers fetch
    /// this fresh for every estimate; implementations must not cache it.
    async fn fee_parameters(&self, data_size: usize) -> PipelineResult<FeeParameters>;

    async fn balance(&self, address: &Pubkey) -> PipelineResult<u64>;

    /// Sign, send, and wait for confirmation up to `confirm_timeout`.
    ///
    /// Transport failures and explicit rejections are errors; a transaction
    /// that went out but was not confirmed in time is `TimedOut` and may
    /// still land afterwards.
    async fn submit(
        &self,
        plan: &TransactionPlan,
        signers: &[Arc<Keypair>],
        confirm_timeout: Duration,
        cancel: &CancellationToken,
    ) -> PipelineResult<SubmissionResult>;

    /// Ask the ledger to credit `lamports` to `address` (airdrop on test
    /// clusters). Returns the receipt signature; the caller polls the
    /// balance to observe the credit.
    async fn request_top_up(&self, address: &Pubkey, lamports: u64) -> PipelineResult<Signature>;

    /// One-shot status check for a previously submitted transaction:
    /// `Some(slot)` when it landed at the configured commitment, `None`
    /// when the ledger has no record of it yet. A transaction that landed
    /// with an execution error is `Rejected`.
    async fn signature_status(&self, signature: &Signature) -> PipelineResult<Option<u64>>;
}

/// Production ledger client over blocking RPC connections.
pub struct RpcLedgerClient {
    clients: Vec<Arc<RpcClient>>,
    next: AtomicUsize,
    commitment: CommitmentConfig,
}

impl RpcLedgerClient {
    pub fn new(rpc_urls: Vec<String>, commitment: &str) -> anyhow::Result<Self> {
        if rpc_urls.is_empty() {
            anyhow::bail!("at least one RPC URL is required");
        }

        let commitment_config = match commitment {
            "processed" => CommitmentConfig::processed(),
            "confirmed" => CommitmentConfig::confirmed(),
            "finalized" => CommitmentConfig::finalized(),
            _ => CommitmentConfig::confirmed(),
        };

        let clients = rpc_urls
            .into_iter()
            .map(|url| Arc::new(RpcClient::new_with_commitment(url, commitment_config)))
            .collect();

        Ok(Self {
            clients,
            next: AtomicUsize::new(0),
            commitment: commitment_config,
        })
    }

    /// Round-robin to the next endpoint.
    fn client(&self) -> Arc<RpcClient> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        self.clients[index].clone()
    }

    /// Run a blocking RPC call off the async runtime.
    async fn blocking<T, F>(&self, op: F) -> PipelineResult<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<RpcClient>) -> Result<T, ClientError> + Send + 'static,
    {
        let client = self.client();
        tokio::task::spawn_blocking(move || op(client))
            .await
            .map_err(|e| PipelineError::Transport(format!("rpc task join failed: {e}")))?
            .map_err(classify)
    }
}

/// Split RPC failures into the retryable transport class and explicit
/// ledger refusals. A refused request cannot succeed unchanged, so the
/// orchestrator must not burn attempts on it. Response errors that only
/// describe the queried node's state (unhealthy, behind) are transport,
/// not refusals of the request itself.
fn classify(err: ClientError) -> PipelineError {
    match err.kind() {
        ClientErrorKind::TransactionError(tx_err) => PipelineError::Rejected(tx_err.to_string()),
        ClientErrorKind::SigningError(sign_err) => PipelineError::Rejected(sign_err.to_string()),
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, .. }) => match *code {
            rpc_custom_error::JSON_RPC_SERVER_ERROR_NODE_UNHEALTHY
            | rpc_custom_error::JSON_RPC_SERVER_ERROR_BLOCK_NOT_AVAILABLE
            | rpc_custom_error::JSON_RPC_SERVER_ERROR_MIN_CONTEXT_SLOT_NOT_REACHED => {
                PipelineError::Transport(err.to_string())
            }
            _ => PipelineError::Rejected(err.to_string()),
        },
        _ => PipelineError::Transport(err.to_string()),
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn account(&self, address: &Pubkey) -> PipelineResult<Option<AccountState>> {
        let address = *address;
        let commitment = self.commitment;
        let response = self
            .blocking(move |client| client.get_account_with_commitment(&address, commitment))
            .await?;

        Ok(response.value.map(|account| AccountState {
            lamports: account.lamports,
            owner: account.owner,
            data: account.data,
            executable: account.executable,
        }))
    }

    async fn fee_parameters(&self, data_size: usize) -> PipelineResult<FeeParameters> {
        self.blocking(move |client| {
            let rent_exempt_minimum = client.get_minimum_balance_for_rent_exemption(data_size)?;

            // Modern RPC has no standalone per-signature fee getter; price a
            // minimal one-signature message instead.
            let blockhash = client.get_latest_blockhash()?;
            let probe = Pubkey::new_unique();
            let message = Message::new_with_blockhash(
                &[system_instruction::transfer(&probe, &probe, 0)],
                Some(&probe),
                &blockhash,
            );
            let lamports_per_signature = client.get_fee_for_message(&message)?;

            Ok(FeeParameters {
                lamports_per_signature,
                rent_exempt_minimum,
            })
        })
        .await
    }

    async fn balance(&self, address: &Pubkey) -> PipelineResult<u64> {
        let address = *address;
        let commitment = self.commitment;
        let response = self
            .blocking(move |client| client.get_balance_with_commitment(&address, commitment))
            .await?;
        Ok(response.value)
    }

    async fn submit(
        &self,
        plan: &TransactionPlan,
        signers: &[Arc<Keypair>],
        confirm_timeout: Duration,
        cancel: &CancellationToken,
    ) -> PipelineResult<SubmissionResult> {
        let plan = plan.clone();
        let signers = signers.to_vec();
        let signature = self
            .blocking(move |client| {
                let blockhash = client.get_latest_blockhash()?;
                let signer_refs: Vec<&Keypair> = signers.iter().map(|k| k.as_ref()).collect();
                let transaction = Transaction::new_signed_with_payer(
                    &plan.instructions,
                    Some(&plan.payer),
                    &signer_refs,
                    blockhash,
                );
                client.send_transaction(&transaction)
            })
            .await?;

        tracing::debug!(%signature, "transaction sent, awaiting confirmation");
        self.await_confirmation(signature, confirm_timeout, cancel).await
    }

    async fn request_top_up(&self, address: &Pubkey, lamports: u64) -> PipelineResult<Signature> {
        let address = *address;
        self.blocking(move |client| client.request_airdrop(&address, lamports))
            .await
    }

    async fn signature_status(&self, signature: &Signature) -> PipelineResult<Option<u64>> {
        let signature = *signature;
        let commitment = self.commitment;
        let response = self
            .blocking(move |client| client.get_signature_statuses(&[signature]))
            .await?;

        match response.value.into_iter().flatten().next() {
            Some(status) => {
                if let Some(tx_err) = status.err {
                    return Err(PipelineError::Rejected(tx_err.to_string()));
                }
                if status.satisfies_commitment(commitment) {
                    Ok(Some(status.slot))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }
}

impl RpcLedgerClient {
    async fn await_confirmation(
        &self,
        signature: Signature,
        confirm_timeout: Duration,
        cancel: &CancellationToken,
    ) -> PipelineResult<SubmissionResult> {
        let commitment = self.commitment;
        let deadline = Instant::now() + confirm_timeout;

        loop {
            let status = self
                .blocking(move |client| client.get_signature_statuses(&[signature]))
                .await;

            match status {
                Ok(response) => {
                    if let Some(status) = response.value.into_iter().flatten().next() {
                        if let Some(tx_err) = status.err {
                            return Err(PipelineError::Rejected(tx_err.to_string()));
                        }
                        if status.satisfies_commitment(commitment) {
                            return Ok(SubmissionResult::Confirmed {
                                signature,
                                slot: status.slot,
                            });
                        }
                    }
                }
                // A flaky status poll must not trigger a resubmission of a
                // transaction that may already be landing; keep polling
                // until the deadline instead.
                Err(err) if err.is_retryable() => {
                    tracing::warn!(%signature, error = %err, "status poll failed, will poll again");
                }
                Err(err) => return Err(err),
            }

            if Instant::now() >= deadline {
                return Ok(SubmissionResult::TimedOut { signature });
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                _ = tokio::time::sleep(CONFIRM_POLL_INTERVAL) => {}
            }
        }
    }
}

pub fn load_payer_keypair(path: &str) -> anyhow::Result<Keypair> {
    let keypair = read_keypair_file(Path::new(path))
        .map_err(|e| anyhow::anyhow!("Failed to load payer keypair: {}", e))?;
    Ok(keypair)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_io_error_is_transport() {
        let err = ClientError::from(ClientErrorKind::Custom("connection refused".into()));
        let classified = classify(err);
        assert!(classified.is_retryable());
        assert_eq!(classified.kind(), "transport");
    }

    fn response_error(code: i64) -> ClientError {
        ClientError::from(ClientErrorKind::RpcError(RpcError::RpcResponseError {
            code,
            message: "node response".into(),
            data: solana_client::rpc_request::RpcResponseErrorData::Empty,
        }))
    }

    #[test]
    fn test_classify_node_unhealthy_response_is_transport() {
        let classified = classify(response_error(
            rpc_custom_error::JSON_RPC_SERVER_ERROR_NODE_UNHEALTHY,
        ));
        assert!(classified.is_retryable());
        assert_eq!(classified.kind(), "transport");
    }

    #[test]
    fn test_classify_preflight_failure_response_is_rejected() {
        let classified = classify(response_error(
            rpc_custom_error::JSON_RPC_SERVER_ERROR_SEND_TRANSACTION_PREFLIGHT_FAILURE,
        ));
        assert!(!classified.is_retryable());
        assert_eq!(classified.kind(), "rejected");
    }

    #[test]
    fn test_empty_endpoint_list_is_refused() {
        assert!(RpcLedgerClient::new(Vec::new(), "confirmed").is_err());
    }

    #[test]
    fn test_classify_transaction_error_is_rejected() {
        use solana_sdk::transaction::TransactionError;
        let err = ClientError::from(ClientErrorKind::TransactionError(
            TransactionError::AccountInUse,
        ));
        let classified = classify(err);
        assert!(!classified.is_retryable());
        assert_eq!(classified.kind(), "rejected");
    }
}
