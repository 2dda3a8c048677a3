use anyhow::{bail, Context, Result};
use solana_sdk::{pubkey::Pubkey, signature::Signer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use submitter::config::Config;
use submitter::estimator::FeeEstimator;
use submitter::greeting::{build_hello_instruction, GreetingCounter};
use submitter::ledger::{load_payer_keypair, LedgerClient, RpcLedgerClient};
use submitter::orchestrator::SubmissionOrchestrator;
use submitter::provisioner::AccountProvisioner;
use submitter::retry::RetryPolicy;

use shared::TransactionPlan;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging with JSON formatting (configurable via env)
    let use_json = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| "json".to_string())
        .eq_ignore_ascii_case("json");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "submitter=info".into());

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        service = "submitter",
        version = env!("CARGO_PKG_VERSION"),
        log_format = if use_json { "json" } else { "text" },
        "Starting submitter service"
    );

    let config = Config::load()?;
    tracing::info!(
        rpc_count = config.ledger.rpc_urls.len(),
        commitment = %config.ledger.commitment,
        max_attempts = config.pipeline.max_attempts,
        "Configuration loaded"
    );

    let payer = Arc::new(load_payer_keypair(&config.greeting.payer_keypair_path)?);
    tracing::info!(payer = %payer.pubkey(), "Payer keypair loaded");

    let program_id: Pubkey = config
        .greeting
        .program_id
        .parse()
        .context("GREETING_PROGRAM_ID is not a valid address")?;

    let ledger: Arc<dyn LedgerClient> = Arc::new(RpcLedgerClient::new(
        config.ledger.rpc_urls.clone(),
        &config.ledger.commitment,
    )?);
    let estimator = FeeEstimator::new(Arc::clone(&ledger), config.pipeline.fee_safety_multiplier);
    let orchestrator = Arc::new(SubmissionOrchestrator::new(
        Arc::clone(&ledger),
        estimator.clone(),
        RetryPolicy::new(config.pipeline.max_attempts),
        config.pipeline.confirm_timeout(),
        config.pipeline.top_up_timeout(),
    ));
    let provisioner = AccountProvisioner::new(
        Arc::clone(&ledger),
        estimator,
        Arc::clone(&orchestrator),
    );

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Shutdown signal received, cancelling in-flight work");
            cancel_on_signal.cancel();
        }
    });

    // The greeting program is an external collaborator; refuse to start
    // against a cluster where it is missing or not executable.
    let program = ledger
        .account(&program_id)
        .await?
        .with_context(|| format!("Program {program_id} not found; deploy it first"))?;
    if !program.executable {
        bail!("Program {program_id} exists but is not executable");
    }
    tracing::info!(program = %program_id, "Greeting program verified");

    let greeted = provisioner
        .ensure_account(
            &payer,
            &config.greeting.seed,
            &program_id,
            GreetingCounter::ACCOUNT_SIZE,
            &cancel,
        )
        .await?;
    tracing::info!(greeted = %greeted, "Greeting account ready");

    let plan = TransactionPlan::new(
        vec![build_hello_instruction(&program_id, &greeted)],
        payer.pubkey(),
    );
    let confirmation = orchestrator
        .submit_with_retry(&plan, &[Arc::clone(&payer)], 0, None, &cancel)
        .await?;
    tracing::info!(
        signature = %confirmation.signature,
        slot = ?confirmation.slot,
        attempts = confirmation.attempts,
        "Hello submitted"
    );

    let account = ledger
        .account(&greeted)
        .await?
        .with_context(|| format!("Greeted account {greeted} vanished after submission"))?;
    let state = GreetingCounter::decode(&account.data)
        .context("Greeted account data does not match the greeting codec")?;
    tracing::info!(
        greeted = %greeted,
        counter = state.counter,
        "Greeting counter read back"
    );

    Ok(())
}
