use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::estimator::DEFAULT_FEE_SAFETY_MULTIPLIER;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub pipeline: PipelineConfig,
    pub greeting: GreetingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub rpc_urls: Vec<String>,
    pub commitment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub fee_safety_multiplier: u64,
    pub max_attempts: u32,
    pub confirm_timeout_seconds: u64,
    pub top_up_timeout_seconds: u64,
}

impl PipelineConfig {
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_seconds)
    }

    pub fn top_up_timeout(&self) -> Duration {
        Duration::from_secs(self.top_up_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GreetingConfig {
    pub program_id: String,
    pub seed: String,
    pub payer_keypair_path: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        use anyhow::Context;

        dotenvy::dotenv().ok();

        let rpc_primary = env::var("LEDGER_RPC_URL").context("LEDGER_RPC_URL must be set")?;
        let rpc_fallback =
            env::var("LEDGER_RPC_FALLBACK_URL").unwrap_or_else(|_| rpc_primary.clone());

        Ok(Config {
            ledger: LedgerConfig {
                rpc_urls: vec![rpc_primary, rpc_fallback],
                commitment: env::var("LEDGER_COMMITMENT")
                    .unwrap_or_else(|_| "confirmed".to_string()),
            },
            pipeline: PipelineConfig {
                fee_safety_multiplier: env::var("FEE_SAFETY_MULTIPLIER")
                    .unwrap_or_else(|_| DEFAULT_FEE_SAFETY_MULTIPLIER.to_string())
                    .parse()?,
                max_attempts: env::var("SUBMIT_MAX_ATTEMPTS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
                confirm_timeout_seconds: env::var("CONFIRM_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
                top_up_timeout_seconds: env::var("TOP_UP_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
            },
            greeting: GreetingConfig {
                program_id: env::var("GREETING_PROGRAM_ID")
                    .context("GREETING_PROGRAM_ID must be set")?,
                seed: env::var("GREETING_SEED").unwrap_or_else(|_| "hello".to_string()),
                payer_keypair_path: env::var("PAYER_KEYPAIR")
                    .context("PAYER_KEYPAIR must be set")?,
            },
        })
    }
}
