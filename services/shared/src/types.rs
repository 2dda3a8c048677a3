/// Value types carried between pipeline components
///
/// Plain data holders; all behavior lives in the submitter crate. Amount
/// arithmetic is saturating so a misconfigured multiplier can never panic
/// in release builds.
use serde::{Deserialize, Serialize};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, signature::Signature};

/// Snapshot of an on-ledger account as observed by the ledger client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub lamports: u64,
    pub owner: Pubkey,
    pub data: Vec<u8>,
    pub executable: bool,
}

impl AccountState {
    /// Declared data length, fixed at creation time.
    pub fn data_len(&self) -> usize {
        self.data.len()
    }
}

/// Current network fee inputs for a given account data size.
///
/// Fetched fresh for every estimate since both values drift over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeParameters {
    pub lamports_per_signature: u64,
    /// Rent-exemption minimum for the data size the caller asked about.
    pub rent_exempt_minimum: u64,
}

/// Lamports budget an operation needs before it is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBudget {
    pub rent_exempt_minimum: u64,
    pub signature_fee: u64,
}

impl FeeBudget {
    pub fn total(&self) -> u64 {
        self.rent_exempt_minimum.saturating_add(self.signature_fee)
    }
}

/// An unsigned transaction: ordered instructions plus the fee payer.
///
/// Signers are supplied separately at submit time; the pipeline never holds
/// key material beyond opaque signer handles.
#[derive(Debug, Clone)]
pub struct TransactionPlan {
    pub instructions: Vec<Instruction>,
    pub payer: Pubkey,
}

impl TransactionPlan {
    pub fn new(instructions: Vec<Instruction>, payer: Pubkey) -> Self {
        Self {
            instructions,
            payer,
        }
    }
}

/// Outcome of a single submit-and-wait cycle at the ledger client.
///
/// Transport failures and explicit rejections travel as errors; these are
/// the two outcomes where a transaction actually went out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    Confirmed { signature: Signature, slot: u64 },
    /// The confirmation wait expired. The transaction may still land later;
    /// callers must re-query before resubmitting.
    TimedOut { signature: Signature },
}

/// Terminal success record for an orchestrated submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub signature: Signature,
    /// None when success was established by side-effect re-query after a
    /// confirmation timeout rather than by the confirmation itself.
    pub slot: Option<u64>,
    pub attempts: u32,
}
