//! Greeting program account codec and instruction builder
//!
//! The greeting program stores a single Borsh-encoded `u32` visit counter
//! per greeted account and takes a no-argument instruction. The account
//! size declared at provisioning must match this codec exactly.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

#[derive(BorshSerialize, BorshDeserialize, Debug, Default, PartialEq, Eq)]
pub struct GreetingCounter {
    pub counter: u32,
}

impl GreetingCounter {
    /// Fixed account data size; Borsh encodes the counter as 4 LE bytes.
    pub const ACCOUNT_SIZE: usize = 4;

    pub fn decode(data: &[u8]) -> std::io::Result<Self> {
        borsh::from_slice(data)
    }
}

/// The greeting instruction carries no payload; the program only needs the
/// greeted account writable.
pub fn build_hello_instruction(program_id: &Pubkey, greeted: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new(*greeted, false)],
        data: vec![],
    }
}
