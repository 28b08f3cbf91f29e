//! The remote ledger as seen by token operations.
//!
//! `LedgerRpc` is the seam between the token client and whatever actually
//! talks to a cluster: the JSON-RPC implementation in `rpc.rs`, or an
//! in-process ledger in tests.

use serde::{Deserialize, Serialize};
use spl_wire::{Address, Signature};
use thiserror::Error;

/// How settled a ledger read or confirmation must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }

    /// Whether a transaction observed at `self` meets the `required` level.
    pub fn satisfies(self, required: Commitment) -> bool {
        self.rank() >= required.rank()
    }

    fn rank(self) -> u8 {
        match self {
            Commitment::Processed => 0,
            Commitment::Confirmed => 1,
            Commitment::Finalized => 2,
        }
    }
}

/// An account as returned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAccount {
    pub lamports: u64,
    pub owner: Address,
    pub data: Vec<u8>,
    pub executable: bool,
}

/// A recent blockhash and the last block height at which a transaction
/// referencing it can still land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecentBlockhash {
    pub blockhash: [u8; 32],
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The request never produced a ledger answer.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// An instruction of the transaction failed; `custom` is the program's
    /// own error code when it returned one.
    #[error("instruction {index} failed: {message}")]
    InstructionFailed {
        index: u8,
        custom: Option<u32>,
        message: String,
    },

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("blockhash expired before the transaction was confirmed")]
    BlockhashExpired,
}

/// Remote ledger operations used by the token client.
#[allow(async_fn_in_trait)]
pub trait LedgerRpc {
    /// `Ok(None)` when no account exists at `address`.
    async fn get_account(
        &self,
        address: &Address,
        commitment: Commitment,
    ) -> Result<Option<LedgerAccount>, LedgerError>;

    async fn get_balance(&self, address: &Address, commitment: Commitment)
        -> Result<u64, LedgerError>;

    async fn get_latest_blockhash(&self, commitment: Commitment)
        -> Result<RecentBlockhash, LedgerError>;

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: usize)
        -> Result<u64, LedgerError>;

    /// Submit a fully signed wire transaction, returning its id.
    async fn send_transaction(&self, wire: &[u8]) -> Result<Signature, LedgerError>;

    /// Wait until `signature` reaches `commitment`, or fail once `blockhash`
    /// can no longer land.
    async fn confirm_transaction(
        &self,
        signature: &Signature,
        blockhash: &RecentBlockhash,
        commitment: Commitment,
    ) -> Result<(), LedgerError>;

    async fn request_airdrop(&self, address: &Address, lamports: u64)
        -> Result<Signature, LedgerError>;
}
