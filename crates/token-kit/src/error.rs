use spl_wire::token::{
    SYSTEM_ERROR_ACCOUNT_IN_USE, TOKEN_ERROR_FIXED_SUPPLY, TOKEN_ERROR_OWNER_MISMATCH,
};
use spl_wire::{Address, SolInstruction, WireError, ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_2022_PROGRAM_ID};
use thiserror::Error;

use crate::ledger::LedgerError;

/// Failures surfaced by token operations.
///
/// Local precondition failures (`InvalidAddress`, `PrecisionLoss`,
/// `InvalidAmount`, `AmountOverflow`, `InvalidMetadata`, `AccountMissing`)
/// are always reported before anything is submitted. A holding account that
/// does not exist is not an error; see `HoldingBalance::NotFound`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("holding account {account} does not exist")]
    AccountMissing { account: Address },

    #[error("account {account} already exists")]
    AlreadyExists { account: Address },

    #[error("signer lacks the required authority: {0}")]
    Unauthorized(String),

    #[error("{amount} is not a whole number of base units at {decimals} decimals")]
    PrecisionLoss { amount: String, decimals: u8 },

    #[error("remote failure: {0}")]
    RemoteFailure(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("{amount} at {decimals} decimals does not fit in a u64 of base units")]
    AmountOverflow { amount: String, decimals: u8 },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("invalid account data: {0}")]
    InvalidAccountData(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("ledger rejected the transaction: {0}")]
    Rejected(String),

    #[error("signer declined: {0}")]
    SignerDeclined(String),

    #[error("airdrops are not available on {0}")]
    AirdropUnavailable(String),

    #[error("transaction build failed: {0}")]
    TransactionBuild(String),
}

impl From<WireError> for TokenError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::InvalidAddress(msg) => TokenError::InvalidAddress(msg),
            WireError::InvalidAccountData(msg) => TokenError::InvalidAccountData(msg),
            other => TokenError::TransactionBuild(other.to_string()),
        }
    }
}

/// Context-free mapping: anything the ledger refused is `Rejected`, anything
/// that kept us from hearing an answer is `RemoteFailure`.
impl From<LedgerError> for TokenError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InstructionFailed { .. } | LedgerError::TransactionFailed(_) => {
                TokenError::Rejected(e.to_string())
            }
            LedgerError::Transport(_) | LedgerError::Rpc { .. } | LedgerError::BlockhashExpired => {
                TokenError::RemoteFailure(e.to_string())
            }
        }
    }
}

/// Map a ledger failure onto the taxonomy using the instruction that failed.
pub(crate) fn classify_ledger_error(e: LedgerError, instructions: &[SolInstruction]) -> TokenError {
    let (index, code) = match e {
        LedgerError::InstructionFailed {
            index,
            custom: Some(code),
            ..
        } => (index, code),
        _ => return e.into(),
    };

    let Some(ix) = instructions.get(index as usize) else {
        return e.into();
    };
    let program = Address::new(ix.program_id);

    if program == TOKEN_2022_PROGRAM_ID
        && matches!(code, TOKEN_ERROR_OWNER_MISMATCH | TOKEN_ERROR_FIXED_SUPPLY)
    {
        return TokenError::Unauthorized(e.to_string());
    }

    if program == ASSOCIATED_TOKEN_PROGRAM_ID && code == SYSTEM_ERROR_ACCOUNT_IN_USE {
        if let Some(account) = ix.accounts.get(1) {
            return TokenError::AlreadyExists {
                account: Address::new(account.pubkey),
            };
        }
    }

    e.into()
}
