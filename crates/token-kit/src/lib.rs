//! SPL token utilities on top of `spl-wire`.
//!
//! Derives holding (associated token) account addresses, reads mints and
//! balances, creates holding accounts, mints supply, and launches new
//! Token-2022 tokens with on-chain metadata. The ledger and the wallet are
//! injected through the [`LedgerRpc`] and [`TransactionSigner`] traits; no
//! state is kept locally and every read goes back to the ledger.

pub mod client;
pub mod cluster;
pub mod error;
pub mod ledger;
pub mod rpc;
pub mod signer;
pub mod units;

pub use client::{
    derive_holding_address, holding_address, HoldingBalance, LaunchError, LaunchState, MintInfo,
    MintToOptions, NewToken, TokenClient, TokenLaunch, DEFAULT_DECIMALS,
};
pub use cluster::{
    explorer_address_url, explorer_tx_url, solscan_token_url, ClientConfig, Cluster, ClusterInfo,
};
pub use error::TokenError;
pub use ledger::{Commitment, LedgerAccount, LedgerError, LedgerRpc, RecentBlockhash};
pub use rpc::{HttpTransport, JsonRpcLedger};
pub use signer::{KeypairSigner, SubmitError, TransactionSigner};
pub use units::{from_base_units, to_base_units, UiAmount, LAMPORTS_PER_SOL};

pub use spl_wire::{Address, Keypair, Signature, TokenMetadata, TOKEN_2022_PROGRAM_ID};
