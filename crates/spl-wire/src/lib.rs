//! Solana wire-level support for SPL tokens.
//!
//! This crate handles address and PDA derivation, the compact transaction
//! wire format, Token-2022 instruction encoding and account decoding, all
//! without pulling in `solana-sdk` and its transitive dependency tree.
//!
//! Transactions are serialized by hand, using `ed25519-dalek` for signing,
//! `curve25519-dalek` for the off-curve check behind PDAs, and `bs58` for
//! Base58 encoding. Nothing here performs I/O.

pub mod address;
pub mod error;
pub mod keypair;
pub mod metadata;
pub mod pda;
pub mod state;
pub mod token;
pub mod transaction;

// Re-export key public types for ergonomic imports.
pub use address::{address_to_bytes, bytes_to_address, Address, IntoAddress};
pub use error::WireError;
pub use keypair::{Keypair, Signature};
pub use metadata::{initialize_token_metadata, TokenMetadata};
pub use pda::{derive_associated_token_address, find_program_address};
pub use state::{mint_metadata, MintState, TokenAccountState};
pub use token::{
    create_associated_token_account, initialize_metadata_pointer, initialize_mint2,
    mint_to_checked, ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_2022_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
pub use transaction::{
    build_create_account, compile_transaction, decode_compact_u16, decode_transaction,
    encode_compact_u16, serialize_message, sign_raw_transaction, unsigned_wire,
    CompiledInstruction, DecodedTransaction, SolAccountMeta, SolInstruction,
    SolTransaction, SYSTEM_PROGRAM_ID,
};
