//! Token-2022 and Associated Token Account instructions.
//!
//! Instruction data is laid out by hand, the same way the System program
//! instructions are in `transaction.rs`. Only the handful of instructions a
//! token launch needs are implemented.

use crate::address::Address;
use crate::error::WireError;
use crate::transaction::{SolAccountMeta, SolInstruction, SYSTEM_PROGRAM_ID};

// ---------------------------------------------------------------------------
// Well-known program IDs
// ---------------------------------------------------------------------------

/// Token-2022 Program ID: `TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb`
pub const TOKEN_2022_PROGRAM_ID: Address = Address::new([
    0x06, 0xdd, 0xf6, 0xe1, 0xee, 0x75, 0x8f, 0xde, 0x18, 0x42, 0x5d, 0xbc, 0xe4, 0x6c,
    0xcd, 0xda, 0xb6, 0x1a, 0xfc, 0x4d, 0x83, 0xb9, 0x0d, 0x27, 0xfe, 0xbd, 0xf9, 0x28,
    0xd8, 0xa1, 0x8b, 0xfc,
]);

/// Classic SPL Token Program ID: `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`
pub const TOKEN_PROGRAM_ID: Address = Address::new([
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb,
    0x79, 0xac, 0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85,
    0x7e, 0xff, 0x00, 0xa9,
]);

/// Associated Token Account Program ID: `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Address = Address::new([
    0x8c, 0x97, 0x25, 0x8f, 0x4e, 0x24, 0x89, 0xf1, 0xbb, 0x3d, 0x10, 0x29, 0x14, 0x8e,
    0x0d, 0x83, 0x0b, 0x5a, 0x13, 0x99, 0xda, 0xff, 0x10, 0x84, 0x04, 0x8e, 0x7b, 0xd8,
    0xdb, 0xe9, 0xf8, 0x59,
]);

// ---------------------------------------------------------------------------
// Account sizes
// ---------------------------------------------------------------------------

/// Base `Mint` layout.
pub const MINT_BASE_LEN: usize = 82;

/// Base token `Account` layout. Token-2022 pads mints with extensions to this
/// length so the account-type byte sits at the same offset for both kinds.
pub const ACCOUNT_BASE_LEN: usize = 165;

/// Offset of the account-type byte in extended accounts.
pub const ACCOUNT_TYPE_OFFSET: usize = ACCOUNT_BASE_LEN;

/// TLV header: u16 extension type + u16 length.
pub const TLV_HEADER_LEN: usize = 4;

/// `MetadataPointer` extension payload: authority + metadata address.
pub const METADATA_POINTER_LEN: usize = 64;

/// Space for a mint carrying only the metadata-pointer extension (234 bytes).
/// The token-metadata TLV is appended later by a realloc inside the token
/// program, so it is funded but not allocated up front.
pub const fn mint_len_with_metadata_pointer() -> usize {
    ACCOUNT_TYPE_OFFSET + 1 + TLV_HEADER_LEN + METADATA_POINTER_LEN
}

// ---------------------------------------------------------------------------
// Instruction indices and error codes
// ---------------------------------------------------------------------------

const MINT_TO_CHECKED_IX: u8 = 14;
const INITIALIZE_MINT2_IX: u8 = 20;
const METADATA_POINTER_EXTENSION_IX: u8 = 39;
const METADATA_POINTER_INITIALIZE_IX: u8 = 0;
const ATA_CREATE_IX: u8 = 0;

/// Token program `OwnerMismatch`: the signer is not the mint authority.
pub const TOKEN_ERROR_OWNER_MISMATCH: u32 = 4;

/// Token program `FixedSupply`: the mint authority was revoked.
pub const TOKEN_ERROR_FIXED_SUPPLY: u32 = 5;

/// System program `AccountAlreadyInUse`, surfaced by ATA creation.
pub const SYSTEM_ERROR_ACCOUNT_IN_USE: u32 = 0;

// ---------------------------------------------------------------------------
// Instruction builders
// ---------------------------------------------------------------------------

/// Build a Token-2022 `InitializeMint2` instruction.
///
/// Data: `[20, decimals, mint_authority(32), freeze_tag(1), freeze(32)?]`.
/// Unlike `InitializeMint` it does not need the rent sysvar.
pub fn initialize_mint2(
    mint: &Address,
    mint_authority: &Address,
    freeze_authority: Option<&Address>,
    decimals: u8,
) -> SolInstruction {
    let mut data = Vec::with_capacity(67);
    data.push(INITIALIZE_MINT2_IX);
    data.push(decimals);
    data.extend_from_slice(mint_authority.as_bytes());
    match freeze_authority {
        Some(freeze) => {
            data.push(1);
            data.extend_from_slice(freeze.as_bytes());
        }
        None => data.push(0),
    }

    SolInstruction {
        program_id: TOKEN_2022_PROGRAM_ID.to_bytes(),
        accounts: vec![SolAccountMeta::writable(mint)],
        data,
    }
}

/// Build a Token-2022 `MintToChecked` instruction.
///
/// Data: `[14, amount u64 LE, decimals]`. The token program rejects the
/// instruction if `decimals` disagrees with the mint, and rejects any signer
/// other than the current mint authority.
pub fn mint_to_checked(
    mint: &Address,
    destination: &Address,
    authority: &Address,
    amount: u64,
    decimals: u8,
) -> Result<SolInstruction, WireError> {
    if amount == 0 {
        return Err(WireError::TransactionBuildError(
            "mint amount must be > 0".into(),
        ));
    }

    let mut data = Vec::with_capacity(10);
    data.push(MINT_TO_CHECKED_IX);
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);

    Ok(SolInstruction {
        program_id: TOKEN_2022_PROGRAM_ID.to_bytes(),
        accounts: vec![
            SolAccountMeta::writable(mint),
            SolAccountMeta::writable(destination),
            SolAccountMeta::readonly_signer(authority),
        ],
        data,
    })
}

/// Build the `MetadataPointer::Initialize` extension instruction.
///
/// Must run before `InitializeMint2`. A zero authority means "none".
pub fn initialize_metadata_pointer(
    mint: &Address,
    authority: Option<&Address>,
    metadata_address: &Address,
) -> SolInstruction {
    let mut data = Vec::with_capacity(2 + METADATA_POINTER_LEN);
    data.push(METADATA_POINTER_EXTENSION_IX);
    data.push(METADATA_POINTER_INITIALIZE_IX);
    data.extend_from_slice(&authority.copied().unwrap_or_default().to_bytes());
    data.extend_from_slice(metadata_address.as_bytes());

    SolInstruction {
        program_id: TOKEN_2022_PROGRAM_ID.to_bytes(),
        accounts: vec![SolAccountMeta::writable(mint)],
        data,
    }
}

/// Build the Associated Token Account program `Create` instruction.
///
/// Fails on-chain if the account already exists.
pub fn create_associated_token_account(
    payer: &Address,
    associated_account: &Address,
    owner: &Address,
    mint: &Address,
) -> SolInstruction {
    SolInstruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID.to_bytes(),
        accounts: vec![
            SolAccountMeta::writable_signer(payer),
            SolAccountMeta::writable(associated_account),
            SolAccountMeta::readonly(owner),
            SolAccountMeta::readonly(mint),
            SolAccountMeta::readonly(&Address::new(SYSTEM_PROGRAM_ID)),
            SolAccountMeta::readonly(&TOKEN_2022_PROGRAM_ID),
        ],
        data: vec![ATA_CREATE_IX],
    }
}
