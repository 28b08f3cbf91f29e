//! Decoding of mint and token-account data as stored on the ledger.
//!
//! ```text
//! Mint (82 bytes):
//!   mint_authority     COption<Pubkey>   4-byte tag + 32
//!   supply             u64 LE
//!   decimals           u8
//!   is_initialized     u8
//!   freeze_authority   COption<Pubkey>   4-byte tag + 32
//!
//! Account (165 bytes):
//!   mint 32 | owner 32 | amount u64 | delegate COption<Pubkey> 36
//!   state u8 | is_native COption<u64> 12 | delegated_amount u64
//!   close_authority COption<Pubkey> 36
//!
//! Token-2022 extensions (either kind):
//!   [base, zero-padded to 165] | account_type u8 | TLV entries...
//!   TLV entry: type u16 LE | length u16 LE | value
//! ```

use crate::address::Address;
use crate::error::WireError;
use crate::metadata::TokenMetadata;
use crate::token::{ACCOUNT_BASE_LEN, ACCOUNT_TYPE_OFFSET, MINT_BASE_LEN, TLV_HEADER_LEN};

/// Extension type of the metadata-pointer TLV entry.
pub const EXTENSION_METADATA_POINTER: u16 = 18;

/// Extension type of the embedded token-metadata TLV entry.
pub const EXTENSION_TOKEN_METADATA: u16 = 19;

const ACCOUNT_TYPE_MINT: u8 = 1;
const ACCOUNT_TYPE_ACCOUNT: u8 = 2;

/// Decoded base mint record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintState {
    pub mint_authority: Option<Address>,
    pub supply: u64,
    pub decimals: u8,
    pub is_initialized: bool,
    pub freeze_authority: Option<Address>,
}

impl MintState {
    pub fn unpack(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < MINT_BASE_LEN {
            return Err(WireError::InvalidAccountData(format!(
                "mint data is {} bytes, expected at least {MINT_BASE_LEN}",
                data.len()
            )));
        }
        if data.len() > MINT_BASE_LEN {
            check_account_type(data, ACCOUNT_TYPE_MINT, "mint")?;
        }

        let state = Self {
            mint_authority: read_coption_address(&data[0..36])?,
            supply: read_u64(&data[36..44]),
            decimals: data[44],
            is_initialized: read_bool(data[45])?,
            freeze_authority: read_coption_address(&data[46..82])?,
        };

        if !state.is_initialized {
            return Err(WireError::InvalidAccountData("mint is not initialized".into()));
        }

        Ok(state)
    }

    pub fn pack(&self) -> [u8; MINT_BASE_LEN] {
        let mut out = [0u8; MINT_BASE_LEN];
        write_coption_address(&mut out[0..36], self.mint_authority.as_ref());
        out[36..44].copy_from_slice(&self.supply.to_le_bytes());
        out[44] = self.decimals;
        out[45] = self.is_initialized as u8;
        write_coption_address(&mut out[46..82], self.freeze_authority.as_ref());
        out
    }
}

/// Decoded base token-account record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccountState {
    pub mint: Address,
    pub owner: Address,
    pub amount: u64,
    pub delegate: Option<Address>,
    pub is_frozen: bool,
}

impl TokenAccountState {
    const STATE_OFFSET: usize = 108;

    pub fn unpack(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < ACCOUNT_BASE_LEN {
            return Err(WireError::InvalidAccountData(format!(
                "token account data is {} bytes, expected at least {ACCOUNT_BASE_LEN}",
                data.len()
            )));
        }
        if data.len() > ACCOUNT_BASE_LEN {
            check_account_type(data, ACCOUNT_TYPE_ACCOUNT, "token account")?;
        }

        let is_frozen = match data[Self::STATE_OFFSET] {
            0 => {
                return Err(WireError::InvalidAccountData(
                    "token account is not initialized".into(),
                ))
            }
            1 => false,
            2 => true,
            other => {
                return Err(WireError::InvalidAccountData(format!(
                    "unknown token account state {other}"
                )))
            }
        };

        Ok(Self {
            mint: read_address(&data[0..32]),
            owner: read_address(&data[32..64]),
            amount: read_u64(&data[64..72]),
            delegate: read_coption_address(&data[72..108])?,
            is_frozen,
        })
    }

    /// Encode an initialized, unfrozen account with no delegate. Used when a
    /// ledger needs to materialize a freshly created holding account.
    pub fn pack(&self) -> [u8; ACCOUNT_BASE_LEN] {
        let mut out = [0u8; ACCOUNT_BASE_LEN];
        out[0..32].copy_from_slice(self.mint.as_bytes());
        out[32..64].copy_from_slice(self.owner.as_bytes());
        out[64..72].copy_from_slice(&self.amount.to_le_bytes());
        write_coption_address(&mut out[72..108], self.delegate.as_ref());
        out[Self::STATE_OFFSET] = if self.is_frozen { 2 } else { 1 };
        out
    }
}

/// One TLV extension entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extension<'a> {
    pub extension_type: u16,
    pub value: &'a [u8],
}

/// Iterate the TLV extensions of a Token-2022 account. Base-only accounts
/// have none.
pub fn extensions(data: &[u8]) -> Result<Vec<Extension<'_>>, WireError> {
    let mut out = Vec::new();
    let Some(mut rest) = data.get(ACCOUNT_TYPE_OFFSET + 1..) else {
        return Ok(out);
    };

    while rest.len() >= TLV_HEADER_LEN {
        let extension_type = u16::from_le_bytes([rest[0], rest[1]]);
        let len = u16::from_le_bytes([rest[2], rest[3]]) as usize;

        // Type 0 marks the start of unused, zeroed space.
        if extension_type == 0 {
            break;
        }

        let value = rest.get(TLV_HEADER_LEN..TLV_HEADER_LEN + len).ok_or_else(|| {
            WireError::InvalidAccountData(format!(
                "extension {extension_type} claims {len} bytes past end of data"
            ))
        })?;
        out.push(Extension {
            extension_type,
            value,
        });
        rest = &rest[TLV_HEADER_LEN + len..];
    }

    Ok(out)
}

/// Metadata embedded directly in a mint, if any.
pub fn mint_metadata(data: &[u8]) -> Result<Option<TokenMetadata>, WireError> {
    extensions(data)?
        .into_iter()
        .find(|ext| ext.extension_type == EXTENSION_TOKEN_METADATA)
        .map(|ext| TokenMetadata::unpack(ext.value))
        .transpose()
}

/// Address the mint's metadata pointer refers to, if the extension is set.
pub fn metadata_pointer(data: &[u8]) -> Result<Option<Address>, WireError> {
    let Some(ext) = extensions(data)?
        .into_iter()
        .find(|ext| ext.extension_type == EXTENSION_METADATA_POINTER)
    else {
        return Ok(None);
    };

    if ext.value.len() != 64 {
        return Err(WireError::InvalidAccountData(
            "metadata pointer must be 64 bytes".into(),
        ));
    }
    let target = read_address(&ext.value[32..64]);
    Ok((target != Address::default()).then_some(target))
}

/// Append a TLV entry to extended account data, initializing the account-type
/// byte first if the data is still base-only.
pub fn push_extension(data: &mut Vec<u8>, account_type_mint: bool, extension_type: u16, value: &[u8]) {
    if data.len() <= ACCOUNT_TYPE_OFFSET {
        data.resize(ACCOUNT_TYPE_OFFSET, 0);
        data.push(if account_type_mint {
            ACCOUNT_TYPE_MINT
        } else {
            ACCOUNT_TYPE_ACCOUNT
        });
    }
    data.extend_from_slice(&extension_type.to_le_bytes());
    data.extend_from_slice(&(value.len() as u16).to_le_bytes());
    data.extend_from_slice(value);
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn check_account_type(data: &[u8], expected: u8, what: &str) -> Result<(), WireError> {
    match data.get(ACCOUNT_TYPE_OFFSET) {
        Some(&t) if t == expected => Ok(()),
        Some(&t) => Err(WireError::InvalidAccountData(format!(
            "account type {t} is not a {what}"
        ))),
        None => Err(WireError::InvalidAccountData(format!(
            "{what} data is {} bytes, which is neither base nor extended",
            data.len()
        ))),
    }
}

fn read_address(bytes: &[u8]) -> Address {
    let mut out = [0u8; 32];
    out.copy_from_slice(bytes);
    Address::new(out)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(bytes);
    u64::from_le_bytes(out)
}

fn read_bool(byte: u8) -> Result<bool, WireError> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(WireError::InvalidAccountData(format!(
            "invalid bool byte {other}"
        ))),
    }
}

fn read_coption_address(bytes: &[u8]) -> Result<Option<Address>, WireError> {
    match u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) {
        0 => Ok(None),
        1 => Ok(Some(read_address(&bytes[4..36]))),
        tag => Err(WireError::InvalidAccountData(format!(
            "invalid COption tag {tag}"
        ))),
    }
}

fn write_coption_address(out: &mut [u8], value: Option<&Address>) {
    match value {
        Some(address) => {
            out[0..4].copy_from_slice(&1u32.to_le_bytes());
            out[4..36].copy_from_slice(address.as_bytes());
        }
        None => out[0..36].fill(0),
    }
}
