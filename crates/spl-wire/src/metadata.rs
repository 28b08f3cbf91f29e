//! On-chain token metadata (the token-metadata interface that Token-2022
//! implements inside the mint account itself).
//!
//! The metadata record is Borsh-encoded and stored as a TLV extension of the
//! mint. Instructions are identified by an 8-byte discriminator: the first 8
//! bytes of `SHA-256("spl_token_metadata_interface:<name>")`.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::error::WireError;
use crate::token::{TLV_HEADER_LEN, TOKEN_2022_PROGRAM_ID};
use crate::transaction::{SolAccountMeta, SolInstruction};

/// Discriminator of the metadata `Initialize` instruction.
pub const INITIALIZE_DISCRIMINATOR: [u8; 8] = [210, 225, 30, 162, 88, 184, 77, 141];

/// The metadata record stored in a mint's TLV area.
#[derive(Debug, Clone, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct TokenMetadata {
    /// Zero means the metadata can no longer be updated.
    pub update_authority: Address,
    pub mint: Address,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub additional_metadata: Vec<(String, String)>,
}

impl TokenMetadata {
    pub fn update_authority(&self) -> Option<Address> {
        (self.update_authority != Address::default()).then_some(self.update_authority)
    }

    /// Borsh-encoded length of the record.
    pub fn packed_len(&self) -> usize {
        let borsh_str = |s: &str| 4 + s.len();
        32 + 32
            + borsh_str(&self.name)
            + borsh_str(&self.symbol)
            + borsh_str(&self.uri)
            + 4
            + self
                .additional_metadata
                .iter()
                .map(|(k, v)| borsh_str(k) + borsh_str(v))
                .sum::<usize>()
    }

    /// Bytes the record occupies in the mint once wrapped in its TLV header.
    pub fn tlv_len(&self) -> usize {
        TLV_HEADER_LEN + self.packed_len()
    }

    pub fn pack(&self) -> Result<Vec<u8>, WireError> {
        borsh::to_vec(self).map_err(|e| WireError::SerializationError(e.to_string()))
    }

    pub fn unpack(data: &[u8]) -> Result<Self, WireError> {
        Self::try_from_slice(data)
            .map_err(|e| WireError::InvalidAccountData(format!("token metadata: {e}")))
    }
}

#[derive(BorshSerialize)]
struct InitializeArgs<'a> {
    name: &'a str,
    symbol: &'a str,
    uri: &'a str,
}

/// Build the token-metadata `Initialize` instruction against Token-2022.
///
/// Accounts: metadata (writable), update authority, mint, mint authority
/// (signer). For a self-describing mint `metadata == mint`.
pub fn initialize_token_metadata(
    metadata: &Address,
    update_authority: &Address,
    mint: &Address,
    mint_authority: &Address,
    name: &str,
    symbol: &str,
    uri: &str,
) -> Result<SolInstruction, WireError> {
    let args = borsh::to_vec(&InitializeArgs { name, symbol, uri })
        .map_err(|e| WireError::SerializationError(e.to_string()))?;

    let mut data = Vec::with_capacity(8 + args.len());
    data.extend_from_slice(&INITIALIZE_DISCRIMINATOR);
    data.extend_from_slice(&args);

    Ok(SolInstruction {
        program_id: TOKEN_2022_PROGRAM_ID.to_bytes(),
        accounts: vec![
            SolAccountMeta::writable(metadata),
            SolAccountMeta::readonly(update_authority),
            SolAccountMeta::readonly(mint),
            SolAccountMeta::readonly_signer(mint_authority),
        ],
        data,
    })
}

/// Parse the arguments of a metadata `Initialize` instruction.
pub fn parse_initialize_args(data: &[u8]) -> Option<(String, String, String)> {
    let rest = data.strip_prefix(&INITIALIZE_DISCRIMINATOR)?;
    <(String, String, String)>::try_from_slice(rest).ok()
}

/// Compute an interface discriminator from its namespaced name.
pub fn discriminator(name: &str) -> [u8; 8] {
    let hash = Sha256::digest(name.as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TokenMetadata {
        TokenMetadata {
            update_authority: Address::new([1; 32]),
            mint: Address::new([2; 32]),
            name: "My Token".into(),
            symbol: "MTK".into(),
            uri: "https://example.com/image.png".into(),
            additional_metadata: vec![],
        }
    }

    #[test]
    fn initialize_discriminator_matches_interface_hash() {
        assert_eq!(
            discriminator("spl_token_metadata_interface:initialize_account"),
            INITIALIZE_DISCRIMINATOR
        );
        assert_eq!(hex::encode(INITIALIZE_DISCRIMINATOR), "d2e11ea258b84d8d");
    }

    #[test]
    fn packed_len_matches_borsh() {
        let mut meta = sample();
        assert_eq!(meta.packed_len(), meta.pack().unwrap().len());

        meta.additional_metadata.push(("website".into(), "https://x.io".into()));
        assert_eq!(meta.packed_len(), meta.pack().unwrap().len());
    }

    #[test]
    fn tlv_len_adds_header() {
        let meta = sample();
        // 64 keys + (4+8) + (4+3) + (4+29) + 4 empty vec = 120, + 4 header.
        assert_eq!(meta.packed_len(), 120);
        assert_eq!(meta.tlv_len(), 124);
    }

    #[test]
    fn pack_unpack_roundtrip() {
        let meta = sample();
        assert_eq!(TokenMetadata::unpack(&meta.pack().unwrap()).unwrap(), meta);
    }

    #[test]
    fn unpack_truncated_fails() {
        let packed = sample().pack().unwrap();
        assert!(matches!(
            TokenMetadata::unpack(&packed[..40]),
            Err(WireError::InvalidAccountData(_))
        ));
    }

    #[test]
    fn zero_update_authority_is_none() {
        let mut meta = sample();
        assert_eq!(meta.update_authority(), Some(Address::new([1; 32])));
        meta.update_authority = Address::default();
        assert_eq!(meta.update_authority(), None);
    }

    #[test]
    fn initialize_instruction_layout() {
        let mint = Address::new([7; 32]);
        let authority = Address::new([8; 32]);
        let ix = initialize_token_metadata(&mint, &authority, &mint, &authority, "A", "B", "C")
            .unwrap();

        assert_eq!(&ix.data[..8], &INITIALIZE_DISCRIMINATOR);
        assert_eq!(&ix.data[8..], &[1, 0, 0, 0, b'A', 1, 0, 0, 0, b'B', 1, 0, 0, 0, b'C']);
        assert_eq!(ix.accounts.len(), 4);
        assert!(ix.accounts[0].is_writable);
        assert!(ix.accounts[3].is_signer && !ix.accounts[3].is_writable);
    }

    #[test]
    fn initialize_args_parse_back() {
        let mint = Address::new([7; 32]);
        let ix = initialize_token_metadata(&mint, &mint, &mint, &mint, "Gold", "GLD", "https://g")
            .unwrap();
        assert_eq!(
            parse_initialize_args(&ix.data),
            Some(("Gold".into(), "GLD".into(), "https://g".into()))
        );
        assert_eq!(parse_initialize_args(&[0u8; 4]), None);
    }
}
