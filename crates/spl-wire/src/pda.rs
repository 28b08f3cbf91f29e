//! Program Derived Address (PDA) derivation.
//!
//! A PDA is `SHA-256(seeds || bump || program_id || "ProgramDerivedAddress")`
//! for the highest bump in 255..=0 whose hash is NOT a valid Ed25519 point,
//! so no private key can ever sign for it. Associated token accounts are PDAs
//! of the Associated Token Account program over `[owner, token_program, mint]`.

use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::error::WireError;
use crate::token::ASSOCIATED_TOKEN_PROGRAM_ID;

/// The string appended to PDA derivation: "ProgramDerivedAddress".
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Seeds longer than this are rejected by the runtime.
pub const MAX_SEED_LEN: usize = 32;

/// Derive the associated token account address for an owner + mint pair
/// under the given token program.
pub fn derive_associated_token_address(
    owner: &Address,
    mint: &Address,
    token_program_id: &Address,
) -> Result<Address, WireError> {
    find_program_address(
        &[owner.as_ref(), token_program_id.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _bump)| address)
}

/// Find a valid PDA for the given seeds and program, returning the bump too.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<(Address, u8), WireError> {
    if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(WireError::InvalidAddress(format!(
            "seed of {} bytes exceeds {MAX_SEED_LEN}",
            seed.len()
        )));
    }

    for bump in (0u8..=255).rev() {
        if let Some(address) = create_program_address(seeds, bump, program_id) {
            return Ok((address, bump));
        }
    }

    Err(WireError::InvalidAddress(
        "could not find valid PDA bump seed".into(),
    ))
}

/// Attempt to create a PDA from seeds + bump + program id.
///
/// Returns `None` if the hash falls on the Ed25519 curve.
pub fn create_program_address(
    seeds: &[&[u8]],
    bump: u8,
    program_id: &Address,
) -> Option<Address> {
    let mut hasher = Sha256::new();

    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update([bump]);
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);

    let hash: [u8; 32] = hasher.finalize().into();

    if is_on_curve(&hash) {
        return None;
    }

    Some(Address::new(hash))
}

/// Check if 32 bytes decompress to an Ed25519 curve point.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    curve25519_dalek::edwards::CompressedEdwardsY(*bytes)
        .decompress()
        .is_some()
}
