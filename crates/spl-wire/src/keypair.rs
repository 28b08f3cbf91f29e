//! Ed25519 keypairs and signatures.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::Signer;
use rand_core::{OsRng, RngCore};
use zeroize::Zeroize;

use crate::address::Address;
use crate::error::WireError;

/// An Ed25519 keypair. The signing key is zeroized on drop by `ed25519-dalek`.
pub struct Keypair {
    signing_key: ed25519_dalek::SigningKey,
}

impl Keypair {
    /// Generate a keypair from 32 bytes of OS randomness.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let keypair = Self::from_seed(&seed);
        seed.zeroize();
        keypair
    }

    /// Rebuild a keypair from its 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    pub fn address(&self) -> Address {
        Address::new(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// A 64-byte Ed25519 signature. The first signature of a transaction is also
/// its identifier on the ledger.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Signature {
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(self) -> [u8; 64] {
        self.0
    }

    /// All-zero placeholder used for unfilled signature slots.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Strict Ed25519 verification of `message` against `signer`.
    pub fn verify(&self, signer: &Address, message: &[u8]) -> bool {
        let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(signer.as_bytes()) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&self.0);
        key.verify_strict(message, &sig).is_ok()
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl FromStr for Signature {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| WireError::InvalidSignature(format!("base58 decode failed: {e}")))?;
        let arr: [u8; 64] = bytes.try_into().map_err(|v: Vec<u8>| {
            WireError::InvalidSignature(format!("expected 64 bytes, got {}", v.len()))
        })?;
        Ok(Self(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keypairs_differ() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn from_seed_is_deterministic() {
        let a = Keypair::from_seed(&[0x42; 32]);
        let b = Keypair::from_seed(&[0x42; 32]);
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn signature_verifies_against_signer() {
        let kp = Keypair::from_seed(&[0x11; 32]);
        let sig = kp.sign(b"mint 1000");
        assert!(sig.verify(&kp.address(), b"mint 1000"));
        assert!(!sig.verify(&kp.address(), b"mint 1001"));
    }

    #[test]
    fn signature_rejects_other_signer() {
        let a = Keypair::from_seed(&[0x11; 32]);
        let b = Keypair::from_seed(&[0x22; 32]);
        let sig = a.sign(b"payload");
        assert!(!sig.verify(&b.address(), b"payload"));
    }

    #[test]
    fn signature_base58_roundtrip() {
        let sig = Keypair::from_seed(&[0x33; 32]).sign(b"x");
        let parsed: Signature = sig.to_string().parse().unwrap();
        assert_eq!(parsed, sig);
    }

    #[test]
    fn signature_wrong_length_fails() {
        let short = bs58::encode([1u8; 32]).into_string();
        assert!(matches!(
            short.parse::<Signature>(),
            Err(WireError::InvalidSignature(_))
        ));
    }

    #[test]
    fn default_signature_is_empty() {
        assert!(Signature::default().is_empty());
        assert!(!Keypair::from_seed(&[1; 32]).sign(b"m").is_empty());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = Keypair::from_seed(&[0x55; 32]);
        let debug = format!("{kp:?}");
        assert!(debug.contains(&kp.address().to_string()));
        assert!(!debug.contains("signing_key"));
    }
}
