//! Solana address parsing and encoding.
//!
//! Solana addresses are Base58-encoded 32-byte values. For wallets and
//! freshly generated mints they are Ed25519 public keys; for program derived
//! addresses they are SHA-256 outputs that deliberately fall off the curve.
//! Either way the raw bytes ARE the address, with no hashing or checksum.

use std::fmt;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WireError;

/// A 32-byte Solana account address.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BorshSerialize, BorshDeserialize,
)]
pub struct Address([u8; 32]);

impl Address {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<Address> for [u8; 32] {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl FromStr for Address {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        address_to_bytes(s).map(Self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bytes_to_address(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Anything that names an address: the raw value or its Base58 string.
pub trait IntoAddress {
    fn into_address(self) -> Result<Address, WireError>;
}

impl IntoAddress for Address {
    fn into_address(self) -> Result<Address, WireError> {
        Ok(self)
    }
}

impl IntoAddress for &Address {
    fn into_address(self) -> Result<Address, WireError> {
        Ok(*self)
    }
}

impl IntoAddress for [u8; 32] {
    fn into_address(self) -> Result<Address, WireError> {
        Ok(Address(self))
    }
}

impl IntoAddress for &str {
    fn into_address(self) -> Result<Address, WireError> {
        self.parse()
    }
}

impl IntoAddress for String {
    fn into_address(self) -> Result<Address, WireError> {
        self.parse()
    }
}

impl IntoAddress for &String {
    fn into_address(self) -> Result<Address, WireError> {
        self.parse()
    }
}

/// Decode a Solana address string to its 32-byte representation.
///
/// A valid address is Base58 that decodes to exactly 32 bytes.
pub fn address_to_bytes(address: &str) -> Result<[u8; 32], WireError> {
    if address.is_empty() {
        return Err(WireError::InvalidAddress("empty address".into()));
    }

    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| WireError::InvalidAddress(format!("base58 decode failed: {e}")))?;

    let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
        WireError::InvalidAddress(format!("expected 32 bytes, got {}", v.len()))
    })?;

    Ok(arr)
}

/// Encode 32 bytes as a Solana address (Base58 string).
pub fn bytes_to_address(bytes: &[u8; 32]) -> String {
    bs58::encode(bytes).into_string()
}
