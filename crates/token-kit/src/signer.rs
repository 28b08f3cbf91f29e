//! The externally held signer that authorizes and submits transactions.

use spl_wire::{sign_raw_transaction, Address, Keypair, Signature};
use thiserror::Error;

use crate::ledger::{LedgerError, LedgerRpc};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// The signer refused or was unable to sign.
    #[error("signer declined: {0}")]
    Declined(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A wallet that can authorize a transaction and hand it to the ledger.
///
/// `wire` arrives with every signature slot the signer does not own already
/// filled (or zeroed if nobody else signs). The signer fills its own slot,
/// which is always slot 0 since it pays the fee.
#[allow(async_fn_in_trait)]
pub trait TransactionSigner {
    fn address(&self) -> Address;

    async fn sign_and_send<L: LedgerRpc>(
        &self,
        wire: &[u8],
        ledger: &L,
    ) -> Result<Signature, SubmitError>;
}

/// A signer backed by a key held in memory.
#[derive(Debug)]
pub struct KeypairSigner {
    keypair: Keypair,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn generate() -> Self {
        Self::new(Keypair::generate())
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl TransactionSigner for KeypairSigner {
    fn address(&self) -> Address {
        self.keypair.address()
    }

    async fn sign_and_send<L: LedgerRpc>(
        &self,
        wire: &[u8],
        ledger: &L,
    ) -> Result<Signature, SubmitError> {
        let signed = sign_raw_transaction(&self.keypair, wire)
            .map_err(|e| SubmitError::Declined(e.to_string()))?;
        Ok(ledger.send_transaction(&signed).await?)
    }
}
