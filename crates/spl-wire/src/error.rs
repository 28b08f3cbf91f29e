use thiserror::Error;

/// Errors raised while encoding or decoding Solana wire data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("invalid account data: {0}")]
    InvalidAccountData(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_address() {
        let err = WireError::InvalidAddress("bad decode".into());
        assert_eq!(err.to_string(), "invalid address: bad decode");
    }

    #[test]
    fn display_invalid_signature() {
        let err = WireError::InvalidSignature("expected 64 bytes".into());
        assert_eq!(err.to_string(), "invalid signature: expected 64 bytes");
    }

    #[test]
    fn display_transaction_build_error() {
        let err = WireError::TransactionBuildError("no instructions".into());
        assert_eq!(err.to_string(), "transaction build error: no instructions");
    }

    #[test]
    fn display_signing_error() {
        let err = WireError::SigningError("ed25519 failed".into());
        assert_eq!(err.to_string(), "signing error: ed25519 failed");
    }

    #[test]
    fn display_serialization_error() {
        let err = WireError::SerializationError("compact-u16 overflow".into());
        assert_eq!(
            err.to_string(),
            "serialization error: compact-u16 overflow"
        );
    }

    #[test]
    fn display_invalid_account_data() {
        let err = WireError::InvalidAccountData("mint data too short".into());
        assert_eq!(err.to_string(), "invalid account data: mint data too short");
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> =
            Box::new(WireError::SigningError("test".into()));
        assert!(err.to_string().contains("test"));
    }
}
