//! # Local Co-Signers
//!
//! Ed25519 keypairs that sign a transaction *locally*, next to the wallet's
//! signature. The classic case is minting: the new mint account's keypair
//! is generated on the spot and must co-sign the creation instruction.
//!
//! Co-signatures cover [`TransactionRequest::message_bytes`](crate::types::TransactionRequest::message_bytes),
//! which includes the validity window. A new window means new signatures,
//! so the request re-signs on every bind.
//!
//! Key bytes are never logged. `Debug` prints the public half only.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use std::fmt;
use thiserror::Error;

use crate::types::PublicIdentity;

/// Errors from loading key material. The offending input is never echoed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("seed is not valid hex")]
    InvalidHex,

    #[error("seed must be {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },
}

/// A local Ed25519 co-signer.
#[derive(Clone)]
pub struct CoSigner {
    signing_key: SigningKey,
}

impl CoSigner {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed. Tests and fixtures only;
    /// a weak seed is a weak key.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Keypair from a hex-encoded 32-byte seed.
    pub fn from_hex_seed(seed: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(seed.trim()).map_err(|_| KeyError::InvalidHex)?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes.try_into().map_err(|b: Vec<u8>| {
            KeyError::WrongLength {
                expected: SECRET_KEY_LENGTH,
                got: b.len(),
            }
        })?;
        Ok(Self::from_seed(&seed))
    }

    /// The public identity this co-signer signs as.
    pub fn identity(&self) -> PublicIdentity {
        PublicIdentity::from_bytes(self.signing_key.verifying_key().to_bytes())
    }

    /// Signs `message`.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Verifies a signature produced by this co-signer.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        verify_signature(&self.identity(), message, &signature.to_bytes())
    }
}

/// Checks a raw 64-byte signature against `identity`.
///
/// Returns `false` on a malformed key or signature instead of erroring;
/// callers only ever want yes or no.
pub fn verify_signature(identity: &PublicIdentity, message: &[u8], signature: &[u8]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(identity.as_bytes()) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    verifying_key
        .verify(message, &Signature::from_bytes(&sig_bytes))
        .is_ok()
}

impl fmt::Debug for CoSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoSigner(pub={})", self.identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let signer = CoSigner::generate();
        let sig = signer.sign(b"mint 1000 tokens");
        assert!(signer.verify(b"mint 1000 tokens", &sig));
        assert!(!signer.verify(b"mint 1001 tokens", &sig));
    }

    #[test]
    fn hex_seed_matches_raw_seed() {
        let from_hex = CoSigner::from_hex_seed(&"2a".repeat(32)).unwrap();
        assert_eq!(from_hex.identity(), CoSigner::from_seed(&[42u8; 32]).identity());
        assert_eq!(CoSigner::from_hex_seed("zz").unwrap_err(), KeyError::InvalidHex);
        assert_eq!(
            CoSigner::from_hex_seed("abcd").unwrap_err(),
            KeyError::WrongLength {
                expected: 32,
                got: 2
            }
        );
    }

    #[test]
    fn deterministic_from_seed() {
        let a = CoSigner::from_seed(&[42u8; 32]);
        let b = CoSigner::from_seed(&[42u8; 32]);
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn verify_signature_rejects_wrong_length() {
        let signer = CoSigner::generate();
        assert!(!verify_signature(&signer.identity(), b"msg", &[0u8; 10]));
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let signer = CoSigner::generate();
        let debug = format!("{:?}", signer);
        assert!(debug.starts_with("CoSigner(pub="));
        assert!(!debug.contains("signing_key"));
    }

    #[test]
    fn clone_preserves_identity() {
        let signer = CoSigner::generate();
        assert_eq!(signer.clone().identity(), signer.identity());
    }
}
