//! Ed25519 verification of inbound deliveries.

use ed25519_dalek::{Signature, Verifier as _, VerifyingKey};
use hookline_core::{InteractionError, InteractionResult};
use thiserror::Error;

/// Why a public key could not be loaded.
#[derive(Debug, Clone, Error)]
pub enum KeyError {
    #[error("public key is not valid hex: {0}")]
    Hex(String),

    #[error("public key must be 32 bytes, got {0}")]
    Length(usize),

    #[error("public key is not a valid Ed25519 point")]
    Point,
}

/// Checks the signature the remote API puts on every delivery.
///
/// The signed message is the timestamp header followed by the raw body.
#[derive(Debug, Clone, Default)]
pub struct Verifier {
    key: Option<VerifyingKey>,
}

impl Verifier {
    /// Loads a hex-encoded public key.
    pub fn from_hex(public_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(public_key.trim()).map_err(|e| KeyError::Hex(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::Length(bytes.len()))?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::Point)?;
        Ok(Self { key: Some(key) })
    }

    /// A verifier without a key; it rejects everything.
    pub fn disabled() -> Self {
        Self { key: None }
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Verifies one delivery.
    ///
    /// Missing headers and bad signatures are authentication failures;
    /// a signature that is not 64 bytes of hex is a malformed request.
    pub fn verify(
        &self,
        signature: Option<&str>,
        timestamp: Option<&str>,
        body: &[u8],
    ) -> InteractionResult<()> {
        let key = self.key.as_ref().ok_or(InteractionError::MissingPublicKey)?;
        let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
            return Err(InteractionError::InvalidSignature);
        };

        let signature = hex::decode(signature.trim())
            .map_err(|e| InteractionError::InvalidBody(format!("signature: {e}")))?;
        let signature: [u8; 64] = signature.as_slice().try_into().map_err(|_| {
            InteractionError::InvalidBody(format!("signature must be 64 bytes, got {}", signature.len()))
        })?;
        let signature = Signature::from_bytes(&signature);

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        key.verify(&message, &signature)
            .map_err(|_| InteractionError::InvalidSignature)
    }
}
