//! Signatures and the signing/verification seams.
//!
//! The wire code never touches key material directly. Anything that can
//! produce a 64-byte signature over the message bytes implements [`Signer`];
//! anything that can check one implements [`Verifier`]. [`crate::Keypair`] and
//! [`Ed25519Verifier`] are the Ed25519 defaults.

use std::fmt;

use crate::error::TxError;
use crate::pubkey::Pubkey;

/// Length of a signature in bytes.
pub const SIGNATURE_BYTES: usize = 64;

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_BYTES]);

impl Signature {
    pub const fn new(bytes: [u8; SIGNATURE_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(self) -> [u8; SIGNATURE_BYTES] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_BYTES] {
        &self.0
    }

    /// An all-zero signature is what an unfilled slot looks like on the wire.
    pub fn is_zeroed(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; SIGNATURE_BYTES])
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = TxError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; SIGNATURE_BYTES] = bytes
            .try_into()
            .map_err(|_| TxError::InvalidSignatureLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl From<[u8; SIGNATURE_BYTES]> for Signature {
    fn from(bytes: [u8; SIGNATURE_BYTES]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

/// Produces signatures over serialized message bytes.
pub trait Signer {
    /// The account key this signer signs for.
    fn pubkey(&self) -> Pubkey;

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, TxError>;
}

impl<T: Signer + ?Sized> Signer for &T {
    fn pubkey(&self) -> Pubkey {
        (**self).pubkey()
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, TxError> {
        (**self).try_sign_message(message)
    }
}

/// Checks a signature over message bytes against an account key.
pub trait Verifier {
    fn verify(&self, signature: &Signature, message: &[u8], pubkey: &Pubkey) -> bool;
}

/// Strict Ed25519 verification via `ed25519-dalek`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Verifier;

impl Verifier for Ed25519Verifier {
    fn verify(&self, signature: &Signature, message: &[u8], pubkey: &Pubkey) -> bool {
        // Keys that are not valid curve points (e.g. program ids) can never verify.
        let Ok(verifying_key) = ed25519_dalek::VerifyingKey::from_bytes(pubkey.as_bytes()) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
        verifying_key.verify_strict(message, &signature).is_ok()
    }
}
