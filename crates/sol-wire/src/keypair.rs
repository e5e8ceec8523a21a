//! Ed25519 keypairs used as the default [`Signer`].

use ed25519_dalek::Signer as _;
use zeroize::Zeroize;

use crate::error::TxError;
use crate::pubkey::Pubkey;
use crate::signature::{Signature, Signer};

/// An Ed25519 signing keypair.
///
/// `ed25519-dalek` zeroizes the signing key on drop; seed copies made while
/// constructing one are wiped here.
pub struct Keypair {
    signing_key: ed25519_dalek::SigningKey,
}

impl Keypair {
    /// Build a keypair from a 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let mut seed = *seed;
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self { signing_key }
    }

    /// Build a keypair from a 64-byte secret key (`seed || public key`), the
    /// layout wallet tooling exports. The public half must match the seed.
    pub fn from_secret_key(secret: &[u8]) -> Result<Self, TxError> {
        if secret.len() != 64 {
            return Err(TxError::InvalidPrivateKey(format!(
                "expected 64 bytes, got {}",
                secret.len()
            )));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&secret[..32]);
        let keypair = Self::from_seed(&seed);
        seed.zeroize();

        if keypair.pubkey().as_bytes()[..] != secret[32..] {
            return Err(TxError::InvalidPrivateKey(
                "public key does not match seed".into(),
            ));
        }
        Ok(keypair)
    }

    /// Generate a fresh keypair from a cryptographically secure RNG.
    pub fn generate<R>(rng: &mut R) -> Self
    where
        R: rand_core::CryptoRngCore + ?Sized,
    {
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(rng),
        }
    }
}

impl Signer for Keypair {
    fn pubkey(&self) -> Pubkey {
        Pubkey::new(self.signing_key.verifying_key().to_bytes())
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, TxError> {
        let signature = self
            .signing_key
            .try_sign(message)
            .map_err(|e| TxError::SigningError(e.to_string()))?;
        Ok(Signature::new(signature.to_bytes()))
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_seed_is_deterministic() {
        let a = Keypair::from_seed(&[0x55u8; 32]);
        let b = Keypair::from_seed(&[0x55u8; 32]);
        assert_eq!(a.pubkey(), b.pubkey());
        assert_eq!(
            a.try_sign_message(b"msg").unwrap(),
            b.try_sign_message(b"msg").unwrap()
        );
    }

    #[test]
    fn from_secret_key_roundtrip() {
        let keypair = Keypair::from_seed(&[0x21u8; 32]);
        let mut secret = vec![0x21u8; 32];
        secret.extend_from_slice(keypair.pubkey().as_bytes());
        let restored = Keypair::from_secret_key(&secret).unwrap();
        assert_eq!(restored.pubkey(), keypair.pubkey());
    }

    #[test]
    fn from_secret_key_rejects_mismatched_public_half() {
        let mut secret = vec![0x21u8; 32];
        secret.extend_from_slice(&[0u8; 32]);
        let err = Keypair::from_secret_key(&secret).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn from_secret_key_rejects_wrong_length() {
        assert!(Keypair::from_secret_key(&[0u8; 32]).is_err());
    }

    #[test]
    fn generate_produces_distinct_keys() {
        let mut rng = rand::rngs::OsRng;
        let a = Keypair::generate(&mut rng);
        let b = Keypair::generate(&mut rng);
        assert_ne!(a.pubkey(), b.pubkey());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let keypair = Keypair::from_seed(&[0x42u8; 32]);
        let debug = format!("{keypair:?}");
        assert!(debug.contains("pubkey"));
        assert!(!debug.contains("signing_key"));
    }
}
