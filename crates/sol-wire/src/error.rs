use thiserror::Error;

use crate::pubkey::Pubkey;

/// Errors raised while compiling, encoding, decoding or signing transactions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("malformed short-vec length: {0}")]
    MalformedVarint(&'static str),

    #[error("unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),

    #[error("invalid message header: {0}")]
    InvalidHeader(&'static str),

    #[error("expected at least one writable signer key")]
    MissingFeePayer,

    #[error("expected first writable signer key to be the fee payer `{expected}`, found `{found}`")]
    FeePayerMismatch { expected: Pubkey, found: Pubkey },

    #[error("max static account keys length exceeded: {0} > 256")]
    TooManyAccountKeys(usize),

    #[error("encountered unknown account key `{0}` during instruction compilation")]
    UnknownAccountKey(Pubkey),

    #[error("account index overflowed during compilation: {0} keys")]
    AccountIndexOverflow(usize),

    #[error("account index {index} out of range for {len} account keys")]
    AccountIndexOutOfRange { index: usize, len: usize },

    #[error("transaction recent blockhash required")]
    MissingRecentBlockhash,

    #[error("transaction fee payer required")]
    MissingFeePayerSlot,

    #[error("unknown signer: {0}")]
    UnknownSigner(Pubkey),

    #[error("transaction references a signature that is unnecessary: {0}")]
    UnnecessarySigner(Pubkey),

    #[error("no signers")]
    NoSigners,

    #[error("signature has invalid length: expected 64 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("too many signatures: {0}")]
    TooManySignatures(usize),

    #[error("{}", describe_signature_failure(.invalid, .missing))]
    SignatureVerificationFailed {
        invalid: Vec<Pubkey>,
        missing: Vec<Pubkey>,
    },

    #[error("transaction too large: {size} > {max}")]
    TransactionTooLarge { size: usize, max: usize },

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("invalid base64: {0}")]
    InvalidBase64(String),
}

fn describe_signature_failure(invalid: &[Pubkey], missing: &[Pubkey]) -> String {
    let mut message = String::from("signature verification failed.");
    if !invalid.is_empty() {
        message.push_str(&format!(
            "\ninvalid signature for public key{} [{}].",
            plural(invalid.len()),
            join_keys(invalid)
        ));
    }
    if !missing.is_empty() {
        message.push_str(&format!(
            "\nmissing signature for public key{} [{}].",
            plural(missing.len()),
            join_keys(missing)
        ));
    }
    message
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "(s)"
    }
}

fn join_keys(keys: &[Pubkey]) -> String {
    keys.iter()
        .map(|key| format!("`{key}`"))
        .collect::<Vec<_>>()
        .join(", ")
}
