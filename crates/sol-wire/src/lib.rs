//! Legacy Solana transaction compiler and wire codec.
//!
//! This crate turns instructions into the compact binary message the
//! runtime expects, manages the signature slots that go with it, and
//! encodes/decodes full transactions within the 1232-byte packet limit.
//!
//! It deliberately avoids `solana-sdk`: the wire format is implemented by
//! hand, with `ed25519-dalek` for Ed25519 signing and `bs58` for Base58.

pub mod builder;
pub mod compiled_keys;
pub mod error;
pub mod hash;
pub mod instruction;
pub mod keypair;
pub mod message;
pub mod pubkey;
pub mod short_vec;
pub mod signature;
pub mod transaction;
pub mod wire;

// Re-export key public types for ergonomic imports.
pub use builder::{
    decode_base64, first_signature, sign_items, sign_raw_transaction, to_base64, SignOptions,
};
pub use compiled_keys::{AccountRole, CompiledKeys, MAX_STATIC_ACCOUNT_KEYS};
pub use error::TxError;
pub use hash::{Hash, HASH_BYTES};
pub use instruction::{AccountMeta, CompiledInstruction, Instruction, TransactionItem};
pub use keypair::Keypair;
pub use message::{Message, MessageHeader};
pub use pubkey::{Pubkey, PUBKEY_BYTES};
pub use signature::{Ed25519Verifier, Signature, Signer, Verifier, SIGNATURE_BYTES};
pub use transaction::{
    NonceInfo, SerializeConfig, SignatureReport, SignatureSlot, SigningState, Transaction,
    TransactionSummary,
};
pub use wire::{PACKET_DATA_SIZE, MAX_SIGNATURES};
