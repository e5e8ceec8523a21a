//! One-shot helpers on top of [`Transaction`]: build and sign in a single
//! call, co-sign a transaction received as wire bytes, and move wire bytes
//! through base64 for RPC submission.

use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::TxError;
use crate::hash::Hash;
use crate::instruction::TransactionItem;
use crate::pubkey::Pubkey;
use crate::signature::{Signature, Signer};
use crate::transaction::{SerializeConfig, Transaction};
use crate::wire;

/// Inputs for [`sign_items`] besides the instructions and signers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOptions {
    /// Fee payer; the first signer pays when unset.
    #[serde(default)]
    pub payer: Option<Pubkey>,
    pub recent_blockhash: Hash,
}

/// Build a transaction from `items` and sign it with every signer.
pub fn sign_items<I>(
    items: I,
    signers: &[&dyn Signer],
    options: &SignOptions,
) -> Result<Transaction, TxError>
where
    I: IntoIterator,
    I::Item: Into<TransactionItem>,
{
    let first = signers.first().ok_or(TxError::NoSigners)?;
    let payer = options.payer.unwrap_or_else(|| first.pubkey());

    let mut tx = Transaction::new_with_payer(payer, options.recent_blockhash);
    for item in items {
        tx.add(item);
    }
    tx.sign(signers)?;
    Ok(tx)
}

/// Add `signer`'s signature to a serialized transaction.
///
/// Other slots are kept as they are, so a transaction built elsewhere can
/// be passed around and signed by each party in turn. Slots still empty
/// afterwards are written as zeros.
pub fn sign_raw_transaction(signer: &dyn Signer, raw_tx: &[u8]) -> Result<Vec<u8>, TxError> {
    let mut tx = Transaction::from_wire(raw_tx)?;
    tx.partial_sign(&[signer])?;
    tx.serialize(SerializeConfig {
        require_all_signatures: false,
        verify_signatures: true,
    })
}

/// The fee payer's signature, which identifies the transaction on chain.
pub fn first_signature(wire: &[u8]) -> Result<Signature, TxError> {
    let (signatures, _) = wire::split_transaction(wire)?;
    signatures
        .into_iter()
        .next()
        .ok_or(TxError::MissingFeePayerSlot)
}

/// Standard base64, the encoding RPC nodes accept for submitted transactions.
pub fn to_base64(wire: &[u8]) -> String {
    BASE64_STANDARD.encode(wire)
}

pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, TxError> {
    BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|e| TxError::InvalidBase64(e.to_string()))
}
