//! Transactions: the editable working state, its compiled message, and the
//! signature slots that go with it.
//!
//! The compiled [`Message`] is a cache. Every mutator marks it dirty; the
//! next operation that needs the message recompiles. Signature slots are
//! always aligned with the signer prefix of the current message, so partial
//! signing over several calls keeps writing into the same positions.
//!
//! A `Transaction` has a single owner. Mutators take `&mut self`, so
//! concurrent edits of one transaction have to be serialized by the caller.

use serde::Serialize;

use crate::error::TxError;
use crate::hash::Hash;
use crate::instruction::{Instruction, TransactionItem};
use crate::message::Message;
use crate::pubkey::Pubkey;
use crate::signature::{Ed25519Verifier, Signature, Signer, Verifier};
use crate::wire;

/// One required signature: the key that must sign and, once signed, the
/// signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSlot {
    pub pubkey: Pubkey,
    pub signature: Option<Signature>,
}

impl SignatureSlot {
    pub fn empty(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            signature: None,
        }
    }
}

/// Durable nonce: the nonce value stands in for the recent blockhash and the
/// advance-nonce instruction must run first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceInfo {
    pub nonce: Hash,
    pub nonce_instruction: Instruction,
}

/// Where a transaction is in the signing protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    /// Not compiled since the last edit.
    Unsigned,
    /// Compiled; every slot is empty.
    SlotsAllocated,
    PartiallySigned,
    FullySigned,
}

/// Options for [`Transaction::serialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerializeConfig {
    /// Treat empty slots as an error.
    pub require_all_signatures: bool,
    /// Check signatures before producing the wire bytes.
    pub verify_signatures: bool,
}

impl Default for SerializeConfig {
    fn default() -> Self {
        Self {
            require_all_signatures: true,
            verify_signatures: true,
        }
    }
}

/// Outcome of checking every signature slot against the message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureReport {
    /// Slots holding a signature that does not verify.
    pub invalid: Vec<Pubkey>,
    /// Empty slots (only collected when all signatures are required).
    pub missing: Vec<Pubkey>,
}

impl SignatureReport {
    pub fn is_ok(&self) -> bool {
        self.invalid.is_empty() && self.missing.is_empty()
    }

    pub fn into_result(self) -> Result<(), TxError> {
        if self.is_ok() {
            return Ok(());
        }
        Err(TxError::SignatureVerificationFailed {
            invalid: self.invalid,
            missing: self.missing,
        })
    }
}

/// JSON-friendly view of a transaction's working state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary<'a> {
    pub recent_blockhash: Option<Hash>,
    pub fee_payer: Option<Pubkey>,
    pub nonce_info: Option<&'a NonceInfo>,
    pub instructions: &'a [Instruction],
    pub signers: Vec<Pubkey>,
}

/// A legacy transaction under construction or ready for the wire.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    fee_payer: Option<Pubkey>,
    recent_blockhash: Option<Hash>,
    nonce_info: Option<NonceInfo>,
    instructions: Vec<Instruction>,
    signatures: Vec<SignatureSlot>,
    message: Option<Message>,
    dirty: bool,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transaction with its fee payer and recent blockhash already set.
    pub fn new_with_payer(fee_payer: Pubkey, recent_blockhash: Hash) -> Self {
        Self {
            fee_payer: Some(fee_payer),
            recent_blockhash: Some(recent_blockhash),
            ..Self::default()
        }
    }

    /// Decode a wire transaction.
    ///
    /// The parsed message is kept as the compiled message, so serializing
    /// the result again reproduces `bytes` exactly until something is edited.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, TxError> {
        let wire::WireTransaction {
            signatures,
            message,
        } = wire::deserialize_transaction(bytes)?;

        let slots = message
            .signer_keys()
            .iter()
            .zip(signatures)
            .map(|(pubkey, signature)| SignatureSlot {
                pubkey: *pubkey,
                signature,
            })
            .collect();

        Ok(Self {
            fee_payer: message.fee_payer().copied(),
            recent_blockhash: Some(message.recent_blockhash),
            nonce_info: None,
            instructions: message.decompile_instructions()?,
            signatures: slots,
            message: Some(message),
            dirty: false,
        })
    }

    // -- working state ------------------------------------------------------

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.fee_payer.as_ref()
    }

    pub fn set_fee_payer(&mut self, fee_payer: Pubkey) -> &mut Self {
        self.fee_payer = Some(fee_payer);
        self.invalidate();
        self
    }

    pub fn recent_blockhash(&self) -> Option<&Hash> {
        self.recent_blockhash.as_ref()
    }

    pub fn set_recent_blockhash(&mut self, recent_blockhash: Hash) -> &mut Self {
        self.recent_blockhash = Some(recent_blockhash);
        self.invalidate();
        self
    }

    pub fn nonce_info(&self) -> Option<&NonceInfo> {
        self.nonce_info.as_ref()
    }

    pub fn set_nonce_info(&mut self, nonce_info: Option<NonceInfo>) -> &mut Self {
        self.nonce_info = nonce_info;
        self.invalidate();
        self
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Append an instruction or a group of instructions.
    pub fn add(&mut self, item: impl Into<TransactionItem>) -> &mut Self {
        self.instructions.extend(item.into().into_instructions());
        self.invalidate();
        self
    }

    pub fn signatures(&self) -> &[SignatureSlot] {
        &self.signatures
    }

    /// The first slot's signature, which doubles as the transaction id.
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first().and_then(|slot| slot.signature.as_ref())
    }

    pub fn signing_state(&self) -> SigningState {
        if self.dirty || self.message.is_none() {
            return SigningState::Unsigned;
        }
        let filled = self
            .signatures
            .iter()
            .filter(|slot| slot.signature.is_some())
            .count();
        match filled {
            0 => SigningState::SlotsAllocated,
            n if n < self.signatures.len() => SigningState::PartiallySigned,
            _ => SigningState::FullySigned,
        }
    }

    pub fn summary(&self) -> TransactionSummary<'_> {
        TransactionSummary {
            recent_blockhash: self.recent_blockhash,
            fee_payer: self.fee_payer,
            nonce_info: self.nonce_info.as_ref(),
            instructions: &self.instructions,
            signers: self.signatures.iter().map(|slot| slot.pubkey).collect(),
        }
    }

    fn invalidate(&mut self) {
        self.dirty = true;
    }

    // -- compilation --------------------------------------------------------

    /// The compiled message, recompiling if the working state changed.
    ///
    /// Signature slots are realigned to the message's signers: they survive
    /// only if the message did not change and they already match key for
    /// key; otherwise they are replaced by empty slots in signer order.
    pub fn compile_message(&mut self) -> Result<&Message, TxError> {
        let message = match self.message.take() {
            Some(message) if !self.dirty => message,
            previous => {
                let message = match self.build_message() {
                    Ok(message) => message,
                    Err(err) => {
                        self.message = previous;
                        return Err(err);
                    }
                };
                self.realign_slots(previous.as_ref(), &message);
                self.dirty = false;
                message
            }
        };
        Ok(&*self.message.insert(message))
    }

    /// The exact bytes each signer signs.
    pub fn serialize_message(&mut self) -> Result<Vec<u8>, TxError> {
        self.compile_message()?.serialize()
    }

    fn build_message(&self) -> Result<Message, TxError> {
        let (recent_blockhash, instructions) = match &self.nonce_info {
            Some(nonce) => {
                let mut instructions = self.instructions.clone();
                if instructions.first() != Some(&nonce.nonce_instruction) {
                    instructions.insert(0, nonce.nonce_instruction.clone());
                }
                (nonce.nonce, instructions)
            }
            None => (
                self.recent_blockhash.ok_or(TxError::MissingRecentBlockhash)?,
                self.instructions.clone(),
            ),
        };

        let fee_payer = self
            .fee_payer
            .or_else(|| self.signatures.first().map(|slot| slot.pubkey))
            .ok_or(TxError::MissingFeePayerSlot)?;

        Message::compile(&instructions, &fee_payer, recent_blockhash)
    }

    fn realign_slots(&mut self, previous: Option<&Message>, message: &Message) {
        let signer_keys = message.signer_keys();
        let aligned = previous == Some(message)
            && self.signatures.len() == signer_keys.len()
            && self
                .signatures
                .iter()
                .zip(signer_keys)
                .all(|(slot, key)| slot.pubkey == *key);

        if !aligned {
            self.signatures = signer_keys.iter().copied().map(SignatureSlot::empty).collect();
        }
    }

    // -- signing ------------------------------------------------------------

    /// Sign with every given signer, discarding any existing signatures.
    ///
    /// Each signer must be a signer of the compiled message. With no fee
    /// payer set, the first signer pays. On error the transaction is left as
    /// it was.
    pub fn sign(&mut self, signers: &[&dyn Signer]) -> Result<(), TxError> {
        let signers = unique_signers(signers)?;

        let previous_slots = self.signatures.clone();
        let previous_message = self.message.clone();
        let was_dirty = self.dirty;

        if self.fee_payer.is_none() {
            // The payer falls back to the first slot, so seed the slots with
            // the signers and recompile.
            self.signatures = signers
                .iter()
                .map(|signer| SignatureSlot::empty(signer.pubkey()))
                .collect();
            self.invalidate();
        }

        if let Err(err) = self.sign_fresh(&signers) {
            self.signatures = previous_slots;
            self.message = previous_message;
            self.dirty = was_dirty;
            return Err(err);
        }
        Ok(())
    }

    fn sign_fresh(&mut self, signers: &[&dyn Signer]) -> Result<(), TxError> {
        check_signers(self.compile_message()?, signers)?;
        // Slots are aligned with the message's signers; start them empty.
        for slot in &mut self.signatures {
            slot.signature = None;
        }
        self.fill_slots(signers)
    }

    /// Sign with the given signers, keeping signatures already present.
    pub fn partial_sign(&mut self, signers: &[&dyn Signer]) -> Result<(), TxError> {
        let signers = unique_signers(signers)?;
        self.compile_message()?;
        self.fill_slots(&signers)
    }

    fn fill_slots(&mut self, signers: &[&dyn Signer]) -> Result<(), TxError> {
        let message_bytes = self.serialize_message()?;
        for signer in signers {
            let pubkey = signer.pubkey();
            // Look the slot up first so an unknown signer never signs.
            let index = self.slot_index(&pubkey)?;
            let signature = signer.try_sign_message(&message_bytes)?;
            self.signatures[index].signature = Some(signature);
            log::debug!("signed transaction slot {index} for {pubkey}");
        }
        Ok(())
    }

    /// Insert an externally produced signature for `pubkey`.
    pub fn add_signature(&mut self, pubkey: &Pubkey, signature: &[u8]) -> Result<(), TxError> {
        self.compile_message()?;
        let signature = Signature::try_from(signature)?;
        let index = self.slot_index(pubkey)?;
        self.signatures[index].signature = Some(signature);
        Ok(())
    }

    fn slot_index(&self, pubkey: &Pubkey) -> Result<usize, TxError> {
        self.signatures
            .iter()
            .position(|slot| slot.pubkey == *pubkey)
            .ok_or(TxError::UnknownSigner(*pubkey))
    }

    // -- verification -------------------------------------------------------

    /// Check every slot against the message and collect all problems.
    pub fn signature_report_with<V: Verifier + ?Sized>(
        &mut self,
        verifier: &V,
        require_all_signatures: bool,
    ) -> Result<SignatureReport, TxError> {
        let message_bytes = self.serialize_message()?;
        Ok(self.report(verifier, &message_bytes, require_all_signatures))
    }

    pub fn signature_report(
        &mut self,
        require_all_signatures: bool,
    ) -> Result<SignatureReport, TxError> {
        self.signature_report_with(&Ed25519Verifier, require_all_signatures)
    }

    /// `Ok(true)` when no slot is invalid and, if required, none is empty.
    pub fn verify_signatures(&mut self, require_all_signatures: bool) -> Result<bool, TxError> {
        Ok(self.signature_report(require_all_signatures)?.is_ok())
    }

    pub fn verify_signatures_with<V: Verifier + ?Sized>(
        &mut self,
        verifier: &V,
        require_all_signatures: bool,
    ) -> Result<bool, TxError> {
        Ok(self
            .signature_report_with(verifier, require_all_signatures)?
            .is_ok())
    }

    fn report<V: Verifier + ?Sized>(
        &self,
        verifier: &V,
        message_bytes: &[u8],
        require_all_signatures: bool,
    ) -> SignatureReport {
        let mut report = SignatureReport::default();
        for slot in &self.signatures {
            match &slot.signature {
                None if require_all_signatures => report.missing.push(slot.pubkey),
                None => {}
                Some(signature) => {
                    if !verifier.verify(signature, message_bytes, &slot.pubkey) {
                        report.invalid.push(slot.pubkey);
                    }
                }
            }
        }
        report
    }

    // -- wire ---------------------------------------------------------------

    /// Produce the wire bytes, refusing anything that fails the configured
    /// signature checks or does not fit in one packet.
    pub fn serialize(&mut self, config: SerializeConfig) -> Result<Vec<u8>, TxError> {
        self.serialize_with(&Ed25519Verifier, config)
    }

    pub fn serialize_with<V: Verifier + ?Sized>(
        &mut self,
        verifier: &V,
        config: SerializeConfig,
    ) -> Result<Vec<u8>, TxError> {
        let message_bytes = self.serialize_message()?;

        if config.verify_signatures {
            self.report(verifier, &message_bytes, config.require_all_signatures)
                .into_result()?;
        }

        let signatures: Vec<Option<Signature>> =
            self.signatures.iter().map(|slot| slot.signature).collect();
        wire::serialize_transaction(&signatures, &message_bytes)
    }
}

impl From<&Transaction> for TransactionItem {
    fn from(tx: &Transaction) -> Self {
        TransactionItem::InstructionGroup(tx.instructions.clone())
    }
}

/// Every signer must appear in the message as a signer.
fn check_signers(message: &Message, signers: &[&dyn Signer]) -> Result<(), TxError> {
    for signer in signers {
        let pubkey = signer.pubkey();
        match message.account_keys.iter().position(|k| *k == pubkey) {
            None => return Err(TxError::UnknownSigner(pubkey)),
            Some(index) if !message.is_signer(index) => {
                return Err(TxError::UnnecessarySigner(pubkey))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Drop repeated signers, keeping the first occurrence of each key.
fn unique_signers<'a>(signers: &[&'a dyn Signer]) -> Result<Vec<&'a dyn Signer>, TxError> {
    if signers.is_empty() {
        return Err(TxError::NoSigners);
    }
    let mut seen = std::collections::HashSet::new();
    Ok(signers
        .iter()
        .copied()
        .filter(|signer| seen.insert(signer.pubkey()))
        .collect())
}
