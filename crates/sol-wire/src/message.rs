//! Legacy transaction messages.
//!
//! A [`Message`] is the part of a transaction that gets signed: the header,
//! the ordered account keys, the recent blockhash and the compiled
//! instructions. Account roles are not stored per key; they follow from a
//! key's index and the three header counts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::compiled_keys::{AccountRole, CompiledKeys, MAX_STATIC_ACCOUNT_KEYS};
use crate::error::TxError;
use crate::hash::Hash;
use crate::instruction::{AccountMeta, CompiledInstruction, Instruction};
use crate::pubkey::Pubkey;
use crate::wire;

/// The three counts that describe the signer/writable ranges of the keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    /// The first `num_required_signatures` keys must sign.
    pub num_required_signatures: u8,
    /// The last `num_readonly_signed_accounts` signer keys are read-only.
    pub num_readonly_signed_accounts: u8,
    /// The last `num_readonly_unsigned_accounts` keys are read-only.
    pub num_readonly_unsigned_accounts: u8,
}

/// A compiled legacy message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    /// All keys referenced by the instructions, fee payer first.
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile `instructions` into a message paid for by `payer`.
    ///
    /// Compiling the same inputs always yields the same message.
    pub fn compile(
        instructions: &[Instruction],
        payer: &Pubkey,
        recent_blockhash: Hash,
    ) -> Result<Self, TxError> {
        let (header, account_keys) =
            CompiledKeys::compile(instructions, payer).try_into_message_components()?;
        let instructions = compile_instructions(instructions, &account_keys)?;

        log::debug!(
            "compiled message: payer={payer} keys={} signers={} instructions={}",
            account_keys.len(),
            header.num_required_signatures,
            instructions.len()
        );

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        })
    }

    /// The keys that must sign, in slot order.
    pub fn signer_keys(&self) -> &[Pubkey] {
        let n = usize::from(self.header.num_required_signatures).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.signer_keys().first()
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < usize::from(self.header.num_required_signatures)
    }

    pub fn is_writable(&self, index: usize) -> bool {
        let num_signed = usize::from(self.header.num_required_signatures);
        if index >= num_signed {
            let unsigned_index = index - num_signed;
            let num_unsigned = self.account_keys.len().saturating_sub(num_signed);
            let num_writable_unsigned = num_unsigned
                .saturating_sub(usize::from(self.header.num_readonly_unsigned_accounts));
            unsigned_index < num_writable_unsigned
        } else {
            let num_writable_signed =
                num_signed.saturating_sub(usize::from(self.header.num_readonly_signed_accounts));
            index < num_writable_signed
        }
    }

    /// Whether the key at `index` is invoked as a program by any instruction.
    pub fn is_program_id(&self, index: usize) -> bool {
        self.instructions
            .iter()
            .any(|ix| usize::from(ix.program_id_index) == index)
    }

    /// The role of the key at `index`, derived from the header.
    pub fn account_role(&self, index: usize) -> Result<AccountRole, TxError> {
        if index >= self.account_keys.len() {
            return Err(TxError::AccountIndexOutOfRange {
                index,
                len: self.account_keys.len(),
            });
        }
        Ok(AccountRole {
            is_signer: self.is_signer(index),
            is_writable: self.is_writable(index),
            is_invoked: self.is_program_id(index),
        })
    }

    /// Program ids of each instruction, in instruction order.
    pub fn program_ids(&self) -> Vec<&Pubkey> {
        self.instructions
            .iter()
            .filter_map(|ix| self.account_keys.get(usize::from(ix.program_id_index)))
            .collect()
    }

    /// Keys that are not invoked as programs.
    pub fn non_program_ids(&self) -> Vec<&Pubkey> {
        self.account_keys
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.is_program_id(*i))
            .map(|(_, key)| key)
            .collect()
    }

    /// Rebuild key-based instructions, taking each account's role from the
    /// header.
    pub fn decompile_instructions(&self) -> Result<Vec<Instruction>, TxError> {
        let key_at = |index: u8| -> Result<Pubkey, TxError> {
            self.account_keys
                .get(usize::from(index))
                .copied()
                .ok_or(TxError::AccountIndexOutOfRange {
                    index: usize::from(index),
                    len: self.account_keys.len(),
                })
        };

        self.instructions
            .iter()
            .map(|ix| {
                let accounts = ix
                    .accounts
                    .iter()
                    .map(|&i| {
                        Ok(AccountMeta {
                            pubkey: key_at(i)?,
                            is_signer: self.is_signer(usize::from(i)),
                            is_writable: self.is_writable(usize::from(i)),
                        })
                    })
                    .collect::<Result<Vec<_>, TxError>>()?;
                Ok(Instruction {
                    program_id: key_at(ix.program_id_index)?,
                    accounts,
                    data: ix.data.clone(),
                })
            })
            .collect()
    }

    /// The exact bytes that signers sign.
    pub fn serialize(&self) -> Result<Vec<u8>, TxError> {
        wire::serialize_message(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, TxError> {
        wire::deserialize_message(bytes)
    }
}

fn compile_instructions(
    instructions: &[Instruction],
    account_keys: &[Pubkey],
) -> Result<Vec<CompiledInstruction>, TxError> {
    if account_keys.len() > MAX_STATIC_ACCOUNT_KEYS {
        return Err(TxError::AccountIndexOverflow(account_keys.len()));
    }

    // Bounded by the check above, so every index fits in a u8.
    let index: HashMap<&Pubkey, u8> = account_keys
        .iter()
        .enumerate()
        .map(|(i, key)| (key, i as u8))
        .collect();
    let find = |key: &Pubkey| -> Result<u8, TxError> {
        index
            .get(key)
            .copied()
            .ok_or(TxError::UnknownAccountKey(*key))
    };

    instructions
        .iter()
        .map(|ix| {
            Ok(CompiledInstruction {
                program_id_index: find(&ix.program_id)?,
                accounts: ix
                    .accounts
                    .iter()
                    .map(|meta| find(&meta.pubkey))
                    .collect::<Result<_, _>>()?,
                data: ix.data.clone(),
            })
        })
        .collect()
}
