//! Instructions before and after compilation.

use serde::Serialize;

use crate::pubkey::Pubkey;

/// A single account reference in an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// An opaque program call over a list of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    #[serde(serialize_with = "serialize_data")]
    pub data: Vec<u8>,
}

impl Instruction {
    pub fn new(program_id: Pubkey, accounts: Vec<AccountMeta>, data: Vec<u8>) -> Self {
        Self {
            program_id,
            accounts,
            data,
        }
    }
}

fn serialize_data<S: serde::Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&bs58::encode(data).into_string())
}

/// An instruction whose keys were replaced by u8 indexes into the message's
/// account keys.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompiledInstruction {
    /// Index of the program to invoke.
    pub program_id_index: u8,
    /// Indexes of each account the instruction reads or writes.
    pub accounts: Vec<u8>,
    /// Opaque instruction data.
    pub data: Vec<u8>,
}

/// Something that can be appended to a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionItem {
    SingleInstruction(Instruction),
    /// Instructions lifted from another transaction or builder, kept in order.
    InstructionGroup(Vec<Instruction>),
}

impl TransactionItem {
    pub fn into_instructions(self) -> Vec<Instruction> {
        match self {
            TransactionItem::SingleInstruction(ix) => vec![ix],
            TransactionItem::InstructionGroup(ixs) => ixs,
        }
    }
}

impl From<Instruction> for TransactionItem {
    fn from(ix: Instruction) -> Self {
        TransactionItem::SingleInstruction(ix)
    }
}

impl From<Vec<Instruction>> for TransactionItem {
    fn from(ixs: Vec<Instruction>) -> Self {
        TransactionItem::InstructionGroup(ixs)
    }
}

impl From<&[Instruction]> for TransactionItem {
    fn from(ixs: &[Instruction]) -> Self {
        TransactionItem::InstructionGroup(ixs.to_vec())
    }
}
