//! Account key collection and canonical ordering.
//!
//! Every key referenced by a set of instructions is merged into one role
//! (signer / writable / invoked, OR-ed across all mentions) and the distinct
//! keys are laid out as:
//!
//! 1. writable signers (fee payer first)
//! 2. read-only signers
//! 3. writable non-signers
//! 4. read-only non-signers
//!
//! Within a group keys keep first-touch order: the fee payer, then for each
//! instruction its program id followed by its accounts. The header only
//! stores group sizes, so this ordering is what tells the runtime which
//! accounts sign and which may be written.

use std::collections::HashMap;

use crate::error::TxError;
use crate::instruction::Instruction;
use crate::message::MessageHeader;
use crate::pubkey::Pubkey;

/// Upper bound on the number of static account keys in a message.
pub const MAX_STATIC_ACCOUNT_KEYS: usize = 256;

/// The merged role of one account key across all instructions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountRole {
    pub is_signer: bool,
    pub is_writable: bool,
    /// The key is the program id of at least one instruction.
    pub is_invoked: bool,
}

/// Keys collected from a set of instructions, in first-touch order.
#[derive(Debug, Clone, Default)]
pub struct CompiledKeys {
    payer: Pubkey,
    entries: Vec<(Pubkey, AccountRole)>,
    index: HashMap<Pubkey, usize>,
}

impl CompiledKeys {
    /// Collect the keys of `instructions` with `payer` as the fee payer.
    pub fn compile(instructions: &[Instruction], payer: &Pubkey) -> Self {
        let mut keys = Self {
            payer: *payer,
            entries: Vec::new(),
            index: HashMap::new(),
        };

        let payer_role = keys.role_mut(payer);
        payer_role.is_signer = true;
        payer_role.is_writable = true;

        for ix in instructions {
            keys.role_mut(&ix.program_id).is_invoked = true;
            for meta in &ix.accounts {
                let role = keys.role_mut(&meta.pubkey);
                role.is_signer |= meta.is_signer;
                role.is_writable |= meta.is_writable;
            }
        }

        keys
    }

    fn role_mut(&mut self, key: &Pubkey) -> &mut AccountRole {
        let next = self.entries.len();
        let slot = *self.index.entry(*key).or_insert(next);
        if slot == next {
            self.entries.push((*key, AccountRole::default()));
        }
        &mut self.entries[slot].1
    }

    /// Number of distinct keys seen.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The merged role of `key`, if it was referenced.
    pub fn role(&self, key: &Pubkey) -> Option<AccountRole> {
        self.index.get(key).map(|&i| self.entries[i].1)
    }

    /// Order the keys into their four groups and derive the header.
    pub fn try_into_message_components(self) -> Result<(MessageHeader, Vec<Pubkey>), TxError> {
        if self.entries.len() > MAX_STATIC_ACCOUNT_KEYS {
            return Err(TxError::TooManyAccountKeys(self.entries.len()));
        }

        let group = |signer: bool, writable: bool| -> Vec<Pubkey> {
            self.entries
                .iter()
                .filter(|(_, role)| role.is_signer == signer && role.is_writable == writable)
                .map(|(key, _)| *key)
                .collect()
        };

        let writable_signers = group(true, true);
        let readonly_signers = group(true, false);
        let writable_non_signers = group(false, true);
        let readonly_non_signers = group(false, false);

        let first = writable_signers.first().ok_or(TxError::MissingFeePayer)?;
        if *first != self.payer {
            return Err(TxError::FeePayerMismatch {
                expected: self.payer,
                found: *first,
            });
        }

        let total = self.entries.len();
        let try_into_u8 =
            |count: usize| u8::try_from(count).map_err(|_| TxError::AccountIndexOverflow(total));

        let header = MessageHeader {
            num_required_signatures: try_into_u8(writable_signers.len() + readonly_signers.len())?,
            num_readonly_signed_accounts: try_into_u8(readonly_signers.len())?,
            num_readonly_unsigned_accounts: try_into_u8(readonly_non_signers.len())?,
        };

        let static_account_keys = writable_signers
            .into_iter()
            .chain(readonly_signers)
            .chain(writable_non_signers)
            .chain(readonly_non_signers)
            .collect();

        Ok((header, static_account_keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::AccountMeta;

    fn key(n: u8) -> Pubkey {
        Pubkey::new([n; 32])
    }

    #[test]
    fn payer_only() {
        let payer = key(1);
        let keys = CompiledKeys::compile(&[], &payer);
        let (header, accounts) = keys.try_into_message_components().unwrap();
        assert_eq!(accounts, vec![payer]);
        assert_eq!(
            header,
            MessageHeader {
                num_required_signatures: 1,
                num_readonly_signed_accounts: 0,
                num_readonly_unsigned_accounts: 0,
            }
        );
    }

    #[test]
    fn roles_are_or_merged() {
        let payer = key(1);
        let program = key(9);
        let shared = key(5);
        let ixs = [
            Instruction::new(program, vec![AccountMeta::new_readonly(shared, false)], vec![]),
            Instruction::new(program, vec![AccountMeta::new(shared, false)], vec![]),
        ];
        let keys = CompiledKeys::compile(&ixs, &payer);
        assert_eq!(keys.len(), 3);
        let role = keys.role(&shared).unwrap();
        assert!(role.is_writable);
        assert!(!role.is_signer);
        assert!(keys.role(&program).unwrap().is_invoked);

        let (_, accounts) = keys.try_into_message_components().unwrap();
        assert_eq!(accounts.iter().filter(|k| **k == shared).count(), 1);
    }

    #[test]
    fn groups_keep_first_touch_order() {
        let payer = key(50);
        let program = key(1);
        let ixs = [Instruction::new(
            program,
            vec![
                AccountMeta::new_readonly(key(40), false),
                AccountMeta::new(key(30), false),
                AccountMeta::new_readonly(key(20), true),
                AccountMeta::new(key(10), true),
                AccountMeta::new(key(35), false),
                AccountMeta::new_readonly(key(15), true),
            ],
            vec![],
        )];

        let (header, accounts) = CompiledKeys::compile(&ixs, &payer)
            .try_into_message_components()
            .unwrap();

        assert_eq!(
            accounts,
            vec![
                payer,
                key(10),
                key(20),
                key(15),
                key(30),
                key(35),
                program,
                key(40),
            ]
        );
        assert_eq!(header.num_required_signatures, 4);
        assert_eq!(header.num_readonly_signed_accounts, 2);
        assert_eq!(header.num_readonly_unsigned_accounts, 2);
    }

    #[test]
    fn payer_listed_readonly_is_still_writable_signer() {
        let payer = key(7);
        let ixs = [Instruction::new(
            key(8),
            vec![AccountMeta::new_readonly(payer, false)],
            vec![],
        )];
        let (header, accounts) = CompiledKeys::compile(&ixs, &payer)
            .try_into_message_components()
            .unwrap();
        assert_eq!(accounts[0], payer);
        assert_eq!(header.num_required_signatures, 1);
        assert_eq!(header.num_readonly_signed_accounts, 0);
    }

    #[test]
    fn too_many_keys() {
        let payer = Pubkey::new([0xffu8; 32]);
        let accounts = (0..300u32)
            .map(|i| {
                let mut bytes = [0u8; 32];
                bytes[..4].copy_from_slice(&i.to_le_bytes());
                AccountMeta::new_readonly(Pubkey::new(bytes), false)
            })
            .collect();
        let ixs = [Instruction::new(payer, accounts, vec![])];
        let err = CompiledKeys::compile(&ixs, &payer)
            .try_into_message_components()
            .unwrap_err();
        assert!(matches!(err, TxError::TooManyAccountKeys(_)));
    }

    #[test]
    fn all_signers_overflow_header() {
        // 256 distinct signers fit the key limit but not the u8 signer count.
        let payer = Pubkey::new([0xffu8; 32]);
        let accounts = (0..255u32)
            .map(|i| {
                let mut bytes = [0u8; 32];
                bytes[..4].copy_from_slice(&i.to_le_bytes());
                AccountMeta::new(Pubkey::new(bytes), true)
            })
            .collect();
        let ixs = [Instruction::new(payer, accounts, vec![])];
        let err = CompiledKeys::compile(&ixs, &payer)
            .try_into_message_components()
            .unwrap_err();
        assert_eq!(err, TxError::AccountIndexOverflow(256));
    }
}
