//! Binary wire format for legacy messages and transactions.
//!
//! ```text
//! Transaction:
//!   num_signatures          short-vec
//!   signatures              64 bytes * num_signatures (zeroed when unsigned)
//!   message:
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          short-vec
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      short-vec
//!     instructions[]        (see below)
//!
//! Instruction:
//!   program_id_index        u8
//!   num_accounts            short-vec
//!   account_indices         u8 * num_accounts
//!   data_len                short-vec
//!   data                    u8 * data_len
//! ```
//!
//! A whole transaction must fit in one packet: 1280 (IPv6 minimum MTU)
//! minus 40 (IPv6 header) minus 8 (fragment header) = 1232 bytes.

use std::collections::HashSet;

use crate::compiled_keys::MAX_STATIC_ACCOUNT_KEYS;
use crate::error::TxError;
use crate::hash::{Hash, HASH_BYTES};
use crate::instruction::CompiledInstruction;
use crate::message::{Message, MessageHeader};
use crate::pubkey::{Pubkey, PUBKEY_BYTES};
use crate::short_vec;
use crate::signature::{Signature, SIGNATURE_BYTES};

/// Maximum size of a serialized transaction.
pub const PACKET_DATA_SIZE: usize = 1280 - 40 - 8;

/// Maximum number of signatures a transaction can carry (the header count is a u8).
pub const MAX_SIGNATURES: usize = u8::MAX as usize;

/// A decoded transaction: its signature slots and the message they sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireTransaction {
    /// `None` for slots that were all zeroes on the wire.
    pub signatures: Vec<Option<Signature>>,
    pub message: Message,
}

/// Serialize `message` into the bytes that get signed.
pub fn serialize_message(message: &Message) -> Result<Vec<u8>, TxError> {
    check_message(message)?;

    let mut buf = Vec::with_capacity(message_size(message));

    buf.push(message.header.num_required_signatures);
    buf.push(message.header.num_readonly_signed_accounts);
    buf.push(message.header.num_readonly_unsigned_accounts);

    short_vec::encode_length_into(&mut buf, message.account_keys.len());
    for key in &message.account_keys {
        buf.extend_from_slice(key.as_bytes());
    }

    buf.extend_from_slice(message.recent_blockhash.as_bytes());

    short_vec::encode_length_into(&mut buf, message.instructions.len());
    for ix in &message.instructions {
        buf.push(ix.program_id_index);
        short_vec::encode_length_into(&mut buf, ix.accounts.len());
        buf.extend_from_slice(&ix.accounts);
        short_vec::encode_length_into(&mut buf, ix.data.len());
        buf.extend_from_slice(&ix.data);
    }

    if buf.len() > PACKET_DATA_SIZE {
        return Err(TxError::TransactionTooLarge {
            size: buf.len(),
            max: PACKET_DATA_SIZE,
        });
    }

    log::trace!("serialized message: {} bytes", buf.len());
    Ok(buf)
}

/// Exact serialized size of `message`, without encoding it.
pub fn message_size(message: &Message) -> usize {
    let instructions: usize = message
        .instructions
        .iter()
        .map(|ix| {
            1 + short_vec::encoded_len(ix.accounts.len())
                + ix.accounts.len()
                + short_vec::encoded_len(ix.data.len())
                + ix.data.len()
        })
        .sum();

    3 + short_vec::encoded_len(message.account_keys.len())
        + message.account_keys.len() * PUBKEY_BYTES
        + HASH_BYTES
        + short_vec::encoded_len(message.instructions.len())
        + instructions
}

/// Assemble the wire transaction from its signature slots and the already
/// serialized message.
pub fn serialize_transaction(
    signatures: &[Option<Signature>],
    message_bytes: &[u8],
) -> Result<Vec<u8>, TxError> {
    if signatures.len() > MAX_SIGNATURES {
        return Err(TxError::TooManySignatures(signatures.len()));
    }

    let size = short_vec::encoded_len(signatures.len())
        + signatures.len() * SIGNATURE_BYTES
        + message_bytes.len();
    if size > PACKET_DATA_SIZE {
        return Err(TxError::TransactionTooLarge {
            size,
            max: PACKET_DATA_SIZE,
        });
    }

    let mut wire = Vec::with_capacity(size);
    short_vec::encode_length_into(&mut wire, signatures.len());
    for signature in signatures {
        let bytes = signature.map(Signature::to_bytes).unwrap_or([0u8; SIGNATURE_BYTES]);
        wire.extend_from_slice(&bytes);
    }
    wire.extend_from_slice(message_bytes);

    log::debug!(
        "serialized transaction: {} signatures, {} bytes",
        signatures.len(),
        wire.len()
    );
    Ok(wire)
}

/// Parse a serialized message. The whole buffer must be consumed.
pub fn deserialize_message(bytes: &[u8]) -> Result<Message, TxError> {
    let mut reader = Reader::new(bytes);
    let message = read_message(&mut reader)?;
    reader.finish()?;
    Ok(message)
}

/// Parse a serialized transaction. The whole buffer must be consumed.
pub fn deserialize_transaction(bytes: &[u8]) -> Result<WireTransaction, TxError> {
    if bytes.len() > PACKET_DATA_SIZE {
        return Err(TxError::TransactionTooLarge {
            size: bytes.len(),
            max: PACKET_DATA_SIZE,
        });
    }

    let mut reader = Reader::new(bytes);
    let count = reader.read_len()?;
    if count > MAX_SIGNATURES {
        return Err(TxError::TooManySignatures(count));
    }
    reader.ensure(count * SIGNATURE_BYTES)?;

    let mut signatures = Vec::with_capacity(count);
    for _ in 0..count {
        let signature = Signature::new(reader.read_array()?);
        signatures.push((!signature.is_zeroed()).then_some(signature));
    }

    let message = read_message(&mut reader)?;
    reader.finish()?;

    if signatures.len() != usize::from(message.header.num_required_signatures) {
        return Err(TxError::InvalidHeader(
            "signature count does not match required signatures",
        ));
    }

    Ok(WireTransaction {
        signatures,
        message,
    })
}

/// Split a serialized transaction into its signatures and raw message bytes
/// without decoding the message.
pub fn split_transaction(bytes: &[u8]) -> Result<(Vec<Signature>, &[u8]), TxError> {
    let mut reader = Reader::new(bytes);
    let count = reader.read_len()?;
    reader.ensure(count.saturating_mul(SIGNATURE_BYTES))?;
    let signatures = (0..count)
        .map(|_| reader.read_array().map(Signature::new))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((signatures, reader.rest()))
}

fn read_message(reader: &mut Reader<'_>) -> Result<Message, TxError> {
    let header = MessageHeader {
        num_required_signatures: reader.read_u8()?,
        num_readonly_signed_accounts: reader.read_u8()?,
        num_readonly_unsigned_accounts: reader.read_u8()?,
    };

    let num_keys = reader.read_len()?;
    if num_keys > MAX_STATIC_ACCOUNT_KEYS {
        return Err(TxError::TooManyAccountKeys(num_keys));
    }
    reader.ensure(num_keys * PUBKEY_BYTES)?;
    let account_keys = (0..num_keys)
        .map(|_| reader.read_array().map(Pubkey::new))
        .collect::<Result<Vec<_>, _>>()?;

    let recent_blockhash = Hash::new(reader.read_array()?);

    let num_instructions = reader.read_len()?;
    // Each instruction takes at least three bytes.
    reader.ensure(num_instructions.saturating_mul(3))?;
    let mut instructions = Vec::with_capacity(num_instructions);
    for _ in 0..num_instructions {
        let program_id_index = reader.read_u8()?;
        let num_accounts = reader.read_len()?;
        let accounts = reader.take(num_accounts)?.to_vec();
        let data_len = reader.read_len()?;
        let data = reader.take(data_len)?.to_vec();
        instructions.push(CompiledInstruction {
            program_id_index,
            accounts,
            data,
        });
    }

    let message = Message {
        header,
        account_keys,
        recent_blockhash,
        instructions,
    };
    check_message(&message)?;
    Ok(message)
}

/// Structural checks shared by the encoder and the decoder.
fn check_message(message: &Message) -> Result<(), TxError> {
    let num_keys = message.account_keys.len();
    if num_keys > MAX_STATIC_ACCOUNT_KEYS {
        return Err(TxError::TooManyAccountKeys(num_keys));
    }

    let header = &message.header;
    let num_signed = usize::from(header.num_required_signatures);
    if num_signed == 0 {
        return Err(TxError::InvalidHeader("at least one signature is required"));
    }
    if num_signed > num_keys {
        return Err(TxError::InvalidHeader(
            "more required signatures than account keys",
        ));
    }
    if header.num_readonly_signed_accounts >= header.num_required_signatures {
        return Err(TxError::InvalidHeader(
            "fee payer must be a writable signer",
        ));
    }
    if usize::from(header.num_readonly_unsigned_accounts) > num_keys - num_signed {
        return Err(TxError::InvalidHeader(
            "more read-only unsigned accounts than unsigned keys",
        ));
    }

    let mut seen = HashSet::with_capacity(num_keys);
    if !message.account_keys.iter().all(|key| seen.insert(key)) {
        return Err(TxError::InvalidHeader("duplicate account key"));
    }

    let check_index = |index: u8| -> Result<(), TxError> {
        if usize::from(index) >= num_keys {
            return Err(TxError::AccountIndexOutOfRange {
                index: usize::from(index),
                len: num_keys,
            });
        }
        Ok(())
    };
    for ix in &message.instructions {
        check_index(ix.program_id_index)?;
        for &index in &ix.accounts {
            check_index(index)?;
        }
    }

    Ok(())
}

/// Bounds-checked cursor over a byte buffer.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn ensure(&self, needed: usize) -> Result<(), TxError> {
        if needed > self.remaining() {
            return Err(TxError::UnexpectedEof {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], TxError> {
        self.ensure(len)?;
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, TxError> {
        Ok(self.take(1)?[0])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], TxError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_len(&mut self) -> Result<usize, TxError> {
        let (len, consumed) = short_vec::decode_length(&self.data[self.pos..])?;
        self.pos += consumed;
        Ok(len)
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn finish(&self) -> Result<(), TxError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(TxError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{AccountMeta, Instruction};
    use proptest::prelude::*;

    fn key(n: u8) -> Pubkey {
        Pubkey::new([n; 32])
    }

    fn transfer_message() -> Message {
        let from = key(1);
        let to = key(2);
        let mut data = Vec::with_capacity(12);
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&1_000_000u64.to_le_bytes());
        let ix = Instruction::new(
            Pubkey::default(),
            vec![AccountMeta::new(from, true), AccountMeta::new(to, false)],
            data,
        );
        Message::compile(&[ix], &from, Hash::new([0xcc; 32])).unwrap()
    }

    #[test]
    fn message_starts_with_header() {
        let msg = transfer_message();
        let bytes = serialize_message(&msg).unwrap();
        assert_eq!(&bytes[..3], &[1, 0, 1]);
        assert_eq!(bytes[3], 3); // three account keys
    }

    #[test]
    fn message_contains_blockhash_after_keys() {
        let msg = transfer_message();
        let bytes = serialize_message(&msg).unwrap();
        let offset = 3 + 1 + 32 * msg.account_keys.len();
        assert_eq!(&bytes[offset..offset + 32], &[0xcc; 32]);
    }

    #[test]
    fn message_size_matches_encoding() {
        let msg = transfer_message();
        assert_eq!(message_size(&msg), serialize_message(&msg).unwrap().len());
    }

    #[test]
    fn transfer_message_layout_is_exact() {
        let msg = transfer_message();
        let bytes = serialize_message(&msg).unwrap();

        let mut expected = vec![1, 0, 1, 3];
        expected.extend_from_slice(&[1u8; 32]);
        expected.extend_from_slice(&[2u8; 32]);
        expected.extend_from_slice(&[0u8; 32]);
        expected.extend_from_slice(&[0xcc; 32]);
        expected.extend_from_slice(&[1, 2, 2, 0, 1, 12]);
        expected.extend_from_slice(&[2, 0, 0, 0]);
        expected.extend_from_slice(&1_000_000u64.to_le_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn message_roundtrip() {
        let msg = transfer_message();
        let bytes = serialize_message(&msg).unwrap();
        assert_eq!(deserialize_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn transaction_roundtrip_with_absent_signature() {
        let msg = transfer_message();
        let message_bytes = serialize_message(&msg).unwrap();
        let wire = serialize_transaction(&[None], &message_bytes).unwrap();
        assert_eq!(wire[0], 1);
        assert!(wire[1..65].iter().all(|b| *b == 0));

        let parsed = deserialize_transaction(&wire).unwrap();
        assert_eq!(parsed.signatures, vec![None]);
        assert_eq!(parsed.message, msg);
    }

    #[test]
    fn oversized_transaction_is_refused() {
        let mut msg = transfer_message();
        msg.instructions[0].data = vec![0u8; 1050];
        let message_bytes = serialize_message(&msg).unwrap();
        let err = serialize_transaction(&[None], &message_bytes).unwrap_err();
        assert!(matches!(
            err,
            TxError::TransactionTooLarge { max: PACKET_DATA_SIZE, .. }
        ));
    }

    #[test]
    fn exact_packet_size_is_accepted() {
        let mut msg = transfer_message();
        msg.instructions[0].data = Vec::new();
        let base = 1 + SIGNATURE_BYTES + message_size(&msg);
        // Data length prefix grows to two bytes past 127.
        let data_len = PACKET_DATA_SIZE - base - 1;
        msg.instructions[0].data = vec![7u8; data_len];
        let message_bytes = serialize_message(&msg).unwrap();
        let wire = serialize_transaction(&[None], &message_bytes).unwrap();
        assert_eq!(wire.len(), PACKET_DATA_SIZE);

        msg.instructions[0].data.push(7);
        let message_bytes = serialize_message(&msg).unwrap();
        assert!(serialize_transaction(&[None], &message_bytes).is_err());
    }

    #[test]
    fn oversized_message_is_refused() {
        let mut msg = transfer_message();
        msg.instructions[0].data = vec![0u8; 1300];
        assert!(matches!(
            serialize_message(&msg),
            Err(TxError::TransactionTooLarge { .. })
        ));
    }

    #[test]
    fn truncated_buffers_are_rejected() {
        let msg = transfer_message();
        let bytes = serialize_message(&msg).unwrap();
        for cut in 0..bytes.len() {
            assert!(deserialize_message(&bytes[..cut]).is_err(), "cut at {cut}");
        }
    }

    #[test]
    fn overrunning_key_count_is_rejected() {
        // Header, then a claim of 5 keys with only one key present.
        let mut bytes = vec![1, 0, 0, 5];
        bytes.extend_from_slice(&[1u8; 32]);
        assert!(matches!(
            deserialize_message(&bytes),
            Err(TxError::UnexpectedEof { needed: 160, .. })
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let msg = transfer_message();
        let mut bytes = serialize_message(&msg).unwrap();
        bytes.push(0);
        assert_eq!(deserialize_message(&bytes), Err(TxError::TrailingBytes(1)));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut msg = transfer_message();
        msg.instructions[0].accounts.push(9);
        assert!(matches!(
            serialize_message(&msg),
            Err(TxError::AccountIndexOutOfRange { index: 9, len: 3 })
        ));
    }

    #[test]
    fn invalid_header_is_rejected() {
        let mut msg = transfer_message();
        msg.header.num_readonly_signed_accounts = 1;
        assert!(matches!(
            serialize_message(&msg),
            Err(TxError::InvalidHeader(_))
        ));

        let mut msg = transfer_message();
        msg.header.num_required_signatures = 0;
        assert!(serialize_message(&msg).is_err());
    }

    #[test]
    fn duplicate_account_keys_are_rejected() {
        let signer = key(1);
        let program = key(7);
        let msg = Message {
            header: MessageHeader {
                num_required_signatures: 2,
                num_readonly_signed_accounts: 0,
                num_readonly_unsigned_accounts: 1,
            },
            account_keys: vec![signer, signer, program],
            recent_blockhash: Hash::new([0xcc; 32]),
            instructions: vec![CompiledInstruction {
                program_id_index: 2,
                accounts: vec![0, 1],
                data: vec![],
            }],
        };
        assert_eq!(
            serialize_message(&msg),
            Err(TxError::InvalidHeader("duplicate account key"))
        );

        // Same message written by hand, as a peer could send it.
        let mut bytes = vec![2, 0, 1, 3];
        bytes.extend_from_slice(signer.as_bytes());
        bytes.extend_from_slice(signer.as_bytes());
        bytes.extend_from_slice(program.as_bytes());
        bytes.extend_from_slice(&[0xcc; 32]);
        bytes.extend_from_slice(&[1, 2, 2, 0, 1, 0]);
        assert_eq!(
            deserialize_message(&bytes),
            Err(TxError::InvalidHeader("duplicate account key"))
        );

        let wire = serialize_transaction(&[None, None], &bytes).unwrap();
        assert_eq!(
            deserialize_transaction(&wire),
            Err(TxError::InvalidHeader("duplicate account key"))
        );
    }

    #[test]
    fn signature_count_must_match_header() {
        let msg = transfer_message();
        let message_bytes = serialize_message(&msg).unwrap();
        let wire = serialize_transaction(&[None, None], &message_bytes).unwrap();
        assert!(matches!(
            deserialize_transaction(&wire),
            Err(TxError::InvalidHeader(_))
        ));
    }

    #[test]
    fn split_returns_raw_message() {
        let msg = transfer_message();
        let message_bytes = serialize_message(&msg).unwrap();
        let sig = Signature::new([5u8; 64]);
        let wire = serialize_transaction(&[Some(sig)], &message_bytes).unwrap();
        let (signatures, rest) = split_transaction(&wire).unwrap();
        assert_eq!(signatures, vec![sig]);
        assert_eq!(rest, &message_bytes[..]);
    }

    proptest! {
        #[test]
        fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..1300)) {
            let _ = deserialize_message(&bytes);
            let _ = deserialize_transaction(&bytes);
            let _ = split_transaction(&bytes);
        }

        #[test]
        fn compiled_messages_roundtrip(
            num_accounts in 0usize..20,
            signer_mask in any::<u32>(),
            writable_mask in any::<u32>(),
            data in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let payer = Pubkey::new([0xeeu8; 32]);
            let accounts = (0..num_accounts)
                .map(|i| AccountMeta {
                    pubkey: Pubkey::new([i as u8; 32]),
                    is_signer: signer_mask & (1 << i) != 0,
                    is_writable: writable_mask & (1 << i) != 0,
                })
                .collect();
            let ix = Instruction::new(Pubkey::new([0xddu8; 32]), accounts, data);
            let msg = Message::compile(&[ix], &payer, Hash::new([3u8; 32])).unwrap();
            let bytes = serialize_message(&msg).unwrap();
            prop_assert_eq!(bytes.len(), message_size(&msg));

            let n = msg.account_keys.len();
            let signers = usize::from(msg.header.num_required_signatures);
            prop_assert_eq!(msg.account_keys[0], payer);
            prop_assert!(signers >= 1);
            prop_assert!(usize::from(msg.header.num_readonly_signed_accounts) < signers);
            prop_assert!(usize::from(msg.header.num_readonly_unsigned_accounts) <= n - signers);
            for i in 1..n {
                let prev = msg.account_role(i - 1).unwrap();
                let cur = msg.account_role(i).unwrap();
                // Signers first; writable before read-only within each class.
                prop_assert!(prev.is_signer || !cur.is_signer);
                if prev.is_signer == cur.is_signer {
                    prop_assert!(prev.is_writable || !cur.is_writable);
                }
            }
            // Every referenced account keeps its merged role.
            for i in 0..num_accounts {
                let key = Pubkey::new([i as u8; 32]);
                let index = msg.account_keys.iter().position(|k| *k == key).unwrap();
                let role = msg.account_role(index).unwrap();
                prop_assert_eq!(role.is_signer, signer_mask & (1 << i) != 0);
                prop_assert_eq!(role.is_writable, writable_mask & (1 << i) != 0);
            }

            prop_assert_eq!(deserialize_message(&bytes).unwrap(), msg);
        }
    }
}
