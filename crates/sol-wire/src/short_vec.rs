//! Short-vec length encoding.
//!
//! Every variable-length section of the wire format is prefixed by its
//! element count, written as a little-endian base-128 varint: the low 7 bits
//! of each byte carry data and the high bit (0x80) is set on every byte
//! except the last.
//!
//! - 0..0x7f          -> 1 byte
//! - 0x80..0x3fff     -> 2 bytes
//! - 0x4000..0x1fffff -> 3 bytes
//!
//! Decoding accepts values up to `u32::MAX` (5 bytes) and rejects
//! non-minimal encodings, so each length has exactly one byte form.

use crate::error::TxError;

/// Longest encoding accepted by [`decode_length`].
pub const MAX_ENCODING_LENGTH: usize = 5;

/// Encode `len` as a short-vec length prefix.
pub fn encode_length(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    encode_length_into(&mut out, len);
    out
}

/// Append the short-vec encoding of `len` to `buf`.
pub fn encode_length_into(buf: &mut Vec<u8>, len: usize) {
    let mut remaining = len;
    loop {
        let mut byte = (remaining & 0x7f) as u8;
        remaining >>= 7;
        if remaining == 0 {
            buf.push(byte);
            break;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

/// Number of bytes [`encode_length`] produces for `len`.
pub fn encoded_len(len: usize) -> usize {
    let bits = usize::BITS - len.leading_zeros();
    (bits as usize).div_ceil(7).max(1)
}

/// Decode a short-vec length from the front of `data`.
///
/// Returns `(value, bytes_consumed)`.
pub fn decode_length(data: &[u8]) -> Result<(usize, usize), TxError> {
    let mut value: u64 = 0;

    for (position, &byte) in data.iter().enumerate() {
        if position == MAX_ENCODING_LENGTH {
            return Err(TxError::MalformedVarint("encoding longer than 5 bytes"));
        }

        value |= u64::from(byte & 0x7f) << (7 * position);

        if byte & 0x80 == 0 {
            if byte == 0 && position > 0 {
                return Err(TxError::MalformedVarint("non-minimal encoding"));
            }
            if value > u64::from(u32::MAX) {
                return Err(TxError::MalformedVarint("value overflows u32"));
            }
            return Ok((value as usize, position + 1));
        }
    }

    Err(TxError::MalformedVarint(
        "data exhausted before terminator byte",
    ))
}
