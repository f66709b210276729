//! Unsigned LEB128 varints
//!
//! Little-endian base-128: the low 7 bits of each byte carry data, the high
//! bit says another byte follows. A `u64` never needs more than 10 bytes.

use crate::error::{FramingError, FramingResult, MAX_VARINT_LEN};
use bytes::BufMut;

const CONTINUATION: u8 = 0x80;
const DATA_MASK: u8 = 0x7F;

/// Number of bytes `value` occupies once encoded
#[inline]
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// Append the varint encoding of `value` to `buf`
pub fn encode_varint<B: BufMut>(mut value: u64, buf: &mut B) {
    while value >= CONTINUATION as u64 {
        buf.put_u8((value as u8 & DATA_MASK) | CONTINUATION);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Decode a varint from the head of `data`
///
/// Returns `Ok(None)` when `data` ends before the terminating byte, which is
/// the "need more bytes" signal for stream readers. Returns the value and
/// the number of bytes consumed otherwise.
pub fn decode_varint(data: &[u8]) -> FramingResult<Option<(u64, usize)>> {
    let mut value: u64 = 0;

    for (index, &byte) in data.iter().enumerate() {
        if index >= MAX_VARINT_LEN {
            return Err(FramingError::VarintTooLong {
                bytes_read: index,
                max: MAX_VARINT_LEN,
            });
        }

        let shift = 7 * index as u32;
        let bits = (byte & DATA_MASK) as u64;

        // Tenth byte sits at shift 63: only its lowest data bit fits.
        if shift == 63 && bits > 1 {
            return Err(FramingError::VarintOverflow {
                byte_index: index,
                byte,
            });
        }

        value |= bits << shift;

        if byte & CONTINUATION == 0 {
            return Ok(Some((value, index + 1)));
        }
    }

    if data.len() >= MAX_VARINT_LEN {
        return Err(FramingError::VarintTooLong {
            bytes_read: data.len(),
            max: MAX_VARINT_LEN,
        });
    }

    Ok(None)
}
