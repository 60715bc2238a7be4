use bytes::Bytes;
use ethereum_types::{Address, Bloom, H160, H64, H256, U256};

use super::{
    constants::{RLP_EMPTY_LIST, RLP_NULL},
    error::RLPDecodeError,
};

/// Trait for decoding RLP encoded slices of data.
///
/// Implementors provide [`RLPDecode::decode_unfinished`], which decodes one
/// item and returns it together with the remaining bytes; consumers usually
/// call [`RLPDecode::decode`], which additionally rejects trailing input.
pub trait RLPDecode: Sized {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError>;

    fn decode(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        let (decoded, remaining) = Self::decode_unfinished(rlp)?;
        if !remaining.is_empty() {
            return Err(RLPDecodeError::InvalidLength);
        }
        Ok(decoded)
    }
}

/// Splits the first RLP item off `buf`, returning `(is_list, payload, rest)`.
pub fn decode_rlp_item(buf: &[u8]) -> Result<(bool, &[u8], &[u8]), RLPDecodeError> {
    let first = *buf.first().ok_or(RLPDecodeError::InvalidLength)?;
    match first {
        0x00..=0x7f => Ok((false, &buf[..1], &buf[1..])),
        0x80..=0xb7 => {
            let len = (first - RLP_NULL) as usize;
            let payload = buf.get(1..1 + len).ok_or(RLPDecodeError::InvalidLength)?;
            // A single byte below 0x80 must encode as itself
            if len == 1 && payload[0] < RLP_NULL {
                return Err(RLPDecodeError::MalformedData);
            }
            Ok((false, payload, &buf[1 + len..]))
        }
        0xb8..=0xbf => {
            let (len, offset) = decode_long_length(buf, first - 0xb7)?;
            if len < 56 {
                return Err(RLPDecodeError::MalformedData);
            }
            let payload = buf
                .get(offset..offset + len)
                .ok_or(RLPDecodeError::InvalidLength)?;
            Ok((false, payload, &buf[offset + len..]))
        }
        0xc0..=0xf7 => {
            let len = (first - RLP_EMPTY_LIST) as usize;
            let payload = buf.get(1..1 + len).ok_or(RLPDecodeError::InvalidLength)?;
            Ok((true, payload, &buf[1 + len..]))
        }
        0xf8..=0xff => {
            let (len, offset) = decode_long_length(buf, first - 0xf7)?;
            if len < 56 {
                return Err(RLPDecodeError::MalformedData);
            }
            let payload = buf
                .get(offset..offset + len)
                .ok_or(RLPDecodeError::InvalidLength)?;
            Ok((true, payload, &buf[offset + len..]))
        }
    }
}

// Reads a big-endian length of `len_len` bytes placed right after the prefix.
fn decode_long_length(buf: &[u8], len_len: u8) -> Result<(usize, usize), RLPDecodeError> {
    let len_len = len_len as usize;
    let len_bytes = buf.get(1..1 + len_len).ok_or(RLPDecodeError::InvalidLength)?;
    if len_bytes.first() == Some(&0) {
        return Err(RLPDecodeError::MalformedData);
    }
    if len_len > std::mem::size_of::<usize>() {
        return Err(RLPDecodeError::InvalidLength);
    }
    let mut len = 0usize;
    for byte in len_bytes {
        len = (len << 8) | *byte as usize;
    }
    Ok((len, 1 + len_len))
}

/// Decodes the first item as a byte string, erroring on lists.
pub fn decode_bytes(buf: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    match decode_rlp_item(buf)? {
        (false, payload, rest) => Ok((payload, rest)),
        (true, _, _) => Err(RLPDecodeError::UnexpectedList),
    }
}

/// Returns the first item *including* its prefix, plus the remaining bytes.
pub fn get_item_with_prefix(buf: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let (_, payload, rest) = decode_rlp_item(buf)?;
    let item_len = buf.len() - rest.len();
    debug_assert!(payload.len() <= item_len);
    Ok((&buf[..item_len], rest))
}

// Left-pads a big-endian integer into a fixed-size array, rejecting
// non-canonical encodings (leading zeros) and overlong input.
pub(crate) fn static_left_pad<const N: usize>(bytes: &[u8]) -> Result<[u8; N], RLPDecodeError> {
    let mut padded = [0u8; N];
    if bytes.is_empty() {
        return Ok(padded);
    }
    if bytes[0] == 0 {
        return Err(RLPDecodeError::MalformedData);
    }
    if bytes.len() > N {
        return Err(RLPDecodeError::InvalidLength);
    }
    padded[N - bytes.len()..].copy_from_slice(bytes);
    Ok(padded)
}

impl RLPDecode for bool {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let first = *buf.first().ok_or(RLPDecodeError::InvalidLength)?;
        let value = match first {
            RLP_NULL => false,
            0x01 => true,
            other => return Err(RLPDecodeError::MalformedBoolean(other)),
        };
        Ok((value, &buf[1..]))
    }
}

macro_rules! impl_rlp_decode_uint {
    ($($t:ty),*) => {
        $(impl RLPDecode for $t {
            fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
                let (bytes, rest) = decode_bytes(rlp)?;
                let padded = static_left_pad(bytes)?;
                Ok((<$t>::from_be_bytes(padded), rest))
            }
        })*
    };
}

impl_rlp_decode_uint!(u8, u16, u32, u64, usize, u128);

impl RLPDecode for U256 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest) = decode_bytes(rlp)?;
        let padded: [u8; 32] = static_left_pad(bytes)?;
        Ok((U256::from_big_endian(&padded), rest))
    }
}

impl<const N: usize> RLPDecode for [u8; N] {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest) = decode_bytes(rlp)?;
        let value = bytes.try_into().map_err(|_| RLPDecodeError::InvalidLength)?;
        Ok((value, rest))
    }
}

impl RLPDecode for Bytes {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest) = decode_bytes(rlp)?;
        Ok((Bytes::copy_from_slice(bytes), rest))
    }
}

impl RLPDecode for String {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest) = decode_bytes(rlp)?;
        let value = String::from_utf8(bytes.to_vec()).map_err(|_| RLPDecodeError::MalformedData)?;
        Ok((value, rest))
    }
}

impl RLPDecode for Address {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (value, rest) = RLPDecode::decode_unfinished(rlp)?;
        Ok((H160(value), rest))
    }
}

impl RLPDecode for H256 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (value, rest) = RLPDecode::decode_unfinished(rlp)?;
        Ok((H256(value), rest))
    }
}

impl RLPDecode for H64 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (value, rest) = RLPDecode::decode_unfinished(rlp)?;
        Ok((H64(value), rest))
    }
}

impl RLPDecode for Bloom {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (value, rest) = RLPDecode::decode_unfinished(rlp)?;
        Ok((Bloom(value), rest))
    }
}

impl<T: RLPDecode> RLPDecode for Vec<T> {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, mut payload, rest) = decode_rlp_item(rlp)?;
        if !is_list {
            return Err(RLPDecodeError::UnexpectedString);
        }
        let mut items = Vec::new();
        while !payload.is_empty() {
            let (item, remaining) = T::decode_unfinished(payload)?;
            items.push(item);
            payload = remaining;
        }
        Ok((items, rest))
    }
}

impl<T: RLPDecode, U: RLPDecode> RLPDecode for (T, U) {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, rest) = decode_rlp_item(rlp)?;
        if !is_list {
            return Err(RLPDecodeError::UnexpectedString);
        }
        let (first, payload) = T::decode_unfinished(payload)?;
        let (second, payload) = U::decode_unfinished(payload)?;
        if !payload.is_empty() {
            return Err(RLPDecodeError::MalformedData);
        }
        Ok(((first, second), rest))
    }
}

impl<T: RLPDecode, U: RLPDecode, V: RLPDecode> RLPDecode for (T, U, V) {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, rest) = decode_rlp_item(rlp)?;
        if !is_list {
            return Err(RLPDecodeError::UnexpectedString);
        }
        let (first, payload) = T::decode_unfinished(payload)?;
        let (second, payload) = U::decode_unfinished(payload)?;
        let (third, payload) = V::decode_unfinished(payload)?;
        if !payload.is_empty() {
            return Err(RLPDecodeError::MalformedData);
        }
        Ok(((first, second, third), rest))
    }
}
