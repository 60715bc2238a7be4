//! The four fixed-address precompiled contracts. Calls to them bypass the
//! interpreter entirely: either the forwarded gas covers the cost and the
//! output is produced natively, or everything forwarded is consumed.

use bytes::Bytes;
use ethereum_types::{Address, U256};
use ripemd::Ripemd160;
use secp256k1::{
    Message, SECP256K1,
    ecdsa::{RecoverableSignature, RecoveryId},
};
use sha2::{Digest as Sha2Digest, Sha256};

use ember_common::keccak;

use crate::{constants::LAST_PRECOMPILE_ADDRESS, errors::VMError, memory::word_count};

const ECRECOVER_COST: u64 = 3000;
const SHA256_BASE_COST: u64 = 60;
const SHA256_WORD_COST: u64 = 12;
const RIPEMD160_BASE_COST: u64 = 600;
const RIPEMD160_WORD_COST: u64 = 120;
const IDENTITY_BASE_COST: u64 = 15;
const IDENTITY_WORD_COST: u64 = 3;

pub fn is_precompile(address: &Address) -> bool {
    let first_twelve_zero = address.as_bytes()[..12].iter().all(|byte| *byte == 0);
    if !first_twelve_zero {
        return false;
    }
    let low = address.to_low_u64_be();
    (1..=LAST_PRECOMPILE_ADDRESS).contains(&low)
}

/// Runs the precompile at `address` with all of `gas_limit` available.
/// Returns the output and the gas actually charged; an unpayable cost
/// consumes the whole limit via `OutOfGas`.
pub fn execute_precompile(
    address: Address,
    calldata: &Bytes,
    gas_limit: u64,
) -> Result<(Bytes, u64), VMError> {
    let words = word_count(calldata.len() as u64);
    let cost = match address.to_low_u64_be() {
        0x01 => ECRECOVER_COST,
        0x02 => SHA256_BASE_COST + SHA256_WORD_COST * words,
        0x03 => RIPEMD160_BASE_COST + RIPEMD160_WORD_COST * words,
        0x04 => IDENTITY_BASE_COST + IDENTITY_WORD_COST * words,
        _ => return Err(VMError::PrecompileError),
    };
    if cost > gas_limit {
        return Err(VMError::OutOfGas);
    }
    let output = match address.to_low_u64_be() {
        0x01 => ecrecover(calldata),
        0x02 => sha256(calldata),
        0x03 => ripemd160(calldata),
        0x04 => identity(calldata),
        _ => return Err(VMError::PrecompileError),
    };
    Ok((output, cost))
}

// Input is 128 bytes: hash | v | r | s, each 32 bytes, zero padded. Any
// malformed signature yields empty output, not an error.
fn ecrecover(calldata: &Bytes) -> Bytes {
    let mut input = [0u8; 128];
    let len = calldata.len().min(128);
    input[..len].copy_from_slice(&calldata[..len]);

    let v = U256::from_big_endian(&input[32..64]);
    if v != U256::from(27) && v != U256::from(28) {
        return Bytes::new();
    }
    let Ok(recovery_id) = RecoveryId::from_i32(v.as_u64() as i32 - 27) else {
        return Bytes::new();
    };
    let mut compact = [0u8; 64];
    compact.copy_from_slice(&input[64..128]);
    let Ok(signature) = RecoverableSignature::from_compact(&compact, recovery_id) else {
        return Bytes::new();
    };
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&input[..32]);
    let message = Message::from_digest(hash);
    let Ok(public_key) = SECP256K1.recover_ecdsa(&message, &signature) else {
        return Bytes::new();
    };
    let address_hash = keccak(&public_key.serialize_uncompressed()[1..]);
    let mut output = [0u8; 32];
    output[12..].copy_from_slice(&address_hash.0[12..]);
    Bytes::copy_from_slice(&output)
}

fn sha256(calldata: &Bytes) -> Bytes {
    Bytes::copy_from_slice(&Sha256::digest(calldata))
}

fn ripemd160(calldata: &Bytes) -> Bytes {
    let hash = Ripemd160::digest(calldata);
    let mut output = [0u8; 32];
    output[12..].copy_from_slice(&hash);
    Bytes::copy_from_slice(&output)
}

fn identity(calldata: &Bytes) -> Bytes {
    calldata.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn identity_echoes_input() {
        let data = Bytes::from_static(b"hello world");
        let (output, cost) = execute_precompile(Address::from_low_u64_be(4), &data, 100_000).unwrap();
        assert_eq!(output, data);
        assert_eq!(cost, 15 + 3 * 1);
    }

    #[test]
    fn sha256_known_digest() {
        let (output, cost) =
            execute_precompile(Address::from_low_u64_be(2), &Bytes::from_static(b"abc"), 100_000)
                .unwrap();
        assert_eq!(
            output.as_ref(),
            hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert_eq!(cost, 60 + 12);
    }

    #[test]
    fn ripemd160_known_digest_left_padded() {
        let (output, _) =
            execute_precompile(Address::from_low_u64_be(3), &Bytes::from_static(b"abc"), 100_000)
                .unwrap();
        assert_eq!(&output[..12], &[0u8; 12]);
        assert_eq!(
            &output[12..],
            hex!("8eb208f7e05d987a9b044a8e98c6b087f15a0bfc")
        );
    }

    #[test]
    fn ecrecover_all_zero_input_yields_empty_output() {
        let (output, cost) =
            execute_precompile(Address::from_low_u64_be(1), &Bytes::from(vec![0u8; 128]), 100_000)
                .unwrap();
        assert!(output.is_empty());
        assert_eq!(cost, 3000);
    }

    #[test]
    fn insufficient_gas_is_out_of_gas() {
        let result = execute_precompile(Address::from_low_u64_be(2), &Bytes::new(), 10);
        assert_eq!(result, Err(VMError::OutOfGas));
    }

    #[test]
    fn precompile_address_range() {
        assert!(is_precompile(&Address::from_low_u64_be(1)));
        assert!(is_precompile(&Address::from_low_u64_be(4)));
        assert!(!is_precompile(&Address::from_low_u64_be(0)));
        assert!(!is_precompile(&Address::from_low_u64_be(5)));
    }
}
