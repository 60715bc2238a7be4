pub mod constants;
pub mod difficulty;
pub mod serde_utils;
pub mod types;
pub mod validation;

pub use bytes::Bytes;
pub use ethereum_types::{Address, Bloom, BloomInput, H64, H160, H256, U256, U512};

use sha3::{Digest, Keccak256};

/// keccak-256 of arbitrary data as an `H256`.
pub fn keccak(data: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}
