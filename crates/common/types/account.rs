use std::collections::HashMap;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

use ember_rlp::{
    decode::RLPDecode,
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};
use ember_trie::EMPTY_TRIE_HASH;

use crate::{constants::EMPTY_KECCAK_HASH, keccak};

/// The part of an account that lives outside its storage: what the world
/// state cache tracks per address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub nonce: u64,
    pub balance: U256,
    pub code_hash: H256,
}

impl Default for AccountInfo {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::zero(),
            code_hash: EMPTY_KECCAK_HASH,
        }
    }
}

impl AccountInfo {
    pub fn has_code(&self) -> bool {
        self.code_hash != EMPTY_KECCAK_HASH
    }

    /// Empty as defined by EIP-161: no code, zero nonce, zero balance.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && !self.has_code()
    }
}

/// The account record as committed to the state trie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub nonce: u64,
    pub balance: U256,
    pub storage_root: H256,
    pub code_hash: H256,
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::zero(),
            storage_root: *EMPTY_TRIE_HASH,
            code_hash: EMPTY_KECCAK_HASH,
        }
    }
}

impl AccountState {
    pub fn into_info(self) -> AccountInfo {
        AccountInfo {
            nonce: self.nonce,
            balance: self.balance,
            code_hash: self.code_hash,
        }
    }
}

impl RLPEncode for AccountState {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_field(&self.nonce)
            .encode_field(&self.balance)
            .encode_field(&self.storage_root)
            .encode_field(&self.code_hash)
            .finish();
    }
}

impl RLPDecode for AccountState {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (balance, decoder) = decoder.decode_field("balance")?;
        let (storage_root, decoder) = decoder.decode_field("storage_root")?;
        let (code_hash, decoder) = decoder.decode_field("code_hash")?;
        let state = AccountState {
            nonce,
            balance,
            storage_root,
            code_hash,
        };
        Ok((state, decoder.finish()?))
    }
}

/// keccak-256 of account code, matching `AccountState::code_hash`.
pub fn code_hash(code: &Bytes) -> H256 {
    keccak(code)
}

/// Trie key of an account: keccak of its address.
pub fn hash_address(address: &Address) -> Vec<u8> {
    keccak(address.as_bytes()).as_bytes().to_vec()
}

/// Trie key of a storage slot: keccak of the slot key.
pub fn hash_key(key: &H256) -> Vec<u8> {
    keccak(key.as_bytes()).as_bytes().to_vec()
}

/// A per-account state delta produced by executing transactions, consumed by
/// the store when materializing a new state root.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub address: Address,
    /// The account was destroyed and must be removed from the trie.
    pub removed: bool,
    pub info: Option<AccountInfo>,
    pub code: Option<Bytes>,
    /// Written storage slots; zero values mean slot removal.
    pub added_storage: HashMap<H256, U256>,
}

impl AccountUpdate {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    pub fn removed(address: Address) -> Self {
        Self {
            address,
            removed: true,
            ..Default::default()
        }
    }
}
