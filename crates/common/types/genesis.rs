use std::collections::BTreeMap;
use std::io::BufReader;
use std::path::Path;

use bytes::Bytes;
use ethereum_types::{Address, Bloom, H64, H256, U256};
use serde::{Deserialize, Serialize};

use ember_rlp::encode::RLPEncode;
use ember_trie::{EMPTY_TRIE_HASH, Trie};

use crate::{
    constants::DEFAULT_OMMERS_HASH,
    types::{AccountState, Block, BlockBody, BlockHeader, code_hash, hash_address, hash_key},
};

/// Hard forks the engine distinguishes, ordered by activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fork {
    Frontier,
    Homestead,
    /// EIP-150 gas repricing ("tangerine whistle").
    Tangerine,
    /// EIP-155/158/160/170 ("spurious dragon").
    SpuriousDragon,
}

/// Chain parameters shared by every block, loaded once from the genesis file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    pub chain_id: u64,
    /// Block numbers at which each fork activates (None = never).
    #[serde(default)]
    pub homestead_block: Option<u64>,
    #[serde(default)]
    pub eip150_block: Option<u64>,
    #[serde(default)]
    pub eip155_block: Option<u64>,
    #[serde(default)]
    pub eip158_block: Option<u64>,
    /// Base miner reward per block, in wei.
    #[serde(default = "default_block_reward")]
    #[serde(with = "crate::serde_utils::u256::hex_or_dec_str")]
    pub block_reward: U256,
}

fn default_block_reward() -> U256 {
    // 5 ether
    U256::from(5_000_000_000_000_000_000u64)
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            homestead_block: Some(0),
            eip150_block: Some(0),
            eip155_block: Some(0),
            eip158_block: Some(0),
            block_reward: default_block_reward(),
        }
    }
}

impl ChainConfig {
    /// Resolves the active fork for a block number.
    pub fn fork(&self, block_number: u64) -> Fork {
        if self.is_eip158_activated(block_number) {
            Fork::SpuriousDragon
        } else if self.is_eip150_activated(block_number) {
            Fork::Tangerine
        } else if self.is_homestead_activated(block_number) {
            Fork::Homestead
        } else {
            Fork::Frontier
        }
    }

    pub fn is_homestead_activated(&self, block_number: u64) -> bool {
        self.homestead_block.is_some_and(|block| block_number >= block)
    }

    pub fn is_eip150_activated(&self, block_number: u64) -> bool {
        self.eip150_block.is_some_and(|block| block_number >= block)
    }

    pub fn is_eip155_activated(&self, block_number: u64) -> bool {
        self.eip155_block.is_some_and(|block| block_number >= block)
    }

    pub fn is_eip158_activated(&self, block_number: u64) -> bool {
        self.eip158_block.is_some_and(|block| block_number >= block)
    }
}

/// A genesis file: chain configuration, header fields of block zero and the
/// initial account allocation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Genesis {
    pub config: ChainConfig,
    pub alloc: BTreeMap<Address, GenesisAccount>,
    #[serde(default)]
    pub coinbase: Address,
    pub difficulty: U256,
    #[serde(default, with = "crate::serde_utils::bytes")]
    pub extra_data: Bytes,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub gas_limit: u64,
    #[serde(with = "crate::serde_utils::u64::hex_str")]
    pub nonce: u64,
    #[serde(default, alias = "mixHash", alias = "mixhash")]
    pub mix_hash: H256,
    #[serde(with = "crate::serde_utils::u64::hex_or_dec_str")]
    pub timestamp: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum GenesisError {
    #[error("Failed to open genesis file: {0}")]
    File(#[from] std::io::Error),
    #[error("Failed to decode genesis file: {0}")]
    Decode(#[from] serde_json::Error),
}

impl TryFrom<&Path> for Genesis {
    type Error = GenesisError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// One entry of the genesis `alloc` map.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenesisAccount {
    #[serde(default, with = "crate::serde_utils::bytes")]
    pub code: Bytes,
    #[serde(default)]
    pub storage: BTreeMap<H256, H256>,
    #[serde(with = "crate::serde_utils::u256::hex_or_dec_str")]
    pub balance: U256,
    #[serde(default, with = "crate::serde_utils::u64::hex_str_opt")]
    pub nonce: Option<u64>,
}

impl Genesis {
    pub fn get_block(&self) -> Block {
        Block::new(self.get_block_header(), BlockBody::empty())
    }

    fn get_block_header(&self) -> BlockHeader {
        BlockHeader {
            parent_hash: H256::zero(),
            ommers_hash: DEFAULT_OMMERS_HASH,
            coinbase: self.coinbase,
            state_root: self.compute_state_root(),
            transactions_root: *EMPTY_TRIE_HASH,
            receipts_root: *EMPTY_TRIE_HASH,
            logs_bloom: Bloom::zero(),
            difficulty: self.difficulty,
            number: 0,
            gas_limit: self.gas_limit,
            gas_used: 0,
            timestamp: self.timestamp,
            extra_data: self.extra_data.clone(),
            mix_hash: self.mix_hash,
            nonce: H64::from_low_u64_be(self.nonce),
        }
    }

    /// Root of the state trie holding the allocated accounts.
    pub fn compute_state_root(&self) -> H256 {
        let iter = self.alloc.iter().map(|(address, account)| {
            (hash_address(address), account.to_account_state().encode_to_vec())
        });
        Trie::compute_hash_from_unsorted_iter(iter).unwrap_or_default()
    }
}

impl GenesisAccount {
    pub fn to_account_state(&self) -> AccountState {
        AccountState {
            nonce: self.nonce.unwrap_or_default(),
            balance: self.balance,
            storage_root: self.compute_storage_root(),
            code_hash: code_hash(&self.code),
        }
    }

    pub fn compute_storage_root(&self) -> H256 {
        let iter = self
            .storage
            .iter()
            .filter(|(_, value)| !value.is_zero())
            .map(|(key, value)| {
                (
                    hash_key(key),
                    U256::from_big_endian(value.as_bytes()).encode_to_vec(),
                )
            });
        Trie::compute_hash_from_unsorted_iter(iter).unwrap_or_default()
    }
}
