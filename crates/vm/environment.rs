use ethereum_types::{Address, U256};

use ember_common::types::{BlockHeader, ChainConfig, Fork};

use crate::schedule::Schedule;

/// Transaction- and block-level context the executing code can observe but
/// not change.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Externally-owned account that signed the transaction.
    pub origin: Address,
    /// Gas limit of the transaction.
    pub gas_limit: u64,
    pub gas_price: U256,
    pub block_number: u64,
    pub coinbase: Address,
    pub timestamp: u64,
    pub difficulty: U256,
    pub block_gas_limit: u64,
    pub chain_id: u64,
    pub fork: Fork,
    pub schedule: Schedule,
    /// Total gas consumed by the transaction so far, intrinsic cost included.
    pub consumed_gas: u64,
}

impl Environment {
    /// Environment for executing a transaction under the given header.
    pub fn from_block_header(
        header: &BlockHeader,
        config: &ChainConfig,
        origin: Address,
        gas_limit: u64,
        gas_price: U256,
    ) -> Self {
        let fork = config.fork(header.number);
        Self {
            origin,
            gas_limit,
            gas_price,
            block_number: header.number,
            coinbase: header.coinbase,
            timestamp: header.timestamp,
            difficulty: header.difficulty,
            block_gas_limit: header.gas_limit,
            chain_id: config.chain_id,
            fork,
            schedule: Schedule::from_fork(fork),
            consumed_gas: 0,
        }
    }

    /// Plain environment for unit tests and standalone program runs.
    pub fn default_from_fork(fork: Fork) -> Self {
        Self {
            origin: Address::zero(),
            gas_limit: u64::MAX,
            gas_price: U256::zero(),
            block_number: 1,
            coinbase: Address::zero(),
            timestamp: 1,
            difficulty: U256::from(0x20000),
            block_gas_limit: u64::MAX,
            chain_id: 1,
            fork,
            schedule: Schedule::from_fork(fork),
            consumed_gas: 0,
        }
    }
}
