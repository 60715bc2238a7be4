//! Stateless block validation: pure checks against the parent header that
//! need no storage access.

use thiserror::Error;

use crate::{
    constants::{GAS_LIMIT_BOUND_DIVISOR, MAX_EXTRA_DATA_SIZE, MIN_GAS_LIMIT},
    difficulty::calculate_difficulty,
    types::{BlockHeader, ChainConfig},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidBlockError {
    #[error("Block number is not one more than its parent's")]
    NonSequentialBlockNumber,
    #[error("Timestamp is not later than its parent's")]
    TimestampNotMonotonic,
    #[error("Gas used is greater than the gas limit")]
    GasUsedGreaterThanGasLimit,
    #[error("Gas limit outside the allowed delta from the parent")]
    GasLimitOutOfBounds,
    #[error("Extra data is too long")]
    ExtraDataTooLong,
    #[error("Difficulty does not match the adjustment formula")]
    DifficultyMismatch,
    #[error("Transactions root does not match the block body")]
    TransactionsRootMismatch,
    #[error("Ommers hash does not match the block body")]
    OmmersHashMismatch,
    #[error("Invalid ommer: {0}")]
    InvalidOmmer(String),
    #[error("State root mismatch after execution")]
    StateRootMismatch,
    #[error("Receipts root mismatch after execution")]
    ReceiptsRootMismatch,
    #[error("Gas used mismatch after execution: computed {0}, header has {1}")]
    GasUsedMismatch(u64, u64),
    #[error("Logs bloom mismatch after execution")]
    LogsBloomMismatch,
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
}

/// Validates a header against its parent: number sequence, timestamp
/// monotonicity, gas limit delta, extra data size and the difficulty
/// formula. The PoW seal itself is checked by the validator bundle.
pub fn validate_block_header(
    header: &BlockHeader,
    parent: &BlockHeader,
    config: &ChainConfig,
) -> Result<(), InvalidBlockError> {
    if header.number != parent.number + 1 {
        return Err(InvalidBlockError::NonSequentialBlockNumber);
    }
    if header.timestamp <= parent.timestamp {
        return Err(InvalidBlockError::TimestampNotMonotonic);
    }
    if header.gas_used > header.gas_limit {
        return Err(InvalidBlockError::GasUsedGreaterThanGasLimit);
    }
    validate_gas_limit(header.gas_limit, parent.gas_limit)?;
    if header.extra_data.len() > MAX_EXTRA_DATA_SIZE {
        return Err(InvalidBlockError::ExtraDataTooLong);
    }
    let expected = calculate_difficulty(
        parent,
        header.number,
        header.timestamp,
        config.fork(header.number),
    );
    if header.difficulty != expected {
        return Err(InvalidBlockError::DifficultyMismatch);
    }
    Ok(())
}

/// The gas limit may drift at most `parent/1024` per block and never below
/// the protocol minimum.
pub fn validate_gas_limit(gas_limit: u64, parent_gas_limit: u64) -> Result<(), InvalidBlockError> {
    let bound = parent_gas_limit / GAS_LIMIT_BOUND_DIVISOR;
    if gas_limit < MIN_GAS_LIMIT || gas_limit.abs_diff(parent_gas_limit) >= bound {
        return Err(InvalidBlockError::GasLimitOutOfBounds);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_OMMERS_HASH;
    use bytes::Bytes;
    use ethereum_types::{Address, Bloom, H64, H256, U256};

    fn header(number: u64, timestamp: u64, gas_limit: u64, difficulty: U256) -> BlockHeader {
        BlockHeader {
            parent_hash: H256::zero(),
            ommers_hash: DEFAULT_OMMERS_HASH,
            coinbase: Address::zero(),
            state_root: H256::zero(),
            transactions_root: H256::zero(),
            receipts_root: H256::zero(),
            logs_bloom: Bloom::zero(),
            difficulty,
            number,
            gas_limit,
            gas_used: 0,
            timestamp,
            extra_data: Bytes::new(),
            mix_hash: H256::zero(),
            nonce: H64::zero(),
        }
    }

    fn valid_child(parent: &BlockHeader, config: &ChainConfig) -> BlockHeader {
        let number = parent.number + 1;
        let timestamp = parent.timestamp + 13;
        let difficulty = calculate_difficulty(parent, number, timestamp, config.fork(number));
        header(number, timestamp, parent.gas_limit, difficulty)
    }

    #[test]
    fn accepts_well_formed_child() {
        let config = ChainConfig::default();
        let parent = header(0, 1000, 5000, U256::from(131_072));
        let child = valid_child(&parent, &config);
        assert_eq!(validate_block_header(&child, &parent, &config), Ok(()));
    }

    #[test]
    fn rejects_bad_number_timestamp_and_difficulty() {
        let config = ChainConfig::default();
        let parent = header(0, 1000, 5000, U256::from(131_072));

        let mut child = valid_child(&parent, &config);
        child.number = 5;
        assert_eq!(
            validate_block_header(&child, &parent, &config),
            Err(InvalidBlockError::NonSequentialBlockNumber)
        );

        let mut child = valid_child(&parent, &config);
        child.timestamp = parent.timestamp;
        assert_eq!(
            validate_block_header(&child, &parent, &config),
            Err(InvalidBlockError::TimestampNotMonotonic)
        );

        let mut child = valid_child(&parent, &config);
        child.difficulty = U256::from(999_999);
        assert_eq!(
            validate_block_header(&child, &parent, &config),
            Err(InvalidBlockError::DifficultyMismatch)
        );
    }

    #[test]
    fn rejects_gas_limit_jumps() {
        let config = ChainConfig::default();
        let parent = header(0, 1000, 4_000_000, U256::from(131_072));
        let mut child = valid_child(&parent, &config);
        child.gas_limit = parent.gas_limit + parent.gas_limit / 1024;
        assert_eq!(
            validate_block_header(&child, &parent, &config),
            Err(InvalidBlockError::GasLimitOutOfBounds)
        );
        child.gas_limit = parent.gas_limit + parent.gas_limit / 1024 - 1;
        assert_eq!(validate_block_header(&child, &parent, &config), Ok(()));
    }

    #[test]
    fn rejects_oversized_extra_data() {
        let config = ChainConfig::default();
        let parent = header(0, 1000, 5000, U256::from(131_072));
        let mut child = valid_child(&parent, &config);
        child.extra_data = Bytes::from(vec![0u8; MAX_EXTRA_DATA_SIZE + 1]);
        assert_eq!(
            validate_block_header(&child, &parent, &config),
            Err(InvalidBlockError::ExtraDataTooLong)
        );
    }
}
