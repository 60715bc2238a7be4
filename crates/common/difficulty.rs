//! Proof-of-work difficulty adjustment (Frontier and Homestead/EIP-2 rules).

use ethereum_types::U256;

use crate::types::{BlockHeader, Fork};

/// Minimum difficulty, 2^17.
pub const MIN_DIFFICULTY: u64 = 131_072;

/// Limits how much difficulty can change per block.
const DIFFICULTY_BOUND_DIVISOR: u64 = 2048;

/// Block interval of the difficulty bomb.
const EXP_DIFF_PERIOD: u64 = 100_000;

/// Target block time used by the Frontier adjustment.
const FRONTIER_DURATION_LIMIT: u64 = 13;

/// Expected difficulty of a block given its parent header.
pub fn calculate_difficulty(
    parent: &BlockHeader,
    block_number: u64,
    block_timestamp: u64,
    fork: Fork,
) -> U256 {
    let quotient = parent.difficulty / U256::from(DIFFICULTY_BOUND_DIVISOR);
    let elapsed = block_timestamp.saturating_sub(parent.timestamp);

    let mut difficulty = if fork >= Fork::Homestead {
        // EIP-2: adjustment factor max(1 - elapsed/10, -99)
        let factor = (1i64 - (elapsed / 10) as i64).max(-99);
        if factor >= 0 {
            parent.difficulty + quotient * U256::from(factor as u64)
        } else {
            parent
                .difficulty
                .saturating_sub(quotient * U256::from(factor.unsigned_abs()))
        }
    } else if elapsed < FRONTIER_DURATION_LIMIT {
        parent.difficulty + quotient
    } else {
        parent.difficulty.saturating_sub(quotient)
    };

    // Difficulty bomb, doubling every period
    let period = block_number / EXP_DIFF_PERIOD;
    if period >= 2 {
        difficulty += U256::one() << ((period - 2) as usize);
    }

    difficulty.max(U256::from(MIN_DIFFICULTY))
}
