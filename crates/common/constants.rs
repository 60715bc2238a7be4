use ethereum_types::H256;
use hex_literal::hex;

/// keccak-256 of the empty byte string, the code hash of codeless accounts.
pub const EMPTY_KECCAK_HASH: H256 = H256(hex!(
    "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
));

/// keccak-256 of the RLP encoding of the empty list, the ommers hash of
/// blocks without uncles.
pub const DEFAULT_OMMERS_HASH: H256 = H256(hex!(
    "1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347"
));

/// Maximum relative change of the gas limit between consecutive blocks.
pub const GAS_LIMIT_BOUND_DIVISOR: u64 = 1024;

/// Gas limits below this reject the block.
pub const MIN_GAS_LIMIT: u64 = 5000;

/// Maximum `extra_data` length in bytes.
pub const MAX_EXTRA_DATA_SIZE: usize = 32;

/// How many ancestor generations an ommer may be away from the including
/// block.
pub const MAX_OMMER_DEPTH: u64 = 6;

/// Number of recent blocks reachable through the BLOCKHASH opcode.
pub const BLOCKHASH_WINDOW: u64 = 256;
