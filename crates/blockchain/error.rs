use ember_common::validation::InvalidBlockError;
use ember_rlp::error::RLPDecodeError;
use ember_storage::StoreError;
use ember_trie::TrieError;
use ember_vm::errors::VMError;

/// Block-level failures. Any of these rejects the whole block and leaves the
/// store untouched; a failing transaction inside a valid block is *not* a
/// `ChainError`, it is recorded in its receipt.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid Block: {0}")]
    InvalidBlock(#[from] InvalidBlockError),
    #[error("Parent block not found")]
    ParentNotFound,
    #[error("Invalid Transaction: {0}")]
    InvalidTransaction(String),
    #[error("DB error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Trie error: {0}")]
    TrieError(#[from] TrieError),
    #[error("RLP decode error: {0}")]
    RLPDecodeError(#[from] RLPDecodeError),
    #[error("EVM error: {0}")]
    EvmError(VMError),
    #[error("{0}")]
    Custom(String),
}
