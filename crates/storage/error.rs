use ember_rlp::error::RLPDecodeError;
use ember_trie::TrieError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Trie error: {0}")]
    Trie(#[from] TrieError),
    #[error("RLP decode error: {0}")]
    RLPDecode(#[from] RLPDecodeError),
    #[error("Lock error")]
    LockError,
    #[error("{0}")]
    Custom(String),
}
