pub mod db;
pub mod error;
mod nibbles;
mod node;
mod node_hash;
mod state;

use ethereum_types::H256;
use lazy_static::lazy_static;
use sha3::{Digest, Keccak256};

use ember_rlp::constants::RLP_NULL;

pub use self::db::{InMemoryTrieDB, TrieDB};
pub use self::error::TrieError;
pub use self::nibbles::Nibbles;
pub use self::node::Node;
pub use self::node_hash::NodeHash;
pub use self::state::TrieState;

use self::node::LeafNode;

lazy_static! {
    /// Hash of an empty trie, keccak(RLP of the empty string).
    pub static ref EMPTY_TRIE_HASH: H256 =
        H256::from_slice(&Keccak256::digest([RLP_NULL]));
}

/// RLP-encoded trie path
pub type PathRLP = Vec<u8>;
/// RLP-encoded trie value
pub type ValueRLP = Vec<u8>;

/// Ethereum-compatible Merkle Patricia Trie over a pluggable node store.
pub struct Trie {
    root: Option<NodeHash>,
    state: TrieState,
}

impl Trie {
    /// Creates a new empty trie on top of a clean node store.
    pub fn new(db: Box<dyn TrieDB>) -> Self {
        Self {
            state: TrieState::new(db),
            root: None,
        }
    }

    /// Opens a trie rooted at `root` from an already-populated node store.
    pub fn open(db: Box<dyn TrieDB>, root: H256) -> Self {
        let root = (root != *EMPTY_TRIE_HASH).then(|| root.into());
        Self {
            state: TrieState::new(db),
            root,
        }
    }

    /// Creates a temporary trie over an in-memory store. Mostly for tests and
    /// standalone root computations.
    pub fn new_temp() -> Self {
        Self::new(Box::new(InMemoryTrieDB::new_empty()))
    }

    /// Retrieves a value given its RLP-encoded path.
    pub fn get(&self, path: &PathRLP) -> Result<Option<ValueRLP>, TrieError> {
        let Some(root) = &self.root else {
            return Ok(None);
        };
        let root_node = self
            .state
            .get_node(*root)?
            .ok_or(TrieError::InconsistentTree)?;
        root_node.get(&self.state, Nibbles::from_bytes(path))
    }

    /// Inserts a value into the trie.
    pub fn insert(&mut self, path: PathRLP, value: ValueRLP) -> Result<(), TrieError> {
        let path = Nibbles::from_bytes(&path);
        match self.root.take().map(|root| self.state.get_node(root)) {
            Some(root_node) => {
                let root_node = root_node?.ok_or(TrieError::InconsistentTree)?;
                let root_node = root_node.insert(&mut self.state, path, value)?;
                self.root = Some(root_node.insert_self(&mut self.state)?);
            }
            None => {
                let new_leaf = Node::from(LeafNode::new(path, value));
                self.root = Some(new_leaf.insert_self(&mut self.state)?);
            }
        }
        Ok(())
    }

    /// Removes a value given its RLP-encoded path, returning it if present.
    pub fn remove(&mut self, path: PathRLP) -> Result<Option<ValueRLP>, TrieError> {
        let Some(root) = self.root.take() else {
            return Ok(None);
        };
        let root_node = self
            .state
            .get_node(root)?
            .ok_or(TrieError::InconsistentTree)?;
        let (root_node, old_value) = root_node.remove(&mut self.state, Nibbles::from_bytes(&path))?;
        self.root = root_node
            .map(|node| node.insert_self(&mut self.state))
            .transpose()?;
        Ok(old_value)
    }

    /// Returns the root hash, committing pending nodes to the store.
    /// An empty trie hashes to keccak(RLP of the empty string).
    pub fn hash(&mut self) -> Result<H256, TrieError> {
        self.commit()?;
        Ok(self.hash_no_commit())
    }

    /// Returns the root hash without touching the store.
    pub fn hash_no_commit(&self) -> H256 {
        self.root
            .as_ref()
            .map(|root| root.finalize())
            .unwrap_or(*EMPTY_TRIE_HASH)
    }

    /// Writes pending nodes to the backing store.
    pub fn commit(&mut self) -> Result<(), TrieError> {
        if let Some(root) = self.root {
            self.state.commit(&root)?;
        }
        Ok(())
    }

    /// Computes the root of the trie holding the given key-value pairs
    /// without keeping any of its nodes, e.g. for transaction and receipt
    /// roots.
    pub fn compute_hash_from_unsorted_iter(
        iter: impl Iterator<Item = (PathRLP, ValueRLP)>,
    ) -> Result<H256, TrieError> {
        let mut trie = Trie::new_temp();
        for (path, value) in iter {
            trie.insert(path, value)?;
        }
        Ok(trie.hash_no_commit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[test]
    fn empty_trie_hash() {
        assert_eq!(
            Trie::new_temp().hash_no_commit(),
            H256(hex!(
                "56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421"
            ))
        );
    }

    #[test]
    fn insert_get_roundtrip() {
        let mut trie = Trie::new_temp();
        trie.insert(b"horse".to_vec(), b"stallion".to_vec()).unwrap();
        trie.insert(b"dog".to_vec(), b"puppy".to_vec()).unwrap();
        assert_eq!(trie.get(&b"dog".to_vec()).unwrap(), Some(b"puppy".to_vec()));
        assert_eq!(trie.get(&b"cat".to_vec()).unwrap(), None);
    }

    #[test]
    fn overwrite_value() {
        let mut trie = Trie::new_temp();
        trie.insert(b"dog".to_vec(), b"puppy".to_vec()).unwrap();
        trie.insert(b"dog".to_vec(), b"hound".to_vec()).unwrap();
        assert_eq!(trie.get(&b"dog".to_vec()).unwrap(), Some(b"hound".to_vec()));
    }

    // Reference roots from the canonical Ethereum trie test fixtures.
    #[test]
    fn branching_keys_known_root() {
        let mut trie = Trie::new_temp();
        trie.insert(b"do".to_vec(), b"verb".to_vec()).unwrap();
        trie.insert(b"dog".to_vec(), b"puppy".to_vec()).unwrap();
        trie.insert(b"doge".to_vec(), b"coin".to_vec()).unwrap();
        trie.insert(b"horse".to_vec(), b"stallion".to_vec()).unwrap();
        assert_eq!(
            trie.hash().unwrap(),
            H256(hex!(
                "5991bb8c6514148a29db676a14ac506cd2cd5775ace63c30a4fe457715e9ac84"
            ))
        );
    }

    #[test]
    fn dogglesworth_known_root() {
        let mut trie = Trie::new_temp();
        trie.insert(b"doe".to_vec(), b"reindeer".to_vec()).unwrap();
        trie.insert(b"dog".to_vec(), b"puppy".to_vec()).unwrap();
        trie.insert(b"dogglesworth".to_vec(), b"cat".to_vec()).unwrap();
        assert_eq!(
            trie.hash().unwrap(),
            H256(hex!(
                "8aad789dff2f538bca5d8ea56e8abe10f4c7ba3a5dea95fea4cd6e7c3a1168d3"
            ))
        );
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let pairs: Vec<(&[u8], &[u8])> = vec![
            (b"do", b"verb"),
            (b"dog", b"puppy"),
            (b"doge", b"coin"),
            (b"horse", b"stallion"),
        ];
        let mut forward = Trie::new_temp();
        for (k, v) in &pairs {
            forward.insert(k.to_vec(), v.to_vec()).unwrap();
        }
        let mut backward = Trie::new_temp();
        for (k, v) in pairs.iter().rev() {
            backward.insert(k.to_vec(), v.to_vec()).unwrap();
        }
        assert_eq!(forward.hash().unwrap(), backward.hash().unwrap());
    }

    #[test]
    fn remove_restores_previous_root() {
        let mut trie = Trie::new_temp();
        trie.insert(b"do".to_vec(), b"verb".to_vec()).unwrap();
        trie.insert(b"horse".to_vec(), b"stallion".to_vec()).unwrap();
        let before = trie.hash_no_commit();

        trie.insert(b"dogglesworth".to_vec(), b"cat".to_vec()).unwrap();
        let removed = trie.remove(b"dogglesworth".to_vec()).unwrap();
        assert_eq!(removed, Some(b"cat".to_vec()));
        assert_eq!(trie.hash_no_commit(), before);
    }

    #[test]
    fn remove_all_yields_empty_root() {
        let mut trie = Trie::new_temp();
        trie.insert(b"dog".to_vec(), b"puppy".to_vec()).unwrap();
        trie.insert(b"doge".to_vec(), b"coin".to_vec()).unwrap();
        trie.remove(b"dog".to_vec()).unwrap();
        trie.remove(b"doge".to_vec()).unwrap();
        assert_eq!(trie.hash_no_commit(), *EMPTY_TRIE_HASH);
    }

    #[test]
    fn reopen_from_committed_root() {
        let map = Arc::new(Mutex::new(HashMap::new()));
        let mut trie = Trie::new(Box::new(InMemoryTrieDB::new(map.clone())));
        trie.insert(b"doe".to_vec(), b"reindeer".to_vec()).unwrap();
        trie.insert(b"dog".to_vec(), b"puppy".to_vec()).unwrap();
        let root = trie.hash().unwrap();

        let reopened = Trie::open(Box::new(InMemoryTrieDB::new(map)), root);
        assert_eq!(
            reopened.get(&b"doe".to_vec()).unwrap(),
            Some(b"reindeer".to_vec())
        );
        assert_eq!(reopened.hash_no_commit(), root);
    }

    #[test]
    fn large_trie_survives_mixed_operations() {
        let mut trie = Trie::new_temp();
        for i in 0u32..200 {
            trie.insert(i.to_be_bytes().to_vec(), vec![i as u8; 8]).unwrap();
        }
        for i in (0u32..200).step_by(2) {
            trie.remove(i.to_be_bytes().to_vec()).unwrap();
        }
        for i in 0u32..200 {
            let expected = (i % 2 == 1).then(|| vec![i as u8; 8]);
            assert_eq!(trie.get(&i.to_be_bytes().to_vec()).unwrap(), expected);
        }
    }
}
