use std::cell::RefCell;
use std::collections::HashMap;

use crate::db::TrieDB;
use crate::error::TrieError;
use crate::node::Node;
use crate::node_hash::NodeHash;

/// View over the trie's node storage: a write-back cache of decoded nodes on
/// top of the backing [`TrieDB`]. Nodes are only written to the backend on
/// [`TrieState::commit`], and no node is ever removed from the backend.
pub struct TrieState {
    db: Box<dyn TrieDB>,
    cache: RefCell<HashMap<NodeHash, Node>>,
}

impl TrieState {
    pub fn new(db: Box<dyn TrieDB>) -> TrieState {
        TrieState {
            db,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Retrieves a node by its reference, decoding inlined nodes in place.
    pub fn get_node(&self, hash: NodeHash) -> Result<Option<Node>, TrieError> {
        if let NodeHash::Inline(_) = hash {
            return Ok(Some(Node::decode_raw(hash.as_ref())?));
        }
        if let Some(node) = self.cache.borrow().get(&hash) {
            return Ok(Some(node.clone()));
        }
        let Some(rlp) = self.db.get(hash.as_ref().to_vec())? else {
            return Ok(None);
        };
        let node = Node::decode_raw(&rlp)?;
        self.cache.borrow_mut().insert(hash, node.clone());
        Ok(Some(node))
    }

    /// Caches a node. Inlined nodes are skipped since they live in their
    /// parent's encoding.
    pub fn insert_node(&mut self, node: Node, hash: NodeHash) {
        if matches!(hash, NodeHash::Hashed(_)) {
            self.cache.borrow_mut().insert(hash, node);
        }
    }

    /// Writes the nodes reachable from `root` to the backend and clears the
    /// cache.
    pub fn commit(&mut self, root: &NodeHash) -> Result<(), TrieError> {
        let mut to_commit = Vec::new();
        self.collect_commit(root, &mut to_commit)?;
        self.db.put_batch(to_commit)?;
        self.cache.borrow_mut().clear();
        Ok(())
    }

    fn collect_commit(
        &mut self,
        node_hash: &NodeHash,
        acc: &mut Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<(), TrieError> {
        // Nodes absent from the cache are either inlined in their parent or
        // already stored in the backend.
        let Some(node) = self.cache.borrow_mut().remove(node_hash) else {
            return Ok(());
        };
        match &node {
            Node::Branch(n) => {
                for child in n.choices.iter() {
                    if child.is_valid() {
                        self.collect_commit(child, acc)?;
                    }
                }
            }
            Node::Extension(n) => self.collect_commit(&n.child, acc)?,
            Node::Leaf(_) => {}
        }
        acc.push((node_hash.as_ref().to_vec(), node.encode_raw()));
        Ok(())
    }
}
