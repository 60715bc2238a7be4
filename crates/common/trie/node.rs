pub mod branch;
pub mod extension;
pub mod leaf;

pub use branch::BranchNode;
pub use extension::ExtensionNode;
pub use leaf::LeafNode;

use ember_rlp::{decode::decode_bytes, error::RLPDecodeError, structs::Decoder};
use ethereum_types::H256;

use crate::{ValueRLP, error::TrieError, nibbles::Nibbles, node_hash::NodeHash, state::TrieState};

/// A node in an Ethereum-compatible Merkle Patricia Trie.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Branch(Box<BranchNode>),
    Extension(ExtensionNode),
    Leaf(LeafNode),
}

impl From<BranchNode> for Node {
    fn from(node: BranchNode) -> Self {
        Node::Branch(Box::new(node))
    }
}

impl From<ExtensionNode> for Node {
    fn from(node: ExtensionNode) -> Self {
        Node::Extension(node)
    }
}

impl From<LeafNode> for Node {
    fn from(node: LeafNode) -> Self {
        Node::Leaf(node)
    }
}

impl Node {
    /// Retrieves a value from the subtrie originating from this node.
    pub fn get(&self, state: &TrieState, path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        match self {
            Node::Branch(n) => n.get(state, path),
            Node::Extension(n) => n.get(state, path),
            Node::Leaf(n) => n.get(path),
        }
    }

    /// Inserts a value into the subtrie originating from this node and
    /// returns the new root of the subtrie.
    pub fn insert(
        self,
        state: &mut TrieState,
        path: Nibbles,
        value: ValueRLP,
    ) -> Result<Node, TrieError> {
        match self {
            Node::Branch(n) => n.insert(state, path, value),
            Node::Extension(n) => n.insert(state, path, value),
            Node::Leaf(n) => n.insert(state, path, value),
        }
    }

    /// Removes a value from the subtrie originating from this node.
    /// Returns the new subtrie root (if any) and the removed value (if found).
    pub fn remove(
        self,
        state: &mut TrieState,
        path: Nibbles,
    ) -> Result<(Option<Node>, Option<ValueRLP>), TrieError> {
        match self {
            Node::Branch(n) => n.remove(state, path),
            Node::Extension(n) => n.remove(state, path),
            Node::Leaf(n) => n.remove(path),
        }
    }

    pub fn encode_raw(&self) -> Vec<u8> {
        match self {
            Node::Branch(n) => n.encode_raw(),
            Node::Extension(n) => n.encode_raw(),
            Node::Leaf(n) => n.encode_raw(),
        }
    }

    /// Decodes a node from its RLP encoding, picking the node kind from the
    /// item count and the path flag.
    pub fn decode_raw(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        let mut items = vec![];
        let mut decoder = Decoder::new(rlp)?;
        let mut item;
        loop {
            (item, decoder) = decoder.get_encoded_item()?;
            items.push(item);
            if decoder.is_done() || items.len() > 17 {
                break;
            }
        }
        Ok(match items.len() {
            2 => {
                let (path, _) = decode_bytes(&items[0])?;
                let path = Nibbles::decode_compact(path);
                if path.is_leaf() {
                    let (value, _) = decode_bytes(&items[1])?;
                    LeafNode::new(path, value.to_vec()).into()
                } else {
                    ExtensionNode::new(path, decode_child(&items[1])).into()
                }
            }
            17 => {
                let mut branch = BranchNode::default();
                for (i, choice) in branch.choices.iter_mut().enumerate() {
                    *choice = decode_child(&items[i]);
                }
                let (value, _) = decode_bytes(&items[16])?;
                branch.value = value.to_vec();
                branch.into()
            }
            n => {
                return Err(RLPDecodeError::Custom(format!(
                    "Invalid arg count for Node, expected 2 or 17, got {n}"
                )));
            }
        })
    }

    pub fn compute_hash(&self) -> NodeHash {
        match self {
            Node::Branch(n) => n.compute_hash(),
            Node::Extension(n) => n.compute_hash(),
            Node::Leaf(n) => n.compute_hash(),
        }
    }

    /// Stores the node in the trie's cache and returns its reference.
    pub fn insert_self(self, state: &mut TrieState) -> Result<NodeHash, TrieError> {
        let hash = self.compute_hash();
        state.insert_node(self, hash);
        Ok(hash)
    }
}

fn decode_child(rlp: &[u8]) -> NodeHash {
    match decode_bytes(rlp) {
        Ok((hash, &[])) if hash.len() == 32 => NodeHash::Hashed(H256::from_slice(hash)),
        Ok((&[], &[])) => NodeHash::default(),
        _ => NodeHash::from_encoded_raw(rlp),
    }
}
