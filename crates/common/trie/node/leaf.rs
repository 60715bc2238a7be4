use ember_rlp::structs::Encoder;

use crate::{ValueRLP, error::TrieError, nibbles::Nibbles, node_hash::NodeHash, state::TrieState};

use super::{BranchNode, ExtensionNode, Node};

/// Node holding a value at the end of a path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeafNode {
    pub partial: Nibbles,
    pub value: ValueRLP,
}

impl LeafNode {
    pub fn new(partial: Nibbles, value: ValueRLP) -> Self {
        Self { partial, value }
    }

    pub fn get(&self, path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        if path == self.partial {
            Ok(Some(self.value.clone()))
        } else {
            Ok(None)
        }
    }

    pub fn insert(
        mut self,
        state: &mut TrieState,
        path: Nibbles,
        value: ValueRLP,
    ) -> Result<Node, TrieError> {
        if self.partial == path {
            self.value = value;
            return Ok(self.into());
        }
        // Paths diverge: split into a branch (plus a leading extension when
        // they share a prefix), each remainder hanging from its first nibble.
        let match_len = self.partial.count_prefix(&path);
        let self_suffix = self.partial.offset(match_len);
        let path_suffix = path.offset(match_len);

        let mut branch = BranchNode::default();
        match self_suffix.at(0) {
            16 => branch.value = self.value,
            nibble => {
                let leaf = LeafNode::new(self_suffix.offset(1), self.value);
                branch.choices[nibble] = Node::from(leaf).insert_self(state)?;
            }
        }
        match path_suffix.at(0) {
            16 => branch.value = value,
            nibble => {
                let leaf = LeafNode::new(path_suffix.offset(1), value);
                branch.choices[nibble] = Node::from(leaf).insert_self(state)?;
            }
        }

        let branch_node = Node::from(branch);
        if match_len == 0 {
            Ok(branch_node)
        } else {
            let child = branch_node.insert_self(state)?;
            Ok(ExtensionNode::new(path.slice(0, match_len), child).into())
        }
    }

    pub fn remove(self, path: Nibbles) -> Result<(Option<Node>, Option<ValueRLP>), TrieError> {
        if path == self.partial {
            Ok((None, Some(self.value)))
        } else {
            Ok((Some(self.into()), None))
        }
    }

    pub fn encode_raw(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        Encoder::new(&mut buf)
            .encode_bytes(&self.partial.encode_compact())
            .encode_bytes(&self.value)
            .finish();
        buf
    }

    pub fn compute_hash(&self) -> NodeHash {
        NodeHash::from_encoded_raw(&self.encode_raw())
    }
}
