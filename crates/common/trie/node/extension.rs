use ember_rlp::structs::Encoder;

use crate::{ValueRLP, error::TrieError, nibbles::Nibbles, node_hash::NodeHash, state::TrieState};

use super::{BranchNode, LeafNode, Node};

/// Node forwarding a shared path segment to a single child.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionNode {
    pub prefix: Nibbles,
    pub child: NodeHash,
}

impl ExtensionNode {
    pub fn new(prefix: Nibbles, child: NodeHash) -> Self {
        Self { prefix, child }
    }

    pub fn get(&self, state: &TrieState, mut path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        if path.skip_prefix(&self.prefix) {
            let child = state
                .get_node(self.child)?
                .ok_or(TrieError::InconsistentTree)?;
            child.get(state, path)
        } else {
            Ok(None)
        }
    }

    pub fn insert(
        mut self,
        state: &mut TrieState,
        mut path: Nibbles,
        value: ValueRLP,
    ) -> Result<Node, TrieError> {
        if path.skip_prefix(&self.prefix) {
            let child = state
                .get_node(self.child)?
                .ok_or(TrieError::InconsistentTree)?;
            let new_child = child.insert(state, path, value)?;
            self.child = new_child.insert_self(state)?;
            return Ok(self.into());
        }
        // The path forks inside the prefix: cut the prefix at the fork and
        // hang both remainders from a new branch.
        let match_len = self.prefix.count_prefix(&path);
        let mut branch = BranchNode::default();

        let ext_first = self.prefix.at(match_len);
        let ext_rest = self.prefix.offset(match_len + 1);
        branch.choices[ext_first] = if ext_rest.is_empty() {
            self.child
        } else {
            Node::from(ExtensionNode::new(ext_rest, self.child)).insert_self(state)?
        };

        match path.at(match_len) {
            16 => branch.value = value,
            nibble => {
                let leaf = LeafNode::new(path.offset(match_len + 1), value);
                branch.choices[nibble] = Node::from(leaf).insert_self(state)?;
            }
        }

        let branch_node = Node::from(branch);
        if match_len == 0 {
            Ok(branch_node)
        } else {
            let child = branch_node.insert_self(state)?;
            Ok(ExtensionNode::new(self.prefix.slice(0, match_len), child).into())
        }
    }

    pub fn remove(
        self,
        state: &mut TrieState,
        mut path: Nibbles,
    ) -> Result<(Option<Node>, Option<ValueRLP>), TrieError> {
        if !path.skip_prefix(&self.prefix) {
            return Ok((Some(self.into()), None));
        }
        let child = state
            .get_node(self.child)?
            .ok_or(TrieError::InconsistentTree)?;
        let (new_child, old_value) = child.remove(state, path)?;

        // Collapse the extension with whatever replaced the child so no
        // extension ever points at another extension or a leaf.
        let node = match new_child {
            Some(Node::Leaf(mut leaf)) => {
                let mut partial = self.prefix;
                partial.extend(&leaf.partial);
                leaf.partial = partial;
                Some(leaf.into())
            }
            Some(Node::Extension(ext)) => {
                let mut prefix = self.prefix;
                prefix.extend(&ext.prefix);
                Some(ExtensionNode::new(prefix, ext.child).into())
            }
            Some(branch @ Node::Branch(_)) => {
                let child = branch.insert_self(state)?;
                Some(ExtensionNode::new(self.prefix, child).into())
            }
            None => None,
        };
        Ok((node, old_value))
    }

    pub fn encode_raw(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = Encoder::new(&mut buf).encode_bytes(&self.prefix.encode_compact());
        match self.child {
            NodeHash::Hashed(hash) => encoder.encode_bytes(hash.as_bytes()).finish(),
            NodeHash::Inline(_) => encoder.encode_raw(self.child.as_ref()).finish(),
        }
        buf
    }

    pub fn compute_hash(&self) -> NodeHash {
        NodeHash::from_encoded_raw(&self.encode_raw())
    }
}
