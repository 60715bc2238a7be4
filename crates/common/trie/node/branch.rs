use ember_rlp::structs::Encoder;

use crate::{ValueRLP, error::TrieError, nibbles::Nibbles, node_hash::NodeHash, state::TrieState};

use super::{ExtensionNode, LeafNode, Node};

/// Node with a child per nibble plus a value for paths ending here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchNode {
    pub choices: [NodeHash; 16],
    pub value: ValueRLP,
}

impl BranchNode {
    pub fn get(&self, state: &TrieState, mut path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        match path.next_choice() {
            Some(choice) => {
                if self.choices[choice].is_valid() {
                    let child = state
                        .get_node(self.choices[choice])?
                        .ok_or(TrieError::InconsistentTree)?;
                    child.get(state, path)
                } else {
                    Ok(None)
                }
            }
            None => Ok((!self.value.is_empty()).then(|| self.value.clone())),
        }
    }

    pub fn insert(
        mut self,
        state: &mut TrieState,
        mut path: Nibbles,
        value: ValueRLP,
    ) -> Result<Node, TrieError> {
        match path.next_choice() {
            Some(choice) => {
                if self.choices[choice].is_valid() {
                    let child = state
                        .get_node(self.choices[choice])?
                        .ok_or(TrieError::InconsistentTree)?;
                    let new_child = child.insert(state, path, value)?;
                    self.choices[choice] = new_child.insert_self(state)?;
                } else {
                    let leaf = LeafNode::new(path, value);
                    self.choices[choice] = Node::from(leaf).insert_self(state)?;
                }
            }
            None => self.value = value,
        }
        Ok(self.into())
    }

    pub fn remove(
        mut self,
        state: &mut TrieState,
        mut path: Nibbles,
    ) -> Result<(Option<Node>, Option<ValueRLP>), TrieError> {
        let old_value = match path.next_choice() {
            Some(choice) => {
                if !self.choices[choice].is_valid() {
                    return Ok((Some(self.into()), None));
                }
                let child = state
                    .get_node(self.choices[choice])?
                    .ok_or(TrieError::InconsistentTree)?;
                let (new_child, old_value) = child.remove(state, path)?;
                self.choices[choice] = match new_child {
                    Some(node) => node.insert_self(state)?,
                    None => NodeHash::default(),
                };
                old_value
            }
            None => {
                if self.value.is_empty() {
                    return Ok((Some(self.into()), None));
                }
                Some(std::mem::take(&mut self.value))
            }
        };

        // A branch left with a single referent collapses into its successor.
        let children: Vec<usize> = (0..16).filter(|i| self.choices[*i].is_valid()).collect();
        let node = match (children.as_slice(), self.value.is_empty()) {
            ([], true) => None,
            ([], false) => {
                let value = std::mem::take(&mut self.value);
                Some(LeafNode::new(Nibbles::from_hex(vec![16]), value).into())
            }
            ([choice], true) => {
                let child_hash = self.choices[*choice];
                let child = state
                    .get_node(child_hash)?
                    .ok_or(TrieError::InconsistentTree)?;
                match child {
                    Node::Leaf(mut leaf) => {
                        leaf.partial.prepend(*choice as u8);
                        Some(leaf.into())
                    }
                    Node::Extension(mut ext) => {
                        ext.prefix.prepend(*choice as u8);
                        Some(ext.into())
                    }
                    Node::Branch(_) => {
                        let prefix = Nibbles::from_hex(vec![*choice as u8]);
                        Some(ExtensionNode::new(prefix, child_hash).into())
                    }
                }
            }
            _ => Some(self.into()),
        };
        Ok((node, old_value))
    }

    pub fn encode_raw(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut encoder = Encoder::new(&mut buf);
        for choice in &self.choices {
            encoder = match choice {
                _ if !choice.is_valid() => encoder.encode_bytes(&[]),
                NodeHash::Hashed(hash) => encoder.encode_bytes(hash.as_bytes()),
                NodeHash::Inline(_) => encoder.encode_raw(choice.as_ref()),
            };
        }
        encoder.encode_bytes(&self.value).finish();
        buf
    }

    pub fn compute_hash(&self) -> NodeHash {
        NodeHash::from_encoded_raw(&self.encode_raw())
    }
}
