use ethereum_types::H256;
use sha3::{Digest, Keccak256};

/// Reference to a trie node.
///
/// Nodes whose RLP encoding is at least 32 bytes are referenced by their
/// keccak hash; shorter nodes are inlined into their parent, carrying the raw
/// encoding instead (Yellow Paper, appendix D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeHash {
    Hashed(H256),
    Inline(([u8; 31], u8)),
}

impl NodeHash {
    /// Builds the reference for a node given its RLP encoding.
    pub fn from_encoded_raw(encoded: &[u8]) -> NodeHash {
        if encoded.len() >= 32 {
            NodeHash::Hashed(H256::from_slice(&Keccak256::digest(encoded)))
        } else {
            let mut buf = [0u8; 31];
            buf[..encoded.len()].copy_from_slice(encoded);
            NodeHash::Inline((buf, encoded.len() as u8))
        }
    }

    /// Converts the reference into a definite hash, hashing the raw encoding
    /// of inlined nodes. Used for root hashes, which are always keccaks.
    pub fn finalize(&self) -> H256 {
        match self {
            NodeHash::Hashed(hash) => *hash,
            NodeHash::Inline(_) => H256::from_slice(&Keccak256::digest(self.as_ref())),
        }
    }

    /// False for the placeholder reference of an absent node.
    pub fn is_valid(&self) -> bool {
        !matches!(self, NodeHash::Inline((_, 0)))
    }
}

impl AsRef<[u8]> for NodeHash {
    fn as_ref(&self) -> &[u8] {
        match self {
            NodeHash::Hashed(hash) => hash.as_bytes(),
            NodeHash::Inline((data, len)) => &data[..*len as usize],
        }
    }
}

impl Default for NodeHash {
    fn default() -> Self {
        NodeHash::Inline(([0; 31], 0))
    }
}

impl From<H256> for NodeHash {
    fn from(value: H256) -> Self {
        NodeHash::Hashed(value)
    }
}
