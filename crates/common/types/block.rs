use bytes::Bytes;
use ethereum_types::{Address, Bloom, H64, H256, U256};

use ember_rlp::{
    decode::RLPDecode,
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};
use ember_trie::Trie;

use crate::{
    constants::DEFAULT_OMMERS_HASH,
    keccak,
    types::{BlockHash, BlockNumber, Receipt, Transaction},
};

/// Header of a block, as hashed for consensus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub parent_hash: BlockHash,
    pub ommers_hash: H256,
    pub coinbase: Address,
    pub state_root: H256,
    pub transactions_root: H256,
    pub receipts_root: H256,
    pub logs_bloom: Bloom,
    pub difficulty: U256,
    pub number: BlockNumber,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub mix_hash: H256,
    pub nonce: H64,
}

impl BlockHeader {
    pub fn compute_block_hash(&self) -> BlockHash {
        keccak(self.encode_to_vec())
    }
}

impl RLPEncode for BlockHeader {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_field(&self.parent_hash)
            .encode_field(&self.ommers_hash)
            .encode_field(&self.coinbase)
            .encode_field(&self.state_root)
            .encode_field(&self.transactions_root)
            .encode_field(&self.receipts_root)
            .encode_field(&self.logs_bloom)
            .encode_field(&self.difficulty)
            .encode_field(&self.number)
            .encode_field(&self.gas_limit)
            .encode_field(&self.gas_used)
            .encode_field(&self.timestamp)
            .encode_field(&self.extra_data)
            .encode_field(&self.mix_hash)
            .encode_field(&self.nonce)
            .finish();
    }
}

impl RLPDecode for BlockHeader {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (parent_hash, decoder) = decoder.decode_field("parent_hash")?;
        let (ommers_hash, decoder) = decoder.decode_field("ommers_hash")?;
        let (coinbase, decoder) = decoder.decode_field("coinbase")?;
        let (state_root, decoder) = decoder.decode_field("state_root")?;
        let (transactions_root, decoder) = decoder.decode_field("transactions_root")?;
        let (receipts_root, decoder) = decoder.decode_field("receipts_root")?;
        let (logs_bloom, decoder) = decoder.decode_field("logs_bloom")?;
        let (difficulty, decoder) = decoder.decode_field("difficulty")?;
        let (number, decoder) = decoder.decode_field("number")?;
        let (gas_limit, decoder) = decoder.decode_field("gas_limit")?;
        let (gas_used, decoder) = decoder.decode_field("gas_used")?;
        let (timestamp, decoder) = decoder.decode_field("timestamp")?;
        let (extra_data, decoder) = decoder.decode_field("extra_data")?;
        let (mix_hash, decoder) = decoder.decode_field("mix_hash")?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let header = BlockHeader {
            parent_hash,
            ommers_hash,
            coinbase,
            state_root,
            transactions_root,
            receipts_root,
            logs_bloom,
            difficulty,
            number,
            gas_limit,
            gas_used,
            timestamp,
            extra_data,
            mix_hash,
            nonce,
        };
        Ok((header, decoder.finish()?))
    }
}

/// The body of a block on the wire: transactions plus included ommers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockBody {
    pub transactions: Vec<Transaction>,
    pub ommers: Vec<BlockHeader>,
}

impl BlockBody {
    pub const fn empty() -> Self {
        Self {
            transactions: Vec::new(),
            ommers: Vec::new(),
        }
    }

    pub fn compute_transactions_root(&self) -> H256 {
        compute_transactions_root(&self.transactions)
    }

    pub fn compute_ommers_hash(&self) -> H256 {
        compute_ommers_hash(&self.ommers)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub body: BlockBody,
}

impl Block {
    pub fn new(header: BlockHeader, body: BlockBody) -> Self {
        Self { header, body }
    }

    pub fn hash(&self) -> BlockHash {
        self.header.compute_block_hash()
    }
}

impl RLPEncode for Block {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_field(&self.header)
            .encode_field(&self.body.transactions)
            .encode_field(&self.body.ommers)
            .finish();
    }
}

impl RLPDecode for Block {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (header, decoder) = decoder.decode_field("header")?;
        let (transactions, decoder) = decoder.decode_field("transactions")?;
        let (ommers, decoder) = decoder.decode_field("ommers")?;
        let block = Block {
            header,
            body: BlockBody {
                transactions,
                ommers,
            },
        };
        Ok((block, decoder.finish()?))
    }
}

/// Root of the trie mapping each transaction index to its RLP encoding.
pub fn compute_transactions_root(transactions: &[Transaction]) -> H256 {
    ordered_trie_root(transactions.iter().map(Transaction::encode_to_vec))
}

/// Root of the trie mapping each receipt index to its RLP encoding.
pub fn compute_receipts_root(receipts: &[Receipt]) -> H256 {
    ordered_trie_root(receipts.iter().map(Receipt::encode_to_vec))
}

/// keccak of the RLP list of ommer headers.
pub fn compute_ommers_hash(ommers: &[BlockHeader]) -> H256 {
    if ommers.is_empty() {
        return DEFAULT_OMMERS_HASH;
    }
    keccak(ommers.to_vec().encode_to_vec())
}

fn ordered_trie_root(values: impl Iterator<Item = Vec<u8>>) -> H256 {
    let iter = values
        .enumerate()
        .map(|(index, value)| (index.encode_to_vec(), value));
    // An in-memory trie build cannot fail
    Trie::compute_hash_from_unsorted_iter(iter).unwrap_or_default()
}
