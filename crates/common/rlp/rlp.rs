//! Recursive Length Prefix (RLP) encoding and decoding.
//!
//! RLP is the serialization format used across the client for accounts,
//! transactions, blocks, receipts and trie nodes.

pub mod constants;
pub mod decode;
pub mod encode;
pub mod error;
pub mod structs;
