//! In-memory chain storage: headers, bodies, receipts, account code and the
//! node store backing the state and storage tries.

pub mod error;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use tracing::info;

use ember_common::types::{
    AccountState, AccountUpdate, Block, BlockBody, BlockHash, BlockHeader, BlockNumber,
    ChainConfig, Genesis, Receipt, code_hash, hash_address, hash_key,
};
use ember_rlp::{decode::RLPDecode, encode::RLPEncode};
use ember_trie::{EMPTY_TRIE_HASH, InMemoryTrieDB, Trie};

pub use error::StoreError;

#[derive(Debug, Default)]
struct StoreInner {
    chain_config: ChainConfig,
    headers: HashMap<BlockHash, BlockHeader>,
    bodies: HashMap<BlockHash, BlockBody>,
    canonical_hashes: HashMap<BlockNumber, BlockHash>,
    receipts: HashMap<BlockHash, Vec<Receipt>>,
    account_codes: HashMap<H256, Bytes>,
    latest_block_number: BlockNumber,
}

/// Handle to the chain storage. Cheap to clone; all clones share state.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<Mutex<StoreInner>>,
    trie_nodes: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl Store {
    /// Sets up storage from a genesis file: builds the initial state trie and
    /// stores the genesis block as head of the canonical chain.
    pub fn new(genesis: &Genesis) -> Result<Self, StoreError> {
        let store = Store::default();
        store.lock_inner()?.chain_config = genesis.config;

        let mut state_trie = store.open_state_trie(*EMPTY_TRIE_HASH);
        for (address, account) in &genesis.alloc {
            let mut storage_trie = store.open_storage_trie(*EMPTY_TRIE_HASH);
            for (key, value) in &account.storage {
                if !value.is_zero() {
                    let value = U256::from_big_endian(value.as_bytes());
                    storage_trie.insert(hash_key(key), value.encode_to_vec())?;
                }
            }
            let account_state = AccountState {
                nonce: account.nonce.unwrap_or_default(),
                balance: account.balance,
                storage_root: storage_trie.hash()?,
                code_hash: code_hash(&account.code),
            };
            if !account.code.is_empty() {
                store.add_account_code(account_state.code_hash, account.code.clone())?;
            }
            state_trie.insert(hash_address(address), account_state.encode_to_vec())?;
        }
        let state_root = state_trie.hash()?;

        let block = genesis.get_block();
        if block.header.state_root != state_root {
            return Err(StoreError::Custom(
                "genesis state root mismatch".to_string(),
            ));
        }
        let hash = block.hash();
        info!(
            "Storing genesis block {hash:#x} with state root {state_root:#x} (chain id {})",
            genesis.config.chain_id
        );
        store.add_block(block)?;
        store.set_canonical_block(0, hash)?;
        Ok(store)
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, StoreInner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockError)
    }

    pub fn get_chain_config(&self) -> Result<ChainConfig, StoreError> {
        Ok(self.lock_inner()?.chain_config)
    }

    /// Stores a block's header and body, addressable by hash. Does not touch
    /// the canonical chain.
    pub fn add_block(&self, block: Block) -> Result<(), StoreError> {
        let hash = block.hash();
        let mut inner = self.lock_inner()?;
        inner.headers.insert(hash, block.header);
        inner.bodies.insert(hash, block.body);
        Ok(())
    }

    /// Marks a block as the canonical one for its number and moves the head
    /// forward if needed.
    pub fn set_canonical_block(&self, number: BlockNumber, hash: BlockHash) -> Result<(), StoreError> {
        let mut inner = self.lock_inner()?;
        inner.canonical_hashes.insert(number, hash);
        if number >= inner.latest_block_number {
            inner.latest_block_number = number;
        }
        Ok(())
    }

    pub fn get_canonical_block_hash(
        &self,
        number: BlockNumber,
    ) -> Result<Option<BlockHash>, StoreError> {
        Ok(self.lock_inner()?.canonical_hashes.get(&number).copied())
    }

    pub fn get_latest_block_number(&self) -> Result<BlockNumber, StoreError> {
        Ok(self.lock_inner()?.latest_block_number)
    }

    pub fn get_block_header_by_hash(
        &self,
        hash: BlockHash,
    ) -> Result<Option<BlockHeader>, StoreError> {
        Ok(self.lock_inner()?.headers.get(&hash).cloned())
    }

    pub fn get_block_body_by_hash(&self, hash: BlockHash) -> Result<Option<BlockBody>, StoreError> {
        Ok(self.lock_inner()?.bodies.get(&hash).cloned())
    }

    /// Canonical header for a block number.
    pub fn get_block_header(
        &self,
        number: BlockNumber,
    ) -> Result<Option<BlockHeader>, StoreError> {
        let inner = self.lock_inner()?;
        let Some(hash) = inner.canonical_hashes.get(&number) else {
            return Ok(None);
        };
        Ok(inner.headers.get(hash).cloned())
    }

    pub fn add_receipts(
        &self,
        block_hash: BlockHash,
        receipts: Vec<Receipt>,
    ) -> Result<(), StoreError> {
        self.lock_inner()?.receipts.insert(block_hash, receipts);
        Ok(())
    }

    pub fn get_receipts(&self, block_hash: BlockHash) -> Result<Option<Vec<Receipt>>, StoreError> {
        Ok(self.lock_inner()?.receipts.get(&block_hash).cloned())
    }

    pub fn add_account_code(&self, hash: H256, code: Bytes) -> Result<(), StoreError> {
        self.lock_inner()?.account_codes.insert(hash, code);
        Ok(())
    }

    pub fn get_account_code(&self, hash: H256) -> Result<Option<Bytes>, StoreError> {
        Ok(self.lock_inner()?.account_codes.get(&hash).cloned())
    }

    /// Opens the state trie rooted at `state_root` over the shared node
    /// store.
    pub fn open_state_trie(&self, state_root: H256) -> Trie {
        Trie::open(
            Box::new(InMemoryTrieDB::new(self.trie_nodes.clone())),
            state_root,
        )
    }

    /// Opens an account's storage trie; storage tries share the node store
    /// with the state trie.
    pub fn open_storage_trie(&self, storage_root: H256) -> Trie {
        Trie::open(
            Box::new(InMemoryTrieDB::new(self.trie_nodes.clone())),
            storage_root,
        )
    }

    /// Materializes a batch of account updates into the given state trie and
    /// the affected storage tries. The caller reads the new root from
    /// `state_trie.hash()`; applying the same updates twice yields the same
    /// root.
    pub fn apply_account_updates(
        &self,
        state_trie: &mut Trie,
        account_updates: &[AccountUpdate],
    ) -> Result<(), StoreError> {
        for update in account_updates {
            let hashed_address = hash_address(&update.address);
            if update.removed {
                state_trie.remove(hashed_address)?;
                continue;
            }
            let mut account_state = match state_trie.get(&hashed_address)? {
                Some(encoded) => AccountState::decode(&encoded)?,
                None => AccountState::default(),
            };
            if let Some(info) = &update.info {
                account_state.nonce = info.nonce;
                account_state.balance = info.balance;
                account_state.code_hash = info.code_hash;
                if let Some(code) = &update.code {
                    self.add_account_code(info.code_hash, code.clone())?;
                }
            }
            if !update.added_storage.is_empty() {
                let mut storage_trie = self.open_storage_trie(account_state.storage_root);
                for (key, value) in &update.added_storage {
                    let hashed_key = hash_key(key);
                    if value.is_zero() {
                        storage_trie.remove(hashed_key)?;
                    } else {
                        storage_trie.insert(hashed_key, value.encode_to_vec())?;
                    }
                }
                account_state.storage_root = storage_trie.hash()?;
            }
            state_trie.insert(hashed_address, account_state.encode_to_vec())?;
        }
        Ok(())
    }

    /// Reads an account record from the state rooted at `state_root`.
    pub fn get_account_state(
        &self,
        state_root: H256,
        address: &Address,
    ) -> Result<Option<AccountState>, StoreError> {
        let state_trie = self.open_state_trie(state_root);
        let Some(encoded) = state_trie.get(&hash_address(address))? else {
            return Ok(None);
        };
        Ok(Some(AccountState::decode(&encoded)?))
    }

    /// Reads one storage slot of an account in the state rooted at
    /// `state_root`. Absent slots read as zero upstream.
    pub fn get_storage_value(
        &self,
        state_root: H256,
        address: &Address,
        key: &H256,
    ) -> Result<Option<U256>, StoreError> {
        let Some(account) = self.get_account_state(state_root, address)? else {
            return Ok(None);
        };
        let storage_trie = self.open_storage_trie(account.storage_root);
        let Some(encoded) = storage_trie.get(&hash_key(key))? else {
            return Ok(None);
        };
        Ok(Some(U256::decode(&encoded)?))
    }
}
