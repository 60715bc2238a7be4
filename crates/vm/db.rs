//! The transactional world-state proxy: a write-back cache of accounts over
//! a read-only view of committed state, with checkpointing for the CALL
//! family and state-transition extraction for persistence.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use thiserror::Error;

use ember_common::types::{AccountInfo, AccountUpdate, code_hash};
use ember_rlp::structs::Encoder;

use crate::errors::VMError;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct DatabaseError(pub String);

/// Read-only view of committed world state, usually backed by the state trie
/// at the parent block's root.
pub trait Database {
    fn get_account_info(&self, address: Address) -> Result<Option<AccountInfo>, DatabaseError>;
    fn get_account_code(&self, code_hash: H256) -> Result<Bytes, DatabaseError>;
    fn get_storage_value(&self, address: Address, key: H256)
    -> Result<Option<U256>, DatabaseError>;
    fn get_block_hash(&self, block_number: u64) -> Result<Option<H256>, DatabaseError>;
}

/// In-memory account as the VM operates on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Account {
    pub info: AccountInfo,
    pub code: Bytes,
    pub storage: HashMap<H256, U256>,
}

impl Account {
    pub fn with_balance(mut self, balance: U256) -> Self {
        self.info.balance = balance;
        self
    }

    pub fn with_bytecode(mut self, code: Bytes) -> Self {
        self.info.code_hash = code_hash(&code);
        self.code = code;
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.info.nonce = nonce;
        self
    }

    pub fn with_storage(mut self, storage: HashMap<H256, U256>) -> Self {
        self.storage = storage;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }
}

/// Simple [`Database`] over maps, used by tests and standalone runs.
#[derive(Debug, Default)]
pub struct InMemoryDb {
    pub accounts: HashMap<Address, Account>,
    pub block_hashes: HashMap<u64, H256>,
}

impl InMemoryDb {
    pub fn with_account(mut self, address: Address, account: Account) -> Self {
        self.accounts.insert(address, account);
        self
    }
}

impl Database for InMemoryDb {
    fn get_account_info(&self, address: Address) -> Result<Option<AccountInfo>, DatabaseError> {
        Ok(self.accounts.get(&address).map(|account| account.info.clone()))
    }

    fn get_account_code(&self, code_hash: H256) -> Result<Bytes, DatabaseError> {
        Ok(self
            .accounts
            .values()
            .find(|account| account.info.code_hash == code_hash)
            .map(|account| account.code.clone())
            .unwrap_or_default())
    }

    fn get_storage_value(
        &self,
        address: Address,
        key: H256,
    ) -> Result<Option<U256>, DatabaseError> {
        Ok(self
            .accounts
            .get(&address)
            .and_then(|account| account.storage.get(&key))
            .copied())
    }

    fn get_block_hash(&self, block_number: u64) -> Result<Option<H256>, DatabaseError> {
        Ok(self.block_hashes.get(&block_number).copied())
    }
}

/// Snapshot of the mutable parts of the world proxy, restored when a nested
/// call fails.
#[derive(Debug, Clone)]
pub struct StateCheckpoint {
    cache: HashMap<Address, Account>,
    touched: HashSet<Address>,
}

/// The world-state proxy itself.
///
/// Reads fall through the cache to the backing [`Database`]; writes only ever
/// land in the cache. At the end of a transaction
/// [`WorldState::get_state_transitions`] turns the cache into account updates
/// for the store to persist.
pub struct WorldState {
    db: Arc<dyn Database>,
    cache: HashMap<Address, Account>,
    /// Accounts touched by value transfer or mutation, the candidates for
    /// the empty-account sweep.
    touched: HashSet<Address>,
    /// Accounts to delete when the transaction ends.
    destroyed: HashSet<Address>,
    /// Whether the backing database knows each cached address.
    existed_in_db: HashMap<Address, bool>,
    /// Committed value of each storage slot read or written, for refund
    /// accounting and state-transition extraction.
    original_storage: HashMap<(Address, H256), U256>,
}

impl WorldState {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            cache: HashMap::new(),
            touched: HashSet::new(),
            destroyed: HashSet::new(),
            existed_in_db: HashMap::new(),
            original_storage: HashMap::new(),
        }
    }

    /// Address of a contract created by `sender` with the given nonce:
    /// `keccak256(rlp([sender, nonce]))[12..]`.
    pub fn create_address(sender: Address, nonce: u64) -> Address {
        let mut buf = Vec::new();
        Encoder::new(&mut buf)
            .encode_field(&sender)
            .encode_field(&nonce)
            .finish();
        let hash = ember_common::keccak(&buf);
        Address::from_slice(&hash.0[12..])
    }

    fn ensure_loaded(&mut self, address: Address) -> Result<(), VMError> {
        if self.cache.contains_key(&address) {
            return Ok(());
        }
        let (account, existed) = match self
            .db
            .get_account_info(address)
            .map_err(|e| VMError::Database(e.to_string()))?
        {
            Some(info) => {
                let code = if info.has_code() {
                    self.db
                        .get_account_code(info.code_hash)
                        .map_err(|e| VMError::Database(e.to_string()))?
                } else {
                    Bytes::new()
                };
                (
                    Account {
                        info,
                        code,
                        storage: HashMap::new(),
                    },
                    true,
                )
            }
            None => (Account::default(), false),
        };
        self.existed_in_db.entry(address).or_insert(existed);
        self.cache.insert(address, account);
        Ok(())
    }

    /// Puts an account straight into the cache, e.g. for test setup.
    pub fn add_account(&mut self, address: Address, account: Account) {
        self.existed_in_db.insert(address, true);
        self.cache.insert(address, account);
    }

    pub fn get_account(&mut self, address: Address) -> Result<&Account, VMError> {
        self.ensure_loaded(address)?;
        self.cache
            .get(&address)
            .ok_or(VMError::Internal("account just loaded is missing"))
    }

    /// Mutable account access; marks the account as touched.
    pub fn get_account_mut(&mut self, address: Address) -> Result<&mut Account, VMError> {
        self.ensure_loaded(address)?;
        self.touched.insert(address);
        self.cache
            .get_mut(&address)
            .ok_or(VMError::Internal("account just loaded is missing"))
    }

    /// True when the address is known to the committed state or was brought
    /// to life during this transaction.
    pub fn account_exists(&mut self, address: Address) -> Result<bool, VMError> {
        self.ensure_loaded(address)?;
        let existed = self.existed_in_db.get(&address).copied().unwrap_or(false);
        let empty = self.get_account(address)?.is_empty();
        Ok(existed || !empty || self.touched.contains(&address))
    }

    /// Empty as defined by EIP-161.
    pub fn account_is_empty(&mut self, address: Address) -> Result<bool, VMError> {
        Ok(self.get_account(address)?.is_empty())
    }

    pub fn get_balance(&mut self, address: Address) -> Result<U256, VMError> {
        Ok(self.get_account(address)?.info.balance)
    }

    pub fn get_nonce(&mut self, address: Address) -> Result<u64, VMError> {
        Ok(self.get_account(address)?.info.nonce)
    }

    pub fn increment_nonce(&mut self, address: Address) -> Result<(), VMError> {
        let account = self.get_account_mut(address)?;
        account.info.nonce = account
            .info
            .nonce
            .checked_add(1)
            .ok_or(VMError::Internal("nonce overflow"))?;
        Ok(())
    }

    pub fn increase_balance(&mut self, address: Address, value: U256) -> Result<(), VMError> {
        let account = self.get_account_mut(address)?;
        account.info.balance = account
            .info
            .balance
            .checked_add(value)
            .ok_or(VMError::Internal("balance overflow"))?;
        Ok(())
    }

    pub fn decrease_balance(&mut self, address: Address, value: U256) -> Result<(), VMError> {
        let account = self.get_account_mut(address)?;
        account.info.balance = account
            .info
            .balance
            .checked_sub(value)
            .ok_or(VMError::Internal("balance underflow"))?;
        Ok(())
    }

    /// Moves `value` wei, creating the receiver as an empty account when
    /// absent. Callers check the sender balance beforehand.
    pub fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), VMError> {
        self.decrease_balance(from, value)?;
        self.increase_balance(to, value)
    }

    pub fn get_code(&mut self, address: Address) -> Result<Bytes, VMError> {
        Ok(self.get_account(address)?.code.clone())
    }

    pub fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), VMError> {
        let account = self.get_account_mut(address)?;
        account.info.code_hash = code_hash(&code);
        account.code = code;
        Ok(())
    }

    /// Current value of a storage slot, reading through to the committed
    /// state on first access.
    pub fn get_storage_value(&mut self, address: Address, key: H256) -> Result<U256, VMError> {
        self.ensure_loaded(address)?;
        if let Some(value) = self
            .cache
            .get(&address)
            .and_then(|account| account.storage.get(&key))
        {
            return Ok(*value);
        }
        let committed = self
            .db
            .get_storage_value(address, key)
            .map_err(|e| VMError::Database(e.to_string()))?
            .unwrap_or_default();
        self.original_storage.insert((address, key), committed);
        if let Some(account) = self.cache.get_mut(&address) {
            account.storage.insert(key, committed);
        }
        Ok(committed)
    }

    pub fn set_storage_value(
        &mut self,
        address: Address,
        key: H256,
        value: U256,
    ) -> Result<(), VMError> {
        // Pull the committed value into the caches first
        self.get_storage_value(address, key)?;
        let account = self.get_account_mut(address)?;
        account.storage.insert(key, value);
        Ok(())
    }

    /// Value the slot had at the start of the transaction. Test accounts
    /// inserted with pre-set storage count as committed state.
    pub fn get_original_storage_value(
        &mut self,
        address: Address,
        key: H256,
    ) -> Result<U256, VMError> {
        if let Some(original) = self.original_storage.get(&(address, key)) {
            return Ok(*original);
        }
        self.get_storage_value(address, key)
    }

    pub fn get_block_hash(&self, block_number: u64) -> Result<Option<H256>, VMError> {
        self.db
            .get_block_hash(block_number)
            .map_err(|e| VMError::Database(e.to_string()))
    }

    pub fn checkpoint(&self) -> StateCheckpoint {
        StateCheckpoint {
            cache: self.cache.clone(),
            touched: self.touched.clone(),
        }
    }

    pub fn revert_to(&mut self, checkpoint: StateCheckpoint) {
        self.cache = checkpoint.cache;
        self.touched = checkpoint.touched;
    }

    /// Schedules an account for deletion at the end of the transaction.
    pub fn mark_destroyed(&mut self, address: Address) {
        self.destroyed.insert(address);
    }

    /// Addresses touched during execution, the empty-account sweep input.
    pub fn touched_addresses(&self) -> Vec<Address> {
        self.touched.iter().copied().collect()
    }

    /// Extracts the per-account deltas accumulated by this transaction, to
    /// be materialized into the tries by the store.
    pub fn get_state_transitions(&self) -> Vec<AccountUpdate> {
        let mut updates = Vec::new();
        for (address, account) in &self.cache {
            let existed = self.existed_in_db.get(address).copied().unwrap_or(true);
            if self.destroyed.contains(address) {
                if existed {
                    updates.push(AccountUpdate::removed(*address));
                }
                continue;
            }
            let mut update = AccountUpdate::new(*address);
            update.info = Some(account.info.clone());
            if account.info.has_code() {
                update.code = Some(account.code.clone());
            }
            for (key, value) in &account.storage {
                let original = self
                    .original_storage
                    .get(&(*address, *key))
                    .copied()
                    .unwrap_or_default();
                if *value != original {
                    update.added_storage.insert(*key, *value);
                }
            }
            // Accounts that were only ever read never come into existence
            if !existed
                && account.is_empty()
                && update.added_storage.is_empty()
                && !self.touched.contains(address)
            {
                continue;
            }
            updates.push(update);
        }
        updates.sort_by_key(|update| update.address);
        updates
    }
}
