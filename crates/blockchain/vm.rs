use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

use ember_common::types::{AccountInfo, BlockHash};
use ember_storage::Store;
use ember_vm::db::{Database, DatabaseError};

/// Read-only [`Database`] view over the store, rooted at a given state root.
/// BLOCKHASH queries walk the header chain from the executing block's
/// parent.
#[derive(Clone)]
pub struct StoreVmDatabase {
    store: Store,
    state_root: H256,
    parent_hash: BlockHash,
}

impl StoreVmDatabase {
    pub fn new(store: Store, state_root: H256, parent_hash: BlockHash) -> Self {
        Self {
            store,
            state_root,
            parent_hash,
        }
    }
}

impl Database for StoreVmDatabase {
    fn get_account_info(&self, address: Address) -> Result<Option<AccountInfo>, DatabaseError> {
        let account = self
            .store
            .get_account_state(self.state_root, &address)
            .map_err(|e| DatabaseError(e.to_string()))?;
        Ok(account.map(|account| AccountInfo {
            nonce: account.nonce,
            balance: account.balance,
            code_hash: account.code_hash,
        }))
    }

    fn get_account_code(&self, code_hash: H256) -> Result<Bytes, DatabaseError> {
        Ok(self
            .store
            .get_account_code(code_hash)
            .map_err(|e| DatabaseError(e.to_string()))?
            .unwrap_or_default())
    }

    fn get_storage_value(
        &self,
        address: Address,
        key: H256,
    ) -> Result<Option<U256>, DatabaseError> {
        self.store
            .get_storage_value(self.state_root, &address, &key)
            .map_err(|e| DatabaseError(e.to_string()))
    }

    fn get_block_hash(&self, block_number: u64) -> Result<Option<H256>, DatabaseError> {
        let mut hash = self.parent_hash;
        loop {
            let Some(header) = self
                .store
                .get_block_header_by_hash(hash)
                .map_err(|e| DatabaseError(e.to_string()))?
            else {
                return Ok(None);
            };
            if header.number == block_number {
                return Ok(Some(hash));
            }
            if header.number < block_number || header.number == 0 {
                return Ok(None);
            }
            hash = header.parent_hash;
        }
    }
}
