//! The block executor: validates a candidate block against its parent,
//! applies every transaction in order, pays out rewards and checks the
//! resulting roots against the header before persisting anything.

pub mod error;
#[cfg(test)]
mod smoke_test;
pub mod validators;
pub mod vm;

use std::sync::Arc;

use ethereum_types::{Address, Bloom, H256, U256};
use tracing::{debug, info};

use ember_common::{
    types::{
        AccountState, AccountUpdate, Block, BlockHeader, ChainConfig, Receipt,
        compute_receipts_root, hash_address,
    },
    validation::InvalidBlockError,
};
use ember_rlp::decode::RLPDecode;
use ember_storage::Store;
use ember_trie::Trie;
use ember_vm::{VM, db::WorldState, environment::Environment};

use error::ChainError;
use validators::Validators;
use vm::StoreVmDatabase;

/// Executes a block on top of its parent's post-state and, when every check
/// passes, persists the block, its receipts and the new canonical head into
/// the store. Any error leaves the chain state of the store unchanged.
pub fn execute_block(
    block: &Block,
    store: &Store,
    validators: &Validators,
) -> Result<(), ChainError> {
    let block_hash = block.hash();
    let Some(parent_header) = store.get_block_header_by_hash(block.header.parent_hash)? else {
        return Err(ChainError::ParentNotFound);
    };
    let config = store.get_chain_config()?;

    // Pre-validation: header against parent, body consistency, ommers
    validators
        .header
        .validate(&block.header, &parent_header, &config)?;
    validators.block.validate(block)?;
    validators.ommers.validate(block, store)?;

    let mut state_trie = store.open_state_trie(parent_header.state_root);
    let mut current_root = parent_header.state_root;
    let mut accumulated_gas = 0u64;
    let mut receipts = Vec::with_capacity(block.body.transactions.len());

    for (index, tx) in block.body.transactions.iter().enumerate() {
        let sender = tx.sender().map_err(|e| {
            ChainError::InvalidTransaction(format!("transaction {index}: {e}"))
        })?;
        let sender_account = store
            .get_account_state(current_root, &sender)?
            .ok_or_else(|| {
                ChainError::InvalidTransaction(format!("transaction {index}: unknown sender"))
            })?;
        validators.transaction.validate(
            tx,
            &sender_account,
            &block.header,
            accumulated_gas,
            &config,
        )?;

        let vm_db = StoreVmDatabase::new(store.clone(), current_root, block.header.parent_hash);
        let env = Environment::from_block_header(
            &block.header,
            &config,
            sender,
            tx.gas,
            tx.gas_price,
        );
        let mut vm = VM::new(env, WorldState::new(Arc::new(vm_db)));
        let report = vm.execute_transaction(tx, sender).map_err(ChainError::EvmError)?;
        debug!(
            "Executed transaction {index} of block {}: gas used {}, success: {}",
            block.header.number,
            report.gas_used,
            report.is_success()
        );

        let account_updates = vm.db.get_state_transitions();
        store.apply_account_updates(&mut state_trie, &account_updates)?;
        current_root = state_trie.hash()?;
        accumulated_gas += report.gas_used;
        receipts.push(Receipt::new(current_root, accumulated_gas, report.logs));
    }

    apply_block_rewards(block, store, &mut state_trie, &config)?;
    let final_root = state_trie.hash()?;

    // Post-validation: gas, roots and bloom must match the claimed header
    validate_gas_used(accumulated_gas, &block.header)?;
    validate_state_root(final_root, &block.header)?;
    validate_receipts_root(&receipts, &block.header)?;
    validate_logs_bloom(&receipts, &block.header)?;

    store.add_block(block.clone())?;
    store.add_receipts(block_hash, receipts)?;
    store.set_canonical_block(block.header.number, block_hash)?;
    info!(
        "Added block {} ({block_hash:#x}) with {} transactions",
        block.header.number,
        block.body.transactions.len()
    );
    Ok(())
}

/// Miner and ommer rewards (Yellow Paper §11.3). Credits create the target
/// account when it does not exist yet.
fn apply_block_rewards(
    block: &Block,
    store: &Store,
    state_trie: &mut Trie,
    config: &ChainConfig,
) -> Result<(), ChainError> {
    let base = config.block_reward;
    let block_number = block.header.number;

    let miner_reward =
        base + base * U256::from(block.body.ommers.len()) / U256::from(32);
    credit_account(store, state_trie, block.header.coinbase, miner_reward)?;

    for ommer in &block.body.ommers {
        let depth = U256::from(block_number - ommer.number);
        let ommer_reward = base - base * depth / U256::from(8);
        credit_account(store, state_trie, ommer.coinbase, ommer_reward)?;
    }
    Ok(())
}

fn credit_account(
    store: &Store,
    state_trie: &mut Trie,
    address: Address,
    amount: U256,
) -> Result<(), ChainError> {
    let account = match state_trie.get(&hash_address(&address))? {
        Some(encoded) => AccountState::decode(&encoded)?.into_info(),
        None => Default::default(),
    };
    let mut update = AccountUpdate::new(address);
    update.info = Some(ember_common::types::AccountInfo {
        balance: account.balance + amount,
        ..account
    });
    store.apply_account_updates(state_trie, &[update])?;
    Ok(())
}

fn validate_gas_used(accumulated_gas: u64, header: &BlockHeader) -> Result<(), ChainError> {
    if accumulated_gas != header.gas_used {
        return Err(InvalidBlockError::GasUsedMismatch(accumulated_gas, header.gas_used).into());
    }
    Ok(())
}

fn validate_state_root(state_root: H256, header: &BlockHeader) -> Result<(), ChainError> {
    if state_root != header.state_root {
        return Err(InvalidBlockError::StateRootMismatch.into());
    }
    Ok(())
}

fn validate_receipts_root(receipts: &[Receipt], header: &BlockHeader) -> Result<(), ChainError> {
    if compute_receipts_root(receipts) != header.receipts_root {
        return Err(InvalidBlockError::ReceiptsRootMismatch.into());
    }
    Ok(())
}

fn validate_logs_bloom(receipts: &[Receipt], header: &BlockHeader) -> Result<(), ChainError> {
    let mut bloom = Bloom::zero();
    for receipt in receipts {
        bloom.accrue_bloom(&receipt.bloom);
    }
    if bloom != header.logs_bloom {
        return Err(InvalidBlockError::LogsBloomMismatch.into());
    }
    Ok(())
}
