//! The validator bundle the block executor consults before and during
//! execution. Each validator is a pure predicate; swapping one out (e.g. to
//! add a proof-of-work seal check on top of the difficulty formula) does not
//! touch the executor.

use ember_common::{
    constants::MAX_OMMER_DEPTH,
    types::{AccountState, Block, BlockHeader, ChainConfig, Transaction},
    validation::{InvalidBlockError, validate_block_header},
};
use ember_storage::Store;

use crate::error::ChainError;

pub trait HeaderValidator {
    fn validate(
        &self,
        header: &BlockHeader,
        parent: &BlockHeader,
        config: &ChainConfig,
    ) -> Result<(), InvalidBlockError>;
}

/// Header/body consistency.
pub trait BlockValidator {
    fn validate(&self, block: &Block) -> Result<(), InvalidBlockError>;
}

pub trait OmmersValidator {
    fn validate(&self, block: &Block, store: &Store) -> Result<(), ChainError>;
}

pub trait TransactionValidator {
    #[allow(clippy::too_many_arguments)]
    fn validate(
        &self,
        tx: &Transaction,
        sender_account: &AccountState,
        header: &BlockHeader,
        accumulated_gas: u64,
        config: &ChainConfig,
    ) -> Result<(), ChainError>;
}

pub struct Validators {
    pub header: Box<dyn HeaderValidator>,
    pub block: Box<dyn BlockValidator>,
    pub ommers: Box<dyn OmmersValidator>,
    pub transaction: Box<dyn TransactionValidator>,
}

impl Default for Validators {
    fn default() -> Self {
        Self {
            header: Box::new(StandardHeaderValidator),
            block: Box::new(StandardBlockValidator),
            ommers: Box::new(StandardOmmersValidator),
            transaction: Box::new(StandardTransactionValidator),
        }
    }
}

/// Difficulty formula, gas limit drift, timestamps, number sequence and
/// extra-data bound. The PoW seal itself needs an ethash collaborator and is
/// layered on by embedders that have one.
pub struct StandardHeaderValidator;

impl HeaderValidator for StandardHeaderValidator {
    fn validate(
        &self,
        header: &BlockHeader,
        parent: &BlockHeader,
        config: &ChainConfig,
    ) -> Result<(), InvalidBlockError> {
        validate_block_header(header, parent, config)
    }
}

pub struct StandardBlockValidator;

impl BlockValidator for StandardBlockValidator {
    fn validate(&self, block: &Block) -> Result<(), InvalidBlockError> {
        if block.header.transactions_root != block.body.compute_transactions_root() {
            return Err(InvalidBlockError::TransactionsRootMismatch);
        }
        if block.header.ommers_hash != block.body.compute_ommers_hash() {
            return Err(InvalidBlockError::OmmersHashMismatch);
        }
        Ok(())
    }
}

/// At most two ommers, each a valid header whose parent is one of the six
/// ancestors preceding this block, and none already included.
pub struct StandardOmmersValidator;

impl OmmersValidator for StandardOmmersValidator {
    fn validate(&self, block: &Block, store: &Store) -> Result<(), ChainError> {
        if block.body.ommers.is_empty() {
            return Ok(());
        }
        if block.body.ommers.len() > 2 {
            return Err(InvalidBlockError::InvalidOmmer("more than two ommers".into()).into());
        }

        // Walk the ancestor chain once, remembering hashes and the ommers
        // each ancestor already included.
        let config = store.get_chain_config()?;
        let mut ancestor_hashes = Vec::new();
        let mut included_ommers = Vec::new();
        let mut hash = block.header.parent_hash;
        for _ in 0..MAX_OMMER_DEPTH {
            ancestor_hashes.push(hash);
            let Some(header) = store.get_block_header_by_hash(hash)? else {
                break;
            };
            if let Some(body) = store.get_block_body_by_hash(hash)? {
                included_ommers
                    .extend(body.ommers.iter().map(BlockHeader::compute_block_hash));
            }
            if header.number == 0 {
                break;
            }
            hash = header.parent_hash;
        }

        for ommer in &block.body.ommers {
            let ommer_hash = ommer.compute_block_hash();
            if ommer_hash == block.header.parent_hash
                || ancestor_hashes.contains(&ommer_hash)
            {
                return Err(
                    InvalidBlockError::InvalidOmmer("ommer is a direct ancestor".into()).into(),
                );
            }
            if included_ommers.contains(&ommer_hash) {
                return Err(
                    InvalidBlockError::InvalidOmmer("ommer already included".into()).into(),
                );
            }
            // The ommer's parent must be a known ancestor at most six
            // generations back
            if !ancestor_hashes.contains(&ommer.parent_hash) {
                return Err(InvalidBlockError::InvalidOmmer(
                    "ommer parent is not a recent ancestor".into(),
                )
                .into());
            }
            let Some(ommer_parent) = store.get_block_header_by_hash(ommer.parent_hash)? else {
                return Err(
                    InvalidBlockError::InvalidOmmer("ommer parent unknown".into()).into(),
                );
            };
            validate_block_header(ommer, &ommer_parent, &config)
                .map_err(|e| InvalidBlockError::InvalidOmmer(e.to_string()))?;
        }
        Ok(())
    }
}

pub struct StandardTransactionValidator;

impl TransactionValidator for StandardTransactionValidator {
    fn validate(
        &self,
        tx: &Transaction,
        sender_account: &AccountState,
        header: &BlockHeader,
        accumulated_gas: u64,
        config: &ChainConfig,
    ) -> Result<(), ChainError> {
        // Chain binding: before EIP-155 only legacy v values are valid,
        // after it a bound signature must name this chain
        match tx.chain_id() {
            Some(chain_id) => {
                if !config.is_eip155_activated(header.number) {
                    return Err(ChainError::InvalidTransaction(
                        "chain-bound signature before EIP-155".to_string(),
                    ));
                }
                if chain_id != config.chain_id {
                    return Err(ChainError::InvalidTransaction(format!(
                        "signature bound to chain {chain_id}, expected {}",
                        config.chain_id
                    )));
                }
            }
            None => {
                let v = tx.v.as_u64();
                if v != 27 && v != 28 {
                    return Err(ChainError::InvalidTransaction(
                        "invalid signature v value".to_string(),
                    ));
                }
            }
        }
        if tx.nonce != sender_account.nonce {
            return Err(ChainError::InvalidTransaction(format!(
                "nonce {} does not match account nonce {}",
                tx.nonce, sender_account.nonce
            )));
        }
        let fork = config.fork(header.number);
        let intrinsic = ember_vm::schedule::Schedule::from_fork(fork)
            .intrinsic_gas(&tx.data, tx.is_contract_creation());
        if tx.gas < intrinsic {
            return Err(ChainError::InvalidTransaction(format!(
                "gas limit {} below intrinsic cost {intrinsic}",
                tx.gas
            )));
        }
        if tx.up_front_cost() > sender_account.balance {
            return Err(ChainError::InvalidTransaction(
                "balance below up-front cost".to_string(),
            ));
        }
        let block_gas = accumulated_gas
            .checked_add(tx.gas)
            .ok_or_else(|| ChainError::InvalidTransaction("block gas overflow".to_string()))?;
        if block_gas > header.gas_limit {
            return Err(ChainError::InvalidTransaction(
                "transaction exceeds block gas limit".to_string(),
            ));
        }
        Ok(())
    }
}
