//! Cost schedule and feature parameterisation of the EVM, resolved per fork.

use bytes::Bytes;
use ember_common::types::Fork;

use crate::constants::{MAX_CALL_DEPTH, STACK_LIMIT, TX_BASE_COST};

/// Gas prices and feature switches for one fork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Failing the code-deposit charge aborts the creation instead of
    /// leaving a codeless contract.
    pub exceptional_failed_code_deposit: bool,
    /// DELEGATECALL is available.
    pub have_delegate_call: bool,
    /// VM stack limit.
    pub stack_limit: usize,
    /// Max number of nested calls/creates.
    pub max_depth: usize,
    /// Cost of the cheapest tier of opcodes (ADDRESS, POP, ...).
    pub base_gas: u64,
    /// Cost of the very low tier (ADD, PUSH, DUP, ...).
    pub verylow_gas: u64,
    /// Cost of the low tier (MUL, DIV, ...).
    pub low_gas: u64,
    /// Cost of the mid tier (ADDMOD, JUMP, ...).
    pub mid_gas: u64,
    /// Cost of the high tier (JUMPI).
    pub high_gas: u64,
    /// Cost of EXP.
    pub exp_gas: u64,
    /// Additional EXP cost per byte of exponent.
    pub exp_byte_gas: u64,
    /// Cost of SHA3.
    pub sha3_gas: u64,
    /// Additional SHA3 cost per word hashed.
    pub sha3_word_gas: u64,
    /// Cost of SLOAD.
    pub sload_gas: u64,
    /// Cost of SSTORE writing a non-zero value to a zero slot.
    pub sstore_set_gas: u64,
    /// Cost of any other SSTORE.
    pub sstore_reset_gas: u64,
    /// Refund for clearing a storage slot.
    pub sstore_refund_gas: u64,
    /// Cost of JUMPDEST.
    pub jumpdest_gas: u64,
    /// Cost of LOGn.
    pub log_gas: u64,
    /// Additional LOG cost per data byte.
    pub log_data_gas: u64,
    /// Additional LOG cost per topic.
    pub log_topic_gas: u64,
    /// Cost of CREATE.
    pub create_gas: u64,
    /// Cost of the CALL family.
    pub call_gas: u64,
    /// Stipend handed to the callee on value-bearing calls.
    pub call_stipend: u64,
    /// Additional cost of transferring value with CALL/CALLCODE.
    pub call_value_transfer_gas: u64,
    /// Additional cost of calling into a fresh account.
    pub call_new_account_gas: u64,
    /// Cost of SUICIDE.
    pub suicide_gas: u64,
    /// Refund for SUICIDE.
    pub suicide_refund_gas: u64,
    /// Cost per memory word.
    pub memory_gas: u64,
    /// Divisor of the quadratic memory cost term.
    pub quad_coeff_div: u64,
    /// Cost per copied word (CALLDATACOPY, CODECOPY, EXTCODECOPY).
    pub copy_gas: u64,
    /// Cost per byte of deposited contract code.
    pub create_data_gas: u64,
    /// Maximum size of deposited contract code, when bounded.
    pub create_data_limit: Option<usize>,
    /// Base transaction cost.
    pub tx_gas: u64,
    /// Base cost of a create transaction.
    pub tx_create_gas: u64,
    /// Cost per zero byte of transaction data.
    pub tx_data_zero_gas: u64,
    /// Cost per non-zero byte of transaction data.
    pub tx_data_non_zero_gas: u64,
    /// Cost of EXTCODESIZE/EXTCODECOPY.
    pub extcode_gas: u64,
    /// Cost of BALANCE.
    pub balance_gas: u64,
    /// Cost of BLOCKHASH.
    pub blockhash_gas: u64,
    /// When set to `Some(n)`, a call forwards at most `gas * (n-1) / n` and
    /// a create forwards exactly that; when `None` a call requesting more
    /// gas than remains is an out-of-gas error.
    pub sub_gas_cap_divisor: Option<u64>,
    /// Touched empty accounts are deleted at the end of the transaction.
    pub kill_empty: bool,
    /// Contracts come into existence with nonce 1.
    pub contract_initial_nonce: u64,
}

impl Schedule {
    pub fn from_fork(fork: Fork) -> Schedule {
        match fork {
            Fork::Frontier => Schedule::frontier(),
            Fork::Homestead => Schedule::homestead(),
            Fork::Tangerine => Schedule::tangerine(),
            Fork::SpuriousDragon => Schedule::spurious_dragon(),
        }
    }

    pub fn frontier() -> Schedule {
        Schedule {
            exceptional_failed_code_deposit: false,
            have_delegate_call: false,
            stack_limit: STACK_LIMIT,
            max_depth: MAX_CALL_DEPTH,
            base_gas: 2,
            verylow_gas: 3,
            low_gas: 5,
            mid_gas: 8,
            high_gas: 10,
            exp_gas: 10,
            exp_byte_gas: 10,
            sha3_gas: 30,
            sha3_word_gas: 6,
            sload_gas: 50,
            sstore_set_gas: 20_000,
            sstore_reset_gas: 5000,
            sstore_refund_gas: 15_000,
            jumpdest_gas: 1,
            log_gas: 375,
            log_data_gas: 8,
            log_topic_gas: 375,
            create_gas: 32_000,
            call_gas: 40,
            call_stipend: 2300,
            call_value_transfer_gas: 9000,
            call_new_account_gas: 25_000,
            suicide_gas: 0,
            suicide_refund_gas: 24_000,
            memory_gas: 3,
            quad_coeff_div: 512,
            copy_gas: 3,
            create_data_gas: 200,
            create_data_limit: None,
            tx_gas: TX_BASE_COST,
            tx_create_gas: TX_BASE_COST,
            tx_data_zero_gas: 4,
            tx_data_non_zero_gas: 68,
            extcode_gas: 20,
            balance_gas: 20,
            blockhash_gas: 20,
            sub_gas_cap_divisor: None,
            kill_empty: false,
            contract_initial_nonce: 0,
        }
    }

    pub fn homestead() -> Schedule {
        Schedule {
            exceptional_failed_code_deposit: true,
            have_delegate_call: true,
            tx_create_gas: 53_000,
            ..Schedule::frontier()
        }
    }

    /// EIP-150 repricing of state-touching opcodes.
    pub fn tangerine() -> Schedule {
        Schedule {
            sload_gas: 200,
            balance_gas: 400,
            extcode_gas: 700,
            call_gas: 700,
            suicide_gas: 5000,
            sub_gas_cap_divisor: Some(64),
            ..Schedule::homestead()
        }
    }

    /// EIP-158/160/161/170.
    pub fn spurious_dragon() -> Schedule {
        Schedule {
            exp_byte_gas: 50,
            kill_empty: true,
            create_data_limit: Some(24_576),
            contract_initial_nonce: 1,
            ..Schedule::tangerine()
        }
    }

    /// Gas charged before the first byte of code runs.
    pub fn intrinsic_gas(&self, data: &Bytes, is_create: bool) -> u64 {
        let base = if is_create { self.tx_create_gas } else { self.tx_gas };
        let data_cost: u64 = data
            .iter()
            .map(|byte| {
                if *byte == 0 {
                    self.tx_data_zero_gas
                } else {
                    self.tx_data_non_zero_gas
                }
            })
            .sum();
        base + data_cost
    }
}
