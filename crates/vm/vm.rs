//! The execution VM: opcode interpreter, call/create machinery and the
//! single-transaction driver.

pub mod call_frame;
pub mod constants;
pub mod db;
pub mod environment;
pub mod errors;
pub mod memory;
pub mod opcode_handlers;
pub mod opcodes;
pub mod precompiles;
pub mod schedule;
pub mod substate;
pub mod utils;

use bytes::Bytes;
use ethereum_types::{Address, U256};

use ember_common::types::{Transaction, TxKind};

use crate::{
    call_frame::CallFrame,
    db::WorldState,
    environment::Environment,
    errors::{ExecutionReport, TxResult, VMError},
    precompiles::{execute_precompile, is_precompile},
    substate::Substate,
};

/// What an opcode handler tells the interpreter loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeResult {
    Continue,
    Halt,
}

/// The virtual machine: executes bytecode frames against the world-state
/// proxy, accumulating logs, refunds and pending deletions in the substate.
pub struct VM {
    /// Finished or prepared call frames; the frame being executed is handed
    /// to [`VM::execute`] by the caller.
    pub call_frames: Vec<CallFrame>,
    pub env: Environment,
    pub db: WorldState,
    pub substate: Substate,
}

impl VM {
    pub fn new(env: Environment, db: WorldState) -> Self {
        Self {
            call_frames: Vec::new(),
            env,
            db,
            substate: Substate::default(),
        }
    }

    /// Runs a prepared frame to completion and tracks the transaction's
    /// consumed gas. A VM error leaves the frame with zero gas remaining.
    pub fn execute(&mut self, frame: &mut CallFrame) -> Result<Bytes, VMError> {
        let result = self.run_execution(frame);
        match result {
            Ok(_) => self.env.consumed_gas += frame.gas_limit - frame.gas_remaining,
            Err(_) => self.env.consumed_gas += frame.gas_limit,
        }
        result
    }

    /// The interpreter loop. Returns the frame's output on STOP/RETURN and
    /// propagates VM errors after consuming the frame's remaining gas.
    fn run_execution(&mut self, frame: &mut CallFrame) -> Result<Bytes, VMError> {
        loop {
            let opcode = frame.next_opcode();
            frame.pc += 1;
            match self.execute_opcode(opcode, frame) {
                Ok(OpcodeResult::Continue) => continue,
                Ok(OpcodeResult::Halt) => return Ok(frame.output.clone()),
                Err(error) => {
                    frame.gas_remaining = 0;
                    return Err(error);
                }
            }
        }
    }

    fn execute_opcode(&mut self, opcode: u8, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        match opcode {
            0x00 => self.op_stop(frame),
            0x01 => self.op_add(frame),
            0x02 => self.op_mul(frame),
            0x03 => self.op_sub(frame),
            0x04 => self.op_div(frame),
            0x05 => self.op_sdiv(frame),
            0x06 => self.op_mod(frame),
            0x07 => self.op_smod(frame),
            0x08 => self.op_addmod(frame),
            0x09 => self.op_mulmod(frame),
            0x0a => self.op_exp(frame),
            0x0b => self.op_signextend(frame),
            0x10 => self.op_lt(frame),
            0x11 => self.op_gt(frame),
            0x12 => self.op_slt(frame),
            0x13 => self.op_sgt(frame),
            0x14 => self.op_eq(frame),
            0x15 => self.op_iszero(frame),
            0x16 => self.op_and(frame),
            0x17 => self.op_or(frame),
            0x18 => self.op_xor(frame),
            0x19 => self.op_not(frame),
            0x1a => self.op_byte(frame),
            0x1b => self.op_shl(frame),
            0x1c => self.op_shr(frame),
            0x1d => self.op_sar(frame),
            0x20 => self.op_sha3(frame),
            0x30 => self.op_address(frame),
            0x31 => self.op_balance(frame),
            0x32 => self.op_origin(frame),
            0x33 => self.op_caller(frame),
            0x34 => self.op_callvalue(frame),
            0x35 => self.op_calldataload(frame),
            0x36 => self.op_calldatasize(frame),
            0x37 => self.op_calldatacopy(frame),
            0x38 => self.op_codesize(frame),
            0x39 => self.op_codecopy(frame),
            0x3a => self.op_gasprice(frame),
            0x3b => self.op_extcodesize(frame),
            0x3c => self.op_extcodecopy(frame),
            0x40 => self.op_blockhash(frame),
            0x41 => self.op_coinbase(frame),
            0x42 => self.op_timestamp(frame),
            0x43 => self.op_number(frame),
            0x44 => self.op_difficulty(frame),
            0x45 => self.op_gaslimit(frame),
            0x50 => self.op_pop(frame),
            0x51 => self.op_mload(frame),
            0x52 => self.op_mstore(frame),
            0x53 => self.op_mstore8(frame),
            0x54 => self.op_sload(frame),
            0x55 => self.op_sstore(frame),
            0x56 => self.op_jump(frame),
            0x57 => self.op_jumpi(frame),
            0x58 => self.op_pc(frame),
            0x59 => self.op_msize(frame),
            0x5a => self.op_gas(frame),
            0x5b => self.op_jumpdest(frame),
            0x60..=0x7f => self.op_push(frame, (opcode - 0x5f) as usize),
            0x80..=0x8f => self.op_dup(frame, (opcode - 0x7f) as usize),
            0x90..=0x9f => self.op_swap(frame, (opcode - 0x8f) as usize),
            0xa0..=0xa4 => self.op_log(frame, (opcode - 0xa0) as usize),
            0xf0 => self.op_create(frame),
            0xf1 => self.op_call(frame),
            0xf2 => self.op_callcode(frame),
            0xf3 => self.op_return(frame),
            0xf4 => self.op_delegatecall(frame),
            0xff => self.op_suicide(frame),
            _ => Err(VMError::InvalidOpcode(opcode)),
        }
    }

    /// Executes a whole signed transaction: upfront debit, context
    /// preparation, program run, refund and fee settlement, and the
    /// deferred account sweeps. `sender` is the recovered signer, validated
    /// by the block executor.
    pub fn execute_transaction(
        &mut self,
        tx: &Transaction,
        sender: Address,
    ) -> Result<ExecutionReport, VMError> {
        let schedule = self.env.schedule.clone();

        // The upfront debit and the nonce bump survive a failing program
        let upfront_gas = U256::from(tx.gas) * tx.gas_price;
        self.db.decrease_balance(sender, upfront_gas)?;
        let sender_nonce = self.db.get_nonce(sender)?;
        self.db.increment_nonce(sender)?;
        let checkpoint = self.db.checkpoint();

        let intrinsic = schedule.intrinsic_gas(&tx.data, tx.is_contract_creation());
        let frame_gas = tx
            .gas
            .checked_sub(intrinsic)
            .ok_or(VMError::Internal("gas limit below intrinsic cost"))?;
        self.env.consumed_gas = intrinsic;

        let mut frame = match &tx.to {
            TxKind::Create => {
                let new_address = WorldState::create_address(sender, sender_nonce);
                self.db.get_account_mut(new_address)?.info.nonce =
                    schedule.contract_initial_nonce;
                self.db.transfer(sender, new_address, tx.value)?;
                CallFrame::new(
                    sender,
                    new_address,
                    new_address,
                    tx.data.clone(),
                    tx.value,
                    Bytes::new(),
                    frame_gas,
                    0,
                    true,
                )
            }
            TxKind::Call(to) => {
                self.db.transfer(sender, *to, tx.value)?;
                let code = self.db.get_code(*to)?;
                CallFrame::new(
                    sender,
                    *to,
                    *to,
                    code,
                    tx.value,
                    tx.data.clone(),
                    frame_gas,
                    0,
                    false,
                )
            }
        };

        let result = match &tx.to {
            TxKind::Call(to) if is_precompile(to) => {
                match execute_precompile(*to, &tx.data, frame_gas) {
                    Ok((output, cost)) => {
                        frame.gas_remaining = frame_gas - cost;
                        self.env.consumed_gas += cost;
                        Ok(output)
                    }
                    Err(error) => {
                        frame.gas_remaining = 0;
                        self.env.consumed_gas += frame_gas;
                        Err(error)
                    }
                }
            }
            _ => self.execute(&mut frame),
        };

        match result {
            Ok(mut output) => {
                if frame.is_create {
                    if let Err(error) = self.deposit_contract_code(&mut frame, &mut output) {
                        return self.finalize_failure(tx, checkpoint, error);
                    }
                }
                self.finalize_success(tx, sender, &frame, output)
            }
            Err(error) if error.is_vm_failure() => self.finalize_failure(tx, checkpoint, error),
            Err(fatal) => Err(fatal),
        }
    }

    // Charges the per-byte deposit for the code a creation returned. When it
    // cannot be paid, homestead onwards fails the creation while frontier
    // keeps the account with no code installed.
    fn deposit_contract_code(
        &mut self,
        frame: &mut CallFrame,
        output: &mut Bytes,
    ) -> Result<(), VMError> {
        let schedule = self.env.schedule.clone();
        if let Some(limit) = schedule.create_data_limit {
            if output.len() > limit {
                return Err(VMError::OutOfGas);
            }
        }
        let cost = schedule.create_data_gas * output.len() as u64;
        if frame.gas_remaining >= cost {
            frame.gas_remaining -= cost;
            self.env.consumed_gas += cost;
            self.db.set_code(frame.to, output.clone())?;
        } else if schedule.exceptional_failed_code_deposit {
            return Err(VMError::OutOfGas);
        } else {
            *output = Bytes::new();
        }
        Ok(())
    }

    fn finalize_success(
        &mut self,
        tx: &Transaction,
        sender: Address,
        frame: &CallFrame,
        output: Bytes,
    ) -> Result<ExecutionReport, VMError> {
        let gas_used_pre_refund = tx.gas - frame.gas_remaining;
        let refund = (gas_used_pre_refund / 2).min(self.substate.refunded_gas);
        let gas_used = gas_used_pre_refund - refund;

        // Unused and refunded gas back to the sender, fee to the miner
        self.db
            .increase_balance(sender, U256::from(tx.gas - gas_used) * tx.gas_price)?;
        self.db
            .increase_balance(self.env.coinbase, U256::from(gas_used) * tx.gas_price)?;
        self.env.consumed_gas = gas_used;

        for address in self.substate.selfdestruct_addresses() {
            self.db.mark_destroyed(address);
        }
        if self.env.schedule.kill_empty {
            for address in self.db.touched_addresses() {
                if self.db.account_is_empty(address)? {
                    self.db.mark_destroyed(address);
                }
            }
        }

        Ok(ExecutionReport {
            result: TxResult::Success,
            gas_used,
            gas_refunded: refund,
            output,
            logs: self.substate.extract_logs(),
        })
    }

    // A failed program is still a valid transaction: the state rolls back to
    // the post-debit checkpoint and the whole gas limit goes to the miner.
    fn finalize_failure(
        &mut self,
        tx: &Transaction,
        checkpoint: db::StateCheckpoint,
        error: VMError,
    ) -> Result<ExecutionReport, VMError> {
        self.db.revert_to(checkpoint);
        self.substate = Substate::default();
        self.db
            .increase_balance(self.env.coinbase, U256::from(tx.gas) * tx.gas_price)?;
        self.env.consumed_gas = tx.gas;
        Ok(ExecutionReport {
            result: TxResult::Revert(error),
            gas_used: tx.gas,
            gas_refunded: 0,
            output: Bytes::new(),
            logs: Vec::new(),
        })
    }
}

/// Interprets the low 20 bytes of a word as an address, as the CALL family
/// does with stack operands.
pub fn word_to_address(word: U256) -> Address {
    Address::from_slice(&word.to_big_endian()[12..])
}
