use bytes::Bytes;
use ethereum_types::{Address, U256};

use crate::{
    OpcodeResult, VM, word_to_address,
    call_frame::CallFrame,
    db::WorldState,
    errors::VMError,
    memory::checked_usize,
    precompiles::{execute_precompile, is_precompile},
};

impl VM {
    pub(crate) fn op_stop(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.output = Bytes::new();
        Ok(OpcodeResult::Halt)
    }

    pub(crate) fn op_return(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let offset = checked_usize(frame.stack.pop()?)?;
        let size = checked_usize(frame.stack.pop()?)?;
        let cost = frame.memory.expansion_cost(offset, size)?;
        frame.increase_consumed_gas(cost)?;
        frame.output = Bytes::from(frame.memory.load_range(offset, size));
        Ok(OpcodeResult::Halt)
    }

    pub(crate) fn op_call(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let gas = frame.stack.pop()?;
        let callee = word_to_address(frame.stack.pop()?);
        let value = frame.stack.pop()?;
        let args_offset = checked_usize(frame.stack.pop()?)?;
        let args_size = checked_usize(frame.stack.pop()?)?;
        let ret_offset = checked_usize(frame.stack.pop()?)?;
        let ret_size = checked_usize(frame.stack.pop()?)?;
        let msg_sender = frame.to;
        self.generic_call(
            frame,
            gas,
            callee,
            callee,
            msg_sender,
            value,
            true,
            true,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        )
    }

    // Runs the callee's code against the caller's own storage and balance.
    pub(crate) fn op_callcode(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let gas = frame.stack.pop()?;
        let code_source = word_to_address(frame.stack.pop()?);
        let value = frame.stack.pop()?;
        let args_offset = checked_usize(frame.stack.pop()?)?;
        let args_size = checked_usize(frame.stack.pop()?)?;
        let ret_offset = checked_usize(frame.stack.pop()?)?;
        let ret_size = checked_usize(frame.stack.pop()?)?;
        let owner = frame.to;
        self.generic_call(
            frame,
            gas,
            code_source,
            owner,
            owner,
            value,
            false,
            true,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        )
    }

    // Like CALLCODE but also inherits the parent's caller and value.
    pub(crate) fn op_delegatecall(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        if !self.env.schedule.have_delegate_call {
            return Err(VMError::InvalidOpcode(0xf4));
        }
        let gas = frame.stack.pop()?;
        let code_source = word_to_address(frame.stack.pop()?);
        let args_offset = checked_usize(frame.stack.pop()?)?;
        let args_size = checked_usize(frame.stack.pop()?)?;
        let ret_offset = checked_usize(frame.stack.pop()?)?;
        let ret_size = checked_usize(frame.stack.pop()?)?;
        let owner = frame.to;
        let parent_caller = frame.msg_sender;
        let parent_value = frame.msg_value;
        self.generic_call(
            frame,
            gas,
            code_source,
            owner,
            parent_caller,
            parent_value,
            false,
            false,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        )
    }

    /// Shared CALL/CALLCODE/DELEGATECALL machinery.
    ///
    /// `value` is the callee's CALLVALUE; it is transferred only for CALL
    /// (`transfers_value`) and charged/balance-checked for CALL and CALLCODE
    /// (`accounts_value`). Failure by depth or balance pushes 0 and hands the
    /// forwarded gas back; failure inside the callee consumes it.
    #[allow(clippy::too_many_arguments)]
    fn generic_call(
        &mut self,
        frame: &mut CallFrame,
        gas: U256,
        code_address: Address,
        to: Address,
        msg_sender: Address,
        value: U256,
        transfers_value: bool,
        accounts_value: bool,
        args_offset: usize,
        args_size: usize,
        ret_offset: usize,
        ret_size: usize,
    ) -> Result<OpcodeResult, VMError> {
        let schedule = self.env.schedule.clone();
        let with_value = accounts_value && !value.is_zero();

        let memory_cost = frame
            .memory
            .expansion_cost(args_offset, args_size)?
            .max(frame.memory.expansion_cost(ret_offset, ret_size)?);
        let value_cost = if with_value {
            schedule.call_value_transfer_gas
        } else {
            0
        };
        let new_account_cost = if transfers_value && !value.is_zero() && !is_precompile(&to) {
            let fresh = if schedule.kill_empty {
                !self.db.account_exists(to)? || self.db.account_is_empty(to)?
            } else {
                !self.db.account_exists(to)?
            };
            if fresh { schedule.call_new_account_gas } else { 0 }
        } else {
            0
        };
        frame.increase_consumed_gas(
            schedule.call_gas + value_cost + new_account_cost + memory_cost,
        )?;

        // EIP-150: forward at most 63/64 of what remains; before it, asking
        // for more than remains is an out-of-gas error.
        let requested = if gas > U256::from(u64::MAX) {
            u64::MAX
        } else {
            gas.as_u64()
        };
        let forwarded = match schedule.sub_gas_cap_divisor {
            Some(divisor) => requested.min(frame.gas_remaining - frame.gas_remaining / divisor),
            None => {
                if requested > frame.gas_remaining {
                    return Err(VMError::OutOfGas);
                }
                requested
            }
        };
        frame.increase_consumed_gas(forwarded)?;
        // The stipend reaches the callee without being charged to the caller
        let child_gas = if with_value {
            forwarded + schedule.call_stipend
        } else {
            forwarded
        };

        if frame.depth + 1 > schedule.max_depth {
            frame.gas_remaining += child_gas;
            frame.stack.push(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }
        if with_value && self.db.get_balance(frame.to)? < value {
            frame.gas_remaining += child_gas;
            frame.stack.push(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }

        let calldata = Bytes::from(frame.memory.load_range(args_offset, args_size));
        frame.memory.touch(ret_offset, ret_size);

        let checkpoint = self.db.checkpoint();
        self.substate.push_backup();
        if transfers_value && !value.is_zero() {
            self.db.transfer(frame.to, to, value)?;
        } else if schedule.kill_empty && transfers_value {
            // A zero-value call still touches the callee for the sweep
            self.db.get_account_mut(to)?;
        }

        if is_precompile(&code_address) {
            return match execute_precompile(code_address, &calldata, child_gas) {
                Ok((output, cost)) => {
                    self.substate.commit_backup();
                    frame.gas_remaining += child_gas - cost;
                    let copied = output.len().min(ret_size);
                    frame.memory.store_data(ret_offset, &output[..copied]);
                    frame.returndata = output;
                    frame.stack.push(U256::one())?;
                    Ok(OpcodeResult::Continue)
                }
                Err(error) if error.is_vm_failure() => {
                    self.db.revert_to(checkpoint);
                    self.substate.revert_backup();
                    frame.stack.push(U256::zero())?;
                    Ok(OpcodeResult::Continue)
                }
                Err(fatal) => Err(fatal),
            };
        }

        let code = self.db.get_code(code_address)?;
        let mut child_frame = CallFrame::new(
            msg_sender,
            to,
            code_address,
            code,
            value,
            calldata,
            child_gas,
            frame.depth + 1,
            false,
        );

        match self.run_execution(&mut child_frame) {
            Ok(output) => {
                self.substate.commit_backup();
                frame.gas_remaining += child_frame.gas_remaining;
                let copied = output.len().min(ret_size);
                frame.memory.store_data(ret_offset, &output[..copied]);
                frame.returndata = output;
                frame.stack.push(U256::one())?;
                Ok(OpcodeResult::Continue)
            }
            Err(error) if error.is_vm_failure() => {
                self.db.revert_to(checkpoint);
                self.substate.revert_backup();
                frame.stack.push(U256::zero())?;
                Ok(OpcodeResult::Continue)
            }
            Err(fatal) => Err(fatal),
        }
    }

    pub(crate) fn op_create(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let schedule = self.env.schedule.clone();
        let value = frame.stack.pop()?;
        let offset = checked_usize(frame.stack.pop()?)?;
        let size = checked_usize(frame.stack.pop()?)?;

        let cost = schedule.create_gas + frame.memory.expansion_cost(offset, size)?;
        frame.increase_consumed_gas(cost)?;
        let init_code = Bytes::from(frame.memory.load_range(offset, size));

        let child_gas = match schedule.sub_gas_cap_divisor {
            Some(divisor) => frame.gas_remaining - frame.gas_remaining / divisor,
            None => frame.gas_remaining,
        };
        frame.increase_consumed_gas(child_gas)?;

        if frame.depth + 1 > schedule.max_depth {
            frame.gas_remaining += child_gas;
            frame.stack.push(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }
        if self.db.get_balance(frame.to)? < value {
            frame.gas_remaining += child_gas;
            frame.stack.push(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }

        let creator_nonce = self.db.get_nonce(frame.to)?;
        self.db.increment_nonce(frame.to)?;
        let new_address = WorldState::create_address(frame.to, creator_nonce);

        let checkpoint = self.db.checkpoint();
        self.substate.push_backup();
        self.db.get_account_mut(new_address)?.info.nonce = schedule.contract_initial_nonce;
        self.db.transfer(frame.to, new_address, value)?;

        let mut child_frame = CallFrame::new(
            frame.to,
            new_address,
            new_address,
            init_code,
            value,
            Bytes::new(),
            child_gas,
            frame.depth + 1,
            true,
        );

        match self.run_execution(&mut child_frame) {
            Ok(code) => {
                let too_large = schedule
                    .create_data_limit
                    .is_some_and(|limit| code.len() > limit);
                let deposit_cost = schedule.create_data_gas * code.len() as u64;
                if too_large
                    || (child_frame.gas_remaining < deposit_cost
                        && schedule.exceptional_failed_code_deposit)
                {
                    self.db.revert_to(checkpoint);
                    self.substate.revert_backup();
                    frame.stack.push(U256::zero())?;
                    return Ok(OpcodeResult::Continue);
                }
                if child_frame.gas_remaining >= deposit_cost {
                    child_frame.gas_remaining -= deposit_cost;
                    self.db.set_code(new_address, code)?;
                }
                self.substate.commit_backup();
                frame.gas_remaining += child_frame.gas_remaining;
                frame
                    .stack
                    .push(U256::from_big_endian(new_address.as_bytes()))?;
                Ok(OpcodeResult::Continue)
            }
            Err(error) if error.is_vm_failure() => {
                self.db.revert_to(checkpoint);
                self.substate.revert_backup();
                frame.stack.push(U256::zero())?;
                Ok(OpcodeResult::Continue)
            }
            Err(fatal) => Err(fatal),
        }
    }

    // Transfers the whole balance to the beneficiary and schedules the
    // account for deletion at the end of the transaction.
    pub(crate) fn op_suicide(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let schedule = self.env.schedule.clone();
        let beneficiary = word_to_address(frame.stack.pop()?);

        let balance = self.db.get_balance(frame.to)?;
        let new_account_cost = if schedule.suicide_gas > 0 {
            let fresh = if schedule.kill_empty {
                !balance.is_zero()
                    && (!self.db.account_exists(beneficiary)?
                        || self.db.account_is_empty(beneficiary)?)
            } else {
                !self.db.account_exists(beneficiary)?
            };
            if fresh { schedule.call_new_account_gas } else { 0 }
        } else {
            0
        };
        frame.increase_consumed_gas(schedule.suicide_gas + new_account_cost)?;

        if !self.substate.add_selfdestruct(frame.to) {
            self.substate.add_refund(schedule.suicide_refund_gas);
        }
        self.db.increase_balance(beneficiary, balance)?;
        self.db.decrease_balance(frame.to, balance)?;

        frame.output = Bytes::new();
        Ok(OpcodeResult::Halt)
    }
}
