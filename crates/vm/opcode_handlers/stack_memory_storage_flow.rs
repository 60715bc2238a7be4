use ethereum_types::{H256, U256};

use crate::{
    OpcodeResult, VM,
    call_frame::CallFrame,
    errors::VMError,
    memory::checked_usize,
};

impl VM {
    pub(crate) fn op_pop(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        frame.stack.pop()?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_mload(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let offset = checked_usize(frame.stack.pop()?)?;
        let cost =
            self.env.schedule.verylow_gas + frame.memory.expansion_cost(offset, 32)?;
        frame.increase_consumed_gas(cost)?;
        let value = frame.memory.load(offset);
        frame.stack.push(value)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_mstore(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let offset = checked_usize(frame.stack.pop()?)?;
        let value = frame.stack.pop()?;
        let cost =
            self.env.schedule.verylow_gas + frame.memory.expansion_cost(offset, 32)?;
        frame.increase_consumed_gas(cost)?;
        frame.memory.store_word(offset, value);
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_mstore8(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let offset = checked_usize(frame.stack.pop()?)?;
        let value = frame.stack.pop()?;
        let cost = self.env.schedule.verylow_gas + frame.memory.expansion_cost(offset, 1)?;
        frame.increase_consumed_gas(cost)?;
        frame.memory.store_byte(offset, value.byte(0));
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_sload(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.sload_gas)?;
        let key = H256(frame.stack.pop()?.to_big_endian());
        let value = self.db.get_storage_value(frame.to, key)?;
        frame.stack.push(value)?;
        Ok(OpcodeResult::Continue)
    }

    // Setting a fresh slot costs G_sset, anything else G_sreset; clearing a
    // set slot accrues the clear refund, capped later at settlement.
    pub(crate) fn op_sstore(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let key = H256(frame.stack.pop()?.to_big_endian());
        let value = frame.stack.pop()?;
        let current = self.db.get_storage_value(frame.to, key)?;
        let cost = if current.is_zero() && !value.is_zero() {
            self.env.schedule.sstore_set_gas
        } else {
            self.env.schedule.sstore_reset_gas
        };
        frame.increase_consumed_gas(cost)?;
        if !current.is_zero() && value.is_zero() {
            self.substate.add_refund(self.env.schedule.sstore_refund_gas);
        }
        self.db.set_storage_value(frame.to, key, value)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_jump(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.mid_gas)?;
        let target = frame.stack.pop()?;
        self.jump_to(frame, target)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_jumpi(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.high_gas)?;
        let target = frame.stack.pop()?;
        let condition = frame.stack.pop()?;
        if !condition.is_zero() {
            self.jump_to(frame, target)?;
        }
        Ok(OpcodeResult::Continue)
    }

    fn jump_to(&self, frame: &mut CallFrame, target: U256) -> Result<(), VMError> {
        if target > U256::from(usize::MAX) {
            return Err(VMError::InvalidJump);
        }
        let target = target.as_usize();
        if !frame.is_valid_jump_destination(target) {
            return Err(VMError::InvalidJump);
        }
        frame.pc = target;
        Ok(())
    }

    pub(crate) fn op_pc(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        // pc was already advanced past this opcode
        frame.stack.push(U256::from(frame.pc - 1))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_msize(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        frame.stack.push(U256::from(frame.memory.len()))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_gas(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        frame.stack.push(U256::from(frame.gas_remaining))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_jumpdest(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.jumpdest_gas)?;
        Ok(OpcodeResult::Continue)
    }
}
