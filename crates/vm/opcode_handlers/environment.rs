use ethereum_types::U256;

use super::zero_padded_slice;
use crate::{
    OpcodeResult, VM, word_to_address,
    call_frame::CallFrame,
    errors::VMError,
    memory::{checked_usize, word_count},
};

impl VM {
    pub(crate) fn op_address(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        frame
            .stack
            .push(U256::from_big_endian(frame.to.as_bytes()))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_balance(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.balance_gas)?;
        let address = word_to_address(frame.stack.pop()?);
        let balance = self.db.get_balance(address)?;
        frame.stack.push(balance)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_origin(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        frame
            .stack
            .push(U256::from_big_endian(self.env.origin.as_bytes()))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_caller(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        frame
            .stack
            .push(U256::from_big_endian(frame.msg_sender.as_bytes()))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_callvalue(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        frame.stack.push(frame.msg_value)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_calldataload(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let offset = frame.stack.pop()?;
        let word = zero_padded_slice(&frame.calldata, offset, 32);
        frame.stack.push(U256::from_big_endian(&word))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_calldatasize(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        frame.stack.push(U256::from(frame.calldata.len()))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_calldatacopy(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let dest_offset = checked_usize(frame.stack.pop()?)?;
        let offset = frame.stack.pop()?;
        let size = checked_usize(frame.stack.pop()?)?;
        let cost = self.env.schedule.copy_gas * word_count(size as u64)
            + frame.memory.expansion_cost(dest_offset, size)?;
        frame.increase_consumed_gas(cost)?;
        let data = zero_padded_slice(&frame.calldata, offset, size);
        frame.memory.store_data(dest_offset, &data);
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_codesize(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        frame.stack.push(U256::from(frame.bytecode.len()))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_codecopy(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let dest_offset = checked_usize(frame.stack.pop()?)?;
        let offset = frame.stack.pop()?;
        let size = checked_usize(frame.stack.pop()?)?;
        let cost = self.env.schedule.copy_gas * word_count(size as u64)
            + frame.memory.expansion_cost(dest_offset, size)?;
        frame.increase_consumed_gas(cost)?;
        let data = zero_padded_slice(&frame.bytecode, offset, size);
        frame.memory.store_data(dest_offset, &data);
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_gasprice(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        frame.stack.push(self.env.gas_price)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_extcodesize(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.extcode_gas)?;
        let address = word_to_address(frame.stack.pop()?);
        let code = self.db.get_code(address)?;
        frame.stack.push(U256::from(code.len()))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_extcodecopy(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(frame.stack.pop()?);
        let dest_offset = checked_usize(frame.stack.pop()?)?;
        let offset = frame.stack.pop()?;
        let size = checked_usize(frame.stack.pop()?)?;
        let cost = self.env.schedule.extcode_gas
            + self.env.schedule.copy_gas * word_count(size as u64)
            + frame.memory.expansion_cost(dest_offset, size)?;
        frame.increase_consumed_gas(cost)?;
        let code = self.db.get_code(address)?;
        let data = zero_padded_slice(&code, offset, size);
        frame.memory.store_data(dest_offset, &data);
        Ok(OpcodeResult::Continue)
    }
}
