use ethereum_types::U256;

use super::arithmetic::is_negative;
use crate::{OpcodeResult, VM, call_frame::CallFrame, errors::VMError};

fn bool_to_word(value: bool) -> U256 {
    if value { U256::one() } else { U256::zero() }
}

impl VM {
    pub(crate) fn op_lt(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let lhs = frame.stack.pop()?;
        let rhs = frame.stack.pop()?;
        frame.stack.push(bool_to_word(lhs < rhs))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_gt(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let lhs = frame.stack.pop()?;
        let rhs = frame.stack.pop()?;
        frame.stack.push(bool_to_word(lhs > rhs))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_slt(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let lhs = frame.stack.pop()?;
        let rhs = frame.stack.pop()?;
        let result = match (is_negative(lhs), is_negative(rhs)) {
            (true, false) => true,
            (false, true) => false,
            // Two's complement order matches unsigned order within one sign
            _ => lhs < rhs,
        };
        frame.stack.push(bool_to_word(result))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_sgt(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let lhs = frame.stack.pop()?;
        let rhs = frame.stack.pop()?;
        let result = match (is_negative(lhs), is_negative(rhs)) {
            (true, false) => false,
            (false, true) => true,
            _ => lhs > rhs,
        };
        frame.stack.push(bool_to_word(result))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_eq(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let lhs = frame.stack.pop()?;
        let rhs = frame.stack.pop()?;
        frame.stack.push(bool_to_word(lhs == rhs))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_iszero(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let value = frame.stack.pop()?;
        frame.stack.push(bool_to_word(value.is_zero()))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_and(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let lhs = frame.stack.pop()?;
        let rhs = frame.stack.pop()?;
        frame.stack.push(lhs & rhs)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_or(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let lhs = frame.stack.pop()?;
        let rhs = frame.stack.pop()?;
        frame.stack.push(lhs | rhs)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_xor(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let lhs = frame.stack.pop()?;
        let rhs = frame.stack.pop()?;
        frame.stack.push(lhs ^ rhs)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_not(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let value = frame.stack.pop()?;
        frame.stack.push(!value)?;
        Ok(OpcodeResult::Continue)
    }

    // Byte 0 is the most significant.
    pub(crate) fn op_byte(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let index = frame.stack.pop()?;
        let value = frame.stack.pop()?;
        let result = if index < U256::from(32) {
            U256::from(value.byte(31 - index.as_usize()))
        } else {
            U256::zero()
        };
        frame.stack.push(result)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_shl(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let shift = frame.stack.pop()?;
        let value = frame.stack.pop()?;
        let result = if shift < U256::from(256) {
            value << shift.as_usize()
        } else {
            U256::zero()
        };
        frame.stack.push(result)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_shr(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let shift = frame.stack.pop()?;
        let value = frame.stack.pop()?;
        let result = if shift < U256::from(256) {
            value >> shift.as_usize()
        } else {
            U256::zero()
        };
        frame.stack.push(result)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_sar(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let shift = frame.stack.pop()?;
        let value = frame.stack.pop()?;
        let negative = is_negative(value);
        let result = if shift.is_zero() {
            value
        } else if shift >= U256::from(256) {
            if negative { !U256::zero() } else { U256::zero() }
        } else {
            let shifted = value >> shift.as_usize();
            if negative {
                shifted | (!U256::zero() << (256 - shift.as_usize()))
            } else {
                shifted
            }
        };
        frame.stack.push(result)?;
        Ok(OpcodeResult::Continue)
    }
}
