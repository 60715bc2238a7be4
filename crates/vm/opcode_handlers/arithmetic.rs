use ethereum_types::{U256, U512};

use crate::{OpcodeResult, VM, call_frame::CallFrame, errors::VMError};

pub(crate) fn is_negative(value: U256) -> bool {
    value.bit(255)
}

pub(crate) fn twos_complement(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn u512_to_u256(value: U512) -> U256 {
    U256([value.0[0], value.0[1], value.0[2], value.0[3]])
}

impl VM {
    pub(crate) fn op_add(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let lhs = frame.stack.pop()?;
        let rhs = frame.stack.pop()?;
        frame.stack.push(lhs.overflowing_add(rhs).0)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_mul(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.low_gas)?;
        let lhs = frame.stack.pop()?;
        let rhs = frame.stack.pop()?;
        frame.stack.push(lhs.overflowing_mul(rhs).0)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_sub(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let lhs = frame.stack.pop()?;
        let rhs = frame.stack.pop()?;
        frame.stack.push(lhs.overflowing_sub(rhs).0)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_div(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.low_gas)?;
        let dividend = frame.stack.pop()?;
        let divisor = frame.stack.pop()?;
        let quotient = if divisor.is_zero() {
            U256::zero()
        } else {
            dividend / divisor
        };
        frame.stack.push(quotient)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_sdiv(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.low_gas)?;
        let dividend = frame.stack.pop()?;
        let divisor = frame.stack.pop()?;
        if divisor.is_zero() {
            frame.stack.push(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }
        let dividend_abs = if is_negative(dividend) {
            twos_complement(dividend)
        } else {
            dividend
        };
        let divisor_abs = if is_negative(divisor) {
            twos_complement(divisor)
        } else {
            divisor
        };
        let quotient = dividend_abs / divisor_abs;
        let negate = is_negative(dividend) != is_negative(divisor);
        frame
            .stack
            .push(if negate { twos_complement(quotient) } else { quotient })?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_mod(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.low_gas)?;
        let dividend = frame.stack.pop()?;
        let divisor = frame.stack.pop()?;
        let remainder = if divisor.is_zero() {
            U256::zero()
        } else {
            dividend % divisor
        };
        frame.stack.push(remainder)?;
        Ok(OpcodeResult::Continue)
    }

    // The result takes the sign of the dividend.
    pub(crate) fn op_smod(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.low_gas)?;
        let dividend = frame.stack.pop()?;
        let divisor = frame.stack.pop()?;
        if divisor.is_zero() {
            frame.stack.push(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }
        let dividend_abs = if is_negative(dividend) {
            twos_complement(dividend)
        } else {
            dividend
        };
        let divisor_abs = if is_negative(divisor) {
            twos_complement(divisor)
        } else {
            divisor
        };
        let remainder = dividend_abs % divisor_abs;
        frame.stack.push(if is_negative(dividend) {
            twos_complement(remainder)
        } else {
            remainder
        })?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_addmod(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.mid_gas)?;
        let lhs = frame.stack.pop()?;
        let rhs = frame.stack.pop()?;
        let modulus = frame.stack.pop()?;
        let result = if modulus.is_zero() {
            U256::zero()
        } else {
            u512_to_u256((U512::from(lhs) + U512::from(rhs)) % U512::from(modulus))
        };
        frame.stack.push(result)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_mulmod(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.mid_gas)?;
        let lhs = frame.stack.pop()?;
        let rhs = frame.stack.pop()?;
        let modulus = frame.stack.pop()?;
        let result = if modulus.is_zero() {
            U256::zero()
        } else {
            u512_to_u256((U512::from(lhs) * U512::from(rhs)) % U512::from(modulus))
        };
        frame.stack.push(result)?;
        Ok(OpcodeResult::Continue)
    }

    // Cost grows with the byte length of the exponent; EIP-160 raised the
    // per-byte price.
    pub(crate) fn op_exp(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let base = frame.stack.pop()?;
        let exponent = frame.stack.pop()?;
        let exponent_bytes = (exponent.bits() as u64).div_ceil(8);
        let cost =
            self.env.schedule.exp_gas + self.env.schedule.exp_byte_gas * exponent_bytes;
        frame.increase_consumed_gas(cost)?;
        frame.stack.push(base.overflowing_pow(exponent).0)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_signextend(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.low_gas)?;
        let byte_index = frame.stack.pop()?;
        let value = frame.stack.pop()?;
        if byte_index >= U256::from(31) {
            frame.stack.push(value)?;
            return Ok(OpcodeResult::Continue);
        }
        let sign_bit = byte_index.as_usize() * 8 + 7;
        let mask = (U256::one() << (sign_bit + 1)) - 1;
        let extended = if value.bit(sign_bit) {
            value | !mask
        } else {
            value & mask
        };
        frame.stack.push(extended)?;
        Ok(OpcodeResult::Continue)
    }
}
