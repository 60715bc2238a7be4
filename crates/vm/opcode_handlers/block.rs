use ethereum_types::U256;

use ember_common::constants::BLOCKHASH_WINDOW;

use crate::{OpcodeResult, VM, call_frame::CallFrame, errors::VMError};

impl VM {
    // Hash of one of the most recent 256 complete blocks; anything else
    // reads as zero.
    pub(crate) fn op_blockhash(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.blockhash_gas)?;
        let number = frame.stack.pop()?;
        let current = self.env.block_number;
        if number >= U256::from(current)
            || number < U256::from(current.saturating_sub(BLOCKHASH_WINDOW))
        {
            frame.stack.push(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }
        let hash = self.db.get_block_hash(number.as_u64())?.unwrap_or_default();
        frame.stack.push(U256::from_big_endian(hash.as_bytes()))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_coinbase(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        frame
            .stack
            .push(U256::from_big_endian(self.env.coinbase.as_bytes()))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_timestamp(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        frame.stack.push(U256::from(self.env.timestamp))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_number(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        frame.stack.push(U256::from(self.env.block_number))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_difficulty(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        frame.stack.push(self.env.difficulty)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_gaslimit(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.base_gas)?;
        frame.stack.push(U256::from(self.env.block_gas_limit))?;
        Ok(OpcodeResult::Continue)
    }
}
