use ethereum_types::U256;

use ember_common::keccak;

use crate::{
    OpcodeResult, VM,
    call_frame::CallFrame,
    errors::VMError,
    memory::{checked_usize, word_count},
};

impl VM {
    pub(crate) fn op_sha3(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let offset = checked_usize(frame.stack.pop()?)?;
        let size = checked_usize(frame.stack.pop()?)?;
        let cost = self.env.schedule.sha3_gas
            + self.env.schedule.sha3_word_gas * word_count(size as u64)
            + frame.memory.expansion_cost(offset, size)?;
        frame.increase_consumed_gas(cost)?;
        let data = frame.memory.load_range(offset, size);
        let hash = keccak(&data);
        frame.stack.push(U256::from_big_endian(hash.as_bytes()))?;
        Ok(OpcodeResult::Continue)
    }
}
