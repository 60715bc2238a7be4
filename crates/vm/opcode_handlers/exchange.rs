use crate::{OpcodeResult, VM, call_frame::CallFrame, errors::VMError};

impl VM {
    // SWAP1..=SWAP16: exchanges the top with the word `depth` below it.
    pub(crate) fn op_swap(&mut self, frame: &mut CallFrame, depth: usize) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        frame.stack.swap(depth)?;
        Ok(OpcodeResult::Continue)
    }
}
