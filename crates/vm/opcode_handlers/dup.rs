use crate::{OpcodeResult, VM, call_frame::CallFrame, errors::VMError};

impl VM {
    // DUP1..=DUP16: `depth` is 1-indexed from the top of the stack.
    pub(crate) fn op_dup(&mut self, frame: &mut CallFrame, depth: usize) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let value = frame.stack.get(depth - 1)?;
        frame.stack.push(value)?;
        Ok(OpcodeResult::Continue)
    }
}
