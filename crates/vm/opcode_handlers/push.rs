use ethereum_types::U256;

use crate::{OpcodeResult, VM, call_frame::CallFrame, errors::VMError};

impl VM {
    // PUSH1..=PUSH32: the immediate follows the opcode; bytes past the end
    // of the code read as zero.
    pub(crate) fn op_push(&mut self, frame: &mut CallFrame, n: usize) -> Result<OpcodeResult, VMError> {
        frame.increase_consumed_gas(self.env.schedule.verylow_gas)?;
        let mut word = [0u8; 32];
        for (i, slot) in word[32 - n..].iter_mut().enumerate() {
            *slot = frame.bytecode.get(frame.pc + i).copied().unwrap_or(0);
        }
        frame.pc += n;
        frame.stack.push(U256::from_big_endian(&word))?;
        Ok(OpcodeResult::Continue)
    }
}
