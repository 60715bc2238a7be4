use bytes::Bytes;
use ethereum_types::H256;

use ember_common::types::Log;

use crate::{
    OpcodeResult, VM,
    call_frame::CallFrame,
    errors::VMError,
    memory::checked_usize,
};

impl VM {
    // LOG0..=LOG4: records a log entry for the owning account.
    pub(crate) fn op_log(
        &mut self,
        frame: &mut CallFrame,
        topic_count: usize,
    ) -> Result<OpcodeResult, VMError> {
        let offset = checked_usize(frame.stack.pop()?)?;
        let size = checked_usize(frame.stack.pop()?)?;
        let mut topics = Vec::with_capacity(topic_count);
        for _ in 0..topic_count {
            topics.push(H256(frame.stack.pop()?.to_big_endian()));
        }
        let cost = self.env.schedule.log_gas
            + self.env.schedule.log_data_gas * size as u64
            + self.env.schedule.log_topic_gas * topic_count as u64
            + frame.memory.expansion_cost(offset, size)?;
        frame.increase_consumed_gas(cost)?;
        let data = frame.memory.load_range(offset, size);
        self.substate.add_log(Log {
            address: frame.to,
            topics,
            data: Bytes::from(data),
        });
        Ok(OpcodeResult::Continue)
    }
}
