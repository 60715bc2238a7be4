//! Opcode implementations, grouped the way the Yellow Paper tables group
//! them. Every handler charges its gas before mutating any state.

pub mod arithmetic;
pub mod bitwise_comparison;
pub mod block;
pub mod dup;
pub mod environment;
pub mod exchange;
pub mod keccak;
pub mod logging;
pub mod push;
pub mod stack_memory_storage_flow;
pub mod system;

use ethereum_types::U256;

/// Bytes `[offset, offset + size)` of `data`, zero padded past the end, as
/// CALLDATACOPY/CODECOPY/EXTCODECOPY read their source.
pub(crate) fn zero_padded_slice(data: &[u8], offset: U256, size: usize) -> Vec<u8> {
    let mut out = vec![0u8; size];
    if offset <= U256::from(usize::MAX) {
        let offset = offset.as_usize();
        if offset < data.len() {
            let available = data.len() - offset;
            let count = size.min(available);
            out[..count].copy_from_slice(&data[offset..offset + count]);
        }
    }
    out
}
