/// EVM word size in bytes.
pub const WORD_SIZE: usize = 32;

/// Maximum words on the stack.
pub const STACK_LIMIT: usize = 1024;

/// Maximum nesting of message calls and creates.
pub const MAX_CALL_DEPTH: usize = 1024;

/// Base cost charged for every transaction before any bytecode runs.
pub const TX_BASE_COST: u64 = 21_000;

/// Addresses 0x01..=0x04 host the precompiled contracts.
pub const LAST_PRECOMPILE_ADDRESS: u64 = 0x04;
