use bytes::Bytes;
use ember_common::types::Log;
use thiserror::Error;

/// Errors raised while executing bytecode. Any of these halts the current
/// context and consumes all gas forwarded to it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VMError {
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Jump to invalid destination")]
    InvalidJump,
    #[error("Invalid opcode 0x{0:02x}")]
    InvalidOpcode(u8),
    #[error("Out of gas")]
    OutOfGas,
    #[error("Precompile execution failed")]
    PrecompileError,
    #[error("Database access failed: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(&'static str),
}

impl VMError {
    /// True for errors that come from the executed program rather than from
    /// the host. Host-side errors abort block execution instead of being
    /// recorded as a failed transaction.
    pub fn is_vm_failure(&self) -> bool {
        !matches!(self, VMError::Database(_) | VMError::Internal(_))
    }
}

/// Outcome of a transaction at the VM level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxResult {
    Success,
    Revert(VMError),
}

/// What a finished transaction execution reports back to the block executor.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub result: TxResult,
    /// Gas the sender ends up paying for, refunds already applied.
    pub gas_used: u64,
    pub gas_refunded: u64,
    pub output: Bytes,
    pub logs: Vec<Log>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        matches!(self.result, TxResult::Success)
    }
}
