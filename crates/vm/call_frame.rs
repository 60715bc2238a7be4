use std::collections::HashSet;

use bytes::Bytes;
use ethereum_types::{Address, U256};

use crate::{constants::STACK_LIMIT, errors::VMError, memory::Memory};

/// The EVM operand stack: at most 1024 words.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stack {
    values: Vec<U256>,
}

impl Stack {
    pub fn push(&mut self, value: U256) -> Result<(), VMError> {
        if self.values.len() >= STACK_LIMIT {
            return Err(VMError::StackOverflow);
        }
        self.values.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<U256, VMError> {
        self.values.pop().ok_or(VMError::StackUnderflow)
    }

    /// Value `depth` positions below the top, 0-indexed.
    pub fn get(&self, depth: usize) -> Result<U256, VMError> {
        let len = self.values.len();
        if depth >= len {
            return Err(VMError::StackUnderflow);
        }
        Ok(self.values[len - 1 - depth])
    }

    /// Swaps the top with the value `depth` positions below it.
    pub fn swap(&mut self, depth: usize) -> Result<(), VMError> {
        let len = self.values.len();
        if depth >= len {
            return Err(VMError::StackUnderflow);
        }
        self.values.swap(len - 1, len - 1 - depth);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One execution context: code, operand stack, memory and gas of a message
/// call or contract creation.
#[derive(Debug, Clone, Default)]
pub struct CallFrame {
    /// CALLER as seen by the executing code.
    pub msg_sender: Address,
    /// The account whose balance and storage this context operates on.
    pub to: Address,
    /// The account the bytecode was loaded from (differs from `to` under
    /// CALLCODE/DELEGATECALL).
    pub code_address: Address,
    pub bytecode: Bytes,
    pub msg_value: U256,
    pub calldata: Bytes,
    pub gas_limit: u64,
    pub gas_remaining: u64,
    pub pc: usize,
    pub stack: Stack,
    pub memory: Memory,
    /// Data returned by the last sub-call of this frame.
    pub returndata: Bytes,
    /// Data this frame returns to its parent.
    pub output: Bytes,
    pub depth: usize,
    pub is_create: bool,
    valid_jump_destinations: HashSet<usize>,
}

impl CallFrame {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        msg_sender: Address,
        to: Address,
        code_address: Address,
        bytecode: Bytes,
        msg_value: U256,
        calldata: Bytes,
        gas_limit: u64,
        depth: usize,
        is_create: bool,
    ) -> Self {
        let valid_jump_destinations = scan_jump_destinations(&bytecode);
        Self {
            msg_sender,
            to,
            code_address,
            bytecode,
            msg_value,
            calldata,
            gas_limit,
            gas_remaining: gas_limit,
            depth,
            is_create,
            valid_jump_destinations,
            ..Default::default()
        }
    }

    /// Opcode at the program counter; running off the end of the code is an
    /// implicit STOP.
    pub fn next_opcode(&self) -> u8 {
        self.bytecode.get(self.pc).copied().unwrap_or(0x00)
    }

    /// Charges `gas`, failing without mutating when not enough remains.
    pub fn increase_consumed_gas(&mut self, gas: u64) -> Result<(), VMError> {
        if self.gas_remaining < gas {
            return Err(VMError::OutOfGas);
        }
        self.gas_remaining -= gas;
        Ok(())
    }

    pub fn is_valid_jump_destination(&self, target: usize) -> bool {
        self.valid_jump_destinations.contains(&target)
    }
}

// JUMPDEST bytes inside push immediates are not valid targets, so the code
// is scanned linearly skipping each push's data.
fn scan_jump_destinations(code: &[u8]) -> HashSet<usize> {
    let mut destinations = HashSet::new();
    let mut pc = 0;
    while let Some(opcode) = code.get(pc).copied() {
        match opcode {
            0x5b => {
                destinations.insert(pc);
            }
            0x60..=0x7f => pc += (opcode - 0x5f) as usize,
            _ => {}
        }
        pc += 1;
    }
    destinations
}
