//! Constructors for exercising programs without a surrounding blockchain:
//! build a VM around assembled operations, a sender account and an
//! in-memory state view.

use std::sync::Arc;

use bytes::Bytes;
use ethereum_types::{Address, U256};

use ember_common::types::Fork;

use crate::{
    VM,
    call_frame::CallFrame,
    constants::TX_BASE_COST,
    db::{Account, InMemoryDb, WorldState},
    environment::Environment,
    opcodes::Operation,
};

/// Gas limit of the single frame the helpers prepare.
pub const TEST_FRAME_GAS: u64 = 100_000_000;

pub fn ops_to_bytecode(operations: &[Operation]) -> Bytes {
    operations
        .iter()
        .flat_map(Operation::to_bytecode)
        .collect::<Vec<u8>>()
        .into()
}

/// VM with a throwaway sender running the given operations under the latest
/// supported fork.
pub fn new_vm_with_ops(operations: &[Operation]) -> VM {
    new_vm_with_ops_addr_bal(
        ops_to_bytecode(operations),
        Address::from_low_u64_be(0x2c),
        U256::MAX,
    )
}

/// VM whose single prepared frame runs `bytecode` as `address`, which holds
/// `balance`. The frame is left on `call_frames` for the caller to pop.
pub fn new_vm_with_ops_addr_bal(bytecode: Bytes, address: Address, balance: U256) -> VM {
    let account = Account::default().with_balance(balance);
    let db = InMemoryDb::default().with_account(address, account);
    let mut world = WorldState::new(Arc::new(db));
    // The test account is usually both sender and code owner
    world.add_account(
        address,
        Account::default()
            .with_balance(balance)
            .with_bytecode(bytecode.clone()),
    );

    let mut env = Environment::default_from_fork(Fork::SpuriousDragon);
    env.origin = address;
    env.consumed_gas = TX_BASE_COST;

    let frame = CallFrame::new(
        address,
        address,
        address,
        bytecode,
        U256::zero(),
        Bytes::new(),
        TEST_FRAME_GAS,
        0,
        false,
    );

    let mut vm = VM::new(env, world);
    vm.call_frames.push(frame);
    vm
}
