use std::sync::Arc;

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

use ember_common::types::{Fork, Transaction, TxKind};
use ember_vm::{
    VM,
    call_frame::CallFrame,
    constants::TX_BASE_COST,
    db::{Account, InMemoryDb, WorldState},
    environment::Environment,
    errors::{TxResult, VMError},
    opcodes::Operation,
    utils::{TEST_FRAME_GAS, new_vm_with_ops, new_vm_with_ops_addr_bal, ops_to_bytecode},
    word_to_address,
};

fn callee_return_bytecode(return_value: U256) -> Bytes {
    ops_to_bytecode(&[
        Operation::Push((32, return_value)),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((1, U256::from(32))),
        Operation::Push((1, U256::zero())),
        Operation::Return,
    ])
}

fn run(vm: &mut VM) -> CallFrame {
    let mut frame = vm.call_frames.pop().unwrap();
    vm.execute(&mut frame).unwrap();
    frame
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

#[test]
fn add_op() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::one())),
        Operation::Push((32, U256::zero())),
        Operation::Add,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::one());
    assert_eq!(vm.env.consumed_gas, TX_BASE_COST + 9);
}

#[test]
fn add_wraps_at_word_size() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::one())),
        Operation::Push((32, U256::MAX)),
        Operation::Add,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::zero());
}

#[test]
fn mul_op() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(2))),
        Operation::Push((1, U256::from(4))),
        Operation::Mul,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(8));
}

#[test]
fn sub_op() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(3))),
        Operation::Push((1, U256::from(5))),
        Operation::Sub,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(2));
}

#[test]
fn div_op_and_division_by_zero() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(2))),
        Operation::Push((1, U256::from(11))),
        Operation::Div,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(5));

    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::from(10))),
        Operation::Div,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::zero());
}

#[test]
fn sdiv_op() {
    // -2 / -1 == 2 in two's complement
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::MAX)),
        Operation::Push((32, U256::MAX - 1)),
        Operation::Sdiv,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(2));
}

#[test]
fn mod_op() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(3))),
        Operation::Push((1, U256::from(10))),
        Operation::Mod,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::one());
}

#[test]
fn smod_op_follows_dividend_sign() {
    // -8 % -3 == -2
    let minus_eight = U256::from_str_radix(
        "0xfffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff8",
        16,
    )
    .unwrap();
    let minus_three = U256::from_str_radix(
        "0xfffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffd",
        16,
    )
    .unwrap();
    let minus_two = U256::from_str_radix(
        "0xfffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffe",
        16,
    )
    .unwrap();
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, minus_three)),
        Operation::Push((32, minus_eight)),
        Operation::SMod,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), minus_two);
}

#[test]
fn addmod_and_mulmod() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(8))),
        Operation::Push((1, U256::from(10))),
        Operation::Push((1, U256::from(10))),
        Operation::Addmod,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(4));

    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(8))),
        Operation::Push((1, U256::from(10))),
        Operation::Push((1, U256::from(10))),
        Operation::Mulmod,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(4));
}

#[test]
fn addmod_uses_full_precision_intermediate() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(7))),
        Operation::Push((32, U256::MAX)),
        Operation::Push((32, U256::MAX)),
        Operation::Addmod,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    let expected = ((U256::MAX % 7) + (U256::MAX % 7)) % 7;
    assert_eq!(frame.stack.pop().unwrap(), expected);
}

#[test]
fn exp_op_and_dynamic_cost() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(2))),
        Operation::Push((1, U256::from(10))),
        Operation::Exp,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(100));
    // two pushes + exp base 10 + 50 per exponent byte under spurious dragon
    assert_eq!(vm.env.consumed_gas, TX_BASE_COST + 6 + 10 + 50);
}

#[test]
fn sign_extend_op() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(0x7f))),
        Operation::Push((1, U256::zero())),
        Operation::SignExtend,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(0x7f));

    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(0xff))),
        Operation::Push((1, U256::zero())),
        Operation::SignExtend,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::MAX);
}

// ---------------------------------------------------------------------------
// Comparison and bitwise
// ---------------------------------------------------------------------------

#[test]
fn comparison_ops() {
    let cases = [
        (Operation::Lt, U256::from(9), U256::from(10), U256::one()),
        (Operation::Gt, U256::from(10), U256::from(9), U256::one()),
        (Operation::Eq, U256::from(10), U256::from(10), U256::one()),
        (Operation::Eq, U256::from(10), U256::from(20), U256::zero()),
    ];
    for (op, lhs, rhs, expected) in cases {
        let mut vm = new_vm_with_ops(&[
            Operation::Push((32, rhs)),
            Operation::Push((32, lhs)),
            op,
            Operation::Stop,
        ]);
        let mut frame = run(&mut vm);
        assert_eq!(frame.stack.pop().unwrap(), expected);
    }
}

#[test]
fn signed_comparison_ops() {
    // -1 < 0
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::zero())),
        Operation::Push((32, U256::MAX)),
        Operation::Slt,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::one());

    // 0 > -1
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::MAX)),
        Operation::Push((32, U256::zero())),
        Operation::Sgt,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::one());
}

#[test]
fn is_zero_op() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::zero())),
        Operation::IsZero,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::one());
}

#[test]
fn and_basic() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::from(0b1010))),
        Operation::Push((32, U256::from(0b1100))),
        Operation::And,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(0b1000));
    assert_eq!(vm.env.consumed_gas, TX_BASE_COST + 9);
}

#[test]
fn or_xor_not() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::from(0b1010))),
        Operation::Push((32, U256::from(0b1100))),
        Operation::Or,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(0b1110));

    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::from(0b1010))),
        Operation::Push((32, U256::from(0b1100))),
        Operation::Xor,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(0b0110));

    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::zero())),
        Operation::Not,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::MAX);
}

#[test]
fn byte_op_edge_cases() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::from(0xf0f1))),
        Operation::Push((1, U256::from(31))),
        Operation::Byte,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(0xf1));

    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::MAX)),
        Operation::Push((1, U256::from(32))),
        Operation::Byte,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::zero());
}

#[test]
fn shift_ops() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::from(4))),
        Operation::Shl,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(16));

    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(16))),
        Operation::Push((1, U256::from(4))),
        Operation::Shr,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::one());

    // arithmetic shift keeps the sign
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::MAX - 15)),
        Operation::Push((1, U256::from(4))),
        Operation::Sar,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::MAX);
}

// ---------------------------------------------------------------------------
// Stack, memory and flow
// ---------------------------------------------------------------------------

#[test]
fn pop_on_empty_stack() {
    let mut vm = new_vm_with_ops(&[Operation::Pop, Operation::Stop]);
    let mut frame = vm.call_frames.pop().unwrap();
    let result = vm.execute(&mut frame);
    assert!(matches!(result, Err(VMError::StackUnderflow)));
    assert_eq!(frame.gas_remaining, 0);
}

#[test]
fn dup_and_swap() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(1))),
        Operation::Push((1, U256::from(2))),
        Operation::Dup(2),
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(1));

    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(1))),
        Operation::Push((1, U256::from(2))),
        Operation::Swap(1),
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(1));
    assert_eq!(frame.stack.pop().unwrap(), U256::from(2));
}

#[test]
fn mstore_mload_roundtrip() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((2, U256::from(0x3322))),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((1, U256::zero())),
        Operation::Mload,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(0x3322));
    assert_eq!(frame.memory.len(), 32);
}

#[test]
fn mstore8_writes_single_byte() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((2, U256::from(0xaabb))),
        Operation::Push((1, U256::zero())),
        Operation::Mstore8,
        Operation::Push((1, U256::zero())),
        Operation::Mload,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    // only the low byte 0xbb lands, in the most significant position
    let expected = U256::from(0xbb) << 248usize;
    assert_eq!(frame.stack.pop().unwrap(), expected);
}

#[test]
fn msize_tracks_word_aligned_growth() {
    let mut vm = new_vm_with_ops(&[Operation::Msize, Operation::Stop]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::zero());

    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::from(33))),
        Operation::Mstore8,
        Operation::Msize,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(64));
}

#[test]
fn jump_skips_to_destination() {
    // PUSH1 4; JUMP; STOP; JUMPDEST; PUSH1 10; STOP
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(4))),
        Operation::Jump,
        Operation::Stop,
        Operation::Jumpdest,
        Operation::Push((1, U256::from(10))),
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(10));
}

#[test]
fn jump_to_position_outside_code_fails() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::from(5000))),
        Operation::Jump,
        Operation::Stop,
    ]);
    let mut frame = vm.call_frames.pop().unwrap();
    assert!(matches!(
        vm.execute(&mut frame),
        Err(VMError::InvalidJump)
    ));
}

#[test]
fn jumpi_takes_branch_only_when_condition_nonzero() {
    // PUSH1 1; PUSH1 6; JUMPI; STOP; .. JUMPDEST; PUSH1 42; STOP
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::from(6))),
        Operation::Jumpi,
        Operation::Stop,
        Operation::Jumpdest,
        Operation::Push((1, U256::from(42))),
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(42));

    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::from(6))),
        Operation::Jumpi,
        Operation::Push((1, U256::from(7))),
        Operation::Stop,
        Operation::Jumpdest,
        Operation::Push((1, U256::from(42))),
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(7));
}

#[test]
fn pc_op_reports_opcode_position() {
    let mut vm = new_vm_with_ops(&[Operation::PC, Operation::Stop]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::zero());
    assert_eq!(vm.env.consumed_gas, TX_BASE_COST + 2);

    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, U256::one())),
        Operation::PC,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(33));
}

#[test]
fn gas_op_reports_remaining_after_charge() {
    let mut vm = new_vm_with_ops(&[Operation::Gas, Operation::Stop]);
    let mut frame = run(&mut vm);
    assert_eq!(
        frame.stack.pop().unwrap(),
        U256::from(TEST_FRAME_GAS - 2)
    );
}

#[test]
fn invalid_opcode_consumes_all_gas() {
    let mut vm = new_vm_with_ops(&[Operation::Invalid]);
    let mut frame = vm.call_frames.pop().unwrap();
    assert!(matches!(
        vm.execute(&mut frame),
        Err(VMError::InvalidOpcode(0xfe))
    ));
    assert_eq!(frame.gas_remaining, 0);
    assert_eq!(vm.env.consumed_gas, TX_BASE_COST + TEST_FRAME_GAS);
}

// ---------------------------------------------------------------------------
// SHA3 and environment
// ---------------------------------------------------------------------------

#[test]
fn sha3_hashes_memory_range() {
    // keccak256 of 32 zero bytes
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(32))),
        Operation::Push((1, U256::zero())),
        Operation::Sha3,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    let expected = U256::from_str_radix(
        "0x290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563",
        16,
    )
    .unwrap();
    assert_eq!(frame.stack.pop().unwrap(), expected);
    // 2 pushes + 30 + 6*1 + 3 memory
    assert_eq!(vm.env.consumed_gas, TX_BASE_COST + 6 + 30 + 6 + 3);
}

#[test]
fn address_caller_callvalue_origin() {
    let sender = Address::from_low_u64_be(0x2c);
    let mut vm = new_vm_with_ops(&[
        Operation::Address,
        Operation::Caller,
        Operation::Origin,
        Operation::Callvalue,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::zero());
    assert_eq!(word_to_address(frame.stack.pop().unwrap()), sender);
    assert_eq!(word_to_address(frame.stack.pop().unwrap()), sender);
    assert_eq!(word_to_address(frame.stack.pop().unwrap()), sender);
}

#[test]
fn calldata_ops() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::zero())),
        Operation::CallDataLoad,
        Operation::CallDataSize,
        Operation::Stop,
    ]);
    let mut frame = vm.call_frames.pop().unwrap();
    frame.calldata = Bytes::from_static(&[0xaa; 40]);
    vm.execute(&mut frame).unwrap();
    assert_eq!(frame.stack.pop().unwrap(), U256::from(40));
    let word = frame.stack.pop().unwrap();
    assert_eq!(word, U256::from_big_endian(&[0xaa; 32]));
}

#[test]
fn calldatacopy_zero_pads() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(8))),  // size
        Operation::Push((1, U256::from(2))),  // data offset
        Operation::Push((1, U256::zero())),   // memory offset
        Operation::CallDataCopy,
        Operation::Push((1, U256::zero())),
        Operation::Mload,
        Operation::Stop,
    ]);
    let mut frame = vm.call_frames.pop().unwrap();
    frame.calldata = Bytes::from_static(&[1, 2, 3, 4]);
    vm.execute(&mut frame).unwrap();
    frame.stack.pop().unwrap();
    let copied = frame.memory.load_range(0, 8);
    assert_eq!(copied, vec![3, 4, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn codesize_and_codecopy() {
    let ops = [
        Operation::Push((1, U256::from(4))), // size
        Operation::Push((1, U256::zero())),  // code offset
        Operation::Push((1, U256::zero())),  // memory offset
        Operation::CodeCopy,
        Operation::CodeSize,
        Operation::Stop,
    ];
    let bytecode = ops_to_bytecode(&ops);
    let code_len = bytecode.len();
    let mut vm = new_vm_with_ops(&ops);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(code_len));
    assert_eq!(frame.memory.load_range(0, 4), vec![0x60, 0x04, 0x60, 0x00]);
}

#[test]
fn extcodesize_and_extcodecopy_read_other_account() {
    let external = Address::from_low_u64_be(0xee);
    let external_code = Bytes::from_static(&[0x60, 0x01, 0x60, 0x02, 0x00]);
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(0xee))),
        Operation::ExtCodeSize,
        Operation::Push((1, U256::from(5))),    // size
        Operation::Push((1, U256::zero())),     // code offset
        Operation::Push((1, U256::zero())),     // memory offset
        Operation::Push((1, U256::from(0xee))), // address
        Operation::ExtCodeCopy,
        Operation::Stop,
    ]);
    vm.db.add_account(
        external,
        Account::default().with_bytecode(external_code.clone()),
    );
    let mut frame = run(&mut vm);
    assert_eq!(frame.memory.load_range(0, 5), external_code.to_vec());
    assert_eq!(frame.stack.pop().unwrap(), U256::from(5));
}

#[test]
fn balance_of_known_and_unknown_accounts() {
    let rich = Address::from_low_u64_be(0xaa);
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(0xaa))),
        Operation::Balance,
        Operation::Push((1, U256::from(0xbb))),
        Operation::Balance,
        Operation::Stop,
    ]);
    vm.db
        .add_account(rich, Account::default().with_balance(U256::from(777)));
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::zero());
    assert_eq!(frame.stack.pop().unwrap(), U256::from(777));
}

// ---------------------------------------------------------------------------
// Block introspection
// ---------------------------------------------------------------------------

#[test]
fn block_level_ops() {
    let mut vm = new_vm_with_ops(&[
        Operation::Coinbase,
        Operation::Timestamp,
        Operation::Number,
        Operation::Difficulty,
        Operation::GasLimit,
        Operation::Stop,
    ]);
    vm.env.coinbase = Address::from_low_u64_be(0xfee);
    vm.env.timestamp = 100;
    vm.env.block_number = 7;
    vm.env.difficulty = U256::from(0x40000);
    vm.env.block_gas_limit = 8_000_000;
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(8_000_000));
    assert_eq!(frame.stack.pop().unwrap(), U256::from(0x40000));
    assert_eq!(frame.stack.pop().unwrap(), U256::from(7));
    assert_eq!(frame.stack.pop().unwrap(), U256::from(100));
    assert_eq!(
        word_to_address(frame.stack.pop().unwrap()),
        Address::from_low_u64_be(0xfee)
    );
}

#[test]
fn blockhash_respects_window() {
    let mut db = InMemoryDb::default();
    db.block_hashes.insert(99, H256::from_low_u64_be(0x1234));
    let world = WorldState::new(Arc::new(db));
    let mut env = Environment::default_from_fork(Fork::SpuriousDragon);
    env.block_number = 100;
    let bytecode = ops_to_bytecode(&[
        Operation::Push((1, U256::from(99))),
        Operation::BlockHash,
        Operation::Push((2, U256::from(100))),
        Operation::BlockHash,
        Operation::Stop,
    ]);
    let mut frame = CallFrame::new(
        Address::zero(),
        Address::zero(),
        Address::zero(),
        bytecode,
        U256::zero(),
        Bytes::new(),
        TEST_FRAME_GAS,
        0,
        false,
    );
    let mut vm = VM::new(env, world);
    vm.execute(&mut frame).unwrap();
    // current block number is never available
    assert_eq!(frame.stack.pop().unwrap(), U256::zero());
    assert_eq!(frame.stack.pop().unwrap(), U256::from(0x1234));
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[test]
fn sstore_sload_roundtrip() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((4, U256::from(0xdeadbeefu64))),
        Operation::Push((1, U256::zero())),
        Operation::Sstore,
        Operation::Push((1, U256::zero())),
        Operation::Sload,
        Operation::Stop,
    ]);
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::from(0xdeadbeefu64));
    // 3 pushes + 20000 set + 200 sload
    assert_eq!(vm.env.consumed_gas, TX_BASE_COST + 9 + 20_000 + 200);
}

#[test]
fn sstore_clear_accrues_refund() {
    let owner = Address::from_low_u64_be(0x2c);
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::zero())),
        Operation::Sstore,
        Operation::Stop,
    ]);
    let mut storage = std::collections::HashMap::new();
    storage.insert(H256::zero(), U256::from(7));
    vm.db.add_account(
        owner,
        Account::default()
            .with_balance(U256::MAX)
            .with_storage(storage),
    );
    run(&mut vm);
    assert_eq!(vm.substate.refunded_gas, 15_000);
    // clearing costs the reset price
    assert_eq!(vm.env.consumed_gas, TX_BASE_COST + 6 + 5000);
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[test]
fn log_records_address_topics_and_data() {
    let owner = Address::from_low_u64_be(0x2c);
    let data = U256::from(0xabcdefu64);
    let mut vm = new_vm_with_ops(&[
        Operation::Push((32, data)),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((2, U256::from(0x1122))), // topic2
        Operation::Push((2, U256::from(0x3344))), // topic1
        Operation::Push((1, U256::from(32))),     // size
        Operation::Push((1, U256::zero())),       // offset
        Operation::Log(2),
        Operation::Stop,
    ]);
    run(&mut vm);
    let logs = vm.substate.extract_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].address, owner);
    assert_eq!(logs[0].topics.len(), 2);
    assert_eq!(logs[0].topics[0], H256::from_low_u64_be(0x3344));
    assert_eq!(logs[0].topics[1], H256::from_low_u64_be(0x1122));
    assert_eq!(
        U256::from_big_endian(&logs[0].data),
        U256::from(0xabcdefu64)
    );
}

#[test]
fn log_gas_cost() {
    let mut vm = new_vm_with_ops(&[
        Operation::Push((1, U256::from(32))), // size
        Operation::Push((1, U256::zero())),   // offset
        Operation::Log(0),
        Operation::Stop,
    ]);
    run(&mut vm);
    // 2 pushes + 375 + 8*32 + 3 memory
    assert_eq!(vm.env.consumed_gas, TX_BASE_COST + 6 + 375 + 256 + 3);
}

// ---------------------------------------------------------------------------
// CALL family
// ---------------------------------------------------------------------------

const OWNER: u64 = 0xcafebabe;
const EXTERNAL: u64 = 0xfacefeed;

// Code storing ADDRESS, CALLER and CALLVALUE into slots 0, 1 and 2.
fn context_recorder_bytecode() -> Bytes {
    ops_to_bytecode(&[
        Operation::Address,
        Operation::Push((1, U256::zero())),
        Operation::Sstore,
        Operation::Caller,
        Operation::Push((1, U256::one())),
        Operation::Sstore,
        Operation::Callvalue,
        Operation::Push((1, U256::from(2))),
        Operation::Sstore,
        Operation::Stop,
    ])
}

fn call_ops(value: u64, callee: u64, gas: u64) -> Vec<Operation> {
    vec![
        Operation::Push((1, U256::zero())),   // ret_size
        Operation::Push((1, U256::zero())),   // ret_offset
        Operation::Push((1, U256::zero())),   // args_size
        Operation::Push((1, U256::zero())),   // args_offset
        Operation::Push((4, U256::from(value))),
        Operation::Push((4, U256::from(callee))),
        Operation::Push((4, U256::from(gas))),
        Operation::Call,
        Operation::Stop,
    ]
}

#[test]
fn call_transfers_value_and_runs_callee_in_its_own_context() {
    let owner = Address::from_low_u64_be(OWNER);
    let external = Address::from_low_u64_be(EXTERNAL);
    // The callee runs three (op, PUSH1, SSTORE-to-fresh-slot) sequences;
    // forward a little more than it needs
    let required_gas: u64 = 3 * (2 + 3 + 20_000);
    let mut vm = new_vm_with_ops_addr_bal(
        ops_to_bytecode(&call_ops(500, EXTERNAL, required_gas + 13)),
        owner,
        U256::from(1000),
    );
    vm.db.add_account(
        external,
        Account::default().with_bytecode(context_recorder_bytecode()),
    );

    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::one());
    assert_eq!(vm.db.get_balance(owner).unwrap(), U256::from(500));
    assert_eq!(vm.db.get_balance(external).unwrap(), U256::from(500));
    assert_eq!(
        vm.db
            .get_storage_value(external, H256::from_low_u64_be(0))
            .unwrap(),
        U256::from(EXTERNAL)
    );
    assert_eq!(
        vm.db
            .get_storage_value(external, H256::from_low_u64_be(1))
            .unwrap(),
        U256::from(OWNER)
    );
    assert_eq!(
        vm.db
            .get_storage_value(external, H256::from_low_u64_be(2))
            .unwrap(),
        U256::from(500)
    );
    // 7 pushes, then the callee's gas net of the unearned stipend on top of
    // G_call + G_callvalue; the unused 13 and the stipend flow back
    assert_eq!(
        vm.env.consumed_gas,
        TX_BASE_COST + 21 + required_gas - 2300 + 700 + 9000
    );
}

#[test]
fn call_at_max_depth_fails_without_state_change() {
    let owner = Address::from_low_u64_be(OWNER);
    let external = Address::from_low_u64_be(EXTERNAL);
    let mut vm = new_vm_with_ops_addr_bal(
        ops_to_bytecode(&call_ops(500, EXTERNAL, 100_000)),
        owner,
        U256::from(1000),
    );
    vm.db.add_account(
        external,
        Account::default().with_bytecode(context_recorder_bytecode()),
    );

    let mut frame = vm.call_frames.pop().unwrap();
    frame.depth = 1024;
    vm.execute(&mut frame).unwrap();

    assert_eq!(frame.stack.pop().unwrap(), U256::zero());
    assert_eq!(vm.db.get_balance(owner).unwrap(), U256::from(1000));
    assert_eq!(vm.db.get_balance(external).unwrap(), U256::zero());
    // 7 pushes, then G_call + G_callvalue with the unearned stipend refunded
    assert_eq!(
        vm.env.consumed_gas,
        TX_BASE_COST + 21 + 700 + 9000 - 2300
    );
}

#[test]
fn call_with_value_above_balance_fails_without_state_change() {
    let owner = Address::from_low_u64_be(OWNER);
    let external = Address::from_low_u64_be(EXTERNAL);
    let mut vm = new_vm_with_ops_addr_bal(
        ops_to_bytecode(&call_ops(5000, EXTERNAL, 100_000)),
        owner,
        U256::from(1000),
    );
    vm.db.add_account(
        external,
        Account::default().with_bytecode(context_recorder_bytecode()),
    );

    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::zero());
    assert_eq!(vm.db.get_balance(owner).unwrap(), U256::from(1000));
    assert_eq!(vm.db.get_balance(external).unwrap(), U256::zero());
    assert_eq!(
        vm.env.consumed_gas,
        TX_BASE_COST + 21 + 700 + 9000 - 2300
    );
}

#[test]
fn callcode_runs_external_code_on_own_storage() {
    let owner = Address::from_low_u64_be(OWNER);
    let external = Address::from_low_u64_be(EXTERNAL);
    let caller_ops = vec![
        Operation::Push((1, U256::zero())),           // ret_size
        Operation::Push((1, U256::zero())),           // ret_offset
        Operation::Push((1, U256::zero())),           // args_size
        Operation::Push((1, U256::zero())),           // args_offset
        Operation::Push((4, U256::from(100))),        // value
        Operation::Push((4, U256::from(EXTERNAL))),   // code source
        Operation::Push((4, U256::from(100_000))),    // gas
        Operation::CallCode,
        Operation::Stop,
    ];
    let mut vm = new_vm_with_ops_addr_bal(
        ops_to_bytecode(&caller_ops),
        owner,
        U256::from(1000),
    );
    vm.db.add_account(
        external,
        Account::default().with_bytecode(context_recorder_bytecode()),
    );

    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::one());
    // storage mutations land on the owner, not the code source
    assert_eq!(
        vm.db
            .get_storage_value(owner, H256::from_low_u64_be(0))
            .unwrap(),
        U256::from(OWNER)
    );
    assert_eq!(
        vm.db
            .get_storage_value(owner, H256::from_low_u64_be(1))
            .unwrap(),
        U256::from(OWNER)
    );
    assert_eq!(
        vm.db
            .get_storage_value(owner, H256::from_low_u64_be(2))
            .unwrap(),
        U256::from(100)
    );
    assert_eq!(
        vm.db
            .get_storage_value(external, H256::from_low_u64_be(0))
            .unwrap(),
        U256::zero()
    );
    // no balances moved
    assert_eq!(vm.db.get_balance(owner).unwrap(), U256::from(1000));
    assert_eq!(vm.db.get_balance(external).unwrap(), U256::zero());
}

#[test]
fn delegatecall_inherits_caller_and_value() {
    let owner = Address::from_low_u64_be(OWNER);
    let external = Address::from_low_u64_be(EXTERNAL);
    let parent_caller = Address::from_low_u64_be(0x5a5a);
    let caller_ops = vec![
        Operation::Push((1, U256::zero())),         // ret_size
        Operation::Push((1, U256::zero())),         // ret_offset
        Operation::Push((1, U256::zero())),         // args_size
        Operation::Push((1, U256::zero())),         // args_offset
        Operation::Push((4, U256::from(EXTERNAL))), // code source
        Operation::Push((4, U256::from(100_000))),  // gas
        Operation::DelegateCall,
        Operation::Stop,
    ];
    let mut vm = new_vm_with_ops_addr_bal(
        ops_to_bytecode(&caller_ops),
        owner,
        U256::from(1000),
    );
    vm.db.add_account(
        external,
        Account::default().with_bytecode(context_recorder_bytecode()),
    );

    let mut frame = vm.call_frames.pop().unwrap();
    frame.msg_sender = parent_caller;
    frame.msg_value = U256::from(77);
    vm.execute(&mut frame).unwrap();

    assert_eq!(frame.stack.pop().unwrap(), U256::one());
    // storage on the owner; CALLER and CALLVALUE are the parent's
    assert_eq!(
        vm.db
            .get_storage_value(owner, H256::from_low_u64_be(0))
            .unwrap(),
        U256::from(OWNER)
    );
    assert_eq!(
        vm.db
            .get_storage_value(owner, H256::from_low_u64_be(1))
            .unwrap(),
        U256::from(0x5a5a)
    );
    assert_eq!(
        vm.db
            .get_storage_value(owner, H256::from_low_u64_be(2))
            .unwrap(),
        U256::from(77)
    );
    // no value accounting: neither G_callvalue nor the stipend appear.
    // The callee runs three (op, PUSH1, SSTORE-to-fresh-slot) sequences.
    let expected_callee_gas = 3 * (2 + 3 + 20_000);
    assert_eq!(
        vm.env.consumed_gas,
        TX_BASE_COST + 18 + 700 + expected_callee_gas
    );
}

#[test]
fn call_returns_callee_output_into_memory() {
    let callee_return_value = U256::from(0xAAAAAAA);
    let callee_address = Address::from_low_u64_be(2);
    let callee_account = Account::default()
        .with_balance(50_000.into())
        .with_bytecode(callee_return_bytecode(callee_return_value));

    let caller_ops = vec![
        Operation::Push((1, U256::from(32))),      // ret_size
        Operation::Push((1, U256::zero())),        // ret_offset
        Operation::Push((1, U256::zero())),        // args_size
        Operation::Push((1, U256::zero())),        // args_offset
        Operation::Push((1, U256::zero())),        // value
        Operation::Push((1, U256::from(2))),       // address
        Operation::Push((4, U256::from(100_000))), // gas
        Operation::Call,
        Operation::Stop,
    ];
    let mut vm = new_vm_with_ops_addr_bal(
        ops_to_bytecode(&caller_ops),
        Address::from_low_u64_be(1),
        U256::zero(),
    );
    vm.db.add_account(callee_address, callee_account);

    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::one());
    assert_eq!(
        U256::from_big_endian(&frame.returndata),
        callee_return_value
    );
    assert_eq!(frame.memory.load(0), callee_return_value);
}

#[test]
fn nested_calls_propagate_results() {
    let innermost_value = U256::from(0xAAAAAAA);
    let inner_address = Address::from_low_u64_be(3);
    let inner_account = Account::default()
        .with_balance(50_000.into())
        .with_bytecode(callee_return_bytecode(innermost_value));

    // The middle contract calls the innermost one and returns its output
    let middle_ops = vec![
        Operation::Push((1, U256::from(32))),      // ret_size
        Operation::Push((1, U256::zero())),        // ret_offset
        Operation::Push((1, U256::zero())),        // args_size
        Operation::Push((1, U256::zero())),        // args_offset
        Operation::Push((1, U256::zero())),        // value
        Operation::Push((1, U256::from(3))),       // address
        Operation::Push((4, U256::from(100_000))), // gas
        Operation::Call,
        Operation::Pop,
        Operation::Push((1, U256::from(32))),
        Operation::Push((1, U256::zero())),
        Operation::Return,
    ];
    let middle_address = Address::from_low_u64_be(2);
    let middle_account = Account::default()
        .with_balance(50_000.into())
        .with_bytecode(ops_to_bytecode(&middle_ops));

    let caller_ops = vec![
        Operation::Push((1, U256::from(32))),      // ret_size
        Operation::Push((1, U256::zero())),        // ret_offset
        Operation::Push((1, U256::zero())),        // args_size
        Operation::Push((1, U256::zero())),        // args_offset
        Operation::Push((1, U256::zero())),        // value
        Operation::Push((1, U256::from(2))),       // address
        Operation::Push((4, U256::from(200_000))), // gas
        Operation::Call,
        Operation::Stop,
    ];
    let mut vm = new_vm_with_ops_addr_bal(
        ops_to_bytecode(&caller_ops),
        Address::from_low_u64_be(1),
        U256::from(1_000_000),
    );
    vm.db.add_account(middle_address, middle_account);
    vm.db.add_account(inner_address, inner_account);

    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::one());
    assert_eq!(U256::from_big_endian(&frame.returndata), innermost_value);
}

#[test]
fn failing_callee_rolls_back_its_writes() {
    let callee_address = Address::from_low_u64_be(2);
    // stores then runs an invalid opcode
    let callee_ops = vec![
        Operation::Push((1, U256::from(9))),
        Operation::Push((1, U256::zero())),
        Operation::Sstore,
        Operation::Invalid,
    ];
    let callee_account = Account::default().with_bytecode(ops_to_bytecode(&callee_ops));

    let caller_ops = call_ops(0, 2, 100_000);
    let mut vm = new_vm_with_ops_addr_bal(
        ops_to_bytecode(&caller_ops),
        Address::from_low_u64_be(1),
        U256::from(1000),
    );
    vm.db.add_account(callee_address, callee_account);

    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::zero());
    assert_eq!(
        vm.db
            .get_storage_value(callee_address, H256::zero())
            .unwrap(),
        U256::zero()
    );
    assert!(vm.substate.extract_logs().is_empty());
}

#[test]
fn call_to_ecrecover_with_invalid_signature_succeeds_with_empty_output() {
    let owner = Address::from_low_u64_be(OWNER);
    let precompile = Address::from_low_u64_be(1);
    // 128 zero bytes of calldata, taken from fresh memory
    let caller_ops = vec![
        Operation::Push((1, U256::zero())),        // ret_size
        Operation::Push((1, U256::zero())),        // ret_offset
        Operation::Push((1, U256::from(128))),     // args_size
        Operation::Push((1, U256::zero())),        // args_offset
        Operation::Push((2, U256::from(500))),     // value
        Operation::Push((1, U256::one())),         // address 0x01
        Operation::Push((4, U256::from(100_000))), // gas
        Operation::Call,
        Operation::Stop,
    ];
    let mut vm = new_vm_with_ops_addr_bal(
        ops_to_bytecode(&caller_ops),
        owner,
        U256::from(1000),
    );

    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::one());
    assert!(frame.returndata.is_empty());
    assert_eq!(vm.db.get_balance(precompile).unwrap(), U256::from(500));
    assert_eq!(vm.db.get_balance(owner).unwrap(), U256::from(500));
    // 7 pushes + args window memory + ecrecover cost, stipend handed back
    assert_eq!(
        vm.env.consumed_gas,
        TX_BASE_COST + 21 + 700 + 9000 - 2300 + 3000 + 12
    );
}

#[test]
fn call_to_identity_copies_input_to_output_window() {
    let caller_ops = vec![
        Operation::Push((32, U256::from(0x11223344u64))),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((1, U256::from(32))),      // ret_size
        Operation::Push((1, U256::from(64))),      // ret_offset
        Operation::Push((1, U256::from(32))),      // args_size
        Operation::Push((1, U256::zero())),        // args_offset
        Operation::Push((1, U256::zero())),        // value
        Operation::Push((1, U256::from(4))),       // address 0x04
        Operation::Push((4, U256::from(100_000))), // gas
        Operation::Call,
        Operation::Stop,
    ];
    let mut vm = new_vm_with_ops_addr_bal(
        ops_to_bytecode(&caller_ops),
        Address::from_low_u64_be(1),
        U256::from(1000),
    );
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::one());
    assert_eq!(frame.memory.load(64), U256::from(0x11223344u64));
}

// ---------------------------------------------------------------------------
// CREATE and SUICIDE
// ---------------------------------------------------------------------------

#[test]
fn create_deploys_returned_code_and_transfers_value() {
    let sender = Address::from_low_u64_be(0x2c);
    // init code: return one zero byte of contract code
    let init_code = ops_to_bytecode(&[
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::zero())),
        Operation::Return,
    ]);
    assert_eq!(init_code.len(), 5);

    // MSTORE right-aligns the pushed init code at bytes 27..32
    let caller_ops = vec![
        Operation::Push((5, U256::from_big_endian(&init_code))),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((1, U256::from(5))),     // size
        Operation::Push((1, U256::from(27))),    // offset
        Operation::Push((2, U256::from(1000))),  // value
        Operation::Create,
        Operation::Stop,
    ];
    let mut vm = new_vm_with_ops_addr_bal(
        ops_to_bytecode(&caller_ops),
        sender,
        U256::from(100_000),
    );
    let mut frame = run(&mut vm);

    let created = word_to_address(frame.stack.pop().unwrap());
    assert_eq!(created, WorldState::create_address(sender, 0));
    assert_eq!(vm.db.get_balance(created).unwrap(), U256::from(1000));
    assert_eq!(
        vm.db.get_balance(sender).unwrap(),
        U256::from(100_000 - 1000)
    );
    // spurious dragon contracts start at nonce 1; the creator's nonce bumps
    assert_eq!(vm.db.get_nonce(created).unwrap(), 1);
    assert_eq!(vm.db.get_nonce(sender).unwrap(), 1);
    assert_eq!(vm.db.get_code(created).unwrap(), Bytes::from_static(&[0]));
}

#[test]
fn create_with_insufficient_balance_pushes_zero() {
    let sender = Address::from_low_u64_be(0x2c);
    let caller_ops = vec![
        Operation::Push((1, U256::zero())),      // size
        Operation::Push((1, U256::zero())),      // offset
        Operation::Push((4, U256::from(50_000))), // value above balance
        Operation::Create,
        Operation::Stop,
    ];
    let mut vm =
        new_vm_with_ops_addr_bal(ops_to_bytecode(&caller_ops), sender, U256::from(1000));
    let mut frame = run(&mut vm);
    assert_eq!(frame.stack.pop().unwrap(), U256::zero());
    assert_eq!(vm.db.get_nonce(sender).unwrap(), 0);
}

#[test]
fn create_at_max_depth_pushes_zero() {
    let caller_ops = vec![
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::zero())),
        Operation::Create,
        Operation::Stop,
    ];
    let mut vm = new_vm_with_ops_addr_bal(
        ops_to_bytecode(&caller_ops),
        Address::from_low_u64_be(0x2c),
        U256::from(1000),
    );
    let mut frame = vm.call_frames.pop().unwrap();
    frame.depth = 1024;
    vm.execute(&mut frame).unwrap();
    assert_eq!(frame.stack.pop().unwrap(), U256::zero());
}

#[test]
fn suicide_moves_balance_and_schedules_deletion() {
    let owner = Address::from_low_u64_be(0x2c);
    let heir = Address::from_low_u64_be(0xbeef);
    let mut vm = new_vm_with_ops_addr_bal(
        ops_to_bytecode(&[
            Operation::Push((2, U256::from(0xbeef))),
            Operation::Suicide,
        ]),
        owner,
        U256::from(4200),
    );
    vm.db
        .add_account(heir, Account::default().with_balance(U256::from(1)));
    run(&mut vm);

    assert_eq!(vm.db.get_balance(owner).unwrap(), U256::zero());
    assert_eq!(vm.db.get_balance(heir).unwrap(), U256::from(4201));
    assert!(vm.substate.is_selfdestruct(&owner));
    assert_eq!(vm.substate.refunded_gas, 24_000);
}

// ---------------------------------------------------------------------------
// Transaction execution
// ---------------------------------------------------------------------------

fn tx_world(sender: Address, balance: U256) -> WorldState {
    WorldState::new(Arc::new(
        InMemoryDb::default().with_account(sender, Account::default().with_balance(balance)),
    ))
}

fn tx_env(origin: Address, gas_limit: u64, gas_price: u64) -> Environment {
    let mut env = Environment::default_from_fork(Fork::SpuriousDragon);
    env.origin = origin;
    env.gas_limit = gas_limit;
    env.gas_price = U256::from(gas_price);
    env.coinbase = Address::from_low_u64_be(0xc01);
    env
}

#[test]
fn plain_transfer_costs_base_gas() {
    let sender = Address::from_low_u64_be(0xaa);
    let receiver = Address::from_low_u64_be(0xbb);
    let world = tx_world(sender, U256::from(10_000_000));
    let tx = Transaction {
        nonce: 0,
        gas_price: U256::from(10),
        gas: 100_000,
        to: TxKind::Call(receiver),
        value: U256::from(1234),
        data: Bytes::new(),
        ..Default::default()
    };
    let mut vm = VM::new(tx_env(sender, tx.gas, 10), world);
    let report = vm.execute_transaction(&tx, sender).unwrap();

    assert!(report.is_success());
    assert_eq!(report.gas_used, 21_000);
    assert_eq!(vm.db.get_balance(receiver).unwrap(), U256::from(1234));
    assert_eq!(
        vm.db.get_balance(sender).unwrap(),
        U256::from(10_000_000 - 1234 - 21_000 * 10)
    );
    assert_eq!(
        vm.db.get_balance(vm.env.coinbase).unwrap(),
        U256::from(21_000 * 10)
    );
    assert_eq!(vm.db.get_nonce(sender).unwrap(), 1);
}

#[test]
fn failing_transaction_consumes_all_gas_and_keeps_debit() {
    let sender = Address::from_low_u64_be(0xaa);
    let contract = Address::from_low_u64_be(0xbb);
    let mut world = tx_world(sender, U256::from(10_000_000));
    world.add_account(
        contract,
        Account::default().with_bytecode(ops_to_bytecode(&[Operation::Invalid])),
    );
    let tx = Transaction {
        nonce: 0,
        gas_price: U256::from(1),
        gas: 60_000,
        to: TxKind::Call(contract),
        value: U256::from(999),
        data: Bytes::new(),
        ..Default::default()
    };
    let mut vm = VM::new(tx_env(sender, tx.gas, 1), world);
    let report = vm.execute_transaction(&tx, sender).unwrap();

    assert!(matches!(report.result, TxResult::Revert(VMError::InvalidOpcode(_))));
    assert_eq!(report.gas_used, 60_000);
    assert!(report.logs.is_empty());
    // the value transfer was rolled back, the gas debit was not
    assert_eq!(vm.db.get_balance(contract).unwrap(), U256::zero());
    assert_eq!(
        vm.db.get_balance(sender).unwrap(),
        U256::from(10_000_000 - 60_000)
    );
    assert_eq!(
        vm.db.get_balance(vm.env.coinbase).unwrap(),
        U256::from(60_000)
    );
    assert_eq!(vm.db.get_nonce(sender).unwrap(), 1);
}

#[test]
fn create_transaction_deploys_payload() {
    let sender = Address::from_low_u64_be(0xaa);
    let world = tx_world(sender, U256::from(10_000_000));
    // init code: return one zero byte as the contract's code
    let init = ops_to_bytecode(&[
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::zero())),
        Operation::Return,
    ]);
    let tx = Transaction {
        nonce: 0,
        gas_price: U256::from(1),
        gas: 200_000,
        to: TxKind::Create,
        value: U256::from(5),
        data: init,
        ..Default::default()
    };
    let mut vm = VM::new(tx_env(sender, tx.gas, 1), world);
    let report = vm.execute_transaction(&tx, sender).unwrap();

    assert!(report.is_success());
    let created = WorldState::create_address(sender, 0);
    assert_eq!(vm.db.get_balance(created).unwrap(), U256::from(5));
    assert_eq!(vm.db.get_nonce(created).unwrap(), 1);
    assert_eq!(vm.db.get_code(created).unwrap(), Bytes::from_static(&[0]));
    // intrinsic create cost is part of gas used
    assert!(report.gas_used > 53_000);
    let updates = vm.db.get_state_transitions();
    assert!(updates.iter().any(|update| update.address == created));
}

#[test]
fn storage_clear_refund_is_capped_at_half_of_gas_used() {
    let sender = Address::from_low_u64_be(0xaa);
    let contract = Address::from_low_u64_be(0xbb);
    let mut world = tx_world(sender, U256::from(10_000_000));
    let mut storage = std::collections::HashMap::new();
    storage.insert(H256::zero(), U256::from(7));
    world.add_account(
        contract,
        Account::default()
            .with_bytecode(ops_to_bytecode(&[
                Operation::Push((1, U256::zero())),
                Operation::Push((1, U256::zero())),
                Operation::Sstore,
                Operation::Stop,
            ]))
            .with_storage(storage),
    );
    let tx = Transaction {
        nonce: 0,
        gas_price: U256::from(1),
        gas: 100_000,
        to: TxKind::Call(contract),
        value: U256::zero(),
        data: Bytes::new(),
        ..Default::default()
    };
    let mut vm = VM::new(tx_env(sender, tx.gas, 1), world);
    let report = vm.execute_transaction(&tx, sender).unwrap();

    assert!(report.is_success());
    // pre-refund: 21000 + 2 pushes + reset = 26006; refund capped at half
    assert_eq!(report.gas_refunded, 13_003);
    assert_eq!(report.gas_used, 13_003);
    assert_eq!(
        vm.db.get_storage_value(contract, H256::zero()).unwrap(),
        U256::zero()
    );
}

#[test]
fn suicide_in_transaction_deletes_account_in_state_transitions() {
    let sender = Address::from_low_u64_be(0xaa);
    let contract = Address::from_low_u64_be(0xbb);
    let heir = Address::from_low_u64_be(0xcc);
    let mut world = tx_world(sender, U256::from(10_000_000));
    world.add_account(
        contract,
        Account::default()
            .with_balance(U256::from(5000))
            .with_bytecode(ops_to_bytecode(&[
                Operation::Push((2, U256::from(0xcc))),
                Operation::Suicide,
            ])),
    );
    let tx = Transaction {
        nonce: 0,
        gas_price: U256::from(1),
        gas: 100_000,
        to: TxKind::Call(contract),
        value: U256::zero(),
        data: Bytes::new(),
        ..Default::default()
    };
    let mut vm = VM::new(tx_env(sender, tx.gas, 1), world);
    let report = vm.execute_transaction(&tx, sender).unwrap();

    assert!(report.is_success());
    assert_eq!(vm.db.get_balance(heir).unwrap(), U256::from(5000));
    let updates = vm.db.get_state_transitions();
    let contract_update = updates
        .iter()
        .find(|update| update.address == contract)
        .unwrap();
    assert!(contract_update.removed);
}

#[test]
fn gas_used_is_bounded_by_limit_and_intrinsic_cost() {
    let sender = Address::from_low_u64_be(0xaa);
    let receiver = Address::from_low_u64_be(0xbb);
    let world = tx_world(sender, U256::from(10_000_000));
    let tx = Transaction {
        nonce: 0,
        gas_price: U256::one(),
        gas: 30_000,
        to: TxKind::Call(receiver),
        value: U256::zero(),
        data: Bytes::from_static(&[1, 0, 1]),
        ..Default::default()
    };
    let mut vm = VM::new(tx_env(sender, tx.gas, 1), world);
    let report = vm.execute_transaction(&tx, sender).unwrap();
    let intrinsic = 21_000 + 68 + 4 + 68;
    assert_eq!(report.gas_used, intrinsic);
    assert!(report.gas_used <= tx.gas);
}
