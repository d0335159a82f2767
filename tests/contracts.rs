use num_bigint::BigInt;

use sable::{
    Bytecode, CompileError, ExecutionFault, FileStorage, Hash, MemoryStorage, Op, Storage, Value,
    Vm, Word,
};

// ============================================================
// Helpers
// ============================================================

fn deploy(source: &str) -> Vm {
    let bytecode = sable::compile(source).unwrap();
    let mut vm = Vm::in_memory();
    vm.load(bytecode).unwrap();
    vm.deploy().unwrap();
    vm
}

fn call<S: Storage, A: Storage>(vm: &mut Vm<S, A>, index: usize, args: &[Value]) -> Word {
    vm.call_function(index, args)
        .unwrap()
        .expect("function left no value on the stack")
}

fn int(word: Word) -> i64 {
    i64::try_from(word.to_int()).unwrap()
}

fn hash_word(word: Word) -> Word {
    Word(Hash::digest(word.as_bytes()).0)
}

const BALANCES: &str = "contract Bank {
    mapping(Text => Int) balances

    func setBalance(key: Text, value: Int) {
        balances[key] = value
    }

    func getBalance(key: Text) -> Int {
        return balances[key]
    }
}";

// ============================================================
// Expressions
// ============================================================

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    let mut vm = deploy("contract C { func f() -> Int { return 2 + 3 * 4 } }");
    assert_eq!(int(call(&mut vm, 0, &[])), 14);
}

#[test]
fn test_logical_operators_bind_loosest() {
    let mut vm = deploy("contract C { func f(a: Int, b: Int, c: Bool) -> Bool { return a + b && c } }");
    // (1 + -1) && true is false; 1 + (-1 && true) would be truthy.
    let result = call(&mut vm, 0, &[Value::from(1), Value::from(-1), Value::from(true)]);
    assert_eq!(result, Word::from_bool(false));
}

#[test]
fn test_division_rounds_up() {
    let mut vm = deploy("contract C { func f() -> Int { return 7 / 2 } func g() -> Int { return -7 / 2 } }");
    assert_eq!(int(call(&mut vm, 0, &[])), 4);
    assert_eq!(int(call(&mut vm, 1, &[])), -3);
}

// ============================================================
// Storage
// ============================================================

#[test]
fn test_read_after_deploy() {
    let mut vm = deploy("contract Counter { var a: Int = 7 func read() -> Int { return a } }");
    assert_eq!(int(call(&mut vm, 0, &[])), 7);
}

#[test]
fn test_storage_slots_are_stable() {
    let bytecode = sable::compile(
        "contract C { var a: Int = 1 var b: Int = 2 func f() { a = a + b b = a } }",
    )
    .unwrap();
    let push = |n| Op::Push(Word::from_i64(n));

    assert_eq!(
        bytecode.initialization,
        vec![push(1), push(0), Op::Sstore, push(2), push(1), Op::Sstore]
    );
    assert_eq!(
        bytecode.function(0).unwrap().body,
        vec![
            push(0),
            Op::Sload,
            push(1),
            Op::Sload,
            Op::Add,
            push(0),
            Op::Sstore,
            push(0),
            Op::Sload,
            push(1),
            Op::Sstore,
        ]
    );
}

#[test]
fn test_balances_by_key() {
    let mut vm = deploy(BALANCES);

    vm.call_function(0, &[Value::from("alice"), Value::from(10)]).unwrap();
    vm.call_function(0, &[Value::from("alice"), Value::from(25)]).unwrap();
    assert_eq!(int(call(&mut vm, 1, &[Value::from("alice")])), 25);

    let err = vm.call_function(1, &[Value::from("bob")]).unwrap_err();
    assert!(matches!(err, ExecutionFault::MissingStorageKey(_)));
}

#[test]
fn test_nested_mapping_address() {
    let source = "contract C {
        mapping(Int => mapping(Int => Int)) m
        func set(k1: Int, k2: Int, v: Int) { m[k1][k2] = v }
        func get(k1: Int, k2: Int) -> Int { return m[k1][k2] }
    }";
    let args = [Value::from(3), Value::from(4)];

    let mut roots = Vec::new();
    for _ in 0..2 {
        let mut vm = deploy(source);
        vm.call_function(0, &[Value::from(3), Value::from(4), Value::from(9)])
            .unwrap();
        assert_eq!(int(call(&mut vm, 1, &args)), 9);

        let first = hash_word(Word::from_i64(3));
        let second = hash_word(Word::wrapping_from_int(&(first.to_int() + BigInt::from(4))));
        let stored = vm.storage().get(&second.to_hex()).unwrap();
        assert_eq!(stored, Some(Word::from_i64(9).as_bytes().to_vec()));

        roots.push(vm.storage().root_hash().unwrap());
    }
    assert_eq!(roots[0], roots[1]);
}

#[test]
fn test_account_root_tracks_storage() {
    let mut vm = deploy(BALANCES);
    vm.call_function(0, &[Value::from("alice"), Value::from(1)]).unwrap();

    let address = vm.address().unwrap();
    let root = vm.accounts().get(&address.to_string()).unwrap().unwrap();
    assert_eq!(root, vm.storage().root_hash().unwrap().as_slice().to_vec());
}

// ============================================================
// Control flow
// ============================================================

#[test]
fn test_if_else_takes_else_branch() {
    let mut vm = deploy(
        "contract C { var x: Int = 0 func f() -> Int { if false { x = 1 } else { x = 2 } return x } }",
    );
    assert_eq!(int(call(&mut vm, 0, &[])), 2);
}

#[test]
fn test_for_loop_runs_max_zero_n_times() {
    let source = "contract C {
        var total: Int = 0
        func count(n: Int) -> Int {
            for var i = 0; i < n; i = i + 1 {
                total = total + 1
            }
            return total
        }
    }";

    for (n, expected) in [(5, 5), (1, 1), (0, 0), (-3, 0)] {
        let mut vm = deploy(source);
        assert_eq!(int(call(&mut vm, 0, &[Value::from(n)])), expected, "n = {}", n);
    }
}

#[test]
fn test_early_return() {
    let mut vm = deploy(
        "contract C { func clamp(v: Int) -> Int { if v > 10 { return 10 } return v } }",
    );
    assert_eq!(int(call(&mut vm, 0, &[Value::from(42)])), 10);
    assert_eq!(int(call(&mut vm, 0, &[Value::from(3)])), 3);
}

// ============================================================
// Faults
// ============================================================

#[test]
fn test_undeclared_function_index() {
    let mut vm = deploy("contract C { func f() -> Int { return 1 } }");
    let err = vm.call_function(5, &[]).unwrap_err();
    assert!(matches!(err, ExecutionFault::UndefinedFunction(5)));
}

#[test]
fn test_undefined_parameter() {
    let mut vm = deploy("contract C { func f() -> Int { return missing } }");
    let err = vm.call_function(0, &[]).unwrap_err();
    assert!(matches!(err, ExecutionFault::UndefinedParameter(name) if name == "\"missing\""));
}

#[test]
fn test_memory_cleared_between_calls() {
    let mut vm = deploy(
        "contract C { func f(first: Bool) -> Int { if first { var t = 5 } return t } }",
    );
    assert_eq!(int(call(&mut vm, 0, &[Value::from(true)])), 5);

    let err = vm.call_function(0, &[Value::from(false)]).unwrap_err();
    assert!(matches!(err, ExecutionFault::MissingMemorySlot(_)));
}

#[test]
fn test_unknown_opcode_in_loaded_bytecode() {
    let err = Bytecode::from_json(r#"{"initialization": [{"opcode": "SELFDESTRUCT"}]}"#)
        .unwrap_err();
    assert!(matches!(err, ExecutionFault::UnknownOpcode(op) if op == "SELFDESTRUCT"));
}

#[test]
fn test_compile_errors_have_stable_codes() {
    let err = sable::Error::from(sable::compile("contract C { var a: Int = 1 # }").unwrap_err());
    assert_eq!(err.code(), "lex_error");

    let err = sable::Error::from(sable::compile("contract C { func f( }").unwrap_err());
    assert_eq!(err.code(), "parse_error");
}

#[test]
fn test_deep_else_if_chain_is_a_parse_error() {
    let chain = " else if a == 1 { x = 1 }".repeat(10_000);
    let source = format!(
        "contract C {{ var x: Int = 0 func f(a: Int) {{ if a == 0 {{ x = 0 }}{} }} }}",
        chain
    );
    let err = sable::Error::from(sable::compile(&source).unwrap_err());
    assert_eq!(err.code(), "parse_error");
    assert!(err.to_string().contains("nesting depth"), "{}", err);
}

#[test]
fn test_parameter_named_like_global_is_rejected() {
    let err = sable::compile("contract C { var a: Int = 1 func f(a: Int) -> Int { return a } }")
        .unwrap_err();
    assert!(matches!(err, CompileError::ShadowedParameter { .. }));
    assert_eq!(sable::Error::from(err).code(), "compile_error");
}

// ============================================================
// Persistence
// ============================================================

#[test]
fn test_file_storage_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let storage_path = dir.path().join("contract.json");
    let accounts_path = dir.path().join("accounts.json");

    let address = {
        let mut vm = Vm::new(
            FileStorage::open(&storage_path).unwrap(),
            FileStorage::open(&accounts_path).unwrap(),
        );
        vm.load(sable::compile(BALANCES).unwrap()).unwrap();
        let address = vm.deploy().unwrap();
        vm.call_function(0, &[Value::from("alice"), Value::from(40)])
            .unwrap();
        address
    };

    let mut vm = Vm::new(
        FileStorage::open(&storage_path).unwrap(),
        FileStorage::open(&accounts_path).unwrap(),
    );
    let bytecode = vm.get_bytecode(&address).unwrap();
    assert_eq!(vm.load(bytecode).unwrap(), address);
    assert_eq!(int(call(&mut vm, 1, &[Value::from("alice")])), 40);
}

#[test]
fn test_bytecode_json_round_trip_runs() {
    let bytecode = sable::compile(BALANCES).unwrap();
    let reloaded = Bytecode::from_json(&bytecode.to_json().unwrap()).unwrap();
    assert_eq!(reloaded.address().unwrap(), bytecode.address().unwrap());

    let mut vm: Vm<MemoryStorage, MemoryStorage> = Vm::in_memory();
    vm.load(reloaded).unwrap();
    vm.deploy().unwrap();
    vm.call_function(0, &[Value::from("k"), Value::from(3)]).unwrap();
    assert_eq!(int(call(&mut vm, 1, &[Value::from("k")])), 3);
}
