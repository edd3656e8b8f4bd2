//! Type tests: Solidity types, literals, scope table, nesting rule, library

use ethlog_lang::ast::ScopeKind;
use ethlog_lang::library;
use ethlog_lang::scope::{self, check_nesting, ScopeTable, Variable};
use ethlog_lang::types::literal::parse_untyped;
use ethlog_lang::types::{are_compatible, parse_literal, type_of, Literal, LiteralError, SolidityType, Value};

fn ty(name: &str) -> SolidityType {
    SolidityType::parse(name).unwrap()
}

fn int(text: &str) -> Literal {
    Literal::Integer(text.into())
}

fn hex(text: &str) -> Literal {
    Literal::Hex(text.into())
}

// ── Type names ──────────────────────────────────────────────

#[test]
fn parse_scalar_types() {
    assert_eq!(ty("address"), SolidityType::Address);
    assert_eq!(ty("bool"), SolidityType::Bool);
    assert_eq!(ty("string"), SolidityType::String);
    assert_eq!(ty("bytes"), SolidityType::Bytes(None));
    assert_eq!(ty("bytes32"), SolidityType::bytes32());
    assert_eq!(ty("uint8"), SolidityType::Int { signed: false, bits: 8 });
    assert_eq!(ty("int128"), SolidityType::Int { signed: true, bits: 128 });
}

#[test]
fn int_aliases_are_256_bits() {
    assert_eq!(ty("uint"), SolidityType::uint256());
    assert_eq!(ty("int"), SolidityType::int256());
}

#[test]
fn parse_array_types() {
    assert_eq!(ty("address[]"), SolidityType::array_of(SolidityType::Address));
    assert_eq!(
        ty("uint256[][]"),
        SolidityType::array_of(SolidityType::array_of(SolidityType::uint256()))
    );
}

#[test]
fn reject_invalid_type_names() {
    for name in ["uint7", "uint512", "int0", "bytes0", "bytes33", "float", "addr"] {
        assert!(SolidityType::parse(name).is_none(), "{} should not parse", name);
    }
}

#[test]
fn type_display_round_trips_names() {
    for name in ["address", "bool", "bytes", "bytes4", "int64", "uint256", "string", "address[]"] {
        assert_eq!(ty(name).to_string(), name);
    }
}

#[test]
fn compatibility() {
    assert!(are_compatible(&ty("uint8"), &ty("int256")));
    assert!(are_compatible(&ty("bytes4"), &ty("bytes")));
    assert!(are_compatible(&ty("uint8[]"), &ty("uint256[]")));
    assert!(!are_compatible(&ty("address"), &ty("bytes20")));
    assert!(!are_compatible(&ty("string"), &ty("bytes")));
    assert!(!are_compatible(&ty("bool"), &ty("uint8")));
}

// ── Literals ────────────────────────────────────────────────

#[test]
fn literal_types_without_context() {
    assert_eq!(type_of(&int("5")), Some(SolidityType::uint256()));
    assert_eq!(type_of(&int("-5")), Some(SolidityType::int256()));
    assert_eq!(
        type_of(&hex("0x00000000000000000000000000000000000000aa")),
        Some(SolidityType::Address)
    );
    assert_eq!(type_of(&hex("0xabcd")), Some(SolidityType::Bytes(None)));
    assert_eq!(type_of(&Literal::Str("x".into())), Some(SolidityType::String));
    assert_eq!(
        type_of(&Literal::Array(vec![int("1"), int("2")])),
        Some(SolidityType::array_of(SolidityType::uint256()))
    );
    assert_eq!(type_of(&Literal::Array(vec![])), None);
}

#[test]
fn integer_range_checks() {
    assert_eq!(parse_literal(&int("255"), &ty("uint8")).unwrap(), Value::int(255));
    assert!(matches!(
        parse_literal(&int("256"), &ty("uint8")),
        Err(LiteralError::OutOfRange { .. })
    ));
    assert!(matches!(
        parse_literal(&int("-1"), &ty("uint256")),
        Err(LiteralError::OutOfRange { .. })
    ));
    assert_eq!(parse_literal(&int("-128"), &ty("int8")).unwrap(), Value::int(-128));
    assert!(parse_literal(&int("128"), &ty("int8")).is_err());
}

#[test]
fn address_literals() {
    let text = "0x00000000000000000000000000000000000000aa";
    match parse_literal(&hex(text), &SolidityType::Address).unwrap() {
        Value::Address(bytes) => {
            assert_eq!(bytes.len(), 20);
            assert_eq!(bytes[19], 0xaa);
        }
        other => panic!("unexpected value {:?}", other),
    }
    assert!(matches!(
        parse_literal(&hex("0xaabb"), &SolidityType::Address),
        Err(LiteralError::WrongLength { expected: 20, found: 2, .. })
    ));
}

#[test]
fn hex_literal_errors() {
    assert!(matches!(
        parse_literal(&hex("0xabc"), &SolidityType::Bytes(None)),
        Err(LiteralError::OddNibbles { .. })
    ));
    assert!(matches!(
        parse_literal(&hex("abcd"), &SolidityType::Bytes(None)),
        Err(LiteralError::MissingHexPrefix { .. })
    ));
    assert!(matches!(
        parse_literal(&hex("0x1234"), &ty("bytes4")),
        Err(LiteralError::WrongLength { expected: 4, found: 2, .. })
    ));
}

#[test]
fn literal_kind_mismatch() {
    let err = parse_literal(&Literal::Str("1".into()), &SolidityType::uint256()).unwrap_err();
    assert_eq!(err.to_string(), "a string literal cannot be used as uint256");
    assert!(parse_literal(&Literal::Bool(true), &SolidityType::String).is_err());
}

#[test]
fn array_literal_reports_element() {
    let literal = Literal::Array(vec![int("1"), int("300")]);
    let err = parse_literal(&literal, &ty("uint8[]")).unwrap_err();
    assert!(matches!(err, LiteralError::Element { index: 1, .. }));
    assert_eq!(
        parse_literal(&Literal::Array(vec![int("1")]), &ty("uint8[]")).unwrap(),
        Value::Array(vec![Value::int(1)])
    );
}

#[test]
fn untyped_literals() {
    assert_eq!(parse_untyped(&int("7")).unwrap(), Value::int(7));
    assert_eq!(parse_untyped(&Literal::Bool(false)).unwrap(), Value::Bool(false));
    assert_eq!(parse_untyped(&Literal::Array(vec![])).unwrap(), Value::Array(vec![]));
}

#[test]
fn value_display() {
    assert_eq!(Value::int(42).to_string(), "42");
    assert_eq!(Value::Bytes(vec![0xde, 0xad]).to_string(), "0xdead");
    assert_eq!(Value::Null.to_string(), "null");
    assert_eq!(
        Value::Array(vec![Value::Bool(true), Value::Str("x".into())]).to_string(),
        "[true, x]"
    );
}

#[test]
fn value_serializes_integers_as_strings() {
    let json = serde_json::to_string(&Value::Array(vec![Value::int(1), Value::Null])).unwrap();
    assert_eq!(json, "[\"1\",null]");
}

// ── Scope table ─────────────────────────────────────────────

#[test]
fn declare_and_resolve() {
    let mut table = ScopeTable::new();
    table.enter_scope(vec![]);
    table.declare("total", SolidityType::uint256()).unwrap();
    let var = table.resolve("total").unwrap();
    assert_eq!(var.ty, SolidityType::uint256());
    assert!(!var.is_constant);
    assert!(table.resolve("missing").is_none());
}

#[test]
fn inner_scopes_see_outer_names() {
    let mut table = ScopeTable::new();
    table.enter_scope(vec![]);
    table.declare("outer", SolidityType::Bool).unwrap();
    table.enter_scope(scope::block_constants());
    assert!(table.resolve("outer").is_some());
    assert!(table.resolve(scope::BLOCK_NUMBER).unwrap().is_constant);
    table.exit_scope();
    assert!(table.resolve(scope::BLOCK_NUMBER).is_none());
    assert_eq!(table.depth(), 1);
}

#[test]
fn redeclaring_a_visible_name_is_rejected() {
    let mut table = ScopeTable::new();
    table.enter_scope(vec![]);
    table.declare("x", SolidityType::Bool).unwrap();
    table.enter_scope(vec![]);
    let err = table.declare("x", SolidityType::uint256()).unwrap_err();
    assert_eq!(err.name, "x");
}

#[test]
fn constants_cannot_be_redeclared() {
    let mut table = ScopeTable::new();
    table.enter_scope(vec![Variable::constant("contract.address", SolidityType::Address)]);
    assert!(table.declare("contract.address", SolidityType::Address).is_err());
}

#[test]
fn names_are_reusable_after_scope_exit() {
    let mut table = ScopeTable::new();
    table.enter_scope(vec![]);
    table.enter_scope(vec![]);
    table.declare("tmp", SolidityType::Bool).unwrap();
    table.exit_scope();
    assert!(table.declare("tmp", SolidityType::Bool).is_ok());
}

#[test]
#[should_panic]
fn unbalanced_exit_panics() {
    let mut table = ScopeTable::new();
    table.exit_scope();
}

// ── Nesting rule ────────────────────────────────────────────

use ScopeKind::*;

#[test]
fn program_is_outermost() {
    assert!(check_nesting(&[], Program).is_ok());
    assert!(check_nesting(&[Program], Program).is_err());
    assert!(check_nesting(&[], BlockRange).is_err());
}

#[test]
fn block_ranges_do_not_nest() {
    assert!(check_nesting(&[Program], BlockRange).is_ok());
    assert!(check_nesting(&[Program, Generic], BlockRange).is_ok());
    assert!(check_nesting(&[Program, BlockRange], BlockRange).is_err());
    assert!(check_nesting(&[Program, BlockRange, Generic], BlockRange).is_err());
}

#[test]
fn transactions_need_a_block_range() {
    assert!(check_nesting(&[Program], Transaction).is_err());
    assert!(check_nesting(&[Program, BlockRange], Transaction).is_ok());
    assert!(check_nesting(&[Program, BlockRange, Generic], Transaction).is_ok());
    assert!(check_nesting(&[Program, BlockRange, Transaction], Transaction).is_err());
    assert!(check_nesting(&[Program, BlockRange, SmartContract], Transaction).is_err());
}

#[test]
fn log_entries_may_sit_in_a_transaction() {
    assert!(check_nesting(&[Program, BlockRange], LogEntry).is_ok());
    assert!(check_nesting(&[Program, BlockRange, Transaction], LogEntry).is_ok());
    assert!(check_nesting(&[Program, BlockRange, SmartContract], LogEntry).is_ok());
    assert!(check_nesting(&[Program, BlockRange, LogEntry], LogEntry).is_err());
    assert!(check_nesting(&[Program], LogEntry).is_err());
}

#[test]
fn smart_contracts_follow_transaction_rules() {
    assert!(check_nesting(&[Program, BlockRange], SmartContract).is_ok());
    assert!(check_nesting(&[Program, BlockRange, LogEntry], SmartContract).is_err());
    assert!(check_nesting(&[Program, BlockRange, SmartContract], SmartContract).is_err());
}

#[test]
fn generic_filters_nest_anywhere_inside_the_program() {
    assert!(check_nesting(&[], Generic).is_err());
    for open in [
        vec![Program],
        vec![Program, BlockRange],
        vec![Program, BlockRange, Transaction, LogEntry, Generic],
    ] {
        assert!(check_nesting(&open, Generic).is_ok());
    }
}

#[test]
fn violation_message_names_the_requirement() {
    let err = check_nesting(&[Program], Transaction).unwrap_err();
    assert_eq!(err.child, Transaction);
    assert_eq!(
        err.to_string(),
        "a transaction scope must be enclosed by exactly one block range"
    );
}

// ── Library ─────────────────────────────────────────────────

fn call(name: &str, arg_types: &[SolidityType], args: &[Value]) -> Value {
    library::resolve(name, arg_types).unwrap().invoke(args).unwrap()
}

#[test]
fn integer_methods() {
    let u = SolidityType::uint256();
    let both = [u.clone(), u.clone()];
    assert_eq!(call("add", &both, &[Value::int(2), Value::int(3)]), Value::int(5));
    assert_eq!(call("subtract", &both, &[Value::int(2), Value::int(3)]), Value::int(-1));
    assert_eq!(call("multiply", &both, &[Value::int(4), Value::int(3)]), Value::int(12));
    assert_eq!(call("divide", &both, &[Value::int(7), Value::int(2)]), Value::int(3));
    assert_eq!(call("modulo", &both, &[Value::int(7), Value::int(2)]), Value::int(1));
    assert_eq!(call("isZero", &[u], &[Value::int(0)]), Value::Bool(true));
}

#[test]
fn division_by_zero_is_an_error() {
    let u = SolidityType::uint256();
    let method = library::resolve("divide", &[u.clone(), u]).unwrap();
    let err = method.invoke(&[Value::int(1), Value::int(0)]).unwrap_err();
    assert_eq!(err.to_string(), "divide(): division by zero");
}

#[test]
fn text_methods() {
    let s = SolidityType::String;
    assert_eq!(
        call("concat", &[s.clone(), s.clone()], &[Value::Str("ab".into()), Value::Str("cd".into())]),
        Value::Str("abcd".into())
    );
    assert_eq!(
        call("lowercase", &[s.clone()], &[Value::Str("ABC".into())]),
        Value::Str("abc".into())
    );
    assert_eq!(
        call("matches", &[s.clone(), s.clone()], &[Value::Str("Transfer".into()), Value::Str("^Tr".into())]),
        Value::Bool(true)
    );
    assert_eq!(call("length", &[s], &[Value::Str("héllo".into())]), Value::int(5));
}

#[test]
fn overloads_resolve_by_argument_type() {
    let bytes_length = library::resolve("length", &[SolidityType::Bytes(None)]).unwrap();
    assert_eq!(bytes_length.invoke(&[Value::Bytes(vec![1, 2, 3])]).unwrap(), Value::int(3));
    assert_eq!(
        call("toString", &[SolidityType::Address], &[Value::Address(vec![0xaa; 20])]),
        Value::Str(format!("0x{}", "aa".repeat(20)))
    );
    assert!(library::resolve("toString", &[SolidityType::array_of(SolidityType::Bool)]).is_none());
    assert!(library::resolve("add", &[SolidityType::String, SolidityType::String]).is_none());
}

#[test]
fn unknown_method() {
    assert!(!library::has_method("sqrt"));
    assert!(library::has_method("length"));
}

#[test]
fn invalid_pattern_is_an_error() {
    let s = SolidityType::String;
    let method = library::resolve("matches", &[s.clone(), s]).unwrap();
    assert!(method
        .invoke(&[Value::Str("x".into()), Value::Str("(".into())])
        .is_err());
}
