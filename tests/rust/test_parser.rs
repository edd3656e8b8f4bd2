//! Parser tests: settings, scopes, filters, conditions, emission statements

use ethlog_lang::ast::*;
use ethlog_lang::config::EmissionMode;
use ethlog_lang::lexer::Lexer;
use ethlog_lang::parser::Parser;
use ethlog_lang::types::{Literal, SolidityType};

const TOKEN: &str = "0x00000000000000000000000000000000000000aa";

fn parse(source: &str) -> Document {
    let tokens = Lexer::new(source, "test.ql").tokenize().unwrap();
    Parser::new(tokens).parse().unwrap()
}

fn parse_err(source: &str) -> String {
    let tokens = Lexer::new(source, "test.ql").tokenize().unwrap();
    Parser::new(tokens).parse().unwrap_err().message
}

fn first_scope(source: &str) -> ScopeNode {
    match parse(source).statements.into_iter().next() {
        Some(Statement::Scope(node)) => node,
        other => panic!("expected a scope, got {:?}", other),
    }
}

/// The single statement inside `BLOCKS (1)(1) { ... }`.
fn body_statement(body: &str) -> Statement {
    let node = first_scope(&format!("BLOCKS (1)(1) {{ {} }}", body));
    assert_eq!(node.body.len(), 1);
    node.body.into_iter().next().unwrap()
}

fn emit(body: &str) -> EmitStatement {
    match body_statement(body) {
        Statement::Emit(e) => e,
        other => panic!("expected an emission, got {:?}", other),
    }
}

fn condition(source: &str) -> Condition {
    match first_scope(&format!("IF ({}) {{ }}", source)).filter {
        Filter::Generic { condition } => condition,
        other => panic!("expected a generic filter, got {:?}", other),
    }
}

// ── Settings ────────────────────────────────────────────────

#[test]
fn settings_header() {
    let doc = parse(
        "SET OUTPUT FOLDER \"./out\";\nSET CONNECTION \"ws://localhost:8546\";\nSET EMISSION MODE BATCH;",
    );
    assert_eq!(doc.settings.len(), 3);
    assert!(matches!(&doc.settings[0], Setting::OutputFolder { path, .. } if path == "./out"));
    assert!(matches!(&doc.settings[1], Setting::Connection { url, .. } if url == "ws://localhost:8546"));
    assert!(matches!(
        &doc.settings[2],
        Setting::EmissionMode { mode: EmissionMode::Batch, .. }
    ));
    assert!(doc.statements.is_empty());
}

#[test]
fn unknown_emission_mode() {
    assert!(parse_err("SET EMISSION MODE EAGER;").contains("emission mode"));
}

#[test]
fn empty_document() {
    let doc = parse("// nothing to do\n");
    assert!(doc.settings.is_empty());
    assert!(doc.statements.is_empty());
}

// ── Block ranges ────────────────────────────────────────────

#[test]
fn block_range_with_numbers() {
    let node = first_scope("BLOCKS (100)(200) { }");
    assert_eq!(node.kind(), ScopeKind::BlockRange);
    match node.filter {
        Filter::Blocks { from, to } => {
            assert!(matches!(from, BlockBound::Number { ref text, .. } if text == "100"));
            assert!(matches!(to, BlockBound::Number { ref text, .. } if text == "200"));
        }
        other => panic!("unexpected filter {:?}", other),
    }
}

#[test]
fn block_range_keywords_and_variables() {
    let node = first_scope("BLOCKS (EARLIEST)(CONTINUOUS) { }");
    assert!(matches!(
        node.filter,
        Filter::Blocks {
            from: BlockBound::Earliest(_),
            to: BlockBound::Continuous(_)
        }
    ));

    let node = first_scope("BLOCKS (start)(PENDING) { }");
    assert!(matches!(
        node.filter,
        Filter::Blocks {
            from: BlockBound::Variable { ref name, .. },
            to: BlockBound::Pending(_)
        } if name == "start"
    ));

    let node = first_scope("BLOCKS (CURRENT)(CURRENT) { }");
    assert!(matches!(
        node.filter,
        Filter::Blocks {
            from: BlockBound::Current(_),
            to: BlockBound::Current(_)
        }
    ));
}

#[test]
fn block_bound_rejects_strings() {
    assert!(parse_err("BLOCKS (\"1\")(2) { }").contains("block number"));
}

// ── Transactions and log entries ────────────────────────────

#[test]
fn transactions_filter() {
    let node = first_scope(&format!(
        "BLOCKS (1)(1) {{ TRANSACTIONS (ANY)({}, 0x00000000000000000000000000000000000000bb) {{ }} }}",
        TOKEN
    ));
    let Statement::Scope(inner) = &node.body[0] else {
        panic!("expected nested scope");
    };
    match &inner.filter {
        Filter::Transactions {
            senders,
            recipients,
        } => {
            assert!(matches!(senders, AddressList::Any(_)));
            match recipients {
                AddressList::Literals { addresses, .. } => {
                    assert_eq!(addresses.len(), 2);
                    assert_eq!(addresses[0], TOKEN);
                }
                other => panic!("unexpected list {:?}", other),
            }
        }
        other => panic!("unexpected filter {:?}", other),
    }
}

#[test]
fn log_entries_filter() {
    let node = first_scope(&format!(
        "LOG ENTRIES ({})(Transfer(address indexed from, address indexed to, uint256 value)) {{ }}",
        TOKEN
    ));
    assert_eq!(node.kind(), ScopeKind::LogEntry);
    let Filter::LogEntries { addresses, event } = node.filter else {
        panic!("expected log entries");
    };
    assert!(matches!(addresses, AddressList::Literals { .. }));
    assert_eq!(event.name, "Transfer");
    assert_eq!(event.params.len(), 3);
    assert!(event.params[0].indexed);
    assert_eq!(event.params[1].name, "to");
    assert!(!event.params[2].indexed);
    assert_eq!(event.params[2].ty, SolidityType::uint256());
}

#[test]
fn address_list_variable() {
    let node = first_scope("LOG ENTRIES (tokens)(Approval(address indexed owner)) { }");
    let Filter::LogEntries { addresses, .. } = node.filter else {
        panic!("expected log entries");
    };
    assert!(matches!(addresses, AddressList::Variable { ref name, .. } if name == "tokens"));
}

#[test]
fn unknown_parameter_type() {
    assert!(parse_err("LOG ENTRIES (ANY)(E(uint7 x)) { }").contains("Unknown type 'uint7'"));
}

// ── Smart contracts ─────────────────────────────────────────

#[test]
fn smart_contract_queries() {
    let node = first_scope(&format!(
        "SMART CONTRACT ({})(uint8 decimals, (uint256 bal) = balanceOf(address {}), (string n, string s) = meta()) {{ }}",
        TOKEN, TOKEN
    ));
    assert_eq!(node.kind(), ScopeKind::SmartContract);
    let Filter::SmartContract { queries, .. } = node.filter else {
        panic!("expected smart contract");
    };
    assert_eq!(queries.len(), 3);
    match &queries[0] {
        ContractQuery::Variable(output) => {
            assert_eq!(output.name, "decimals");
            assert_eq!(output.ty, SolidityType::Int { signed: false, bits: 8 });
        }
        other => panic!("unexpected query {:?}", other),
    }
    match &queries[1] {
        ContractQuery::Function {
            outputs,
            method,
            inputs,
            ..
        } => {
            assert_eq!(method, "balanceOf");
            assert_eq!(outputs[0].name, "bal");
            assert_eq!(inputs.len(), 1);
            assert_eq!(inputs[0].ty, SolidityType::Address);
        }
        other => panic!("unexpected query {:?}", other),
    }
    assert_eq!(queries[2].outputs().len(), 2);
    assert!(queries[2].inputs().is_empty());
}

// ── Conditions ──────────────────────────────────────────────

#[test]
fn comparison_condition() {
    match condition("tx.value > 0") {
        Condition::Compare { left, op, right, .. } => {
            assert_eq!(op, Comparator::Greater);
            assert!(matches!(*left, Condition::Value(ValueExpr::Variable { ref name, .. }) if name == "tx.value"));
            assert!(matches!(
                *right,
                Condition::Value(ValueExpr::Literal { literal: Literal::Integer(ref n), .. }) if n == "0"
            ));
        }
        other => panic!("unexpected condition {:?}", other),
    }
}

#[test]
fn and_binds_tighter_than_or() {
    match condition("a || b && c") {
        Condition::Or { left, right, .. } => {
            assert!(matches!(*left, Condition::Value(_)));
            assert!(matches!(*right, Condition::And { .. }));
        }
        other => panic!("unexpected condition {:?}", other),
    }
}

#[test]
fn parentheses_group() {
    match condition("(a || b) && c") {
        Condition::And { left, .. } => assert!(matches!(*left, Condition::Or { .. })),
        other => panic!("unexpected condition {:?}", other),
    }
}

#[test]
fn negation_and_membership() {
    match condition("!(x IN [1, 2, 3])") {
        Condition::Not { operand, .. } => match *operand {
            Condition::Compare { op, right, .. } => {
                assert_eq!(op, Comparator::In);
                match *right {
                    Condition::Value(ValueExpr::Literal {
                        literal: Literal::Array(items),
                        ..
                    }) => assert_eq!(items.len(), 3),
                    other => panic!("unexpected operand {:?}", other),
                }
            }
            other => panic!("unexpected operand {:?}", other),
        },
        other => panic!("unexpected condition {:?}", other),
    }
}

#[test]
fn negative_literal_in_condition() {
    match condition("delta < -5") {
        Condition::Compare { right, .. } => assert!(matches!(
            *right,
            Condition::Value(ValueExpr::Literal { literal: Literal::Integer(ref n), .. }) if n == "-5"
        )),
        other => panic!("unexpected condition {:?}", other),
    }
}

#[test]
fn method_call_in_condition() {
    match condition("isZero(tx.value)") {
        Condition::Value(ValueExpr::Call(call)) => {
            assert_eq!(call.name, "isZero");
            assert_eq!(call.args.len(), 1);
        }
        other => panic!("unexpected condition {:?}", other),
    }
}

// ── Statements ──────────────────────────────────────────────

#[test]
fn declaration() {
    match body_statement("uint256 total = 0;") {
        Statement::Declaration { ty, name, value, .. } => {
            assert_eq!(ty, SolidityType::uint256());
            assert_eq!(name, "total");
            assert!(matches!(value, ValueExpr::Literal { .. }));
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn array_declaration() {
    match body_statement(&format!("address[] watched = [{}];", TOKEN)) {
        Statement::Declaration { ty, .. } => {
            assert_eq!(ty, SolidityType::array_of(SolidityType::Address));
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn assignment_with_call() {
    match body_statement("total = add(total, tx.value);") {
        Statement::Assignment { name, value, .. } => {
            assert_eq!(name, "total");
            assert!(matches!(value, ValueExpr::Call(ref c) if c.name == "add" && c.args.len() == 2));
        }
        other => panic!("unexpected statement {:?}", other),
    }
}

#[test]
fn call_statement() {
    assert!(matches!(
        body_statement("toString(block.number);"),
        Statement::Call(ref c) if c.name == "toString"
    ));
}

#[test]
fn missing_semicolon() {
    assert!(parse_err("BLOCKS (1)(1) { uint256 x = 1 }").contains("Semicolon"));
}

#[test]
fn unclosed_scope() {
    assert!(parse_err("BLOCKS (1)(1) { EMIT LOG LINE (1);").contains("'}'"));
}

// ── Emission ────────────────────────────────────────────────

#[test]
fn csv_row() {
    match emit("EMIT CSV ROW (\"blocks\")(block.number, block.hash AS hash, 7);") {
        EmitStatement::CsvRow { table, columns, .. } => {
            assert_eq!(table, "blocks");
            assert_eq!(columns.len(), 3);
            assert_eq!(columns[0].name(0), "block.number");
            assert_eq!(columns[1].name(1), "hash");
            assert_eq!(columns[2].name(2), "column2");
        }
        other => panic!("unexpected emission {:?}", other),
    }
}

#[test]
fn log_line() {
    match emit("EMIT LOG LINE (\"block\", block.number);") {
        EmitStatement::LogLine { values, .. } => assert_eq!(values.len(), 2),
        other => panic!("unexpected emission {:?}", other),
    }
}

#[test]
fn xes_event() {
    let e = emit(
        "EMIT XES EVENT (\"p\")()(tx.hash)(\"transfer\" AS name, block.timestamp AS xs:date timestamp);",
    );
    match e {
        EmitStatement::XesEvent {
            pid,
            piid,
            eid,
            attributes,
            ..
        } => {
            assert!(pid.is_some());
            assert!(piid.is_none());
            assert!(eid.is_some());
            assert_eq!(attributes[0].name, "name");
            assert_eq!(attributes[0].xes_type, None);
            assert_eq!(attributes[1].name, "timestamp");
            assert_eq!(attributes[1].xes_type.as_deref(), Some("xs:date"));
        }
        other => panic!("unexpected emission {:?}", other),
    }
}

#[test]
fn xes_trace() {
    match emit("EMIT XES TRACE ()(tx.from)(tx.from AS xs:string owner);") {
        EmitStatement::XesTrace {
            pid,
            piid,
            attributes,
            ..
        } => {
            assert!(pid.is_none());
            assert!(piid.is_some());
            assert_eq!(attributes.len(), 1);
        }
        other => panic!("unexpected emission {:?}", other),
    }
}

#[test]
fn xes_attribute_needs_name() {
    assert!(parse_err("BLOCKS (1)(1) { EMIT XES TRACE ()()(1); }").contains("As"));
}

#[test]
fn unknown_emission_target() {
    assert!(parse_err("BLOCKS (1)(1) { EMIT JSON (1); }").contains("CSV ROW"));
}

// ── Structure ───────────────────────────────────────────────

#[test]
fn nested_scopes() {
    let node = first_scope(
        "BLOCKS (1)(2) { TRANSACTIONS (ANY)(ANY) { IF (tx.value > 0) { EMIT LOG LINE (tx.hash); } } }",
    );
    let Statement::Scope(txs) = &node.body[0] else {
        panic!("expected transactions");
    };
    assert_eq!(txs.kind(), ScopeKind::Transaction);
    let Statement::Scope(gate) = &txs.body[0] else {
        panic!("expected generic filter");
    };
    assert_eq!(gate.kind(), ScopeKind::Generic);
    assert!(matches!(gate.body[0], Statement::Emit(EmitStatement::LogLine { .. })));
}

#[test]
fn source_locations() {
    let doc = parse("\nBLOCKS (1)(1) {\n  EMIT LOG LINE (1);\n}");
    let Statement::Scope(node) = &doc.statements[0] else {
        panic!("expected scope");
    };
    assert_eq!((node.loc.line, node.loc.column), (2, 1));
    assert_eq!((node.body[0].loc().line, node.body[0].loc().column), (3, 3));
    assert_eq!(node.loc.file, "test.ql");
}

#[test]
fn excessive_nesting_is_rejected() {
    let mut source = String::new();
    for _ in 0..300 {
        source.push_str("IF (true) { ");
    }
    for _ in 0..300 {
        source.push_str("} ");
    }
    let message = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(move || parse_err(&source))
        .unwrap()
        .join()
        .unwrap();
    assert!(message.contains("Maximum nesting depth"));
}
