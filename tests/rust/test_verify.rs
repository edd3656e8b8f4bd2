//! Verification tests: one section per analyzer, plus the compile pipeline

use ethlog_lang::compile::{compile_query, parse_query, CompileError};
use ethlog_lang::config::EmissionMode;
use ethlog_lang::verify::{self, Diagnostic, Severity};

const TOKEN: &str = "0x00000000000000000000000000000000000000aa";
const OTHER: &str = "0x00000000000000000000000000000000000000bb";

fn diagnostics(source: &str) -> Vec<Diagnostic> {
    let document = parse_query(source, "test.ql").unwrap();
    verify::analyze(&document)
}

fn codes(source: &str) -> Vec<&'static str> {
    diagnostics(source).into_iter().map(|d| d.code).collect()
}

/// Wraps a body in a one-block range so block constants are in scope.
fn in_block(body: &str) -> String {
    format!("BLOCKS (1)(1) {{ {} }}", body)
}

fn gate(condition: &str) -> String {
    in_block(&format!("IF ({}) {{ }}", condition))
}

// ── Accepted queries ────────────────────────────────────────

#[test]
fn clean_query_has_no_diagnostics() {
    let source = format!(
        "SET EMISSION MODE BATCH;
         BLOCKS (100)(200) {{
           uint256 total = 0;
           TRANSACTIONS (ANY)(ANY) {{
             total = add(total, tx.value);
             IF (tx.value > 0 && tx.to != {}) {{
               EMIT CSV ROW (\"txs\")(tx.hash, tx.value AS value, total);
             }}
           }}
           LOG ENTRIES ({})(Transfer(address indexed from, address indexed to, uint256 value)) {{
             EMIT LOG LINE (entry.logIndex, from, to, value);
           }}
         }}",
        TOKEN, TOKEN
    );
    assert_eq!(diagnostics(&source), vec![]);
}

#[test]
fn contract_outputs_are_in_scope() {
    let source = in_block(&format!(
        "SMART CONTRACT ({})(uint8 decimals, (uint256 bal) = balanceOf(address {})) {{
           EMIT CSV ROW (\"balances\")(contract.address, decimals, bal);
         }}",
        TOKEN, OTHER
    ));
    assert_eq!(codes(&source), Vec::<&str>::new());
}

// ── Variables (E1xx) ────────────────────────────────────────

#[test]
fn unknown_variable() {
    assert_eq!(codes(&in_block("EMIT LOG LINE (missing);")), vec!["E100"]);
}

#[test]
fn unknown_variable_in_filter() {
    assert_eq!(codes("BLOCKS (start)(10) { }"), vec!["E100"]);
}

#[test]
fn unknown_variable_in_condition() {
    assert_eq!(codes(&gate("nope == 1")), vec!["E100"]);
}

#[test]
fn block_constants_are_not_visible_outside_the_range() {
    assert_eq!(codes("BLOCKS (1)(1) { } EMIT LOG LINE (block.number);"), vec!["E100"]);
}

#[test]
fn redeclared_variable() {
    assert_eq!(codes(&in_block("uint256 x = 1; uint256 x = 2;")), vec!["E101"]);
}

#[test]
fn shadowing_an_outer_variable() {
    assert_eq!(codes("uint256 x = 1; BLOCKS (1)(1) { bool x = true; }"), vec!["E101"]);
}

#[test]
fn assignment_to_unknown_variable() {
    assert_eq!(codes(&in_block("y = 1;")), vec!["E102"]);
}

#[test]
fn assignment_to_constant() {
    let found = diagnostics(&in_block("block.number = 5;"));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].code, "E103");
    assert!(found[0].message.contains("block.number"));
}

#[test]
fn scope_constant_clashes_with_variable() {
    let source = "uint256 amount = 0; BLOCKS (1)(1) { LOG ENTRIES (ANY)(Deposit(uint256 amount)) { } }";
    assert_eq!(codes(source), vec!["E104"]);
}

// ── Nesting (E2xx) ──────────────────────────────────────────

#[test]
fn transactions_outside_a_block_range() {
    let found = diagnostics("TRANSACTIONS (ANY)(ANY) { }");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].code, "E201");
    assert!(found[0].message.contains("exactly one block range"));
}

#[test]
fn nested_block_ranges() {
    let found = codes("BLOCKS (1)(2) { IF (true) { BLOCKS (3)(4) { } } }");
    assert_eq!(found.iter().filter(|c| **c == "E201").count(), 1);
    // the inner range also re-binds every block constant
    assert!(found.iter().all(|c| *c == "E201" || *c == "E104"));
}

#[test]
fn smart_contract_inside_transactions() {
    let source = in_block(&format!(
        "TRANSACTIONS (ANY)(ANY) {{ SMART CONTRACT ({})(uint8 d) {{ }} }}",
        TOKEN
    ));
    assert_eq!(codes(&source), vec!["E201"]);
}

// ── Filters (E3xx) ──────────────────────────────────────────

#[test]
fn block_number_out_of_range() {
    assert_eq!(codes("BLOCKS (99999999999999999999999)(1) { }"), vec!["E301"]);
}

#[test]
fn block_bound_must_be_integer() {
    assert_eq!(codes("bool flag = true; BLOCKS (flag)(10) { }"), vec!["E302"]);
}

#[test]
fn continuous_start() {
    assert_eq!(codes("BLOCKS (CONTINUOUS)(CONTINUOUS) { }"), vec!["E303"]);
}

#[test]
fn earliest_end() {
    assert_eq!(codes("BLOCKS (1)(EARLIEST) { }"), vec!["E304"]);
}

#[test]
fn reversed_range_is_reported_at_start() {
    let found = diagnostics("BLOCKS (10)(5) { }");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].code, "E305");
    assert_eq!((found[0].line, found[0].column), (1, 9));
}

#[test]
fn invalid_address_literal() {
    let source = in_block("LOG ENTRIES (0xabcd)(Ping(uint256 v)) { }");
    assert_eq!(codes(&source), vec!["E306"]);
}

#[test]
fn address_variable_must_be_address() {
    let source = "uint256 n = 1; BLOCKS (1)(1) { TRANSACTIONS (n)(ANY) { } }";
    assert_eq!(codes(source), vec!["E307"]);
}

#[test]
fn address_array_variable_is_accepted() {
    let source = format!(
        "address[] watched = [{}, {}]; BLOCKS (1)(1) {{ TRANSACTIONS (ANY)(watched) {{ }} }}",
        TOKEN, OTHER
    );
    assert!(codes(&source).is_empty());
}

#[test]
fn event_without_parameters() {
    let found = diagnostics(&in_block("LOG ENTRIES (ANY)(Ping()) { }"));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].code, "E308");
    assert_eq!(found[0].message, "event 'Ping' declares no parameters");
}

#[test]
fn contract_without_queries_or_outputs() {
    let none = in_block(&format!("SMART CONTRACT ({})() {{ }}", TOKEN));
    assert_eq!(codes(&none), vec!["E308"]);
    let no_outputs = in_block(&format!("SMART CONTRACT ({})(() = ping()) {{ }}", TOKEN));
    assert_eq!(codes(&no_outputs), vec!["E308"]);
}

#[test]
fn duplicate_event_parameter() {
    let source = in_block("LOG ENTRIES (ANY)(Swap(address indexed a, uint256 a)) { }");
    assert_eq!(codes(&source), vec!["E309"]);
}

#[test]
fn duplicate_contract_output() {
    let source = in_block(&format!(
        "SMART CONTRACT ({})(uint8 x, (uint256 x) = other()) {{ }}",
        TOKEN
    ));
    assert_eq!(codes(&source), vec!["E309"]);
}

#[test]
fn smart_contract_needs_one_address() {
    let any = in_block("SMART CONTRACT (ANY)(uint8 decimals) { }");
    assert_eq!(codes(&any), vec!["E310"]);
    let two = in_block(&format!("SMART CONTRACT ({}, {})(uint8 decimals) {{ }}", TOKEN, OTHER));
    assert_eq!(codes(&two), vec!["E310"]);
    let many = format!(
        "address[] many = [{}]; BLOCKS (1)(1) {{ SMART CONTRACT (many)(uint8 decimals) {{ }} }}",
        TOKEN
    );
    assert_eq!(codes(&many), vec!["E310"]);
}

// ── Types (E4xx) ────────────────────────────────────────────

#[test]
fn declaration_literal_out_of_range() {
    assert_eq!(codes(&in_block("uint8 x = 300;")), vec!["E401"]);
}

#[test]
fn declaration_type_mismatch() {
    let found = diagnostics(&in_block("bool b = block.number;"));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].code, "E401");
    assert_eq!(found[0].message, "expected a value of type bool, found uint256");
}

#[test]
fn integer_widths_are_compatible() {
    assert!(codes(&in_block("int64 x = block.number; uint8 y = 255;")).is_empty());
}

#[test]
fn assignment_type_mismatch() {
    assert_eq!(codes(&in_block("string s = \"a\"; s = block.number;")), vec!["E402"]);
}

#[test]
fn unknown_method() {
    assert_eq!(codes(&in_block("EMIT LOG LINE (sqrt(block.number));")), vec!["E403"]);
}

#[test]
fn no_matching_overload() {
    let found = diagnostics(&in_block("EMIT LOG LINE (lowercase(block.number));"));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].code, "E404");
    assert_eq!(found[0].message, "no overload of 'lowercase' accepts (uint256)");
}

#[test]
fn method_result_types_flow() {
    assert!(codes(&in_block("string s = toString(add(block.number, 1));")).is_empty());
}

#[test]
fn incompatible_equality() {
    assert_eq!(codes(&gate("block.hash == \"x\"")), vec!["E405"]);
}

#[test]
fn membership_needs_matching_array() {
    assert_eq!(codes(&gate("block.number IN [\"a\"]")), vec!["E406"]);
    assert_eq!(codes(&gate("block.number IN 5")), vec!["E406"]);
    assert!(codes(&gate("block.number IN [1, 2, 3]")).is_empty());
}

#[test]
fn ordering_needs_integers() {
    assert_eq!(codes(&gate("block.hash > 1")), vec!["E407"]);
}

#[test]
fn logical_operands_must_be_bool() {
    assert_eq!(codes(&gate("block.number && true")), vec!["E408"]);
    assert_eq!(codes(&gate("!block.number")), vec!["E409"]);
}

#[test]
fn condition_must_be_bool() {
    assert_eq!(codes(&gate("block.number")), vec!["E410"]);
    assert!(codes(&gate("isZero(block.number) || block.number >= 10")).is_empty());
}

#[test]
fn condition_error_before_body_statements() {
    let source = in_block("IF (block.number) { EMIT LOG LINE (block.number); }");
    assert_eq!(codes(&source), vec!["E410"]);
}

#[test]
fn contract_input_type() {
    let source = in_block(&format!(
        "SMART CONTRACT ({})((uint256 bal) = balanceOf(address 5)) {{ }}",
        TOKEN
    ));
    assert_eq!(codes(&source), vec!["E411"]);
}

#[test]
fn untyped_literals_must_parse() {
    let huge = "9".repeat(90);
    assert_eq!(codes(&gate("block.number IN [1, -2]")), vec!["E412"]);
    assert_eq!(codes(&gate(&format!("block.number == {}", huge))), vec!["E412"]);
    assert_eq!(
        codes(&in_block(&format!("EMIT LOG LINE (block.number, -{});", huge))),
        vec!["E412"]
    );
    assert_eq!(
        codes(&in_block(&format!("EMIT LOG LINE (add(block.number, {}));", huge))),
        vec!["E412"]
    );
}

#[test]
fn literals_the_analyzer_accepts_also_build() {
    let max = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
    let source = gate(&format!("block.number < {} && block.number IN [1, 2]", max));
    assert!(compile_query(&source, "q.ql").is_ok());

    match compile_query(&gate("block.number IN [1, -2]"), "q.ql") {
        Err(CompileError::Rejected(found)) => assert_eq!(found[0].code, "E412"),
        other => panic!("expected rejection, got {:?}", other.map(|_| ())),
    }
}

// ── Emission (E5xx / W5xx) ──────────────────────────────────

#[test]
fn csv_row_checks() {
    assert_eq!(codes(&in_block("EMIT CSV ROW (\"t\")();")), vec!["E501"]);
    assert_eq!(
        codes(&in_block("EMIT CSV ROW (\"t\")(block.number, block.number);")),
        vec!["E502"]
    );
    assert_eq!(
        codes(&in_block("EMIT CSV ROW (\"t\")(block.number AS n, block.hash AS n);")),
        vec!["E502"]
    );
}

#[test]
fn empty_table_name() {
    assert_eq!(codes(&in_block("EMIT CSV ROW (\" \")(block.number);")), vec!["E503"]);
}

#[test]
fn empty_log_line() {
    assert_eq!(codes(&in_block("EMIT LOG LINE ();")), vec!["E504"]);
}

#[test]
fn xes_event_needs_a_name() {
    let found = diagnostics(&in_block("EMIT XES EVENT ()()()(block.number AS xs:int number);"));
    let errors: Vec<_> = found.iter().filter(|d| d.is_error()).map(|d| d.code).collect();
    assert_eq!(errors, vec!["E505"]);
}

#[test]
fn xes_event_recommended_attributes() {
    let found = diagnostics(&in_block("EMIT XES EVENT ()()()(\"mined\" AS name);"));
    assert_eq!(found.len(), 3);
    assert!(found.iter().all(|d| d.code == "W501" && d.severity == Severity::Warning));
    assert!(found[0].message.contains("timestamp"));
}

#[test]
fn complete_xes_event_is_silent() {
    let source = in_block(
        "EMIT XES EVENT (\"chain\")(block.number)()(\"mined\" AS name, block.timestamp AS xs:date timestamp,
           \"complete\" AS transition, block.miner AS resource);",
    );
    assert!(codes(&source).is_empty());
}

#[test]
fn unknown_xes_type() {
    let source = in_block("EMIT XES TRACE ()()(block.number AS xs:double n);");
    assert_eq!(codes(&source), vec!["E506"]);
}

#[test]
fn duplicate_xes_attribute() {
    let source = in_block("EMIT XES TRACE ()()(block.number AS n, block.hash AS n);");
    assert_eq!(codes(&source), vec!["E502"]);
}

// ── Reporting ───────────────────────────────────────────────

#[test]
fn diagnostics_are_ordered_by_position() {
    let source = "BLOCKS (1)(1) {\n  EMIT LOG LINE (b);\n  EMIT LOG LINE (a);\n}\nTRANSACTIONS (ANY)(ANY) { }";
    let found = diagnostics(source);
    let positions: Vec<_> = found.iter().map(|d| (d.code, d.line)).collect();
    assert_eq!(positions, vec![("E100", 2), ("E100", 3), ("E201", 5)]);
}

#[test]
fn diagnostic_display() {
    let found = diagnostics(&in_block("y = 1;"));
    assert_eq!(
        found[0].to_string(),
        "[ERROR] E102: test.ql:1:17: cannot assign to unknown variable 'y'"
    );
}

#[test]
fn diagnostics_serialize_to_json() {
    let found = diagnostics(&in_block("y = 1;"));
    let json: serde_json::Value = serde_json::to_value(&found).unwrap();
    assert_eq!(json[0]["severity"], "error");
    assert_eq!(json[0]["code"], "E102");
    assert_eq!(json[0]["line"], 1);
}

#[test]
fn has_errors_ignores_warnings() {
    let warnings = diagnostics(&in_block("EMIT XES EVENT ()()()(\"mined\" AS name);"));
    assert!(!verify::has_errors(&warnings));
    assert!(verify::has_errors(&diagnostics(&in_block("y = 1;"))));
}

// ── Compile pipeline ────────────────────────────────────────

#[test]
fn syntax_errors_become_diagnostics() {
    let lex = parse_query("BLOCKS @", "q.ql").unwrap_err();
    assert_eq!(lex.code, "S001");
    let parse = parse_query("BLOCKS (1)", "q.ql").unwrap_err();
    assert_eq!(parse.code, "S002");
    assert_eq!(parse.file, "q.ql");
}

#[test]
fn rejected_query_keeps_diagnostics() {
    match compile_query(&in_block("y = 1;"), "q.ql") {
        Err(CompileError::Rejected(found)) => {
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].code, "E102");
        }
        other => panic!("expected rejection, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn compiled_query_carries_config_and_warnings() {
    let source = format!(
        "SET OUTPUT FOLDER \"out\"; SET EMISSION MODE BATCH; {}",
        in_block("EMIT XES EVENT ()()()(\"mined\" AS name);")
    );
    let compiled = compile_query(&source, "q.ql").unwrap();
    assert_eq!(compiled.config.emission_mode, EmissionMode::Batch);
    assert_eq!(compiled.config.output_folder.as_deref(), Some(std::path::Path::new("out")));
    assert_eq!(compiled.diagnostics.len(), 3);
    assert_eq!(compiled.program.scope_count(), 1);
}
