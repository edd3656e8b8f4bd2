//! Lexer tests: tokens, keywords, literals, error handling

use ethlog_lang::lexer::tokens::TokenType;
use ethlog_lang::lexer::Lexer;

fn lex(source: &str) -> Vec<(TokenType, String)> {
    let tokens = Lexer::new(source, "test.ql").tokenize().unwrap();
    tokens
        .into_iter()
        .filter(|t| !matches!(t.token_type, TokenType::Eof))
        .map(|t| (t.token_type, t.value))
        .collect()
}

fn lex_types(source: &str) -> Vec<TokenType> {
    lex(source).into_iter().map(|(tt, _)| tt).collect()
}

fn lex_err(source: &str) -> String {
    Lexer::new(source, "test.ql").tokenize().unwrap_err().message
}

// ── Basic tokens ────────────────────────────────────────────

#[test]
fn identifier() {
    let tokens = lex("balance");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0], (TokenType::Identifier, "balance".into()));
}

#[test]
fn dotted_name_is_split() {
    assert_eq!(
        lex_types("block.number"),
        vec![TokenType::Identifier, TokenType::Dot, TokenType::Identifier]
    );
}

#[test]
fn integer_literal() {
    let tokens = lex("42");
    assert_eq!(tokens[0], (TokenType::Integer, "42".into()));
}

#[test]
fn integer_separators_are_dropped() {
    let tokens = lex("1_000_000");
    assert_eq!(tokens[0], (TokenType::Integer, "1000000".into()));
}

#[test]
fn negative_integer_is_minus_then_integer() {
    assert_eq!(lex_types("-5"), vec![TokenType::Minus, TokenType::Integer]);
}

#[test]
fn hex_literal_keeps_prefix() {
    let tokens = lex("0xdeadBEEF");
    assert_eq!(tokens[0], (TokenType::HexLit, "0xdeadBEEF".into()));
}

#[test]
fn bare_hex_prefix() {
    let tokens = lex("0x");
    assert_eq!(tokens[0], (TokenType::HexLit, "0x".into()));
}

#[test]
fn string_literal() {
    let tokens = lex("\"Transfer events\"");
    assert_eq!(tokens[0], (TokenType::StringLit, "Transfer events".into()));
}

#[test]
fn string_escape_sequences() {
    let tokens = lex("\"a\\nb\\tc\\\"d\\\\e\"");
    assert_eq!(tokens[0].1, "a\nb\tc\"d\\e");
}

#[test]
fn boolean_literals() {
    assert_eq!(lex_types("true false"), vec![TokenType::True, TokenType::False]);
}

// ── Keywords ────────────────────────────────────────────────

#[test]
fn header_keywords() {
    assert_eq!(
        lex_types("SET OUTPUT FOLDER CONNECTION EMISSION MODE STREAMING BATCH"),
        vec![
            TokenType::Set,
            TokenType::Output,
            TokenType::Folder,
            TokenType::Connection,
            TokenType::Emission,
            TokenType::Mode,
            TokenType::Streaming,
            TokenType::Batch,
        ]
    );
}

#[test]
fn filter_keywords() {
    assert_eq!(
        lex_types("BLOCKS TRANSACTIONS LOG ENTRIES SMART CONTRACT IF ANY indexed IN"),
        vec![
            TokenType::Blocks,
            TokenType::Transactions,
            TokenType::Log,
            TokenType::Entries,
            TokenType::Smart,
            TokenType::Contract,
            TokenType::If,
            TokenType::Any,
            TokenType::Indexed,
            TokenType::In,
        ]
    );
}

#[test]
fn block_bound_keywords() {
    assert_eq!(
        lex_types("EARLIEST CURRENT PENDING CONTINUOUS"),
        vec![
            TokenType::Earliest,
            TokenType::Current,
            TokenType::Pending,
            TokenType::Continuous,
        ]
    );
}

#[test]
fn emission_keywords() {
    assert_eq!(
        lex_types("EMIT CSV ROW LINE XES EVENT TRACE AS"),
        vec![
            TokenType::Emit,
            TokenType::Csv,
            TokenType::Row,
            TokenType::Line,
            TokenType::Xes,
            TokenType::Event,
            TokenType::Trace,
            TokenType::As,
        ]
    );
}

#[test]
fn keywords_are_case_sensitive() {
    assert_eq!(
        lex_types("blocks Emit INDEXED"),
        vec![TokenType::Identifier, TokenType::Identifier, TokenType::Identifier]
    );
}

// ── Operators ───────────────────────────────────────────────

#[test]
fn comparison_operators() {
    assert_eq!(
        lex_types("== != < <= > >="),
        vec![
            TokenType::Equals,
            TokenType::NotEquals,
            TokenType::LessThan,
            TokenType::LessEqual,
            TokenType::GreaterThan,
            TokenType::GreaterEqual,
        ]
    );
}

#[test]
fn logical_operators() {
    assert_eq!(
        lex_types("&& || !"),
        vec![TokenType::AndAnd, TokenType::OrOr, TokenType::Bang]
    );
}

#[test]
fn punctuation() {
    assert_eq!(
        lex_types("( ) { } [ ] , : ; = ."),
        vec![
            TokenType::LParen,
            TokenType::RParen,
            TokenType::LBrace,
            TokenType::RBrace,
            TokenType::LBracket,
            TokenType::RBracket,
            TokenType::Comma,
            TokenType::Colon,
            TokenType::Semicolon,
            TokenType::Assign,
            TokenType::Dot,
        ]
    );
}

#[test]
fn xes_type_annotation() {
    assert_eq!(
        lex_types("xs:int"),
        vec![TokenType::Identifier, TokenType::Colon, TokenType::Identifier]
    );
}

// ── Trivia and positions ────────────────────────────────────

#[test]
fn comments_are_skipped() {
    let tokens = lex("BLOCKS // the range\n(1)");
    assert_eq!(
        tokens.iter().map(|(tt, _)| *tt).collect::<Vec<_>>(),
        vec![
            TokenType::Blocks,
            TokenType::LParen,
            TokenType::Integer,
            TokenType::RParen,
        ]
    );
}

#[test]
fn token_positions() {
    let tokens = Lexer::new("BLOCKS\n  (1)", "q.ql").tokenize().unwrap();
    assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
    assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    assert_eq!((tokens[2].line, tokens[2].column), (2, 4));
    assert_eq!(tokens[1].file, "q.ql");
}

#[test]
fn eof_is_last() {
    let tokens = Lexer::new("", "test.ql").tokenize().unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].token_type, TokenType::Eof);
}

// ── Errors ──────────────────────────────────────────────────

#[test]
fn unterminated_string() {
    assert!(lex_err("\"never closed").contains("Unterminated string"));
}

#[test]
fn string_cannot_span_lines() {
    assert!(lex_err("\"first\nsecond\"").contains("Unterminated string"));
}

#[test]
fn invalid_hex_digit() {
    assert!(lex_err("0x12zz").contains("Invalid hex digit"));
}

#[test]
fn number_followed_by_letter() {
    assert!(lex_err("12abc").contains("Invalid number literal"));
}

#[test]
fn unexpected_character() {
    assert!(lex_err("BLOCKS @").contains("Unexpected character"));
}

#[test]
fn error_position() {
    let err = Lexer::new("EMIT\n  #", "test.ql").tokenize().unwrap_err();
    assert_eq!((err.line, err.column), (2, 3));
}
