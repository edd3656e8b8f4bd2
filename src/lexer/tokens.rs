use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Eof,

    // Literals
    StringLit,
    Integer,
    HexLit,
    True,
    False,

    // Identifiers & punctuation
    Identifier,
    Dot,
    Comma,
    Colon,
    Semicolon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Minus,
    Assign,

    // Comparison / logic
    Equals,
    NotEquals,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    AndAnd,
    OrOr,
    Bang,

    // Keywords: header
    Set,
    Output,
    Folder,
    Connection,
    Emission,
    Mode,
    Streaming,
    Batch,

    // Keywords: filters
    Blocks,
    Transactions,
    Log,
    Entries,
    Smart,
    Contract,
    If,
    Any,
    Indexed,
    In,

    // Keywords: block bounds
    Earliest,
    Current,
    Pending,
    Continuous,

    // Keywords: emission
    Emit,
    Csv,
    Row,
    Line,
    Xes,
    Event,
    Trace,
    As,
}

impl TokenType {
    /// Whether this keyword token can appear as a name segment after a dot
    /// (`entry.address`, `contract.address`) or as an emitted attribute name.
    pub fn can_be_identifier(&self) -> bool {
        matches!(
            self,
            TokenType::Output
                | TokenType::Folder
                | TokenType::Mode
                | TokenType::Row
                | TokenType::Line
                | TokenType::Event
                | TokenType::Trace
                | TokenType::Current
                | TokenType::Pending
                | TokenType::Contract
                | TokenType::Log
        )
    }
}

/// Look up a keyword string and return its TokenType, or None if it's a plain identifier.
pub fn keyword_type(word: &str) -> Option<TokenType> {
    match word {
        "SET" => Some(TokenType::Set),
        "OUTPUT" => Some(TokenType::Output),
        "FOLDER" => Some(TokenType::Folder),
        "CONNECTION" => Some(TokenType::Connection),
        "EMISSION" => Some(TokenType::Emission),
        "MODE" => Some(TokenType::Mode),
        "STREAMING" => Some(TokenType::Streaming),
        "BATCH" => Some(TokenType::Batch),
        "BLOCKS" => Some(TokenType::Blocks),
        "TRANSACTIONS" => Some(TokenType::Transactions),
        "LOG" => Some(TokenType::Log),
        "ENTRIES" => Some(TokenType::Entries),
        "SMART" => Some(TokenType::Smart),
        "CONTRACT" => Some(TokenType::Contract),
        "IF" => Some(TokenType::If),
        "ANY" => Some(TokenType::Any),
        "IN" => Some(TokenType::In),
        "EARLIEST" => Some(TokenType::Earliest),
        "CURRENT" => Some(TokenType::Current),
        "PENDING" => Some(TokenType::Pending),
        "CONTINUOUS" => Some(TokenType::Continuous),
        "EMIT" => Some(TokenType::Emit),
        "CSV" => Some(TokenType::Csv),
        "ROW" => Some(TokenType::Row),
        "LINE" => Some(TokenType::Line),
        "XES" => Some(TokenType::Xes),
        "EVENT" => Some(TokenType::Event),
        "TRACE" => Some(TokenType::Trace),
        "AS" => Some(TokenType::As),
        "indexed" => Some(TokenType::Indexed),
        "true" => Some(TokenType::True),
        "false" => Some(TokenType::False),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub line: usize,
    pub column: usize,
    pub file: String,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.token_type {
            TokenType::Eof => {
                write!(f, "Token({:?}, {}:{})", self.token_type, self.line, self.column)
            }
            _ => {
                write!(
                    f,
                    "Token({:?}, {:?}, {}:{})",
                    self.token_type, self.value, self.line, self.column
                )
            }
        }
    }
}
