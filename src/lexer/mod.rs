pub mod tokens;

use thiserror::Error;
use tokens::{keyword_type, Token, TokenType};

#[derive(Debug, Error)]
#[error("{file}:{line}:{column}: {message}")]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub file: String,
}

pub struct Lexer {
    source: Vec<char>,
    filename: String,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(source: &str, filename: &str) -> Self {
        Self {
            source: source.chars().collect(),
            filename: filename.to_string(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexerError> {
        loop {
            self.skip_trivia();
            if self.at_end() {
                break;
            }
            self.scan_token()?;
        }

        self.tokens.push(self.make_token(TokenType::Eof, ""));
        Ok(self.tokens)
    }

    fn scan_token(&mut self) -> Result<(), LexerError> {
        let ch = self.peek();

        if ch == '"' {
            return self.scan_string();
        }

        if ch == '0' && matches!(self.peek_ahead(1), Some('x') | Some('X')) {
            return self.scan_hex();
        }

        if ch.is_ascii_digit() {
            return self.scan_number();
        }

        // Two-character operators
        let two = match (ch, self.peek_ahead(1)) {
            ('=', Some('=')) => Some((TokenType::Equals, "==")),
            ('!', Some('=')) => Some((TokenType::NotEquals, "!=")),
            ('<', Some('=')) => Some((TokenType::LessEqual, "<=")),
            ('>', Some('=')) => Some((TokenType::GreaterEqual, ">=")),
            ('&', Some('&')) => Some((TokenType::AndAnd, "&&")),
            ('|', Some('|')) => Some((TokenType::OrOr, "||")),
            _ => None,
        };
        if let Some((tt, text)) = two {
            self.tokens.push(self.make_token(tt, text));
            self.advance();
            self.advance();
            return Ok(());
        }

        // Single-character tokens
        let single = match ch {
            '(' => Some(TokenType::LParen),
            ')' => Some(TokenType::RParen),
            '{' => Some(TokenType::LBrace),
            '}' => Some(TokenType::RBrace),
            '[' => Some(TokenType::LBracket),
            ']' => Some(TokenType::RBracket),
            ',' => Some(TokenType::Comma),
            ':' => Some(TokenType::Colon),
            ';' => Some(TokenType::Semicolon),
            '.' => Some(TokenType::Dot),
            '-' => Some(TokenType::Minus),
            '<' => Some(TokenType::LessThan),
            '>' => Some(TokenType::GreaterThan),
            '=' => Some(TokenType::Assign),
            '!' => Some(TokenType::Bang),
            _ => None,
        };

        if let Some(tt) = single {
            let s = ch.to_string();
            self.tokens.push(self.make_token(tt, &s));
            self.advance();
            return Ok(());
        }

        if ch.is_alphabetic() || ch == '_' {
            return self.scan_identifier();
        }

        Err(self.error(format!("Unexpected character: {:?}", ch)))
    }

    fn scan_string(&mut self) -> Result<(), LexerError> {
        let start_line = self.line;
        let start_col = self.column;
        self.advance(); // opening quote
        let mut chars = String::new();

        while !self.at_end() && self.peek() != '"' {
            if self.peek() == '\n' {
                return Err(LexerError {
                    message: "Unterminated string literal".to_string(),
                    line: start_line,
                    column: start_col,
                    file: self.filename.clone(),
                });
            }
            if self.peek() == '\\' {
                self.advance();
                if !self.at_end() {
                    match self.peek() {
                        'n' => chars.push('\n'),
                        't' => chars.push('\t'),
                        other => chars.push(other),
                    }
                }
            } else {
                chars.push(self.peek());
            }
            self.advance();
        }

        if self.at_end() {
            return Err(LexerError {
                message: "Unterminated string literal".to_string(),
                line: start_line,
                column: start_col,
                file: self.filename.clone(),
            });
        }

        self.advance(); // closing quote
        self.tokens.push(Token {
            token_type: TokenType::StringLit,
            value: chars,
            line: start_line,
            column: start_col,
            file: self.filename.clone(),
        });
        Ok(())
    }

    /// Hex literals keep their `0x` prefix; nibble-count validation belongs to
    /// literal parsing so the error can name the expected type.
    fn scan_hex(&mut self) -> Result<(), LexerError> {
        let start_col = self.column;
        let mut text = String::from("0x");
        self.advance();
        self.advance();

        while !self.at_end() && self.peek().is_ascii_alphanumeric() {
            let c = self.peek();
            if !c.is_ascii_hexdigit() {
                return Err(self.error(format!("Invalid hex digit {:?} in literal", c)));
            }
            text.push(c);
            self.advance();
        }

        self.tokens.push(Token {
            token_type: TokenType::HexLit,
            value: text,
            line: self.line,
            column: start_col,
            file: self.filename.clone(),
        });
        Ok(())
    }

    fn scan_number(&mut self) -> Result<(), LexerError> {
        let start_col = self.column;
        let mut digits = String::new();

        while !self.at_end() && (self.peek().is_ascii_digit() || self.peek() == '_') {
            if self.peek() != '_' {
                digits.push(self.peek());
            }
            self.advance();
        }

        if !self.at_end() && (self.peek().is_alphabetic()) {
            return Err(self.error(format!(
                "Invalid number literal: {}{}",
                digits,
                self.peek()
            )));
        }

        self.tokens.push(Token {
            token_type: TokenType::Integer,
            value: digits,
            line: self.line,
            column: start_col,
            file: self.filename.clone(),
        });
        Ok(())
    }

    fn scan_identifier(&mut self) -> Result<(), LexerError> {
        let start_col = self.column;
        let mut word = String::new();

        while !self.at_end() && (self.peek().is_alphanumeric() || self.peek() == '_') {
            word.push(self.peek());
            self.advance();
        }

        let tt = keyword_type(&word).unwrap_or(TokenType::Identifier);
        self.tokens.push(Token {
            token_type: tt,
            value: word,
            line: self.line,
            column: start_col,
            file: self.filename.clone(),
        });
        Ok(())
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn skip_trivia(&mut self) {
        while !self.at_end() {
            let ch = self.peek();
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '/' && self.peek_ahead(1) == Some('/') {
                while !self.at_end() && self.peek() != '\n' {
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> char {
        self.source[self.pos]
    }

    fn peek_ahead(&self, offset: usize) -> Option<char> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.source[self.pos];
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        ch
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn make_token(&self, token_type: TokenType, value: &str) -> Token {
        Token {
            token_type,
            value: value.to_string(),
            line: self.line,
            column: self.column,
            file: self.filename.clone(),
        }
    }

    fn error(&self, message: String) -> LexerError {
        LexerError {
            message,
            line: self.line,
            column: self.column,
            file: self.filename.clone(),
        }
    }
}
