use thiserror::Error;

use crate::ast::*;
use crate::config::EmissionMode;
use crate::lexer::tokens::{Token, TokenType};
use crate::types::{Literal, SolidityType};

#[derive(Debug, Error)]
#[error("{file}:{line}:{column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub file: String,
}

const MAX_PARSER_DEPTH: usize = 256;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn enter_depth(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_PARSER_DEPTH {
            Err(self.error_here(format!(
                "Maximum nesting depth ({}) exceeded",
                MAX_PARSER_DEPTH
            )))
        } else {
            Ok(())
        }
    }

    fn exit_depth(&mut self) {
        self.depth -= 1;
    }

    // ── Public API ──────────────────────────────────────────────────────

    pub fn parse(&mut self) -> Result<Document, ParseError> {
        let loc = self.loc();
        let mut settings = Vec::new();
        while self.check(TokenType::Set) {
            settings.push(self.parse_setting()?);
        }

        let mut statements = Vec::new();
        while !self.at_end() {
            statements.push(self.parse_statement()?);
        }

        Ok(Document {
            loc,
            settings,
            statements,
        })
    }

    // ── Header ──────────────────────────────────────────────────────────

    fn parse_setting(&mut self) -> Result<Setting, ParseError> {
        let loc = self.loc();
        self.expect(TokenType::Set)?;
        let setting = match self.current().token_type {
            TokenType::Output => {
                self.advance();
                self.expect(TokenType::Folder)?;
                let path = self.expect(TokenType::StringLit)?.value.clone();
                Setting::OutputFolder { path, loc }
            }
            TokenType::Connection => {
                self.advance();
                let url = self.expect(TokenType::StringLit)?.value.clone();
                Setting::Connection { url, loc }
            }
            TokenType::Emission => {
                self.advance();
                self.expect(TokenType::Mode)?;
                let mode = match self.current().token_type {
                    TokenType::Streaming => EmissionMode::Streaming,
                    TokenType::Batch => EmissionMode::Batch,
                    _ => {
                        return Err(self.unexpected("emission mode (STREAMING, BATCH)"));
                    }
                };
                self.advance();
                Setting::EmissionMode { mode, loc }
            }
            _ => return Err(self.unexpected("setting (OUTPUT FOLDER, CONNECTION, EMISSION MODE)")),
        };
        self.expect(TokenType::Semicolon)?;
        Ok(setting)
    }

    // ── Statements ──────────────────────────────────────────────────────

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match self.current().token_type {
            TokenType::Blocks
            | TokenType::Transactions
            | TokenType::Log
            | TokenType::Smart
            | TokenType::If => Ok(Statement::Scope(self.parse_scope()?)),
            TokenType::Emit => {
                let emit = self.parse_emit()?;
                self.expect(TokenType::Semicolon)?;
                Ok(Statement::Emit(emit))
            }
            TokenType::Identifier => {
                let statement = if self.at_declaration() {
                    self.parse_declaration()?
                } else if self.peek_type(1) == Some(TokenType::LParen) {
                    Statement::Call(self.parse_call()?)
                } else {
                    self.parse_assignment()?
                };
                self.expect(TokenType::Semicolon)?;
                Ok(statement)
            }
            _ => Err(self.unexpected("statement")),
        }
    }

    /// `uint256 x = ...` and `address[] xs = ...` start with a type name
    /// followed by another identifier.
    fn at_declaration(&self) -> bool {
        if SolidityType::parse(&self.current().value).is_none() {
            return false;
        }
        let mut offset = 1;
        while self.peek_type(offset) == Some(TokenType::LBracket)
            && self.peek_type(offset + 1) == Some(TokenType::RBracket)
        {
            offset += 2;
        }
        self.peek_type(offset) == Some(TokenType::Identifier)
    }

    fn parse_declaration(&mut self) -> Result<Statement, ParseError> {
        let loc = self.loc();
        let ty = self.parse_type()?;
        let name = self.expect(TokenType::Identifier)?.value.clone();
        self.expect(TokenType::Assign)?;
        let value = self.parse_value()?;
        Ok(Statement::Declaration {
            ty,
            name,
            value,
            loc,
        })
    }

    fn parse_assignment(&mut self) -> Result<Statement, ParseError> {
        let loc = self.loc();
        let name = self.parse_name()?;
        self.expect(TokenType::Assign)?;
        let value = self.parse_value()?;
        Ok(Statement::Assignment { name, value, loc })
    }

    fn parse_body(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.expect(TokenType::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(TokenType::RBrace) {
            if self.at_end() {
                return Err(self.unexpected("'}'"));
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenType::RBrace)?;
        Ok(statements)
    }

    // ── Scopes ──────────────────────────────────────────────────────────

    fn parse_scope(&mut self) -> Result<ScopeNode, ParseError> {
        self.enter_depth()?;
        let loc = self.loc();
        let filter = match self.current().token_type {
            TokenType::Blocks => self.parse_blocks_filter()?,
            TokenType::Transactions => self.parse_transactions_filter()?,
            TokenType::Log => self.parse_log_entries_filter()?,
            TokenType::Smart => self.parse_smart_contract_filter()?,
            TokenType::If => {
                self.advance();
                self.expect(TokenType::LParen)?;
                let condition = self.parse_condition()?;
                self.expect(TokenType::RParen)?;
                Filter::Generic { condition }
            }
            _ => return Err(self.unexpected("filter")),
        };
        let body = self.parse_body()?;
        self.exit_depth();
        Ok(ScopeNode { filter, body, loc })
    }

    fn parse_blocks_filter(&mut self) -> Result<Filter, ParseError> {
        self.expect(TokenType::Blocks)?;
        self.expect(TokenType::LParen)?;
        let from = self.parse_block_bound()?;
        self.expect(TokenType::RParen)?;
        self.expect(TokenType::LParen)?;
        let to = self.parse_block_bound()?;
        self.expect(TokenType::RParen)?;
        Ok(Filter::Blocks { from, to })
    }

    fn parse_block_bound(&mut self) -> Result<BlockBound, ParseError> {
        let loc = self.loc();
        let tok = self.current().clone();
        let bound = match tok.token_type {
            TokenType::Integer => BlockBound::Number {
                text: tok.value.clone(),
                loc,
            },
            TokenType::Earliest => BlockBound::Earliest(loc),
            TokenType::Current => BlockBound::Current(loc),
            TokenType::Pending => BlockBound::Pending(loc),
            TokenType::Continuous => BlockBound::Continuous(loc),
            TokenType::Identifier => {
                let name = self.parse_name()?;
                return Ok(BlockBound::Variable { name, loc });
            }
            _ => {
                return Err(self.unexpected(
                    "block number (integer, variable, EARLIEST, CURRENT, PENDING, CONTINUOUS)",
                ))
            }
        };
        self.advance();
        Ok(bound)
    }

    fn parse_transactions_filter(&mut self) -> Result<Filter, ParseError> {
        self.expect(TokenType::Transactions)?;
        self.expect(TokenType::LParen)?;
        let senders = self.parse_address_list()?;
        self.expect(TokenType::RParen)?;
        self.expect(TokenType::LParen)?;
        let recipients = self.parse_address_list()?;
        self.expect(TokenType::RParen)?;
        Ok(Filter::Transactions {
            senders,
            recipients,
        })
    }

    fn parse_address_list(&mut self) -> Result<AddressList, ParseError> {
        let loc = self.loc();
        match self.current().token_type {
            TokenType::Any => {
                self.advance();
                Ok(AddressList::Any(loc))
            }
            TokenType::HexLit => {
                let mut addresses = vec![self.advance().value.clone()];
                while self.check(TokenType::Comma) {
                    self.advance();
                    addresses.push(self.expect(TokenType::HexLit)?.value.clone());
                }
                Ok(AddressList::Literals { addresses, loc })
            }
            TokenType::Identifier => {
                let name = self.parse_name()?;
                Ok(AddressList::Variable { name, loc })
            }
            _ => Err(self.unexpected("address list (ANY, address literals, variable)")),
        }
    }

    fn parse_log_entries_filter(&mut self) -> Result<Filter, ParseError> {
        self.expect(TokenType::Log)?;
        self.expect(TokenType::Entries)?;
        self.expect(TokenType::LParen)?;
        let addresses = self.parse_address_list()?;
        self.expect(TokenType::RParen)?;

        self.expect(TokenType::LParen)?;
        let loc = self.loc();
        let name = self.expect(TokenType::Identifier)?.value.clone();
        self.expect(TokenType::LParen)?;
        let params = self.parse_comma_list(TokenType::RParen, |p| p.parse_event_param())?;
        self.expect(TokenType::RParen)?;
        self.expect(TokenType::RParen)?;

        Ok(Filter::LogEntries {
            addresses,
            event: EventSignature { name, params, loc },
        })
    }

    fn parse_event_param(&mut self) -> Result<EventParam, ParseError> {
        let loc = self.loc();
        let ty = self.parse_type()?;
        let indexed = if self.check(TokenType::Indexed) {
            self.advance();
            true
        } else {
            false
        };
        let name = self.expect(TokenType::Identifier)?.value.clone();
        Ok(EventParam {
            ty,
            indexed,
            name,
            loc,
        })
    }

    fn parse_smart_contract_filter(&mut self) -> Result<Filter, ParseError> {
        self.expect(TokenType::Smart)?;
        self.expect(TokenType::Contract)?;
        self.expect(TokenType::LParen)?;
        let address = self.parse_address_list()?;
        self.expect(TokenType::RParen)?;
        self.expect(TokenType::LParen)?;
        let queries = self.parse_comma_list(TokenType::RParen, |p| p.parse_contract_query())?;
        self.expect(TokenType::RParen)?;
        Ok(Filter::SmartContract { address, queries })
    }

    fn parse_contract_query(&mut self) -> Result<ContractQuery, ParseError> {
        if !self.check(TokenType::LParen) {
            return Ok(ContractQuery::Variable(self.parse_typed_name()?));
        }

        let loc = self.loc();
        self.expect(TokenType::LParen)?;
        let outputs = self.parse_comma_list(TokenType::RParen, |p| p.parse_typed_name())?;
        self.expect(TokenType::RParen)?;
        self.expect(TokenType::Assign)?;
        let method = self.expect(TokenType::Identifier)?.value.clone();
        self.expect(TokenType::LParen)?;
        let inputs = self.parse_comma_list(TokenType::RParen, |p| {
            let ty = p.parse_type()?;
            let value = p.parse_value()?;
            Ok(TypedValue { ty, value })
        })?;
        self.expect(TokenType::RParen)?;
        Ok(ContractQuery::Function {
            outputs,
            method,
            inputs,
            loc,
        })
    }

    fn parse_typed_name(&mut self) -> Result<TypedName, ParseError> {
        let loc = self.loc();
        let ty = self.parse_type()?;
        let name = self.expect(TokenType::Identifier)?.value.clone();
        Ok(TypedName { ty, name, loc })
    }

    // ── Conditions (precedence climbing) ────────────────────────────────

    fn parse_condition(&mut self) -> Result<Condition, ParseError> {
        self.enter_depth()?;
        let result = self.parse_or_condition();
        self.exit_depth();
        result
    }

    fn parse_or_condition(&mut self) -> Result<Condition, ParseError> {
        let mut left = self.parse_and_condition()?;
        while self.check(TokenType::OrOr) {
            let loc = self.loc();
            self.advance();
            let right = self.parse_and_condition()?;
            left = Condition::Or {
                left: Box::new(left),
                right: Box::new(right),
                loc,
            };
        }
        Ok(left)
    }

    fn parse_and_condition(&mut self) -> Result<Condition, ParseError> {
        let mut left = self.parse_not_condition()?;
        while self.check(TokenType::AndAnd) {
            let loc = self.loc();
            self.advance();
            let right = self.parse_not_condition()?;
            left = Condition::And {
                left: Box::new(left),
                right: Box::new(right),
                loc,
            };
        }
        Ok(left)
    }

    fn parse_not_condition(&mut self) -> Result<Condition, ParseError> {
        if self.check(TokenType::Bang) {
            let loc = self.loc();
            self.advance();
            let operand = self.parse_not_condition()?;
            return Ok(Condition::Not {
                operand: Box::new(operand),
                loc,
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Condition, ParseError> {
        let left = self.parse_condition_primary()?;
        let op = match self.current().token_type {
            TokenType::Equals => Comparator::Equal,
            TokenType::NotEquals => Comparator::NotEqual,
            TokenType::LessThan => Comparator::Less,
            TokenType::LessEqual => Comparator::LessEqual,
            TokenType::GreaterThan => Comparator::Greater,
            TokenType::GreaterEqual => Comparator::GreaterEqual,
            TokenType::In => Comparator::In,
            _ => return Ok(left),
        };
        let loc = self.loc();
        self.advance();
        let right = self.parse_condition_primary()?;
        Ok(Condition::Compare {
            left: Box::new(left),
            op,
            right: Box::new(right),
            loc,
        })
    }

    fn parse_condition_primary(&mut self) -> Result<Condition, ParseError> {
        if self.check(TokenType::LParen) {
            self.advance();
            let inner = self.parse_condition()?;
            self.expect(TokenType::RParen)?;
            return Ok(inner);
        }
        Ok(Condition::Value(self.parse_value()?))
    }

    // ── Values ──────────────────────────────────────────────────────────

    fn parse_value(&mut self) -> Result<ValueExpr, ParseError> {
        let loc = self.loc();
        match self.current().token_type {
            TokenType::Identifier => {
                if self.peek_type(1) == Some(TokenType::LParen) {
                    return Ok(ValueExpr::Call(self.parse_call()?));
                }
                let name = self.parse_name()?;
                Ok(ValueExpr::Variable { name, loc })
            }
            TokenType::LBracket => {
                self.advance();
                let items = self.parse_comma_list(TokenType::RBracket, |p| p.parse_scalar_literal())?;
                self.expect(TokenType::RBracket)?;
                Ok(ValueExpr::Literal {
                    literal: Literal::Array(items),
                    loc,
                })
            }
            _ => {
                let literal = self.parse_scalar_literal()?;
                Ok(ValueExpr::Literal { literal, loc })
            }
        }
    }

    fn parse_scalar_literal(&mut self) -> Result<Literal, ParseError> {
        let tok = self.current().clone();
        let literal = match tok.token_type {
            TokenType::Integer => Literal::Integer(tok.value),
            TokenType::Minus if self.peek_type(1) == Some(TokenType::Integer) => {
                self.advance();
                Literal::Integer(format!("-{}", self.current().value))
            }
            TokenType::HexLit => Literal::Hex(tok.value),
            TokenType::StringLit => Literal::Str(tok.value),
            TokenType::True => Literal::Bool(true),
            TokenType::False => Literal::Bool(false),
            _ => return Err(self.unexpected("value")),
        };
        self.advance();
        Ok(literal)
    }

    fn parse_call(&mut self) -> Result<MethodCall, ParseError> {
        let loc = self.loc();
        let name = self.expect(TokenType::Identifier)?.value.clone();
        self.expect(TokenType::LParen)?;
        let args = self.parse_comma_list(TokenType::RParen, |p| p.parse_value())?;
        self.expect(TokenType::RParen)?;
        Ok(MethodCall { name, args, loc })
    }

    // ── Emission ────────────────────────────────────────────────────────

    fn parse_emit(&mut self) -> Result<EmitStatement, ParseError> {
        let loc = self.loc();
        self.expect(TokenType::Emit)?;
        match self.current().token_type {
            TokenType::Csv => {
                self.advance();
                self.expect(TokenType::Row)?;
                self.expect(TokenType::LParen)?;
                let table = self.expect(TokenType::StringLit)?.value.clone();
                self.expect(TokenType::RParen)?;
                self.expect(TokenType::LParen)?;
                let columns = self.parse_comma_list(TokenType::RParen, |p| {
                    let value = p.parse_value()?;
                    let alias = if p.check(TokenType::As) {
                        p.advance();
                        Some(p.expect_identifier_or_keyword()?.value.clone())
                    } else {
                        None
                    };
                    Ok(Column { value, alias })
                })?;
                self.expect(TokenType::RParen)?;
                Ok(EmitStatement::CsvRow {
                    table,
                    columns,
                    loc,
                })
            }
            TokenType::Log => {
                self.advance();
                self.expect(TokenType::Line)?;
                self.expect(TokenType::LParen)?;
                let values = self.parse_comma_list(TokenType::RParen, |p| p.parse_value())?;
                self.expect(TokenType::RParen)?;
                Ok(EmitStatement::LogLine { values, loc })
            }
            TokenType::Xes => {
                self.advance();
                let is_event = match self.current().token_type {
                    TokenType::Event => true,
                    TokenType::Trace => false,
                    _ => return Err(self.unexpected("EVENT or TRACE")),
                };
                self.advance();
                let pid = self.parse_optional_id()?;
                let piid = self.parse_optional_id()?;
                let eid = if is_event {
                    self.parse_optional_id()?
                } else {
                    None
                };
                self.expect(TokenType::LParen)?;
                let attributes = self.parse_comma_list(TokenType::RParen, |p| p.parse_xes_attribute())?;
                self.expect(TokenType::RParen)?;
                if is_event {
                    Ok(EmitStatement::XesEvent {
                        pid,
                        piid,
                        eid,
                        attributes,
                        loc,
                    })
                } else {
                    Ok(EmitStatement::XesTrace {
                        pid,
                        piid,
                        attributes,
                        loc,
                    })
                }
            }
            _ => Err(self.unexpected("CSV ROW, LOG LINE, XES EVENT or XES TRACE")),
        }
    }

    fn parse_optional_id(&mut self) -> Result<Option<ValueExpr>, ParseError> {
        self.expect(TokenType::LParen)?;
        let value = if self.check(TokenType::RParen) {
            None
        } else {
            Some(self.parse_value()?)
        };
        self.expect(TokenType::RParen)?;
        Ok(value)
    }

    fn parse_xes_attribute(&mut self) -> Result<XesAttribute, ParseError> {
        let loc = self.loc();
        let value = self.parse_value()?;
        self.expect(TokenType::As)?;
        let first = self.expect_identifier_or_keyword()?.value.clone();
        if self.check(TokenType::Colon) {
            self.advance();
            let suffix = self.expect(TokenType::Identifier)?.value.clone();
            let name = self.expect_identifier_or_keyword()?.value.clone();
            return Ok(XesAttribute {
                value,
                xes_type: Some(format!("{}:{}", first, suffix)),
                name,
                loc,
            });
        }
        Ok(XesAttribute {
            value,
            xes_type: None,
            name: first,
            loc,
        })
    }

    // ── Utility parsers ─────────────────────────────────────────────────

    fn parse_type(&mut self) -> Result<SolidityType, ParseError> {
        let tok = self.expect(TokenType::Identifier)?.clone();
        let mut name = tok.value.clone();
        while self.check(TokenType::LBracket) && self.peek_type(1) == Some(TokenType::RBracket) {
            self.advance();
            self.advance();
            name.push_str("[]");
        }
        SolidityType::parse(&name).ok_or_else(|| ParseError {
            message: format!("Unknown type '{}'", name),
            line: tok.line,
            column: tok.column,
            file: tok.file.clone(),
        })
    }

    /// Dotted variable name such as `block.number` or `entry.address`.
    fn parse_name(&mut self) -> Result<String, ParseError> {
        let mut parts = vec![self.expect(TokenType::Identifier)?.value.clone()];
        while self.check(TokenType::Dot) {
            self.advance();
            parts.push(self.expect_identifier_or_keyword()?.value.clone());
        }
        Ok(parts.join("."))
    }

    fn parse_comma_list<T, F>(&mut self, close: TokenType, mut item_parser: F) -> Result<Vec<T>, ParseError>
    where
        F: FnMut(&mut Self) -> Result<T, ParseError>,
    {
        let mut items = Vec::new();
        if !self.check(close) {
            items.push(item_parser(self)?);
            while self.check(TokenType::Comma) {
                self.advance();
                items.push(item_parser(self)?);
            }
        }
        Ok(items)
    }

    // ── Token stream helpers ────────────────────────────────────────────

    fn current(&self) -> &Token {
        if self.pos >= self.tokens.len() {
            &self.tokens[self.tokens.len() - 1] // EOF
        } else {
            &self.tokens[self.pos]
        }
    }

    fn advance(&mut self) -> &Token {
        let pos = self.pos.min(self.tokens.len() - 1);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        &self.tokens[pos]
    }

    fn check(&self, token_type: TokenType) -> bool {
        self.current().token_type == token_type
    }

    fn expect(&mut self, token_type: TokenType) -> Result<&Token, ParseError> {
        if !self.check(token_type) {
            return Err(self.unexpected(&format!("{:?}", token_type)));
        }
        Ok(self.advance())
    }

    fn expect_identifier_or_keyword(&mut self) -> Result<&Token, ParseError> {
        let tok = self.current();
        if tok.token_type == TokenType::Identifier || tok.token_type.can_be_identifier() {
            Ok(self.advance())
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn peek_type(&self, offset: usize) -> Option<TokenType> {
        self.tokens.get(self.pos + offset).map(|t| t.token_type)
    }

    fn at_end(&self) -> bool {
        self.current().token_type == TokenType::Eof
    }

    fn loc(&self) -> SourceLocation {
        let tok = self.current();
        SourceLocation::new(&tok.file, tok.line, tok.column)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let tok = self.current();
        self.error_here(format!(
            "Expected {}, got {:?} ({:?})",
            expected, tok.token_type, tok.value
        ))
    }

    fn error_here(&self, message: String) -> ParseError {
        let tok = self.current();
        ParseError {
            message,
            line: tok.line,
            column: tok.column,
            file: tok.file.clone(),
        }
    }
}
