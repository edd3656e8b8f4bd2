pub mod walk;

use std::fmt;

use crate::config::EmissionMode;
use crate::types::{Literal, SolidityType};

#[derive(Debug, Clone, PartialEq)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(file: &str, line: usize, column: usize) -> Self {
        Self {
            file: file.to_string(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

// ── Scope kinds ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Program,
    BlockRange,
    Transaction,
    LogEntry,
    SmartContract,
    Generic,
}

impl ScopeKind {
    pub const ALL: [ScopeKind; 6] = [
        ScopeKind::Program,
        ScopeKind::BlockRange,
        ScopeKind::Transaction,
        ScopeKind::LogEntry,
        ScopeKind::SmartContract,
        ScopeKind::Generic,
    ];
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeKind::Program => "program",
            ScopeKind::BlockRange => "block range",
            ScopeKind::Transaction => "transaction",
            ScopeKind::LogEntry => "log entry",
            ScopeKind::SmartContract => "smart contract",
            ScopeKind::Generic => "generic",
        };
        write!(f, "{}", name)
    }
}

// ── Document ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Document {
    pub loc: SourceLocation,
    pub settings: Vec<Setting>,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub enum Setting {
    OutputFolder { path: String, loc: SourceLocation },
    Connection { url: String, loc: SourceLocation },
    EmissionMode { mode: EmissionMode, loc: SourceLocation },
}

// ── Statements ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Statement {
    Scope(ScopeNode),
    Declaration {
        ty: SolidityType,
        name: String,
        value: ValueExpr,
        loc: SourceLocation,
    },
    Assignment {
        name: String,
        value: ValueExpr,
        loc: SourceLocation,
    },
    Call(MethodCall),
    Emit(EmitStatement),
}

impl Statement {
    pub fn loc(&self) -> &SourceLocation {
        match self {
            Statement::Scope(scope) => &scope.loc,
            Statement::Declaration { loc, .. } => loc,
            Statement::Assignment { loc, .. } => loc,
            Statement::Call(call) => &call.loc,
            Statement::Emit(emit) => emit.loc(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScopeNode {
    pub filter: Filter,
    pub body: Vec<Statement>,
    pub loc: SourceLocation,
}

impl ScopeNode {
    pub fn kind(&self) -> ScopeKind {
        match self.filter {
            Filter::Blocks { .. } => ScopeKind::BlockRange,
            Filter::Transactions { .. } => ScopeKind::Transaction,
            Filter::LogEntries { .. } => ScopeKind::LogEntry,
            Filter::SmartContract { .. } => ScopeKind::SmartContract,
            Filter::Generic { .. } => ScopeKind::Generic,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Filter {
    Blocks {
        from: BlockBound,
        to: BlockBound,
    },
    Transactions {
        senders: AddressList,
        recipients: AddressList,
    },
    LogEntries {
        addresses: AddressList,
        event: EventSignature,
    },
    SmartContract {
        address: AddressList,
        queries: Vec<ContractQuery>,
    },
    Generic {
        condition: Condition,
    },
}

// ── Filter parts ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum BlockBound {
    Number { text: String, loc: SourceLocation },
    Variable { name: String, loc: SourceLocation },
    Earliest(SourceLocation),
    Current(SourceLocation),
    Pending(SourceLocation),
    Continuous(SourceLocation),
}

impl BlockBound {
    pub fn loc(&self) -> &SourceLocation {
        match self {
            BlockBound::Number { loc, .. } | BlockBound::Variable { loc, .. } => loc,
            BlockBound::Earliest(loc)
            | BlockBound::Current(loc)
            | BlockBound::Pending(loc)
            | BlockBound::Continuous(loc) => loc,
        }
    }
}

#[derive(Debug, Clone)]
pub enum AddressList {
    Any(SourceLocation),
    Literals {
        addresses: Vec<String>,
        loc: SourceLocation,
    },
    Variable {
        name: String,
        loc: SourceLocation,
    },
}

impl AddressList {
    pub fn loc(&self) -> &SourceLocation {
        match self {
            AddressList::Any(loc) => loc,
            AddressList::Literals { loc, .. } | AddressList::Variable { loc, .. } => loc,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSignature {
    pub name: String,
    pub params: Vec<EventParam>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct EventParam {
    pub ty: SolidityType,
    pub indexed: bool,
    pub name: String,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct TypedName {
    pub ty: SolidityType,
    pub name: String,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone)]
pub struct TypedValue {
    pub ty: SolidityType,
    pub value: ValueExpr,
}

#[derive(Debug, Clone)]
pub enum ContractQuery {
    /// Read of a public state variable through its generated getter.
    Variable(TypedName),
    Function {
        outputs: Vec<TypedName>,
        method: String,
        inputs: Vec<TypedValue>,
        loc: SourceLocation,
    },
}

impl ContractQuery {
    pub fn outputs(&self) -> &[TypedName] {
        match self {
            ContractQuery::Variable(output) => std::slice::from_ref(output),
            ContractQuery::Function { outputs, .. } => outputs,
        }
    }

    pub fn inputs(&self) -> &[TypedValue] {
        match self {
            ContractQuery::Variable(_) => &[],
            ContractQuery::Function { inputs, .. } => inputs,
        }
    }

    pub fn loc(&self) -> &SourceLocation {
        match self {
            ContractQuery::Variable(output) => &output.loc,
            ContractQuery::Function { loc, .. } => loc,
        }
    }
}

// ── Values ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum ValueExpr {
    Literal {
        literal: Literal,
        loc: SourceLocation,
    },
    Variable {
        name: String,
        loc: SourceLocation,
    },
    Call(MethodCall),
}

impl ValueExpr {
    pub fn loc(&self) -> &SourceLocation {
        match self {
            ValueExpr::Literal { loc, .. } | ValueExpr::Variable { loc, .. } => loc,
            ValueExpr::Call(call) => &call.loc,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MethodCall {
    pub name: String,
    pub args: Vec<ValueExpr>,
    pub loc: SourceLocation,
}

// ── Conditions ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    In,
}

impl Comparator {
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            Comparator::Less | Comparator::LessEqual | Comparator::Greater | Comparator::GreaterEqual
        )
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Comparator::Equal => "==",
            Comparator::NotEqual => "!=",
            Comparator::Less => "<",
            Comparator::LessEqual => "<=",
            Comparator::Greater => ">",
            Comparator::GreaterEqual => ">=",
            Comparator::In => "IN",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub enum Condition {
    Value(ValueExpr),
    Compare {
        left: Box<Condition>,
        op: Comparator,
        right: Box<Condition>,
        loc: SourceLocation,
    },
    And {
        left: Box<Condition>,
        right: Box<Condition>,
        loc: SourceLocation,
    },
    Or {
        left: Box<Condition>,
        right: Box<Condition>,
        loc: SourceLocation,
    },
    Not {
        operand: Box<Condition>,
        loc: SourceLocation,
    },
}

impl Condition {
    pub fn loc(&self) -> &SourceLocation {
        match self {
            Condition::Value(value) => value.loc(),
            Condition::Compare { loc, .. }
            | Condition::And { loc, .. }
            | Condition::Or { loc, .. }
            | Condition::Not { loc, .. } => loc,
        }
    }
}

// ── Emission ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Column {
    pub value: ValueExpr,
    pub alias: Option<String>,
}

impl Column {
    /// Explicit alias, else the variable or method name, else a positional name.
    pub fn name(&self, index: usize) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.value {
            ValueExpr::Variable { name, .. } => name.clone(),
            ValueExpr::Call(call) => call.name.clone(),
            ValueExpr::Literal { .. } => format!("column{}", index),
        }
    }
}

#[derive(Debug, Clone)]
pub struct XesAttribute {
    pub value: ValueExpr,
    pub xes_type: Option<String>,
    pub name: String,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum EmitStatement {
    CsvRow {
        table: String,
        columns: Vec<Column>,
        loc: SourceLocation,
    },
    LogLine {
        values: Vec<ValueExpr>,
        loc: SourceLocation,
    },
    XesEvent {
        pid: Option<ValueExpr>,
        piid: Option<ValueExpr>,
        eid: Option<ValueExpr>,
        attributes: Vec<XesAttribute>,
        loc: SourceLocation,
    },
    XesTrace {
        pid: Option<ValueExpr>,
        piid: Option<ValueExpr>,
        attributes: Vec<XesAttribute>,
        loc: SourceLocation,
    },
}

impl EmitStatement {
    pub fn loc(&self) -> &SourceLocation {
        match self {
            EmitStatement::CsvRow { loc, .. }
            | EmitStatement::LogLine { loc, .. }
            | EmitStatement::XesEvent { loc, .. }
            | EmitStatement::XesTrace { loc, .. } => loc,
        }
    }

    /// Every value the statement evaluates, in emission order.
    pub fn values(&self) -> Vec<&ValueExpr> {
        match self {
            EmitStatement::CsvRow { columns, .. } => columns.iter().map(|c| &c.value).collect(),
            EmitStatement::LogLine { values, .. } => values.iter().collect(),
            EmitStatement::XesEvent {
                pid,
                piid,
                eid,
                attributes,
                ..
            } => [pid, piid, eid]
                .into_iter()
                .flatten()
                .chain(attributes.iter().map(|a| &a.value))
                .collect(),
            EmitStatement::XesTrace {
                pid,
                piid,
                attributes,
                ..
            } => [pid, piid]
                .into_iter()
                .flatten()
                .chain(attributes.iter().map(|a| &a.value))
                .collect(),
        }
    }
}
