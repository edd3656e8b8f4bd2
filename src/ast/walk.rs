//! Tree walk over a parsed document.
//!
//! The analyzers and the program builder never recurse over the AST
//! themselves; they receive the same ordered event sequence from [`walk`]:
//! scope entry, the scope's body, scope exit. Generic filter conditions are
//! delivered in post-order right after their scope is entered, so a
//! consumer can reduce them with a stack.

use super::*;

/// One scope as seen by a listener: the document root or a filter scope.
#[derive(Debug, Clone, Copy)]
pub enum ScopeEntry<'a> {
    Program(&'a Document),
    Filter(&'a ScopeNode),
}

impl<'a> ScopeEntry<'a> {
    pub fn kind(&self) -> ScopeKind {
        match self {
            ScopeEntry::Program(_) => ScopeKind::Program,
            ScopeEntry::Filter(node) => node.kind(),
        }
    }

    pub fn loc(&self) -> &'a SourceLocation {
        match self {
            ScopeEntry::Program(doc) => &doc.loc,
            ScopeEntry::Filter(node) => &node.loc,
        }
    }

    pub fn filter(&self) -> Option<&'a Filter> {
        match self {
            ScopeEntry::Program(_) => None,
            ScopeEntry::Filter(node) => Some(&node.filter),
        }
    }
}

/// Post-order condition node. `Value` is an exited primary; the others are
/// exited operator nodes whose operands were already delivered.
#[derive(Debug, Clone, Copy)]
pub enum ConditionEvent<'a> {
    Value(&'a ValueExpr),
    Compare(Comparator, &'a SourceLocation),
    And(&'a SourceLocation),
    Or(&'a SourceLocation),
    Not(&'a SourceLocation),
}

impl<'a> ConditionEvent<'a> {
    pub fn loc(&self) -> &'a SourceLocation {
        match self {
            ConditionEvent::Value(value) => value.loc(),
            ConditionEvent::Compare(_, loc)
            | ConditionEvent::And(loc)
            | ConditionEvent::Or(loc)
            | ConditionEvent::Not(loc) => loc,
        }
    }
}

pub trait QueryListener {
    fn enter_scope(&mut self, _scope: ScopeEntry<'_>) {}
    fn exit_scope(&mut self, _scope: ScopeEntry<'_>) {}
    /// Every non-scope statement, in source order.
    fn statement(&mut self, _statement: &Statement) {}
    fn condition(&mut self, _event: ConditionEvent<'_>) {}
}

pub fn walk<L: QueryListener + ?Sized>(document: &Document, listener: &mut L) {
    let root = ScopeEntry::Program(document);
    listener.enter_scope(root);
    walk_statements(&document.statements, listener);
    listener.exit_scope(root);
}

fn walk_statements<L: QueryListener + ?Sized>(statements: &[Statement], listener: &mut L) {
    for statement in statements {
        match statement {
            Statement::Scope(node) => walk_scope(node, listener),
            other => listener.statement(other),
        }
    }
}

fn walk_scope<L: QueryListener + ?Sized>(node: &ScopeNode, listener: &mut L) {
    let entry = ScopeEntry::Filter(node);
    listener.enter_scope(entry);
    if let Filter::Generic { condition } = &node.filter {
        walk_condition(condition, listener);
    }
    walk_statements(&node.body, listener);
    listener.exit_scope(entry);
}

pub fn walk_condition<L: QueryListener + ?Sized>(condition: &Condition, listener: &mut L) {
    match condition {
        Condition::Value(value) => listener.condition(ConditionEvent::Value(value)),
        Condition::Compare {
            left,
            op,
            right,
            loc,
        } => {
            walk_condition(left, listener);
            walk_condition(right, listener);
            listener.condition(ConditionEvent::Compare(*op, loc));
        }
        Condition::And { left, right, loc } => {
            walk_condition(left, listener);
            walk_condition(right, listener);
            listener.condition(ConditionEvent::And(loc));
        }
        Condition::Or { left, right, loc } => {
            walk_condition(left, listener);
            walk_condition(right, listener);
            listener.condition(ConditionEvent::Or(loc));
        }
        Condition::Not { operand, loc } => {
            walk_condition(operand, listener);
            listener.condition(ConditionEvent::Not(loc));
        }
    }
}
