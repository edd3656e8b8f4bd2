pub mod ast;
pub mod compile;
pub mod compose;
pub mod config;
pub mod lexer;
pub mod library;
pub mod parser;
pub mod program;
pub mod runtime;
pub mod scope;
pub mod types;
pub mod verify;
