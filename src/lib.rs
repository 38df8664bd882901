pub mod ast;
pub mod ast_printer;
pub mod engine;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod object;
pub mod parser;
pub mod report;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

pub use engine::{Lox, RunStatus};
