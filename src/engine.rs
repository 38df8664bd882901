//! Orchestrates one run: lex → parse → resolve → interpret.
//!
//! Every stage reports into the same [`Reporter`]; a stage starts only if
//! nothing has been reported so far in this run.

use std::io::Write;

use log::{debug, info};

use crate::ast::Stmt;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::report::{ErrorReport, Reporter};
use crate::resolver::Resolver;
use crate::scanner;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    /// Lexical, syntax or resolution errors; nothing was executed.
    StaticError,
    /// Execution started and stopped at a runtime error.
    RuntimeError,
}

impl RunStatus {
    /// Conventional process exit code (sysexits `EX_DATAERR` / `EX_SOFTWARE`).
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Ok => 0,
            RunStatus::StaticError => 65,
            RunStatus::RuntimeError => 70,
        }
    }
}

/// An interpreter plus the error sink its runs report into.  Globals persist
/// between runs, which is what a REPL wants.
pub struct Lox<R: Reporter = ErrorReport> {
    interpreter: Interpreter,
    report: R,
}

impl Lox<ErrorReport> {
    pub fn new() -> Self {
        Self::with_reporter(Interpreter::new(), ErrorReport::new())
    }

    /// Program output goes to `out` instead of stdout.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        Self::with_reporter(Interpreter::with_output(out), ErrorReport::new())
    }
}

impl Default for Lox<ErrorReport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Reporter> Lox<R> {
    pub fn with_reporter(interpreter: Interpreter, report: R) -> Self {
        Self {
            interpreter,
            report,
        }
    }

    pub fn report(&self) -> &R {
        &self.report
    }

    pub fn report_mut(&mut self) -> &mut R {
        &mut self.report
    }

    /// Access for registering natives or resetting globals between runs.
    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    /// Run `source` from scratch through every stage.
    pub fn run(&mut self, source: &str) -> RunStatus {
        match self.compile(source) {
            Some(statements) => self.execute(&statements),
            None => RunStatus::StaticError,
        }
    }

    /// Lex, parse and resolve `source`, installing its bindings in the
    /// interpreter.  `None` if any stage reported an error.
    pub fn compile(&mut self, source: &str) -> Option<Vec<Stmt>> {
        self.report.reset();

        let tokens = scanner::scan(source, &mut self.report);
        if self.report.had_error() {
            debug!("Stopping after lexical errors");
            return None;
        }

        let statements: Vec<Stmt> = Parser::new(&tokens, &mut self.report).parse();
        if self.report.had_error() {
            debug!("Stopping after syntax errors");
            return None;
        }

        let mut resolver = Resolver::new(&mut self.report);
        resolver.resolve(&statements);
        let locals = resolver.into_locals();
        if self.report.had_error() {
            debug!("Stopping after resolution errors");
            return None;
        }

        self.interpreter.resolve(locals);

        Some(statements)
    }

    /// Execute statements produced by [`compile`](Lox::compile).
    pub fn execute(&mut self, statements: &[Stmt]) -> RunStatus {
        match self.interpreter.interpret(statements) {
            Ok(()) => {
                info!("Run finished");
                RunStatus::Ok
            }
            Err(e) => {
                self.report.report(e);
                RunStatus::RuntimeError
            }
        }
    }
}
