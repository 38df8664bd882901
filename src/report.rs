//! Error sink shared by every pipeline stage.
//!
//! Stages never print.  They hand each [`LoxError`] to a [`Reporter`] and keep
//! going; the orchestrator asks [`Reporter::had_error`] between stages to decide
//! whether the next one may run.

use std::io::Write;

use log::debug;

use crate::error::LoxError;

/// Collects diagnostics and answers whether the current run has failed.
pub trait Reporter {
    /// Record one error.
    fn report(&mut self, error: LoxError);

    /// Has anything been reported since the last [`reset`](Reporter::reset)?
    fn had_error(&self) -> bool;

    /// Forget every recorded error.  Called at the start of each run.
    fn reset(&mut self);
}

/// Default [`Reporter`]: keeps errors in arrival order.
#[derive(Debug, Default)]
pub struct ErrorReport {
    errors: Vec<LoxError>,
}

impl ErrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors recorded so far, oldest first.
    pub fn errors(&self) -> &[LoxError] {
        &self.errors
    }

    /// Drain the recorded errors, leaving the report empty.
    pub fn take(&mut self) -> Vec<LoxError> {
        std::mem::take(&mut self.errors)
    }

    /// Does any recorded error come from the evaluator?
    pub fn had_runtime_error(&self) -> bool {
        self.errors.iter().any(LoxError::is_runtime)
    }

    /// Render every recorded error, one per line.
    pub fn dump<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for error in &self.errors {
            writeln!(out, "{}", error)?;
        }

        Ok(())
    }
}

impl Reporter for ErrorReport {
    fn report(&mut self, error: LoxError) {
        debug!("Reported: {}", error);

        self.errors.push(error);
    }

    fn had_error(&self) -> bool {
        !self.errors.is_empty()
    }

    fn reset(&mut self) {
        self.errors.clear();
    }
}
