//! The error type returned by evaluation and schema parsing.
//!
//! [`DiagnosticError`] wraps one or more [`Diagnostic`]s produced while
//! lexing, parsing, checking or running an input.

use std::fmt;

use crate::{
    error::{Diagnostic, ErrorCategory},
    span::Span,
};

/// Error type for the evaluation lifecycle.
///
/// Wraps one or more diagnostics. The first diagnostic decides the category
/// and the reported location.
#[derive(Debug)]
pub struct DiagnosticError {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticError {
    /// Create a new error from diagnostics.
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    /// Get all diagnostics in this error.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Consume the error, returning its diagnostics.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Category of the leading diagnostic.
    pub fn category(&self) -> ErrorCategory {
        self.diagnostics
            .first()
            .map(Diagnostic::category)
            .unwrap_or(ErrorCategory::Syntax)
    }

    /// Primary span of the leading diagnostic.
    pub fn primary_span(&self) -> Option<Span> {
        self.diagnostics.first().and_then(Diagnostic::primary_span)
    }

    /// Message of the leading diagnostic, without severity or code.
    pub fn message(&self) -> &str {
        self.diagnostics
            .first()
            .map(Diagnostic::message)
            .unwrap_or_default()
    }
}

impl fmt::Display for DiagnosticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(first) = self.diagnostics.first() {
            write!(f, "{}", first)?;
            if self.diagnostics.len() > 1 {
                write!(f, " (+{} more)", self.diagnostics.len() - 1)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for DiagnosticError {}

impl From<Diagnostic> for DiagnosticError {
    fn from(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostics: vec![diagnostic],
        }
    }
}

impl From<Vec<Diagnostic>> for DiagnosticError {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }
}
