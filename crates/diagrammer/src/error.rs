//! Error types for Diagrammer requests.
//!
//! [`DiagrammerError`] wraps every failure a request can hit. Its
//! [`ErrorKind`] decides the status code, and [`DiagrammerError::client_message`]
//! is the only text that leaves the process; file paths and I/O details
//! are logged but never returned to the caller.

use std::io;

use thiserror::Error;

use diagrammer_parser::{DiagnosticError, ErrorCategory, SourceLine};

use crate::{render::RenderError, store::StoreError};

/// Classification of a failure, used to pick the response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed request: missing body or fields, unsupported type.
    Validation,
    /// The source text does not parse.
    Syntax,
    /// The script references something outside its capability set.
    CapabilityViolation,
    /// The script parsed but failed while running, including timeouts.
    Runtime,
    /// The renderer failed or produced no usable artifact.
    Render,
    /// The object store rejected an upload.
    Storage,
    /// The service is missing required configuration.
    Configuration,
    /// Anything unexpected.
    Internal,
}

impl ErrorKind {
    /// HTTP-style status code for this kind.
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() { 400 } else { 500 }
    }

    /// Returns `true` for failures caused by the request itself.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::Validation
                | ErrorKind::Syntax
                | ErrorKind::CapabilityViolation
                | ErrorKind::Runtime
        )
    }
}

/// The main error type for Diagrammer operations.
///
/// # Diagnostic Variants
///
/// The `Script` variant keeps the parser diagnostics together with the
/// source text so callers can render rich reports or extract the
/// offending line.
#[derive(Debug, Error)]
pub enum DiagrammerError {
    #[error("{0}")]
    Validation(String),

    #[error("{err}")]
    Script { err: DiagnosticError, src: String },

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DiagrammerError {
    /// Create a new `Script` error with the associated source code.
    pub fn new_script_error(err: DiagnosticError, src: impl Into<String>) -> Self {
        Self::Script {
            err,
            src: src.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DiagrammerError::Validation(_) => ErrorKind::Validation,
            DiagrammerError::Script { err, .. } => match err.category() {
                ErrorCategory::Syntax => ErrorKind::Syntax,
                ErrorCategory::Capability => ErrorKind::CapabilityViolation,
                ErrorCategory::Runtime => ErrorKind::Runtime,
            },
            DiagrammerError::Render(_) => ErrorKind::Render,
            DiagrammerError::Storage(_) => ErrorKind::Storage,
            DiagrammerError::Configuration(_) => ErrorKind::Configuration,
            DiagrammerError::Io(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// The source line a script error points at.
    pub fn source_line(&self) -> Option<SourceLine<'_>> {
        match self {
            DiagrammerError::Script { err, src } => {
                err.primary_span().map(|span| span.line_in(src))
            }
            _ => None,
        }
    }

    /// Message safe to return to the caller.
    pub fn client_message(&self) -> String {
        match self {
            DiagrammerError::Validation(message) => message.clone(),
            DiagrammerError::Script { err, .. } => {
                let detail = err
                    .diagnostics()
                    .iter()
                    .map(|d| d.message())
                    .collect::<Vec<_>>()
                    .join("; ");
                match (self.kind(), self.source_line()) {
                    (ErrorKind::Syntax, Some(line)) => format!(
                        "syntax error on line {}: '{}': {detail}",
                        line.number(),
                        line.text().trim()
                    ),
                    (ErrorKind::CapabilityViolation, _) => {
                        format!("script rejected: {detail}")
                    }
                    (ErrorKind::Runtime, Some(line))
                        if err.message() != "timeout"
                            && err.primary_span().is_some_and(|span| !span.is_empty()) =>
                    {
                        format!("script failed on line {}: {detail}", line.number())
                    }
                    _ => format!("script failed: {detail}"),
                }
            }
            DiagrammerError::Render(_) => "failed to render the diagram".to_string(),
            DiagrammerError::Storage(_) => "failed to store the diagram".to_string(),
            DiagrammerError::Configuration(_) => {
                "server configuration is incomplete".to_string()
            }
            DiagrammerError::Io(_) => "internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use diagrammer_parser::{Diagnostic, ErrorCode, Span};

    use super::*;

    fn script_error(code: ErrorCode, message: &str, span: Span, src: &str) -> DiagrammerError {
        let diagnostic = Diagnostic::error(message)
            .with_code(code)
            .with_label(span, code.description());
        DiagrammerError::new_script_error(DiagnosticError::from(diagnostic), src)
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorKind::Validation.status_code(), 400);
        assert_eq!(ErrorKind::Syntax.status_code(), 400);
        assert_eq!(ErrorKind::CapabilityViolation.status_code(), 400);
        assert_eq!(ErrorKind::Runtime.status_code(), 400);
        assert_eq!(ErrorKind::Render.status_code(), 500);
        assert_eq!(ErrorKind::Storage.status_code(), 500);
        assert_eq!(ErrorKind::Configuration.status_code(), 500);
        assert_eq!(ErrorKind::Internal.status_code(), 500);
    }

    #[test]
    fn test_script_error_kinds_follow_codes() {
        let src = "a\nb\n";
        let span = Span::new(2..3);
        assert_eq!(
            script_error(ErrorCode::E100, "x", span, src).kind(),
            ErrorKind::Syntax
        );
        assert_eq!(
            script_error(ErrorCode::E200, "x", span, src).kind(),
            ErrorKind::CapabilityViolation
        );
        assert_eq!(
            script_error(ErrorCode::E302, "timeout", span, src).kind(),
            ErrorKind::Runtime
        );
    }

    #[test]
    fn test_syntax_message_cites_line() {
        let src = "[A]\n[B]\n  A *--x B\n";
        let err = script_error(ErrorCode::E401, "malformed relation", Span::new(10..18), src);
        let line = err.source_line().unwrap();
        assert_eq!(line.number(), 3);
        assert_eq!(
            err.client_message(),
            "syntax error on line 3: 'A *--x B': malformed relation"
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = script_error(ErrorCode::E302, "timeout", Span::new(0..1), "x");
        assert_eq!(err.client_message(), "script failed: timeout");
    }

    #[test]
    fn test_unlocated_runtime_message() {
        let err = script_error(
            ErrorCode::E301,
            "script completed without producing a result",
            Span::default(),
            "d = 1\n",
        );
        assert_eq!(
            err.client_message(),
            "script failed: script completed without producing a result"
        );
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = DiagrammerError::Io(io::Error::other("/var/secret/path"));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.client_message().contains("/var"));
    }
}
