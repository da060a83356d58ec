//! Diagnostics carried out of the evaluator and the ERD schema reader.
//!
//! A [`Diagnostic`] is a message with an optional [`ErrorCode`], zero or more
//! [`Label`]ed spans into the source, and an optional help line.

use std::fmt;

use crate::{
    error::{ErrorCategory, error_code::ErrorCode},
    span::Span,
};

/// How serious a diagnostic is.
///
/// Every diagnostic the evaluator and schema reader produce today is an
/// [`Severity::Error`]; warnings are reserved for lint-style notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

impl Severity {
    /// Lowercase name used as the message prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a label marks the offending location or merely points at context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    Primary,
    Secondary,
}

/// A message attached to a span of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    style: LabelStyle,
    span: Span,
    message: String,
}

impl Label {
    pub fn new(style: LabelStyle, span: Span, message: impl Into<String>) -> Self {
        Self {
            style,
            span,
            message: message.into(),
        }
    }

    pub fn style(&self) -> LabelStyle {
        self.style
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_primary(&self) -> bool {
        self.style == LabelStyle::Primary
    }
}

/// A rich diagnostic with source locations.
///
/// Rendered by the command line as:
///
/// ```text
/// error[E200]: `open` is not available in aws diagrams
///   --> main.diag:3:5
///    |
///  3 | f = open("/etc/passwd")
///    |     ^^^^ unknown symbol
///    |
///    = help: only the diagram vocabulary of the selected family can be used
/// ```
#[derive(Debug, Clone)]
pub struct Diagnostic {
    severity: Severity,
    code: Option<ErrorCode>,
    message: String,
    labels: Vec<Label>,
    help: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    ///
    /// ```
    /// # use diagrammer_parser::error::{Diagnostic, ErrorCode};
    /// # use diagrammer_parser::Span;
    /// let diag = Diagnostic::error("expected `)`")
    ///     .with_code(ErrorCode::E100)
    ///     .with_label(Span::new(0..1), "unclosed call");
    /// assert_eq!(diag.to_string(), "error[E100]: expected `)`");
    /// ```
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, message)
    }

    fn with_severity(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: None,
            message: message.into(),
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    /// Category implied by the code; uncoded diagnostics are syntax errors.
    pub fn category(&self) -> ErrorCategory {
        self.code.map_or(ErrorCategory::Syntax, |code| code.category())
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Span of the first primary label.
    pub fn primary_span(&self) -> Option<Span> {
        self.labels
            .iter()
            .find_map(|label| label.is_primary().then_some(label.span))
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn with_code(self, code: ErrorCode) -> Self {
        Self {
            code: Some(code),
            ..self
        }
    }

    /// Attach the label marking where the problem is.
    pub fn with_label(self, span: Span, message: impl Into<String>) -> Self {
        self.push_label(Label::new(LabelStyle::Primary, span, message))
    }

    /// Attach a label pointing at related context.
    pub fn with_secondary_label(self, span: Span, message: impl Into<String>) -> Self {
        self.push_label(Label::new(LabelStyle::Secondary, span, message))
    }

    pub fn with_help(self, help: impl Into<String>) -> Self {
        Self {
            help: Some(help.into()),
            ..self
        }
    }

    fn push_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{}[{code}]: {}", self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

impl std::error::Error for Diagnostic {}
