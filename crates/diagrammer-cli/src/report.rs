//! Terminal reports for failed CLI runs.
//!
//! A [`DiagrammerError`] is flattened into one [`Report`] per thing worth
//! showing: every parser diagnostic of a script or schema failure becomes its
//! own report with source context, and every other failure becomes a single
//! report carrying a `diagrammer::*` code.

use std::{error::Error, fmt};

use miette::{LabeledSpan, SourceCode, SourceSpan};

use diagrammer::{DiagrammerError, ErrorKind};
use diagrammer_parser::{Diagnostic, Span};

/// One renderable failure.
#[derive(Debug)]
pub struct Report<'a> {
    message: String,
    code: Option<String>,
    help: Option<&'a str>,
    src: Option<&'a str>,
    labels: Vec<LabeledSpan>,
    cause: Option<&'a (dyn Error + 'static)>,
}

impl<'a> Report<'a> {
    /// Report a parser diagnostic against the text it was raised for.
    pub fn from_diagnostic(diag: &'a Diagnostic, src: &'a str) -> Self {
        // Unlocated diagnostics such as a missing result carry an empty span.
        let labels = diag
            .labels()
            .iter()
            .filter(|label| !label.span().is_empty())
            .map(|label| {
                let message = Some(label.message().to_string());
                let span = to_source_span(label.span());
                if label.is_primary() {
                    LabeledSpan::new_primary_with_span(message, span)
                } else {
                    LabeledSpan::new_with_span(message, span)
                }
            })
            .collect();

        Self {
            message: diag.message().to_string(),
            code: diag.code().map(|code| code.to_string()),
            help: diag.help(),
            src: Some(src),
            labels,
            cause: None,
        }
    }

    /// Report a failure that has no source text to point into.
    pub fn from_error(err: &'a DiagrammerError) -> Self {
        let code = match err.kind() {
            ErrorKind::Validation => Some("diagrammer::validation"),
            ErrorKind::Render => Some("diagrammer::render"),
            ErrorKind::Storage => Some("diagrammer::storage"),
            ErrorKind::Configuration => Some("diagrammer::config"),
            ErrorKind::Internal => Some("diagrammer::io"),
            ErrorKind::Syntax | ErrorKind::CapabilityViolation | ErrorKind::Runtime => None,
        };

        Self {
            message: err.to_string(),
            code: code.map(str::to_string),
            help: None,
            src: None,
            labels: Vec::new(),
            cause: err.source(),
        }
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for Report<'_> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
    }
}

impl miette::Diagnostic for Report<'_> {
    fn code<'b>(&'b self) -> Option<Box<dyn fmt::Display + 'b>> {
        self.code
            .as_deref()
            .map(|code| Box::new(code) as Box<dyn fmt::Display>)
    }

    fn help<'b>(&'b self) -> Option<Box<dyn fmt::Display + 'b>> {
        self.help.map(|help| Box::new(help) as Box<dyn fmt::Display>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.src.as_ref().map(|src| src as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        if self.labels.is_empty() {
            None
        } else {
            Some(Box::new(self.labels.iter().cloned()))
        }
    }
}

fn to_source_span(span: Span) -> SourceSpan {
    SourceSpan::new(span.start().into(), span.len())
}

/// Flatten an error into the reports shown to the user.
pub fn reports(err: &DiagrammerError) -> Vec<Report<'_>> {
    match err {
        DiagrammerError::Script { err, src } => err
            .diagnostics()
            .iter()
            .map(|diag| Report::from_diagnostic(diag, src))
            .collect(),
        other => vec![Report::from_error(other)],
    }
}
