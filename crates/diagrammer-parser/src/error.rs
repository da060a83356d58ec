//! Error and diagnostic system for diagram scripts and schemas.
//!
//! This module provides an error handling system with:
//! - Error codes for documentation and searchability
//! - Error categories (syntax, capability, runtime) derived from the code
//! - Multiple labeled spans for rich error context
//! - Severity levels
//! - Diagnostic collector for accumulating multiple errors
//!
//! # Example
//!
//! ```
//! # use diagrammer_parser::error::{Diagnostic, ErrorCode};
//! # use diagrammer_parser::Span;
//!
//! let diag = Diagnostic::error("`open` is not available in aws diagrams")
//!     .with_code(ErrorCode::E200)
//!     .with_label(Span::new(4..8), "unknown symbol")
//!     .with_help("only the diagram vocabulary of the selected family can be used");
//! ```

mod collector;
mod diagnostic;
mod diagnostic_error;
mod error_code;

pub(crate) use collector::DiagnosticCollector;

pub use diagnostic::{Diagnostic, Label, LabelStyle, Severity};
pub use diagnostic_error::DiagnosticError;
pub use error_code::{ErrorCategory, ErrorCode};
