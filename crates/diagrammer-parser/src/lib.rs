//! # Diagrammer Parser
//!
//! Front ends for the two kinds of diagram source Diagrammer accepts:
//!
//! - **Scripts** (cloud and on-premises families) are run by a sandboxed
//!   evaluator. The script is tokenized, parsed, compiled against the
//!   family's [`CapabilitySet`] and executed on a bounded stack machine.
//!   A script can only reach the constructors its family exposes, and it
//!   is stopped once it exceeds its [`Limits`].
//! - **Schemas** (ERD family) are parsed by a line-oriented parser.
//!
//! ## Usage
//!
//! ```
//! # use diagrammer_parser::{evaluate, Limits, DiagnosticError};
//! use diagrammer_core::capability::build_capabilities;
//!
//! fn main() -> Result<(), DiagnosticError> {
//!     let source = r#"
//! with Diagram("Web", direction="LR") as graph:
//!     EC2("web") >> RDS("db")
//! "#;
//!
//!     let caps = build_capabilities("aws").unwrap();
//!     let diagram = evaluate(source, &caps, &Limits::default())?;
//!     assert_eq!(diagram.nodes().len(), 2);
//!     Ok(())
//! }
//! ```

mod builtins;
mod compile;
mod erd;
pub mod error;
mod lexer;
mod parser;
mod parser_types;
mod span;
mod tokens;
mod value;
mod vm;

pub use compile::RESULT_NAME;
pub use erd::parse_erd;
pub use error::{
    Diagnostic, DiagnosticError, ErrorCategory, ErrorCode, Label, LabelStyle, Severity,
};
pub use span::{SourceLine, Span, Spanned};
pub use vm::{ALLOWED_GRAPH_ATTRS, Limits};

use diagrammer_core::{capability::CapabilitySet, diagram::Diagram};

/// Evaluate a diagram script and return the diagram it binds to
/// [`RESULT_NAME`].
///
/// The pipeline:
///
/// 0. **Size check** - reject sources longer than `limits.max_source_len`
/// 1. **Tokenize** - source text to tokens, with indentation markers
/// 2. **Screen** - reject reserved keywords such as `import` or `lambda`
/// 3. **Parse** - build the statement tree, refusing nesting deeper than
///    the parser can follow
/// 4. **Compile** - resolve every name against `capabilities` and emit
///    instructions; unknown names are capability violations
/// 5. **Run** - execute under `limits`
///
/// # Errors
///
/// Returns a [`DiagnosticError`] whose [`ErrorCategory`] tells syntax
/// errors, capability violations and runtime failures apart.
pub fn evaluate(
    source: &str,
    capabilities: &CapabilitySet,
    limits: &Limits,
) -> Result<Diagram, DiagnosticError> {
    log::debug!(
        family = capabilities.family().as_str(),
        bytes = source.len();
        "Evaluating script"
    );

    if source.len() > limits.max_source_len {
        return Err(Diagnostic::error(format!(
            "script of {} bytes exceeds the limit of {} bytes",
            source.len(),
            limits.max_source_len
        ))
        .with_code(ErrorCode::E306)
        .with_help("split the diagram into smaller scripts")
        .into());
    }

    // Step 1: Tokenize
    let tokens = lexer::tokenize(source)?;

    // Step 2: Screen
    parser::reject_reserved(&tokens)?;

    // Step 3: Parse
    let body = parser::build_program(&tokens)?;

    // Step 4: Compile
    let program = compile::compile(&body, capabilities)?;

    // Step 5: Run
    vm::Machine::new(&program, limits).run()
}
