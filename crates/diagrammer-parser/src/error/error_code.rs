//! Error codes for the diagram-script diagnostic system.
//!
//! Error codes are organized by phase:
//! - `E0xx` - Lexer errors
//! - `E1xx` - Parser errors
//! - `E2xx` - Capability violations found before execution
//! - `E3xx` - Runtime errors raised while executing a script
//! - `E4xx` - Entity-relationship schema errors

use std::fmt;

/// Error codes for categorizing diagnostic errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // Lexer Errors (E0xx)
    // =========================================================================
    /// Unterminated string literal.
    ///
    /// A string was opened with a quote but never closed on the same line.
    E001,

    /// Unexpected character.
    ///
    /// A character was encountered that is not valid in a diagram script.
    E002,

    /// Invalid escape sequence.
    ///
    /// Valid escapes are: `\n`, `\t`, `\r`, `\\`, `\'`, `\"`, `\0`.
    E003,

    /// Inconsistent indentation.
    ///
    /// A line dedents to a column that matches no enclosing block.
    E004,

    // =========================================================================
    // Parser Errors (E1xx)
    // =========================================================================
    /// Unexpected token.
    E100,

    /// Incomplete input.
    ///
    /// The input ended before a complete statement was parsed.
    E101,

    /// Invalid assignment target.
    ///
    /// Only plain names can be assigned to.
    E102,

    /// Nesting too deep.
    ///
    /// Brackets, prefix operators, blocks or operator chains are nested
    /// beyond what the parser accepts.
    E103,

    // =========================================================================
    // Capability Errors (E2xx)
    // =========================================================================
    /// Unknown name.
    ///
    /// The script refers to a name that is neither a local variable nor part
    /// of the family's capability set.
    E200,

    /// Attribute access.
    ///
    /// Attribute access (`a.b`) is not part of the diagram language.
    E201,

    /// Forbidden construct.
    ///
    /// Keywords such as `import`, `def`, `lambda`, `class` or `while` are
    /// reserved and rejected.
    E202,

    /// Path escape.
    ///
    /// A file name argument tried to leave the scratch directory.
    E203,

    /// Disallowed graph attribute.
    E204,

    // =========================================================================
    // Runtime Errors (E3xx)
    // =========================================================================
    /// Type mismatch.
    ///
    /// An operator or call was applied to values of the wrong kind.
    E300,

    /// Missing result.
    ///
    /// The script completed without binding a diagram to `graph`.
    E301,

    /// Timeout.
    ///
    /// Execution exceeded its wall-clock budget.
    E302,

    /// Step budget exhausted.
    E303,

    /// Bad argument.
    ///
    /// A call received an unknown keyword, a missing argument or an invalid
    /// value.
    E304,

    /// Element outside diagram.
    ///
    /// A node, cluster or edge was created with no enclosing diagram.
    E305,

    /// Resource limit.
    ///
    /// The script created more nodes, edges or list items than allowed.
    E306,

    /// Unbound name.
    ///
    /// A local name was read before any assignment to it ran.
    E307,

    // =========================================================================
    // Schema Errors (E4xx)
    // =========================================================================
    /// Malformed line.
    E400,

    /// Malformed relation.
    E401,

    /// Column declared before any entity.
    E402,

    /// Relation refers to an undeclared entity.
    E403,

    /// Duplicate entity.
    E404,

    /// Invalid color.
    E405,
}

/// The broad class a diagnostic belongs to.
///
/// Callers map this onto their own error taxonomy; the distinction matters
/// because syntax errors are reported with the offending line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The input could not be tokenized or parsed.
    Syntax,
    /// The input is well formed but reaches outside the allowed vocabulary.
    Capability,
    /// The input failed while executing.
    Runtime,
}

impl ErrorCode {
    /// Returns the numeric code as a string (e.g., "E001").
    pub fn as_str(&self) -> &'static str {
        match self {
            // Lexer errors
            ErrorCode::E001 => "E001",
            ErrorCode::E002 => "E002",
            ErrorCode::E003 => "E003",
            ErrorCode::E004 => "E004",
            // Parser errors
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E102 => "E102",
            ErrorCode::E103 => "E103",
            // Capability errors
            ErrorCode::E200 => "E200",
            ErrorCode::E201 => "E201",
            ErrorCode::E202 => "E202",
            ErrorCode::E203 => "E203",
            ErrorCode::E204 => "E204",
            // Runtime errors
            ErrorCode::E300 => "E300",
            ErrorCode::E301 => "E301",
            ErrorCode::E302 => "E302",
            ErrorCode::E303 => "E303",
            ErrorCode::E304 => "E304",
            ErrorCode::E305 => "E305",
            ErrorCode::E306 => "E306",
            ErrorCode::E307 => "E307",
            // Schema errors
            ErrorCode::E400 => "E400",
            ErrorCode::E401 => "E401",
            ErrorCode::E402 => "E402",
            ErrorCode::E403 => "E403",
            ErrorCode::E404 => "E404",
            ErrorCode::E405 => "E405",
        }
    }

    /// Returns a short description of what this error code means.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E001 => "unterminated string literal",
            ErrorCode::E002 => "unexpected character",
            ErrorCode::E003 => "invalid escape sequence",
            ErrorCode::E004 => "inconsistent indentation",
            ErrorCode::E100 => "unexpected token",
            ErrorCode::E101 => "incomplete input",
            ErrorCode::E102 => "invalid assignment target",
            ErrorCode::E103 => "nesting too deep",
            ErrorCode::E200 => "unknown name",
            ErrorCode::E201 => "attribute access",
            ErrorCode::E202 => "forbidden construct",
            ErrorCode::E203 => "path escape",
            ErrorCode::E204 => "disallowed graph attribute",
            ErrorCode::E300 => "type mismatch",
            ErrorCode::E301 => "missing result",
            ErrorCode::E302 => "timeout",
            ErrorCode::E303 => "step budget exhausted",
            ErrorCode::E304 => "bad argument",
            ErrorCode::E305 => "element outside diagram",
            ErrorCode::E306 => "resource limit",
            ErrorCode::E307 => "unbound name",
            ErrorCode::E400 => "malformed line",
            ErrorCode::E401 => "malformed relation",
            ErrorCode::E402 => "column before entity",
            ErrorCode::E403 => "undeclared entity",
            ErrorCode::E404 => "duplicate entity",
            ErrorCode::E405 => "invalid color",
        }
    }

    /// Returns the category this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::E001
            | ErrorCode::E002
            | ErrorCode::E003
            | ErrorCode::E004
            | ErrorCode::E100
            | ErrorCode::E101
            | ErrorCode::E102
            | ErrorCode::E103
            | ErrorCode::E400
            | ErrorCode::E401
            | ErrorCode::E402
            | ErrorCode::E403
            | ErrorCode::E404
            | ErrorCode::E405 => ErrorCategory::Syntax,
            ErrorCode::E200
            | ErrorCode::E201
            | ErrorCode::E202
            | ErrorCode::E203
            | ErrorCode::E204 => ErrorCategory::Capability,
            ErrorCode::E300
            | ErrorCode::E301
            | ErrorCode::E302
            | ErrorCode::E303
            | ErrorCode::E304
            | ErrorCode::E305
            | ErrorCode::E306
            | ErrorCode::E307 => ErrorCategory::Runtime,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
