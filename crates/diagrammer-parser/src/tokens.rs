//! Token definitions for diagram scripts.

use std::fmt;

use crate::span::Span;

/// A lexical token of the diagram-script language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    // Literals and names
    Identifier(&'a str),
    StringLiteral(String),
    NumberLiteral(f64),

    // Keywords
    With,
    As,
    For,
    In,
    If,
    Elif,
    Else,
    Pass,
    And,
    Or,
    Not,
    True,
    False,
    None,

    /// A keyword of the host-like syntax that the language refuses, such as
    /// `import` or `lambda`.
    Reserved(&'a str),

    // Operators
    ShiftRight,
    ShiftLeft,
    EqualEqual,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Less,
    Greater,
    Equals,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Dot,
    Colon,
    Comma,
    Semicolon,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,

    // Trivia, removed by the layout pass
    Whitespace,
    LineComment(&'a str),

    // Layout
    Newline,
    Indent,
    Dedent,
}

/// Keywords rejected wherever they appear.
pub const RESERVED_WORDS: &[&str] = &[
    "assert", "async", "await", "break", "class", "continue", "def", "del", "except", "exec",
    "finally", "from", "global", "import", "is", "lambda", "nonlocal", "raise", "return", "try",
    "while", "yield",
];

impl Token<'_> {
    /// Returns `true` for whitespace and comments.
    pub fn is_trivia(&self) -> bool {
        matches!(self, Token::Whitespace | Token::LineComment(_))
    }

    /// Returns `true` for tokens that open a bracketed group.
    pub fn opens_group(&self) -> bool {
        matches!(
            self,
            Token::LeftParen | Token::LeftBracket | Token::LeftBrace
        )
    }

    /// Returns `true` for tokens that close a bracketed group.
    pub fn closes_group(&self) -> bool {
        matches!(
            self,
            Token::RightParen | Token::RightBracket | Token::RightBrace
        )
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Identifier(name) => write!(f, "identifier `{name}`"),
            Token::StringLiteral(_) => write!(f, "string literal"),
            Token::NumberLiteral(n) => write!(f, "number `{n}`"),
            Token::With => write!(f, "`with`"),
            Token::As => write!(f, "`as`"),
            Token::For => write!(f, "`for`"),
            Token::In => write!(f, "`in`"),
            Token::If => write!(f, "`if`"),
            Token::Elif => write!(f, "`elif`"),
            Token::Else => write!(f, "`else`"),
            Token::Pass => write!(f, "`pass`"),
            Token::And => write!(f, "`and`"),
            Token::Or => write!(f, "`or`"),
            Token::Not => write!(f, "`not`"),
            Token::True => write!(f, "`True`"),
            Token::False => write!(f, "`False`"),
            Token::None => write!(f, "`None`"),
            Token::Reserved(word) => write!(f, "`{word}`"),
            Token::ShiftRight => write!(f, "`>>`"),
            Token::ShiftLeft => write!(f, "`<<`"),
            Token::EqualEqual => write!(f, "`==`"),
            Token::NotEqual => write!(f, "`!=`"),
            Token::LessEqual => write!(f, "`<=`"),
            Token::GreaterEqual => write!(f, "`>=`"),
            Token::Less => write!(f, "`<`"),
            Token::Greater => write!(f, "`>`"),
            Token::Equals => write!(f, "`=`"),
            Token::Plus => write!(f, "`+`"),
            Token::Minus => write!(f, "`-`"),
            Token::Star => write!(f, "`*`"),
            Token::Slash => write!(f, "`/`"),
            Token::Percent => write!(f, "`%`"),
            Token::Dot => write!(f, "`.`"),
            Token::Colon => write!(f, "`:`"),
            Token::Comma => write!(f, "`,`"),
            Token::Semicolon => write!(f, "`;`"),
            Token::LeftParen => write!(f, "`(`"),
            Token::RightParen => write!(f, "`)`"),
            Token::LeftBracket => write!(f, "`[`"),
            Token::RightBracket => write!(f, "`]`"),
            Token::LeftBrace => write!(f, "`{{`"),
            Token::RightBrace => write!(f, "`}}`"),
            Token::Whitespace => write!(f, "whitespace"),
            Token::LineComment(_) => write!(f, "comment"),
            Token::Newline => write!(f, "end of line"),
            Token::Indent => write!(f, "indentation"),
            Token::Dedent => write!(f, "end of block"),
        }
    }
}

/// A token with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedToken<'a> {
    pub token: Token<'a>,
    pub span: Span,
}

impl<'a> PositionedToken<'a> {
    pub fn new(token: Token<'a>, span: Span) -> Self {
        Self { token, span }
    }
}
