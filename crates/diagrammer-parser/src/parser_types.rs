//! Syntax tree of diagram scripts.
//!
//! Names borrow from the source; string literals are owned because escapes
//! are resolved during lexing.

use crate::span::{Span, Spanned};

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt<'src> {
    /// `name = value`
    Assign {
        target: Spanned<&'src str>,
        value: Expr<'src>,
    },
    /// An expression evaluated for its effect, such as `a >> b`.
    Expr(Expr<'src>),
    /// `with ctx [as name], ...: body`
    With {
        items: Vec<WithItem<'src>>,
        body: Vec<Stmt<'src>>,
    },
    /// `for name in iterable: body`
    For {
        target: Spanned<&'src str>,
        iterable: Expr<'src>,
        body: Vec<Stmt<'src>>,
    },
    /// `if cond: body [elif cond: body]* [else: body]`
    If {
        branches: Vec<(Expr<'src>, Vec<Stmt<'src>>)>,
        otherwise: Vec<Stmt<'src>>,
    },
    Pass(Span),
}

/// One context manager of a `with` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct WithItem<'src> {
    pub context: Expr<'src>,
    pub binding: Option<Spanned<&'src str>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    ShiftRight,
    ShiftLeft,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::ShiftLeft => "<<",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// An expression with the span of the source that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr<'src> {
    pub kind: ExprKind<'src>,
    pub span: Span,
    depth: usize,
}

impl<'src> Expr<'src> {
    pub fn new(kind: ExprKind<'src>, span: Span) -> Self {
        let depth = 1 + kind.deepest_child();
        Self { kind, span, depth }
    }

    /// Height of the tree rooted here; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind<'src> {
    Str(String),
    Number(f64),
    Bool(bool),
    None,
    List(Vec<Expr<'src>>),
    Dict(Vec<(Expr<'src>, Expr<'src>)>),
    Name(&'src str),
    /// `object.name`; parsed so it can be rejected with a precise location.
    Attribute {
        object: Box<Expr<'src>>,
        name: Spanned<&'src str>,
    },
    Call {
        callee: Box<Expr<'src>>,
        args: Vec<Expr<'src>>,
        kwargs: Vec<(Spanned<&'src str>, Expr<'src>)>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr<'src>>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr<'src>>,
        right: Box<Expr<'src>>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr<'src>>,
        right: Box<Expr<'src>>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr<'src>>,
        right: Box<Expr<'src>>,
    },
}

impl ExprKind<'_> {
    fn deepest_child(&self) -> usize {
        match self {
            ExprKind::Str(_)
            | ExprKind::Number(_)
            | ExprKind::Bool(_)
            | ExprKind::None
            | ExprKind::Name(_) => 0,
            ExprKind::List(items) => items.iter().map(Expr::depth).max().unwrap_or(0),
            ExprKind::Dict(entries) => entries
                .iter()
                .map(|(key, value)| key.depth.max(value.depth))
                .max()
                .unwrap_or(0),
            ExprKind::Attribute { object, .. } => object.depth,
            ExprKind::Call {
                callee,
                args,
                kwargs,
            } => args
                .iter()
                .chain(kwargs.iter().map(|(_, value)| value))
                .map(Expr::depth)
                .fold(callee.depth, usize::max),
            ExprKind::Unary { operand, .. } => operand.depth,
            ExprKind::Binary { left, right, .. }
            | ExprKind::Compare { left, right, .. }
            | ExprKind::Logical { left, right, .. } => left.depth.max(right.depth),
        }
    }
}
