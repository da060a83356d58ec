//! Parser for diagram-script tokens.
//!
//! This module transforms the logical-line token stream from the
//! [`lexer`](super::lexer) into the syntax tree defined in
//! [`parser_types`](super::parser_types). The grammar is small enough for a
//! hand-driven recursive descent with one token of lookahead; winnow
//! provides the token stream and error plumbing.
//!
//! The public entry point is [`build_program`].

use winnow::{
    Parser as _,
    error::{ContextError, ErrMode},
    stream::{Stream, TokenSlice},
    token::any,
};

use crate::{
    error::{Diagnostic, DiagnosticError, ErrorCode},
    parser_types::{
        BinaryOp, CompareOp, Expr, ExprKind, LogicalOp, Stmt, UnaryOp, WithItem,
    },
    span::{Span, Spanned},
    tokens::{PositionedToken, Token},
};

/// Context type for parser errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Context {
    /// Description of what was expected
    Label(&'static str),
    /// Remaining token count (`eof_offset()`) at the offending token
    StartOffset(usize),
    /// Error code overriding the default E100
    Code(ErrorCode),
}

type Input<'src> = TokenSlice<'src, PositionedToken<'src>>;
type IResult<O> = Result<O, ErrMode<ContextError<Context>>>;

/// Deepest mix of open brackets, prefix operators and blocks the descent
/// will follow.
const MAX_NESTING: usize = 32;

/// Tallest expression tree handed to the compiler.
const MAX_EXPR_DEPTH: usize = 200;

/// Build a Cut error pointing at the next token.
fn fail(input: &Input<'_>, label: &'static str) -> ErrMode<ContextError<Context>> {
    fail_at(input.eof_offset(), label)
}

fn fail_at(start_offset: usize, label: &'static str) -> ErrMode<ContextError<Context>> {
    let mut e = ContextError::new();
    e.push(Context::StartOffset(start_offset));
    e.push(Context::Label(label));
    ErrMode::Cut(e)
}

/// Look at the next token without consuming it.
fn peek<'src>(input: &mut Input<'src>) -> Option<&'src PositionedToken<'src>> {
    let checkpoint = input.checkpoint();
    let token = any::<_, ErrMode<ContextError<Context>>>
        .parse_next(input)
        .ok();
    input.reset(&checkpoint);
    token
}

fn peek_is(input: &mut Input<'_>, expected: &Token<'_>) -> bool {
    peek(input).is_some_and(|t| t.token == *expected)
}

/// Consume the next token if it equals `expected`.
fn eat(input: &mut Input<'_>, expected: &Token<'_>) -> Option<Span> {
    let token = peek(input).filter(|t| t.token == *expected)?;
    input.next_token();
    Some(token.span)
}

fn expect(input: &mut Input<'_>, expected: &Token<'_>, label: &'static str) -> IResult<Span> {
    eat(input, expected).ok_or_else(|| fail(input, label))
}

fn identifier<'src>(input: &mut Input<'src>) -> IResult<Spanned<&'src str>> {
    match peek(input) {
        Some(PositionedToken {
            token: Token::Identifier(name),
            span,
        }) => {
            input.next_token();
            Ok(Spanned::new(*name, *span))
        }
        _ => Err(fail(input, "identifier")),
    }
}

// ============================================================================
// Statements
// ============================================================================

/// Parse one statement line or compound statement.
///
/// Returns several statements for `a = 1; b = 2`.
fn statement<'src>(input: &mut Input<'src>) -> IResult<Vec<Stmt<'src>>> {
    match peek(input).map(|t| &t.token) {
        Some(Token::With) => with_statement(input).map(|s| vec![s]),
        Some(Token::For) => for_statement(input).map(|s| vec![s]),
        Some(Token::If) => if_statement(input).map(|s| vec![s]),
        Some(Token::Indent) => Err(fail(input, "statement at the enclosing indentation")),
        _ => simple_statements(input),
    }
}

/// Parse `simple (';' simple)* [';'] NEWLINE`.
fn simple_statements<'src>(input: &mut Input<'src>) -> IResult<Vec<Stmt<'src>>> {
    let mut statements = vec![simple_statement(input)?];
    while eat(input, &Token::Semicolon).is_some() {
        if peek_is(input, &Token::Newline) {
            break;
        }
        statements.push(simple_statement(input)?);
    }
    expect(input, &Token::Newline, "end of statement")?;
    Ok(statements)
}

fn simple_statement<'src>(input: &mut Input<'src>) -> IResult<Stmt<'src>> {
    if let Some(span) = eat(input, &Token::Pass) {
        return Ok(Stmt::Pass(span));
    }

    let start_offset = input.eof_offset();
    let expr = expression(input)?;
    if eat(input, &Token::Equals).is_none() {
        return Ok(Stmt::Expr(expr));
    }

    let ExprKind::Name(name) = expr.kind else {
        let mut e = ContextError::new();
        e.push(Context::StartOffset(start_offset));
        e.push(Context::Label("a plain name before `=`"));
        e.push(Context::Code(ErrorCode::E102));
        return Err(ErrMode::Cut(e));
    };
    let value = expression(input)?;
    Ok(Stmt::Assign {
        target: Spanned::new(name, expr.span),
        value,
    })
}

/// Parse the body after a `:`, either an indented block or statements on
/// the same line.
fn suite<'src>(input: &mut Input<'src>) -> IResult<Vec<Stmt<'src>>> {
    if eat(input, &Token::Newline).is_none() {
        return simple_statements(input);
    }

    expect(input, &Token::Indent, "indented block")?;
    let mut body = Vec::new();
    while eat(input, &Token::Dedent).is_none() {
        if peek(input).is_none() {
            return Err(fail(input, "end of block"));
        }
        body.extend(statement(input)?);
    }
    Ok(body)
}

fn with_statement<'src>(input: &mut Input<'src>) -> IResult<Stmt<'src>> {
    expect(input, &Token::With, "`with`")?;

    let mut items = Vec::new();
    loop {
        let context = expression(input)?;
        let binding = if eat(input, &Token::As).is_some() {
            Some(identifier(input)?)
        } else {
            None
        };
        items.push(WithItem { context, binding });
        if eat(input, &Token::Comma).is_none() {
            break;
        }
    }

    expect(input, &Token::Colon, "`:`")?;
    let body = suite(input)?;
    Ok(Stmt::With { items, body })
}

fn for_statement<'src>(input: &mut Input<'src>) -> IResult<Stmt<'src>> {
    expect(input, &Token::For, "`for`")?;
    let target = identifier(input)?;
    expect(input, &Token::In, "`in`")?;
    let iterable = expression(input)?;
    expect(input, &Token::Colon, "`:`")?;
    let body = suite(input)?;
    Ok(Stmt::For {
        target,
        iterable,
        body,
    })
}

fn if_statement<'src>(input: &mut Input<'src>) -> IResult<Stmt<'src>> {
    expect(input, &Token::If, "`if`")?;
    let mut branches = Vec::new();

    let condition = expression(input)?;
    expect(input, &Token::Colon, "`:`")?;
    branches.push((condition, suite(input)?));

    while eat(input, &Token::Elif).is_some() {
        let condition = expression(input)?;
        expect(input, &Token::Colon, "`:`")?;
        branches.push((condition, suite(input)?));
    }

    let otherwise = if eat(input, &Token::Else).is_some() {
        expect(input, &Token::Colon, "`:`")?;
        suite(input)?
    } else {
        Vec::new()
    };

    Ok(Stmt::If {
        branches,
        otherwise,
    })
}

// ============================================================================
// Expressions, lowest precedence first
// ============================================================================

fn expression<'src>(input: &mut Input<'src>) -> IResult<Expr<'src>> {
    or_expression(input)
}

/// Reject trees the compiler would have to recurse through too far.
///
/// Operator chains are parsed in loops, so this is what bounds
/// `a >> b >> c >> ...`.
fn limit_depth<'src>(input: &Input<'src>, expr: Expr<'src>) -> IResult<Expr<'src>> {
    if expr.depth() <= MAX_EXPR_DEPTH {
        return Ok(expr);
    }
    let mut e = ContextError::new();
    e.push(Context::StartOffset(input.eof_offset()));
    e.push(Context::Label("expression has too many chained operators"));
    e.push(Context::Code(ErrorCode::E103));
    Err(ErrMode::Cut(e))
}

fn logical<'src>(
    input: &Input<'src>,
    left: Expr<'src>,
    op: LogicalOp,
    right: Expr<'src>,
) -> IResult<Expr<'src>> {
    let span = left.span.union(right.span);
    let expr = Expr::new(
        ExprKind::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    );
    limit_depth(input, expr)
}

fn binary<'src>(
    input: &Input<'src>,
    left: Expr<'src>,
    op: BinaryOp,
    right: Expr<'src>,
) -> IResult<Expr<'src>> {
    let span = left.span.union(right.span);
    let expr = Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    );
    limit_depth(input, expr)
}

fn or_expression<'src>(input: &mut Input<'src>) -> IResult<Expr<'src>> {
    let mut left = and_expression(input)?;
    while eat(input, &Token::Or).is_some() {
        let right = and_expression(input)?;
        left = logical(input, left, LogicalOp::Or, right)?;
    }
    Ok(left)
}

fn and_expression<'src>(input: &mut Input<'src>) -> IResult<Expr<'src>> {
    let mut left = not_expression(input)?;
    while eat(input, &Token::And).is_some() {
        let right = not_expression(input)?;
        left = logical(input, left, LogicalOp::And, right)?;
    }
    Ok(left)
}

fn not_expression<'src>(input: &mut Input<'src>) -> IResult<Expr<'src>> {
    let Some(not_span) = eat(input, &Token::Not) else {
        return comparison(input);
    };
    let operand = not_expression(input)?;
    let span = not_span.union(operand.span);
    Ok(Expr::new(
        ExprKind::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        },
        span,
    ))
}

fn comparison<'src>(input: &mut Input<'src>) -> IResult<Expr<'src>> {
    let left = shift(input)?;

    let op = match peek(input).map(|t| &t.token) {
        Some(Token::EqualEqual) => CompareOp::Eq,
        Some(Token::NotEqual) => CompareOp::Ne,
        Some(Token::Less) => CompareOp::Lt,
        Some(Token::LessEqual) => CompareOp::Le,
        Some(Token::Greater) => CompareOp::Gt,
        Some(Token::GreaterEqual) => CompareOp::Ge,
        _ => return Ok(left),
    };
    input.next_token();

    let right = shift(input)?;
    let span = left.span.union(right.span);
    Ok(Expr::new(
        ExprKind::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    ))
}

/// Edge operators `>>` and `<<`.
fn shift<'src>(input: &mut Input<'src>) -> IResult<Expr<'src>> {
    let mut left = arithmetic(input)?;
    loop {
        let op = match peek(input).map(|t| &t.token) {
            Some(Token::ShiftRight) => BinaryOp::ShiftRight,
            Some(Token::ShiftLeft) => BinaryOp::ShiftLeft,
            _ => return Ok(left),
        };
        input.next_token();
        let right = arithmetic(input)?;
        left = binary(input, left, op, right)?;
    }
}

fn arithmetic<'src>(input: &mut Input<'src>) -> IResult<Expr<'src>> {
    let mut left = term(input)?;
    loop {
        let op = match peek(input).map(|t| &t.token) {
            Some(Token::Plus) => BinaryOp::Add,
            Some(Token::Minus) => BinaryOp::Sub,
            _ => return Ok(left),
        };
        input.next_token();
        let right = term(input)?;
        left = binary(input, left, op, right)?;
    }
}

fn term<'src>(input: &mut Input<'src>) -> IResult<Expr<'src>> {
    let mut left = unary(input)?;
    loop {
        let op = match peek(input).map(|t| &t.token) {
            Some(Token::Star) => BinaryOp::Mul,
            Some(Token::Slash) => BinaryOp::Div,
            Some(Token::Percent) => BinaryOp::Mod,
            _ => return Ok(left),
        };
        input.next_token();
        let right = unary(input)?;
        left = binary(input, left, op, right)?;
    }
}

fn unary<'src>(input: &mut Input<'src>) -> IResult<Expr<'src>> {
    let (op, op_span) = match peek(input) {
        Some(PositionedToken {
            token: Token::Minus,
            span,
        }) => (UnaryOp::Neg, *span),
        Some(PositionedToken {
            token: Token::Plus,
            span,
        }) => (UnaryOp::Pos, *span),
        _ => return postfix(input),
    };
    input.next_token();

    let operand = unary(input)?;
    let span = op_span.union(operand.span);
    Ok(Expr::new(
        ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
        span,
    ))
}

/// Calls and attribute access following an atom.
fn postfix<'src>(input: &mut Input<'src>) -> IResult<Expr<'src>> {
    let mut expr = atom(input)?;
    loop {
        if eat(input, &Token::LeftParen).is_some() {
            let call = call_arguments(input, expr)?;
            expr = limit_depth(input, call)?;
        } else if eat(input, &Token::Dot).is_some() {
            let name = identifier(input)?;
            let span = expr.span.union(name.span());
            let attribute = Expr::new(
                ExprKind::Attribute {
                    object: Box::new(expr),
                    name,
                },
                span,
            );
            expr = limit_depth(input, attribute)?;
        } else {
            return Ok(expr);
        }
    }
}

/// Parse `args)` after the opening parenthesis of a call.
fn call_arguments<'src>(input: &mut Input<'src>, callee: Expr<'src>) -> IResult<Expr<'src>> {
    let mut args = Vec::new();
    let mut kwargs: Vec<(Spanned<&'src str>, Expr<'src>)> = Vec::new();

    let close = loop {
        if let Some(close) = eat(input, &Token::RightParen) {
            break close;
        }

        let checkpoint = input.checkpoint();
        let keyword = match identifier(input) {
            Ok(name) if eat(input, &Token::Equals).is_some() => Some(name),
            _ => {
                input.reset(&checkpoint);
                None
            }
        };

        match keyword {
            Some(name) => {
                let value = expression(input)?;
                kwargs.push((name, value));
            }
            None if !kwargs.is_empty() => {
                return Err(fail(input, "keyword argument"));
            }
            None => args.push(expression(input)?),
        }

        if eat(input, &Token::Comma).is_none() {
            break expect(input, &Token::RightParen, "`,` or `)`")?;
        }
    };

    let span = callee.span.union(close);
    Ok(Expr::new(
        ExprKind::Call {
            callee: Box::new(callee),
            args,
            kwargs,
        },
        span,
    ))
}

/// Parse comma separated items up to `close`, allowing a trailing comma.
fn delimited_items<'src, T>(
    input: &mut Input<'src>,
    close: &Token<'_>,
    close_label: &'static str,
    mut item: impl FnMut(&mut Input<'src>) -> IResult<T>,
) -> IResult<(Vec<T>, Span)> {
    let mut items = Vec::new();
    loop {
        if let Some(span) = eat(input, close) {
            return Ok((items, span));
        }
        items.push(item(input)?);
        if eat(input, &Token::Comma).is_none() {
            let span = expect(input, close, close_label)?;
            return Ok((items, span));
        }
    }
}

fn atom<'src>(input: &mut Input<'src>) -> IResult<Expr<'src>> {
    let Some(positioned) = peek(input) else {
        return Err(fail(input, "expression"));
    };
    let span = positioned.span;

    let kind = match &positioned.token {
        Token::Identifier(name) => ExprKind::Name(*name),
        Token::NumberLiteral(n) => ExprKind::Number(*n),
        Token::True => ExprKind::Bool(true),
        Token::False => ExprKind::Bool(false),
        Token::None => ExprKind::None,
        Token::StringLiteral(first) => {
            input.next_token();
            let mut value = first.clone();
            let mut span = span;
            // Adjacent literals concatenate.
            while let Some(PositionedToken {
                token: Token::StringLiteral(next),
                span: next_span,
            }) = peek(input)
            {
                input.next_token();
                value.push_str(next);
                span = span.union(*next_span);
            }
            return Ok(Expr::new(ExprKind::Str(value), span));
        }
        Token::LeftParen => {
            input.next_token();
            let inner = expression(input)?;
            let close = expect(input, &Token::RightParen, "`)`")?;
            return Ok(Expr::new(inner.kind, span.union(close)));
        }
        Token::LeftBracket => {
            input.next_token();
            let (items, close) =
                delimited_items(input, &Token::RightBracket, "`,` or `]`", expression)?;
            return Ok(Expr::new(ExprKind::List(items), span.union(close)));
        }
        Token::LeftBrace => {
            input.next_token();
            let (entries, close) =
                delimited_items(input, &Token::RightBrace, "`,` or `}`", dict_entry)?;
            return Ok(Expr::new(ExprKind::Dict(entries), span.union(close)));
        }
        _ => return Err(fail(input, "expression")),
    };

    input.next_token();
    Ok(Expr::new(kind, span))
}

fn dict_entry<'src>(input: &mut Input<'src>) -> IResult<(Expr<'src>, Expr<'src>)> {
    let key = expression(input)?;
    expect(input, &Token::Colon, "`:`")?;
    let value = expression(input)?;
    Ok((key, value))
}

fn program<'src>(input: &mut Input<'src>) -> IResult<Vec<Stmt<'src>>> {
    let mut body = Vec::new();
    while peek(input).is_some() {
        body.extend(statement(input)?);
    }
    Ok(body)
}

// ============================================================================
// Error conversion
// ============================================================================

fn is_layout(token: &Token<'_>) -> bool {
    matches!(token, Token::Newline | Token::Indent | Token::Dedent)
}

/// Convert a winnow error into a diagnostic.
///
/// The `StartOffset` context locates the offending token. Running out of
/// real tokens is reported as incomplete input at the last real token.
fn convert_error(
    error: ErrMode<ContextError<Context>>,
    tokens: &[PositionedToken<'_>],
    current_remaining: usize,
) -> Diagnostic {
    let context = match error {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e,
        ErrMode::Incomplete(_) => ContextError::new(),
    };

    let remaining = context
        .context()
        .find_map(|ctx| match ctx {
            Context::StartOffset(n) => Some(*n),
            _ => None,
        })
        .unwrap_or(current_remaining);
    let label = context.context().find_map(|ctx| match ctx {
        Context::Label(label) => Some(*label),
        _ => None,
    });
    let code = context.context().find_map(|ctx| match ctx {
        Context::Code(code) => Some(*code),
        _ => None,
    });

    let index = tokens.len().saturating_sub(remaining);

    if let (Some(ErrorCode::E103), Some(label)) = (code, label) {
        let span = tokens
            .get(index)
            .filter(|t| !is_layout(&t.token))
            .or_else(|| tokens.iter().rev().find(|t| !is_layout(&t.token)))
            .map(|t| t.span)
            .unwrap_or_default();
        return Diagnostic::error(label)
            .with_code(ErrorCode::E103)
            .with_label(span, ErrorCode::E103.description())
            .with_help(format!(
                "split chains longer than {MAX_EXPR_DEPTH} operators across several statements"
            ));
    }
    let at_end = tokens[index.min(tokens.len())..]
        .iter()
        .all(|t| is_layout(&t.token));

    if at_end {
        let span = tokens
            .iter()
            .rev()
            .find(|t| !is_layout(&t.token))
            .map(|t| t.span)
            .unwrap_or_default();
        let message = match label {
            Some(label) => format!("unexpected end of input, expected {label}"),
            None => "unexpected end of input".to_string(),
        };
        return Diagnostic::error(message)
            .with_code(ErrorCode::E101)
            .with_label(span, "input ends here")
            .with_help("check for an unclosed bracket or a missing block");
    }

    let found = &tokens[index];
    let code = code.unwrap_or(ErrorCode::E100);
    let message = match label {
        Some(label) => format!("expected {label}, found {}", found.token),
        None => format!("unexpected {}", found.token),
    };
    Diagnostic::error(message)
        .with_code(code)
        .with_label(found.span, code.description())
}

/// Refuse scripts nested deeper than [`MAX_NESTING`] before the recursive
/// descent runs.
///
/// Each open bracket, indented block and consecutive prefix operator
/// (`not`, unary `-` and `+`) costs one level.
fn check_nesting(tokens: &[PositionedToken<'_>]) -> Result<(), Diagnostic> {
    // Prefix depth in effect when each enclosing bracket opened.
    let mut open: Vec<usize> = Vec::new();
    let mut prefix = 0;
    let mut blocks = 0usize;
    let mut after_operand = false;

    for positioned in tokens {
        let base = open.last().copied().unwrap_or(0);
        match &positioned.token {
            Token::LeftParen | Token::LeftBracket | Token::LeftBrace => {
                open.push(prefix);
                after_operand = false;
            }
            Token::RightParen | Token::RightBracket | Token::RightBrace => {
                open.pop();
                prefix = open.last().copied().unwrap_or(0);
                after_operand = true;
            }
            Token::Not => {
                prefix += 1;
                after_operand = false;
            }
            Token::Minus | Token::Plus if !after_operand => prefix += 1,
            Token::Indent => {
                blocks += 1;
                prefix = base;
                after_operand = false;
            }
            Token::Dedent => {
                blocks = blocks.saturating_sub(1);
                prefix = base;
                after_operand = false;
            }
            Token::Identifier(_)
            | Token::NumberLiteral(_)
            | Token::StringLiteral(_)
            | Token::True
            | Token::False
            | Token::None => {
                prefix = base;
                after_operand = true;
            }
            _ => {
                prefix = base;
                after_operand = false;
            }
        }

        if open.len() + prefix + blocks > MAX_NESTING {
            return Err(Diagnostic::error(format!(
                "script nests more than {MAX_NESTING} levels deep"
            ))
            .with_code(ErrorCode::E103)
            .with_label(positioned.span, ErrorCode::E103.description())
            .with_help("assign inner parts to names to flatten the script"));
        }
    }
    Ok(())
}

/// Reject reserved keywords anywhere in the token stream.
///
/// Runs before parsing so a script using `import` or `lambda` fails as a
/// capability violation regardless of what surrounds the keyword.
pub fn reject_reserved(tokens: &[PositionedToken<'_>]) -> Result<(), DiagnosticError> {
    let diagnostics: Vec<Diagnostic> = tokens
        .iter()
        .filter_map(|t| match t.token {
            Token::Reserved(word) => Some(
                Diagnostic::error(format!("`{word}` is not allowed in diagram scripts"))
                    .with_code(ErrorCode::E202)
                    .with_label(t.span, "forbidden construct")
                    .with_help(
                        "scripts may only build diagrams with assignments, calls, `with`, `for` and `if`",
                    ),
            ),
            _ => None,
        })
        .collect();

    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(DiagnosticError::new(diagnostics))
    }
}

/// Build the statement list of a script from its tokens.
pub fn build_program<'src>(
    tokens: &'src [PositionedToken<'src>],
) -> Result<Vec<Stmt<'src>>, Diagnostic> {
    check_nesting(tokens)?;
    let mut token_slice = TokenSlice::new(tokens);

    match program(&mut token_slice) {
        Ok(body) => {
            log::trace!(statements = body.len(); "Parsed script");
            Ok(body)
        }
        Err(e) => {
            let current_remaining = token_slice.eof_offset();
            Err(convert_error(e, tokens, current_remaining))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_ok(source: &'static str) -> Vec<Stmt<'static>> {
        let tokens = Box::leak(tokenize(source).expect("tokenize").into_boxed_slice());
        build_program(tokens).unwrap_or_else(|d| panic!("parse failed: {d}"))
    }

    fn parse_err(source: &str) -> Diagnostic {
        let tokens = tokenize(source).expect("tokenize");
        let result = build_program(&tokens).map(|_| ());
        result.expect_err("parse should fail")
    }

    fn expr_of<'a, 'src>(stmt: &'a Stmt<'src>) -> &'a ExprKind<'src> {
        match stmt {
            Stmt::Expr(expr) => &expr.kind,
            Stmt::Assign { value, .. } => &value.kind,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_assignment_with_trailing_semicolon() {
        let body = parse_ok("graph = Diagram('t'); ");
        assert_eq!(body.len(), 1);
        let Stmt::Assign { target, value } = &body[0] else {
            panic!("expected assignment");
        };
        assert_eq!(*target.inner(), "graph");
        let ExprKind::Call { args, kwargs, .. } = &value.kind else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        assert!(kwargs.is_empty());
    }

    #[test]
    fn test_several_statements_on_one_line() {
        let body = parse_ok("a = 1; b = 2; pass");
        assert_eq!(body.len(), 3);
        assert!(matches!(body[2], Stmt::Pass(_)));
    }

    #[test]
    fn test_edge_chain_is_left_associative() {
        let body = parse_ok("a >> b >> c");
        let ExprKind::Binary { op, left, .. } = expr_of(&body[0]) else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::ShiftRight);
        assert!(matches!(
            left.kind,
            ExprKind::Binary {
                op: BinaryOp::ShiftRight,
                ..
            }
        ));
    }

    #[test]
    fn test_arithmetic_binds_tighter_than_edges() {
        let body = parse_ok("a >> b - c");
        let ExprKind::Binary { op, right, .. } = expr_of(&body[0]) else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::ShiftRight);
        assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: BinaryOp::Sub,
                ..
            }
        ));
    }

    #[test]
    fn test_keyword_arguments() {
        let body = parse_ok("Diagram('x', direction='TB', show=False)");
        let ExprKind::Call { args, kwargs, .. } = expr_of(&body[0]) else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        let names: Vec<_> = kwargs.iter().map(|(k, _)| *k.inner()).collect();
        assert_eq!(names, vec!["direction", "show"]);
    }

    #[test]
    fn test_positional_after_keyword_is_rejected() {
        let diag = parse_err("f(a=1, 2)");
        assert_eq!(diag.code(), Some(ErrorCode::E100));
        assert!(diag.message().contains("keyword argument"));
    }

    #[test]
    fn test_with_block_and_binding() {
        let body = parse_ok("with Diagram('t') as graph:\n    a = EC2('a')\n    b = EC2('b')\n");
        let Stmt::With { items, body } = &body[0] else {
            panic!("expected with");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].binding.as_ref().map(|b| *b.inner()), Some("graph"));
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_nested_blocks() {
        let source = "\
with Diagram('t') as graph:
    with Cluster('db'):
        for i in range(3):
            if i == 0:
                pass
            elif i == 1: x = 1
            else:
                y = 2
    z = 3
";
        let body = parse_ok(source);
        assert_eq!(body.len(), 1);
        let Stmt::With { body, .. } = &body[0] else {
            panic!("expected with");
        };
        assert_eq!(body.len(), 2);
        let Stmt::With { body: inner, .. } = &body[0] else {
            panic!("expected nested with");
        };
        let Stmt::For { body: loop_body, .. } = &inner[0] else {
            panic!("expected for");
        };
        let Stmt::If {
            branches,
            otherwise,
        } = &loop_body[0]
        else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(otherwise.len(), 1);
    }

    #[test]
    fn test_list_and_dict_literals_allow_trailing_comma() {
        let body = parse_ok("x = [a, b,]\ny = {'bgcolor': 'white', 'pad': 1,}\n");
        assert!(matches!(expr_of(&body[0]), ExprKind::List(items) if items.len() == 2));
        assert!(matches!(expr_of(&body[1]), ExprKind::Dict(entries) if entries.len() == 2));
    }

    #[test]
    fn test_attribute_access_is_parsed() {
        let body = parse_ok("x = a.b");
        assert!(matches!(expr_of(&body[0]), ExprKind::Attribute { .. }));
    }

    #[test]
    fn test_adjacent_strings_concatenate() {
        let body = parse_ok("x = 'a' \"b\"");
        assert_eq!(expr_of(&body[0]), &ExprKind::Str("ab".to_string()));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let diag = parse_err("f(x) = 1");
        assert_eq!(diag.code(), Some(ErrorCode::E102));
        assert_eq!(diag.primary_span(), Some(Span::new(0..1)));
    }

    #[test]
    fn test_subscript_is_a_syntax_error() {
        let diag = parse_err("x = a[0]");
        assert_eq!(diag.code(), Some(ErrorCode::E100));
        assert_eq!(diag.primary_span(), Some(Span::new(5..6)));
    }

    #[test]
    fn test_unclosed_call_is_incomplete() {
        let diag = parse_err("graph = Diagram('t'\n");
        assert_eq!(diag.code(), Some(ErrorCode::E101));
        assert_eq!(diag.primary_span(), Some(Span::new(16..19)));
    }

    #[test]
    fn test_missing_block() {
        let diag = parse_err("with Diagram('t'):\nx = 1\n");
        assert_eq!(diag.code(), Some(ErrorCode::E100));
        assert!(diag.message().contains("indented block"));
    }

    #[test]
    fn test_reserved_words_are_collected() {
        let tokens = tokenize("import os\nf = lambda: 1\n").expect("tokenize");
        let err = reject_reserved(&tokens).unwrap_err();
        assert_eq!(err.diagnostics().len(), 2);
        assert!(err
            .diagnostics()
            .iter()
            .all(|d| d.code() == Some(ErrorCode::E202)));
    }

    #[test]
    fn test_deep_parentheses_are_rejected() {
        let source = format!("x = {}1{}\n", "(".repeat(40), ")".repeat(40));
        let diag = parse_err(&source);
        assert_eq!(diag.code(), Some(ErrorCode::E103));
        assert_eq!(diag.primary_span(), Some(Span::new(36..37)));
    }

    #[test]
    fn test_deep_prefix_operators_are_rejected() {
        let diag = parse_err(&format!("x = {}y\n", "not ".repeat(40)));
        assert_eq!(diag.code(), Some(ErrorCode::E103));

        let diag = parse_err(&format!("x = {}1\n", "- ".repeat(40)));
        assert_eq!(diag.code(), Some(ErrorCode::E103));
    }

    #[test]
    fn test_deep_blocks_are_rejected() {
        let mut source = String::new();
        for level in 0..40 {
            source.push_str(&"    ".repeat(level));
            source.push_str("if True:\n");
        }
        source.push_str(&"    ".repeat(40));
        source.push_str("pass\n");

        let diag = parse_err(&source);
        assert_eq!(diag.code(), Some(ErrorCode::E103));
    }

    #[test]
    fn test_moderate_nesting_is_accepted() {
        let body = parse_ok("x = -(not ((1 + 2) * [[3], {'a': -4}]))\n");
        assert_eq!(body.len(), 1);
        let body = parse_ok("x = a - -b + -c - - d\n");
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn test_long_operator_chain_is_rejected() {
        let short = format!("x = a{}\n", " >> a".repeat(150)).leak();
        let body = parse_ok(short);
        let Stmt::Assign { value, .. } = &body[0] else {
            panic!("expected assignment");
        };
        assert_eq!(value.depth(), 151);

        let diag = parse_err(&format!("x = a{}\n", " >> a".repeat(250)));
        assert_eq!(diag.code(), Some(ErrorCode::E103));
        assert!(diag.message().contains("chained operators"));
    }
}
