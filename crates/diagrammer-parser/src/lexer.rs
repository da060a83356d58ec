//! Lexical analyzer for diagram scripts.
//!
//! Tokenization happens in two passes. The first pass converts source text
//! into raw [`Token`]s with winnow, recovering from bad characters so every
//! lexical problem is reported at once. The second pass (layout) drops
//! trivia and turns leading whitespace into [`Token::Indent`] and
//! [`Token::Dedent`] markers, ignoring line breaks inside brackets.
//!
//! The public entry point is [`tokenize`].

use winnow::{
    Parser as _,
    combinator::{alt, opt, preceded},
    error::{ContextError, ErrMode},
    stream::{LocatingSlice, Location},
    token::{literal, one_of, take_while},
};

use crate::{
    error::{Diagnostic, DiagnosticCollector, DiagnosticError, ErrorCode},
    span::Span,
    tokens::{PositionedToken, Token},
};

/// Diagnostic information attached to winnow errors via `.context()`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LexerDiagnostic {
    code: ErrorCode,
    message: &'static str,
    help: Option<&'static str>,
    /// The error span covers from `start` to the error position.
    start: usize,
}

type Input<'a> = LocatingSlice<&'a str>;
type IResult<O> = Result<O, ErrMode<ContextError<LexerDiagnostic>>>;

/// Columns a tab advances the indentation to (next multiple).
const TAB_WIDTH: usize = 4;

fn cut_with(diagnostic: LexerDiagnostic) -> ErrMode<ContextError<LexerDiagnostic>> {
    let mut e = ContextError::new();
    e.push(diagnostic);
    ErrMode::Cut(e)
}

/// Parse the character after a backslash inside a string literal.
fn string_escape(input: &mut Input<'_>, escape_start: usize) -> IResult<char> {
    let escaped: Option<char> =
        opt(one_of(['n', 't', 'r', '\\', '\'', '"', '0'])).parse_next(input)?;

    match escaped {
        Some('n') => Ok('\n'),
        Some('t') => Ok('\t'),
        Some('r') => Ok('\r'),
        Some('0') => Ok('\0'),
        Some(c) => Ok(c),
        None => Err(cut_with(LexerDiagnostic {
            code: ErrorCode::E003,
            message: "invalid escape sequence",
            help: Some("valid escapes: `\\n`, `\\t`, `\\r`, `\\\\`, `\\'`, `\\\"`, `\\0`"),
            start: escape_start,
        })),
    }
}

/// Parse a single- or double-quoted string literal.
///
/// Strings end at the matching quote and may not span lines.
fn string_literal<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    let start = input.current_token_start();
    let quote: char = one_of(['"', '\'']).parse_next(input)?;

    let mut value = String::new();
    loop {
        let chunk: &str = take_while(0.., |c: char| {
            c != quote && c != '\\' && c != '\n' && c != '\r'
        })
        .parse_next(input)?;
        value.push_str(chunk);

        if opt(one_of(quote)).parse_next(input)?.is_some() {
            return Ok(Token::StringLiteral(value));
        }

        let escape_start = input.current_token_start();
        if opt('\\').parse_next(input)?.is_some() {
            value.push(string_escape(input, escape_start)?);
            continue;
        }

        return Err(cut_with(LexerDiagnostic {
            code: ErrorCode::E001,
            message: "unterminated string literal",
            help: Some("close the string on the same line"),
            start,
        }));
    }
}

/// Parse an integer or decimal literal not glued to an identifier.
fn number_literal<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    let digits = || take_while(1.., |c: char| c.is_ascii_digit());

    let number = (digits(), opt(preceded('.', digits())))
        .take()
        .try_map(|text: &str| text.parse::<f64>())
        .parse_next(input)?;

    let glued: Option<char> =
        opt(one_of(|c: char| c.is_ascii_alphabetic() || c == '_')).parse_next(input)?;
    if glued.is_some() {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }

    Ok(Token::NumberLiteral(number))
}

/// Parse identifiers, mapping keywords to their tokens.
fn identifier_or_keyword<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_')
        .verify(|s: &str| !s.starts_with(|c: char| c.is_ascii_digit()))
        .map(|word: &'a str| match word {
            "with" => Token::With,
            "as" => Token::As,
            "for" => Token::For,
            "in" => Token::In,
            "if" => Token::If,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "pass" => Token::Pass,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "True" => Token::True,
            "False" => Token::False,
            "None" => Token::None,
            word if crate::tokens::RESERVED_WORDS.contains(&word) => Token::Reserved(word),
            word => Token::Identifier(word),
        })
        .parse_next(input)
}

/// Parse two-character operators (must run before single characters).
fn multi_char_operator<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    alt((
        literal(">>").value(Token::ShiftRight),
        literal("<<").value(Token::ShiftLeft),
        literal("==").value(Token::EqualEqual),
        literal("!=").value(Token::NotEqual),
        literal("<=").value(Token::LessEqual),
        literal(">=").value(Token::GreaterEqual),
    ))
    .parse_next(input)
}

fn operator<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    alt((
        alt((
            '<'.value(Token::Less),
            '>'.value(Token::Greater),
            '='.value(Token::Equals),
            '+'.value(Token::Plus),
            '-'.value(Token::Minus),
            '*'.value(Token::Star),
        )),
        alt((
            '/'.value(Token::Slash),
            '%'.value(Token::Percent),
            '.'.value(Token::Dot),
            ':'.value(Token::Colon),
            ','.value(Token::Comma),
            ';'.value(Token::Semicolon),
        )),
    ))
    .parse_next(input)
}

fn delimiter<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    alt((
        '('.value(Token::LeftParen),
        ')'.value(Token::RightParen),
        '['.value(Token::LeftBracket),
        ']'.value(Token::RightBracket),
        '{'.value(Token::LeftBrace),
        '}'.value(Token::RightBrace),
    ))
    .parse_next(input)
}

fn line_comment<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    preceded('#', take_while(0.., |c| c != '\n'))
        .map(Token::LineComment)
        .parse_next(input)
}

/// Whitespace other than newlines.
fn whitespace<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    take_while(1.., |c: char| c.is_whitespace() && c != '\n')
        .value(Token::Whitespace)
        .parse_next(input)
}

fn newline<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    '\n'.value(Token::Newline).parse_next(input)
}

/// Parse a single token with position tracking.
fn positioned_token<'a>(input: &mut Input<'a>) -> IResult<PositionedToken<'a>> {
    let start_pos = input.current_token_start();

    let token = alt((
        line_comment,
        string_literal,
        number_literal,
        identifier_or_keyword,
        multi_char_operator,
        operator,
        delimiter,
        newline,
        whitespace,
    ))
    .parse_next(input)?;

    let end_pos = input.current_token_start();
    Ok(PositionedToken::new(token, Span::new(start_pos..end_pos)))
}

/// Lexer that accumulates tokens and diagnostics during tokenization.
struct Lexer<'a> {
    source: &'a str,
    tokens: Vec<PositionedToken<'a>>,
    diagnostics: DiagnosticCollector,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            diagnostics: DiagnosticCollector::new(),
        }
    }

    /// Tokenize the input, collecting tokens and errors.
    fn tokenize(&mut self) {
        let mut input = LocatingSlice::new(self.source);
        while !input.is_empty() {
            match positioned_token(&mut input) {
                Ok(token) => self.tokens.push(token),
                Err(e) => {
                    let error_pos = input.current_token_start();
                    self.diagnostics.emit(Self::convert_err_mode(e, error_pos));

                    // Skip to the end of the offending line; a broken string
                    // would otherwise cascade into more errors.
                    let _: IResult<&str> = take_while(0.., |c| c != '\n').parse_next(&mut input);
                }
            }
        }
    }

    /// Convert a winnow error into a diagnostic.
    ///
    /// Falls back to E002 (unexpected character) when no context is attached.
    fn convert_err_mode(err: ErrMode<ContextError<LexerDiagnostic>>, error_pos: usize) -> Diagnostic {
        let context_error = match err {
            ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx,
            ErrMode::Incomplete(_) => ContextError::new(),
        };

        if let Some(LexerDiagnostic {
            code,
            message,
            help,
            start,
        }) = context_error.context().next()
        {
            let span = Span::new(*start..error_pos.max(*start + 1));
            let mut diag = Diagnostic::error(*message)
                .with_code(*code)
                .with_label(span, code.description());
            if let Some(h) = help {
                diag = diag.with_help(*h);
            }
            return diag;
        }

        let span = Span::new(error_pos..error_pos.saturating_add(1));
        Diagnostic::error("unexpected character")
            .with_code(ErrorCode::E002)
            .with_label(span, ErrorCode::E002.description())
    }

    /// Run the layout pass and return the final token stream or every
    /// collected diagnostic.
    fn finish(mut self) -> Result<Vec<PositionedToken<'a>>, DiagnosticError> {
        let raw = std::mem::take(&mut self.tokens);
        let tokens = layout(raw, self.source, &mut self.diagnostics);
        self.diagnostics.finish().map(|()| tokens)
    }
}

/// Indentation width of a run of leading whitespace.
fn indent_width(text: &str) -> usize {
    text.chars().fold(0, |width, c| match c {
        ' ' => width + 1,
        '\t' => width + TAB_WIDTH - width % TAB_WIDTH,
        _ => width,
    })
}

/// Turn raw tokens into logical lines.
///
/// - Whitespace and comments are dropped.
/// - Blank lines and line breaks inside `()`, `[]` and `{}` are dropped.
/// - Every logical line ends with exactly one [`Token::Newline`].
/// - The indentation of the first logical line is the base level, so a
///   uniformly indented script is accepted.
/// - Changes of leading indentation emit [`Token::Indent`] and
///   [`Token::Dedent`]; a dedent to a column no enclosing block uses is
///   reported as E004.
fn layout<'a>(
    raw: Vec<PositionedToken<'a>>,
    source: &str,
    diagnostics: &mut DiagnosticCollector,
) -> Vec<PositionedToken<'a>> {
    let mut tokens = Vec::with_capacity(raw.len());
    let mut indents: Vec<usize> = vec![0];
    let mut depth = 0usize;
    let mut at_line_start = true;
    let mut pending_indent = 0usize;

    for positioned in raw {
        let span = positioned.span;
        match positioned.token {
            Token::Whitespace => {
                if at_line_start {
                    pending_indent = indent_width(&source[span.start()..span.end()]);
                }
            }
            Token::LineComment(_) => {}
            Token::Newline => {
                if depth > 0 {
                    continue;
                }
                if !at_line_start {
                    tokens.push(PositionedToken::new(Token::Newline, span));
                    at_line_start = true;
                }
                pending_indent = 0;
            }
            token => {
                if at_line_start && depth == 0 {
                    // The first logical line fixes the base column.
                    if tokens.is_empty() {
                        indents[0] = pending_indent;
                    }
                    let marker = Span::new(span.start()..span.start());
                    let current = indents.last().copied().unwrap_or(0);
                    if pending_indent > current {
                        indents.push(pending_indent);
                        tokens.push(PositionedToken::new(Token::Indent, marker));
                    } else if pending_indent < current {
                        while indents.last().is_some_and(|&top| top > pending_indent) {
                            indents.pop();
                            tokens.push(PositionedToken::new(Token::Dedent, marker));
                        }
                        if indents.last().copied().unwrap_or(0) != pending_indent {
                            let line_start = span.start() - pending_indent.min(span.start());
                            diagnostics.emit(
                                Diagnostic::error("unindent does not match any outer indentation level")
                                    .with_code(ErrorCode::E004)
                                    .with_label(Span::new(line_start..span.start()), "inconsistent indentation")
                                    .with_help("indent the line to the level of an enclosing block"),
                            );
                            indents.push(pending_indent);
                        }
                    }
                }
                at_line_start = false;

                if token.opens_group() {
                    depth += 1;
                } else if token.closes_group() {
                    depth = depth.saturating_sub(1);
                }
                tokens.push(PositionedToken::new(token, span));
            }
        }
    }

    let end = Span::new(source.len()..source.len());
    if !at_line_start {
        tokens.push(PositionedToken::new(Token::Newline, end));
    }
    while indents.len() > 1 {
        indents.pop();
        tokens.push(PositionedToken::new(Token::Dedent, end));
    }

    tokens
}

/// Tokenize diagram script source into logical-line tokens.
///
/// Recovers from errors and keeps going, so the returned error carries
/// every lexical problem in the source.
///
/// # Errors
///
/// Returns [`DiagnosticError`] with one diagnostic per problem found.
pub fn tokenize(source: &str) -> Result<Vec<PositionedToken<'_>>, DiagnosticError> {
    let mut lexer = Lexer::new(source);
    lexer.tokenize();
    let result = lexer.finish();
    if let Ok(tokens) = &result {
        log::trace!(tokens = tokens.len(); "Tokenized script");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token<'_>> {
        tokenize(source)
            .expect("source should tokenize")
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    fn single(source: &str) -> Token<'_> {
        let mut input = LocatingSlice::new(source);
        positioned_token(&mut input)
            .unwrap_or_else(|_| panic!("failed to lex {source:?}"))
            .token
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(single("with"), Token::With);
        assert_eq!(single("None"), Token::None);
        assert_eq!(single("within"), Token::Identifier("within"));
        assert_eq!(single("_private"), Token::Identifier("_private"));
        assert_eq!(single("EC2"), Token::Identifier("EC2"));
        assert_eq!(single("import"), Token::Reserved("import"));
        assert_eq!(single("lambda"), Token::Reserved("lambda"));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(single("42"), Token::NumberLiteral(42.0));
        assert_eq!(single("2.5"), Token::NumberLiteral(2.5));
    }

    #[test]
    fn test_number_glued_to_identifier_is_rejected() {
        let err = tokenize("x = 3abc").unwrap_err();
        assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E002));
    }

    #[test]
    fn test_strings_with_both_quotes_and_escapes() {
        assert_eq!(single("'web'"), Token::StringLiteral("web".to_string()));
        assert_eq!(
            single(r#""it's \"here\"\n""#),
            Token::StringLiteral("it's \"here\"\n".to_string())
        );
        assert_eq!(single("'a\\'b'"), Token::StringLiteral("a'b".to_string()));
    }

    #[test]
    fn test_operators_longest_first() {
        assert_eq!(kinds("a >> b")[1], Token::ShiftRight);
        assert_eq!(kinds("a << b")[1], Token::ShiftLeft);
        assert_eq!(kinds("a <= b")[1], Token::LessEqual);
        assert_eq!(kinds("a < b")[1], Token::Less);
        assert_eq!(kinds("a - b")[1], Token::Minus);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("graph = Diagram('t)\n").unwrap_err();
        let diag = &err.diagnostics()[0];
        assert_eq!(diag.code(), Some(ErrorCode::E001));
        assert_eq!(diag.primary_span().map(|s| s.start()), Some(16));
    }

    #[test]
    fn test_invalid_escape() {
        let err = tokenize(r"x = 'a\qb'").unwrap_err();
        assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E003));
    }

    #[test]
    fn test_unexpected_character_collects_all() {
        let err = tokenize("a = $\nb = ?\n").unwrap_err();
        assert_eq!(err.diagnostics().len(), 2);
        assert!(err
            .diagnostics()
            .iter()
            .all(|d| d.code() == Some(ErrorCode::E002)));
    }

    #[test]
    fn test_layout_statements_end_with_newline() {
        assert_eq!(
            kinds("graph = Diagram('t'); "),
            vec![
                Token::Identifier("graph"),
                Token::Equals,
                Token::Identifier("Diagram"),
                Token::LeftParen,
                Token::StringLiteral("t".to_string()),
                Token::RightParen,
                Token::Semicolon,
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_layout_indent_and_dedent() {
        let source = "with a:\n    b\n\n    # note\n    c\nd\n";
        assert_eq!(
            kinds(source),
            vec![
                Token::With,
                Token::Identifier("a"),
                Token::Colon,
                Token::Newline,
                Token::Indent,
                Token::Identifier("b"),
                Token::Newline,
                Token::Identifier("c"),
                Token::Newline,
                Token::Dedent,
                Token::Identifier("d"),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_layout_closes_blocks_at_end_of_input() {
        let tokens = kinds("if x:\n  if y:\n    z");
        let dedents = tokens.iter().filter(|t| **t == Token::Dedent).count();
        assert_eq!(dedents, 2);
        assert_eq!(tokens.last(), Some(&Token::Dedent));
    }

    #[test]
    fn test_layout_ignores_newlines_in_brackets() {
        let tokens = kinds("x = [\n    a,\n  b,\n]\n");
        assert!(!tokens.contains(&Token::Indent));
        assert_eq!(
            tokens.iter().filter(|t| **t == Token::Newline).count(),
            1
        );
    }

    #[test]
    fn test_layout_uniform_indentation_is_base_level() {
        let tokens = kinds("\n    a = 1\n    b = 2\n");
        assert!(!tokens.contains(&Token::Indent));
        assert!(!tokens.contains(&Token::Dedent));
    }

    #[test]
    fn test_layout_inconsistent_dedent() {
        let err = tokenize("with a:\n    b\n  c\n").unwrap_err();
        assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E004));
    }

    #[test]
    fn test_tabs_expand_to_next_stop() {
        assert_eq!(indent_width("\t"), 4);
        assert_eq!(indent_width("  \t"), 4);
        assert_eq!(indent_width("    \t "), 9);
    }
}
