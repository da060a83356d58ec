//! Parser for the line-oriented entity-relationship language.
//!
//! ```text
//! title {label: "Shop"}
//!
//! [Person] {bgcolor: "#ececfc"}
//! *id {label: "uuid"}
//! +location_id
//!
//! [Location]
//! *id
//!
//! Person *--1 Location {label: "lives in"}
//! ```
//!
//! Each non-blank line is one of: a title, an entity header, a column of the
//! most recent entity, a relation, or a `#` comment. Lines are parsed
//! independently so every malformed line is reported.

use winnow::{
    Parser as _,
    ascii::{space0, space1},
    combinator::{alt, delimited, eof, opt, separated, separated_pair},
    error::{ContextError, ErrMode},
    token::{one_of, take_while},
};

use diagrammer_core::{
    color::Color,
    erd::{Cardinality, Column, Entity, Relation, Schema},
};

use crate::{
    error::{Diagnostic, DiagnosticCollector, DiagnosticError, ErrorCode},
    span::Span,
};

type IResult<O> = Result<O, ErrMode<ContextError>>;

/// Options that are accepted for compatibility but have no effect.
const IGNORED_OPTIONS: &[&str] = &["border", "border-color", "color", "font", "size"];

fn bare_name<'a>(input: &mut &'a str) -> IResult<&'a str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_').parse_next(input)
}

fn quoted<'a>(input: &mut &'a str) -> IResult<&'a str> {
    delimited('"', take_while(0.., |c: char| c != '"'), '"').parse_next(input)
}

fn name<'a>(input: &mut &'a str) -> IResult<&'a str> {
    alt((
        quoted,
        delimited('`', take_while(1.., |c: char| c != '`'), '`'),
        bare_name,
    ))
    .parse_next(input)
}

fn option<'a>(input: &mut &'a str) -> IResult<(&'a str, &'a str)> {
    separated_pair(
        take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '-'),
        (space0, ':', space0),
        quoted,
    )
    .parse_next(input)
}

/// `{key: "value", ...}`
fn options<'a>(input: &mut &'a str) -> IResult<Vec<(&'a str, &'a str)>> {
    delimited(
        ('{', space0),
        separated(0.., option, (space0, ',', space0)),
        (space0, '}'),
    )
    .parse_next(input)
}

fn trailing_options<'a>(input: &mut &'a str) -> IResult<Vec<(&'a str, &'a str)>> {
    let found = opt(options).parse_next(input)?;
    (space0, eof).parse_next(input)?;
    Ok(found.unwrap_or_default())
}

fn title_line<'a>(input: &mut &'a str) -> IResult<Vec<(&'a str, &'a str)>> {
    ("title", space0).parse_next(input)?;
    trailing_options(input)
}

fn entity_line<'a>(input: &mut &'a str) -> IResult<(&'a str, Vec<(&'a str, &'a str)>)> {
    let name = delimited(('[', space0), name, (space0, ']')).parse_next(input)?;
    space0.parse_next(input)?;
    let options = trailing_options(input)?;
    Ok((name, options))
}

fn cardinality(input: &mut &str) -> IResult<Cardinality> {
    one_of(['?', '1', '*', '+'])
        .verify_map(Cardinality::from_symbol)
        .parse_next(input)
}

struct RelationLine<'a> {
    left: &'a str,
    left_cardinality: Cardinality,
    right_cardinality: Cardinality,
    right: &'a str,
    options: Vec<(&'a str, &'a str)>,
}

fn relation_line<'a>(input: &mut &'a str) -> IResult<RelationLine<'a>> {
    let (left, _, left_cardinality, _, right_cardinality, _, right) =
        (name, space1, cardinality, "--", cardinality, space1, name).parse_next(input)?;
    space0.parse_next(input)?;
    let options = trailing_options(input)?;
    Ok(RelationLine {
        left,
        left_cardinality,
        right_cardinality,
        right,
        options,
    })
}

fn column_line<'a>(input: &mut &'a str) -> IResult<(&'a str, &'a str, Vec<(&'a str, &'a str)>)> {
    let markers = take_while(0..=2, ['*', '+']).parse_next(input)?;
    let name = name.parse_next(input)?;
    space0.parse_next(input)?;
    let options = trailing_options(input)?;
    Ok((markers, name, options))
}

/// Parses a schema line by line, collecting every error.
struct SchemaParser<'a> {
    schema: Schema,
    diagnostics: DiagnosticCollector,
    relations: Vec<(Span, &'a str, &'a str)>,
}

impl<'a> SchemaParser<'a> {
    fn new() -> Self {
        Self {
            schema: Schema::new(),
            diagnostics: DiagnosticCollector::new(),
            relations: Vec::new(),
        }
    }

    fn error(&mut self, code: ErrorCode, message: String, span: Span, help: Option<&str>) {
        let diagnostic = Diagnostic::error(message)
            .with_code(code)
            .with_label(span, code.description());
        self.diagnostics.emit(match help {
            Some(help) => diagnostic.with_help(help),
            None => diagnostic,
        });
    }

    /// Report option keys that are neither `known` nor ignored.
    fn check_options(
        &mut self,
        options: &[(&str, &str)],
        known: &[&str],
        span: Span,
    ) -> bool {
        let mut ok = true;
        for (key, _) in options {
            if !known.contains(key) && !IGNORED_OPTIONS.contains(key) {
                self.error(
                    ErrorCode::E400,
                    format!("unknown option `{key}`"),
                    span,
                    Some("supported options: label, bgcolor"),
                );
                ok = false;
            }
        }
        ok
    }

    fn line(&mut self, text: &'a str, span: Span) {
        if text.starts_with('[') {
            self.entity(text, span);
        } else if text.strip_prefix("title").is_some_and(|rest| {
            rest.starts_with(|c: char| c.is_whitespace() || c == '{')
        }) {
            self.title(text, span);
        } else if text.contains("--") {
            self.relation(text, span);
        } else {
            self.column(text, span);
        }
    }

    fn title(&mut self, mut text: &'a str, span: Span) {
        let Ok(options) = title_line(&mut text) else {
            self.error(
                ErrorCode::E400,
                "malformed title".to_string(),
                span,
                Some("titles look like `title {label: \"My schema\"}`"),
            );
            return;
        };
        if !self.check_options(&options, &["label"], span) {
            return;
        }
        if let Some((_, label)) = options.iter().find(|(key, _)| *key == "label") {
            self.schema.set_title(*label);
        }
    }

    fn entity(&mut self, mut text: &'a str, span: Span) {
        let Ok((name, options)) = entity_line(&mut text) else {
            self.error(
                ErrorCode::E400,
                "malformed entity header".to_string(),
                span,
                Some("entities look like `[Person]` or `[Person] {label: \"People\"}`"),
            );
            return;
        };

        if self.schema.entity(name).is_some() {
            self.error(
                ErrorCode::E404,
                format!("entity `{name}` is declared twice"),
                span,
                None,
            );
            return;
        }

        let mut entity = Entity::new(name);
        if self.check_options(&options, &["label", "bgcolor"], span) {
            for (key, value) in &options {
                match *key {
                    "label" => entity.set_label(*value),
                    "bgcolor" => match Color::new(value) {
                        Ok(color) => entity.set_background(color),
                        Err(err) => self.error(ErrorCode::E405, err, span, None),
                    },
                    _ => {}
                }
            }
        }
        self.schema.push_entity(entity);
    }

    fn column(&mut self, mut text: &'a str, span: Span) {
        let Ok((markers, name, options)) = column_line(&mut text) else {
            self.error(
                ErrorCode::E400,
                "malformed line".to_string(),
                span,
                Some("expected an entity `[Name]`, a column `*id`, or a relation `A 1--* B`"),
            );
            return;
        };
        let known = self.check_options(&options, &["label"], span);

        let mut column = Column::new(name, markers.contains('*'), markers.contains('+'));
        if known {
            if let Some((_, label)) = options.iter().find(|(key, _)| *key == "label") {
                column = column.with_label(*label);
            }
        }

        match self.schema.last_entity_mut() {
            Some(entity) => entity.push_column(column),
            None => self.error(
                ErrorCode::E402,
                format!("column `{name}` appears before any entity"),
                span,
                Some("declare an entity first, e.g. `[Person]`"),
            ),
        }
    }

    fn relation(&mut self, mut text: &'a str, span: Span) {
        let Ok(line) = relation_line(&mut text) else {
            self.error(
                ErrorCode::E401,
                "malformed relation".to_string(),
                span,
                Some("relations look like `Person *--1 Location`; cardinalities are ? 1 * +"),
            );
            return;
        };
        if !self.check_options(&line.options, &["label"], span) {
            return;
        }

        let mut relation = Relation::new(
            line.left,
            line.left_cardinality,
            line.right_cardinality,
            line.right,
        );
        if let Some((_, label)) = line.options.iter().find(|(key, _)| *key == "label") {
            relation = relation.with_label(*label);
        }
        self.schema.push_relation(relation);
        self.relations.push((span, line.left, line.right));
    }

    fn finish(mut self) -> Result<Schema, DiagnosticError> {
        let relations = std::mem::take(&mut self.relations);
        for (span, left, right) in relations {
            for name in [left, right] {
                if self.schema.entity(name).is_none() {
                    self.error(
                        ErrorCode::E403,
                        format!("relation refers to undeclared entity `{name}`"),
                        span,
                        None,
                    );
                }
            }
        }

        self.diagnostics.finish()?;
        Ok(self.schema)
    }
}

/// Parse an entity-relationship description into a [`Schema`].
///
/// # Errors
///
/// Returns a [`DiagnosticError`] listing every malformed line, columns
/// declared before any entity, duplicate entities, invalid colors and
/// relations that name undeclared entities.
pub fn parse_erd(source: &str) -> Result<Schema, DiagnosticError> {
    let mut parser = SchemaParser::new();

    let mut offset = 0;
    for raw in source.split_inclusive('\n') {
        let line_start = offset;
        offset += raw.len();

        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let leading = raw.len() - raw.trim_start().len();
        let start = line_start + leading;
        parser.line(text, Span::new(start..start + text.len()));
    }

    let schema = parser.finish()?;
    log::debug!(
        entities = schema.entities().len(),
        relations = schema.relations().len();
        "Parsed schema"
    );
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP: &str = r##"title {label: "Shop"}

# people and where they live
[Person] {bgcolor: "#ececfc"}
*id {label: "uuid"}
name
+location_id

[Location]
*id

Person *--1 Location {label: "lives in"}
"##;

    fn codes(source: &str) -> Vec<ErrorCode> {
        let err = parse_erd(source).expect_err("schema should be rejected");
        err.diagnostics().iter().filter_map(|d| d.code()).collect()
    }

    #[test]
    fn test_parses_complete_schema() {
        let schema = parse_erd(SHOP).expect("valid schema");

        assert_eq!(schema.title(), Some("Shop"));
        assert_eq!(schema.entities().len(), 2);

        let person = schema.entity("Person").unwrap();
        assert!(person.background().is_some());
        let columns: Vec<String> = person.columns().iter().map(Column::display_text).collect();
        assert_eq!(columns, ["PK id : uuid", "name", "FK location_id"]);

        let relation = &schema.relations()[0];
        assert_eq!(relation.left(), "Person");
        assert_eq!(relation.left_cardinality(), Cardinality::ZeroOrMore);
        assert_eq!(relation.right_cardinality(), Cardinality::ExactlyOne);
        assert_eq!(relation.label(), Some("lives in"));
    }

    #[test]
    fn test_quoted_names_and_indentation() {
        let schema = parse_erd("  [\"Line Item\"]\n    *+order_id\n").unwrap();
        let entity = schema.entity("Line Item").unwrap();
        let column = &entity.columns()[0];
        assert!(column.is_primary_key());
        assert!(column.is_foreign_key());
    }

    #[test]
    fn test_malformed_relation_reports_its_line() {
        let source = "[A]\n[B]\nA *--x B\n";
        let err = parse_erd(source).unwrap_err();
        let diagnostic = &err.diagnostics()[0];
        assert_eq!(diagnostic.code(), Some(ErrorCode::E401));

        let span = diagnostic.primary_span().unwrap();
        let line = span.line_in(source);
        assert_eq!(line.number(), 3);
        assert_eq!(line.text(), "A *--x B");
    }

    #[test]
    fn test_column_before_entity() {
        assert_eq!(codes("*id\n[A]\n"), vec![ErrorCode::E402]);
    }

    #[test]
    fn test_undeclared_entity_in_relation() {
        assert_eq!(codes("[A]\nA 1--1 B\n"), vec![ErrorCode::E403]);
    }

    #[test]
    fn test_relation_may_precede_entities() {
        let schema = parse_erd("A 1--+ B\n[A]\n[B]\n").unwrap();
        assert_eq!(schema.relations().len(), 1);
    }

    #[test]
    fn test_duplicate_entity() {
        assert_eq!(codes("[A]\n[A]\n"), vec![ErrorCode::E404]);
    }

    #[test]
    fn test_invalid_color() {
        assert_eq!(codes("[A] {bgcolor: \"not-a-color\"}\n"), vec![ErrorCode::E405]);
    }

    #[test]
    fn test_every_bad_line_is_reported() {
        assert_eq!(
            codes("[A\n[B]\nB ?--? \n@@@\n"),
            vec![ErrorCode::E400, ErrorCode::E401, ErrorCode::E400]
        );
    }

    #[test]
    fn test_unknown_option() {
        assert_eq!(codes("[A] {shape: \"box\"}\n"), vec![ErrorCode::E400]);
    }

    #[test]
    fn test_ignored_options_are_accepted() {
        let schema = parse_erd("title {label: \"x\", size: \"20\"}\n[A] {size: \"12\"}\n").unwrap();
        assert_eq!(schema.title(), Some("x"));
    }
}
