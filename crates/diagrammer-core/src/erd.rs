//! Entity-relationship schema model.
//!
//! The ERD family does not run a script; its source is a small
//! line-oriented schema language parsed by `diagrammer-parser` into a
//! [`Schema`].

use std::fmt;

use crate::color::Color;

/// How many rows take part on one side of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// `?` - zero or one
    ZeroOrOne,
    /// `1` - exactly one
    ExactlyOne,
    /// `*` - zero or more
    ZeroOrMore,
    /// `+` - one or more
    OneOrMore,
}

impl Cardinality {
    /// Parses the single-character cardinality marker.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '?' => Some(Cardinality::ZeroOrOne),
            '1' => Some(Cardinality::ExactlyOne),
            '*' => Some(Cardinality::ZeroOrMore),
            '+' => Some(Cardinality::OneOrMore),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Cardinality::ZeroOrOne => '?',
            Cardinality::ExactlyOne => '1',
            Cardinality::ZeroOrMore => '*',
            Cardinality::OneOrMore => '+',
        }
    }

    /// Range notation drawn next to the relation end.
    pub fn range(&self) -> &'static str {
        match self {
            Cardinality::ZeroOrOne => "0..1",
            Cardinality::ExactlyOne => "1",
            Cardinality::ZeroOrMore => "0..N",
            Cardinality::OneOrMore => "1..N",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.range())
    }
}

/// A column of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    primary_key: bool,
    foreign_key: bool,
    label: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, primary_key: bool, foreign_key: bool) -> Self {
        Self {
            name: name.into(),
            primary_key,
            foreign_key,
            label: None,
        }
    }

    /// Sets the type annotation, e.g. `varchar(255)`.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_foreign_key(&self) -> bool {
        self.foreign_key
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// One-line rendering with `PK`/`FK` markers, e.g. `PK id : uuid`.
    pub fn display_text(&self) -> String {
        let mut text = String::new();
        if self.primary_key {
            text.push_str("PK ");
        }
        if self.foreign_key {
            text.push_str("FK ");
        }
        text.push_str(&self.name);
        if let Some(label) = &self.label {
            text.push_str(" : ");
            text.push_str(label);
        }
        text
    }
}

/// A table.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    name: String,
    label: Option<String>,
    background: Option<Color>,
    columns: Vec<Column>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            background: None,
            columns: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display title; falls back to the entity name.
    pub fn title(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    pub fn background(&self) -> Option<Color> {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = Some(color);
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn push_column(&mut self, column: Column) {
        self.columns.push(column);
    }
}

/// A relation between two entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    left: String,
    right: String,
    left_cardinality: Cardinality,
    right_cardinality: Cardinality,
    label: Option<String>,
}

impl Relation {
    pub fn new(
        left: impl Into<String>,
        left_cardinality: Cardinality,
        right_cardinality: Cardinality,
        right: impl Into<String>,
    ) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            left_cardinality,
            right_cardinality,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn left(&self) -> &str {
        &self.left
    }

    pub fn right(&self) -> &str {
        &self.right
    }

    pub fn left_cardinality(&self) -> Cardinality {
        self.left_cardinality
    }

    pub fn right_cardinality(&self) -> Cardinality {
        self.right_cardinality
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// A parsed schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    title: Option<String>,
    entities: Vec<Entity>,
    relations: Vec<Relation>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    pub fn push_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    /// The most recently declared entity, which owns following column lines.
    pub fn last_entity_mut(&mut self) -> Option<&mut Entity> {
        self.entities.last_mut()
    }

    pub fn push_relation(&mut self, relation: Relation) {
        self.relations.push(relation);
    }
}
