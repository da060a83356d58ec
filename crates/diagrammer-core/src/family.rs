//! Diagram families.
//!
//! A [`Family`] selects the vocabulary a request is written in: one of the
//! cloud/on-premise provider scripts, an entity-relationship schema, or a
//! JSON document rendered as a tree.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Returned when a family name is not one of the supported vocabularies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported diagram type `{0}`; supported types are: {supported}", supported = Family::supported_names())]
pub struct UnsupportedFamily(pub String);

/// The diagram vocabulary selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Aws,
    Gcp,
    Azure,
    Onprem,
    Erd,
    JsonTree,
}

impl Family {
    /// All families, in the order they are advertised to clients.
    pub const ALL: [Family; 6] = [
        Family::Aws,
        Family::Gcp,
        Family::Azure,
        Family::Onprem,
        Family::Erd,
        Family::JsonTree,
    ];

    /// Canonical lowercase name of this family.
    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Aws => "aws",
            Family::Gcp => "gcp",
            Family::Azure => "azure",
            Family::Onprem => "onprem",
            Family::Erd => "erd",
            Family::JsonTree => "json",
        }
    }

    /// Returns `true` if requests of this family carry a diagram script.
    pub fn is_scripted(&self) -> bool {
        matches!(
            self,
            Family::Aws | Family::Gcp | Family::Azure | Family::Onprem
        )
    }

    /// File extension used when the original source is persisted.
    pub fn source_extension(&self) -> &'static str {
        match self {
            Family::Erd => "er",
            Family::JsonTree => "json",
            _ => "diag",
        }
    }

    /// Comma separated list of accepted family names.
    pub fn supported_names() -> String {
        Self::ALL
            .iter()
            .map(Family::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = UnsupportedFamily;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Family::Aws),
            "gcp" => Ok(Family::Gcp),
            "azure" => Ok(Family::Azure),
            "onprem" => Ok(Family::Onprem),
            "erd" => Ok(Family::Erd),
            "json" | "json-tree" | "json_tree" => Ok(Family::JsonTree),
            _ => Err(UnsupportedFamily(s.to_string())),
        }
    }
}
