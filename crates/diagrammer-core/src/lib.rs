//! # Diagrammer Core
//!
//! Core types shared by the Diagrammer crates:
//!
//! - [`family`] - the diagram vocabularies a request can select
//! - [`capability`] - the per-family allow-list of symbols visible to scripts
//! - [`diagram`] - the in-memory diagram built by an evaluated script
//! - [`erd`] - the entity-relationship schema model
//! - [`color`] - CSS color parsing for node, cluster and edge styling

pub mod capability;
pub mod color;
pub mod diagram;
pub mod erd;
pub mod family;
