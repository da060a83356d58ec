//! Diagrammer - sandboxed diagram-as-code rendering and publishing.
//!
//! Requests carry a diagram family and source text: a provider script
//! (`aws`, `gcp`, `azure`, `onprem`), an entity-relationship schema, or a
//! JSON document. The source is evaluated without access to the host,
//! lowered into a renderer-neutral [`scene::Scene`], rendered into a
//! per-request working directory and published to an object store.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use diagrammer::{
//!     Coordinator,
//!     config::{AppConfig, RenderConfig, RendererKind, SandboxConfig, StorageConfig},
//!     request::{OutputFormat, Route},
//!     store::MemoryStore,
//! };
//!
//! let config = AppConfig::new(
//!     StorageConfig::new(Some("diagrams".to_string()), "us-east-1", None),
//!     RenderConfig::new(RendererKind::Native, OutputFormat::Svg, "dot"),
//!     SandboxConfig::default(),
//!     None,
//! );
//! let store = Arc::new(MemoryStore::new());
//! let coordinator = Coordinator::new(config, store.clone()).unwrap();
//!
//! let body = r#"{"type": "aws", "source": "with Diagram('web') as graph:\n    EC2('app')"}"#;
//! let response = coordinator.handle(Route::Diagram, Some(body));
//! assert_eq!(response.status_code(), 201);
//! assert_eq!(store.len(), 2);
//! ```

pub mod config;
pub mod coordinator;
pub mod materialize;
pub mod publish;
pub mod render;
pub mod request;
pub mod scene;
pub mod store;

mod error;

pub use diagrammer_core::{capability, color, diagram, erd, family};
pub use diagrammer_parser::Limits;

pub use coordinator::{Coordinator, Response, lower};
pub use error::{DiagrammerError, ErrorKind};
