//! Configuration types for Diagrammer.
//!
//! All types implement [`serde::Deserialize`] so the CLI can load them from
//! TOML. Every field has a default, so an empty document is a valid
//! configuration except for the storage bucket, which has to come from the
//! file or the environment.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration.
//! - [`StorageConfig`] - Object store bucket, region and local root.
//! - [`RenderConfig`] - Renderer selection and default output format.
//! - [`SandboxConfig`] - Resource limits of script evaluation.
//!
//! # Example
//!
//! ```
//! # use diagrammer::config::AppConfig;
//! let config = AppConfig::default()
//!     .with_env_overrides(|name| (name == "DIAGRAM_BUCKET").then(|| "diagrams".to_string()));
//! assert_eq!(config.storage().bucket(), Some("diagrams"));
//! assert_eq!(config.storage().region(), "us-east-1");
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use diagrammer_parser::Limits;

use crate::request::OutputFormat;

/// Environment variables naming the bucket, in lookup order.
pub const BUCKET_ENV_VARS: [&str; 2] = ["DIAGRAM_BUCKET", "DIAGRAMS_BUCKET"];

/// Environment variable naming the bucket region.
pub const REGION_ENV_VAR: &str = "AWS_REGION";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Object store settings.
    #[serde(default)]
    storage: StorageConfig,

    /// Renderer settings.
    #[serde(default)]
    render: RenderConfig,

    /// Script evaluation limits.
    #[serde(default)]
    sandbox: SandboxConfig,

    /// Parent directory of per-request working directories. Defaults to
    /// the system temporary directory.
    #[serde(default)]
    scratch_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn new(
        storage: StorageConfig,
        render: RenderConfig,
        sandbox: SandboxConfig,
        scratch_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            storage,
            render,
            sandbox,
            scratch_dir,
        }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn render(&self) -> &RenderConfig {
        &self.render
    }

    pub fn sandbox(&self) -> &SandboxConfig {
        &self.sandbox
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// `DIAGRAM_BUCKET` (or `DIAGRAMS_BUCKET`) replaces the bucket and
    /// `AWS_REGION` replaces the region. Empty values are ignored.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(bucket) = BUCKET_ENV_VARS.iter().find_map(|name| non_empty(*name)) {
            self.storage.bucket = Some(bucket);
        }
        if let Some(region) = non_empty(REGION_ENV_VAR) {
            self.storage.region = region;
        }
        self
    }
}

/// Object store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Bucket receiving artifacts and sources. Required to serve requests.
    #[serde(default)]
    bucket: Option<String>,

    /// Region used to build public URLs.
    #[serde(default = "default_region")]
    region: String,

    /// Root directory of the local filesystem store.
    #[serde(default)]
    root: Option<PathBuf>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: default_region(),
            root: None,
        }
    }
}

impl StorageConfig {
    pub fn new(bucket: Option<String>, region: impl Into<String>, root: Option<PathBuf>) -> Self {
        Self {
            bucket,
            region: region.into(),
            root,
        }
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

/// Which renderer turns a scene into an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// The external Graphviz toolchain.
    #[default]
    Graphviz,
    /// The built-in SVG renderer; supports only `svg`.
    Native,
}

/// Renderer settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    renderer: RendererKind,

    /// Format used when a request does not name one.
    #[serde(default)]
    default_format: OutputFormat,

    /// Graphviz layout engine (`dot`, `neato`, `fdp`, ...).
    #[serde(default = "default_layout_engine")]
    layout_engine: String,

    /// Milliseconds an external renderer may run before it is killed.
    #[serde(default = "default_render_timeout_ms")]
    timeout_ms: u64,
}

fn default_layout_engine() -> String {
    "dot".to_string()
}

fn default_render_timeout_ms() -> u64 {
    30_000
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            renderer: RendererKind::default(),
            default_format: OutputFormat::default(),
            layout_engine: default_layout_engine(),
            timeout_ms: default_render_timeout_ms(),
        }
    }
}

impl RenderConfig {
    pub fn new(
        renderer: RendererKind,
        default_format: OutputFormat,
        layout_engine: impl Into<String>,
    ) -> Self {
        Self {
            renderer,
            default_format,
            layout_engine: layout_engine.into(),
            timeout_ms: default_render_timeout_ms(),
        }
    }

    pub fn renderer(&self) -> RendererKind {
        self.renderer
    }

    pub fn default_format(&self) -> OutputFormat {
        self.default_format
    }

    pub fn layout_engine(&self) -> &str {
        &self.layout_engine
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns a copy with a different renderer timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }
}

/// Resource limits applied to every request.
///
/// Missing fields take the defaults of [`Limits`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    timeout_ms: u64,
    max_steps: u64,
    max_nodes: usize,
    max_edges: usize,
    max_list_len: usize,
    max_string_len: usize,
    max_source_len: usize,
    /// Maximum number of nodes a JSON document may expand to.
    max_json_nodes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            timeout_ms: limits.timeout.as_millis() as u64,
            max_steps: limits.max_steps,
            max_nodes: limits.max_nodes,
            max_edges: limits.max_edges,
            max_list_len: limits.max_list_len,
            max_string_len: limits.max_string_len,
            max_source_len: limits.max_source_len,
            max_json_nodes: 2_000,
        }
    }
}

impl SandboxConfig {
    /// Evaluation limits for one script.
    pub fn limits(&self) -> Limits {
        Limits {
            timeout: Duration::from_millis(self.timeout_ms),
            max_steps: self.max_steps,
            max_nodes: self.max_nodes,
            max_edges: self.max_edges,
            max_list_len: self.max_list_len,
            max_string_len: self.max_string_len,
            max_source_len: self.max_source_len,
        }
    }

    pub fn max_json_nodes(&self) -> usize {
        self.max_json_nodes
    }

    /// Returns a copy with a different timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }
}
