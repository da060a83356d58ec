//! Rendering of scenes into artifact files.
//!
//! A [`Renderer`] writes exactly one file named `<stem>.<ext>` into an
//! output directory it is given. It never chooses its own location, so
//! concurrent requests with separate working directories cannot collide.
//!
//! # Available Backends
//!
//! - [`graphviz`] - the external Graphviz toolchain (feature `graphviz`)
//! - [`svg`] - a built-in SVG renderer over [`layout`]

#[cfg(feature = "graphviz")]
pub mod graphviz;
pub mod layout;
pub mod svg;

use std::{io, path::Path, sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    config::{RenderConfig, RendererKind},
    request::OutputFormat,
    scene::Scene,
};

/// Errors raised while rendering or collecting the artifact.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer `{renderer}` cannot produce {format} output")]
    Unsupported {
        renderer: &'static str,
        format: OutputFormat,
    },

    #[error("renderer is not available: {0}")]
    Unavailable(String),

    #[error("renderer failed: {0}")]
    Io(#[from] io::Error),

    #[error("renderer did not finish within {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("no .{extension} file was produced")]
    NoArtifact { extension: &'static str },

    #[error("{count} .{extension} files were produced; expected exactly one")]
    AmbiguousArtifact {
        extension: &'static str,
        count: usize,
    },
}

/// A rendering backend.
pub trait Renderer: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Returns `true` if the backend can produce `format`.
    fn supports(&self, format: OutputFormat) -> bool;

    /// Renders `scene` into `out_dir/<stem>.<ext>`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Unsupported`] for a format the backend does
    /// not support, and [`RenderError::Io`] if rendering or writing fails.
    fn render(
        &self,
        scene: &Scene,
        out_dir: &Path,
        stem: &str,
        format: OutputFormat,
    ) -> Result<(), RenderError>;
}

/// Builds the renderer selected by `config`.
///
/// # Errors
///
/// Returns [`RenderError::Unavailable`] when Graphviz is selected but the
/// crate was built without the `graphviz` feature.
pub fn renderer_for(config: &RenderConfig) -> Result<Arc<dyn Renderer>, RenderError> {
    match config.renderer() {
        RendererKind::Native => Ok(Arc::new(svg::SvgRenderer::default())),
        #[cfg(feature = "graphviz")]
        RendererKind::Graphviz => Ok(Arc::new(graphviz::GraphvizRenderer::new(
            config.layout_engine(),
            config.timeout(),
        )?)),
        #[cfg(not(feature = "graphviz"))]
        RendererKind::Graphviz => Err(RenderError::Unavailable(
            "built without the `graphviz` feature".to_string(),
        )),
    }
}

pub(crate) fn check_format(renderer: &dyn Renderer, format: OutputFormat) -> Result<(), RenderError> {
    if renderer.supports(format) {
        Ok(())
    } else {
        Err(RenderError::Unsupported {
            renderer: renderer.name(),
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_renderer_selection() {
        let config = RenderConfig::new(RendererKind::Native, OutputFormat::Svg, "dot");
        let renderer = renderer_for(&config).unwrap();
        assert_eq!(renderer.name(), "native");
        assert!(renderer.supports(OutputFormat::Svg));
        assert!(!renderer.supports(OutputFormat::Png));
    }

    #[test]
    fn test_unsupported_format_is_reported() {
        let renderer = svg::SvgRenderer::default();
        let err = check_format(&renderer, OutputFormat::Pdf).unwrap_err();
        assert_eq!(err.to_string(), "renderer `native` cannot produce pdf output");
    }

    #[test]
    fn test_timeout_message_names_the_limit() {
        let err = RenderError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "renderer did not finish within 1500 ms");
    }
}
