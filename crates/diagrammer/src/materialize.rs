//! Per-request working directories and artifact lookup.
//!
//! Each request renders into its own [`WorkDir`]. The directory and
//! everything in it is removed when the last owner drops it, whether the
//! request succeeded or not.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use tempfile::TempDir;

use crate::{render::RenderError, request::OutputFormat};

/// A scratch directory owned by one request.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Creates a fresh directory under `parent`, or under the system
    /// temporary directory when `parent` is `None`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be created.
    pub fn new(parent: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("diagrammer-");
        let dir = match parent {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        debug!(path = dir.path().display().to_string(); "Working directory created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// A rendered file together with the directory that keeps it alive.
#[derive(Debug)]
pub struct RenderedArtifact {
    path: PathBuf,
    format: OutputFormat,
    // Dropping the artifact removes the file.
    _workdir: WorkDir,
}

impl RenderedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

/// Takes ownership of `workdir` and returns the single file in it with the
/// extension of `format`.
///
/// # Errors
///
/// Returns [`RenderError::NoArtifact`] when no such file exists and
/// [`RenderError::AmbiguousArtifact`] when there is more than one. The
/// directory is removed in both cases.
pub fn materialize(workdir: WorkDir, format: OutputFormat) -> Result<RenderedArtifact, RenderError> {
    let extension = format.extension();
    let mut matches = Vec::new();
    for entry in fs::read_dir(workdir.path())? {
        let path = entry?.path();
        let has_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if has_extension && path.is_file() {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => {
            warn!(extension = extension; "Renderer produced no artifact");
            Err(RenderError::NoArtifact { extension })
        }
        1 => {
            let path = matches.remove(0);
            debug!(path = path.display().to_string(); "Artifact located");
            Ok(RenderedArtifact {
                path,
                format,
                _workdir: workdir,
            })
        }
        count => {
            warn!(extension = extension, count = count; "Renderer produced several artifacts");
            Err(RenderError::AmbiguousArtifact { extension, count })
        }
    }
}
