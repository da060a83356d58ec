//! Diagrammer CLI library
//!
//! This module contains the core CLI logic for the Diagrammer tool: the
//! `handle` subcommand feeds one request body through a [`Coordinator`]
//! backed by a local filesystem store, and `check` evaluates a source file
//! without rendering it.

pub mod report;

mod args;
mod config;

pub use args::{Args, Command};

use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    sync::Arc,
};

use directories::ProjectDirs;
use log::{debug, info};
use serde::Serialize;

use diagrammer::{
    Coordinator, DiagrammerError, Response, family::Family, lower, request::Route, scene::Scene,
    store::FsStore,
};

/// Result of a successful CLI invocation.
#[derive(Debug)]
pub enum Outcome {
    /// A request was handled; the response may still carry an error status.
    Handled(Response),
    /// A source file evaluated cleanly.
    Checked(CheckSummary),
}

impl Outcome {
    /// Returns `true` unless a handled request failed.
    pub fn is_success(&self) -> bool {
        match self {
            Outcome::Handled(response) => response.status_code() < 400,
            Outcome::Checked(_) => true,
        }
    }

    /// JSON text printed for this outcome.
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            Outcome::Handled(response) => serde_json::to_string_pretty(response),
            Outcome::Checked(summary) => serde_json::to_string_pretty(summary),
        }
    }
}

/// What a checked source file would render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub family: String,
    pub title: String,
    pub file_stem: String,
    pub groups: usize,
    pub nodes: usize,
    pub edges: usize,
}

impl CheckSummary {
    fn new(family: Family, scene: &Scene, file_stem: String) -> Self {
        Self {
            family: family.as_str().to_string(),
            title: scene.title().to_string(),
            file_stem,
            // The root group is implicit.
            groups: scene.groups().len().saturating_sub(1),
            nodes: scene.nodes().len(),
            edges: scene.edges().len(),
        }
    }
}

/// Run the Diagrammer CLI application against the process environment
/// and standard input.
///
/// # Errors
///
/// Returns `DiagrammerError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Script, schema and JSON errors of `check`
pub fn run(args: &Args) -> Result<Outcome, DiagrammerError> {
    run_with(args, |name| std::env::var(name).ok(), &mut io::stdin().lock())
}

/// Run the CLI with an explicit environment lookup and input stream.
///
/// # Errors
///
/// See [`run`].
pub fn run_with(
    args: &Args,
    env: impl Fn(&str) -> Option<String>,
    stdin: &mut dyn Read,
) -> Result<Outcome, DiagrammerError> {
    let app_config = config::load_config(args.config.as_ref())?.with_env_overrides(env);

    match &args.command {
        Command::Handle {
            route,
            body,
            event,
            store_root,
        } => {
            let route = route
                .parse::<Route>()
                .map_err(DiagrammerError::Validation)?;
            let input = read_input(body.as_deref(), stdin)?;
            let root = store_root
                .as_deref()
                .map(PathBuf::from)
                .or_else(|| app_config.storage().root().map(PathBuf::from))
                .unwrap_or_else(default_store_root);
            info!(
                route:? = route,
                store_root = root.display().to_string();
                "Handling request"
            );

            let coordinator = Coordinator::new(app_config, Arc::new(FsStore::new(root)))?;
            let response = if *event {
                let event: serde_json::Value = serde_json::from_str(&input).map_err(|err| {
                    DiagrammerError::Validation(format!("event is not valid JSON: {err}"))
                })?;
                coordinator.handle_event(route, &event)
            } else {
                coordinator.handle(route, Some(&input))
            };
            Ok(Outcome::Handled(response))
        }
        Command::Check { family, input } => {
            let family = family
                .parse::<Family>()
                .map_err(|err| DiagrammerError::Validation(err.to_string()))?;
            info!(family = family.as_str(), input_path = input.as_str(); "Checking source");

            let source = fs::read_to_string(input)?;
            let (scene, stem) = lower(family, &source, app_config.sandbox())?;
            Ok(Outcome::Checked(CheckSummary::new(family, &scene, stem)))
        }
    }
}

fn read_input(path: Option<&str>, stdin: &mut dyn Read) -> io::Result<String> {
    match path {
        Some(path) if path != "-" => fs::read_to_string(path),
        _ => {
            debug!("Reading request body from stdin");
            let mut input = String::new();
            stdin.read_to_string(&mut input)?;
            Ok(input)
        }
    }
}

fn default_store_root() -> PathBuf {
    ProjectDirs::from("com", "diagrammer", "diagrammer")
        .map(|dirs| dirs.data_dir().join("store"))
        .unwrap_or_else(|| PathBuf::from("diagrammer-store"))
}
