//! Request handling from body to response.
//!
//! [`Coordinator::handle`] is the only place where failures become status
//! codes. Each call owns its capability set, VM, scene and working
//! directory, so one coordinator can serve concurrent requests.

use std::sync::Arc;

use log::{error, info, warn};
use serde::Serialize;

use diagrammer_core::{capability::CapabilitySet, family::Family};
use diagrammer_parser::{evaluate, parse_erd};

use crate::{
    config::{AppConfig, SandboxConfig},
    error::{DiagrammerError, ErrorKind},
    materialize::{WorkDir, materialize},
    publish::{PublishedPair, Publisher},
    render::{Renderer, renderer_for},
    request::{DiagramRequest, Route},
    scene::Scene,
    store::ObjectStore,
};

/// Transport-level response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    #[serde(rename = "statusCode")]
    status_code: u16,
    body: String,
}

impl Response {
    fn json(status_code: u16, body: serde_json::Value) -> Self {
        Self {
            status_code,
            body: body.to_string(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// JSON-encoded body.
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Handles diagram requests against one store and renderer.
pub struct Coordinator {
    config: AppConfig,
    store: Arc<dyn ObjectStore>,
    renderer: Arc<dyn Renderer>,
}

impl Coordinator {
    /// Creates a coordinator using the renderer selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if that renderer is not available.
    pub fn new(config: AppConfig, store: Arc<dyn ObjectStore>) -> Result<Self, DiagrammerError> {
        let renderer = renderer_for(config.render())
            .map_err(|err| DiagrammerError::Configuration(err.to_string()))?;
        Ok(Self {
            config,
            store,
            renderer,
        })
    }

    /// Replaces the renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handles a transport event of the form `{"body": "<json string>"}`.
    pub fn handle_event(&self, route: Route, event: &serde_json::Value) -> Response {
        self.handle(route, event.get("body").and_then(serde_json::Value::as_str))
    }

    /// Handles one request body received on `route`.
    pub fn handle(&self, route: Route, body: Option<&str>) -> Response {
        match self.process(route, body) {
            Ok((request, pair)) => {
                let message = success_message(route, &request);
                Response::json(
                    route.success_status(),
                    serde_json::json!({
                        "message": message,
                        "diagram_id": pair.diagram_id(),
                        "diagram_url": pair.diagram_url(),
                        "source_url": pair.source_url(),
                    }),
                )
            }
            Err(err) => error_response(&err),
        }
    }

    fn process(
        &self,
        route: Route,
        body: Option<&str>,
    ) -> Result<(DiagramRequest, PublishedPair), DiagrammerError> {
        let storage = self.config.storage();
        let bucket = storage.bucket().ok_or_else(|| {
            DiagrammerError::Configuration("no storage bucket is configured".to_string())
        })?;

        let request =
            DiagramRequest::from_body(route, body, self.config.render().default_format())?;
        info!(
            route:? = route,
            family = request.family().as_str(),
            format = request.output_format().extension();
            "Handling diagram request"
        );

        let (scene, stem) = lower(request.family(), request.source_text(), self.config.sandbox())?;

        let workdir = WorkDir::new(self.config.scratch_dir())?;
        self.renderer
            .render(&scene, workdir.path(), &stem, request.output_format())?;
        let artifact = materialize(workdir, request.output_format())?;

        let publisher = Publisher::new(Arc::clone(&self.store), bucket, storage.region());
        let pair = publisher.publish(&artifact, request.source_text(), request.family())?;
        Ok((request, pair))
    }
}

/// Evaluates `source` as a `family` diagram and lowers it into a scene.
///
/// Returns the scene together with the file stem the artifact should be
/// written under: the script's `filename` if it set one, otherwise the
/// family name.
///
/// # Errors
///
/// Script and schema failures become [`DiagrammerError::Script`]; JSON
/// documents that do not parse or are too large are validation errors.
pub fn lower(
    family: Family,
    source: &str,
    sandbox: &SandboxConfig,
) -> Result<(Scene, String), DiagrammerError> {
    if family.is_scripted() {
        let capabilities = CapabilitySet::for_family(family);
        let diagram = evaluate(source, &capabilities, &sandbox.limits())
            .map_err(|err| DiagrammerError::new_script_error(err, source))?;
        let stem = diagram.filename().unwrap_or(family.as_str()).to_string();
        return Ok((Scene::from_diagram(&diagram), stem));
    }

    let scene = match family {
        Family::Erd => {
            let schema =
                parse_erd(source).map_err(|err| DiagrammerError::new_script_error(err, source))?;
            Scene::from_schema(&schema)
        }
        _ => {
            let document: serde_json::Value = serde_json::from_str(source).map_err(|err| {
                DiagrammerError::Validation(format!("user_code is not valid JSON: {err}"))
            })?;
            Scene::from_json(&document, sandbox.max_json_nodes())
                .map_err(|err| DiagrammerError::Validation(err.to_string()))?
        }
    };
    Ok((scene, family.as_str().to_string()))
}

fn success_message(route: Route, request: &DiagramRequest) -> String {
    match route {
        Route::Diagram => format!(
            "{} diagram created successfully.",
            request.family().as_str().to_uppercase()
        ),
        Route::Erd => "ERD diagram generated successfully!".to_string(),
        Route::JsonTree => "JSON diagram generated successfully!".to_string(),
    }
}

fn error_response(err: &DiagrammerError) -> Response {
    let kind = err.kind();
    if kind.is_client_error() {
        warn!(kind:? = kind, err = err.to_string(); "Request rejected");
    } else {
        error!(kind:? = kind, err = err.to_string(); "Request failed");
    }

    let mut body = serde_json::json!({ "error": err.client_message() });
    if let Some(line) = err.source_line().filter(|_| kind == ErrorKind::Syntax) {
        body["line"] = line.number().into();
        body["line_text"] = line.text().into();
    }
    Response::json(kind.status_code(), body)
}
