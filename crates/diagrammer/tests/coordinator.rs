use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use diagrammer::{
    Coordinator, Response,
    config::{AppConfig, RenderConfig, RendererKind, SandboxConfig, StorageConfig},
    request::{OutputFormat, Route},
    store::{MemoryStore, ObjectStore, StoreError},
};
use serde_json::Value;

const BUCKET: &str = "diagrams-bucket";

fn config(renderer: RendererKind, format: OutputFormat, scratch: Option<PathBuf>) -> AppConfig {
    AppConfig::new(
        StorageConfig::new(Some(BUCKET.to_string()), "eu-west-1", None),
        RenderConfig::new(renderer, format, "dot"),
        SandboxConfig::default(),
        scratch,
    )
}

fn native() -> (Coordinator, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let coordinator = Coordinator::new(
        config(RendererKind::Native, OutputFormat::Svg, None),
        store.clone(),
    )
    .expect("native renderer is always available");
    (coordinator, store)
}

fn body(response: &Response) -> Value {
    serde_json::from_str(response.body()).expect("response bodies are JSON")
}

fn request(family: &str, source: &str) -> String {
    serde_json::json!({ "type": family, "source": source }).to_string()
}

#[test]
fn test_scripted_diagram_is_rendered_and_published() {
    let (coordinator, store) = native();
    let source = "with Diagram('Web Service', direction='TB') as graph:\n    with Cluster('app'):\n        web = EC2('web')\n    web >> RDS('db')\n";
    let response = coordinator.handle(Route::Diagram, Some(&request("aws", source)));

    assert_eq!(response.status_code(), 201, "{}", response.body());
    let body = body(&response);
    assert_eq!(body["message"], "AWS diagram created successfully.");

    let id = body["diagram_id"].as_str().unwrap();
    assert!(id.starts_with("aws_"));
    assert_eq!(
        body["diagram_url"],
        format!("https://{BUCKET}.s3.eu-west-1.amazonaws.com/diagrams/{id}.svg")
    );
    assert_eq!(
        body["source_url"],
        format!("https://{BUCKET}.s3.eu-west-1.amazonaws.com/source_codes/{id}.diag")
    );

    let diagram = store.get(BUCKET, &format!("diagrams/{id}.svg")).unwrap();
    assert_eq!(diagram.content_type, "image/svg+xml");
    let svg = String::from_utf8(diagram.bytes).unwrap();
    assert!(svg.contains("Web Service"));
    assert!(svg.contains("web"));

    let stored_source = store.get(BUCKET, &format!("source_codes/{id}.diag")).unwrap();
    assert_eq!(stored_source.bytes, source.as_bytes());
}

#[test]
fn test_minimal_script_produces_a_single_cluster() {
    let (coordinator, store) = native();
    let response = coordinator.handle(Route::Diagram, Some(&request("onprem", "graph = Diagram('t'); ")));
    assert_eq!(response.status_code(), 201, "{}", response.body());
    assert_eq!(store.len(), 2);
}

#[test]
fn test_disallowed_symbols_are_rejected_without_upload() {
    let (coordinator, store) = native();
    for source in [
        "import os\ngraph = Diagram('x')\n",
        "graph = Diagram('x')\nopen('/etc/passwd')\n",
        "graph = Diagram(__import__('os').name)\n",
        "with Diagram('x') as graph:\n    EC2('a').__class__\n",
    ] {
        let response = coordinator.handle(Route::Diagram, Some(&request("aws", source)));
        assert_eq!(response.status_code(), 400, "{source}");
        let error = body(&response)["error"].as_str().unwrap().to_string();
        assert!(error.starts_with("script rejected"), "{source}: {error}");
    }
    assert!(store.is_empty());
}

#[test]
fn test_script_without_graph_binding_fails_without_upload() {
    let (coordinator, store) = native();
    let response = coordinator.handle(
        Route::Diagram,
        Some(&request("azure", "d = Diagram('x')\n")),
    );
    assert_eq!(response.status_code(), 400);
    assert_eq!(
        body(&response)["error"],
        "script failed: script completed without producing a result"
    );
    assert!(store.is_empty());
}

#[test]
fn test_runtime_errors_cite_their_line() {
    let (coordinator, store) = native();
    let response = coordinator.handle(
        Route::Diagram,
        Some(&request("gcp", "graph = Diagram('x')\nx = 1 / 0\n")),
    );
    assert_eq!(response.status_code(), 400);
    let error = body(&response)["error"].as_str().unwrap().to_string();
    assert!(error.starts_with("script failed on line 2"), "{error}");
    assert!(store.is_empty());
}

#[test]
fn test_timeouts_are_client_errors() {
    let store = Arc::new(MemoryStore::new());
    let config = AppConfig::new(
        StorageConfig::new(Some(BUCKET.to_string()), "eu-west-1", None),
        RenderConfig::new(RendererKind::Native, OutputFormat::Svg, "dot"),
        SandboxConfig::default().with_timeout(Duration::ZERO),
        None,
    );
    let coordinator = Coordinator::new(config, store.clone()).unwrap();

    let source = "graph = Diagram('x')\nfor i in range(100000):\n    k = i * 2\n";
    let response = coordinator.handle(Route::Diagram, Some(&request("aws", source)));
    assert_eq!(response.status_code(), 400);
    assert_eq!(body(&response)["error"], "script failed: timeout");
    assert!(store.is_empty());
}

#[test]
fn test_malformed_erd_relation_cites_line_three() {
    let (coordinator, store) = native();
    let source = "[Person]\n*id\nPerson *--x Location\n[Location]\n";
    let payload = serde_json::json!({ "user_code": source }).to_string();
    let response = coordinator.handle(Route::Erd, Some(&payload));

    assert_eq!(response.status_code(), 400);
    let body = body(&response);
    assert_eq!(body["line"], 3);
    assert_eq!(body["line_text"], "Person *--x Location");
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("line 3"), "{error}");
    assert!(error.contains("'Person *--x Location'"), "{error}");
    assert!(store.is_empty());
}

#[test]
fn test_erd_route_publishes_schema() {
    let (coordinator, store) = native();
    let source = "title {label: \"Shop\"}\n[Person]\n*id\nname\n[Order]\n*id\n+person_id\nPerson 1--* Order\n";
    let payload = serde_json::json!({ "user_code": source }).to_string();
    let response = coordinator.handle(Route::Erd, Some(&payload));

    assert_eq!(response.status_code(), 200, "{}", response.body());
    let body = body(&response);
    assert_eq!(body["message"], "ERD diagram generated successfully!");
    let id = body["diagram_id"].as_str().unwrap();
    assert!(id.starts_with("erd_"));
    assert!(store.get(BUCKET, &format!("source_codes/{id}.er")).is_some());
}

#[test]
fn test_json_route_rejects_invalid_documents() {
    let (coordinator, store) = native();
    let payload = serde_json::json!({ "user_code": "{\"a\": [1, 2" }).to_string();
    let response = coordinator.handle(Route::JsonTree, Some(&payload));
    assert_eq!(response.status_code(), 400);
    assert!(body(&response)["error"].as_str().unwrap().contains("not valid JSON"));
    assert!(store.is_empty());
}

#[test]
fn test_json_route_publishes_tree() {
    let (coordinator, store) = native();
    let payload = serde_json::json!({ "user_code": "{\"shop\": {\"items\": [1, 2]}}" }).to_string();
    let response = coordinator.handle(Route::JsonTree, Some(&payload));

    assert_eq!(response.status_code(), 200, "{}", response.body());
    let id = body(&response)["diagram_id"].as_str().unwrap().to_string();
    assert!(id.starts_with("json_"));
    let source = store.get(BUCKET, &format!("source_codes/{id}.json")).unwrap();
    assert_eq!(source.content_type, "text/plain; charset=utf-8");
}

#[test]
fn test_request_validation_happens_before_any_work() {
    let (coordinator, store) = native();
    let cases: [(Option<&str>, &str); 5] = [
        (None, "request body is missing"),
        (Some("not json"), "request body is not valid JSON"),
        (Some(r#"{"source": "graph = Diagram('x')"}"#), "missing fields 'type' and 'source' in body"),
        (Some(r#"{"type": "aws", "source": "   "}"#), "source must not be empty"),
        (Some(r#"{"type": "visio", "source": "x"}"#), "unsupported diagram type `visio`"),
    ];
    for (payload, expected) in cases {
        let response = coordinator.handle(Route::Diagram, payload);
        assert_eq!(response.status_code(), 400, "{payload:?}");
        let error = body(&response)["error"].as_str().unwrap().to_string();
        assert!(error.starts_with(expected), "{payload:?}: {error}");
    }
    assert!(store.is_empty());
}

#[test]
fn test_unsupported_format_for_renderer_is_server_error() {
    let (coordinator, store) = native();
    let payload = serde_json::json!({
        "type": "aws",
        "source": "graph = Diagram('x')",
        "output_format": "pdf",
    })
    .to_string();
    let response = coordinator.handle(Route::Diagram, Some(&payload));
    assert_eq!(response.status_code(), 500);
    assert_eq!(body(&response)["error"], "failed to render the diagram");
    assert!(store.is_empty());
}

#[test]
fn test_identical_requests_get_distinct_keys() {
    let (coordinator, store) = native();
    let payload = request("aws", "graph = Diagram('x')");
    let first = body(&coordinator.handle(Route::Diagram, Some(&payload)));
    let second = body(&coordinator.handle(Route::Diagram, Some(&payload)));

    assert_ne!(first["diagram_id"], second["diagram_id"]);
    assert_ne!(first["diagram_url"], second["diagram_url"]);
    assert_eq!(store.len(), 4);
}

/// Accepts diagrams but fails every source upload.
struct SourceRejectingStore {
    inner: MemoryStore,
}

impl ObjectStore for SourceRejectingStore {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError> {
        if key.starts_with("source_codes/") {
            return Err(StoreError::Unavailable("bucket is read-only".to_string()));
        }
        self.inner.put_object(bucket, key, bytes, content_type)
    }
}

#[test]
fn test_source_upload_failure_is_server_error_without_pair() {
    let store = Arc::new(SourceRejectingStore {
        inner: MemoryStore::new(),
    });
    let coordinator = Coordinator::new(
        config(RendererKind::Native, OutputFormat::Svg, None),
        store.clone(),
    )
    .unwrap();

    let response = coordinator.handle(Route::Diagram, Some(&request("aws", "graph = Diagram('x')")));
    assert_eq!(response.status_code(), 500);
    let body = body(&response);
    assert_eq!(body["error"], "failed to store the diagram");
    assert!(body.get("diagram_url").is_none());
    assert!(body.get("source_url").is_none());
    // The diagram went up before the source failed.
    assert_eq!(store.inner.len(), 1);
}

fn entries(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[test]
fn test_working_directories_are_removed_on_every_path() {
    let scratch = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let coordinator = Coordinator::new(
        config(
            RendererKind::Native,
            OutputFormat::Svg,
            Some(scratch.path().to_path_buf()),
        ),
        store,
    )
    .unwrap();

    let ok = coordinator.handle(Route::Diagram, Some(&request("aws", "graph = Diagram('x')")));
    assert_eq!(ok.status_code(), 201);
    let failed = coordinator.handle(
        Route::Diagram,
        Some(
            &serde_json::json!({"type": "aws", "source": "graph = Diagram('x')", "output_format": "png"})
                .to_string(),
        ),
    );
    assert_eq!(failed.status_code(), 500);

    assert_eq!(entries(scratch.path()), 0);
}

#[test]
fn test_coordinator_serves_concurrent_requests() {
    let (coordinator, store) = native();
    let coordinator = Arc::new(coordinator);

    std::thread::scope(|scope| {
        for family in ["aws", "gcp", "azure", "onprem"] {
            let coordinator = Arc::clone(&coordinator);
            scope.spawn(move || {
                let source = "with Diagram('x') as graph:\n    pass\n";
                let response = coordinator.handle(Route::Diagram, Some(&request(family, source)));
                assert_eq!(response.status_code(), 201, "{family}: {}", response.body());
            });
        }
    });

    assert_eq!(store.len(), 8);
}

#[test]
fn test_missing_bucket_is_configuration_error() {
    let store = Arc::new(MemoryStore::new());
    let config = AppConfig::new(
        StorageConfig::default(),
        RenderConfig::new(RendererKind::Native, OutputFormat::Svg, "dot"),
        SandboxConfig::default(),
        None,
    );
    let coordinator = Coordinator::new(config, store.clone()).unwrap();
    let response = coordinator.handle(Route::Diagram, Some(&request("aws", "graph = Diagram('x')")));
    assert_eq!(response.status_code(), 500);
    assert_eq!(body(&response)["error"], "server configuration is incomplete");
    assert!(store.is_empty());
}

#[cfg(feature = "graphviz")]
#[test]
fn test_graphviz_dot_output_uses_the_script_filename() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = Coordinator::new(
        config(RendererKind::Graphviz, OutputFormat::Dot, None),
        store.clone(),
    )
    .unwrap();

    let source = "with Diagram('x', filename='my_arch') as graph:\n    Nginx('lb') >> Server('app')\n";
    let response = coordinator.handle(Route::Diagram, Some(&request("onprem", source)));
    assert_eq!(response.status_code(), 201, "{}", response.body());

    let id = body(&response)["diagram_id"].as_str().unwrap().to_string();
    let dot = store.get(BUCKET, &format!("diagrams/{id}.dot")).unwrap();
    assert_eq!(dot.content_type, "text/vnd.graphviz");
    let text = String::from_utf8(dot.bytes).unwrap();
    assert!(text.contains("digraph"));
    assert!(text.contains("n0 -> n1"));
}
