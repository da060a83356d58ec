use std::{fs, io, path::Path};

use tempfile::{TempDir, tempdir};

use diagrammer::DiagrammerError;
use diagrammer_cli::{Args, Command, Outcome, run_with};

fn write_config(dir: &Path, bucket: Option<&str>) -> String {
    let storage = bucket
        .map(|b| format!("[storage]\nbucket = \"{b}\"\nregion = \"eu-west-1\"\n"))
        .unwrap_or_default();
    let config = format!("{storage}\n[render]\nrenderer = \"native\"\ndefault_format = \"svg\"\n");
    let path = dir.join("config.toml");
    fs::write(&path, config).unwrap();
    path.to_string_lossy().to_string()
}

fn handle_args(dir: &TempDir, config: String, body: Option<String>, route: &str, event: bool) -> Args {
    Args {
        command: Command::Handle {
            route: route.to_string(),
            body,
            event,
            store_root: Some(dir.path().join("store").to_string_lossy().to_string()),
        },
        config: Some(config),
        log_level: Some("off".to_string()),
    }
}

fn no_env(_: &str) -> Option<String> {
    None
}

fn response_body(outcome: &Outcome) -> serde_json::Value {
    match outcome {
        Outcome::Handled(response) => serde_json::from_str(response.body()).unwrap(),
        Outcome::Checked(_) => panic!("expected a handled request"),
    }
}

#[test]
fn test_handle_publishes_into_local_store() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), Some("media"));
    let body = dir.path().join("request.json");
    fs::write(
        &body,
        r#"{"type": "aws", "source": "with Diagram('web') as graph:\n    ELB('lb') >> EC2('app')\n"}"#,
    )
    .unwrap();

    let args = handle_args(&dir, config, Some(body.to_string_lossy().to_string()), "diagram", false);
    let outcome = run_with(&args, no_env, &mut io::empty()).unwrap();
    assert!(outcome.is_success());

    let body = response_body(&outcome);
    let id = body["diagram_id"].as_str().unwrap();
    let store = dir.path().join("store").join("media");
    assert!(store.join("diagrams").join(format!("{id}.svg")).is_file());
    let source = fs::read_to_string(store.join("source_codes").join(format!("{id}.diag"))).unwrap();
    assert!(source.contains("ELB('lb')"));
}

#[test]
fn test_handle_reads_transport_event_from_stdin() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), Some("media"));
    let event = serde_json::json!({ "body": r#"{"user_code": "[A]\n*id\n"}"# }).to_string();

    let args = handle_args(&dir, config, None, "erd", true);
    let outcome = run_with(&args, no_env, &mut event.as_bytes()).unwrap();

    assert!(outcome.is_success());
    assert_eq!(response_body(&outcome)["message"], "ERD diagram generated successfully!");
}

#[test]
fn test_client_errors_are_responses_not_cli_errors() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), Some("media"));
    let body = r#"{"type": "aws", "source": "import os\n"}"#;

    let args = handle_args(&dir, config, Some("-".to_string()), "diagram", false);
    let outcome = run_with(&args, no_env, &mut body.as_bytes()).unwrap();

    assert!(!outcome.is_success());
    let json = outcome.to_json().unwrap();
    assert!(json.contains("\"statusCode\": 400"));
    assert!(!dir.path().join("store").exists());
}

#[test]
fn test_bucket_can_come_from_environment() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), None);
    let body = r#"{"type": "gcp", "source": "graph = Diagram('x')"}"#;

    let args = handle_args(&dir, config.clone(), None, "diagram", false);
    let outcome = run_with(&args, no_env, &mut body.as_bytes()).unwrap();
    assert!(!outcome.is_success());

    let env = |name: &str| (name == "DIAGRAM_BUCKET").then(|| "env-bucket".to_string());
    let args = handle_args(&dir, config, None, "diagram", false);
    let outcome = run_with(&args, env, &mut body.as_bytes()).unwrap();
    assert!(outcome.is_success());
    assert!(dir.path().join("store").join("env-bucket").is_dir());
}

#[test]
fn test_unknown_route_is_rejected() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), Some("media"));
    let args = handle_args(&dir, config, None, "sequence", false);
    let err = run_with(&args, no_env, &mut io::empty()).unwrap_err();
    assert!(matches!(err, DiagrammerError::Validation(_)));
}

fn check_args(config: String, family: &str, input: &Path) -> Args {
    Args {
        command: Command::Check {
            family: family.to_string(),
            input: input.to_string_lossy().to_string(),
        },
        config: Some(config),
        log_level: None,
    }
}

#[test]
fn test_check_summarizes_a_script() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), None);
    let input = dir.path().join("infra.diag");
    fs::write(
        &input,
        "with Diagram('Infra', filename='infra') as graph:\n    with Cluster('db'):\n        primary = PostgreSQL('primary')\n    Nginx('lb') >> Server('app') >> primary\n",
    )
    .unwrap();

    let outcome = run_with(&check_args(config, "onprem", &input), no_env, &mut io::empty()).unwrap();
    match outcome {
        Outcome::Checked(summary) => {
            assert_eq!(summary.family, "onprem");
            assert_eq!(summary.title, "Infra");
            assert_eq!(summary.file_stem, "infra");
            assert_eq!(summary.groups, 1);
            assert_eq!(summary.nodes, 3);
            assert_eq!(summary.edges, 2);
        }
        Outcome::Handled(_) => panic!("expected a check summary"),
    }
}

#[test]
fn test_check_returns_script_diagnostics() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), None);
    let input = dir.path().join("bad.er");
    fs::write(&input, "[A]\n[B]\nA *--x B\n").unwrap();

    let err = run_with(&check_args(config, "erd", &input), no_env, &mut io::empty()).unwrap_err();
    let DiagrammerError::Script { err, src } = &err else {
        panic!("expected a script error, got {err:?}");
    };
    assert_eq!(src, "[A]\n[B]\nA *--x B\n");
    assert_eq!(err.message(), "malformed relation");
}
