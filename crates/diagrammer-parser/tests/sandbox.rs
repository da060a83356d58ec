use std::time::Duration;

use diagrammer_core::{
    capability::{CapabilitySet, build_capabilities},
    family::Family,
};
use diagrammer_parser::{DiagnosticError, ErrorCategory, ErrorCode, Limits, evaluate, parse_erd};
use proptest::prelude::*;

fn aws() -> CapabilitySet {
    build_capabilities("aws").expect("aws is a supported family")
}

fn reject(source: &str) -> DiagnosticError {
    evaluate(source, &aws(), &Limits::default()).expect_err("script must be rejected")
}

fn codes(err: &DiagnosticError) -> Vec<ErrorCode> {
    err.diagnostics().iter().filter_map(|d| d.code()).collect()
}

#[test]
fn test_imports_are_capability_violations() {
    let err = reject("import os\ngraph = Diagram('x')\n");
    assert_eq!(err.category(), ErrorCategory::Capability);
    assert_eq!(codes(&err), [ErrorCode::E202]);

    let err = reject("from os import system\n");
    assert_eq!(codes(&err), [ErrorCode::E202, ErrorCode::E202]);
}

#[test]
fn test_ambient_functions_are_not_reachable() {
    for source in [
        "graph = open('/etc/passwd')\n",
        "graph = eval('1')\n",
        "graph = getattr(Diagram, 'x')\n",
        "graph = globals()\n",
    ] {
        let err = reject(source);
        assert_eq!(err.category(), ErrorCategory::Capability, "{source}");
        assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E200), "{source}");
    }
}

#[test]
fn test_attribute_walks_are_rejected() {
    let err = reject("graph = Diagram('x').__class__\n");
    assert_eq!(err.category(), ErrorCategory::Capability);

    let err = reject("with Diagram('x') as graph:\n    EC2('a').label\n");
    assert_eq!(codes(&err), [ErrorCode::E201]);
}

#[test]
fn test_dunder_names_are_rejected() {
    let err = reject("__builtins__ = 1\ngraph = Diagram('x')\n");
    assert_eq!(err.category(), ErrorCategory::Capability);
}

#[test]
fn test_forbidden_symbols_never_execute_earlier_statements() {
    // The violation on line 3 is found before line 1 runs, so the failure
    // is a capability violation and not the runtime error on line 1.
    let err = reject("x = 1 / 0\ngraph = Diagram('x')\nopen('f')\n");
    assert_eq!(err.category(), ErrorCategory::Capability);
}

#[test]
fn test_syntax_errors_carry_their_line() {
    let source = "with Diagram('x') as graph:\n    EC2('a' >> \n";
    let err = reject(source);
    assert_eq!(err.category(), ErrorCategory::Syntax);
    let span = err.primary_span().expect("syntax errors are located");
    assert_eq!(span.line_in(source).number(), 2);
}

#[test]
fn test_runtime_failures_are_runtime_category() {
    let err = reject("graph = Diagram('x')\nEC2('a') >> 3\n");
    assert_eq!(err.category(), ErrorCategory::Runtime);
}

#[test]
fn test_vocabularies_do_not_leak_between_families() {
    let gcp = CapabilitySet::for_family(Family::Gcp);
    let err = evaluate(
        "with Diagram('x') as graph:\n    EC2('web')\n",
        &gcp,
        &Limits::default(),
    )
    .unwrap_err();
    assert_eq!(codes(&err), [ErrorCode::E200]);
}

#[test]
fn test_every_scripted_family_runs_a_minimal_script() {
    for family in ["aws", "gcp", "azure", "onprem"] {
        let caps = build_capabilities(family).unwrap();
        let diagram = evaluate(
            "with Diagram('minimal') as graph:\n    pass\n",
            &caps,
            &Limits::default(),
        )
        .unwrap_or_else(|e| panic!("{family}: {e}"));
        assert_eq!(diagram.name(), "minimal");
    }
}

#[test]
fn test_timeout_is_reported_as_runtime_error() {
    let limits = Limits {
        timeout: Duration::from_millis(20),
        max_steps: u64::MAX,
        ..Limits::default()
    };
    let source = "graph = Diagram('x')\nfor i in range(10000):\n    for j in range(10000):\n        k = i * j\n";
    let err = evaluate(source, &aws(), &limits).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Runtime);
    assert_eq!(err.message(), "timeout");
}

fn bounded() -> Limits {
    Limits {
        timeout: Duration::from_millis(500),
        ..Limits::default()
    }
}

#[test]
fn test_deep_parentheses_fail_cleanly() {
    let source = format!("graph = Diagram('x')\ny = {}1{}\n", "(".repeat(50_000), ")".repeat(50_000));
    let err = evaluate(&source, &aws(), &bounded()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Syntax);
    assert_eq!(codes(&err), [ErrorCode::E103]);
}

#[test]
fn test_deep_prefix_and_bracket_mix_fails_cleanly() {
    let source = format!("graph = Diagram('x')\ny = {}1{}\n", "not [-(".repeat(10_000), ")]".repeat(10_000));
    let err = evaluate(&source, &aws(), &bounded()).unwrap_err();
    assert_eq!(codes(&err), [ErrorCode::E103]);
}

#[test]
fn test_long_edge_chain_fails_cleanly() {
    let chain = " >> EC2('n')".repeat(5_000);
    let source = format!("with Diagram('x') as graph:\n    EC2('n'){chain}\n");
    let err = evaluate(&source, &aws(), &bounded()).unwrap_err();
    assert_eq!(codes(&err), [ErrorCode::E103]);
}

#[test]
fn test_oversized_source_is_refused_before_parsing() {
    let limits = Limits {
        max_source_len: 64,
        ..Limits::default()
    };
    let source = format!("graph = Diagram('x')\n{}", "y = 1\n".repeat(20));
    let err = evaluate(&source, &aws(), &limits).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Runtime);
    assert_eq!(codes(&err), [ErrorCode::E306]);
    assert!(err.primary_span().is_none());
}

#[test]
fn test_deep_list_nesting_fails_cleanly() {
    let limits = Limits {
        timeout: Duration::from_secs(30),
        ..Limits::default()
    };
    let source = "graph = Diagram('x')\nx = []\nfor i in range(10000):\n    for j in range(10):\n        x = [x]\n";
    let err = evaluate(source, &aws(), &limits).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Runtime);
    assert_eq!(codes(&err), [ErrorCode::E306]);
}

#[test]
fn test_repeating_an_empty_list_fails_cleanly() {
    let started = std::time::Instant::now();
    let err = evaluate(
        "graph = Diagram('x')\nx = [] * 1000000000000\n",
        &aws(),
        &bounded(),
    )
    .unwrap_err();
    assert_eq!(codes(&err), [ErrorCode::E306]);
    assert!(started.elapsed() < Duration::from_secs(5));
}

proptest! {
    #[test]
    fn test_evaluate_never_panics(source in "\\PC{0,120}") {
        let limits = Limits {
            timeout: Duration::from_millis(50),
            ..Limits::default()
        };
        let _ = evaluate(&source, &aws(), &limits);
    }

    #[test]
    fn test_parse_erd_never_panics(source in "[\\[\\]\\*\\+\\-a-z0-9 {}:\"\\n?]{0,120}") {
        let _ = parse_erd(&source);
    }
}
