//! Test: failure isolation - one resource failing leaves the others alone

use crate::helpers::*;
use assetline::core::{BuildMode, ExecutionStatus, StepOutcome};
use assetline::execution::SchedulingStrategy;
use std::sync::Arc;

const YAML: &str = r#"
name: "Isolation"
steps:
  - name: lint
  - name: transpile
  - name: bundle
rules:
  - include: "*.js"
    steps: [lint, transpile, bundle]
"#;

#[tokio::test]
async fn test_failed_resource_does_not_stop_others() {
    let root = tempfile::tempdir().unwrap();
    write_files(
        root.path(),
        &[("src/bad.js", "bad"), ("src/good.js", "good"), ("src/other.js", "other")],
    );

    let log = CallLog::new();
    let catalog = catalog_with(vec![
        Arc::new(RecordingHandler::new("lint", &log)),
        Arc::new(FailingHandler::new("transpile", &log).only_for("bad.js")),
        Arc::new(RecordingHandler::new("bundle", &log)),
    ]);
    let pipeline = load_pipeline(root.path(), YAML, BuildMode::Production, &catalog).unwrap();

    let report = build(&pipeline, SchedulingStrategy::Parallel).await.unwrap();

    assert_eq!(report.status, ExecutionStatus::CompletedWithFailures);
    assert!(report.status.is_success());
    assert_eq!(report.failure_count(), 1);

    assert_eq!(
        outcomes(&report, "bad.js"),
        vec![("lint".to_string(), "success"), ("transpile".to_string(), "failure")]
    );
    assert_eq!(log.steps_for("bad.js"), vec!["lint", "transpile"]);
    assert_succeeded(&report, "good.js", &["lint", "transpile", "bundle"]);
    assert_succeeded(&report, "other.js", &["lint", "transpile", "bundle"]);

    assert_eq!(emitted_paths(&report), vec!["good.js", "other.js"]);
    assert!(!pipeline.output_dir.join("bad.js").exists());
}

#[tokio::test]
async fn test_failure_carries_handler_message() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), &[("src/bad.js", "bad")]);

    let log = CallLog::new();
    let catalog = catalog_with(vec![
        Arc::new(RecordingHandler::new("lint", &log)),
        Arc::new(FailingHandler::new("transpile", &log)),
        Arc::new(RecordingHandler::new("bundle", &log)),
    ]);
    let pipeline = load_pipeline(root.path(), YAML, BuildMode::Production, &catalog).unwrap();

    let report = build(&pipeline, SchedulingStrategy::Sequential).await.unwrap();

    let failure = report.failures().next().unwrap();
    assert_eq!(failure.resource, "bad.js");
    assert_eq!(failure.step, "transpile");
    match &failure.outcome {
        StepOutcome::Failure { error } => assert_eq!(error.to_string(), "transpile rejected bad.js"),
        other => panic!("expected failure, got {:?}", other),
    }
}

/// Built-in handlers reject input they cannot process without failing the build
#[tokio::test]
async fn test_unsupported_input_is_isolated() {
    let root = tempfile::tempdir().unwrap();
    write_files(
        root.path(),
        &[("src/styles.scss", "a {\n  // nested\n  b: c;\n}\n"), ("src/logo.svg", "<svg/>")],
    );

    let yaml = r#"
name: "Styles"
steps:
  - name: css-extract
rules:
  - test: "\\.(scss|svg)$"
    steps: [css-extract]
"#;
    let pipeline = load_pipeline(root.path(), yaml, BuildMode::Production, &catalog_with(vec![])).unwrap();
    let report = build(&pipeline, SchedulingStrategy::Parallel).await.unwrap();

    assert_eq!(report.status, ExecutionStatus::CompletedWithFailures);
    assert_eq!(
        outcomes(&report, "logo.svg"),
        vec![("css-extract".to_string(), "failure")]
    );
    assert_succeeded(&report, "styles.scss", &["css-extract"]);
    assert_eq!(emitted_paths(&report), vec!["styles.css"]);
    assert!(!read_output(&pipeline, "styles.css").contains("nested"));
}

/// Two resources rendering to the same output name: the second one fails to emit
#[tokio::test]
async fn test_output_collision_is_reported() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), &[("src/a.css", "from_css{}"), ("src/a.scss", "from_scss{}")]);

    let yaml = r#"
name: "Collision"
steps:
  - name: css-extract
rules:
  - test: "\\.(s?css)$"
    steps: [css-extract]
"#;
    let pipeline = load_pipeline(root.path(), yaml, BuildMode::Production, &catalog_with(vec![])).unwrap();

    let report = build(&pipeline, SchedulingStrategy::Sequential).await.unwrap();
    assert_eq!(report.status, ExecutionStatus::CompletedWithFailures);
    assert_eq!(emitted_paths(&report), vec!["a.css"]);
    assert_eq!(read_output(&pipeline, "a.css"), "from_css{}");
    assert_succeeded(&report, "a.css", &["css-extract"]);
    assert_eq!(
        outcomes(&report, "a.scss"),
        vec![("css-extract".to_string(), "success"), ("emit".to_string(), "failure")]
    );

    // Whichever claims first, the loser is always reported
    let report = build(&pipeline, SchedulingStrategy::Parallel).await.unwrap();
    assert_eq!(report.status, ExecutionStatus::CompletedWithFailures);
    assert_eq!(report.failure_count(), 1);
    assert_eq!(emitted_paths(&report), vec!["a.css"]);
}
