//! Test: cancellation stops scheduling and records unrun steps

use crate::helpers::*;
use assetline::core::{BuildMode, ExecutionStatus};
use assetline::execution::{CancellationFlag, SchedulingStrategy};
use std::sync::Arc;
use std::time::Duration;

const YAML: &str = r#"
name: "Cancel"
steps:
  - name: slow
  - name: lint
rules:
  - include: "*.js"
    steps: [slow, lint]
"#;

#[tokio::test]
async fn test_cancel_before_start() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), &[("src/a.js", "a"), ("src/b.js", "b")]);

    let log = CallLog::new();
    let catalog = catalog_with(vec![
        Arc::new(RecordingHandler::new("slow", &log)),
        Arc::new(RecordingHandler::new("lint", &log)),
    ]);
    let pipeline = load_pipeline(root.path(), YAML, BuildMode::Production, &catalog).unwrap();

    let cancel = CancellationFlag::new();
    cancel.cancel();
    let report = build_with(&pipeline, SchedulingStrategy::Parallel, &cancel)
        .await
        .unwrap();

    assert_eq!(report.status, ExecutionStatus::Cancelled);
    assert_eq!(report.cancelled_count(), 4);
    assert!(report.emitted.is_empty());
    assert_eq!(log.len(), 0);
}

#[tokio::test]
async fn test_cancel_mid_build_finishes_running_step() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), &[("src/a.js", "a"), ("src/b.js", "b"), ("src/c.js", "c")]);

    let log = CallLog::new();
    let catalog = catalog_with(vec![
        Arc::new(RecordingHandler::new("slow", &log).with_delay(Duration::from_millis(300))),
        Arc::new(RecordingHandler::new("lint", &log)),
    ]);
    let pipeline = load_pipeline(root.path(), YAML, BuildMode::Production, &catalog).unwrap();

    let cancel = CancellationFlag::new();
    let trigger = cancel.clone();
    let (report, _) = tokio::join!(
        build_with(&pipeline, SchedulingStrategy::Sequential, &cancel),
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        }
    );
    let report = report.unwrap();

    assert_eq!(report.status, ExecutionStatus::Cancelled);
    assert_eq!(
        outcomes(&report, "a.js"),
        vec![("slow".to_string(), "success"), ("lint".to_string(), "cancelled")]
    );
    for resource in ["b.js", "c.js"] {
        assert_eq!(
            outcomes(&report, resource),
            vec![("slow".to_string(), "cancelled"), ("lint".to_string(), "cancelled")]
        );
    }
    assert_eq!(log.calls(), vec![("a.js".to_string(), "slow".to_string())]);
    assert!(report.emitted.is_empty());
}
