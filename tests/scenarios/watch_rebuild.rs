//! Test: watch mode - changed sources trigger a rebuild with fresh content

use crate::helpers::*;
use assetline::core::BuildMode;
use assetline::execution::{CancellationFlag, ChangeKind, SchedulingStrategy, WatchSubscription};
use std::sync::Arc;
use std::time::Duration;

const YAML: &str = r#"
name: "Watch"
watch:
  poll_interval_ms: 20
steps:
  - name: minify
rules:
  - include: "*.js"
    steps: [minify]
"#;

#[tokio::test]
async fn test_change_triggers_rebuild() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), &[("src/app.js", "// v1\nfirst();\n")]);
    let pipeline = load_pipeline(root.path(), YAML, BuildMode::Production, &catalog_with(vec![])).unwrap();
    assert_eq!(pipeline.poll_interval, Duration::from_millis(20));

    build(&pipeline, SchedulingStrategy::Parallel).await.unwrap();
    assert_eq!(read_output(&pipeline, "app.js"), "first();");

    let cancel = CancellationFlag::new();
    let mut watch = WatchSubscription::start(
        pipeline.source_dir.clone(),
        vec![pipeline.output_dir.clone()],
        pipeline.poll_interval,
        cancel.clone(),
    )
    .await
    .unwrap();

    write_files(
        root.path(),
        &[("src/app.js", "// v2\nsecond();\nthird();\n"), ("src/extra.js", "extra();\n")],
    );

    let changes = tokio::time::timeout(Duration::from_secs(5), watch.next())
        .await
        .expect("no change reported")
        .expect("watch ended early");
    let kinds: Vec<(&str, ChangeKind)> = changes.iter().map(|c| (c.path.as_str(), c.kind)).collect();
    assert_eq!(
        kinds,
        vec![("app.js", ChangeKind::Modified), ("extra.js", ChangeKind::Added)]
    );

    let report = build(&pipeline, SchedulingStrategy::Parallel).await.unwrap();
    assert_eq!(emitted_paths(&report), vec!["app.js", "extra.js"]);
    assert_eq!(read_output(&pipeline, "app.js"), "second();\nthird();");

    cancel.cancel();
    let ended = tokio::time::timeout(Duration::from_secs(5), watch.next()).await.unwrap();
    assert!(ended.is_none());
}

/// Writes to the output directory inside the source tree are not changes
#[tokio::test]
async fn test_output_directory_is_ignored() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), &[("app.js", "start();\n")]);

    let yaml = YAML.replace("name: \"Watch\"", "name: \"Watch\"\nsource_dir: .");
    let pipeline = load_pipeline(root.path(), &yaml, BuildMode::Production, &catalog_with(vec![])).unwrap();

    let cancel = CancellationFlag::new();
    let mut watch = WatchSubscription::start(
        pipeline.source_dir.clone(),
        vec![pipeline.output_dir.clone()],
        pipeline.poll_interval,
        cancel.clone(),
    )
    .await
    .unwrap();

    build(&pipeline, SchedulingStrategy::Parallel).await.unwrap();
    assert!(pipeline.output_dir.join("app.js").exists());

    let quiet = tokio::time::timeout(Duration::from_millis(200), watch.next()).await;
    assert!(quiet.is_err(), "output writes were reported as changes: {:?}", quiet);
}

/// An edit saved while a rebuild is running triggers one more rebuild
#[tokio::test]
async fn test_edit_during_rebuild_is_not_lost() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), &[("src/app.js", "v1")]);

    let yaml = r#"
name: "Watch"
watch:
  poll_interval_ms: 20
steps:
  - name: slow
rules:
  - include: "*.js"
    steps: [slow]
"#;
    let log = CallLog::new();
    let catalog = catalog_with(vec![Arc::new(
        RecordingHandler::new("slow", &log).with_delay(Duration::from_millis(300)),
    )]);
    let pipeline = load_pipeline(root.path(), yaml, BuildMode::Production, &catalog).unwrap();

    let cancel = CancellationFlag::new();
    let mut watch = WatchSubscription::start(
        pipeline.source_dir.clone(),
        vec![pipeline.output_dir.clone()],
        pipeline.poll_interval,
        cancel.clone(),
    )
    .await
    .unwrap();

    write_files(root.path(), &[("src/app.js", "v2 edit")]);
    tokio::time::timeout(Duration::from_secs(5), watch.next())
        .await
        .unwrap()
        .unwrap();

    let edit_midway = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        write_files(root.path(), &[("src/app.js", "v3 saved while building")]);
    };
    let (report, ()) = tokio::join!(build(&pipeline, SchedulingStrategy::Sequential), edit_midway);
    assert_succeeded(&report.unwrap(), "app.js", &["slow"]);
    assert_eq!(read_output(&pipeline, "app.js"), "v2 edit|slow");

    let changes = tokio::time::timeout(Duration::from_secs(5), watch.next())
        .await
        .expect("edit during the build was lost")
        .unwrap();
    assert_eq!(changes[0].path, "app.js");
    assert_eq!(changes[0].kind, ChangeKind::Modified);

    build(&pipeline, SchedulingStrategy::Sequential).await.unwrap();
    assert_eq!(read_output(&pipeline, "app.js"), "v3 saved while building|slow");
    cancel.cancel();
}
