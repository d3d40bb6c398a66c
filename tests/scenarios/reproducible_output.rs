//! Test: identical inputs give identical outputs, whatever the scheduling

use crate::helpers::*;
use assetline::core::{BuildMode, ExecutionStatus};
use assetline::execution::SchedulingStrategy;

const FILES: &[(&str, &str)] = &[
    ("src/app.js", "/* app */\nimport './util.js';\nstart();\n"),
    ("src/util.js", "// helpers\nexport const start = () => {};\n"),
    ("src/styles/main.scss", "// theme\n.button {\n  user-select: none;\n}\n"),
    ("src/images/logo.png", "PNG"),
];

const YAML: &str = r#"
name: "Site"
output:
  filename: "[dir]/[name].[contenthash:8].[ext]"
  asset_dir: static
  manifest: manifest.json
steps:
  - name: css-extract
  - name: autoprefix
  - name: minify
  - name: gzip
    handler: compress
    options:
      threshold: 1
  - name: copy
rules:
  - include: "*.scss"
    steps: [css-extract, autoprefix, minify]
  - include: "*.js"
    steps: [minify, gzip]
  - include: "images/**"
    steps: [copy]
"#;

#[tokio::test]
async fn test_builds_are_reproducible_across_strategies() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), FILES);
    let pipeline = load_pipeline(root.path(), YAML, BuildMode::Production, &catalog_with(vec![])).unwrap();

    let sequential = build(&pipeline, SchedulingStrategy::Sequential).await.unwrap();
    let parallel = build(&pipeline, SchedulingStrategy::Parallel).await.unwrap();
    let limited = build(&pipeline, SchedulingStrategy::LimitedParallel(2)).await.unwrap();

    assert_eq!(sequential.status, ExecutionStatus::Completed);
    assert_eq!(sequential.emitted, parallel.emitted);
    assert_eq!(sequential.emitted, limited.emitted);

    let steps = |report: &assetline::core::BuildReport| {
        report
            .results
            .iter()
            .map(|r| (r.resource.clone(), r.step.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(steps(&sequential), steps(&parallel));
    assert_ne!(sequential.build_id, parallel.build_id);
}

#[tokio::test]
async fn test_output_layout() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), FILES);
    let pipeline = load_pipeline(root.path(), YAML, BuildMode::Production, &catalog_with(vec![])).unwrap();

    let report = build(&pipeline, SchedulingStrategy::Parallel).await.unwrap();
    let paths = emitted_paths(&report);

    // Content-hashed names, compressed siblings next to their originals
    let app = paths
        .iter()
        .find(|p| p.starts_with("app.") && p.ends_with(".js"))
        .unwrap();
    assert_eq!(app.len(), "app.12345678.js".len());
    assert!(paths.contains(&format!("{}.gz", app)));

    let css = paths
        .iter()
        .find(|p| p.starts_with("styles/main.") && p.ends_with(".css"))
        .unwrap();
    let css_text = read_output(&pipeline, css);
    assert!(css_text.contains("-webkit-user-select:none"), "{}", css_text);
    assert!(!css_text.contains("theme"));

    // Non-code artifacts land under asset_dir
    assert!(paths.iter().any(|p| p.starts_with("static/images/logo.") && p.ends_with(".png")));

    // No source maps in production by default
    assert!(!paths.iter().any(|p| p.ends_with(".map")));

    let manifest: serde_json::Value = serde_json::from_str(&read_output(&pipeline, "manifest.json")).unwrap();
    let app_entry = manifest["app.js"].as_array().unwrap();
    assert_eq!(app_entry.len(), 2);
    assert_eq!(app_entry[0].as_str(), Some(app.as_str()));
}

#[tokio::test]
async fn test_development_writes_source_maps() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), &[("src/app.js", "// dev\nstart();\n")]);

    let yaml = r#"
name: "Dev"
steps:
  - name: minify
  - name: copy
rules:
  - include: "*.js"
    steps: [minify, copy]
"#;
    let pipeline = load_pipeline(root.path(), yaml, BuildMode::Development, &catalog_with(vec![])).unwrap();
    let report = build(&pipeline, SchedulingStrategy::Parallel).await.unwrap();

    // minify is skipped in development
    assert_succeeded(&report, "app.js", &["copy"]);
    assert_eq!(emitted_paths(&report), vec!["app.js", "app.js.map"]);
    assert_eq!(read_output(&pipeline, "app.js"), "// dev\nstart();\n");

    let map: serde_json::Value = serde_json::from_str(&read_output(&pipeline, "app.js.map")).unwrap();
    assert_eq!(map["version"], 3);
    assert_eq!(map["sources"][0], "app.js");
}
