//! Test: chain ordering - rule order, collapsing, prerequisites, modes

use crate::helpers::*;
use assetline::core::BuildMode;
use assetline::execution::SchedulingStrategy;
use std::sync::Arc;

fn recording_catalog(log: &CallLog, names: &[&str]) -> assetline::handlers::HandlerCatalog {
    catalog_with(
        names
            .iter()
            .map(|name| Arc::new(RecordingHandler::new(name, log)) as Arc<dyn assetline::handlers::StepHandler>)
            .collect(),
    )
}

/// Steps from every matching rule run in declaration order, each once
#[tokio::test]
async fn test_rules_apply_in_declaration_order() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), &[("src/app.js", "app"), ("src/lib/util.js", "util")]);

    let yaml = r#"
name: "Ordering"
steps:
  - name: lint
  - name: transpile
  - name: bundle
rules:
  - include: "*.js"
    steps: [lint, transpile]
  - include: "lib/**"
    steps: [bundle, lint]
"#;
    let log = CallLog::new();
    let catalog = recording_catalog(&log, &["lint", "transpile", "bundle"]);
    let pipeline = load_pipeline(root.path(), yaml, BuildMode::Production, &catalog).unwrap();

    let report = build(&pipeline, SchedulingStrategy::Sequential).await.unwrap();

    assert_succeeded(&report, "app.js", &["lint", "transpile"]);
    assert_succeeded(&report, "lib/util.js", &["lint", "transpile", "bundle"]);
    assert_eq!(log.steps_for("lib/util.js"), vec!["lint", "transpile", "bundle"]);

    assert_eq!(read_output(&pipeline, "app.js"), "app|lint|transpile");
    assert_eq!(read_output(&pipeline, "lib/util.js"), "util|lint|transpile|bundle");
}

/// A `once` rule hides every later rule from the resources it matched
#[tokio::test]
async fn test_once_rule_stops_evaluation() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), &[("src/vendor/jquery.js", "$"), ("src/app.js", "app")]);

    let yaml = r#"
name: "Once"
steps:
  - name: vendor
  - name: lint
rules:
  - include: "vendor/**"
    steps: [vendor]
    once: true
  - include: "*.js"
    steps: [lint]
"#;
    let log = CallLog::new();
    let catalog = recording_catalog(&log, &["vendor", "lint"]);
    let pipeline = load_pipeline(root.path(), yaml, BuildMode::Production, &catalog).unwrap();

    let report = build(&pipeline, SchedulingStrategy::Parallel).await.unwrap();

    assert_succeeded(&report, "vendor/jquery.js", &["vendor"]);
    assert_succeeded(&report, "app.js", &["lint"]);
}

/// `requires` moves a step after its prerequisite within a chain
#[tokio::test]
async fn test_requires_reorders_chain() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), &[("src/app.js", "app")]);

    let yaml = r#"
name: "Requires"
steps:
  - name: transpile
    requires: [lint]
  - name: lint
rules:
  - include: "*.js"
    steps: [transpile, lint]
"#;
    let log = CallLog::new();
    let catalog = recording_catalog(&log, &["lint", "transpile"]);
    let pipeline = load_pipeline(root.path(), yaml, BuildMode::Production, &catalog).unwrap();

    let resources = pipeline.discover().unwrap();
    let plan = pipeline.plan(&resources).unwrap();
    assert_eq!(plan.steps_for("app.js"), Some(vec!["lint", "transpile"]));

    build(&pipeline, SchedulingStrategy::Sequential).await.unwrap();
    assert_eq!(log.steps_for("app.js"), vec!["lint", "transpile"]);
}

/// Mode-restricted steps and `minify` follow the active mode
#[tokio::test]
async fn test_mode_filters_steps() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), &[("src/app.js", "// note\nrun();\n")]);

    let yaml = r#"
name: "Modes"
steps:
  - name: lint
    modes: [development]
  - name: minify
rules:
  - include: "*.js"
    steps: [lint, minify]
"#;
    let log = CallLog::new();
    let catalog = recording_catalog(&log, &["lint"]);

    let production = load_pipeline(root.path(), yaml, BuildMode::Production, &catalog).unwrap();
    let report = build(&production, SchedulingStrategy::Parallel).await.unwrap();
    assert_succeeded(&report, "app.js", &["minify"]);
    assert_eq!(read_output(&production, "app.js"), "run();");
    assert_eq!(log.len(), 0);

    let development = load_pipeline(root.path(), yaml, BuildMode::Development, &catalog).unwrap();
    let report = build(&development, SchedulingStrategy::Parallel).await.unwrap();
    assert_succeeded(&report, "app.js", &["lint"]);
    assert_eq!(read_output(&development, "app.js"), "// note\nrun();\n|lint");
}

/// Resources no rule matches are neither planned nor written
#[tokio::test]
async fn test_unmatched_resources_are_skipped() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), &[("src/app.js", "app"), ("src/README.md", "docs")]);

    let yaml = r#"
name: "Unmatched"
steps:
  - name: copy
rules:
  - test: "\\.js$"
    steps: [copy]
"#;
    let pipeline = load_pipeline(root.path(), yaml, BuildMode::Production, &catalog_with(vec![])).unwrap();
    let report = build(&pipeline, SchedulingStrategy::Parallel).await.unwrap();

    assert_eq!(report.results_for("README.md").count(), 0);
    assert_eq!(emitted_paths(&report), vec!["app.js"]);
    assert!(!pipeline.output_dir.join("README.md").exists());
}

#[tokio::test]
async fn test_stylesheet_plan_entries() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), &[("src/styles.scss", "a {\n  b: c;\n}\n")]);

    let yaml = r#"
name: "Styles"
steps:
  - name: css-extract
  - name: autoprefix
rules:
  - include: "*.scss"
    steps: [css-extract, autoprefix]
"#;
    let pipeline = load_pipeline(root.path(), yaml, BuildMode::Production, &catalog_with(vec![])).unwrap();
    let resources = pipeline.discover().unwrap();
    let plan = pipeline.plan(&resources).unwrap();

    assert_eq!(
        plan.entries(),
        vec![("styles.scss", "css-extract"), ("styles.scss", "autoprefix")]
    );
}

/// Two rules listing the same step invoke it once per resource
#[tokio::test]
async fn test_shared_step_runs_once() {
    let root = tempfile::tempdir().unwrap();
    write_files(root.path(), &[("src/app.js", "app")]);

    let yaml = r#"
name: "Dedup"
steps:
  - name: minify
rules:
  - include: "*.js"
    steps: [minify]
  - test: "^app"
    steps: [minify]
"#;
    let log = CallLog::new();
    let catalog = recording_catalog(&log, &["minify"]);
    let pipeline = load_pipeline(root.path(), yaml, BuildMode::Production, &catalog).unwrap();

    let report = build(&pipeline, SchedulingStrategy::Parallel).await.unwrap();

    assert_eq!(log.steps_for("app.js"), vec!["minify"]);
    assert_succeeded(&report, "app.js", &["minify"]);
    assert_eq!(read_output(&pipeline, "app.js"), "app|minify");
}
