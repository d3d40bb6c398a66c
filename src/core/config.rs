//! Build configuration from YAML

use crate::core::error::{BuildError, BuildResult};
use crate::core::template::validate_template;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Build mode, selects mode-dependent defaults and mode-restricted steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Development,
    #[default]
    Production,
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildMode::Development => write!(f, "development"),
            BuildMode::Production => write!(f, "production"),
        }
    }
}

/// Top-level build configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Project name (used in notifications and reports)
    pub name: String,

    /// Default mode when none is given on the command line
    #[serde(default)]
    pub mode: BuildMode,

    /// Directory scanned for resources
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Worker count for `parallel-limited` scheduling
    #[serde(default)]
    pub concurrency: Option<usize>,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub optimization: OptimizationConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    /// Step definitions
    #[serde(default)]
    pub steps: Vec<StepConfig>,

    /// Pattern to step bindings
    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// Global plugin declarations (step names), run once after all resources
    #[serde(default)]
    pub plugins: Vec<String>,

    /// Directory relative paths are resolved against (the config file's directory)
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Output directory and naming
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Default naming template
    #[serde(default = "default_filename")]
    pub filename: String,

    /// Subdirectory for artifacts that are not html/js/css
    #[serde(default)]
    pub asset_dir: Option<String>,

    /// Write `.map` sidecars (defaults to on in development)
    #[serde(default)]
    pub source_map: Option<bool>,

    /// Remove the output directory before building
    #[serde(default)]
    pub clean: bool,

    /// File name of the JSON manifest, if one should be written
    #[serde(default)]
    pub manifest: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            filename: default_filename(),
            asset_dir: None,
            source_map: None,
            clean: false,
            manifest: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizationConfig {
    /// Run `minify` steps (defaults to on in production)
    #[serde(default)]
    pub minimize: Option<bool>,
}

/// Build notification toggles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub logo: Option<PathBuf>,

    /// Stay silent on fully successful builds
    #[serde(default)]
    pub suppress_success: bool,

    /// Stay silent on builds with isolated (non-fatal) failures
    #[serde(default)]
    pub suppress_warning: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Step definition as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    /// Unique step name, referenced by rules and plugins
    pub name: String,

    /// Handler implementing the step (defaults to `name`)
    #[serde(default)]
    pub handler: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Handler options, validated against the handler's schema
    #[serde(default)]
    pub options: Map<String, Value>,

    /// A failure of this step aborts the whole run
    #[serde(default)]
    pub fatal: bool,

    /// Modes the step is enabled in (empty = all)
    #[serde(default)]
    pub modes: Vec<BuildMode>,

    /// Steps that must run before this one when both apply to a resource
    #[serde(default)]
    pub requires: Vec<String>,

    /// Fail the step if one invocation runs longer than this
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl StepConfig {
    pub fn handler_name(&self) -> &str {
        self.handler.as_deref().unwrap_or(&self.name)
    }
}

/// Rule as written in YAML: exactly one of `include` (glob) or `test` (regex)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default)]
    pub include: Option<String>,

    #[serde(default)]
    pub test: Option<String>,

    /// Glob of paths this rule never applies to
    #[serde(default)]
    pub exclude: Option<String>,

    pub steps: Vec<String>,

    /// When true, no later rule is evaluated for a resource this rule matched
    #[serde(default)]
    pub once: bool,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("src")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_filename() -> String {
    "[dir]/[name].[ext]".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn invalid(message: impl Into<String>) -> BuildError {
    BuildError::Configuration(message.into())
}

/// Mode-resolved switches derived from the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSettings {
    pub mode: BuildMode,
    pub source_map: bool,
    pub minimize: bool,
}

impl BuildConfig {
    /// Load build configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> BuildResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BuildError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_yaml(&content)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    /// Parse build configuration from YAML string
    pub fn from_yaml(yaml: &str) -> BuildResult<Self> {
        let config: BuildConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation; step wiring is checked when the registry is built
    pub fn validate(&self) -> BuildResult<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("Build name must not be empty"));
        }

        if self.concurrency == Some(0) {
            return Err(invalid("concurrency must be at least 1"));
        }

        validate_template(&self.output.filename)
            .map_err(|e| invalid(format!("output.filename: {}", e)))?;

        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(invalid("Step names must not be empty"));
            }
        }

        for (index, rule) in self.rules.iter().enumerate() {
            match (&rule.include, &rule.test) {
                (Some(_), Some(_)) => {
                    return Err(invalid(format!(
                        "Rule #{} sets both 'include' and 'test'; use one",
                        index + 1
                    )))
                }
                (None, None) => {
                    return Err(invalid(format!(
                        "Rule #{} needs an 'include' glob or a 'test' regex",
                        index + 1
                    )))
                }
                _ => {}
            }
            if rule.steps.is_empty() {
                return Err(invalid(format!("Rule #{} lists no steps", index + 1)));
            }
        }

        Ok(())
    }

    /// Resolve mode-dependent defaults
    pub fn settings(&self, mode: BuildMode) -> BuildSettings {
        BuildSettings {
            mode,
            source_map: self
                .output
                .source_map
                .unwrap_or(mode == BuildMode::Development),
            minimize: self
                .optimization
                .minimize
                .unwrap_or(mode == BuildMode::Production),
        }
    }

    /// Absolute-or-base-relative source directory
    pub fn source_path(&self) -> PathBuf {
        self.base_dir.join(&self.source_dir)
    }

    /// Absolute-or-base-relative output directory
    pub fn output_path(&self) -> PathBuf {
        self.base_dir.join(&self.output.dir)
    }
}
