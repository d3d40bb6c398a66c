//! Stylesheet extraction and vendor prefixing

use super::{OptionKind, OptionSpec, StepHandler, StepInput, StepOptions};
use crate::core::error::StepError;
use crate::core::resource::Artifact;
use async_trait::async_trait;

const STYLE_EXTENSIONS: &[&str] = &["css", "scss", "sass", "less"];

/// Turn a stylesheet resource into a standalone `.css` artifact
pub struct CssExtractHandler;

#[async_trait]
impl StepHandler for CssExtractHandler {
    fn name(&self) -> &str {
        "css-extract"
    }

    async fn execute(&self, input: StepInput<'_>, _options: &StepOptions) -> Result<Artifact, StepError> {
        let mut artifact = input.artifact;

        let ext = artifact.extension().unwrap_or("").to_ascii_lowercase();
        if !STYLE_EXTENSIONS.contains(&ext.as_str()) {
            return Err(StepError::UnsupportedInput(format!(
                "{} is not a stylesheet",
                artifact.name
            )));
        }

        // Line comments are valid in preprocessor syntax only
        if ext != "css" {
            let text = artifact.text()?;
            let stripped: Vec<&str> = text
                .lines()
                .filter(|line| !line.trim_start().starts_with("//"))
                .collect();
            artifact.contents = stripped.join("\n").into_bytes();
        }

        artifact.set_extension("css");
        Ok(artifact)
    }
}

/// Properties that get vendor-prefixed copies
const PREFIXED_PROPERTIES: &[&str] = &[
    "appearance",
    "backdrop-filter",
    "hyphens",
    "text-size-adjust",
    "user-select",
];

const PREFIX_OPTIONS: &[OptionSpec] = &[OptionSpec::new(
    "prefixes",
    OptionKind::StringList,
    "Vendor prefixes to emit (default: webkit, moz)",
)];

/// Insert vendor-prefixed declarations ahead of standard ones
pub struct AutoprefixHandler;

#[async_trait]
impl StepHandler for AutoprefixHandler {
    fn name(&self) -> &str {
        "autoprefix"
    }

    fn options(&self) -> &[OptionSpec] {
        PREFIX_OPTIONS
    }

    async fn execute(&self, input: StepInput<'_>, options: &StepOptions) -> Result<Artifact, StepError> {
        let mut artifact = input.artifact;
        let prefixes = options
            .get_str_list("prefixes")
            .unwrap_or_else(|| vec!["webkit".to_string(), "moz".to_string()]);

        let text = artifact.text()?;
        let mut out = Vec::new();

        for line in text.lines() {
            let trimmed = line.trim_start();
            let indent = &line[..line.len() - trimmed.len()];

            if let Some((property, _)) = trimmed.split_once(':') {
                let property = property.trim();
                if PREFIXED_PROPERTIES.contains(&property) {
                    for prefix in &prefixes {
                        out.push(format!("{}-{}-{}", indent, prefix, trimmed));
                    }
                }
            }
            out.push(line.to_string());
        }

        artifact.contents = out.join("\n").into_bytes();
        Ok(artifact)
    }
}
