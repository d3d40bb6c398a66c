//! Copy resources into the output tree, optionally relocating them

use super::{OptionKind, OptionSpec, StepHandler, StepInput, StepOptions};
use crate::core::error::StepError;
use crate::core::resource::Artifact;
use async_trait::async_trait;

const OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("from", OptionKind::String, "Leading directory stripped from the name"),
    OptionSpec::new("to", OptionKind::String, "Directory the artifact is placed in"),
];

/// Pass contents through unchanged, rewriting the output location
pub struct CopyHandler;

#[async_trait]
impl StepHandler for CopyHandler {
    fn name(&self) -> &str {
        "copy"
    }

    fn options(&self) -> &[OptionSpec] {
        OPTIONS
    }

    async fn execute(&self, input: StepInput<'_>, options: &StepOptions) -> Result<Artifact, StepError> {
        let mut artifact = input.artifact;

        let mut name = artifact.name.as_str();
        if let Some(from) = options.get_str("from") {
            let from = from.trim_matches('/');
            if !from.is_empty() && from != "." {
                name = name
                    .strip_prefix(from)
                    .and_then(|rest| rest.strip_prefix('/'))
                    .unwrap_or(name);
            }
        }

        let relocated = match options.get_str("to").map(|to| to.trim_matches('/')) {
            Some(to) if !to.is_empty() && to != "." => format!("{}/{}", to, name),
            _ => name.to_string(),
        };

        artifact.name = relocated;
        Ok(artifact)
    }
}
