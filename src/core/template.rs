//! Output naming templates (`[name].[contenthash:8].[ext]`)

use crate::core::resource::Artifact;
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[(name|ext|dir|hash|contenthash)(?::(\d+))?\]")
            .expect("placeholder regex is valid")
    })
}

/// Check that a template only uses known placeholders
pub fn validate_template(template: &str) -> Result<(), String> {
    if template.trim().is_empty() {
        return Err("naming template is empty".to_string());
    }
    let stripped = placeholder_regex().replace_all(template, "");
    if let Some(start) = stripped.find('[') {
        let rest = &stripped[start..];
        let end = rest.find(']').map(|i| i + 1).unwrap_or(rest.len());
        return Err(format!("unknown placeholder {}", &rest[..end]));
    }
    Ok(())
}

/// Render a naming template for an artifact
pub fn render_filename(template: &str, artifact: &Artifact) -> String {
    let hash = artifact.content_hash();
    let dir = artifact.dir();

    // "[dir]/" and ".[ext]" collapse entirely when empty
    let mut template = template.to_string();
    if dir.is_empty() {
        template = template.replace("[dir]/", "");
    }
    if artifact.extension().unwrap_or("").is_empty() {
        template = template.replace(".[ext]", "");
    }

    placeholder_regex()
        .replace_all(&template, |caps: &Captures| {
            let value = match &caps[1] {
                "name" => artifact.stem().to_string(),
                "ext" => artifact.extension().unwrap_or("").to_string(),
                "dir" => dir.to_string(),
                _ => {
                    let len = caps
                        .get(2)
                        .and_then(|m| m.as_str().parse::<usize>().ok())
                        .unwrap_or(hash.len())
                        .min(hash.len());
                    hash[..len].to_string()
                }
            };
            value
        })
        .into_owned()
}
