//! Pre-compressed variants of emitted assets

use super::{OptionKind, OptionSpec, StepHandler, StepInput, StepOptions};
use crate::core::error::StepError;
use crate::core::resource::{Artifact, Sibling};
use async_trait::async_trait;
use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::io::Write;
use tracing::debug;

const ALGORITHMS: &[&str] = &["gzip", "deflate", "zlib"];

const OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("algorithm", OptionKind::OneOf(ALGORITHMS), "Compression algorithm (default: gzip)"),
    OptionSpec::new("level", OptionKind::Integer, "Compression level 0-9 (default: 6)"),
    OptionSpec::new("threshold", OptionKind::Integer, "Only compress artifacts at least this many bytes"),
    OptionSpec::new(
        "keep_original",
        OptionKind::Bool,
        "Emit the compressed file next to the original (default: true)",
    ),
];

/// Compress artifacts with flate2
pub struct CompressHandler;

fn suffix_for(algorithm: &str) -> &'static str {
    match algorithm {
        "deflate" => ".deflate",
        "zlib" => ".zz",
        _ => ".gz",
    }
}

fn compress(algorithm: &str, level: u32, data: &[u8]) -> std::io::Result<Vec<u8>> {
    let level = Compression::new(level);
    match algorithm {
        "deflate" => {
            let mut encoder = DeflateEncoder::new(Vec::new(), level);
            encoder.write_all(data)?;
            encoder.finish()
        }
        "zlib" => {
            let mut encoder = ZlibEncoder::new(Vec::new(), level);
            encoder.write_all(data)?;
            encoder.finish()
        }
        _ => {
            let mut encoder = GzEncoder::new(Vec::new(), level);
            encoder.write_all(data)?;
            encoder.finish()
        }
    }
}

#[async_trait]
impl StepHandler for CompressHandler {
    fn name(&self) -> &str {
        "compress"
    }

    fn options(&self) -> &[OptionSpec] {
        OPTIONS
    }

    async fn execute(&self, input: StepInput<'_>, options: &StepOptions) -> Result<Artifact, StepError> {
        let mut artifact = input.artifact;

        let algorithm = options.get_str("algorithm").unwrap_or("gzip");
        let level = options.get_u64("level").unwrap_or(6);
        if level > 9 {
            return Err(StepError::Failed(format!(
                "compression level must be between 0 and 9, got {}",
                level
            )));
        }

        let threshold = options.get_u64("threshold").unwrap_or(0);
        if (artifact.contents.len() as u64) < threshold {
            debug!(artifact = %artifact.name, threshold, "Below compression threshold, skipping");
            return Ok(artifact);
        }

        let compressed = compress(algorithm, level as u32, &artifact.contents)
            .map_err(|e| StepError::io(artifact.name.clone(), &e))?;
        let suffix = suffix_for(algorithm);

        if options.get_bool("keep_original").unwrap_or(true) {
            artifact.siblings.push(Sibling {
                suffix: suffix.to_string(),
                contents: compressed,
            });
        } else {
            artifact.name = format!("{}{}", artifact.name, suffix);
            artifact.contents = compressed;
        }

        Ok(artifact)
    }
}
