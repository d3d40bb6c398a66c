//! Resources (build inputs) and artifacts (step outputs)

use crate::core::error::StepError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

/// Where the bytes of a resource come from
#[derive(Debug, Clone)]
enum ResourceSource {
    /// A file on disk
    File(PathBuf),
    /// Contents held in memory (virtual plugin inputs, tests)
    Inline(Arc<[u8]>),
}

/// A single input subject to transformation
#[derive(Debug, Clone)]
pub struct Resource {
    /// Path relative to the source directory, always `/`-separated
    pub path: String,

    source: ResourceSource,
}

impl Resource {
    /// A resource backed by a file on disk
    pub fn from_file(path: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source: ResourceSource::File(file.into()),
        }
    }

    /// A resource whose contents are held in memory
    pub fn inline(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        let contents: Vec<u8> = contents.into();
        Self {
            path: path.into(),
            source: ResourceSource::Inline(contents.into()),
        }
    }

    /// Read the resource contents
    pub async fn load(&self) -> Result<Vec<u8>, StepError> {
        match &self.source {
            ResourceSource::File(file) => tokio::fs::read(file)
                .await
                .map_err(|e| StepError::io(file.display().to_string(), &e)),
            ResourceSource::Inline(bytes) => Ok(bytes.to_vec()),
        }
    }

    /// The on-disk location, if any
    pub fn file_path(&self) -> Option<&Path> {
        match &self.source {
            ResourceSource::File(file) => Some(file),
            ResourceSource::Inline(_) => None,
        }
    }
}

/// An extra output derived from an artifact, written next to it
/// (e.g. `app.3f2a.js.gz` for `app.3f2a.js`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sibling {
    pub suffix: String,
    pub contents: Vec<u8>,
}

/// The value flowing from one step to the next within a resource chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Logical output name, e.g. `css/styles.css`
    pub name: String,

    pub contents: Vec<u8>,

    /// Naming template set by a step's `filename` option
    pub filename_template: Option<String>,

    pub siblings: Vec<Sibling>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
            filename_template: None,
            siblings: Vec::new(),
        }
    }

    /// Contents as UTF-8 text
    pub fn text(&self) -> Result<&str, StepError> {
        std::str::from_utf8(&self.contents)
            .map_err(|_| StepError::UnsupportedInput(format!("{} is not valid UTF-8", self.name)))
    }

    /// Directory part of the logical name (empty at the root)
    pub fn dir(&self) -> &str {
        self.name.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    /// File name without directory
    pub fn file_name(&self) -> &str {
        self.name.rsplit_once('/').map(|(_, file)| file).unwrap_or(&self.name)
    }

    /// File name without directory and extension
    pub fn stem(&self) -> &str {
        let file = self.file_name();
        match file.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => file,
        }
    }

    /// Extension without the dot
    pub fn extension(&self) -> Option<&str> {
        match self.file_name().rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Replace the extension of the logical name
    pub fn set_extension(&mut self, ext: &str) {
        let dir = self.dir();
        let file = format!("{}.{}", self.stem(), ext);
        self.name = if dir.is_empty() {
            file
        } else {
            format!("{}/{}", dir, file)
        };
    }

    /// Stable content hash (xxh3, 16 hex digits)
    pub fn content_hash(&self) -> String {
        content_hash(&self.contents)
    }

    /// Summary recorded in execution results
    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            name: self.name.clone(),
            size: self.contents.len(),
            hash: self.content_hash(),
        }
    }
}

/// Stable content hash used by naming templates and precache revisions
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:016x}", xxh3_64(bytes))
}

/// Lightweight description of an artifact produced by a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub name: String,
    pub size: usize,
    pub hash: String,
}

/// A file written to the output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedAsset {
    /// Resource the file was produced from
    pub source: String,

    /// Path relative to the output directory
    pub path: String,

    pub size: usize,

    pub hash: String,
}

/// Recursively discover resources under `source_dir`, sorted by path.
///
/// Directories listed in `skip` (typically the output directory) are not
/// descended into.
pub fn discover_resources(source_dir: &Path, skip: &[PathBuf]) -> std::io::Result<Vec<Resource>> {
    let mut files = Vec::new();
    walk(source_dir, source_dir, skip, &mut files)?;
    files.sort_by(|a, b| a.0.cmp(&b.0));

    debug!(count = files.len(), dir = %source_dir.display(), "Discovered resources");

    Ok(files
        .into_iter()
        .map(|(rel, abs)| Resource::from_file(rel, abs))
        .collect())
}

fn walk(
    root: &Path,
    dir: &Path,
    skip: &[PathBuf],
    out: &mut Vec<(String, PathBuf)>,
) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if skip.iter().any(|s| s == &path) {
                continue;
            }
            walk(root, &path, skip, out)?;
        } else if file_type.is_file() {
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            out.push((rel, path));
        }
    }
    Ok(())
}
