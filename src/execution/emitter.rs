//! Writes finished artifacts into the output directory

use crate::core::config::OutputConfig;
use crate::core::error::StepError;
use crate::core::pipeline::Pipeline;
use crate::core::resource::{content_hash, Artifact, EmittedAsset, Resource};
use crate::core::template::render_filename;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Extensions that stay at the output root instead of `asset_dir`
const PAGE_EXTENSIONS: &[&str] = &["html", "htm", "js", "mjs", "css"];

/// Extensions that get a `.map` sidecar when source maps are on
const MAPPED_EXTENSIONS: &[&str] = &["js", "mjs", "css"];

/// Output directory writer
#[derive(Debug)]
pub struct OutputWriter {
    dir: PathBuf,
    template: String,
    asset_dir: Option<String>,
    source_map: bool,
    clean: bool,
    manifest: Option<String>,
    /// Output name -> resource that wrote it, for the current build
    claimed: Mutex<HashMap<String, String>>,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>, output: &OutputConfig, source_map: bool) -> Self {
        Self {
            dir: dir.into(),
            template: output.filename.clone(),
            asset_dir: output.asset_dir.clone(),
            source_map,
            clean: output.clean,
            manifest: output.manifest.clone(),
            claimed: Mutex::new(HashMap::new()),
        }
    }

    pub fn for_pipeline(pipeline: &Pipeline) -> Self {
        Self::new(&pipeline.output_dir, &pipeline.output, pipeline.settings.source_map)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the output directory, removing old contents first if `clean` is set.
    /// Also forgets the output names claimed by the previous build.
    pub async fn prepare(&self) -> std::io::Result<()> {
        self.claimed.lock().await.clear();
        if self.clean && tokio::fs::try_exists(&self.dir).await? {
            debug!(dir = %self.dir.display(), "Cleaning output directory");
            tokio::fs::remove_dir_all(&self.dir).await?;
        }
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Output path of an artifact, relative to the output directory
    pub fn output_name(&self, artifact: &Artifact) -> String {
        if let Some(template) = &artifact.filename_template {
            return render_filename(template, artifact);
        }

        let name = render_filename(&self.template, artifact);
        match (&self.asset_dir, artifact.extension()) {
            (Some(asset_dir), ext) if !ext.is_some_and(|e| PAGE_EXTENSIONS.contains(&e)) => {
                format!("{}/{}", asset_dir.trim_end_matches('/'), name)
            }
            _ => name,
        }
    }

    /// Write an artifact with its siblings and source map.
    ///
    /// Every output name is claimed before anything is written; a name
    /// already claimed by another resource in this build fails the write.
    pub async fn write(&self, resource: &Resource, artifact: &Artifact) -> Result<Vec<EmittedAsset>, StepError> {
        let name = self.output_name(artifact);
        check_relative(&name)?;

        let mapped = self.source_map && artifact.extension().is_some_and(|e| MAPPED_EXTENSIONS.contains(&e));
        let mut names = vec![name.clone()];
        names.extend(artifact.siblings.iter().map(|s| format!("{}{}", name, s.suffix)));
        if mapped {
            names.push(format!("{}.map", name));
        }
        self.claim(&resource.path, &names).await?;

        let mut emitted = vec![self.write_file(&resource.path, &name, &artifact.contents).await?];

        for sibling in &artifact.siblings {
            let sibling_name = format!("{}{}", name, sibling.suffix);
            emitted.push(self.write_file(&resource.path, &sibling_name, &sibling.contents).await?);
        }

        if mapped {
            let original = resource.load().await?;
            let map = json!({
                "version": 3,
                "file": name.rsplit('/').next().unwrap_or(&name),
                "sources": [resource.path],
                "sourcesContent": [String::from_utf8_lossy(&original)],
                "names": [],
                "mappings": "",
            });
            let map_name = format!("{}.map", name);
            emitted.push(
                self.write_file(&resource.path, &map_name, map.to_string().as_bytes())
                    .await?,
            );
        }

        Ok(emitted)
    }

    async fn claim(&self, source: &str, names: &[String]) -> Result<(), StepError> {
        let mut claimed = self.claimed.lock().await;
        for name in names {
            if let Some(owner) = claimed.get(name).filter(|owner| owner.as_str() != source) {
                warn!(source, output = %name, owner = %owner, "Output name collision");
                return Err(StepError::Failed(format!(
                    "output '{}' is already written by {}",
                    name, owner
                )));
            }
        }
        for name in names {
            claimed.insert(name.clone(), source.to_string());
        }
        Ok(())
    }

    async fn write_file(&self, source: &str, name: &str, contents: &[u8]) -> Result<EmittedAsset, StepError> {
        let path = self.dir.join(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StepError::io(parent.display().to_string(), &e))?;
        }
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| StepError::io(path.display().to_string(), &e))?;

        debug!(source, output = name, size = contents.len(), "Wrote asset");
        Ok(EmittedAsset {
            source: source.to_string(),
            path: name.to_string(),
            size: contents.len(),
            hash: content_hash(contents),
        })
    }

    /// Write the JSON manifest (resource path -> emitted paths), if configured
    pub async fn write_manifest(&self, assets: &[EmittedAsset]) -> std::io::Result<Option<PathBuf>> {
        let Some(manifest) = &self.manifest else {
            return Ok(None);
        };

        let mut entries: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for asset in assets {
            entries.entry(asset.source.as_str()).or_default().push(asset.path.as_str());
        }
        for paths in entries.values_mut() {
            paths.sort_unstable();
        }

        let body = serde_json::to_string_pretty(&entries)?;
        let path = self.dir.join(manifest);
        tokio::fs::write(&path, body).await?;
        info!(path = %path.display(), entries = entries.len(), "Wrote manifest");
        Ok(Some(path))
    }
}

fn check_relative(name: &str) -> Result<(), StepError> {
    let escapes = Path::new(name)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if name.is_empty() || escapes {
        return Err(StepError::Failed(format!(
            "output name '{}' must stay inside the output directory",
            name
        )));
    }
    Ok(())
}
