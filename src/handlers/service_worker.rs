//! Offline service worker with a precache manifest of emitted assets

use super::{OptionKind, OptionSpec, StepHandler, StepInput, StepOptions};
use crate::core::error::StepError;
use crate::core::resource::{content_hash, Artifact};
use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

const OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("sw_dest", OptionKind::String, "Output file name (default: service-worker.js)"),
    OptionSpec::new("skip_waiting", OptionKind::Bool, "Activate new workers immediately"),
    OptionSpec::new("clients_claim", OptionKind::Bool, "Take control of open clients on activation"),
    OptionSpec::new("navigate_fallback", OptionKind::String, "Page served for navigation requests"),
    OptionSpec::new("cache_name", OptionKind::String, "Cache name prefix (default: assetline-precache)"),
    OptionSpec::new("exclude", OptionKind::StringList, "Globs of emitted files left out of the precache"),
];

/// Emitted files never precached: source maps and pre-compressed variants
const EXCLUDED_SUFFIXES: &[&str] = &[".map", ".gz", ".deflate", ".zz"];

#[derive(Debug, Serialize)]
struct PrecacheEntry<'a> {
    url: &'a str,
    revision: &'a str,
}

/// Generate a service worker precaching every emitted asset
pub struct ServiceWorkerHandler;

#[async_trait]
impl StepHandler for ServiceWorkerHandler {
    fn name(&self) -> &str {
        "service-worker"
    }

    fn options(&self) -> &[OptionSpec] {
        OPTIONS
    }

    async fn execute(&self, input: StepInput<'_>, options: &StepOptions) -> Result<Artifact, StepError> {
        let sw_dest = options.get_str("sw_dest").unwrap_or("service-worker.js");
        let excludes = options.get_str_list("exclude").unwrap_or_default();

        let excluded = |path: &str| {
            path == sw_dest
                || EXCLUDED_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
                || excludes.iter().any(|glob| fast_glob::glob_match(glob.as_str(), path))
        };

        let entries: Vec<PrecacheEntry<'_>> = input
            .emitted
            .iter()
            .filter(|asset| !excluded(&asset.path))
            .map(|asset| PrecacheEntry {
                url: &asset.path,
                revision: &asset.hash,
            })
            .collect();

        let manifest = serde_json::to_string_pretty(&entries)
            .map_err(|e| StepError::Failed(format!("failed to serialize precache manifest: {}", e)))?;

        let fallback = options.get_str("navigate_fallback");
        if let Some(fallback) = fallback {
            if !entries.iter().any(|e| e.url == fallback) {
                warn!(fallback, "navigate_fallback is not among the precached assets");
            }
        }

        let cache_prefix = options.get_str("cache_name").unwrap_or("assetline-precache");
        let cache_name = format!("{}-{}", cache_prefix, &content_hash(manifest.as_bytes())[..8]);

        let script = render_worker(
            &cache_name,
            &manifest,
            fallback,
            options.get_bool("skip_waiting").unwrap_or(false),
            options.get_bool("clients_claim").unwrap_or(false),
        );

        let mut artifact = Artifact::new(sw_dest, script);
        artifact.filename_template = Some(sw_dest.to_string());
        Ok(artifact)
    }
}

fn render_worker(
    cache_name: &str,
    manifest: &str,
    fallback: Option<&str>,
    skip_waiting: bool,
    clients_claim: bool,
) -> String {
    let mut js = String::new();
    js.push_str(&format!("const CACHE_NAME = {:?};\n", cache_name));
    js.push_str(&format!("const PRECACHE_MANIFEST = {};\n", manifest));
    js.push_str(&format!(
        "const NAVIGATE_FALLBACK = {};\n\n",
        fallback.map(|f| format!("{:?}", f)).unwrap_or_else(|| "null".to_string())
    ));

    js.push_str("self.addEventListener(\"install\", (event) => {\n");
    js.push_str("  event.waitUntil(\n");
    js.push_str("    caches.open(CACHE_NAME).then((cache) => cache.addAll(PRECACHE_MANIFEST.map((entry) => entry.url)))\n");
    js.push_str("  );\n");
    if skip_waiting {
        js.push_str("  self.skipWaiting();\n");
    }
    js.push_str("});\n\n");

    js.push_str("self.addEventListener(\"activate\", (event) => {\n");
    js.push_str("  event.waitUntil(\n");
    js.push_str("    caches.keys().then((keys) => Promise.all(keys.filter((key) => key !== CACHE_NAME).map((key) => caches.delete(key))))\n");
    js.push_str("  );\n");
    if clients_claim {
        js.push_str("  self.clients.claim();\n");
    }
    js.push_str("});\n\n");

    js.push_str("self.addEventListener(\"fetch\", (event) => {\n");
    js.push_str("  if (NAVIGATE_FALLBACK && event.request.mode === \"navigate\") {\n");
    js.push_str("    event.respondWith(caches.match(NAVIGATE_FALLBACK).then((response) => response || fetch(event.request)));\n");
    js.push_str("    return;\n");
    js.push_str("  }\n");
    js.push_str("  event.respondWith(caches.match(event.request).then((response) => response || fetch(event.request)));\n");
    js.push_str("});\n");
    js
}
