//! Step handlers - the executable side of a step

pub mod compress;
pub mod copy;
pub mod css;
pub mod html;
pub mod minify;
pub mod service_worker;

use crate::core::config::BuildSettings;
use crate::core::error::StepError;
use crate::core::resource::{Artifact, EmittedAsset, Resource};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub use compress::CompressHandler;
pub use copy::CopyHandler;
pub use css::{AutoprefixHandler, CssExtractHandler};
pub use html::HtmlHandler;
pub use minify::MinifyHandler;
pub use service_worker::ServiceWorkerHandler;

/// Type of a recognized option value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Integer,
    String,
    StringList,
    /// A string restricted to the listed values
    OneOf(&'static [&'static str]),
}

impl OptionKind {
    /// Check a configured value against this kind
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (OptionKind::Bool, Value::Bool(_)) => Ok(()),
            (OptionKind::Integer, Value::Number(n)) if n.is_u64() => Ok(()),
            (OptionKind::String, Value::String(_)) => Ok(()),
            (OptionKind::StringList, Value::Array(items)) if items.iter().all(Value::is_string) => {
                Ok(())
            }
            (OptionKind::OneOf(allowed), Value::String(s)) => {
                if allowed.contains(&s.as_str()) {
                    Ok(())
                } else {
                    Err(format!("expected one of {}, got '{}'", allowed.join(", "), s))
                }
            }
            (kind, other) => Err(format!("expected {}, got {}", kind.describe(), other)),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            OptionKind::Bool => "a boolean",
            OptionKind::Integer => "a non-negative integer",
            OptionKind::String => "a string",
            OptionKind::StringList => "a list of strings",
            OptionKind::OneOf(_) => "a string",
        }
    }
}

/// A recognized option of a handler
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub name: &'static str,
    pub kind: OptionKind,
    pub description: &'static str,
}

impl OptionSpec {
    pub const fn new(name: &'static str, kind: OptionKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
        }
    }
}

/// Options every step accepts, handled by the executor rather than the handler
pub const COMMON_OPTIONS: &[OptionSpec] = &[OptionSpec::new(
    "filename",
    OptionKind::String,
    "Naming template for the artifact this step produces",
)];

/// Validated, read-only step options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOptions(Map<String, Value>);

impl StepOptions {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn get_str_list(&self, key: &str) -> Option<Vec<String>> {
        self.0.get(key).and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Everything a handler sees for one invocation
#[derive(Debug)]
pub struct StepInput<'a> {
    /// The resource the chain runs for
    pub resource: &'a Resource,

    /// Output of the previous step (or the loaded resource for the first)
    pub artifact: Artifact,

    /// Assets written so far (populated for global plugin chains)
    pub emitted: &'a [EmittedAsset],

    pub settings: BuildSettings,
}

/// A named, reusable transform
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Handler name as referenced from step definitions
    fn name(&self) -> &str;

    /// Recognized options (beyond [`COMMON_OPTIONS`])
    fn options(&self) -> &[OptionSpec] {
        &[]
    }

    /// Transform the input artifact
    async fn execute(&self, input: StepInput<'_>, options: &StepOptions) -> Result<Artifact, StepError>;
}

/// Name to handler map consulted when step definitions are registered
#[derive(Clone, Default)]
pub struct HandlerCatalog {
    handlers: HashMap<String, Arc<dyn StepHandler>>,
}

impl HandlerCatalog {
    /// An empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog with every built-in handler installed
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.insert(Arc::new(CopyHandler));
        catalog.insert(Arc::new(CssExtractHandler));
        catalog.insert(Arc::new(AutoprefixHandler));
        catalog.insert(Arc::new(MinifyHandler));
        catalog.insert(Arc::new(CompressHandler));
        catalog.insert(Arc::new(HtmlHandler));
        catalog.insert(Arc::new(ServiceWorkerHandler));
        catalog
    }

    /// Install a handler, replacing any handler of the same name
    pub fn insert(&mut self, handler: Arc<dyn StepHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StepHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Handler names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for HandlerCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerCatalog")
            .field("handlers", &self.names())
            .finish()
    }
}
