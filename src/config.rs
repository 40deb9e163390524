use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub payload: PayloadConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadConfig {
    /// Identity field used when a type has no entry in `keys`
    pub key: String,

    /// Identity field per wire type, e.g. `{"people": "uid"}`
    #[serde(default)]
    pub keys: BTreeMap<String, String>,

    /// Base URL for `links.self` on persisted resources
    #[serde(default)]
    pub link_base: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub duplicates: DuplicatePolicy,
}

/// How `export` treats a `(type, id)` it has already inlined for the current
/// top-level resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Inline it the first time only; later references are dropped
    #[default]
    FirstOccurrence,
    /// Only skip it when it is an ancestor of the current reference, so
    /// repeated siblings are inlined again and cycles are still cut
    AncestorsOnly,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            key: "id".to_string(),
            keys: BTreeMap::new(),
            link_base: None,
        }
    }
}

impl PayloadConfig {
    /// Identity field of a wire type
    pub fn key_for(&self, kind: &str) -> &str {
        self.keys.get(kind).map(String::as_str).unwrap_or(&self.key)
    }
}

impl AppConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Self::environment())
    }

    // e.g. RESOURCE_GRAPH_PAYLOAD__LINK_BASE=http://example.com
    fn environment() -> config::Environment {
        config::Environment::with_prefix("RESOURCE_GRAPH")
            .prefix_separator("_")
            .separator("__")
    }

    fn load_from(environment: config::Environment) -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        config = config.add_source(config::File::with_name("resource-graph").required(false));

        config = config.add_source(environment);

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }
}
