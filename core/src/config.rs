//! Project configuration.
//!
//! Persisted as pretty-printed JSON at `${root}/.ctx/config.json`.
//! Missing subtrees are merged with defaults on read; unknown keys are
//! preserved on write.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::error::CtxErr;
use crate::error::Result;

/// Name of the state directory under the project root.
pub const STATE_DIR: &str = ".ctx";
/// Database file name inside the state directory.
pub const DB_FILE: &str = "index.db";
/// Config file name inside the state directory.
pub const CONFIG_FILE: &str = "config.json";

/// Search strategy identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Vector,
    Fts,
    Ast,
    Path,
    Dependency,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::Vector,
        Strategy::Fts,
        Strategy::Ast,
        Strategy::Path,
        Strategy::Dependency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Fts => "fts",
            Self::Ast => "ast",
            Self::Path => "path",
            Self::Dependency => "dependency",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vector" => Some(Self::Vector),
            "fts" => Some(Self::Fts),
            "ast" => Some(Self::Ast),
            "path" => Some(Self::Path),
            "dependency" => Some(Self::Dependency),
            _ => None,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main project configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    pub embedder: EmbedderConfig,
    pub search: SearchConfig,
    pub watch: WatchConfig,
    pub llm: LlmConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            embedder: EmbedderConfig::default(),
            search: SearchConfig::default(),
            watch: WatchConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

/// Embedder selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbedderConfig {
    /// One of `local`, `openai`, `voyage`.
    pub provider: String,
    pub model: String,
    pub dimensions: i32,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: default_embedder_provider(),
            model: default_embedder_model(),
            dimensions: default_embedding_dimension(),
        }
    }
}

impl EmbedderConfig {
    /// Canonical `(provider, model, dimensions)` signature used by the
    /// store's embedder gate.
    pub fn signature(&self) -> String {
        format!("{}/{}/{}", self.provider, self.model, self.dimensions)
    }
}

pub fn default_embedder_provider() -> String {
    "local".to_string()
}
pub fn default_embedder_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}
pub fn default_embedding_dimension() -> i32 {
    384
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    /// Result count when the caller does not pass a limit.
    pub default_limit: i32,
    /// Strategy set used by plain `query` when the caller passes none.
    pub strategies: Vec<Strategy>,
    /// Base RRF weight per strategy. Missing entries default to 1.0.
    pub weights: BTreeMap<Strategy, f32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            strategies: default_strategies(),
            weights: BTreeMap::new(),
        }
    }
}

impl SearchConfig {
    /// Base weight for a strategy (1.0 unless configured).
    pub fn weight(&self, strategy: Strategy) -> f32 {
        self.weights.get(&strategy).copied().unwrap_or(1.0)
    }
}

pub fn default_search_limit() -> i32 {
    10
}
fn default_strategies() -> Vec<Strategy> {
    vec![Strategy::Fts, Strategy::Ast, Strategy::Path]
}

/// Watch configuration. The watcher itself lives outside the core; the
/// settings are persisted here so every collaborator reads one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchConfig {
    pub debounce_ms: i32,
    pub ignored: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_watch_debounce_ms(),
            ignored: Vec::new(),
        }
    }
}

fn default_watch_debounce_ms() -> i32 {
    500
}

/// LLM steering configuration, read by external adapters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmConfig {
    /// One of `null`, `gemini`, `openai`, `anthropic`.
    pub provider: String,
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "null".to_string(),
            model: String::new(),
        }
    }
}

impl ProjectConfig {
    /// Path of the config file for a project root.
    pub fn path_for(root: &Path) -> PathBuf {
        root.join(STATE_DIR).join(CONFIG_FILE)
    }

    /// Load configuration for a project root.
    ///
    /// Missing subtrees are filled from defaults; the file itself is left
    /// untouched. A missing file yields the defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::path_for(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| CtxErr::ConfigInvalid {
            field: path.display().to_string(),
            cause: e.to_string(),
        })?;
        Self::from_json(&raw).map_err(|e| CtxErr::ConfigInvalid {
            field: path.display().to_string(),
            cause: e,
        })
    }

    /// Parse from a JSON document, merging over defaults.
    pub fn from_json(raw: &str) -> std::result::Result<Self, String> {
        let user: serde_json::Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        let mut merged = serde_json::to_value(Self::default()).map_err(|e| e.to_string())?;
        deep_merge(&mut merged, &user);
        serde_json::from_value(merged).map_err(|e| e.to_string())
    }

    /// Write configuration, preserving unknown keys already in the file.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = Self::path_for(root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CtxErr::ConfigInvalid {
                field: parent.display().to_string(),
                cause: e.to_string(),
            })?;
        }

        // Start from whatever is on disk so foreign keys survive the write.
        let mut doc = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null),
            Err(_) => serde_json::Value::Null,
        };
        if !doc.is_object() {
            doc = serde_json::Value::Object(serde_json::Map::new());
        }
        let ours = serde_json::to_value(self).map_err(|e| CtxErr::ConfigInvalid {
            field: "config".to_string(),
            cause: e.to_string(),
        })?;
        deep_merge(&mut doc, &ours);

        let pretty = serde_json::to_string_pretty(&doc).map_err(|e| CtxErr::ConfigInvalid {
            field: "config".to_string(),
            cause: e.to_string(),
        })?;
        std::fs::write(&path, pretty + "\n").map_err(|e| CtxErr::ConfigInvalid {
            field: path.display().to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        const EMBEDDER_PROVIDERS: [&str; 3] = ["local", "openai", "voyage"];
        const LLM_PROVIDERS: [&str; 4] = ["null", "gemini", "openai", "anthropic"];

        if !EMBEDDER_PROVIDERS.contains(&self.embedder.provider.as_str()) {
            return Err(CtxErr::ConfigInvalid {
                field: "embedder.provider".to_string(),
                cause: format!(
                    "unknown provider `{}` (expected one of {EMBEDDER_PROVIDERS:?})",
                    self.embedder.provider
                ),
            });
        }
        if self.embedder.dimensions <= 0 {
            return Err(CtxErr::ConfigInvalid {
                field: "embedder.dimensions".to_string(),
                cause: format!("must be positive, got {}", self.embedder.dimensions),
            });
        }
        if self.search.default_limit <= 0 {
            return Err(CtxErr::ConfigInvalid {
                field: "search.defaultLimit".to_string(),
                cause: format!("must be positive, got {}", self.search.default_limit),
            });
        }
        if self.search.strategies.is_empty() {
            return Err(CtxErr::ConfigInvalid {
                field: "search.strategies".to_string(),
                cause: "at least one strategy required".to_string(),
            });
        }
        for (strategy, weight) in &self.search.weights {
            if *weight < 0.0 || !weight.is_finite() {
                return Err(CtxErr::ConfigInvalid {
                    field: format!("search.weights.{strategy}"),
                    cause: format!("must be a non-negative number, got {weight}"),
                });
            }
        }
        if self.watch.debounce_ms <= 0 {
            return Err(CtxErr::ConfigInvalid {
                field: "watch.debounceMs".to_string(),
                cause: format!("must be positive, got {}", self.watch.debounce_ms),
            });
        }
        if !LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(CtxErr::ConfigInvalid {
                field: "llm.provider".to_string(),
                cause: format!(
                    "unknown provider `{}` (expected one of {LLM_PROVIDERS:?})",
                    self.llm.provider
                ),
            });
        }
        Ok(())
    }
}

/// Merge `patch` into `base` recursively. Objects merge key-by-key;
/// everything else replaces.
fn deep_merge(base: &mut serde_json::Value, patch: &serde_json::Value) {
    match (base, patch) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

#[cfg(test)]
#[path = "config.test.rs"]
mod tests;
