//! Engine configuration: which models to preload and under which names.
//!
//! ```json
//! { "models": [ { "name": "intent", "path": "/models/intent.bin" } ] }
//! ```

use crate::error::{FastTextError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the path of the JSON config file.
pub const CONFIG_ENV_VAR: &str = "FASTTEXT_ENGINE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Name queries will use to address the model.
    pub name: String,
    /// Path to the `.bin` model file.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| FastTextError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            FastTextError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Loads the file named by `FASTTEXT_ENGINE_CONFIG`, or an empty config
    /// when the variable is unset.
    pub fn load_from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => {
                tracing::info!("Loading engine config from: {}", path);
                Self::from_file(path)
            }
            Err(_) => {
                tracing::debug!("{} not set, starting with no preloaded models", CONFIG_ENV_VAR);
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for entry in &self.models {
            if entry.name.is_empty() {
                return Err(FastTextError::Config("model name must not be empty".into()));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(FastTextError::Config(format!("model '{}' listed twice", entry.name)));
            }
        }
        Ok(())
    }
}
