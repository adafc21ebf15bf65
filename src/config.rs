use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the model artifact to serve.
pub const MODEL_NAME_VAR: &str = "MODEL_NAME";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Socket address the HTTP server binds. Defaults to 0.0.0.0:9696
    pub bind_addr: String,
    /// Directory holding encoder.bin, scaler.bin, dv.bin and the model file
    pub artifact_dir: PathBuf,
    /// Model artifact to serve; `MODEL_NAME` takes precedence when set
    pub model_name: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9696".to_string(),
            artifact_dir: PathBuf::from("."),
            model_name: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&content).map_err(|e| anyhow!(e))
    }

    /// Reads the config file when present, then applies `MODEL_NAME`.
    pub fn load(path: &Path) -> Result<Self> {
        let cfg = if path.exists() {
            Self::from_file(path)?
        } else {
            log::info!("Config file '{}' not found, using defaults.", path.display());
            Self::default()
        };
        Ok(cfg.with_model_override(std::env::var(MODEL_NAME_VAR).ok()))
    }

    fn with_model_override(mut self, model_name: Option<String>) -> Self {
        if let Some(name) = model_name.filter(|name| !name.trim().is_empty()) {
            self.model_name = Some(name);
        }
        self
    }

    pub fn model_name(&self) -> Result<&str> {
        self.model_name
            .as_deref()
            .ok_or_else(|| anyhow!("no model selected: set {MODEL_NAME_VAR} or model_name in the config file"))
    }
}
