use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use voice_severity::{ExtractionParams, ScoringModel};

use crate::stats::CriticalThresholds;
use crate::store::JsonStore;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: u32,

    /// Store file; defaults to ~/.telemonitor/store.json
    pub store_path: Option<PathBuf>,

    /// Recalibrated scoring model; the clinical default when unset
    pub scoring_model_path: Option<PathBuf>,

    pub extraction: ExtractionParams,
    pub critical: CriticalThresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: 1,
            store_path: None,
            scoring_model_path: None,
            extraction: ExtractionParams::default(),
            critical: CriticalThresholds::default(),
        }
    }
}

impl Config {
    /// Load config from file, or create default
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .context("Failed to read config file")?;
            let config: Self = serde_json::from_str(&content)
                .context("Failed to parse config file")?;
            config.extraction.validate()
                .with_context(|| format!("Invalid extraction settings in {:?}", path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file through a temp file and rename
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, content)
            .with_context(|| format!("Failed to write temp file {:?}", temp_path))?;
        std::fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename temp file to {:?}", path))
    }

    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Failed to get home directory")?;
        Ok(home.join(".telemonitor"))
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.json"))
    }

    /// Get the store file path
    pub fn get_store_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.store_path {
            Ok(path.clone())
        } else {
            Ok(JsonStore::default_path()?)
        }
    }

    /// Scoring model to inject into the pipeline
    pub fn scoring_model(&self) -> Result<ScoringModel> {
        match self.scoring_model_path {
            Some(ref path) => ScoringModel::load(path)
                .with_context(|| format!("Failed to load scoring model {:?}", path)),
            None => {
                info!("Using the default clinical scoring model");
                Ok(ScoringModel::default())
            }
        }
    }
}
