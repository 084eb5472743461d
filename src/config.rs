//! Engine configuration
//!
//! Settings are stored as JSON in the user's config directory:
//! - Linux: ~/.config/scan-studio/config.json
//! - macOS: ~/Library/Application Support/scan-studio/config.json
//! - Windows: %APPDATA%\scan-studio\config.json
//!
//! A missing file means defaults. Unknown fields are ignored and missing
//! fields take their default, so older files keep loading.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::payload::thumbnail::THUMBNAIL_SIZE;
use crate::state::registry::DEFAULT_INGEST_CONCURRENCY;

/// All engine settings
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Bounding box edge for display thumbnails, in pixels
    pub thumbnail_size: u32,

    /// How much of a free-form prompt is kept in a history label
    pub label_prompt_chars: usize,

    /// Files read and thumbnailed at once during bulk ingestion
    pub ingest_concurrency: usize,

    pub instructions: StageInstructions,

    pub export: ExportSettings,
}

/// Fixed instructions sent with the auto-process stages
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StageInstructions {
    pub perspective: String,
    pub enhance: String,
    pub extract: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ExportSettings {
    /// Previously granted output folder; None means always ask
    pub directory: Option<PathBuf>,
    /// File name of the bundle archive
    pub bundle_name: String,
    /// Add extracted text and analysis results to bundles as .txt files
    pub include_text_results: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: THUMBNAIL_SIZE,
            label_prompt_chars: 30,
            ingest_concurrency: DEFAULT_INGEST_CONCURRENCY,
            instructions: StageInstructions::default(),
            export: ExportSettings::default(),
        }
    }
}

impl Default for StageInstructions {
    fn default() -> Self {
        Self {
            perspective: "Detect the document in this photo, correct its perspective so it is \
                          viewed straight on, and crop away the background."
                .to_string(),
            enhance: "Increase contrast and sharpness so printed text is as legible as \
                      possible. Do not change the content."
                .to_string(),
            extract: "Transcribe all text in this image exactly, preserving line breaks."
                .to_string(),
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            directory: None,
            bundle_name: "scan-studio-export.zip".to_string(),
            include_text_results: true,
        }
    }
}

impl EngineConfig {
    /// Get the path where the config file should be stored
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir().or_else(dirs::home_dir)?;
        path.push("scan-studio");
        path.push("config.json");
        Some(path)
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from a file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        info!("⚙️  Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = self
            .to_json()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
