use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// `build-info.json`, written next to the archive so later CI stages can tell
/// which model and build produced it without unpacking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub build_id: String,
    pub model_id: String,
    pub source: String,
    pub archive: PathBuf,
    pub files: Vec<String>,
    pub bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl BuildManifest {
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize build manifest")?;
        fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write build manifest: {}", path.display()))
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read build manifest: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse build manifest: {}", path.display()))
    }
}
