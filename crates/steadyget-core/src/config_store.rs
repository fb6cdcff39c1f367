//! Options file storage
//!
//! The engine options live in a single JSON file. Missing keys take their
//! defaults and unknown keys are ignored, so older files keep working.

use crate::error::SteadygetError;
use std::path::{Path, PathBuf};
use steadyget_types::EngineConfig;
use tokio::fs;
use tracing::warn;

/// `<config dir>/steadyget/options.json`, or `./steadyget.json` as fallback
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("steadyget").join("options.json"))
        .unwrap_or_else(|| PathBuf::from("steadyget.json"))
}

/// Load options from `path`
pub async fn load_config(path: &Path) -> Result<EngineConfig, SteadygetError> {
    let content = fs::read_to_string(path).await?;
    let config: EngineConfig = serde_json::from_str(&content)?;
    config.check().map_err(SteadygetError::InvalidConfig)?;
    Ok(config)
}

/// Load options from `path`, falling back to defaults when the file is
/// missing or unreadable
pub async fn load_or_default(path: &Path) -> EngineConfig {
    match load_config(path).await {
        Ok(config) => config,
        Err(SteadygetError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            EngineConfig::default()
        }
        Err(e) => {
            warn!("Ignoring options file {}: {}", path.display(), e);
            EngineConfig::default()
        }
    }
}

/// Write options to `path` as pretty JSON
pub async fn save_config(path: &Path, config: &EngineConfig) -> Result<(), SteadygetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).await?;

    Ok(())
}
