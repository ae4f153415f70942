mod config;
mod dismissals;

pub use config::{CatalogConfig, EngineConfig, LoggingConfig, NudgeConfig, StorageConfig};
pub use dismissals::{DismissalStore, JsonFileStore, MemoryStore, DISMISSED_FILE};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/nudge[-dev]/` based on NUDGE_ENV.
///
/// Set NUDGE_ENV=dev to use the development data directory, or
/// NUDGE_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("NUDGE_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("NUDGE_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("nudge-dev")
            } else {
                base_dir.join("nudge")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
