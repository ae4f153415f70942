pub mod catalog;
pub mod config;
pub mod dismissed;
pub mod run;
pub mod simulate;

use std::sync::Arc;

use nudge_core::{Catalog, DismissalStore, JsonFileStore, NudgeConfig};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Dismissal store configured for this installation.
pub fn open_store(config: &NudgeConfig) -> Result<JsonFileStore, Box<dyn std::error::Error>> {
    Ok(JsonFileStore::with_path(config.dismissed_path()?))
}

pub fn shared_store(config: &NudgeConfig) -> Result<Arc<dyn DismissalStore>, Box<dyn std::error::Error>> {
    Ok(Arc::new(open_store(config)?))
}

pub fn load_catalog(config: &NudgeConfig) -> Result<Catalog, Box<dyn std::error::Error>> {
    Ok(config.load_catalog()?)
}
