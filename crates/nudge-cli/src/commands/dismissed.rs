use clap::Subcommand;
use nudge_core::{DismissalStore, NudgeConfig, NudgeSelector};

use super::{load_catalog, open_store, shared_store, CmdResult};

#[derive(Subcommand)]
pub enum DismissedAction {
    /// Print dismissed identities, one per line
    List {
        #[arg(long)]
        json: bool,
    },
    /// Record an identity as dismissed
    Add {
        identity: String,
    },
    /// Forget every dismissal
    Clear,
}

pub fn run(action: DismissedAction, config: &NudgeConfig) -> CmdResult {
    match action {
        DismissedAction::List { json } => {
            let ids = open_store(config)?.load()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ids)?);
            } else {
                for id in &ids {
                    println!("{id}");
                }
            }
        }
        DismissedAction::Add { identity } => {
            let store = shared_store(config)?;
            let mut selector =
                NudgeSelector::with_store(load_catalog(config)?, store, chrono::Utc::now());
            selector.dismiss(&identity);
            println!("dismissed {identity}");
        }
        DismissedAction::Clear => {
            let store = shared_store(config)?;
            let mut selector =
                NudgeSelector::with_store(load_catalog(config)?, store, chrono::Utc::now());
            selector.reset();
            println!("dismissals cleared");
        }
    }
    Ok(())
}
