use std::path::PathBuf;

use clap::Subcommand;
use nudge_core::{Catalog, NudgeConfig, RepeatKey};
use serde::Serialize;

use super::{load_catalog, CmdResult};

#[derive(Subcommand)]
pub enum CatalogAction {
    /// List rules in evaluation order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the catalog as TOML
    Export {
        /// Export the built-in catalog even if a custom one is configured
        #[arg(long)]
        builtin: bool,
    },
    /// Validate a catalog file
    Check {
        path: PathBuf,
    },
}

#[derive(Serialize)]
struct RuleSummary<'a> {
    id: &'a str,
    priority: i32,
    delay_ms: u64,
    once: bool,
    repeat: Option<String>,
    title: &'a str,
}

fn repeat_label(key: Option<&RepeatKey>) -> Option<String> {
    key.map(|key| match key {
        RepeatKey::IdleBucket { minutes } => format!("idle/{minutes}m"),
        RepeatKey::SessionBucket { minutes } => format!("session/{minutes}m"),
        RepeatKey::MessageBucket { every } => format!("messages/{every}"),
        RepeatKey::Tier => "tier".to_string(),
        RepeatKey::Function(f) => format!("fn:{}", f.name()),
    })
}

pub fn run(action: CatalogAction, config: &NudgeConfig) -> CmdResult {
    match action {
        CatalogAction::List { json } => {
            let catalog = load_catalog(config)?;
            let rules: Vec<RuleSummary> = catalog
                .iter()
                .map(|rule| RuleSummary {
                    id: &rule.id,
                    priority: rule.priority,
                    delay_ms: rule.delay_ms,
                    once: rule.once,
                    repeat: repeat_label(rule.repeat_key.as_ref()),
                    title: &rule.content.title,
                })
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&rules)?);
            } else {
                for rule in &rules {
                    let policy = match (&rule.repeat, rule.once) {
                        (Some(repeat), _) => format!("repeat {repeat}"),
                        (None, true) => "once".to_string(),
                        (None, false) => "per process".to_string(),
                    };
                    println!(
                        "{:>4}  {:<28} {:<16} {}",
                        rule.priority, rule.id, policy, rule.title
                    );
                }
            }
        }
        CatalogAction::Export { builtin } => {
            let catalog = if builtin {
                Catalog::builtin()
            } else {
                load_catalog(config)?
            };
            print!("{}", catalog.to_toml_string()?);
        }
        CatalogAction::Check { path } => {
            let catalog = Catalog::load(&path)?;
            println!("ok: {} rules", catalog.len());
        }
    }
    Ok(())
}
