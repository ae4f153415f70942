use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use clap::Args;
use nudge_core::{
    session::DEFAULT_TIER, DismissalStore, MemoryStore, NudgeConfig, NudgeSelector,
};
use serde::Serialize;
use tracing::warn;

use super::{load_catalog, open_store, CmdResult};

#[derive(Args)]
pub struct SimulateArgs {
    /// Messages sent so far
    #[arg(long, default_value_t = 0)]
    messages: u64,
    /// Minutes since the last interaction
    #[arg(long, default_value_t = 0)]
    idle_minutes: i64,
    /// Minutes since the session started (at least `idle_minutes`)
    #[arg(long, default_value_t = 0)]
    session_minutes: i64,
    /// Current tier
    #[arg(long)]
    tier: Option<String>,
    /// Number of tier changes so far
    #[arg(long, default_value_t = 0)]
    tier_changes: u32,
    /// Record the result in the dismissal store
    #[arg(long)]
    persist: bool,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Outcome {
    rule_id: Option<String>,
    identity: Option<String>,
    priority: Option<i32>,
    delay_ms: Option<u64>,
    title: Option<String>,
    message: Option<String>,
}

fn minutes_before(now: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>, String> {
    Duration::try_minutes(minutes)
        .and_then(|offset| now.checked_sub_signed(offset))
        .ok_or_else(|| format!("{minutes} minutes is out of range"))
}

pub fn run(args: SimulateArgs, config: &NudgeConfig) -> CmdResult {
    if args.idle_minutes < 0 || args.session_minutes < 0 {
        return Err("minutes must not be negative".into());
    }

    let file_store = open_store(config)?;
    let store: Arc<dyn DismissalStore> = if args.persist {
        Arc::new(file_store)
    } else {
        // Honor existing dismissals without writing to them.
        let dismissed = file_store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load dismissed nudges; starting with an empty record");
            Default::default()
        });
        Arc::new(MemoryStore::with_ids(dismissed))
    };

    let now = Utc::now();
    let session_start = minutes_before(now, args.session_minutes.max(args.idle_minutes))?;
    let last_activity = minutes_before(now, args.idle_minutes)?;
    let mut selector = NudgeSelector::with_store(load_catalog(config)?, store, session_start);

    let tier = args.tier.as_deref().unwrap_or(DEFAULT_TIER);
    let changes = match (args.tier_changes, &args.tier) {
        (0, Some(t)) if t != DEFAULT_TIER => 1,
        (n, _) => n,
    };
    for _ in 0..changes {
        selector.track_tier_change_at(tier, last_activity);
    }
    for _ in 0..args.messages {
        selector.track_message_at(last_activity);
    }
    selector.track_interaction_at(last_activity);

    let selection = selector.check_nudges_at(now);
    if let Some(selection) = &selection {
        // Records once-rules when --persist is set.
        selector.surface_at(selection, now);
    }

    let outcome = Outcome {
        rule_id: selection.as_ref().map(|s| s.rule_id.clone()),
        identity: selection.as_ref().map(|s| s.identity.clone()),
        priority: selection.as_ref().map(|s| s.priority),
        delay_ms: selection.as_ref().map(|s| s.delay_ms),
        title: selection.as_ref().map(|s| s.content.title.clone()),
        message: selection.as_ref().map(|s| s.content.message.clone()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        match selection {
            Some(s) => {
                println!("{} ({}, priority {})", s.identity, s.rule_id, s.priority);
                println!("  {} {}", s.content.icon, s.content.title);
                println!("  {}", s.content.message);
            }
            None => println!("no nudge"),
        }
    }
    Ok(())
}
