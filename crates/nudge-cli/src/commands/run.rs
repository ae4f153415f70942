//! Interactive host loop.
//!
//! Drives a [`NudgeRunner`] and reads one host signal per stdin line.
//! Every engine event is printed to stdout as a JSON line.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Args;
use nudge_core::{
    lock_selector, ActionDispatcher, ActionKind, Catalog, DismissalStore, NudgeAction,
    NudgeConfig, NudgeObserver, NudgeRunner, NudgeSelector, Resolution, SharedSelector,
    SurfacedNudge,
};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing::info;

use super::{load_catalog, shared_store, CmdResult};

#[derive(Args)]
pub struct RunArgs {
    /// Stop after this many seconds instead of waiting for `quit` or EOF
    #[arg(long)]
    duration_secs: Option<u64>,
}

/// One line of host input.
#[derive(Debug, PartialEq, Eq)]
enum HostCommand {
    Message,
    Tier(String),
    Touch,
    Dismiss(String),
    Act { identity: String, action: NudgeAction },
    Status,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<HostCommand>, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };
    let mut arg = |what: &str| {
        parts
            .next()
            .map(str::to_string)
            .ok_or_else(|| format!("{verb}: missing {what}"))
    };

    let command = match verb {
        "msg" => HostCommand::Message,
        "tier" => HostCommand::Tier(arg("tier name")?),
        "touch" => HostCommand::Touch,
        "dismiss" => HostCommand::Dismiss(arg("identity")?),
        "act" => {
            let identity = arg("identity")?;
            let kind = ActionKind::parse(&arg("action kind")?);
            let rest: Vec<&str> = parts.collect();
            let parameter = (!rest.is_empty()).then(|| rest.join(" "));
            HostCommand::Act {
                identity,
                action: NudgeAction::new(kind, parameter),
            }
        }
        "status" => HostCommand::Status,
        "quit" | "exit" => HostCommand::Quit,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(Some(command))
}

/// Prints surfaced, resolved and dispatched events.
struct EventPrinter;

impl NudgeObserver for EventPrinter {
    fn on_surfaced(&self, nudge: &SurfacedNudge) {
        println!("{}", json!({ "event": "surfaced", "nudge": nudge }));
    }

    fn on_resolved(&self, identity: &str, resolution: &Resolution) {
        println!(
            "{}",
            json!({ "event": "resolved", "identity": identity, "resolution": resolution })
        );
    }
}

impl ActionDispatcher for EventPrinter {
    fn dispatch(&self, identity: &str, action: &NudgeAction) {
        println!(
            "{}",
            json!({ "event": "dispatch", "identity": identity, "action": action })
        );
    }
}

fn apply(selector: &SharedSelector, command: HostCommand) {
    let mut selector = lock_selector(selector);
    match command {
        HostCommand::Message => selector.track_message(),
        HostCommand::Tier(tier) => selector.track_tier_change(&tier),
        HostCommand::Touch => selector.track_interaction(),
        HostCommand::Dismiss(identity) => selector.dismiss(&identity),
        HostCommand::Act { identity, action } => {
            selector.handle_action(&identity, &action);
            // The host owns tier switching.
            if let (ActionKind::SwitchTier, Some(tier)) = (action.kind, &action.parameter) {
                selector.track_tier_change(tier);
            }
        }
        HostCommand::Status => {
            println!("{}", json!({ "event": "status", "state": selector.state() }));
        }
        HostCommand::Quit => {}
    }
}

pub fn run(args: RunArgs, config: &NudgeConfig) -> CmdResult {
    if !config.engine.enabled {
        println!("nudges are disabled (engine.enabled = false)");
        return Ok(());
    }

    let catalog = load_catalog(config)?;
    let store = shared_store(config)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(drive(args, config, catalog, store));
    // A pending stdin read would otherwise hold the runtime open.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn drive(
    args: RunArgs,
    config: &NudgeConfig,
    catalog: Catalog,
    store: Arc<dyn DismissalStore>,
) -> CmdResult {
    let printer = Arc::new(EventPrinter);
    let selector = NudgeSelector::with_store(catalog, store, Utc::now())
        .with_observer(printer.clone())
        .with_dispatcher(printer);
    let mut runner = NudgeRunner::new(selector, &config.engine);
    runner.start();
    let shared = runner.selector();
    info!(
        tick_secs = config.engine.tick_interval_secs,
        grace_secs = config.engine.initial_delay_secs,
        "Nudge runner started"
    );

    let deadline = args
        .duration_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match deadline {
            Some(deadline) => tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::time::sleep_until(deadline) => break,
            },
            None => lines.next_line().await?,
        };

        let Some(line) = line else {
            // EOF: keep ticking until the deadline, if any.
            if let Some(deadline) = deadline {
                tokio::time::sleep_until(deadline).await;
            }
            break;
        };

        match parse_command(&line) {
            Ok(Some(HostCommand::Quit)) => break,
            Ok(Some(command)) => apply(&shared, command),
            Ok(None) => {}
            Err(message) => eprintln!("{message}"),
        }
    }

    runner.stop();
    info!("Nudge runner stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tracking_commands() {
        assert_eq!(parse_command("msg"), Ok(Some(HostCommand::Message)));
        assert_eq!(
            parse_command("tier frontier"),
            Ok(Some(HostCommand::Tier("frontier".into())))
        );
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn parses_actions_with_optional_parameter() {
        assert_eq!(
            parse_command("act idle-reminder-1 send_prompt"),
            Ok(Some(HostCommand::Act {
                identity: "idle-reminder-1".into(),
                action: NudgeAction::new(ActionKind::SendPrompt, None),
            }))
        );
        assert_eq!(
            parse_command("act tier-explorer switch_tier frontier"),
            Ok(Some(HostCommand::Act {
                identity: "tier-explorer".into(),
                action: NudgeAction::with_param(ActionKind::SwitchTier, "frontier"),
            }))
        );
        assert_eq!(
            parse_command("act idle-reminder-1 send_prompt  Where were we?"),
            Ok(Some(HostCommand::Act {
                identity: "idle-reminder-1".into(),
                action: NudgeAction::with_param(ActionKind::SendPrompt, "Where were we?"),
            }))
        );
        let Ok(Some(HostCommand::Act { action, .. })) = parse_command("act x launch") else {
            panic!("expected act");
        };
        assert_eq!(action.kind, ActionKind::Unknown);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            parse_command("dismiss"),
            Err("dismiss: missing identity".to_string())
        );
        assert!(parse_command("fly away").is_err());
    }

    #[test]
    fn switch_tier_action_updates_session() {
        let selector: SharedSelector = Arc::new(std::sync::Mutex::new(NudgeSelector::new(
            Catalog::empty(),
            nudge_core::MemoryStore::new(),
        )));
        apply(
            &selector,
            HostCommand::Act {
                identity: "tier-explorer".into(),
                action: NudgeAction::with_param(ActionKind::SwitchTier, "frontier"),
            },
        );
        let selector = lock_selector(&selector);
        assert_eq!(selector.state().current_tier, "frontier");
        assert!(selector.is_dismissed("tier-explorer"));
    }
}
