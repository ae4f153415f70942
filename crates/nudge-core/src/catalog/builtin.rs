//! Built-in nudge catalog for the chat app.
//!
//! Priorities, highest first: welcome (100), frontier budget (90),
//! idle reminder (80), long session (70), first steps (60), tier explorer
//! (55), widget discovery (50..35), tier hopping (30).
//!
//! Repeatable rules keep triggering for as long as their condition holds and
//! only the top candidate is considered on a tick, so each one either ranks
//! below everything it could starve or only triggers briefly.

use indoc::indoc;

use crate::rules::{
    ActionKind, NudgeAction, NudgeButton, NudgeContent, NudgeRule, RepeatKey, Trigger,
};

pub(super) fn builtin_rules() -> Vec<NudgeRule> {
    vec![
        welcome(),
        frontier_budget(),
        first_steps(),
        tools_dock(),
        image_generation(),
        life_stack(),
        reality_composer(),
        tier_explorer(),
        tier_hopping(),
        long_session(),
        idle_reminder(),
    ]
}

fn dismiss_button(label: &str) -> NudgeButton {
    NudgeButton::new(label, NudgeAction::dismiss())
}

fn tool_button(label: &str, tool: &str) -> NudgeButton {
    NudgeButton::new(label, NudgeAction::with_param(ActionKind::OpenTool, tool))
}

fn tier_button(label: &str, tier: &str) -> NudgeButton {
    NudgeButton::new(label, NudgeAction::with_param(ActionKind::SwitchTier, tier))
}

fn message(text: &str) -> String {
    text.trim_end().replace('\n', " ")
}

fn welcome() -> NudgeRule {
    NudgeRule::new(
        "welcome",
        Trigger::MessageCountEquals { count: 0 },
        NudgeContent::new(
            "wave",
            "Welcome",
            message(indoc! {"
                Everything runs on your own machine by default.
                Ask anything to get started.
            "}),
        )
        .with_button(tool_button("Show me around", "tour"))
        .with_button(dismiss_button("Got it")),
    )
    .with_priority(100)
    .with_delay_ms(2_000)
    .once()
}

fn frontier_budget() -> NudgeRule {
    NudgeRule::new(
        "frontier-budget",
        Trigger::TierIs {
            tier: "frontier".into(),
        },
        NudgeContent::new(
            "gauge",
            "Frontier tier is metered",
            message(indoc! {"
                Frontier requests have a small daily allowance.
                The budget tier handles most questions just as well.
            "}),
        )
        .with_button(tier_button("Use budget tier", "budget"))
        .with_button(dismiss_button("Keep frontier")),
    )
    .with_priority(90)
    .with_delay_ms(500)
    .once()
}

fn first_steps() -> NudgeRule {
    NudgeRule::new(
        "first-steps",
        Trigger::MessageCountEquals { count: 3 },
        NudgeContent::new(
            "sparkles",
            "You're getting the hang of it",
            message(indoc! {"
                Conversations stay in your local vault.
                Open the tools dock to see what else is here.
            "}),
        )
        .with_button(tool_button("Open tools", "tools-dock"))
        .with_button(dismiss_button("Later")),
    )
    .with_priority(60)
    .with_delay_ms(1_500)
    .once()
}

fn tools_dock() -> NudgeRule {
    NudgeRule::new(
        "discover-tools-dock",
        Trigger::MessageCountAtLeast { count: 5 },
        NudgeContent::new(
            "toolbox",
            "Tools dock",
            "Pin the tools you use most and drag the dock wherever it fits.",
        )
        .with_button(tool_button("Open dock", "tools-dock"))
        .with_button(dismiss_button("Dismiss")),
    )
    .with_priority(50)
    .with_delay_ms(1_000)
    .once()
}

fn image_generation() -> NudgeRule {
    NudgeRule::new(
        "discover-image-generation",
        Trigger::MessageCountAtLeast { count: 8 },
        NudgeContent::new(
            "image",
            "Make an image",
            "Describe a scene and the image studio will draft it for you.",
        )
        .with_button(tool_button("Try it", "image-generation"))
        .with_button(dismiss_button("Not now")),
    )
    .with_priority(45)
    .with_delay_ms(1_000)
    .once()
}

fn life_stack() -> NudgeRule {
    NudgeRule::new(
        "discover-life-stack",
        Trigger::all(vec![
            Trigger::MessageCountAtLeast { count: 12 },
            Trigger::SessionAtLeast { minutes: 10 },
        ]),
        NudgeContent::new(
            "layers",
            "Life Stack",
            message(indoc! {"
                Keep goals, habits and notes in one stack
                that the assistant can reference.
            "}),
        )
        .with_button(tool_button("Open Life Stack", "life-stack"))
        .with_button(dismiss_button("Dismiss")),
    )
    .with_priority(40)
    .with_delay_ms(1_000)
    .once()
}

fn reality_composer() -> NudgeRule {
    NudgeRule::new(
        "discover-reality-composer",
        Trigger::MessageCountAtLeast { count: 20 },
        NudgeContent::new(
            "cube",
            "Reality Composer",
            "Sketch a scene from your conversation and arrange it in 3D.",
        )
        .with_button(tool_button("Compose", "reality-composer"))
        .with_button(dismiss_button("Dismiss")),
    )
    .with_priority(35)
    .with_delay_ms(1_000)
    .once()
}

fn tier_explorer() -> NudgeRule {
    NudgeRule::new(
        "tier-explorer",
        Trigger::all(vec![
            Trigger::TierIs {
                tier: "sovereign".into(),
            },
            Trigger::MessageCountAtLeast { count: 10 },
            Trigger::negate(Trigger::TierChangesAtLeast { count: 1 }),
        ]),
        NudgeContent::new(
            "route",
            "Need more speed?",
            message(indoc! {"
                You've been on the local model the whole time.
                The fast tier answers in a fraction of the time.
            "}),
        )
        .with_button(tier_button("Try fast tier", "fast_free"))
        .with_button(dismiss_button("Stay local")),
    )
    .with_priority(55)
    .with_delay_ms(1_000)
    .once()
}

fn tier_hopping() -> NudgeRule {
    NudgeRule::new(
        "tier-hopping",
        Trigger::all(vec![
            Trigger::TierChangesAtLeast { count: 3 },
            Trigger::TierIsNot {
                tier: "sovereign".into(),
            },
        ]),
        NudgeContent::new(
            "shield",
            "Private by default",
            "Switch back to the sovereign tier whenever a question is sensitive.",
        )
        .with_button(tier_button("Go sovereign", "sovereign"))
        .with_button(dismiss_button("Dismiss")),
    )
    .with_priority(30)
    .with_repeat_key(RepeatKey::Tier)
}

fn long_session() -> NudgeRule {
    NudgeRule::new(
        "long-session",
        Trigger::SessionWindow {
            every: 45,
            window: 5,
        },
        NudgeContent::new(
            "coffee",
            "Time for a break?",
            "You've been chatting for a while. Stretch, hydrate, come back fresh.",
        )
        .with_button(dismiss_button("Thanks")),
    )
    .with_priority(70)
    .with_repeat_key(RepeatKey::SessionBucket { minutes: 45 })
}

fn idle_reminder() -> NudgeRule {
    NudgeRule::new(
        "idle-reminder",
        Trigger::IdleAtLeast { minutes: 5 },
        NudgeContent::new(
            "hourglass",
            "Still there?",
            "Pick up where you left off, or start something new.",
        )
        .with_button(NudgeButton::new(
            "Continue",
            NudgeAction::with_param(ActionKind::SendPrompt, "Where were we?"),
        ))
        .with_button(dismiss_button("Dismiss")),
    )
    .with_priority(80)
    .with_repeat_key(RepeatKey::IdleBucket { minutes: 5 })
}
