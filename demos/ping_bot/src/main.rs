//! Ping Bot Example
//!
//! A small bot showing the main pieces of Hookline:
//!
//! - `/ping`: a plain reply, with a per-user cooldown
//! - `/confirm`: buttons answered through an interaction waiter
//! - `/fruit`: an option with autocomplete
//! - `Inspect`: a user context-menu command
//! - `confirm:*`: a regex component route catching stale buttons
//!
//! # Usage
//!
//! Copy `hookline.example.toml` to `hookline.toml`, fill in the credentials
//! and point the application's interactions endpoint URL at the server.
//!
//! ```bash
//! cargo run --package ping-bot -- --profile development
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use hookline::prelude::*;
use serde_json::{Value, json};
use tracing::{info, warn};

const FRUITS: [&str; 8] = [
    "apple", "apricot", "banana", "blueberry", "cherry", "grape", "mango", "melon",
];

#[derive(Parser)]
#[command(about = "A small interactions bot")]
struct Args {
    /// Configuration file to load instead of searching for hookline.toml.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile.
    #[arg(short, long)]
    profile: Option<String>,
}

// ============================================================================
// Commands
// ============================================================================

async fn ping(_ctx: InteractionContext, _args: Arguments) -> Ack {
    Ack::message("Pong!")
}

fn confirm_buttons() -> Value {
    json!({
        "type": 1,
        "components": [
            {"type": 2, "style": 3, "label": "Yes", "custom_id": "confirm:yes"},
            {"type": 2, "style": 4, "label": "No", "custom_id": "confirm:no"},
        ],
    })
}

/// Asks a question, then waits for the invoking user to click a button.
async fn confirm(ctx: InteractionContext, _args: Arguments) -> Ack {
    let allowed: Vec<Snowflake> = ctx.author_id().into_iter().collect();
    let prompt = MessageData::text("Are you sure?").component(confirm_buttons());

    Ack::message(prompt).then(async move {
        let answered = ctx
            .wait_for_interaction(allowed, Duration::from_secs(30), |click: InteractionContext| async move {
                let text = match click.custom_id() {
                    Some("confirm:yes") => "Confirmed.",
                    _ => "Cancelled.",
                };
                Ack::update(text)
            })
            .await;

        if answered.is_none() {
            ctx.followup()?
                .edit_original_response(&MessageData::text("Timed out."))
                .await?;
        }
        Ok::<_, HandlerError>(())
    })
}

async fn fruit(_ctx: InteractionContext, args: Arguments) -> Ack {
    match args.str("name") {
        Some(name) => Ack::message(format!("You picked {name}.")),
        None => Ack::ephemeral("Pick a fruit."),
    }
}

async fn suggest_fruit(_ctx: InteractionContext, current: String) -> HandlerResult<Vec<Choice>> {
    let current = current.to_lowercase();
    Ok(FRUITS
        .iter()
        .filter(|fruit| fruit.starts_with(&current))
        .map(|fruit| Choice::from(*fruit))
        .collect())
}

async fn inspect(ctx: InteractionContext, _args: Arguments) -> HandlerResult<Ack> {
    let target = ctx
        .target()
        .ok_or_else(|| HandlerError::other("no target user"))?;
    let name = target
        .get("username")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let id = target.get("id").and_then(Value::as_str).unwrap_or("?");
    Ok(Ack::ephemeral(format!("{name} has id {id}.")))
}

// ============================================================================
// Components and listeners
// ============================================================================

/// Buttons whose waiter has already finished end up here.
async fn stale_confirm(_ctx: InteractionContext) -> Ack {
    Ack::ephemeral("This prompt has expired.")
}

async fn log_error(event: ErrorEvent) {
    warn!(
        interaction = %event.ctx.interaction().id,
        error = %event.error,
        "Interaction failed"
    );
}

async fn log_ping(_event: PingEvent) {
    info!("Endpoint verified by the platform");
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = HooklineRuntime::builder();
    if let Some(path) = args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build()?;

    let dispatcher = runtime
        .dispatcher()
        .command(
            Command::new("ping", "Replies with pong")
                .cooldown(1, Duration::from_secs(5), BucketType::User)
                .handler(ping),
        )
        .command(Command::new("confirm", "Asks for confirmation").handler(confirm))
        .command(
            Command::new("fruit", "Picks a fruit")
                .option(
                    OptionSpec::string("name", "The fruit")
                        .required()
                        .autocomplete(suggest_fruit),
                )
                .handler(fruit),
        )
        .command(Command::user("Inspect").handler(inspect))
        .component_regex("confirm:", stale_confirm)?
        .on_interaction_error(log_error)
        .on_ping(log_ping)
        .build();

    runtime.run(dispatcher).await?;
    Ok(())
}
