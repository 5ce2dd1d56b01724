use std::time::Duration;

use tracing_subscriber::EnvFilter;
use warden::prelude::*;
use warden::storage::{MemoryStorage, Node, UserRecord};

// ---------------------------------------------------------------------------
// A scripted evening on a small server
// ---------------------------------------------------------------------------

/// Anybody whose name starts with "bot_" is turned away at pre-login.
fn no_bots(event: &mut PreLoginEvent) {
    if event.identity.name.starts_with("bot_") {
        event
            .decision
            .disallow(AdmissionResult::KickOther, "Bots are not welcome here.");
    }
}

/// Kicks "Mallory" at login, after Warden already attached permissions.
fn maintenance(event: &mut LoginEvent<Player>) {
    if event.player.name() == "Mallory" {
        event
            .decision
            .disallow(AdmissionResult::KickOther, "Down for maintenance.");
    }
}

fn report(name: &str, outcome: &LoginOutcome) {
    match outcome {
        LoginOutcome::Joined(player) => {
            tracing::info!(%name, op = player.is_op(), "joined");
        }
        LoginOutcome::Denied {
            phase,
            result,
            message,
        } => {
            tracing::info!(%name, %phase, %result, %message, "kicked");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_json_str(
        r#"{
            "max_players": 3,
            "ops_enabled": false,
            "groups": ["default", "builder"],
            "warden": { "auto_op": true, "cleanup_delay_ticks": 40 }
        }"#,
    )?;

    let storage = MemoryStorage::new();
    let alex = PlayerId::random();
    let mut record = UserRecord::new(alex, "Alex");
    record.groups.insert("builder".into());
    record.nodes.push(Node::global("warden.autoop", true));
    record.nodes.push(Node::in_world("warden.autoop", false, "creative"));
    storage.insert(record);

    let server = ServerBuilder::new()
        .config(config)
        .on_pre_login(EventPriority::Normal, no_bots)
        .on_login(EventPriority::High, maintenance)
        .build(storage);

    let steve = PlayerId::random();
    let mallory = PlayerId::random();
    let bot = PlayerId::random();
    let late = PlayerId::random();
    let extra = PlayerId::random();

    for (id, name) in [
        (alex, "Alex"),
        (steve, "Steve"),
        (bot, "bot_3000"),
        (mallory, "Mallory"),
        (extra, "Eve"),
        (late, "Zed"),
    ] {
        let outcome = server.connect(id, name).await?;
        report(name, &outcome);
    }

    // Auto-op follows Alex between worlds; /op is disabled.
    server.change_world(alex, "creative").await?;
    server.change_world(alex, "world").await?;
    server.dispatch_command(steve, "/op Steve").await?;
    server
        .dispatch_command(alex, "/warden user Alex setprimarygroup builder")
        .await?;

    // Zed was turned away for a full server. Make room and let them retry
    // inside the cleanup window.
    server.disconnect(steve).await?;
    let outcome = server.connect(late, "Zed").await?;
    report("Zed", &outcome);

    tokio::time::sleep(Duration::from_millis(500)).await;
    let info = server.info().await?;
    let stats = server.stats();
    tracing::info!(
        tick = info.tick,
        online = info.online,
        attached = stats.attached,
        teardowns = stats.teardowns,
        cleanups_cancelled = stats.cleanups_cancelled,
        "done"
    );

    server.shutdown().await;
    Ok(())
}
