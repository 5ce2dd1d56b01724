//! Integration tests for the full server: pre-login on the caller's task,
//! login on the main thread, third-party observers in between.
//!
//! All tests run with paused time, so the main thread ticks as fast as the
//! runtime goes idle and `wait_ticks` is deterministic.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use warden::prelude::*;
use warden::protocol::CommandEvent;
use warden::storage::{MemoryStorage, Node, UserRecord};
use warden::session::MAX_CLEANUP_DELAY_TICKS;
use warden::{ALREADY_CONNECTED_MESSAGE, BANNED_MESSAGE, NOT_WHITELISTED_MESSAGE, SERVER_FULL_MESSAGE};

fn server() -> Server<MemoryStorage> {
    ServerBuilder::new().build(MemoryStorage::new())
}

fn server_with(config: ServerConfig) -> Server<MemoryStorage> {
    ServerBuilder::new().config(config).build(MemoryStorage::new())
}

fn is_loaded(server: &Server<MemoryStorage>, id: &PlayerId) -> bool {
    server.store().get_loaded_user(id).is_some()
}

fn record_with(id: PlayerId, name: &str, nodes: Vec<Node>) -> UserRecord {
    let mut record = UserRecord::new(id, name);
    record.nodes = nodes;
    record
}

// ---------------------------------------------------------------------------
// Normal sessions
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_connect_then_disconnect_releases_data() {
    let server = server();
    let id = PlayerId::random();

    let outcome = server.connect(id, "Alex").await.unwrap();
    let player = outcome.player().cloned().expect("joined");
    assert!(player.is_attached());
    assert!(is_loaded(&server, &id));
    assert_eq!(server.info().await.unwrap().online, 1);

    assert!(server.disconnect(id).await.unwrap());
    assert!(!server.disconnect(id).await.unwrap(), "second disconnect is a no-op");

    assert!(!player.is_attached());
    assert!(!is_loaded(&server, &id));
    let stats = server.stats();
    assert_eq!((stats.attached, stats.detached, stats.teardowns), (1, 1, 1));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_quit_starts_fresh() {
    let server = server();
    let id = PlayerId::random();

    server.connect(id, "Alex").await.unwrap();
    server.disconnect(id).await.unwrap();
    let outcome = server.connect(id, "Alex").await.unwrap();

    assert!(outcome.is_joined());
    assert_eq!(server.store().storage().load_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_connects_all_join() {
    let server = Arc::new(server());
    let ids: Vec<PlayerId> = (0..10).map(|_| PlayerId::random()).collect();

    let tasks: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let server = Arc::clone(&server);
            let id = *id;
            tokio::spawn(async move { server.connect(id, &format!("player{i}")).await })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().unwrap().is_joined());
    }

    assert_eq!(server.info().await.unwrap().online, 10);
    assert_eq!(server.stats().attached, 10);
    assert!(ids.iter().all(|id| is_loaded(&server, id)));
}

#[tokio::test(start_paused = true)]
async fn test_quit_observers_still_see_permissions() {
    let saw_attached = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&saw_attached);
    let server = ServerBuilder::new()
        .on_quit(EventPriority::Monitor, move |event: &QuitEvent<Player>| {
            flag.store(event.player.is_attached(), Ordering::SeqCst);
        })
        .build(MemoryStorage::new());
    let id = PlayerId::random();

    server.connect(id, "Alex").await.unwrap();
    server.disconnect(id).await.unwrap();

    assert!(saw_attached.load(Ordering::SeqCst));
}

// ---------------------------------------------------------------------------
// Host checks
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_banned_player_denied_without_loading() {
    let id = PlayerId::random();
    let server = ServerBuilder::new().ban(id).build(MemoryStorage::new());

    let outcome = server.connect(id, "Alex").await.unwrap();

    assert!(matches!(
        outcome,
        LoginOutcome::Denied { phase: Phase::PreLogin, result: AdmissionResult::KickBanned, .. }
    ));
    assert_eq!(outcome.kick_message(), Some(BANNED_MESSAGE));
    assert_eq!(server.store().storage().load_count(), 0);
    assert_eq!(server.stats().invariant_violations, 0);
}

#[tokio::test(start_paused = true)]
async fn test_whitelist_denies_strangers() {
    let friend = PlayerId::random();
    let server = ServerBuilder::new()
        .whitelist([friend])
        .build(MemoryStorage::new());

    let outcome = server.connect(PlayerId::random(), "Stranger").await.unwrap();
    assert_eq!(outcome.kick_message(), Some(NOT_WHITELISTED_MESSAGE));
    assert!(server.connect(friend, "Friend").await.unwrap().is_joined());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_connect_denied_and_original_untouched() {
    let server = server();
    let id = PlayerId::random();
    let first = server.connect(id, "Alex").await.unwrap();

    let second = server.connect(id, "Alex").await.unwrap();
    assert_eq!(second.denied_at(), Some(Phase::PreLogin));
    assert_eq!(second.kick_message(), Some(ALREADY_CONNECTED_MESSAGE));

    server.wait_ticks(100).await.unwrap();
    assert!(is_loaded(&server, &id));
    assert!(first.player().unwrap().is_attached());
}

#[tokio::test(start_paused = true)]
async fn test_storage_not_ready_denies_everyone() {
    let server = server();
    server.store().storage().set_accepting_logins(false);

    let outcome = server.connect(PlayerId::random(), "Alex").await.unwrap();

    assert_eq!(outcome.denied_at(), Some(Phase::PreLogin));
    assert_eq!(outcome.kick_message(), Some(Message::LoadingError.to_string().as_str()));
}

#[tokio::test(start_paused = true)]
async fn test_load_failure_denied_at_login() {
    let server = server();
    let id = PlayerId::random();
    server.store().storage().fail_loads_for(id);

    let outcome = server.connect(id, "Alex").await.unwrap();

    assert_eq!(outcome.denied_at(), Some(Phase::Login));
    assert_eq!(outcome.kick_message(), Some(Message::LoadingError.to_string().as_str()));
    assert_eq!(server.stats().cleanups_scheduled, 0);
}

/// A full server denies at login after pre-login loaded the data. The
/// release is deferred by `cleanup_delay_ticks`.
#[tokio::test(start_paused = true)]
async fn test_full_server_defers_release() {
    let server = server_with(ServerConfig {
        max_players: 1,
        ..ServerConfig::default()
    });
    let online = PlayerId::random();
    let late = PlayerId::random();
    server.connect(online, "Alex").await.unwrap();

    let outcome = server.connect(late, "Steve").await.unwrap();
    assert!(matches!(
        outcome,
        LoginOutcome::Denied { phase: Phase::Login, result: AdmissionResult::KickFull, .. }
    ));
    assert_eq!(outcome.kick_message(), Some(SERVER_FULL_MESSAGE));
    assert!(server.coordinator().has_pending_cleanup(&late));

    server.wait_ticks(30).await.unwrap();
    assert!(is_loaded(&server, &late), "still inside the reconnect window");

    server.wait_ticks(31).await.unwrap();
    assert!(!is_loaded(&server, &late));
    assert!(is_loaded(&server, &online));
    assert_eq!(server.stats().teardowns, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_inside_window_cancels_release() {
    let server = server_with(ServerConfig {
        max_players: 1,
        ..ServerConfig::default()
    });
    let online = PlayerId::random();
    let late = PlayerId::random();
    server.connect(online, "Alex").await.unwrap();
    server.connect(late, "Steve").await.unwrap();
    server.wait_ticks(10).await.unwrap();

    server.disconnect(online).await.unwrap();
    let outcome = server.connect(late, "Steve").await.unwrap();
    assert!(outcome.is_joined());

    server.wait_ticks(100).await.unwrap();
    assert!(is_loaded(&server, &late));
    assert!(outcome.player().unwrap().is_attached());
    let stats = server.stats();
    assert_eq!(stats.cleanups_cancelled, 1);
    assert_eq!(stats.teardowns, 1, "only the quit of the first player");
}

// ---------------------------------------------------------------------------
// Third-party observers
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_pre_login_denied_by_observer_released_immediately() {
    let server = ServerBuilder::new()
        .on_pre_login(EventPriority::Normal, |event: &mut PreLoginEvent| {
            event.decision.disallow(AdmissionResult::KickOther, "Region locked");
        })
        .build(MemoryStorage::new());
    let id = PlayerId::random();

    let outcome = server.connect(id, "Alex").await.unwrap();
    assert_eq!(outcome.kick_message(), Some("Region locked"));
    assert!(!is_loaded(&server, &id));
    assert!(!server.coordinator().has_pending_cleanup(&id));

    server.wait_ticks(100).await.unwrap();
    let stats = server.stats();
    assert_eq!(stats.teardowns, 1, "released exactly once");
    assert_eq!(stats.cleanups_scheduled, 0);
}

#[tokio::test(start_paused = true)]
async fn test_login_vetoed_by_observer_torn_down_immediately() {
    let server = ServerBuilder::new()
        .on_login(EventPriority::High, |event: &mut LoginEvent<Player>| {
            event.decision.disallow(AdmissionResult::KickOther, "Maintenance");
        })
        .build(MemoryStorage::new());
    let id = PlayerId::random();

    let outcome = server.connect(id, "Alex").await.unwrap();

    assert_eq!(outcome.denied_at(), Some(Phase::Login));
    assert!(!is_loaded(&server, &id));
    assert!(!server.coordinator().has_pending_cleanup(&id));
    let stats = server.stats();
    assert_eq!((stats.attached, stats.detached, stats.teardowns), (1, 1, 1));
    assert_eq!(server.info().await.unwrap().online, 0);
}

#[tokio::test(start_paused = true)]
async fn test_pre_login_reallowed_by_observer_forced_denied() {
    let server = ServerBuilder::new()
        .on_pre_login(EventPriority::Highest, |event: &mut PreLoginEvent| {
            event.decision.allow();
        })
        .build(MemoryStorage::new());
    server.store().storage().set_accepting_logins(false);

    let outcome = server.connect(PlayerId::random(), "Alex").await.unwrap();

    assert_eq!(outcome.denied_at(), Some(Phase::PreLogin));
    assert_eq!(server.stats().invariant_violations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_login_reallowed_by_observer_forced_denied() {
    let server = ServerBuilder::new()
        .on_login(EventPriority::Normal, |event: &mut LoginEvent<Player>| {
            event.decision.allow();
        })
        .build(MemoryStorage::new());
    let id = PlayerId::random();
    server.store().storage().fail_loads_for(id);

    let outcome = server.connect(id, "Alex").await.unwrap();

    assert_eq!(outcome.denied_at(), Some(Phase::Login));
    assert_eq!(outcome.kick_message(), Some(Message::LoadingError.to_string().as_str()));
    assert_eq!(server.stats().invariant_violations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_full_server_reallowed_by_observer_still_released() {
    let server = ServerBuilder::new()
        .config(ServerConfig {
            max_players: 0,
            ..ServerConfig::default()
        })
        .on_login(EventPriority::Normal, |event: &mut LoginEvent<Player>| {
            event.decision.allow();
        })
        .build(MemoryStorage::new());
    let id = PlayerId::random();

    let outcome = server.connect(id, "Alex").await.unwrap();

    assert_eq!(outcome.denied_at(), Some(Phase::Login));
    assert!(server.coordinator().has_pending_cleanup(&id));
    server.wait_ticks(61).await.unwrap();
    assert!(!is_loaded(&server, &id));
    let stats = server.stats();
    assert_eq!(stats.teardowns, 1);
    assert_eq!(stats.invariant_violations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_observer_cannot_change_outcome() {
    let server = ServerBuilder::new()
        .on_login(EventPriority::Monitor, |event: &mut LoginEvent<Player>| {
            event.decision.disallow(AdmissionResult::KickOther, "too late");
        })
        .build(MemoryStorage::new());

    let outcome = server.connect(PlayerId::random(), "Alex").await.unwrap();

    assert!(outcome.is_joined());
}

// ---------------------------------------------------------------------------
// Auto-op and world changes
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_auto_op_follows_world() {
    let server = server_with(ServerConfig {
        warden: WardenConfig {
            auto_op: true,
            ..WardenConfig::default()
        },
        ..ServerConfig::default()
    });
    let id = PlayerId::random();
    server.store().storage().insert(record_with(
        id,
        "Alex",
        vec![
            Node::global("warden.autoop", true),
            Node::in_world("warden.autoop", false, "creative"),
        ],
    ));

    let player = server.connect(id, "Alex").await.unwrap().player().cloned().unwrap();
    assert!(player.is_op());

    assert!(server.change_world(id, "creative").await.unwrap());
    assert_eq!(player.world(), "creative");
    assert!(!player.is_op());

    server.change_world(id, "world").await.unwrap();
    assert!(player.is_op());

    server.disconnect(id).await.unwrap();
    assert!(!player.is_op());
}

#[tokio::test(start_paused = true)]
async fn test_change_world_offline_player_is_false() {
    let server = server();
    assert!(!server.change_world(PlayerId::random(), "nether").await.unwrap());
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_op_command_blocked_when_ops_disabled() {
    let server = server_with(ServerConfig {
        ops_enabled: false,
        ..ServerConfig::default()
    });
    let id = PlayerId::random();
    let player = server.connect(id, "Alex").await.unwrap().player().cloned().unwrap();

    let outcome = server.dispatch_command(id, "/minecraft:op Alex").await.unwrap();

    assert_eq!(outcome, Some(CommandOutcome::Cancelled));
    assert_eq!(player.last_message(), Some(Message::OpDisabled.to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_command_observer_runs_after_filter() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let server = ServerBuilder::new()
        .on_command(EventPriority::Normal, move |event: &mut CommandEvent<Player>| {
            counter.fetch_add(1, Ordering::SeqCst);
            if event.message.starts_with("/spawn") {
                event.cancelled = true;
            }
        })
        .build(MemoryStorage::new());
    let id = PlayerId::random();
    server.connect(id, "Alex").await.unwrap();

    assert_eq!(
        server.dispatch_command(id, "/spawn").await.unwrap(),
        Some(CommandOutcome::Cancelled)
    );
    assert_eq!(
        server.dispatch_command(id, "/op Alex").await.unwrap(),
        Some(CommandOutcome::Unhandled),
        "ops are enabled by default"
    );
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(server.dispatch_command(PlayerId::random(), "/help").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_getuuid_with_permission() {
    let server = server();
    let sender = PlayerId::random();
    let target = PlayerId::random();
    server.store().storage().insert(record_with(
        sender,
        "Alex",
        vec![Node::global(warden::PERMISSION_USER_GETUUID, true)],
    ));
    server.connect(sender, "Alex").await.unwrap();
    server.connect(target, "Steve").await.unwrap();

    let outcome = server
        .dispatch_command(sender, "/warden user steve getuuid")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Some(CommandOutcome::Replied(Message::UserUuid {
            name: "Steve".into(),
            uuid: target.to_string(),
        }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_getuuid_without_permission_refused() {
    let server = server();
    let id = PlayerId::random();
    let player = server.connect(id, "Alex").await.unwrap().player().cloned().unwrap();

    let outcome = server
        .dispatch_command(id, "/warden user Alex getuuid")
        .await
        .unwrap();

    assert_eq!(outcome, Some(CommandOutcome::Replied(Message::NoPermission)));
    assert_eq!(player.last_message(), Some(Message::NoPermission.to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_setprimarygroup_sets_and_saves() {
    let server = server_with(ServerConfig {
        groups: vec!["default".into(), "vip".into()],
        ..ServerConfig::default()
    });
    let admin = PlayerId::random();
    let target = PlayerId::random();
    let mut record = UserRecord::new(target, "Steve");
    record.groups.insert("vip".into());
    server.store().storage().insert(record);

    let admin_player = server.connect(admin, "Alex").await.unwrap().player().cloned().unwrap();
    admin_player.set_op(true);
    server.connect(target, "Steve").await.unwrap();

    let outcome = server
        .dispatch_command(admin, "/warden user Steve setprimarygroup VIP")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Some(CommandOutcome::Replied(Message::PrimaryGroupSuccess {
            user: "Steve".into(),
            group: "vip".into(),
        }))
    );

    server.wait_ticks(1).await.unwrap();
    let saved = server.store().storage().record(&target).unwrap();
    assert_eq!(saved.primary_group, "vip");
    assert_eq!(server.store().get_loaded_user(&target).unwrap().primary_group(), "vip");

    let again = server
        .dispatch_command(admin, "/warden user Steve setprimarygroup vip")
        .await
        .unwrap();
    assert_eq!(again, Some(CommandOutcome::Replied(Message::PrimaryGroupAlreadyHas)));
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_oversized_cleanup_delay_is_capped() {
    let config = ServerConfig::from_json_str(
        r#"{ "max_players": 0, "warden": { "cleanup_delay_ticks": 18446744073709551615 } }"#,
    )
    .unwrap();
    assert_eq!(config.warden.cleanup_delay_ticks, MAX_CLEANUP_DELAY_TICKS);
    let server = server_with(config);
    let id = PlayerId::random();
    server.wait_ticks(5).await.unwrap();

    let outcome = server.connect(id, "Alex").await.unwrap();
    assert_eq!(outcome.denied_at(), Some(Phase::Login));
    server.wait_ticks(5).await.unwrap();

    let again = server.connect(PlayerId::random(), "Steve").await.unwrap();
    assert_eq!(again.denied_at(), Some(Phase::Login), "main thread still running");
    assert_eq!(server.info().await.unwrap().pending_tasks, 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_runs_pending_releases() {
    let server = server_with(ServerConfig {
        max_players: 0,
        ..ServerConfig::default()
    });
    let id = PlayerId::random();
    server.connect(id, "Alex").await.unwrap();
    assert!(server.coordinator().has_pending_cleanup(&id));

    server.shutdown().await;

    assert!(!is_loaded(&server, &id));
    assert!(!server.coordinator().has_pending_cleanup(&id));
    assert_eq!(server.stats().teardowns, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_quits_everyone() {
    let server = server();
    let a = PlayerId::random();
    let b = PlayerId::random();
    server.connect(a, "Alex").await.unwrap();
    server.connect(b, "Steve").await.unwrap();

    server.shutdown().await;

    assert!(server.store().users().is_empty());
    assert_eq!(server.stats().teardowns, 2);
    assert!(matches!(
        server.connect(a, "Alex").await,
        Err(ServerError::MainThreadStopped)
    ));
    assert!(server.store().users().is_empty(), "nothing left behind by the failed connect");
}
