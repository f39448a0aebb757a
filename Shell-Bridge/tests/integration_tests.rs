
use shell_bridge::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_helpers::*;
use tracing_subscriber::prelude::*;

fn relay_over(registry: &WindowRegistry) -> Arc<LogRelay> {
    Arc::new(LogRelay::new(Arc::new(Bridge::new(registry.clone()))))
}

fn messages(entries: &[LogEntry]) -> Vec<(LogLevel, String)> {
    entries.iter().map(|e| (e.level, e.message.clone())).collect()
}

// ============================================================================
// Push fan-out
// ============================================================================

#[test]
fn test_push_reaches_every_live_window() {
    let registry = WindowRegistry::new();
    let main = registry.open("main");
    let settings = registry.open("settings");
    let a = collect::<BackendStatusPayload>(&main, PushChannel::BackendStatus);
    let b = collect::<BackendStatusPayload>(&settings, PushChannel::BackendStatus);

    let bridge = Bridge::new(registry.clone());
    let reached = bridge
        .push(PushChannel::BackendStatus, &BackendStatusPayload::info("Installing backend"))
        .unwrap();

    assert_eq!(reached, 2);
    assert_eq!(a.len(), 1);
    assert_eq!(b.items()[0].message, "Installing backend");
}

#[test]
fn test_push_skips_destroyed_windows() {
    let registry = WindowRegistry::new();
    let main = registry.open("main");
    let closed = registry.open("about");
    let seen = collect::<LogEntry>(&main, PushChannel::Log);
    let missed = collect::<LogEntry>(&closed, PushChannel::Log);

    closed.destroy();
    let bridge = Bridge::new(registry.clone());
    let reached = bridge
        .push(PushChannel::Log, &LogEntry::now(LogLevel::Info, "hello"))
        .unwrap();

    assert_eq!(reached, 1);
    assert_eq!(seen.len(), 1);
    assert_eq!(missed.len(), 0);
    assert_eq!(registry.live_count(), 1);
}

#[test]
fn test_unsubscribed_listener_stops_receiving() {
    let registry = WindowRegistry::new();
    let main = registry.open("main");
    let count = Arc::new(Mutex::new(0));
    let c = Arc::clone(&count);
    let sub = main.listen(PushChannel::Log, move |_| *c.lock().unwrap() += 1);

    let bridge = Bridge::new(registry);
    bridge.push(PushChannel::Log, &serde_json::json!({})).unwrap();
    sub.unsubscribe();
    bridge.push(PushChannel::Log, &serde_json::json!({})).unwrap();

    assert_eq!(*count.lock().unwrap(), 1);
}

// ============================================================================
// Log relay
// ============================================================================

#[test]
fn test_relay_end_to_end_through_tee_sink() {
    let registry = WindowRegistry::new();
    let window = registry.open("main");
    let received = collect::<LogEntry>(&window, PushChannel::Log);
    let relay = relay_over(&registry);

    let primary_lines = Arc::new(Mutex::new(Vec::new()));
    let primary = {
        let lines = Arc::clone(&primary_lines);
        move |level: LogLevel, msg: &str| lines.lock().unwrap().push((level, msg.to_string()))
    };
    let sink = TeeSink::new(primary, Arc::clone(&relay));

    sink.info("a");
    sink.error("b");
    sink.warn("c");
    assert_eq!(received.len(), 0);

    relay.enable();
    sink.info("a");
    sink.error("b");
    sink.warn("c");

    assert_eq!(
        messages(&received.items()),
        vec![
            (LogLevel::Info, "a".to_string()),
            (LogLevel::Error, "b".to_string()),
            (LogLevel::Warn, "c".to_string()),
        ]
    );
    // Primary output is unaffected by the toggle.
    assert_eq!(primary_lines.lock().unwrap().len(), 6);
}

#[test]
fn test_relay_end_to_end_through_tracing_layer() {
    let registry = WindowRegistry::new();
    let window = registry.open("main");
    let received = collect::<LogEntry>(&window, PushChannel::Log);
    let relay = relay_over(&registry);

    let subscriber = tracing_subscriber::registry().with(RelayLayer::new(Arc::clone(&relay)));
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!("a");
        relay.enable();
        tracing::info!("a");
        tracing::error!("b");
        tracing::warn!(port = 8000, "c");
        relay.disable();
        tracing::info!("d");
    });

    assert_eq!(
        messages(&received.items()),
        vec![
            (LogLevel::Info, "a".to_string()),
            (LogLevel::Error, "b".to_string()),
            (LogLevel::Warn, "c port=8000".to_string()),
        ]
    );
}

#[test]
fn test_relay_enable_twice_delivers_once() {
    let registry = WindowRegistry::new();
    let window = registry.open("main");
    let received = collect::<LogEntry>(&window, PushChannel::Log);
    let relay = relay_over(&registry);
    let sink = TeeSink::new(|_: LogLevel, _: &str| {}, Arc::clone(&relay));

    relay.enable();
    relay.enable();
    sink.info("once");

    assert_eq!(received.len(), 1);
}

#[test]
fn test_relay_disable_when_disabled_is_noop() {
    let registry = WindowRegistry::new();
    let window = registry.open("main");
    let received = collect::<LogEntry>(&window, PushChannel::Log);
    let relay = relay_over(&registry);
    let sink = TeeSink::new(|_: LogLevel, _: &str| {}, Arc::clone(&relay));

    assert!(!relay.disable());
    sink.info("quiet");
    relay.enable();
    relay.disable();
    relay.disable();
    sink.info("quiet again");

    assert_eq!(received.len(), 0);
    assert!(!relay.is_enabled());
}

#[test]
fn test_relay_write_args_joins_with_spaces() {
    let registry = WindowRegistry::new();
    let window = registry.open("main");
    let received = collect::<LogEntry>(&window, PushChannel::Log);
    let relay = relay_over(&registry);
    relay.enable();
    let sink = TeeSink::new(|_: LogLevel, _: &str| {}, Arc::clone(&relay));

    sink.write_args(LogLevel::Log, &[&"Backend port", &8000]);

    let items = received.items();
    assert_eq!(items[0].level, LogLevel::Log);
    assert_eq!(items[0].message, "Backend port 8000");
    assert!(items[0].timestamp > 0);
}

// ============================================================================
// Backend status
// ============================================================================

#[tokio::test]
async fn test_late_window_replays_status_history() {
    let (host, registry) = host_with(quiet_config(), ScriptedUpdateSource::new("1.0.0"), DeferPrompt);
    let early = registry.open("main");
    let live = collect::<BackendStatusPayload>(&early, PushChannel::BackendStatus);

    let emit = host.status().emitter();
    emit(BackendStatusPayload::info("Checking Python"));
    emit(BackendStatusPayload::info("Installing dependencies"));
    emit(
        BackendStatusPayload::error("Backend setup failed")
            .with_command("Retry", "backend:retry-setup"),
    );

    assert_eq!(live.len(), 3);

    let _late = registry.open("settings");
    let history = host.backend_status_history().await.unwrap();
    assert_eq!(history, live.items());
    assert_eq!(history[2].level, BackendStatusLevel::Error);
    assert_eq!(history[2].commands.as_ref().map(|c| c.len()), Some(1));
}

#[tokio::test]
async fn test_status_history_capacity_from_config() {
    let config = ShellConfig::builder()
        .with_status_history_capacity(2)
        .with_stream_logs_on_start(false)
        .build();
    let (host, _registry) = host_with(config, ScriptedUpdateSource::new("1.0.0"), DeferPrompt);

    for step in ["one", "two", "three"] {
        host.status().broadcast(BackendStatusPayload::info(step));
    }

    let history = host.backend_status_history().await.unwrap();
    let messages: Vec<_> = history.iter().map(|p| p.message.as_str()).collect();
    assert_eq!(messages, vec!["two", "three"]);
}

// ============================================================================
// Updater
// ============================================================================

async fn wait_for_phase<S, P, F>(updater: &Updater<S, P>, pred: F) -> UpdatePhase
where
    S: UpdateSource,
    P: InstallPrompt,
    F: FnMut(&UpdatePhase) -> bool,
{
    let mut rx = updater.subscribe();
    let phase = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for update phase")
        .expect("updater dropped")
        .clone();
    phase
}

#[tokio::test]
async fn test_check_without_update() {
    let (host, registry) = host_with(quiet_config(), ScriptedUpdateSource::new("1.0.0"), DeferPrompt);
    let window = registry.open("main");
    let statuses = collect::<UpdateStatus>(&window, PushChannel::UpdateStatus);

    host.check_for_updates().await.unwrap();

    assert_eq!(host.updater().phase(), UpdatePhase::NoUpdateFound);
    assert_eq!(host.update_info().await.unwrap(), UpdateStatus::default());
    assert!(statuses.items().iter().all(|s| !s.update_available));
}

#[tokio::test]
async fn test_auto_download_then_confirm_installs() {
    let source = ScriptedUpdateSource::new("1.0.0")
        .with_checks(vec![CheckOutcome::Found("1.1.0".into())]);
    let (host, _registry) = host_with(quiet_config(), source, ConfirmPrompt);

    host.check_for_updates().await.unwrap();
    let phase = wait_for_phase(host.updater(), |p| {
        matches!(p, UpdatePhase::Installing { .. })
    })
    .await;

    assert_eq!(
        phase,
        UpdatePhase::Installing {
            version: "1.1.0".into()
        }
    );
    assert_eq!(host.updater().source().install_count(), 1);
}

#[tokio::test]
async fn test_deferred_restart_keeps_download_ready() {
    let source = ScriptedUpdateSource::new("1.0.0")
        .with_checks(vec![CheckOutcome::Found("2.0.0".into())]);
    let (host, _registry) = host_with(quiet_config(), source, DeferPrompt);

    host.check_for_updates().await.unwrap();
    wait_for_phase(host.updater(), |p| matches!(p, UpdatePhase::Deferred { .. })).await;

    let info = host.update_info().await.unwrap();
    assert!(info.update_available);
    assert_eq!(info.version.as_deref(), Some("2.0.0"));
    assert_eq!(info.downloading, Some(false));
    assert_eq!(info.progress, Some(100.0));
    assert_eq!(host.updater().source().install_count(), 0);

    // Installing later from the UI still works.
    host.install_update().await.unwrap();
    assert_eq!(host.updater().source().install_count(), 1);
}

#[tokio::test]
async fn test_manual_download_publishes_every_step() {
    let config = ShellConfig::builder()
        .with_auto_download(false)
        .with_stream_logs_on_start(false)
        .build();
    let source = ScriptedUpdateSource::new("1.0.0")
        .with_checks(vec![CheckOutcome::Found("1.2.0".into())]);
    let (host, registry) = host_with(config, source, DeferPrompt);
    let window = registry.open("main");
    let statuses = collect::<UpdateStatus>(&window, PushChannel::UpdateStatus);

    host.check_for_updates().await.unwrap();
    assert!(matches!(
        host.updater().phase(),
        UpdatePhase::UpdateAvailable { .. }
    ));
    host.download_update().await.unwrap();

    let items = statuses.items();
    let progress: Vec<_> = items.iter().map(|s| s.progress).collect();
    assert_eq!(
        progress,
        vec![
            None,
            None,
            Some(0.0),
            Some(25.0),
            Some(50.0),
            Some(100.0),
            Some(100.0),
            Some(100.0),
        ]
    );
    assert_eq!(items[0], UpdateStatus::default());
    assert!(items[1].update_available);
    assert_eq!(items[1].downloading, Some(false));
    assert!(items[2..6].iter().all(|s| s.downloading == Some(true)));
    assert_eq!(items[7].downloading, Some(false));
}

#[tokio::test]
async fn test_check_error_then_retry() {
    let source = ScriptedUpdateSource::new("1.0.0").with_checks(vec![
        CheckOutcome::Fail("offline".into()),
        CheckOutcome::UpToDate,
    ]);
    let (host, _registry) = host_with(quiet_config(), source, DeferPrompt);

    let err = host.check_for_updates().await.unwrap_err();
    assert!(matches!(err, BridgeError::Update(UpdateError::Check(_))));

    let info = host.update_info().await.unwrap();
    assert!(!info.update_available);
    assert_eq!(info.version, None);
    assert_eq!(info.error.as_deref(), Some("Update check failed: offline"));

    host.check_for_updates().await.unwrap();
    assert_eq!(host.update_info().await.unwrap().error, None);
}

#[tokio::test]
async fn test_download_error_is_reported() {
    let config = ShellConfig::builder()
        .with_auto_download(false)
        .with_stream_logs_on_start(false)
        .build();
    let source = ScriptedUpdateSource::new("1.0.0")
        .with_checks(vec![CheckOutcome::Found("1.1.0".into())])
        .with_download_error("checksum mismatch");
    let (host, _registry) = host_with(config, source, ConfirmPrompt);

    host.check_for_updates().await.unwrap();
    assert!(host.download_update().await.is_err());

    let info = host.update_info().await.unwrap();
    assert_eq!(
        info.error.as_deref(),
        Some("Update download failed: checksum mismatch")
    );
    assert_eq!(host.updater().source().install_count(), 0);
}

#[tokio::test]
async fn test_prerelease_build_skips_check() {
    let source = ScriptedUpdateSource::new("1.0.0-beta.2")
        .with_checks(vec![CheckOutcome::Found("1.0.0".into())]);
    let (host, _registry) = host_with(quiet_config(), source, ConfirmPrompt);

    host.check_for_updates().await.unwrap();

    assert_eq!(host.updater().phase(), UpdatePhase::NoUpdateFound);
    // The scripted result was never consumed.
    assert_eq!(host.updater().source().checks.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_install_without_download_is_rejected() {
    let (host, _registry) = host_with(quiet_config(), ScriptedUpdateSource::new("1.0.0"), ConfirmPrompt);

    let err = host.install_update().await.unwrap_err();
    assert!(matches!(err, BridgeError::Update(UpdateError::NotDownloaded)));
    assert_eq!(host.updater().phase(), UpdatePhase::Idle);

    let err = host.download_update().await.unwrap_err();
    assert!(matches!(err, BridgeError::Update(UpdateError::NoUpdate)));
}

#[tokio::test]
async fn test_check_while_installing_is_busy() {
    let source = ScriptedUpdateSource::new("1.0.0")
        .with_checks(vec![CheckOutcome::Found("1.1.0".into())]);
    let (host, _registry) = host_with(quiet_config(), source, ConfirmPrompt);

    host.check_for_updates().await.unwrap();
    wait_for_phase(host.updater(), |p| matches!(p, UpdatePhase::Installing { .. })).await;

    let err = host.check_for_updates().await.unwrap_err();
    assert!(matches!(err, BridgeError::Update(UpdateError::Busy)));
}

#[tokio::test]
async fn test_check_while_restart_prompt_open_is_busy() {
    let source = ScriptedUpdateSource::new("1.0.0")
        .with_checks(vec![CheckOutcome::Found("1.1.0".into())]);
    let (prompt, gate) = GatedPrompt::new(true);
    let (host, _registry) = host_with(quiet_config(), source, prompt);

    host.check_for_updates().await.unwrap();
    wait_for_phase(host.updater(), |p| matches!(p, UpdatePhase::Downloaded { .. })).await;

    let err = host.check_for_updates().await.unwrap_err();
    assert!(matches!(err, BridgeError::Update(UpdateError::Busy)));
    assert_eq!(
        host.updater().phase(),
        UpdatePhase::Downloaded {
            version: "1.1.0".into()
        }
    );

    // Answering "Restart" still installs the download.
    gate.notify_one();
    wait_for_phase(host.updater(), |p| matches!(p, UpdatePhase::Installing { .. })).await;
    assert_eq!(host.updater().source().install_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auto_check_waits_for_delay() {
    let source = ScriptedUpdateSource::new("1.0.0")
        .with_checks(vec![CheckOutcome::UpToDate]);
    let (host, _registry) = host_with(quiet_config(), source, DeferPrompt);
    let updater = Arc::clone(host.updater());

    let task = tokio::spawn(Arc::clone(&updater).auto_check(Duration::from_secs(5)));
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(updater.phase(), UpdatePhase::Idle);

    task.await.unwrap();
    assert_eq!(updater.phase(), UpdatePhase::NoUpdateFound);
}

// ============================================================================
// Host commands
// ============================================================================

#[tokio::test]
async fn test_log_stream_commands() {
    let (host, registry) = host_with(quiet_config(), ScriptedUpdateSource::new("1.0.0"), DeferPrompt);
    let window = registry.open("main");
    let received = collect::<LogEntry>(&window, PushChannel::Log);

    assert!(!host.log_stream_status().await.unwrap());
    host.start_log_stream().await.unwrap();
    host.start_log_stream().await.unwrap();
    assert!(host.log_stream_status().await.unwrap());

    host.relay().forward(LogLevel::Info, "streaming");
    host.stop_log_stream().await.unwrap();
    host.relay().forward(LogLevel::Info, "dropped");

    assert!(!host.log_stream_status().await.unwrap());
    assert_eq!(received.len(), 1);
}

#[tokio::test]
async fn test_streaming_enabled_on_start_by_default() {
    let config = ShellConfig::builder().with_install_subscriber(false).build();
    let (host, _registry) = host_with(config, ScriptedUpdateSource::new("1.0.0"), DeferPrompt);
    assert!(host.log_stream_status().await.unwrap());
}

#[tokio::test]
async fn test_backend_port_command() {
    let (host, _registry) = host_with(quiet_config(), ScriptedUpdateSource::new("1.0.0"), DeferPrompt);
    assert_eq!(host.backend_port().await.unwrap(), DEFAULT_BACKEND_PORT);

    host.set_backend_port(8123);
    assert_eq!(host.backend_port().await.unwrap(), 8123);
}

#[tokio::test]
async fn test_concurrent_commands_resolve_independently() {
    let (host, _registry) = host_with(quiet_config(), ScriptedUpdateSource::new("1.0.0"), DeferPrompt);
    host.set_backend_port(9000);

    let (port, streaming, info) = tokio::join!(
        host.backend_port(),
        host.log_stream_status(),
        host.update_info()
    );

    assert_eq!(port.unwrap(), 9000);
    assert!(!streaming.unwrap());
    assert_eq!(info.unwrap(), UpdateStatus::default());
}
