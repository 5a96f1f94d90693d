//! End-to-end call flow against the scriptable mock engine: join, publish,
//! leave, and screen-share lifecycle, verified through the recorded engine
//! call order and the coordinator flags.

use std::sync::Arc;
use std::time::Duration;

use edurtc_client_core::sdk::mock::MockRtcEngine;
use edurtc_client_core::{AdapterConfig, CallCoordinator, StreamSpec};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fast_config() -> AdapterConfig {
    AdapterConfig::new("test-app")
        .with_publish_settle_delay(Duration::from_millis(1))
        .with_rtt_interval(Duration::from_millis(10))
        .with_device_release_grace(Duration::from_millis(1))
}

fn setup() -> (MockRtcEngine, CallCoordinator) {
    init_tracing();
    let engine = MockRtcEngine::new();
    let coordinator = CallCoordinator::new(Arc::new(engine.clone()), fast_config());
    (engine, coordinator)
}

/// Position of the first recorded call starting with `prefix`, panicking
/// with the full log when absent
fn position(calls: &[String], prefix: &str) -> usize {
    calls
        .iter()
        .position(|c| c.starts_with(prefix))
        .unwrap_or_else(|| panic!("no call starting with {prefix:?} in {calls:?}"))
}

#[tokio::test]
async fn join_publish_leave_records_the_expected_engine_sequence() {
    let (engine, mut coordinator) = setup();

    // Join uid 42 into "room1" without dual-stream mode.
    coordinator.join_channel(42, "room1", false).await.unwrap();
    assert!(coordinator.is_joined());
    assert_eq!(engine.count_calls("join:room1:42"), 1);

    // Publish camera+mic under the same uid.
    coordinator
        .publish_local_stream(&StreamSpec::camera(42))
        .await
        .unwrap();
    assert!(coordinator.is_published());
    assert_eq!(engine.count_calls("create_stream:42"), 1);
    assert_eq!(engine.count_calls("publish:42"), 1);

    // Leave: unpublish, then leave, then client teardown, in that order.
    engine.clear_calls();
    coordinator.leave_channel().await.unwrap();

    let calls = engine.calls();
    let unpublish_at = position(&calls, "unpublish:");
    let leave_at = position(&calls, "leave");
    let destroy_at = position(&calls, "destroy_client");
    assert!(unpublish_at < leave_at, "unpublish before leave: {calls:?}");
    assert!(leave_at < destroy_at, "leave before teardown: {calls:?}");

    assert!(!coordinator.is_joined());
    assert!(!coordinator.is_published());
}

#[tokio::test]
async fn screen_share_runs_a_parallel_session_under_the_reserved_uid() {
    let (engine, mut coordinator) = setup();
    coordinator.join_channel(42, "room1", false).await.unwrap();
    coordinator
        .publish_local_stream(&StreamSpec::camera(42))
        .await
        .unwrap();

    engine.clear_calls();
    coordinator.start_screen_share().await.unwrap();
    assert!(coordinator.is_shared());

    let share_uid = fast_config().screen_share_uid;
    let calls = engine.calls();
    let create_at = position(&calls, &format!("create_stream:{share_uid}"));
    let join_at = position(&calls, &format!("join:room1:{share_uid}"));
    let publish_at = position(&calls, &format!("publish:{share_uid}"));
    assert!(create_at < join_at && join_at < publish_at, "{calls:?}");

    // Primary publish state is independent of the share.
    assert!(coordinator.is_published());

    engine.clear_calls();
    coordinator.stop_screen_share().await.unwrap();
    assert!(!coordinator.is_shared());

    let calls = engine.calls();
    let unpublish_at = position(&calls, &format!("unpublish:{share_uid}"));
    let leave_at = position(&calls, "leave");
    let destroy_at = position(&calls, "destroy_client");
    assert!(unpublish_at < leave_at && leave_at < destroy_at, "{calls:?}");

    // The primary session is still live.
    assert!(coordinator.is_joined());
}

#[tokio::test]
async fn exit_tears_down_both_sessions() {
    let (engine, mut coordinator) = setup();
    coordinator.join_channel(42, "room1", false).await.unwrap();
    coordinator
        .publish_local_stream(&StreamSpec::camera(42))
        .await
        .unwrap();
    coordinator.start_screen_share().await.unwrap();

    coordinator.exit().await.unwrap();

    assert!(!coordinator.is_joined());
    assert!(!coordinator.is_published());
    assert!(!coordinator.is_shared());
    // Both clients were released.
    assert_eq!(engine.count_calls("destroy_client"), 2);
}

#[tokio::test]
async fn exit_survives_a_failing_screen_share_teardown() {
    let (engine, mut coordinator) = setup();
    coordinator.join_channel(42, "room1", false).await.unwrap();
    coordinator.start_screen_share().await.unwrap();

    engine.fail_on("unpublish");
    engine.fail_on("leave");

    // The primary is still joined, so its failing leave surfaces from exit.
    assert!(coordinator.exit().await.is_err());

    engine.clear_failure("leave");
    engine.clear_failure("unpublish");
    coordinator.exit().await.unwrap();
    assert!(!coordinator.is_shared());
}
