mod common;

use common::*;
use std::time::Duration;
use tempfile::tempdir;
use thermovis::core::frame_store::FrameSet;
use thermovis::core::lifecycle::{LifecycleState, SensorMode, ToggleOutcome};
use thermovis::core::plugin::PluginRegistry;
use thermovis::core::sensor::SensorRunState;
use thermovis::core::station::UserIntent;

#[tokio::test]
async fn stop_is_idempotent_and_resets_frames() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let (station, _presenter) =
        build_station(&config, thermal_options(&config), visible_options(&config), PluginRegistry::new());
    station.start().await.unwrap();
    assert!(wait_running(&station).await);

    let lifecycle = station.lifecycle();
    assert!(lifecycle.stop(false).await);
    assert!(!lifecycle.stop(false).await);
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    assert_eq!(
        station.orchestrator().store().snapshot(),
        FrameSet::placeholders(VISIBLE_RES, THERMAL_RES)
    );
    assert_eq!(station.orchestrator().store().liveness(), (false, false));

    assert!(lifecycle.restart().await);
    assert!(wait_running(&station).await);
    assert!(!lifecycle.start().await);

    lifecycle.shutdown().await;
    lifecycle.shutdown().await;
    assert!(!lifecycle.has_session().await);
}

#[tokio::test]
async fn toggle_stops_then_restarts() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let (station, _presenter) =
        build_station(&config, thermal_options(&config), visible_options(&config), PluginRegistry::builtin());
    station.start().await.unwrap();
    assert!(wait_running(&station).await);
    station
        .handle_intent(UserIntent::SelectPlugin(Some("Contours detection".to_string())))
        .await;

    let lifecycle = station.lifecycle().clone();
    assert_eq!(lifecycle.toggle().await, ToggleOutcome::Stopping);
    assert_eq!(station.orchestrator().plugins().active_name(), None);
    // The background stop has not had a chance to run yet.
    assert_eq!(lifecycle.toggle().await, ToggleOutcome::RejectedBusy);

    let watched = lifecycle.clone();
    assert!(wait_until(Duration::from_secs(3), move || !watched.toggle_in_flight()).await);
    assert_eq!(lifecycle.mode(), SensorMode::Disabled);
    assert_eq!(station.orchestrator().thermal_state(), SensorRunState::Stopped);
    assert_eq!(station.orchestrator().visible_state(), SensorRunState::Stopped);

    assert_eq!(lifecycle.toggle().await, ToggleOutcome::Restarting);
    assert!(wait_running(&station).await);
    assert_eq!(lifecycle.mode(), SensorMode::Capture);

    lifecycle.shutdown().await;
}

#[tokio::test]
async fn toggle_before_any_sensor_runs_is_rejected() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let mut thermal = thermal_options(&config);
    thermal.deliver_frames = false;
    let mut visible = visible_options(&config);
    visible.fail_captures = true;
    let (station, _presenter) = build_station(&config, thermal, visible, PluginRegistry::new());
    station.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let lifecycle = station.lifecycle().clone();
    assert_eq!(lifecycle.toggle().await, ToggleOutcome::RejectedNotRunning);
    assert!(!lifecycle.toggle_in_flight());
    assert_eq!(lifecycle.mode(), SensorMode::Capture);

    lifecycle.shutdown().await;
    assert_eq!(station.orchestrator().thermal_state(), SensorRunState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn restart_waits_for_loops_that_outlived_their_join() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.app_settings.timeouts.frame_wait_ms = 1500;
    config.app_settings.timeouts.join_ms = 50;
    let mut thermal = thermal_options(&config);
    thermal.silent_streams = 1;
    let (station, presenter) = build_station(&config, thermal, visible_options(&config), PluginRegistry::new());
    station.start().await.unwrap();

    let orchestrator = station.orchestrator().clone();
    assert!(wait_until(Duration::from_secs(2), || orchestrator.visible_state() == SensorRunState::Running).await);
    let lifecycle = station.lifecycle().clone();
    assert_eq!(lifecycle.toggle().await, ToggleOutcome::Stopping);
    let watched = lifecycle.clone();
    assert!(wait_until(Duration::from_secs(3), move || !watched.toggle_in_flight()).await);

    // The first thermal loop is still stuck in a long frame wait.
    assert!(lifecycle.has_lingering_loops());
    assert_eq!(lifecycle.toggle().await, ToggleOutcome::RejectedStillRunning);
    assert!(!lifecycle.restart().await);

    let watched = lifecycle.clone();
    assert!(wait_until(Duration::from_secs(3), move || !watched.has_lingering_loops()).await);
    assert_eq!(lifecycle.toggle().await, ToggleOutcome::Restarting);
    assert!(wait_running(&station).await);

    let seen = presenter.thermal_frames();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(orchestrator.thermal_state(), SensorRunState::Running);
    assert!(presenter.thermal_frames() > seen);

    lifecycle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_stop_wakes_a_loop_parked_in_the_handshake() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.app_settings.timeouts.handshake_ms = 5000;
    config.app_settings.timeouts.join_ms = 1000;
    let mut thermal = thermal_options(&config);
    thermal.deliver_frames = false;
    let (station, _presenter) = build_station(&config, thermal, visible_options(&config), PluginRegistry::new());
    station.start().await.unwrap();

    let orchestrator = station.orchestrator().clone();
    assert!(wait_until(Duration::from_secs(2), || orchestrator.visible_state() == SensorRunState::Running).await);

    let started = std::time::Instant::now();
    station.lifecycle().shutdown().await;
    assert!(started.elapsed() < Duration::from_millis(1000), "shutdown took {:?}", started.elapsed());
    assert_eq!(orchestrator.visible_state(), SensorRunState::Stopped);
    assert_eq!(orchestrator.thermal_state(), SensorRunState::Stopped);
    assert!(!station.lifecycle().has_lingering_loops());
}
