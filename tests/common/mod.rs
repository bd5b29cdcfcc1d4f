#![allow(dead_code)]

use image::RgbImage;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thermovis::app_config::{RawWriteMode, TimeoutSettings};
use thermovis::camera::{SimThermalOptions, SimVisibleOptions, SimulatedThermalSensor, SimulatedVisibleSensor};
use thermovis::camera_config::Resolution;
use thermovis::config_loader::MasterConfig;
use thermovis::core::plugin::PluginRegistry;
use thermovis::core::presenter::FramePresenter;
use thermovis::core::sensor::{share_thermal, share_visible, SensorRunState};
use thermovis::core::station::{Station, StationParts};
use tracing::Dispatch;

pub const THERMAL_RES: Resolution = Resolution { x: 32, y: 24 };
pub const VISIBLE_RES: Resolution = Resolution { x: 64, y: 48 };
pub const PHOTO_RES: Resolution = Resolution { x: 96, y: 72 };

/// Small frames, fast sensors and short timeouts, saving into `save_dir`.
pub fn test_config(save_dir: &Path) -> MasterConfig {
    let mut config = MasterConfig::default();
    config.app_settings.save_folder = save_dir.display().to_string();
    config.app_settings.raw_write_mode = RawWriteMode::Truncate;
    config.app_settings.timeouts = TimeoutSettings {
        frame_wait_ms: 100,
        handshake_ms: 300,
        join_ms: 1000,
        open_retry_backoff_ms: 10,
    };
    config.cameras.thermal.resolution = THERMAL_RES;
    config.cameras.thermal.frame_rate = 50;
    config.cameras.visible.resolution = VISIBLE_RES;
    config.cameras.visible.capture_resolution = PHOTO_RES;
    config.cameras.visible.frame_rate = 50;
    config
}

pub fn thermal_options(config: &MasterConfig) -> SimThermalOptions {
    SimThermalOptions::from_config(&config.cameras.thermal)
}

pub fn visible_options(config: &MasterConfig) -> SimVisibleOptions {
    SimVisibleOptions::from_config(&config.cameras.visible)
}

#[derive(Default)]
pub struct RecordingPresenter {
    visible: AtomicU64,
    thermal: AtomicU64,
    closed: AtomicU64,
    last_thermal: Mutex<Option<RgbImage>>,
}

impl RecordingPresenter {
    pub fn visible_frames(&self) -> u64 {
        self.visible.load(Ordering::SeqCst)
    }

    pub fn thermal_frames(&self) -> u64 {
        self.thermal.load(Ordering::SeqCst)
    }

    pub fn closed_count(&self) -> u64 {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn last_thermal(&self) -> Option<RgbImage> {
        self.last_thermal.lock().unwrap().clone()
    }
}

impl FramePresenter for RecordingPresenter {
    fn present_visible(&self, _frame: &RgbImage) {
        self.visible.fetch_add(1, Ordering::SeqCst);
    }

    fn present_thermal(&self, frame: &RgbImage) {
        self.thermal.fetch_add(1, Ordering::SeqCst);
        *self.last_thermal.lock().unwrap() = Some(frame.clone());
    }

    fn session_closed(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn build_station(
    config: &MasterConfig,
    thermal: SimThermalOptions,
    visible: SimVisibleOptions,
    registry: PluginRegistry,
) -> (Station, Arc<RecordingPresenter>) {
    let presenter = Arc::new(RecordingPresenter::default());
    let station = Station::new(
        config,
        StationParts {
            thermal: share_thermal(SimulatedThermalSensor::new(thermal)),
            visible: share_visible(SimulatedVisibleSensor::new(visible)),
            registry,
            presenter: presenter.clone(),
        },
        Dispatch::none(),
    );
    (station, presenter)
}

/// Polls `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub async fn wait_running(station: &Station) -> bool {
    let orchestrator = station.orchestrator().clone();
    wait_until(Duration::from_secs(3), move || {
        orchestrator.thermal_state() == SensorRunState::Running
            && orchestrator.visible_state() == SensorRunState::Running
            && orchestrator.store().liveness() == (true, true)
    })
    .await
}
