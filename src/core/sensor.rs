//! Capability interfaces for the two sensors and the per-sensor run state.

use crate::common::logging_setup::LogSink;
use crate::core::frame_queue::FrameSink;
use crate::errors::AppError;
use image::RgbImage;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Thermal,
    Visible,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorKind::Thermal => write!(f, "IR"),
            SensorKind::Visible => write!(f, "VIS"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorRunState {
    Stopped,
    Opening,
    Handshaking,
    Running,
    Faulted,
}

impl SensorRunState {
    fn to_u8(self) -> u8 {
        match self {
            SensorRunState::Stopped => 0,
            SensorRunState::Opening => 1,
            SensorRunState::Handshaking => 2,
            SensorRunState::Running => 3,
            SensorRunState::Faulted => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SensorRunState::Opening,
            2 => SensorRunState::Handshaking,
            3 => SensorRunState::Running,
            4 => SensorRunState::Faulted,
            _ => SensorRunState::Stopped,
        }
    }
}

/// Written only by the owning acquisition loop, readable by anyone.
#[derive(Debug)]
pub struct RunStateCell(AtomicU8);

impl RunStateCell {
    pub fn new() -> Self {
        RunStateCell(AtomicU8::new(SensorRunState::Stopped.to_u8()))
    }

    pub fn get(&self) -> SensorRunState {
        SensorRunState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: SensorRunState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }
}

impl Default for RunStateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream parameters the thermal device agreed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

/// Thermal sensor with asynchronous, hardware-driven delivery.
///
/// After `start_streaming` the device pushes frames into the given sink from
/// its own context until `stop_streaming` returns.
pub trait ThermalSensor: Send {
    fn name(&self) -> &str;
    fn open(&mut self) -> Result<(), AppError>;
    fn configure(&mut self) -> Result<StreamFormat, AppError>;
    fn start_streaming(&mut self, sink: FrameSink) -> Result<(), AppError>;
    fn stop_streaming(&mut self);
    fn close(&mut self);
}

/// Visible-light sensor with synchronous capture.
pub trait VisibleSensor: Send {
    fn name(&self) -> &str;
    fn open(&mut self) -> Result<(), AppError>;
    fn configure(&mut self) -> Result<(), AppError>;
    /// Blocks until the next streaming frame is available or the device fails.
    fn capture_frame(&mut self) -> Result<RgbImage, AppError>;
    /// One capture at the high-resolution profile, then back to streaming.
    fn capture_photo(&mut self) -> Result<RgbImage, AppError>;
    fn close(&mut self);
}

pub type SharedThermal = Arc<Mutex<dyn ThermalSensor>>;
pub type SharedVisible = Arc<Mutex<dyn VisibleSensor>>;

pub fn share_thermal<S: ThermalSensor + 'static>(sensor: S) -> SharedThermal {
    Arc::new(Mutex::new(sensor))
}

pub fn share_visible<S: VisibleSensor + 'static>(sensor: S) -> SharedVisible {
    Arc::new(Mutex::new(sensor))
}

/// Runs a blocking driver call on the blocking pool, under `log`.
pub async fn with_sensor<S, R, F>(sensor: &Arc<Mutex<S>>, log: &LogSink, f: F) -> Result<R, AppError>
where
    S: ?Sized + Send + 'static,
    R: Send + 'static,
    F: FnOnce(&mut S) -> R + Send + 'static,
{
    let sensor = Arc::clone(sensor);
    let log = log.clone();
    tokio::task::spawn_blocking(move || {
        log.scope(|| {
            let mut guard = sensor.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut *guard)
        })
    })
    .await
    .map_err(|e| AppError::Task(format!("sensor call panicked: {}", e)))
}
