use crate::camera_config::{Resolution, ThermalCameraConfig};
use crate::core::frame::Gray16Image;
use crate::core::frame_queue::{FrameSink, PushOutcome};
use crate::core::sensor::{StreamFormat, ThermalSensor};
use crate::errors::AppError;
use image::Luma;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn, Dispatch};

const SENSOR: &str = "IR";
const BASE_LEVEL: f32 = 8000.0;
const GRADIENT_SPAN: f32 = 250.0;
const HOTSPOT_GAIN: f32 = 400.0;

#[derive(Debug, Clone)]
pub struct SimThermalOptions {
    pub resolution: Resolution,
    pub frame_rate: u32,
    /// Number of `open` calls that fail before one succeeds.
    pub open_failures: u32,
    pub fail_configure: bool,
    /// When false the stream starts but never produces a frame.
    pub deliver_frames: bool,
    /// Number of streams, counted from the first, that stay silent.
    pub silent_streams: u32,
    /// Pause between the start of a stream and its first frame.
    pub first_frame_delay: Duration,
}

impl SimThermalOptions {
    pub fn from_config(config: &ThermalCameraConfig) -> Self {
        SimThermalOptions {
            resolution: config.resolution,
            frame_rate: config.frame_rate,
            open_failures: 0,
            fail_configure: false,
            deliver_frames: true,
            silent_streams: 0,
            first_frame_delay: Duration::ZERO,
        }
    }
}

struct StreamThread {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<u64>,
}

/// Stand-in for the radiometric core: a warm background with a hotspot
/// circling the frame, pushed from a device thread at the configured rate.
pub struct SimulatedThermalSensor {
    options: SimThermalOptions,
    open_attempts: u32,
    streams_started: u32,
    is_open: bool,
    format: Option<StreamFormat>,
    stream: Option<StreamThread>,
}

impl SimulatedThermalSensor {
    pub fn new(options: SimThermalOptions) -> Self {
        SimulatedThermalSensor {
            options,
            open_attempts: 0,
            streams_started: 0,
            is_open: false,
            format: None,
            stream: None,
        }
    }

    pub fn open_attempts(&self) -> u32 {
        self.open_attempts
    }
}

/// Synthetic frame for stream position `tick`.
pub fn synthetic_thermal_frame(resolution: Resolution, tick: u64) -> Gray16Image {
    let (w, h) = (resolution.x.max(1) as f32, resolution.y.max(1) as f32);
    let angle = tick as f32 * 0.15;
    let cx = w * (0.5 + 0.3 * angle.cos());
    let cy = h * (0.5 + 0.3 * angle.sin());
    let radius = (w.min(h) * 0.15).max(1.0);
    Gray16Image::from_fn(resolution.x, resolution.y, |x, y| {
        let gradient = GRADIENT_SPAN * (x as f32 + y as f32) / (w + h);
        let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
        let hotspot = HOTSPOT_GAIN * (-d2 / (2.0 * radius * radius)).exp();
        Luma([(BASE_LEVEL + gradient + hotspot).round() as u16])
    })
}

impl ThermalSensor for SimulatedThermalSensor {
    fn name(&self) -> &str {
        "simulated-thermal"
    }

    fn open(&mut self) -> Result<(), AppError> {
        if self.is_open {
            warn!("IR camera already open.");
            return Ok(());
        }
        self.open_attempts += 1;
        if self.open_attempts <= self.options.open_failures {
            return Err(AppError::SensorOpen {
                sensor: SENSOR.to_string(),
                details: format!("device not found (attempt {})", self.open_attempts),
            });
        }
        self.is_open = true;
        info!("IR camera opened successfully.");
        Ok(())
    }

    fn configure(&mut self) -> Result<StreamFormat, AppError> {
        if !self.is_open {
            return Err(AppError::SensorConfig {
                sensor: SENSOR.to_string(),
                details: "device is not open".to_string(),
            });
        }
        if self.options.fail_configure {
            return Err(AppError::SensorConfig {
                sensor: SENSOR.to_string(),
                details: "device doesn't provide Y16 stream".to_string(),
            });
        }
        let format = StreamFormat {
            width: self.options.resolution.x,
            height: self.options.resolution.y,
            frame_rate: self.options.frame_rate.max(1),
        };
        self.format = Some(format);
        Ok(format)
    }

    fn start_streaming(&mut self, sink: FrameSink) -> Result<(), AppError> {
        let format = self
            .format
            .ok_or_else(|| AppError::Streaming("IR stream started before configuration".to_string()))?;
        if self.stream.is_some() {
            return Err(AppError::Streaming("IR stream already running".to_string()));
        }
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let resolution = Resolution::new(format.width, format.height);
        let interval = Duration::from_secs(1) / format.frame_rate;
        self.streams_started += 1;
        let deliver = self.options.deliver_frames && self.streams_started > self.options.silent_streams;
        let first_frame_delay = self.options.first_frame_delay;
        // The device thread logs to whatever the caller is logging to.
        let dispatch = tracing::dispatcher::get_default(Dispatch::clone);
        let handle = thread::Builder::new()
            .name("sim-thermal".to_string())
            .spawn(move || {
                tracing::dispatcher::with_default(&dispatch, || {
                    if !first_frame_delay.is_zero() {
                        thread::sleep(first_frame_delay);
                    }
                    let mut tick = 0u64;
                    while !thread_stop.load(Ordering::Acquire) {
                        if deliver && sink.push(synthetic_thermal_frame(resolution, tick)) == PushOutcome::Closed {
                            debug!("IR frame queue closed, device thread exits.");
                            break;
                        }
                        tick += 1;
                        thread::sleep(interval);
                    }
                    tick
                })
            })
            .map_err(|e| AppError::Streaming(format!("failed to spawn IR device thread: {}", e)))?;
        self.stream = Some(StreamThread { stop, handle });
        info!("IR streaming started at {} fps.", format.frame_rate);
        Ok(())
    }

    fn stop_streaming(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop.store(true, Ordering::Release);
            match stream.handle.join() {
                Ok(ticks) => debug!("IR streaming stopped after {} tick(s).", ticks),
                Err(_) => warn!("IR device thread panicked."),
            }
        }
    }

    fn close(&mut self) {
        self.stop_streaming();
        if self.is_open {
            self.is_open = false;
            self.format = None;
            info!("IR camera closed.");
        }
    }
}

impl Drop for SimulatedThermalSensor {
    fn drop(&mut self) {
        self.stop_streaming();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::min_max;
    use crate::core::frame_queue;

    fn options() -> SimThermalOptions {
        SimThermalOptions {
            resolution: Resolution::new(32, 24),
            frame_rate: 50,
            open_failures: 0,
            fail_configure: false,
            deliver_frames: true,
            silent_streams: 0,
            first_frame_delay: Duration::ZERO,
        }
    }

    #[test]
    fn frames_stay_in_the_expected_band() {
        let frame = synthetic_thermal_frame(Resolution::new(32, 24), 3);
        let (lo, hi) = min_max(&frame);
        assert!(lo >= 8000 && hi <= 8700, "({}, {})", lo, hi);
        assert!(hi - lo > 100);
    }

    #[test]
    fn open_fails_the_requested_number_of_times() {
        let mut sensor = SimulatedThermalSensor::new(SimThermalOptions { open_failures: 2, ..options() });
        assert!(sensor.open().is_err());
        assert!(sensor.open().is_err());
        assert!(sensor.open().is_ok());
        assert_eq!(sensor.open_attempts(), 3);
    }

    #[test]
    fn configure_requires_open() {
        let mut sensor = SimulatedThermalSensor::new(options());
        assert!(matches!(sensor.configure(), Err(AppError::SensorConfig { .. })));
    }

    #[tokio::test]
    async fn streams_into_the_sink_until_stopped() {
        let mut sensor = SimulatedThermalSensor::new(options());
        sensor.open().unwrap();
        sensor.configure().unwrap();
        let (sink, mut queue) = frame_queue::bounded(4);
        sensor.start_streaming(sink).unwrap();
        let frame = queue.next_frame(Duration::from_secs(2)).await.unwrap();
        assert_eq!(frame.dimensions(), (32, 24));
        sensor.close();
        queue.drain();
        assert!(queue.next_frame(Duration::from_millis(200)).await.is_err());
    }

    #[tokio::test]
    async fn silent_streams_precede_healthy_ones() {
        let mut sensor = SimulatedThermalSensor::new(SimThermalOptions { silent_streams: 1, ..options() });
        sensor.open().unwrap();
        sensor.configure().unwrap();

        let (sink, mut queue) = frame_queue::bounded(4);
        sensor.start_streaming(sink).unwrap();
        assert!(queue.next_frame(Duration::from_millis(200)).await.is_err());
        sensor.stop_streaming();

        let (sink, mut queue) = frame_queue::bounded(4);
        sensor.start_streaming(sink).unwrap();
        assert!(queue.next_frame(Duration::from_secs(2)).await.is_ok());
        sensor.close();
    }
}
