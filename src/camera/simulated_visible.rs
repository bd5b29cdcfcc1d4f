use crate::camera_config::{Resolution, VisibleCameraConfig};
use crate::core::sensor::VisibleSensor;
use crate::errors::AppError;
use image::{Rgb, RgbImage};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const SENSOR: &str = "VIS";

#[derive(Debug, Clone)]
pub struct SimVisibleOptions {
    pub resolution: Resolution,
    pub capture_resolution: Resolution,
    pub frame_rate: u32,
    pub open_failures: u32,
    /// Every streaming capture fails. Photos are unaffected.
    pub fail_captures: bool,
    /// Extra wait before the first streaming frame after configuration.
    pub first_frame_delay: Duration,
}

impl SimVisibleOptions {
    pub fn from_config(config: &VisibleCameraConfig) -> Self {
        SimVisibleOptions {
            resolution: config.resolution,
            capture_resolution: config.capture_resolution,
            frame_rate: config.frame_rate,
            open_failures: 0,
            fail_captures: false,
            first_frame_delay: Duration::ZERO,
        }
    }
}

/// Synthetic RGB scene: a color gradient with a bright bar sweeping across.
pub fn synthetic_visible_frame(resolution: Resolution, tick: u64) -> RgbImage {
    let w = resolution.x.max(1);
    let h = resolution.y.max(1);
    let bar = (tick as u32 * 4) % w;
    let bar_width = (w / 16).max(1);
    RgbImage::from_fn(resolution.x, resolution.y, |x, y| {
        if x >= bar && x < bar + bar_width {
            Rgb([240, 240, 240])
        } else {
            Rgb([(x * 255 / w) as u8, (y * 255 / h) as u8, 96])
        }
    })
}

pub struct SimulatedVisibleSensor {
    options: SimVisibleOptions,
    open_attempts: u32,
    is_open: bool,
    configured: bool,
    tick: u64,
    last_capture: Option<Instant>,
}

impl SimulatedVisibleSensor {
    pub fn new(options: SimVisibleOptions) -> Self {
        SimulatedVisibleSensor {
            options,
            open_attempts: 0,
            is_open: false,
            configured: false,
            tick: 0,
            last_capture: None,
        }
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.options.frame_rate.max(1)
    }

    fn ensure_streaming(&self) -> Result<(), AppError> {
        if self.configured {
            Ok(())
        } else {
            Err(AppError::Capture("VIS camera is not streaming".to_string()))
        }
    }
}

impl VisibleSensor for SimulatedVisibleSensor {
    fn name(&self) -> &str {
        "simulated-visible"
    }

    fn open(&mut self) -> Result<(), AppError> {
        self.open_attempts += 1;
        if self.open_attempts <= self.options.open_failures {
            return Err(AppError::SensorOpen {
                sensor: SENSOR.to_string(),
                details: format!("no device answered (attempt {})", self.open_attempts),
            });
        }
        self.is_open = true;
        info!("VIS camera opened successfully.");
        Ok(())
    }

    fn configure(&mut self) -> Result<(), AppError> {
        if !self.is_open {
            return Err(AppError::SensorConfig {
                sensor: SENSOR.to_string(),
                details: "device is not open".to_string(),
            });
        }
        self.configured = true;
        self.last_capture = None;
        debug!(
            "VIS streaming profile {}x{} @ {} fps.",
            self.options.resolution.x, self.options.resolution.y, self.options.frame_rate
        );
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<RgbImage, AppError> {
        self.ensure_streaming()?;
        // Block like a device waiting on its next frame.
        if self.last_capture.is_none() && !self.options.first_frame_delay.is_zero() {
            thread::sleep(self.options.first_frame_delay);
        }
        if let Some(last) = self.last_capture {
            let interval = self.frame_interval();
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last_capture = Some(Instant::now());
        if self.options.fail_captures {
            return Err(AppError::Capture("frame grab timed out".to_string()));
        }
        self.tick += 1;
        Ok(synthetic_visible_frame(self.options.resolution, self.tick))
    }

    fn capture_photo(&mut self) -> Result<RgbImage, AppError> {
        self.ensure_streaming()?;
        let res = self.options.capture_resolution;
        if res.is_empty() {
            warn!("No capture resolution configured, using the streaming profile.");
            return Ok(synthetic_visible_frame(self.options.resolution, self.tick));
        }
        debug!("Switching VIS to {}x{} for a photo.", res.x, res.y);
        let photo = synthetic_visible_frame(res, self.tick);
        debug!("VIS back to the streaming profile.");
        Ok(photo)
    }

    fn close(&mut self) {
        if self.is_open {
            self.is_open = false;
            self.configured = false;
            info!("VIS camera closed.");
        }
    }
}
