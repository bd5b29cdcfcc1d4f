use image::RgbImage;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Receives display-ready frames as the store is updated.
///
/// Calls arrive from the acquisition tasks; implementations must not block
/// for long.
pub trait FramePresenter: Send + Sync {
    fn present_visible(&self, frame: &RgbImage);
    /// Processed thermal frame, equal to the display frame when no plugin is active.
    fn present_thermal(&self, frame: &RgbImage);
    fn session_closed(&self) {}
}

/// Headless presenter: counts frames and reports every `every`-th one.
#[derive(Debug)]
pub struct LoggingPresenter {
    every: u64,
    visible_frames: AtomicU64,
    thermal_frames: AtomicU64,
}

impl LoggingPresenter {
    pub fn new(every: u64) -> Self {
        LoggingPresenter {
            every: every.max(1),
            visible_frames: AtomicU64::new(0),
            thermal_frames: AtomicU64::new(0),
        }
    }

    pub fn counts(&self) -> (u64, u64) {
        (
            self.visible_frames.load(Ordering::Relaxed),
            self.thermal_frames.load(Ordering::Relaxed),
        )
    }
}

impl FramePresenter for LoggingPresenter {
    fn present_visible(&self, frame: &RgbImage) {
        let n = self.visible_frames.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.every == 0 {
            debug!("🖼️ VIS frame #{} ({}x{})", n, frame.width(), frame.height());
        }
    }

    fn present_thermal(&self, frame: &RgbImage) {
        let n = self.thermal_frames.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.every == 0 {
            debug!("🌡️ IR frame #{} ({}x{})", n, frame.width(), frame.height());
        }
    }

    fn session_closed(&self) {
        let (vis, ir) = self.counts();
        info!("📴 Session closed after {} VIS and {} IR frames presented.", vis, ir);
    }
}
