use crate::camera_config::Resolution;
use crate::core::frame::{placeholder_gray16, placeholder_rgb, Gray16Image};
use image::RgbImage;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The four latest frames. Every field always holds a valid frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSet {
    pub visible: RgbImage,
    pub thermal_raw: Gray16Image,
    pub thermal_display: RgbImage,
    pub thermal_processed: RgbImage,
}

impl FrameSet {
    pub fn placeholders(visible: Resolution, thermal: Resolution) -> Self {
        FrameSet {
            visible: placeholder_rgb(visible),
            thermal_raw: placeholder_gray16(thermal),
            thermal_display: placeholder_rgb(thermal),
            thermal_processed: placeholder_rgb(thermal),
        }
    }
}

/// Results of one thermal cycle, committed together.
#[derive(Debug, Clone)]
pub struct ThermalProducts {
    pub raw: Gray16Image,
    pub display: RgbImage,
    pub processed: RgbImage,
}

/// Copies taken for a save.
#[derive(Debug, Clone)]
pub struct CaptureSnapshot {
    pub visible: RgbImage,
    pub thermal_display: RgbImage,
    pub thermal_processed: Option<RgbImage>,
    pub thermal_raw: Gray16Image,
}

#[derive(Debug)]
struct StoreInner {
    frames: FrameSet,
    visible_live: bool,
    thermal_live: bool,
}

/// Latest-frame store shared by the acquisition loops, the capture writer and
/// the lifecycle controller.
///
/// The lock is held only for the duration of a copy; no I/O happens under it.
#[derive(Debug)]
pub struct FrameStore {
    inner: Mutex<StoreInner>,
    visible_resolution: Resolution,
    thermal_resolution: Resolution,
}

impl FrameStore {
    pub fn new(visible_resolution: Resolution, thermal_resolution: Resolution) -> Self {
        FrameStore {
            inner: Mutex::new(StoreInner {
                frames: FrameSet::placeholders(visible_resolution, thermal_resolution),
                visible_live: false,
                thermal_live: false,
            }),
            visible_resolution,
            thermal_resolution,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // Frames are plain values, a panicked writer cannot leave one half-written.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn update_visible(&self, frame: RgbImage) {
        let mut inner = self.lock();
        inner.frames.visible = frame;
        inner.visible_live = true;
    }

    pub fn update_thermal(&self, products: ThermalProducts) {
        let mut inner = self.lock();
        inner.frames.thermal_raw = products.raw;
        inner.frames.thermal_display = products.display;
        inner.frames.thermal_processed = products.processed;
        inner.thermal_live = true;
    }

    pub fn snapshot(&self) -> FrameSet {
        self.lock().frames.clone()
    }

    pub fn capture_snapshot(&self, include_processed: bool) -> CaptureSnapshot {
        let inner = self.lock();
        CaptureSnapshot {
            visible: inner.frames.visible.clone(),
            thermal_display: inner.frames.thermal_display.clone(),
            thermal_processed: include_processed.then(|| inner.frames.thermal_processed.clone()),
            thermal_raw: inner.frames.thermal_raw.clone(),
        }
    }

    /// `(visible, thermal)`: whether each side holds a frame from the current session.
    pub fn liveness(&self) -> (bool, bool) {
        let inner = self.lock();
        (inner.visible_live, inner.thermal_live)
    }

    /// Back to zero-filled placeholders. Returns the placeholder set so callers
    /// can push it to the presenter without re-locking.
    pub fn reset(&self) -> FrameSet {
        let placeholders = FrameSet::placeholders(self.visible_resolution, self.thermal_resolution);
        let mut inner = self.lock();
        inner.frames = placeholders.clone();
        inner.visible_live = false;
        inner.thermal_live = false;
        placeholders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn store() -> FrameStore {
        FrameStore::new(Resolution::new(4, 3), Resolution::new(2, 2))
    }

    #[test]
    fn starts_with_placeholders_of_configured_size() {
        let store = store();
        let frames = store.snapshot();
        assert_eq!(frames.visible.dimensions(), (4, 3));
        assert_eq!(frames.thermal_raw.dimensions(), (2, 2));
        assert!(frames.thermal_raw.as_raw().iter().all(|&v| v == 0));
        assert_eq!(store.liveness(), (false, false));
    }

    #[test]
    fn thermal_fields_commit_together() {
        let store = store();
        store.update_thermal(ThermalProducts {
            raw: Gray16Image::from_pixel(2, 2, Luma([7])),
            display: RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])),
            processed: RgbImage::from_pixel(2, 2, Rgb([4, 5, 6])),
        });
        let snap = store.capture_snapshot(true);
        assert_eq!(snap.thermal_raw.get_pixel(0, 0).0, [7]);
        assert_eq!(snap.thermal_display.get_pixel(1, 1).0, [1, 2, 3]);
        assert_eq!(snap.thermal_processed.unwrap().get_pixel(1, 1).0, [4, 5, 6]);
        assert_eq!(store.liveness(), (false, true));
    }

    #[test]
    fn processed_copy_is_optional() {
        let store = store();
        assert!(store.capture_snapshot(false).thermal_processed.is_none());
    }

    #[test]
    fn reset_restores_placeholders() {
        let store = store();
        store.update_visible(RgbImage::from_pixel(4, 3, Rgb([9, 9, 9])));
        assert_eq!(store.liveness(), (true, false));
        let placeholders = store.reset();
        assert_eq!(store.snapshot(), placeholders);
        assert_eq!(store.liveness(), (false, false));
    }
}
