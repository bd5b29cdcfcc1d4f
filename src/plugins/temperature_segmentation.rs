use crate::core::frame::{Frame, Gray16Image};
use crate::core::plugin::ThermalTransform;
use crate::plugins::filters::{gaussian_blur_5x5, otsu_threshold, threshold_to_zero};

/// Separates warm regions from the background with an Otsu threshold on the
/// smoothed raw frame. The output stays 16-bit and is colorized downstream.
#[derive(Debug, Default)]
pub struct TemperatureSegmentation;

impl TemperatureSegmentation {
    pub const NAME: &'static str = "Temp. Segmentation";

    pub fn new() -> Self {
        TemperatureSegmentation
    }
}

impl ThermalTransform for TemperatureSegmentation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn transform(&self, raw: &Gray16Image) -> anyhow::Result<Frame> {
        let smoothed = gaussian_blur_5x5(raw);
        let threshold = otsu_threshold(&smoothed);
        Ok(Frame::Gray16(threshold_to_zero(&smoothed, threshold)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn background_is_zeroed_and_hot_block_survives() {
        // 20x20 cool background with a warm 8x8 block in the middle
        let raw = Gray16Image::from_fn(20, 20, |x, y| {
            let hot = (6..14).contains(&x) && (6..14).contains(&y);
            Luma([if hot { 8400 } else { 8000 }])
        });
        let Frame::Gray16(out) = TemperatureSegmentation::new().transform(&raw).unwrap() else {
            panic!("expected a raw frame");
        };
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert!(out.get_pixel(10, 10).0[0] >= 8300);
    }
}
