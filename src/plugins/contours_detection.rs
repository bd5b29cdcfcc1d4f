use crate::core::frame::{normalize_to_u8, raw_to_display, Frame, Gray16Image};
use crate::core::plugin::ThermalTransform;
use crate::core::radiometry;
use crate::plugins::filters::{gaussian_blur_5x5, otsu_threshold, threshold_to_zero};
use image::{GrayImage, Luma, Rgb};
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::debug;

/// Smallest region, in pixels, considered a body rather than noise.
const AREA_THRESHOLD: usize = 400;
const HIGHLIGHT: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, Clone, PartialEq)]
pub struct HotRegion {
    pub pixels: Vec<(u32, u32)>,
    pub mean_celsius: f64,
}

/// Finds the warmest large region of the segmented frame and paints it over
/// the colorized thermal image.
#[derive(Debug, Default)]
pub struct ContoursDetection;

impl ContoursDetection {
    pub const NAME: &'static str = "Contours detection";

    pub fn new() -> Self {
        ContoursDetection
    }

    /// Warmest 4-connected region of non-zero samples with at least
    /// [`AREA_THRESHOLD`] pixels. Ties go to the larger region.
    pub fn hottest_region(raw: &Gray16Image) -> Option<HotRegion> {
        let smoothed = gaussian_blur_5x5(raw);
        let segmented = threshold_to_zero(&smoothed, otsu_threshold(&smoothed));
        let mask = GrayImage::from_fn(segmented.width(), segmented.height(), |x, y| {
            Luma([if segmented.get_pixel(x, y).0[0] == 0 { 0 } else { 255 }])
        });
        let labels = connected_components(&mask, Connectivity::Four, Luma([0u8]));

        let mut regions: Vec<Vec<(u32, u32)>> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label.0[0] as usize;
            if label == 0 {
                continue;
            }
            if regions.len() < label {
                regions.resize_with(label, Vec::new);
            }
            regions[label - 1].push((x, y));
        }

        let levels = normalize_to_u8(raw);
        let mut best: Option<HotRegion> = None;
        for pixels in regions.into_iter().filter(|r| r.len() >= AREA_THRESHOLD) {
            let mean_level = pixels
                .iter()
                .map(|&(px, py)| f64::from(levels.get_pixel(px, py).0[0]))
                .sum::<f64>()
                / pixels.len() as f64;
            let mean_celsius = radiometry::level_to_celsius(mean_level);
            let better = match &best {
                None => true,
                Some(current) => {
                    mean_celsius > current.mean_celsius
                        || (mean_celsius == current.mean_celsius && pixels.len() > current.pixels.len())
                }
            };
            if better {
                best = Some(HotRegion { pixels, mean_celsius });
            }
        }
        best
    }
}

impl ThermalTransform for ContoursDetection {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn transform(&self, raw: &Gray16Image) -> anyhow::Result<Frame> {
        let mut display = raw_to_display(raw);
        if let Some(region) = Self::hottest_region(raw) {
            debug!("🔥 Hottest region: {} px, T={} C", region.pixels.len(), region.mean_celsius);
            for &(x, y) in &region.pixels {
                display.put_pixel(x, y, HIGHLIGHT);
            }
        }
        Ok(Frame::Rgb8(display))
    }
}
