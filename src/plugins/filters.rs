use crate::core::frame::Gray16Image;
use imageproc::filter::separable_filter;

// Binomial kernel, what OpenCV picks for a 5x5 Gaussian with sigma left at 0.
const KERNEL_5: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

pub fn gaussian_blur_5x5(src: &Gray16Image) -> Gray16Image {
    if src.width() == 0 || src.height() == 0 {
        return src.clone();
    }
    separable_filter(src, &KERNEL_5, &KERNEL_5)
}

/// Otsu threshold over the full 16-bit histogram.
pub fn otsu_threshold(src: &Gray16Image) -> u16 {
    let mut histogram = vec![0u64; 1 << 16];
    for &v in src.as_raw() {
        histogram[v as usize] += 1;
    }
    let total = src.as_raw().len() as f64;
    if total == 0.0 {
        return 0;
    }
    let sum_all: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut weight_bg = 0.0;
    let mut sum_bg = 0.0;
    let mut best_level = 0usize;
    let mut best_variance = -1.0;
    for (level, &count) in histogram.iter().enumerate() {
        weight_bg += count as f64;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }
        sum_bg += level as f64 * count as f64;
        let mean_bg = sum_bg / weight_bg;
        let mean_fg = (sum_all - sum_bg) / weight_fg;
        let variance = weight_bg * weight_fg * (mean_bg - mean_fg).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_level = level;
        }
    }
    best_level as u16
}

/// Keeps samples strictly above `threshold`, zeroes the rest.
pub fn threshold_to_zero(src: &Gray16Image, threshold: u16) -> Gray16Image {
    let mut out = src.clone();
    for px in out.pixels_mut() {
        if px.0[0] <= threshold {
            px.0[0] = 0;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn blur_preserves_flat_frames() {
        let flat = Gray16Image::from_pixel(7, 5, Luma([1234]));
        assert_eq!(gaussian_blur_5x5(&flat), flat);
    }

    #[test]
    fn blur_spreads_a_single_spike() {
        let mut spike = Gray16Image::new(5, 5);
        spike.put_pixel(2, 2, Luma([1600]));
        let blurred = gaussian_blur_5x5(&spike);
        // 6/16 * 6/16 of the spike stays at the center.
        assert_eq!(blurred.get_pixel(2, 2).0[0], 225);
        assert!(blurred.get_pixel(1, 2).0[0] > 0);
    }

    #[test]
    fn otsu_separates_two_populations() {
        let img = Gray16Image::from_fn(10, 10, |x, _| Luma([if x < 5 { 8000 } else { 9000 }]));
        let t = otsu_threshold(&img);
        assert!((8000..9000).contains(&t), "threshold {}", t);
        let segmented = threshold_to_zero(&img, t);
        assert_eq!(segmented.get_pixel(0, 0).0[0], 0);
        assert_eq!(segmented.get_pixel(9, 0).0[0], 9000);
    }
}
