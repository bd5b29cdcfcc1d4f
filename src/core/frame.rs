use crate::camera_config::Resolution;
use crate::core::colormap;
use image::{ImageBuffer, Luma, Rgb, RgbImage};

/// Single-channel 16-bit raw thermal frame.
pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    Rgb8,
    Gray16,
}

/// A frame as produced by a transform: either already display-ready or raw.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Rgb8(RgbImage),
    Gray16(Gray16Image),
}

impl Frame {
    pub fn width(&self) -> u32 {
        match self {
            Frame::Rgb8(img) => img.width(),
            Frame::Gray16(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Frame::Rgb8(img) => img.height(),
            Frame::Gray16(img) => img.height(),
        }
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            Frame::Rgb8(_) => SampleType::Rgb8,
            Frame::Gray16(_) => SampleType::Gray16,
        }
    }

    /// Display form of this frame, colorizing raw samples when needed.
    pub fn into_display(self) -> RgbImage {
        match self {
            Frame::Rgb8(img) => img,
            Frame::Gray16(raw) => raw_to_display(&raw),
        }
    }
}

pub fn placeholder_rgb(resolution: Resolution) -> RgbImage {
    RgbImage::new(resolution.x, resolution.y)
}

pub fn placeholder_gray16(resolution: Resolution) -> Gray16Image {
    Gray16Image::new(resolution.x, resolution.y)
}

/// Minimum and maximum sample of a raw frame, `(0, 0)` when empty.
pub fn min_max(raw: &Gray16Image) -> (u16, u16) {
    let mut iter = raw.as_raw().iter().copied();
    match iter.next() {
        Some(first) => iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))),
        None => (0, 0),
    }
}

/// Stretches the raw samples to the full 16-bit range and keeps the high byte.
/// A frame with no spread maps to zero.
pub fn normalize_to_u8(raw: &Gray16Image) -> ImageBuffer<Luma<u8>, Vec<u8>> {
    let (lo, hi) = min_max(raw);
    let range = f64::from(hi - lo);
    let scale = if range > 0.0 { 65535.0 / range } else { 0.0 };
    let data = raw
        .as_raw()
        .iter()
        .map(|&v| {
            let stretched = (f64::from(v - lo) * scale).round().min(65535.0) as u16;
            (stretched >> 8) as u8
        })
        .collect();
    ImageBuffer::from_raw(raw.width(), raw.height(), data)
        .unwrap_or_else(|| ImageBuffer::new(raw.width(), raw.height()))
}

/// Normalize-and-colorize routine shared by the display and processed paths.
pub fn raw_to_display(raw: &Gray16Image) -> RgbImage {
    let levels = normalize_to_u8(raw);
    let mut out = RgbImage::new(raw.width(), raw.height());
    for (dst, src) in out.pixels_mut().zip(levels.pixels()) {
        *dst = Rgb(colormap::inferno(src.0[0]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_of_empty_and_filled_frames() {
        assert_eq!(min_max(&Gray16Image::new(0, 0)), (0, 0));
        let raw = Gray16Image::from_fn(3, 2, |x, y| Luma([100 + (x + 3 * y) as u16 * 10]));
        assert_eq!(min_max(&raw), (100, 150));
    }

    #[test]
    fn normalization_spans_full_byte_range() {
        let raw = Gray16Image::from_fn(4, 1, |x, _| Luma([8000 + x as u16 * 100]));
        let levels = normalize_to_u8(&raw);
        assert_eq!(levels.get_pixel(0, 0).0[0], 0);
        assert_eq!(levels.get_pixel(3, 0).0[0], 255);
    }

    #[test]
    fn flat_frame_maps_to_coldest_color() {
        let raw = Gray16Image::from_pixel(2, 2, Luma([4242]));
        let display = raw_to_display(&raw);
        assert!(display.pixels().all(|p| p.0 == colormap::inferno(0)));
    }

    #[test]
    fn gray16_frames_are_colorized_for_display() {
        let raw = Gray16Image::from_fn(2, 2, |x, y| Luma([(x + y) as u16 * 1000]));
        let frame = Frame::Gray16(raw.clone());
        assert_eq!(frame.sample_type(), SampleType::Gray16);
        assert_eq!(frame.into_display(), raw_to_display(&raw));
    }
}
