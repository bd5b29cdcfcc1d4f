//! Raw thermal capture files.
//!
//! One record per save: the frame minimum and maximum as two 16-bit values,
//! then every sample in row-major order. Values use the host byte order.

use crate::app_config::RawWriteMode;
use crate::core::frame::{min_max, Gray16Image};
use crate::errors::AppError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCapture {
    pub min: u16,
    pub max: u16,
    pub samples: Vec<u16>,
}

impl RawCapture {
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|&v| f64::from(v)).sum::<f64>() / self.samples.len() as f64
    }
}

/// Bytes taken by one record of a `width` x `height` frame.
pub fn record_len(width: u32, height: u32) -> usize {
    (2 + width as usize * height as usize) * std::mem::size_of::<u16>()
}

pub fn write_raw_capture(path: &Path, raw: &Gray16Image, mode: RawWriteMode) -> Result<(), AppError> {
    let (min, max) = min_max(raw);
    let header = [min, max];
    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        RawWriteMode::Append => options.append(true),
        RawWriteMode::Truncate => options.write(true).truncate(true),
    };
    let mut file = options
        .open(path)
        .map_err(|e| AppError::Io(format!("Failed to open raw capture '{}': {}", path.display(), e)))?;
    file.write_all(bytemuck::cast_slice(&header))?;
    file.write_all(bytemuck::cast_slice(raw.as_raw().as_slice()))?;
    file.flush()?;
    debug!("Raw capture written to '{}' (min {}, max {}).", path.display(), min, max);
    Ok(())
}

/// Reads every record of a raw capture file. A trailing partial record is an
/// error.
pub fn read_raw_captures(path: &Path, width: u32, height: u32) -> Result<Vec<RawCapture>, AppError> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::Io(format!("Failed to read raw capture '{}': {}", path.display(), e)))?;
    let record = record_len(width, height);
    if bytes.len() % record != 0 {
        return Err(AppError::FrameFormat(format!(
            "'{}' is {} bytes, not a whole number of {}x{} records ({} bytes each)",
            path.display(),
            bytes.len(),
            width,
            height,
            record
        )));
    }
    Ok(bytes
        .chunks_exact(record)
        .map(|chunk| {
            let values: Vec<u16> = bytemuck::pod_collect_to_vec(chunk);
            RawCapture {
                min: values[0],
                max: values[1],
                samples: values[2..].to_vec(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use tempfile::tempdir;

    fn grid() -> Gray16Image {
        // 4x4 spanning 100..=2000
        Gray16Image::from_fn(4, 4, |x, y| {
            let i = x + 4 * y;
            Luma([match i {
                0 => 100,
                15 => 2000,
                _ => 100 + i as u16 * 100,
            }])
        })
    }

    #[test]
    fn header_carries_min_and_max() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cap_ir.bin");
        let raw = grid();
        write_raw_capture(&path, &raw, RawWriteMode::Truncate).unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, record_len(4, 4));
        let records = read_raw_captures(&path, 4, 4).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!((records[0].min, records[0].max), (100, 2000));
        assert_eq!(records[0].samples, raw.as_raw().clone());
    }

    #[test]
    fn append_mode_accumulates_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cap_ir.bin");
        write_raw_capture(&path, &grid(), RawWriteMode::Append).unwrap();
        let flat = Gray16Image::from_pixel(4, 4, Luma([7]));
        write_raw_capture(&path, &flat, RawWriteMode::Append).unwrap();

        let records = read_raw_captures(&path, 4, 4).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!((records[1].min, records[1].max), (7, 7));
        assert_eq!(records[1].mean(), 7.0);
    }

    #[test]
    fn truncate_mode_keeps_only_latest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cap_ir.bin");
        write_raw_capture(&path, &grid(), RawWriteMode::Truncate).unwrap();
        write_raw_capture(&path, &grid(), RawWriteMode::Truncate).unwrap();
        assert_eq!(read_raw_captures(&path, 4, 4).unwrap().len(), 1);
    }

    #[test]
    fn partial_record_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cap_ir.bin");
        write_raw_capture(&path, &grid(), RawWriteMode::Truncate).unwrap();
        assert!(matches!(read_raw_captures(&path, 5, 4), Err(AppError::FrameFormat(_))));
    }
}
