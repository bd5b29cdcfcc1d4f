use crate::common::timestamp_utils;
use crate::errors::AppError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// `<dir>/<timestamp>`, the shared prefix of every artifact written by one save.
pub fn timestamped_prefix(dir: &Path, timestamp_format: &str) -> PathBuf {
    dir.join(timestamp_utils::current_local_timestamp_str(timestamp_format))
}

/// Appends `suffix` to the final component of `prefix` ("P" -> "P_ir.png").
pub fn artifact_path(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

pub fn ensure_output_directory(dir_path_str: &str) -> Result<PathBuf, AppError> {
    let dir_path = PathBuf::from(dir_path_str);
    if !dir_path.exists() {
        debug!("Output directory '{}' does not exist, attempting to create it.", dir_path.display());
        std::fs::create_dir_all(&dir_path).map_err(|e| {
            AppError::Io(format!(
                "Failed to create output directory '{}': {}",
                dir_path.display(),
                e
            ))
        })?;
    } else if !dir_path.is_dir() {
        return Err(AppError::Io(format!(
            "Output path '{}' exists but is not a directory.",
            dir_path.display()
        )));
    }
    Ok(dir_path)
}
