use serde::Deserialize;
use std::fs;
use crate::app_config::ApplicationConfig;
use crate::camera_config::{CamerasConfig, Resolution};
use anyhow::{Result, Context, bail};
use tracing::{debug, info};
use std::time::Instant;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MasterConfig {
    #[serde(rename = "application", default)]
    pub app_settings: ApplicationConfig,
    #[serde(default)]
    pub cameras: CamerasConfig,
}

pub fn load_config(path: &str) -> Result<MasterConfig> {
    debug!("📄 Attempting to load config from: {}", path);
    let start_time = Instant::now();

    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file '{}'. 📖", path))?;
    debug!("Read config file in {:?}", start_time.elapsed());

    let config = parse_config(&config_str)
        .with_context(|| format!("Invalid configuration in '{}'", path))?;

    info!("✅ Successfully loaded and validated configuration from '{}' in {:?}", path, start_time.elapsed());
    Ok(config)
}

pub fn parse_config(config_str: &str) -> Result<MasterConfig> {
    let config: MasterConfig = serde_yaml::from_str(config_str)
        .context("Failed to parse YAML configuration. 💔")?;
    validate_master_config(&config).context("Master configuration validation failed 👎")?;
    Ok(config)
}

fn validate_resolution(label: &str, resolution: &Resolution) -> Result<()> {
    if resolution.is_empty() {
        bail!("❌ {} resolution must be non-zero, got {}x{}.", label, resolution.x, resolution.y);
    }
    Ok(())
}

fn validate_master_config(config: &MasterConfig) -> Result<()> {
    debug!("🕵️ Validating master configuration...");
    let app = &config.app_settings;
    if app.save_folder.trim().is_empty() {
        bail!("❌ Application save_folder cannot be empty.");
    }
    if app.filename_timestamp_format.is_empty() {
        bail!("❌ Application filename_timestamp_format cannot be empty.");
    }
    let timeouts = &app.timeouts;
    if timeouts.frame_wait_ms == 0
        || timeouts.handshake_ms == 0
        || timeouts.join_ms == 0
        || timeouts.open_retry_backoff_ms == 0
    {
        bail!("❌ Timeouts must be greater than zero: {:?}", timeouts);
    }

    let thermal = &config.cameras.thermal;
    validate_resolution("Thermal", &thermal.resolution)?;
    if thermal.queue_depth == 0 {
        bail!("❌ Thermal queue_depth must be at least 1.");
    }
    if thermal.frame_rate == 0 {
        bail!("❌ Thermal frame_rate must be greater than zero.");
    }

    let visible = &config.cameras.visible;
    validate_resolution("Visible", &visible.resolution)?;
    validate_resolution("Visible capture", &visible.capture_resolution)?;
    if visible.frame_rate == 0 {
        bail!("❌ Visible frame_rate must be greater than zero.");
    }
    debug!("👍 Master configuration validated.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::RawWriteMode;

    const SAMPLE: &str = r#"
application:
  save_folder: ./out
  raw_write_mode: truncate
  high_res_photo: false
  timeouts:
    handshake_ms: 2500
cameras:
  thermal:
    resolution: { x: 160, y: 120 }
  visible:
    resolution: { x: 640, y: 480 }
    capture_resolution: { x: 2028, y: 1520 }
"#;

    #[test]
    fn parses_sample_with_defaults() {
        let cfg = parse_config(SAMPLE).unwrap();
        assert_eq!(cfg.app_settings.save_folder, "./out");
        assert_eq!(cfg.app_settings.raw_write_mode, RawWriteMode::Truncate);
        assert!(!cfg.app_settings.high_res_photo);
        assert_eq!(cfg.app_settings.timeouts.handshake_ms, 2500);
        // Untouched timeouts keep their defaults.
        assert_eq!(cfg.app_settings.timeouts.frame_wait_ms, 5000);
        assert_eq!(cfg.cameras.thermal.queue_depth, 10);
        assert_eq!(cfg.cameras.visible.frame_rate, 30);
        assert_eq!(cfg.app_settings.filename_timestamp_format, "%d_%m_%Y__%H_%M_%S");
    }

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = parse_config("{}").unwrap();
        assert_eq!(cfg.app_settings.raw_write_mode, RawWriteMode::Append);
        assert_eq!(cfg.cameras.thermal.resolution, Resolution::new(160, 120));
    }

    #[test]
    fn rejects_zero_queue_depth() {
        let doc = SAMPLE.replace("resolution: { x: 160, y: 120 }", "resolution: { x: 160, y: 120 }\n    queue_depth: 0");
        let err = parse_config(&doc).unwrap_err();
        assert!(format!("{:#}", err).contains("queue_depth"));
    }

    #[test]
    fn rejects_zero_retry_backoff() {
        let doc = SAMPLE.replace("handshake_ms: 2500", "handshake_ms: 2500\n    open_retry_backoff_ms: 0");
        let err = parse_config(&doc).unwrap_err();
        assert!(format!("{:#}", err).contains("open_retry_backoff_ms"));
    }

    #[test]
    fn rejects_zero_resolution() {
        let doc = SAMPLE.replace("{ x: 640, y: 480 }", "{ x: 0, y: 480 }");
        assert!(parse_config(&doc).is_err());
    }
}
