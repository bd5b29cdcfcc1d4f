use serde::Deserialize;
use std::time::Duration;

/// How the raw thermal `.bin` artifact treats an existing file with the same name.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RawWriteMode {
    /// Extend the file with another `[min][max][samples]` record.
    #[default]
    Append,
    /// Replace whatever was there.
    Truncate,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutSettings {
    pub frame_wait_ms: u64,
    pub handshake_ms: u64,
    pub join_ms: u64,
    pub open_retry_backoff_ms: u64,
}

impl TimeoutSettings {
    pub fn frame_wait(&self) -> Duration {
        Duration::from_millis(self.frame_wait_ms)
    }

    pub fn handshake(&self) -> Duration {
        Duration::from_millis(self.handshake_ms)
    }

    pub fn join(&self) -> Duration {
        Duration::from_millis(self.join_ms)
    }

    pub fn open_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.open_retry_backoff_ms)
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        TimeoutSettings {
            frame_wait_ms: 5_000,
            handshake_ms: 10_000,
            join_ms: 5_000,
            open_retry_backoff_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApplicationConfig {
    pub save_folder: String,
    pub filename_timestamp_format: String, // strftime format string
    pub log_level: Option<String>, // Optional so the CLI --debug flag can take precedence
    pub log_file: Option<String>,
    pub raw_write_mode: RawWriteMode,
    pub high_res_photo: bool, // Visible artifact from capture_photo() instead of the stream
    pub timeouts: TimeoutSettings,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        ApplicationConfig {
            save_folder: "./captures".to_string(),
            filename_timestamp_format: "%d_%m_%Y__%H_%M_%S".to_string(),
            log_level: Some("info".to_string()),
            log_file: None,
            raw_write_mode: RawWriteMode::Append,
            high_res_photo: true,
            timeouts: TimeoutSettings::default(),
        }
    }
}
