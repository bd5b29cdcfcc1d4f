use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Failed to open {sensor} sensor: {details}")]
    SensorOpen { sensor: String, details: String },

    #[error("Failed to configure {sensor} sensor: {details}")]
    SensorConfig { sensor: String, details: String },

    #[error("Streaming Error: {0}")]
    Streaming(String),

    #[error("Capture Error: {0}")]
    Capture(String),

    #[error("Plugin Error: {0}")]
    Plugin(String),

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("Frame Format Error: {0}")]
    FrameFormat(String),

    #[error("File I/O Error: {0}")]
    Io(String),

    #[error("Task Execution Error: {0}")]
    Task(String),
}

// Allow conversion from std::io::Error to AppError::Io
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Io(format!("image encoding failed: {}", err))
    }
}
