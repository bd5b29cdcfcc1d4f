//! Built-in thermal transforms.

pub mod contours_detection;
pub mod filters;
pub mod temperature_segmentation;

pub use contours_detection::ContoursDetection;
pub use temperature_segmentation::TemperatureSegmentation;
