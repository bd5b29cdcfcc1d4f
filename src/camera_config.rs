use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub x: u32,
    pub y: u32,
}

impl Resolution {
    pub fn new(x: u32, y: u32) -> Self {
        Resolution { x, y }
    }

    pub fn is_empty(&self) -> bool {
        self.x == 0 || self.y == 0
    }
}

fn default_queue_depth() -> usize {
    10
}

fn default_thermal_rate() -> u32 {
    9
}

fn default_visible_rate() -> u32 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ThermalCameraConfig {
    pub resolution: Resolution,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize, // Frames buffered between the hardware callback and the loop
    #[serde(default = "default_thermal_rate")]
    pub frame_rate: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VisibleCameraConfig {
    pub resolution: Resolution,         // Streaming profile
    pub capture_resolution: Resolution, // High-resolution photo profile
    #[serde(default = "default_visible_rate")]
    pub frame_rate: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CamerasConfig {
    pub thermal: ThermalCameraConfig,
    pub visible: VisibleCameraConfig,
}

impl Default for CamerasConfig {
    fn default() -> Self {
        CamerasConfig {
            thermal: ThermalCameraConfig {
                resolution: Resolution::new(160, 120),
                queue_depth: default_queue_depth(),
                frame_rate: default_thermal_rate(),
            },
            visible: VisibleCameraConfig {
                resolution: Resolution::new(640, 480),
                capture_resolution: Resolution::new(1920, 1080),
                frame_rate: default_visible_rate(),
            },
        }
    }
}
