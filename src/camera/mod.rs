pub mod simulated_thermal;
pub mod simulated_visible;

pub use simulated_thermal::{SimThermalOptions, SimulatedThermalSensor};
pub use simulated_visible::{SimVisibleOptions, SimulatedVisibleSensor};
