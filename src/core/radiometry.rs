//! Two-point radiometric calibration for the thermal core.
//!
//! Reference raw counts `R1`/`R2` were measured at `T1`/`T2` degrees Celsius.
//! Temperatures are derived from 8-bit display levels scaled back to the
//! 14-bit sensor range.

const T1: f64 = 36.0;
const T2: f64 = 36.04;
const R1: f64 = 8250.0;
const R2: f64 = 8400.0;
const SENSOR_TO_8BIT: f64 = 16383.0 / 255.0;

/// Degrees Celsius for a mean 8-bit level, rounded to one decimal.
pub fn level_to_celsius(level: f64) -> f64 {
    let slope = (T2 - T1) / (R2 - R1);
    let offset = T2 - slope * R2;
    let temp = level * SENSOR_TO_8BIT * slope + offset;
    (temp * 10.0).round() / 10.0
}

/// Degrees Celsius for a mean raw sensor count.
pub fn raw_to_celsius(raw: f64) -> f64 {
    level_to_celsius(raw / SENSOR_TO_8BIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_points_map_back() {
        // A level that scales back to R2 must read T2.
        let level = R2 / SENSOR_TO_8BIT;
        assert!((level_to_celsius(level) - T2).abs() < 0.05);
        let level = R1 / SENSOR_TO_8BIT;
        assert!((level_to_celsius(level) - T1).abs() < 0.05);
        assert!((raw_to_celsius(R2) - T2).abs() < 0.05);
    }
}
