//! Inferno colormap used for the thermal display frames.
//!
//! The table is evaluated once from a 6th-degree polynomial fit of
//! matplotlib's inferno and then indexed by the 8-bit normalized sample.

use std::sync::OnceLock;

const INFERNO_COEFFS: [[f64; 3]; 7] = [
    [0.000_218_940_369_119_226_5, 0.001_651_004_631_001_012, -0.019_480_898_437_091_84],
    [0.106_513_419_485_611_6, 0.563_956_436_788_409_1, 3.932_712_388_889_277],
    [11.602_493_082_471_87, -3.972_853_965_665_698, -15.942_394_106_291_4],
    [-41.703_996_131_394_59, 17.436_398_882_053_13, 44.354_145_198_728_13],
    [77.162_935_699_427, -33.402_358_942_100_92, -81.807_309_257_389_93],
    [-71.319_428_244_992_14, 32.626_064_263_977_23, 73.209_519_858_032_02],
    [25.131_126_224_773_41, -12.242_668_952_385_67, -23.070_325_002_871_72],
];

fn inferno_at(t: f64) -> [u8; 3] {
    let mut rgb = [0u8; 3];
    for (channel, out) in rgb.iter_mut().enumerate() {
        // Horner evaluation, highest degree first
        let value = INFERNO_COEFFS
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * t + c[channel]);
        *out = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    rgb
}

fn inferno_table() -> &'static [[u8; 3]; 256] {
    static TABLE: OnceLock<[[u8; 3]; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [[0u8; 3]; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = inferno_at(i as f64 / 255.0);
        }
        table
    })
}

pub fn inferno(level: u8) -> [u8; 3] {
    inferno_table()[level as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_match_inferno() {
        // Near-black at the cold end, pale yellow at the hot end.
        let cold = inferno(0);
        assert!(cold.iter().all(|&c| c < 8), "{:?}", cold);
        let hot = inferno(255);
        assert!(hot[0] > 240 && hot[1] > 240 && hot[2] > 120 && hot[2] < 190, "{:?}", hot);
    }

    #[test]
    fn midpoint_is_red_dominant() {
        let [r, g, b] = inferno(128);
        assert!(r > g && r > b, "{:?}", [r, g, b]);
    }
}
