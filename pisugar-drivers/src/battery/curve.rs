//! Li-ion discharge curve
//!
//! Maps a resting cell voltage to an estimated state of charge. Uses a
//! lookup table with integer-only linear interpolation.

/// Discharge curve of the PiSugar cell
///
/// Table format: (millivolts, percent), sorted by decreasing voltage.
const CHARGE_TABLE: &[(u16, u8)] = &[
    (4160, 100),
    (4050, 95),
    (4000, 80),
    (3920, 65),
    (3860, 40),
    (3790, 25),
    (3660, 10),
    (3520, 6),
    (3490, 3),
    (3100, 0),
];

/// Estimated charge for a cell voltage, clamped to 0..=100
pub fn charge_percent(voltage_mv: u16) -> u8 {
    let (top_mv, top_pct) = CHARGE_TABLE[0];
    if voltage_mv >= top_mv {
        return top_pct;
    }
    let (bottom_mv, bottom_pct) = CHARGE_TABLE[CHARGE_TABLE.len() - 1];
    if voltage_mv <= bottom_mv {
        return bottom_pct;
    }

    for pair in CHARGE_TABLE.windows(2) {
        let (v_high, p_high) = pair[0];
        let (v_low, p_low) = pair[1];

        if voltage_mv <= v_high && voltage_mv >= v_low {
            // pct = p_low + (p_high - p_low) * (v - v_low) / (v_high - v_low)
            let v_range = (v_high - v_low) as u32;
            let p_range = (p_high - p_low) as u32;
            let v_offset = (voltage_mv - v_low) as u32;
            return p_low + (p_range * v_offset / v_range) as u8;
        }
    }

    bottom_pct
}
