//! PM2.5 concentration to Air Quality Index
//!
//! Piecewise-linear interpolation over a fixed breakpoint table. The table
//! is written at 0.1 ug/m3 resolution, so a reading between two bands
//! (15.4 < ug < 15.5, ...) belongs to the lower band and is clamped to its
//! top. Interpolation uses the raw concentration; the index is rounded half
//! away from zero.

use crate::error::{Error, Result};

/// (c_low, c_high, i_low, i_high) per band
const BREAKPOINTS: [(f64, f64, u16, u16); 7] = [
    (0.0, 15.4, 0, 50),
    (15.5, 40.4, 51, 100),
    (40.5, 65.4, 101, 150),
    (65.5, 150.4, 151, 200),
    (150.5, 250.4, 201, 300),
    (250.5, 350.4, 301, 400),
    (350.5, 500.4, 401, 500),
];

/// Highest concentration covered by the table
pub const MAX_CONCENTRATION: f64 = 500.4;

/// Map a PM2.5 concentration (ug/m3) to its index
///
/// Fails with `OutOfRange` for NaN, negative values and anything above
/// [`MAX_CONCENTRATION`].
pub fn concentration_to_index(ug: f64) -> Result<u16> {
    if ug.is_nan() || ug < 0.0 || ug > MAX_CONCENTRATION {
        return Err(Error::OutOfRange(ug));
    }

    // Highest band starting at or below the reading
    let &(c_low, c_high, i_low, i_high) = BREAKPOINTS
        .iter()
        .rev()
        .find(|&&(lo, _, _, _)| lo <= ug)
        .ok_or(Error::OutOfRange(ug))?;
    let c = ug.min(c_high);

    let slope = f64::from(i_high - i_low) / (c_high - c_low);
    let index = slope * (c - c_low) + f64::from(i_low);
    Ok(index.round() as u16)
}
