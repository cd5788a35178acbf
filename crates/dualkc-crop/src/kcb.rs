//! Basal coefficient climate formulas
//!
//! The tabulated basal coefficients assume a sub-humid, light-wind
//! reference climate (RHmin 45 %, u2 2 m/s). These helpers shift a day's
//! Kcb and ceiling Kc for the actual wind and humidity, scaled by canopy
//! height, and convert the result into the effective fraction of ground
//! cover.

use dualkc_core::FloatValue;

/// Coefficient floor representing a dry, bare surface.
pub const KC_MIN: FloatValue = 0.15;

/// Basal coefficients at or below this need no climate shift.
const ADJUST_THRESHOLD: FloatValue = 0.45;

/// Additive climate term shared by the Kcb shift and the Kc ceiling.
///
/// Inputs are clamped to the calibration range: u2 to 1.5..6 m/s, RHmin to
/// 25..80 %, height to 0.1..10 m.
pub fn climate_correction(u2: FloatValue, rh_min: FloatValue, height: FloatValue) -> FloatValue {
    let u2 = u2.clamp(1.5, 6.0);
    let rh_min = rh_min.clamp(25.0, 80.0);
    let height = height.clamp(0.1, 10.0);
    (0.04 * (u2 - 2.0) - 0.004 * (rh_min - 45.0)) * (height / 3.0).powf(0.3)
}

/// Kcb shifted for the day's climate. Values at or below the threshold
/// describe mostly bare ground and pass through unchanged.
pub fn adjust_kcb(
    kcb: FloatValue,
    u2: FloatValue,
    rh_min: FloatValue,
    height: FloatValue,
) -> FloatValue {
    if kcb <= ADJUST_THRESHOLD {
        return kcb.max(0.0);
    }
    (kcb + climate_correction(u2, rh_min, height)).max(0.0)
}

/// Upper bound on Kc for the day; never less than Kcb plus a wet-surface
/// margin.
pub fn kc_max(
    kcb: FloatValue,
    u2: FloatValue,
    rh_min: FloatValue,
    height: FloatValue,
) -> FloatValue {
    let ceiling = 1.2 + climate_correction(u2, rh_min, height);
    ceiling.max(kcb + 0.05)
}

/// Effective fraction of ground covered by vegetation.
pub fn fraction_cover(kcb: FloatValue, kc_max: FloatValue, height: FloatValue) -> FloatValue {
    if kc_max <= KC_MIN {
        return 0.0;
    }
    let ratio = ((kcb - KC_MIN) / (kc_max - KC_MIN)).clamp(0.0, 1.0);
    let exponent = 1.0 + 0.5 * height.max(0.0);
    ratio.powf(exponent).clamp(0.0, 1.0)
}
