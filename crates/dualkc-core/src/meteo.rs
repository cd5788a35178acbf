//! Psychrometric helpers used while normalizing weather inputs
//!
//! Saturation vapor pressure follows the Magnus/Tetens form used throughout
//! FAO-56; station pressure from elevation is FAO-56 eq. 7. All temperatures
//! are °C, pressures kPa, elevations m.

/// Saturation vapor pressure at temperature `t` (°C), in kPa.
///
/// $e_s(T) = 0.6108 \exp\left(\frac{17.27 T}{T + 237.3}\right)$
pub fn sat_vapor_pressure(t: f64) -> f64 {
    0.6108 * (17.27 * t / (t + 237.3)).exp()
}

/// Dewpoint (°C) from actual vapor pressure (kPa), the inverse Magnus form.
///
/// Non-positive vapor pressures are clamped to a tiny floor rather than
/// producing NaN; the caller decides whether such data is usable.
pub fn dewpoint_from_vapor_pressure(ea: f64) -> f64 {
    let ratio = (ea.max(1e-6) / 0.6108).ln();
    237.3 * ratio / (17.27 - ratio)
}

/// Actual vapor pressure (kPa) from specific humidity `q` (kg/kg) and air
/// pressure `pa` (kPa).
pub fn vapor_pressure_from_specific_humidity(q: f64, pa: f64) -> f64 {
    q * pa / (0.622 + 0.378 * q)
}

/// Mean station air pressure (kPa) from elevation (m), FAO-56 eq. 7.
pub fn pressure_from_elevation(elevation: f64) -> f64 {
    101.3 * ((293.0 - 0.0065 * elevation) / 293.0).powf(5.26)
}

/// Daily minimum relative humidity (%) estimated from dewpoint and the day's
/// maximum temperature.
pub fn rh_min_from_dewpoint(tdew: f64, tmax: f64) -> f64 {
    let ratio = sat_vapor_pressure(tdew) / sat_vapor_pressure(tmax);
    100.0 * ratio.clamp(0.0, 1.0)
}

/// Factor scaling wind measured at height `zw` (m) to the standard 2 m,
/// FAO-56 eq. 47. Heights at or below the log-profile root return 1.0.
pub fn wind_2m_factor(zw: f64) -> f64 {
    if (zw - 2.0).abs() < 1e-9 || zw <= 0.1 {
        return 1.0;
    }
    4.87 / (67.8 * zw - 5.42).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn saturation_pressure_reference_points() {
        assert_relative_eq!(sat_vapor_pressure(0.0), 0.6108, max_relative = 1e-6);
        // FAO-56 table value at 20 °C
        assert_relative_eq!(sat_vapor_pressure(20.0), 2.338, max_relative = 1e-3);
    }

    #[test]
    fn dewpoint_inverts_saturation_pressure() {
        for t in [-10.0, 0.0, 12.5, 25.0, 35.0] {
            let ea = sat_vapor_pressure(t);
            assert_relative_eq!(dewpoint_from_vapor_pressure(ea), t, epsilon = 1e-9);
        }
    }

    #[test]
    fn pressure_at_sea_level_and_1000m() {
        assert_relative_eq!(pressure_from_elevation(0.0), 101.3, max_relative = 1e-9);
        // FAO-56 tabulates 90.0 kPa at 1000 m
        assert_relative_eq!(pressure_from_elevation(1000.0), 90.0, max_relative = 1e-3);
    }

    #[test]
    fn specific_humidity_to_vapor_pressure() {
        // q = 0.01 kg/kg at sea-level pressure
        let ea = vapor_pressure_from_specific_humidity(0.01, 101.3);
        assert_relative_eq!(ea, 0.01 * 101.3 / (0.622 + 0.00378), max_relative = 1e-12);
    }

    #[test]
    fn rh_min_is_bounded() {
        let rh = rh_min_from_dewpoint(15.0, 30.0);
        assert!(rh > 39.0 && rh < 41.0, "got {rh}");
        // Dewpoint above Tmax saturates at 100
        assert_relative_eq!(rh_min_from_dewpoint(25.0, 20.0), 100.0);
        assert!(rh_min_from_dewpoint(-40.0, 45.0) >= 0.0);
    }

    #[test]
    fn wind_profile_factor() {
        assert_relative_eq!(wind_2m_factor(2.0), 1.0);
        // 10 m measurement scales down by ~0.748
        assert_relative_eq!(wind_2m_factor(10.0), 0.748, max_relative = 1e-3);
        assert!(wind_2m_factor(3.0) < 1.0);
    }
}
