//! Closed unit vocabulary for the delimited inputs
//!
//! Every field in a forcing or parameter table declares its unit with one of
//! the labels below; values are converted to the canonical system on read
//! (temperature °C, water depth mm, wind m/s, radiation MJ·m⁻²·d⁻¹, vapor
//! pressure and air pressure kPa, specific humidity kg/kg).
//!
//! | Quantity    | Accepted labels                                                         |
//! |-------------|-------------------------------------------------------------------------|
//! | temperature | `C`, `K`, `F`                                                           |
//! | depth       | `mm/day`, `mm/d`, `mm`, `in`, `in/day`, `inches/day`, `in*100`, `m`, `m/day`, `m/d` |
//! | wind        | `m/s`, `mps`, `mpd`, `miles/day`, `m/day`                               |
//! | radiation   | `MJ/m2`, `MJ/m^2`, `W/m2`, `cal/cm2`, `langley`                         |
//! | humidity    | `kg/kg`, `kPa`, `mmHg`                                                  |
//! | pressure    | `kPa`, `mmHg`                                                           |
//!
//! Each conversion pair is a bijection: `from_*(to_*(x)) == x` to within
//! floating point rounding. Labels are matched case-insensitively.

const MM_PER_INCH: f64 = 25.4;
const METERS_PER_MILE: f64 = 1609.344;
const SECONDS_PER_DAY: f64 = 86400.0;
/// 1 langley = 1 cal/cm² = 0.04184 MJ/m².
const MJ_PER_LANGLEY: f64 = 0.04184;
const KPA_PER_MMHG: f64 = 0.133322;

/// Air temperature unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempUnit {
    Celsius,
    Kelvin,
    Fahrenheit,
}

impl TempUnit {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "c" => Some(TempUnit::Celsius),
            "k" => Some(TempUnit::Kelvin),
            "f" => Some(TempUnit::Fahrenheit),
            _ => None,
        }
    }

    pub fn to_celsius(&self, value: f64) -> f64 {
        match self {
            TempUnit::Celsius => value,
            TempUnit::Kelvin => value - 273.15,
            TempUnit::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
        }
    }

    pub fn from_celsius(&self, value: f64) -> f64 {
        match self {
            TempUnit::Celsius => value,
            TempUnit::Kelvin => value + 273.15,
            TempUnit::Fahrenheit => value * 9.0 / 5.0 + 32.0,
        }
    }
}

/// Water depth (or depth-rate, per day implied) unit.
///
/// Daily series carry one value per day, so `mm` and `mm/day` share a scale;
/// `in*100` is hundredths of inches as found in some station archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthUnit {
    Millimeters,
    Inches,
    InchHundredths,
    Meters,
}

impl DepthUnit {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "mm" | "mm/day" | "mm/d" => Some(DepthUnit::Millimeters),
            "in" | "in/day" | "inches/day" => Some(DepthUnit::Inches),
            "in*100" => Some(DepthUnit::InchHundredths),
            "m" | "m/day" | "m/d" => Some(DepthUnit::Meters),
            _ => None,
        }
    }

    pub fn to_mm(&self, value: f64) -> f64 {
        match self {
            DepthUnit::Millimeters => value,
            DepthUnit::Inches => value * MM_PER_INCH,
            DepthUnit::InchHundredths => value * MM_PER_INCH / 100.0,
            DepthUnit::Meters => value * 1000.0,
        }
    }

    pub fn from_mm(&self, value: f64) -> f64 {
        match self {
            DepthUnit::Millimeters => value,
            DepthUnit::Inches => value / MM_PER_INCH,
            DepthUnit::InchHundredths => value * 100.0 / MM_PER_INCH,
            DepthUnit::Meters => value / 1000.0,
        }
    }
}

/// Wind run / wind speed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindUnit {
    MetersPerSecond,
    MilesPerDay,
    MetersPerDay,
}

impl WindUnit {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "m/s" | "mps" => Some(WindUnit::MetersPerSecond),
            "mpd" | "miles/day" => Some(WindUnit::MilesPerDay),
            "m/day" => Some(WindUnit::MetersPerDay),
            _ => None,
        }
    }

    pub fn to_mps(&self, value: f64) -> f64 {
        match self {
            WindUnit::MetersPerSecond => value,
            WindUnit::MilesPerDay => value * METERS_PER_MILE / SECONDS_PER_DAY,
            WindUnit::MetersPerDay => value / SECONDS_PER_DAY,
        }
    }

    pub fn from_mps(&self, value: f64) -> f64 {
        match self {
            WindUnit::MetersPerSecond => value,
            WindUnit::MilesPerDay => value * SECONDS_PER_DAY / METERS_PER_MILE,
            WindUnit::MetersPerDay => value * SECONDS_PER_DAY,
        }
    }
}

/// Daily shortwave radiation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiationUnit {
    MegajoulesPerM2,
    WattsPerM2,
    Langleys,
}

impl RadiationUnit {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "mj/m2" | "mj/m^2" => Some(RadiationUnit::MegajoulesPerM2),
            "w/m2" => Some(RadiationUnit::WattsPerM2),
            "cal/cm2" | "langley" => Some(RadiationUnit::Langleys),
            _ => None,
        }
    }

    pub fn to_mj_per_m2(&self, value: f64) -> f64 {
        match self {
            RadiationUnit::MegajoulesPerM2 => value,
            // W/m² sustained over one day: 86400 J = 0.0864 MJ
            RadiationUnit::WattsPerM2 => value * 0.0864,
            RadiationUnit::Langleys => value * MJ_PER_LANGLEY,
        }
    }

    pub fn from_mj_per_m2(&self, value: f64) -> f64 {
        match self {
            RadiationUnit::MegajoulesPerM2 => value,
            RadiationUnit::WattsPerM2 => value / 0.0864,
            RadiationUnit::Langleys => value / MJ_PER_LANGLEY,
        }
    }
}

/// Humidity proxy unit.
///
/// The unit identifies which quantity the column holds: `kg/kg` is specific
/// humidity, `kPa`/`mmHg` are actual vapor pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HumidityUnit {
    KgPerKg,
    Kilopascals,
    MillimetersHg,
}

impl HumidityUnit {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "kg/kg" => Some(HumidityUnit::KgPerKg),
            "kpa" => Some(HumidityUnit::Kilopascals),
            "mmhg" => Some(HumidityUnit::MillimetersHg),
            _ => None,
        }
    }

    /// True when the column holds specific humidity rather than vapor
    /// pressure.
    pub fn is_specific_humidity(&self) -> bool {
        matches!(self, HumidityUnit::KgPerKg)
    }

    /// Convert a vapor-pressure reading to kPa. Specific humidity is
    /// dimensionless and passes through unchanged.
    pub fn to_kpa(&self, value: f64) -> f64 {
        match self {
            HumidityUnit::KgPerKg => value,
            HumidityUnit::Kilopascals => value,
            HumidityUnit::MillimetersHg => value * KPA_PER_MMHG,
        }
    }
}

/// Air pressure unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureUnit {
    Kilopascals,
    MillimetersHg,
}

impl PressureUnit {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "kpa" => Some(PressureUnit::Kilopascals),
            "mmhg" => Some(PressureUnit::MillimetersHg),
            _ => None,
        }
    }

    pub fn to_kpa(&self, value: f64) -> f64 {
        match self {
            PressureUnit::Kilopascals => value,
            PressureUnit::MillimetersHg => value * KPA_PER_MMHG,
        }
    }

    pub fn from_kpa(&self, value: f64) -> f64 {
        match self {
            PressureUnit::Kilopascals => value,
            PressureUnit::MillimetersHg => value / KPA_PER_MMHG,
        }
    }
}

/// Elevation unit for the cell-properties table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Meters,
    Feet,
}

impl LengthUnit {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "m" | "meters" => Some(LengthUnit::Meters),
            "ft" | "feet" => Some(LengthUnit::Feet),
            _ => None,
        }
    }

    pub fn to_m(&self, value: f64) -> f64 {
        match self {
            LengthUnit::Meters => value,
            LengthUnit::Feet => value * 0.3048,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn temperature_labels() {
        assert_eq!(TempUnit::parse("C"), Some(TempUnit::Celsius));
        assert_eq!(TempUnit::parse(" k "), Some(TempUnit::Kelvin));
        assert_eq!(TempUnit::parse("F"), Some(TempUnit::Fahrenheit));
        assert_eq!(TempUnit::parse("R"), None);
    }

    #[test]
    fn temperature_conversions() {
        assert!(is_close!(TempUnit::Fahrenheit.to_celsius(32.0), 0.0));
        assert!(is_close!(TempUnit::Fahrenheit.to_celsius(212.0), 100.0));
        assert!(is_close!(TempUnit::Kelvin.to_celsius(273.15), 0.0));
    }

    #[test]
    fn depth_label_aliases_share_a_scale() {
        for label in ["mm", "mm/day", "mm/d"] {
            assert_eq!(DepthUnit::parse(label), Some(DepthUnit::Millimeters));
        }
        for label in ["in", "in/day", "inches/day"] {
            assert_eq!(DepthUnit::parse(label), Some(DepthUnit::Inches));
        }
        assert_eq!(DepthUnit::parse("in*100"), Some(DepthUnit::InchHundredths));
        assert_eq!(DepthUnit::parse("m/d"), Some(DepthUnit::Meters));
    }

    #[test]
    fn depth_round_trip_is_identity() {
        // in → mm → in within 1e-9
        for unit in [
            DepthUnit::Millimeters,
            DepthUnit::Inches,
            DepthUnit::InchHundredths,
            DepthUnit::Meters,
        ] {
            for value in [0.0, 0.01, 1.0, 17.3, 254.0] {
                let round = unit.from_mm(unit.to_mm(value));
                assert!(
                    (round - value).abs() < 1e-9,
                    "{unit:?}: {value} -> {round}"
                );
            }
        }
    }

    #[test]
    fn hundredths_of_inches() {
        // 100 in*100 = 1 inch = 25.4 mm
        assert!(is_close!(DepthUnit::InchHundredths.to_mm(100.0), 25.4));
    }

    #[test]
    fn wind_conversions() {
        assert!(is_close!(WindUnit::MetersPerDay.to_mps(86400.0), 1.0));
        assert!(is_close!(
            WindUnit::MilesPerDay.to_mps(100.0),
            100.0 * 1609.344 / 86400.0
        ));
        let round = WindUnit::MilesPerDay.from_mps(WindUnit::MilesPerDay.to_mps(123.4));
        assert!((round - 123.4).abs() < 1e-9);
    }

    #[test]
    fn radiation_conversions() {
        assert!(is_close!(RadiationUnit::WattsPerM2.to_mj_per_m2(100.0), 8.64));
        assert!(is_close!(RadiationUnit::Langleys.to_mj_per_m2(1.0), 0.04184));
        assert_eq!(
            RadiationUnit::parse("MJ/m^2"),
            Some(RadiationUnit::MegajoulesPerM2)
        );
    }

    #[test]
    fn humidity_unit_selects_quantity() {
        assert!(HumidityUnit::KgPerKg.is_specific_humidity());
        assert!(!HumidityUnit::Kilopascals.is_specific_humidity());
        assert!(is_close!(
            HumidityUnit::MillimetersHg.to_kpa(760.0),
            760.0 * 0.133322
        ));
    }

    #[test]
    fn pressure_round_trip() {
        let kpa = PressureUnit::MillimetersHg.to_kpa(700.0);
        let back = PressureUnit::MillimetersHg.from_kpa(kpa);
        assert!((back - 700.0).abs() < 1e-9);
    }

    #[test]
    fn elevation_feet_to_meters() {
        assert!(is_close!(LengthUnit::Feet.to_m(1000.0), 304.8));
        assert!(is_close!(LengthUnit::Meters.to_m(1500.0), 1500.0));
    }
}
