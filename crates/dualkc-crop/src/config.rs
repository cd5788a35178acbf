//! Run configuration
//!
//! A run is described by one TOML document: the simulation window, the
//! locations and shapes of the input tables, the per-station weather field
//! bindings, behaviour toggles, cell/crop filters, CO2 response classes and
//! optional per-cell crop calibration overrides. [`RunConfig`] deserializes
//! the document, fills gaps from defaults and validates the combination
//! before any input is read.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use dualkc_core::errors::{DualKcError, DualKcResult};
use dualkc_core::time::DateWindow;
use dualkc_core::units::LengthUnit;
use dualkc_core::FloatValue;

use crate::parameters::{Co2Class, CropOverride};

/// Canonical weather field keys, in the order readers probe them.
pub const WEATHER_KEYS: [&str; 13] = [
    "date",
    "tmax",
    "tmin",
    "precip",
    "snow",
    "snow_depth",
    "wind",
    "tdew",
    "q",
    "etref",
    "co2_grass",
    "co2_tree",
    "co2_c4",
];

fn parse_delimiter(label: &str) -> Option<char> {
    match label.trim().to_lowercase().as_str() {
        "tab" | "\\t" | "\t" => Some('\t'),
        "comma" | "," => Some(','),
        "semicolon" | ";" => Some(';'),
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None,
            }
        }
    }
}

/// Header and unit label bound to one canonical weather field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBinding {
    pub header: String,
    /// unit: label understood by the unit tables, e.g. "C", "mm", "m/s"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl FieldBinding {
    pub fn new(header: impl Into<String>, unit: Option<&str>) -> Self {
        Self {
            header: header.into(),
            unit: unit.map(str::to_string),
        }
    }
}

/// Locations and shape of the static input tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputPaths {
    pub cell_properties: PathBuf,
    pub cell_crop_flags: PathBuf,
    /// Optional; forage cutting caps fall to zero without it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_cuttings: Option<PathBuf>,
    pub crop_parameters: PathBuf,
    pub crop_coefficients: PathBuf,
    /// default: "tab"
    pub delimiter: String,
    /// Unit of the Elevation column in the cell table. default: "ft"
    pub elevation_units: String,
}

impl Default for InputPaths {
    fn default() -> Self {
        Self {
            cell_properties: PathBuf::from("static/cell_properties.txt"),
            cell_crop_flags: PathBuf::from("static/cell_crop_flags.txt"),
            mean_cuttings: Some(PathBuf::from("static/mean_cuttings.txt")),
            crop_parameters: PathBuf::from("static/crop_parameters.txt"),
            crop_coefficients: PathBuf::from("static/crop_coefficients.txt"),
            delimiter: "tab".to_string(),
            elevation_units: "ft".to_string(),
        }
    }
}

impl InputPaths {
    pub fn delimiter_char(&self) -> DualKcResult<char> {
        parse_delimiter(&self.delimiter).ok_or_else(|| {
            DualKcError::Configuration(format!("'{}' is not a delimiter", self.delimiter))
        })
    }

    pub fn elevation_unit(&self) -> DualKcResult<LengthUnit> {
        LengthUnit::parse(&self.elevation_units).ok_or_else(|| DualKcError::BadUnits {
            unit: self.elevation_units.clone(),
            field: "elevation".to_string(),
        })
    }
}

/// Layout of a separate reference ET daily file, one per station. When
/// configured, the station weather file no longer needs an etref column;
/// the two files are merged on date and the run covers their overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefEtConfig {
    pub directory: PathBuf,
    /// File name per station; `{id}` is replaced by the cell's ref ET id.
    /// default: "{id}_etref.csv"
    pub name_format: String,
    /// default: ","
    pub delimiter: String,
    /// Rows before the data start. default: 1
    pub header_rows: usize,
    /// 1-based row holding the column names. default: 1
    pub names_row: usize,
    /// Bindings for the "date" and "etref" keys.
    pub fields: IndexMap<String, FieldBinding>,
}

impl Default for RefEtConfig {
    fn default() -> Self {
        let mut fields = IndexMap::new();
        fields.insert("date".to_string(), FieldBinding::new("Date", None));
        fields.insert("etref".to_string(), FieldBinding::new("ETr", Some("mm")));
        Self {
            directory: PathBuf::from("etref"),
            name_format: "{id}_etref.csv".to_string(),
            delimiter: ",".to_string(),
            header_rows: 1,
            names_row: 1,
            fields,
        }
    }
}

impl RefEtConfig {
    pub fn delimiter_char(&self) -> DualKcResult<char> {
        parse_delimiter(&self.delimiter).ok_or_else(|| {
            DualKcError::Configuration(format!("'{}' is not a delimiter", self.delimiter))
        })
    }

    pub fn path_for(&self, ref_et_id: &str) -> PathBuf {
        self.directory
            .join(self.name_format.replace("{id}", ref_et_id))
    }

    pub fn binding(&self, key: &str) -> Option<&FieldBinding> {
        self.fields.get(key)
    }
}

/// Per-station daily weather series layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub directory: PathBuf,
    /// File name per station; `{id}` is replaced by the cell's ref ET id.
    /// default: "{id}_daily.csv"
    pub name_format: String,
    /// default: ","
    pub delimiter: String,
    /// Rows before the data start. default: 1
    pub header_rows: usize,
    /// 1-based row holding the column names. default: 1
    pub names_row: usize,
    /// Anemometer height above ground. unit: m, default: 2.0
    pub wind_height: FloatValue,
    /// Monthly multipliers applied to the reference ET series, Jan..Dec.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etref_ratios: Option<[FloatValue; 12]>,
    /// Separate per-station reference ET file; absent means the etref
    /// column of the station file carries the series.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_et: Option<RefEtConfig>,
    /// Canonical key → column binding; missing optional keys are estimated
    /// or left unused.
    pub fields: IndexMap<String, FieldBinding>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        let mut fields = IndexMap::new();
        fields.insert("date".to_string(), FieldBinding::new("Date", None));
        fields.insert("tmax".to_string(), FieldBinding::new("TMax", Some("C")));
        fields.insert("tmin".to_string(), FieldBinding::new("TMin", Some("C")));
        fields.insert("precip".to_string(), FieldBinding::new("Prcp", Some("mm")));
        fields.insert("snow".to_string(), FieldBinding::new("Snow", Some("mm")));
        fields.insert(
            "snow_depth".to_string(),
            FieldBinding::new("SDep", Some("mm")),
        );
        fields.insert("wind".to_string(), FieldBinding::new("Wind", Some("m/s")));
        fields.insert("tdew".to_string(), FieldBinding::new("TDew", Some("C")));
        fields.insert("etref".to_string(), FieldBinding::new("ETr", Some("mm")));
        Self {
            directory: PathBuf::from("weather"),
            name_format: "{id}_daily.csv".to_string(),
            delimiter: ",".to_string(),
            header_rows: 1,
            names_row: 1,
            wind_height: 2.0,
            etref_ratios: None,
            ref_et: None,
            fields,
        }
    }
}

impl WeatherConfig {
    pub fn delimiter_char(&self) -> DualKcResult<char> {
        parse_delimiter(&self.delimiter).ok_or_else(|| {
            DualKcError::Configuration(format!("'{}' is not a delimiter", self.delimiter))
        })
    }

    pub fn path_for(&self, ref_et_id: &str) -> PathBuf {
        self.directory
            .join(self.name_format.replace("{id}", ref_et_id))
    }

    pub fn binding(&self, key: &str) -> Option<&FieldBinding> {
        self.fields.get(key)
    }
}

/// Behaviour toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunFlags {
    /// Skip all annual crops. default: false
    pub annual_skip: bool,
    /// Skip all perennial crops. default: false
    pub perennial_skip: bool,
    /// Apply forage cutting cycles. default: true
    pub cutting: bool,
    /// Write net irrigation water requirement outputs. default: true
    pub niwr: bool,
    /// Write crop coefficient outputs. default: true
    pub kc: bool,
    /// Apply CO2 response factors. default: false
    pub co2: bool,
    /// Cap the spring planting search at the usual late-season limit.
    /// default: true
    pub gs_limit: bool,
    /// Apply per-cell crop overrides. default: false
    pub spatial_cal: bool,
    /// Drive phenology from observed instead of aridity-adjusted
    /// temperatures. default: false
    pub phenology_from_observed: bool,
}

impl Default for RunFlags {
    fn default() -> Self {
        Self {
            annual_skip: false,
            perennial_skip: false,
            cutting: true,
            niwr: true,
            kc: true,
            co2: false,
            gs_limit: true,
            spatial_cal: false,
            phenology_from_observed: false,
        }
    }
}

/// Cell id filter; `test` non-empty restricts the run to those ids.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CellFilter {
    pub skip: Vec<String>,
    pub test: Vec<String>,
}

impl CellFilter {
    pub fn admits(&self, id: &str) -> bool {
        if self.skip.iter().any(|s| s == id) {
            return false;
        }
        self.test.is_empty() || self.test.iter().any(|s| s == id)
    }
}

/// Crop number filter with the same skip/test semantics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CropFilter {
    pub skip: Vec<u8>,
    pub test: Vec<u8>,
}

impl CropFilter {
    pub fn admits(&self, number: u8) -> bool {
        if self.skip.contains(&number) {
            return false;
        }
        self.test.is_empty() || self.test.contains(&number)
    }
}

/// Crop numbers per CO2 response class. The daily factors themselves ride
/// in the weather files as co2_grass/co2_tree/co2_c4 columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Co2Config {
    pub grass: Vec<u8>,
    pub tree: Vec<u8>,
    pub c4: Vec<u8>,
}

impl Co2Config {
    /// Class assigned to a crop number by the config lists.
    pub fn class_for(&self, number: u8) -> Option<Co2Class> {
        if self.grass.contains(&number) {
            Some(Co2Class::Grass)
        } else if self.tree.contains(&number) {
            Some(Co2Class::Tree)
        } else if self.c4.contains(&number) {
            Some(Co2Class::C4)
        } else {
            None
        }
    }
}

/// Irrigation scheduling knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrrigationConfig {
    /// Fraction of the root-zone depletion refilled per event, (0, 1].
    /// default: 1.0
    pub refill_fraction: FloatValue,
}

impl Default for IrrigationConfig {
    fn default() -> Self {
        Self {
            refill_fraction: 1.0,
        }
    }
}

/// One spatially calibrated crop: the listed values replace the base
/// parameters for that crop in that cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OverrideEntry {
    pub cell: String,
    pub crop: u8,
    #[serde(flatten)]
    pub values: CropOverride,
}

/// Where and which aggregates to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// default: true
    pub daily: bool,
    /// default: true
    pub monthly: bool,
    /// default: true
    pub annual: bool,
    /// default: true
    pub growing_season: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            daily: true,
            monthly: true,
            annual: true,
            growing_season: true,
        }
    }
}

/// Complete description of one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub window: DateWindow,
    pub paths: InputPaths,
    pub weather: WeatherConfig,
    pub flags: RunFlags,
    pub cells: CellFilter,
    pub crops: CropFilter,
    pub co2: Co2Config,
    pub irrigation: IrrigationConfig,
    pub output: OutputConfig,
    pub overrides: Vec<OverrideEntry>,
}

impl RunConfig {
    pub fn from_path(path: &Path) -> DualKcResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            DualKcError::MissingInputFile {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> DualKcResult<Self> {
        let config: RunConfig = toml::from_str(text)
            .map_err(|e| DualKcError::Configuration(format!("config does not parse: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> DualKcResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DualKcError::Configuration(format!("config does not serialize: {e}")))
    }

    /// Override for one (cell, crop) pair, honoured only when spatial
    /// calibration is switched on.
    pub fn override_for(&self, cell: &str, crop: u8) -> Option<&CropOverride> {
        if !self.flags.spatial_cal {
            return None;
        }
        self.overrides
            .iter()
            .find(|entry| entry.cell == cell && entry.crop == crop)
            .map(|entry| &entry.values)
    }

    pub fn validate(&self) -> DualKcResult<()> {
        if let (Some(start), Some(end)) = (self.window.start, self.window.end) {
            if start > end {
                return Err(DualKcError::Configuration(format!(
                    "window start {start} is after end {end}"
                )));
            }
        }
        if !(self.irrigation.refill_fraction > 0.0 && self.irrigation.refill_fraction <= 1.0) {
            return Err(DualKcError::Configuration(format!(
                "refill_fraction {} must be in (0, 1]",
                self.irrigation.refill_fraction
            )));
        }
        if self.weather.wind_height <= 0.0 {
            return Err(DualKcError::Configuration(format!(
                "wind_height {} must be positive",
                self.weather.wind_height
            )));
        }
        if !self.weather.name_format.contains("{id}") {
            return Err(DualKcError::Configuration(format!(
                "weather name_format '{}' has no {{id}} placeholder",
                self.weather.name_format
            )));
        }
        self.paths.delimiter_char()?;
        self.weather.delimiter_char()?;
        if self.weather.names_row == 0 || self.weather.names_row > self.weather.header_rows {
            return Err(DualKcError::Configuration(format!(
                "names_row {} must be in 1..={}",
                self.weather.names_row, self.weather.header_rows
            )));
        }
        if let Some(ref_et) = &self.weather.ref_et {
            ref_et.delimiter_char()?;
            if !ref_et.name_format.contains("{id}") {
                return Err(DualKcError::Configuration(format!(
                    "reference ET name_format '{}' has no {{id}} placeholder",
                    ref_et.name_format
                )));
            }
            if ref_et.names_row == 0 || ref_et.names_row > ref_et.header_rows {
                return Err(DualKcError::Configuration(format!(
                    "names_row {} must be in 1..={}",
                    ref_et.names_row, ref_et.header_rows
                )));
            }
        }

        if LengthUnit::parse(&self.paths.elevation_units).is_none() {
            return Err(DualKcError::BadUnits {
                unit: self.paths.elevation_units.clone(),
                field: "elevation".to_string(),
            });
        }
        if let Some(ratios) = &self.weather.etref_ratios {
            if ratios.iter().any(|r| !(*r > 0.0)) {
                return Err(DualKcError::Configuration(
                    "etref_ratios must all be positive".to_string(),
                ));
            }
        }
        if self.flags.co2
            && self.co2.grass.is_empty()
            && self.co2.tree.is_empty()
            && self.co2.c4.is_empty()
        {
            return Err(DualKcError::Configuration(
                "co2 flag is on but no crop is assigned to a CO2 class".to_string(),
            ));
        }
        for number in self.co2.grass.iter().chain(&self.co2.tree) {
            if self.co2.c4.contains(number)
                || (self.co2.grass.contains(number) && self.co2.tree.contains(number))
            {
                return Err(DualKcError::Configuration(format!(
                    "crop {number} is listed in more than one CO2 class"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let config = RunConfig::default();
        let text = config.to_toml().unwrap();
        let back = RunConfig::from_toml(&text).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn parses_a_minimal_document() {
        let config = RunConfig::from_toml(
            r#"
            [window]
            start = "1971-01-01"
            end = "2000-12-31"

            [weather]
            directory = "met"
            name_format = "{id}.csv"
            etref_ratios = [1.0, 1.0, 1.0, 1.0, 1.0, 1.02, 1.05, 1.02, 1.0, 1.0, 1.0, 1.0]

            [flags]
            co2 = true

            [cells]
            test = ["c01"]

            [co2]
            grass = [3]
            c4 = [7]

            [[overrides]]
            cell = "c01"
            crop = 3
            mad_initial = 50.0
            "#,
        )
        .unwrap();
        assert_eq!(
            config.window.start,
            Some(chrono::NaiveDate::from_ymd_opt(1971, 1, 1).unwrap())
        );
        assert!(config.flags.co2);
        assert!(config.cells.admits("c01"));
        assert!(!config.cells.admits("c02"));
        assert_eq!(config.co2.class_for(7), Some(Co2Class::C4));
        assert_eq!(config.co2.class_for(5), None);
        // Overrides only apply once spatial calibration is on
        assert!(config.override_for("c01", 3).is_none());
        let mut config = config;
        config.flags.spatial_cal = true;
        assert_eq!(
            config.override_for("c01", 3).and_then(|o| o.mad_initial),
            Some(50.0)
        );
    }

    #[test]
    fn rejects_bad_refill_fraction() {
        let mut config = RunConfig::default();
        config.irrigation.refill_fraction = 0.0;
        assert!(matches!(
            config.validate(),
            Err(DualKcError::Configuration(_))
        ));
        config.irrigation.refill_fraction = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_co2_flag_without_class_membership() {
        let mut config = RunConfig::default();
        config.flags.co2 = true;
        assert!(matches!(
            config.validate(),
            Err(DualKcError::Configuration(_))
        ));
        config.co2.grass = vec![3];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_co2_class_membership() {
        let mut config = RunConfig::default();
        config.co2.grass = vec![3, 9];
        config.co2.c4 = vec![9];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_name_format_without_placeholder() {
        let mut config = RunConfig::default();
        config.weather.name_format = "daily.csv".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validates_the_reference_et_layout() {
        let mut config = RunConfig::default();
        config.weather.ref_et = Some(RefEtConfig::default());
        assert!(config.validate().is_ok());
        let text = config.to_toml().unwrap();
        assert_eq!(config, RunConfig::from_toml(&text).unwrap());

        let mut layout = RefEtConfig::default();
        layout.name_format = "etref.csv".to_string();
        config.weather.ref_et = Some(layout);
        assert!(config.validate().is_err());
    }

    #[test]
    fn filter_semantics() {
        let filter = CropFilter {
            skip: vec![7],
            test: vec![3, 7],
        };
        assert!(filter.admits(3));
        assert!(!filter.admits(7));
        assert!(!filter.admits(9));
    }

    #[test]
    fn delimiter_labels() {
        assert_eq!(parse_delimiter("tab"), Some('\t'));
        assert_eq!(parse_delimiter(","), Some(','));
        assert_eq!(parse_delimiter("|"), Some('|'));
        assert_eq!(parse_delimiter("nonsense"), None);
    }

}
