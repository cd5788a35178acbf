//! Crop Parameters
//!
//! Static per-crop parameters for the dual-Kc cycle: phenology thresholds,
//! geometry (height, rooting depth), management (MAD, wetted fraction,
//! curve numbers), and termination settings. The on-disk crop-parameters
//! file is column-oriented — one labelled row per parameter, one data column
//! per crop number — and loads into a [`CropStore`].

use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use dualkc_core::errors::{DualKcError, DualKcResult};
use dualkc_core::FloatValue;

use super::cells::HydrologicGroup;

/// How the planting / green-up day is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlantingMethod {
    /// First day where the year's cumulative GDD (base 0 from 1 January)
    /// reaches the crop threshold.
    Cgdd,
    /// First day where the 30-day trailing mean temperature reaches the crop
    /// threshold, inside the allowed day-of-year window.
    T30,
}

/// Ground cover left after the season ends; sets the dormant-surface Kcb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinterCoverClass {
    Bare,
    Mulched,
    Sod,
}

impl WinterCoverClass {
    /// Dormant-surface basal coefficient feeding the evaporation geometry.
    pub fn kcb(&self) -> FloatValue {
        match self {
            WinterCoverClass::Bare => 0.10,
            WinterCoverClass::Mulched => 0.05,
            WinterCoverClass::Sod => 0.20,
        }
    }
}

/// Which per-cell cutting count caps a forage crop's cutting cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CuttingSchedule {
    Dairy,
    Beef,
}

/// CO₂ response class mapping a crop onto one of the daily factor columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Co2Class {
    Grass,
    Tree,
    C4,
}

/// Static parameters for one crop.
///
/// Field values correspond one-to-one with the labelled rows of the
/// crop-parameters input file; `co2_class` is assigned from configuration,
/// not from the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropParameters {
    /// Display name used in logs and output paths.
    pub name: String,

    /// Annual crops re-enter season search every year; perennials go dormant
    /// instead of post-season.
    /// default: true
    pub is_annual: bool,

    /// Permanently in-season bare-soil/mulch/sod surface (no planting, no
    /// termination); Kcb is the winter-cover value year round.
    /// default: false
    pub is_winter_surface: bool,

    /// Kcb curve this crop evaluates.
    pub curve_id: u8,

    /// Planting / green-up selection method.
    /// default: T30
    pub planting_method: PlantingMethod,

    /// 30-day mean temperature that triggers planting under the T30 method.
    /// unit: °C
    /// default: 10.0
    pub t30_for_planting: FloatValue,

    /// Cumulative GDD from 1 January that triggers planting under the CGDD
    /// method (base 0 accumulation).
    /// unit: °C·day
    /// default: 0.0
    pub cgdd_for_planting: FloatValue,

    /// Base temperature for the crop's own GDD accumulation after planting.
    /// unit: °C
    /// default: 5.0
    pub tbase: FloatValue,

    /// Crop GDD from planting at effective full cover.
    /// unit: °C·day
    /// default: 700.0
    pub cgdd_for_efc: FloatValue,

    /// Crop GDD from planting that terminates the season.
    /// unit: °C·day
    /// default: 1800.0
    pub cgdd_for_termination: FloatValue,

    /// Days from planting to effective full cover, for time-driven curves.
    /// unit: day
    /// default: 60.0
    pub time_for_efc: FloatValue,

    /// Days from planting that terminate the season.
    /// unit: day
    /// default: 110.0
    pub time_for_harvest: FloatValue,

    /// Daily minimum temperature at or below which the season is killed.
    /// unit: °C
    /// default: -3.0
    pub killing_frost_temperature: FloatValue,

    /// Surface left after termination; selects the dormant Kcb.
    /// default: Bare
    pub winter_cover_class: WinterCoverClass,

    /// Plant height at planting.
    /// unit: m
    /// default: 0.05
    pub height_initial: FloatValue,

    /// Plant height at effective full cover and beyond.
    /// unit: m
    /// default: 1.0
    pub height_max: FloatValue,

    /// Rooting depth at planting.
    /// unit: m
    /// default: 0.15
    pub rooting_depth_initial: FloatValue,

    /// Maximum rooting depth.
    /// unit: m
    /// default: 1.1
    pub rooting_depth_max: FloatValue,

    /// Fraction of the progress variable at which root growth stops.
    /// unit: dimensionless, 0..1
    /// default: 0.7
    pub end_of_root_growth_fraction_time: FloatValue,

    /// Management-allowed depletion before effective full cover.
    /// unit: percent of TAW
    /// default: 40.0
    pub mad_initial: FloatValue,

    /// Management-allowed depletion from effective full cover on.
    /// unit: percent of TAW
    /// default: 55.0
    pub mad_midseason: FloatValue,

    /// Soil fraction wetted by an irrigation event.
    /// unit: dimensionless, 0..1
    /// default: 1.0
    pub fw_irrigation: FloatValue,

    /// SCS curve number on coarse-textured (group 1) soils.
    /// default: 65.0
    pub cn_coarse_soil: FloatValue,

    /// SCS curve number on medium-textured (group 2) soils.
    /// default: 75.0
    pub cn_medium_soil: FloatValue,

    /// SCS curve number on fine-textured (group 3) soils.
    /// default: 85.0
    pub cn_fine_soil: FloatValue,

    /// Apply the root-zone stress coefficient Ks to transpiration. Crops
    /// managed to avoid stress (or modelled without it) force Ks = 1.
    /// default: true
    pub invoke_stress: bool,

    /// Cutting-cycle cap source for forage crops; `None` disables cuttings.
    /// default: None
    pub cutting_schedule: Option<CuttingSchedule>,

    /// CO₂ factor column applied to Kcb; assigned from configuration when
    /// the CO₂ toggle is on.
    /// default: None
    pub co2_class: Option<Co2Class>,
}

impl Default for CropParameters {
    fn default() -> Self {
        Self {
            name: "Spring grain".to_string(),
            is_annual: true,
            is_winter_surface: false,
            curve_id: 1,

            // Phenology
            planting_method: PlantingMethod::T30,
            t30_for_planting: 10.0,
            cgdd_for_planting: 0.0,
            tbase: 5.0,
            cgdd_for_efc: 700.0,
            cgdd_for_termination: 1800.0,
            time_for_efc: 60.0,
            time_for_harvest: 110.0,
            killing_frost_temperature: -3.0,
            winter_cover_class: WinterCoverClass::Bare,

            // Geometry
            height_initial: 0.05,
            height_max: 1.0,
            rooting_depth_initial: 0.15,
            rooting_depth_max: 1.1,
            end_of_root_growth_fraction_time: 0.7,

            // Management
            mad_initial: 40.0,
            mad_midseason: 55.0,
            fw_irrigation: 1.0,
            cn_coarse_soil: 65.0,
            cn_medium_soil: 75.0,
            cn_fine_soil: 85.0,
            invoke_stress: true,
            cutting_schedule: None,
            co2_class: None,
        }
    }
}

impl CropParameters {
    /// MAD before effective full cover as a fraction of TAW.
    pub fn mad_initial_fraction(&self) -> FloatValue {
        (self.mad_initial / 100.0).clamp(0.0, 1.0)
    }

    /// MAD from effective full cover as a fraction of TAW.
    pub fn mad_midseason_fraction(&self) -> FloatValue {
        (self.mad_midseason / 100.0).clamp(0.0, 1.0)
    }

    /// Dormant-surface Kcb for this crop's winter cover.
    pub fn winter_kcb(&self) -> FloatValue {
        self.winter_cover_class.kcb()
    }

    /// Curve number matching a cell's hydrologic group.
    pub fn curve_number_for(&self, group: HydrologicGroup) -> FloatValue {
        match group {
            HydrologicGroup::Coarse => self.cn_coarse_soil,
            HydrologicGroup::Medium => self.cn_medium_soil,
            HydrologicGroup::Fine => self.cn_fine_soil,
        }
    }

    /// Structural sanity checks applied at store load.
    pub fn validate(&self) -> DualKcResult<()> {
        let checks: [(&str, bool); 8] = [
            ("height_max must be positive", self.height_max > 0.0),
            (
                "height_initial cannot exceed height_max",
                self.height_initial <= self.height_max,
            ),
            (
                "rooting_depth_initial must be positive",
                self.rooting_depth_initial > 0.0,
            ),
            (
                "rooting_depth_initial cannot exceed rooting_depth_max",
                self.rooting_depth_initial <= self.rooting_depth_max,
            ),
            (
                "end_of_root_growth_fraction_time must be in (0, 1]",
                self.end_of_root_growth_fraction_time > 0.0
                    && self.end_of_root_growth_fraction_time <= 1.0,
            ),
            (
                "MAD percentages must be in [0, 100]",
                (0.0..=100.0).contains(&self.mad_initial)
                    && (0.0..=100.0).contains(&self.mad_midseason),
            ),
            (
                "fw_irrigation must be in (0, 1]",
                self.fw_irrigation > 0.0 && self.fw_irrigation <= 1.0,
            ),
            (
                "curve numbers must be in (0, 100)",
                [self.cn_coarse_soil, self.cn_medium_soil, self.cn_fine_soil]
                    .iter()
                    .all(|cn| *cn > 0.0 && *cn < 100.0),
            ),
        ];
        for (message, ok) in checks {
            if !ok {
                return Err(DualKcError::Configuration(format!(
                    "crop '{}': {message}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Spatial-calibration override subset, applied to a per-cell copy of the
/// crop's parameters. Every field is optional; `None` keeps the store value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mad_initial: Option<FloatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mad_midseason: Option<FloatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t30_for_planting: Option<FloatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgdd_for_planting: Option<FloatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tbase: Option<FloatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgdd_for_efc: Option<FloatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgdd_for_termination: Option<FloatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_for_efc: Option<FloatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_for_harvest: Option<FloatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub killing_frost_temperature: Option<FloatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winter_cover_class: Option<WinterCoverClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cn_coarse_soil: Option<FloatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cn_medium_soil: Option<FloatValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cn_fine_soil: Option<FloatValue>,
}

impl CropOverride {
    /// Apply every populated field to `params`.
    pub fn apply(&self, params: &mut CropParameters) {
        macro_rules! set {
            ($field:ident) => {
                if let Some(value) = self.$field {
                    params.$field = value;
                }
            };
        }
        set!(mad_initial);
        set!(mad_midseason);
        set!(t30_for_planting);
        set!(cgdd_for_planting);
        set!(tbase);
        set!(cgdd_for_efc);
        set!(cgdd_for_termination);
        set!(time_for_efc);
        set!(time_for_harvest);
        set!(killing_frost_temperature);
        set!(winter_cover_class);
        set!(cn_coarse_soil);
        set!(cn_medium_soil);
        set!(cn_fine_soil);
    }

    pub fn is_empty(&self) -> bool {
        self == &CropOverride::default()
    }
}

/// Process-wide read-only store of crop parameters keyed by crop number.
#[derive(Debug, Clone, Default)]
pub struct CropStore {
    crops: IndexMap<u8, CropParameters>,
}

const TABLE: &str = "crop parameters";

impl CropStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, number: u8, params: CropParameters) {
        self.crops.insert(number, params);
    }

    pub fn get(&self, number: u8) -> Option<&CropParameters> {
        self.crops.get(&number)
    }

    pub fn len(&self) -> usize {
        self.crops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crops.is_empty()
    }

    /// Crop numbers in file order.
    pub fn numbers(&self) -> impl Iterator<Item = u8> + '_ {
        self.crops.keys().copied()
    }

    /// Deep copy for one cell with the override subset applied. The store
    /// itself is never mutated after load.
    pub fn resolve_for_cell(
        &self,
        number: u8,
        spatial: Option<&CropOverride>,
    ) -> Option<CropParameters> {
        let mut params = self.crops.get(&number)?.clone();
        if let Some(overrides) = spatial {
            overrides.apply(&mut params);
        }
        Some(params)
    }

    /// Load the column-oriented crop-parameters file from a path.
    pub fn from_path(path: &Path, delimiter: char) -> DualKcResult<Self> {
        let file = std::fs::File::open(path).map_err(|source| DualKcError::MissingInputFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, delimiter)
    }

    /// Load the column-oriented crop-parameters file: first row holds crop
    /// numbers (first column is the row label), each further row one
    /// parameter.
    pub fn from_reader<R: Read>(reader: R, delimiter: char) -> DualKcResult<Self> {
        let mut records = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(delimiter as u8)
            .flexible(true)
            .from_reader(reader)
            .into_records();

        let header = match records.next() {
            Some(record) => record?,
            None => {
                return Err(DualKcError::Table {
                    table: TABLE.to_string(),
                    row: 0,
                    reason: "file is empty".to_string(),
                })
            }
        };
        let mut numbers = Vec::new();
        for (column, cell) in header.iter().enumerate().skip(1) {
            let cell = cell.trim();
            if cell.is_empty() {
                continue;
            }
            let number: u8 = cell.parse().map_err(|_| DualKcError::Table {
                table: TABLE.to_string(),
                row: 0,
                reason: format!("'{cell}' is not a crop number"),
            })?;
            numbers.push((column, number));
        }
        if numbers.is_empty() {
            return Err(DualKcError::Table {
                table: TABLE.to_string(),
                row: 0,
                reason: "no crop columns in header".to_string(),
            });
        }

        let mut rows: IndexMap<String, StringRecord> = IndexMap::new();
        for (i, record) in records.enumerate() {
            let record = record?;
            let label = match record.get(0) {
                Some(label) => normalize_label(label),
                None => continue,
            };
            if label.is_empty() {
                continue;
            }
            if rows.insert(label.clone(), record).is_some() {
                return Err(DualKcError::Table {
                    table: TABLE.to_string(),
                    row: i + 1,
                    reason: format!("duplicate parameter row '{label}'"),
                });
            }
        }

        let sheet = Sheet { rows };
        let mut crops = IndexMap::new();
        for (column, number) in numbers {
            let params = sheet.build(column, number)?;
            params.validate()?;
            crops.insert(number, params);
        }
        Ok(CropStore { crops })
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Row-label access over the transposed parameter sheet.
struct Sheet {
    rows: IndexMap<String, StringRecord>,
}

impl Sheet {
    fn cell(&self, label: &str, column: usize) -> Option<&str> {
        let cell = self.rows.get(label)?.get(column)?.trim();
        if cell.is_empty() {
            None
        } else {
            Some(cell)
        }
    }

    fn text(&self, label: &str, column: usize, crop: u8) -> DualKcResult<String> {
        self.cell(label, column)
            .map(str::to_string)
            .ok_or_else(|| DualKcError::Table {
                table: TABLE.to_string(),
                row: 0,
                reason: format!("crop {crop}: missing parameter '{label}'"),
            })
    }

    fn f64(&self, label: &str, column: usize, crop: u8) -> DualKcResult<FloatValue> {
        let cell = self.text(label, column, crop)?;
        cell.parse().map_err(|_| DualKcError::Table {
            table: TABLE.to_string(),
            row: 0,
            reason: format!("crop {crop}: '{cell}' is not a number for '{label}'"),
        })
    }

    fn flag(&self, label: &str, column: usize, crop: u8) -> DualKcResult<bool> {
        let cell = self.text(label, column, crop)?;
        match cell.to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => Err(DualKcError::Table {
                table: TABLE.to_string(),
                row: 0,
                reason: format!("crop {crop}: '{other}' is not a 0/1 flag for '{label}'"),
            }),
        }
    }

    fn build(&self, column: usize, crop: u8) -> DualKcResult<CropParameters> {
        let planting_method = match self.f64("planting_method", column, crop)? as i64 {
            1 => PlantingMethod::Cgdd,
            2 => PlantingMethod::T30,
            other => {
                return Err(DualKcError::Table {
                    table: TABLE.to_string(),
                    row: 0,
                    reason: format!("crop {crop}: planting_method {other} not in {{1, 2}}"),
                })
            }
        };
        let winter_cover_class = match self.f64("winter_cover_class", column, crop)? as i64 {
            1 => WinterCoverClass::Bare,
            2 => WinterCoverClass::Mulched,
            3 => WinterCoverClass::Sod,
            other => {
                return Err(DualKcError::Table {
                    table: TABLE.to_string(),
                    row: 0,
                    reason: format!("crop {crop}: winter_cover_class {other} not in {{1, 2, 3}}"),
                })
            }
        };
        let cutting_schedule = match self.f64("cutting_schedule", column, crop)? as i64 {
            0 => None,
            1 => Some(CuttingSchedule::Dairy),
            2 => Some(CuttingSchedule::Beef),
            other => {
                return Err(DualKcError::Table {
                    table: TABLE.to_string(),
                    row: 0,
                    reason: format!("crop {crop}: cutting_schedule {other} not in {{0, 1, 2}}"),
                })
            }
        };
        let curve_id = self.f64("curve_id", column, crop)? as i64;
        if !(0..=255).contains(&curve_id) {
            return Err(DualKcError::Table {
                table: TABLE.to_string(),
                row: 0,
                reason: format!("crop {crop}: curve_id {curve_id} out of range"),
            });
        }

        Ok(CropParameters {
            name: self.text("name", column, crop)?,
            is_annual: self.flag("annual_flag", column, crop)?,
            is_winter_surface: self.flag("winter_surface_flag", column, crop)?,
            curve_id: curve_id as u8,
            planting_method,
            t30_for_planting: self.f64("t30_for_planting", column, crop)?,
            cgdd_for_planting: self.f64("cgdd_for_planting", column, crop)?,
            tbase: self.f64("tbase", column, crop)?,
            cgdd_for_efc: self.f64("cgdd_for_efc", column, crop)?,
            cgdd_for_termination: self.f64("cgdd_for_termination", column, crop)?,
            time_for_efc: self.f64("time_for_efc", column, crop)?,
            time_for_harvest: self.f64("time_for_harvest", column, crop)?,
            killing_frost_temperature: self.f64("killing_frost_temperature", column, crop)?,
            winter_cover_class,
            height_initial: self.f64("height_initial", column, crop)?,
            height_max: self.f64("height_max", column, crop)?,
            rooting_depth_initial: self.f64("rooting_depth_initial", column, crop)?,
            rooting_depth_max: self.f64("rooting_depth_max", column, crop)?,
            end_of_root_growth_fraction_time: self.f64(
                "end_of_root_growth_fraction_time",
                column,
                crop,
            )?,
            mad_initial: self.f64("mad_initial", column, crop)?,
            mad_midseason: self.f64("mad_midseason", column, crop)?,
            fw_irrigation: self.f64("fw_irrigation", column, crop)?,
            cn_coarse_soil: self.f64("cn_coarse_soil", column, crop)?,
            cn_medium_soil: self.f64("cn_medium_soil", column, crop)?,
            cn_fine_soil: self.f64("cn_fine_soil", column, crop)?,
            invoke_stress: self.flag("invoke_stress", column, crop)?,
            cutting_schedule,
            co2_class: None,
        })
    }
}
