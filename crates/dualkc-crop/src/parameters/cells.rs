//! Cell properties, crop flags, and mean cuttings
//!
//! Three tab-delimited tables describe the simulation domain: one row per
//! cell with soil and siting properties, a flag matrix marking which crops
//! each cell runs (plus its irrigation flag), and per-cell mean dairy/beef
//! cutting counts for forage crops. They merge into one [`CellStore`].

use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use indexmap::IndexMap;
use tracing::warn;

use dualkc_core::errors::{DualKcError, DualKcResult};
use dualkc_core::schema::{FieldSpec, TableSchema};
use dualkc_core::table::{read_table, read_table_from, Table};
use dualkc_core::units::LengthUnit;
use dualkc_core::FloatValue;

/// Soil texture class mapped from the cell table's 1..3 group index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrologicGroup {
    Coarse,
    Medium,
    Fine,
}

impl HydrologicGroup {
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            1 => Some(HydrologicGroup::Coarse),
            2 => Some(HydrologicGroup::Medium),
            3 => Some(HydrologicGroup::Fine),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            HydrologicGroup::Coarse => 1,
            HydrologicGroup::Medium => 2,
            HydrologicGroup::Fine => 3,
        }
    }
}

/// Per-cell dairy/beef cutting counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeanCuttings {
    pub dairy: u32,
    pub beef: u32,
}

/// Static properties of one simulation cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellProperties {
    pub id: String,
    pub name: String,
    /// Station id of the reference-ET / weather series this cell reads.
    pub ref_et_id: String,
    /// Degrees, negative in the southern hemisphere.
    pub latitude: FloatValue,
    pub longitude: FloatValue,
    /// Meters above sea level.
    pub elevation: FloatValue,
    pub permeability: FloatValue,
    /// Available water capacity, mm of water per mm of soil.
    pub awc: FloatValue,
    /// Station soil depth, as provided.
    pub soil_depth: FloatValue,
    pub hydro_group_letter: String,
    pub hydro_group: HydrologicGroup,
    /// 0..100; positive ratings cool station temperatures by the monthly
    /// aridity pattern.
    pub aridity_rating: FloatValue,
    pub irrigation_flag: bool,
    /// Active crop numbers, in flag-matrix order.
    pub crop_flags: Vec<u8>,
    pub cuttings: MeanCuttings,
}

impl CellProperties {
    pub fn is_northern(&self) -> bool {
        self.latitude >= 0.0
    }

    /// Total evaporable water of the surface skin, mm. Linear fit in AWC
    /// clamped to the FAO-56 table range.
    pub fn tew(&self) -> FloatValue {
        (66.0 * self.awc + 1.0).clamp(6.0, 12.0)
    }

    /// Readily evaporable water of the surface skin, mm; kept at least 1 mm
    /// below TEW so the Kr slope stays finite.
    pub fn rew(&self) -> FloatValue {
        let rew = (60.0 * self.awc - 2.0).clamp(2.0, 10.0);
        rew.min(self.tew() - 1.0)
    }
}

fn properties_schema(delimiter: char) -> TableSchema {
    TableSchema::new("cell properties")
        .with_delimiter(delimiter)
        .with_field(FieldSpec::required("cell_id", "ET Cell ID", None))
        .with_field(FieldSpec::required("cell_name", "ET Cell Name", None))
        .with_field(FieldSpec::required("ref_et_id", "Ref ET ID", None))
        .with_field(FieldSpec::required("latitude", "Latitude", None))
        .with_field(FieldSpec::required("longitude", "Longitude", None))
        .with_field(FieldSpec::required("elevation", "Elevation", None))
        .with_field(FieldSpec::required(
            "permeability",
            "Area Weighted Average Permeability",
            None,
        ))
        .with_field(FieldSpec::required(
            "awc",
            "Area Weighted Average WHC",
            Some("in/ft"),
        ))
        .with_field(FieldSpec::required("soil_depth", "Average Soil Depth", None))
        .with_field(FieldSpec::required(
            "hydro_letter",
            "Hydrologic Group (A-C)",
            None,
        ))
        .with_field(FieldSpec::required(
            "hydro_group",
            "Hydrologic Group (1-3)",
            None,
        ))
        .with_field(FieldSpec::required("aridity", "Aridity Rating", None))
}

fn cuttings_schema(delimiter: char) -> TableSchema {
    TableSchema::new("mean cuttings")
        .with_delimiter(delimiter)
        .with_field(FieldSpec::required("cell_id", "ET Cell ID", None))
        .with_field(FieldSpec::optional("cell_name", "ET Cell Name", None))
        .with_field(FieldSpec::optional("latitude", "Latitude", None))
        .with_field(FieldSpec::required("dairy", "Number Dairy", None))
        .with_field(FieldSpec::required("beef", "Number Beef", None))
}

/// Crop-flag matrix: fixed leading columns then one 0/1 column per crop
/// number taken from the header row.
#[derive(Debug, Clone)]
struct FlagMatrix {
    /// cell id → (irrigation flag, active crop numbers)
    rows: IndexMap<String, (bool, Vec<u8>)>,
}

const FLAGS_TABLE: &str = "cell crop flags";

fn read_flag_matrix<R: Read>(reader: R, delimiter: char) -> DualKcResult<FlagMatrix> {
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
                table: FLAGS_TABLE.to_string(),
                row: 0,
                reason: "file is empty".to_string(),
            })
        }
    };
    // Columns 0..=3 are cell id, name, ref id, irrigation flag
    let mut crop_columns = Vec::new();
    for (column, cell) in header.iter().enumerate().skip(4) {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        let number: u8 = cell.parse().map_err(|_| DualKcError::Table {
            table: FLAGS_TABLE.to_string(),
            row: 0,
            reason: format!("'{cell}' is not a crop number in the header"),
        })?;
        crop_columns.push((column, number));
    }

    let mut rows = IndexMap::new();
    for (i, record) in records.enumerate() {
        let record = record?;
        let id = match record.get(0).map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => continue,
        };
        let irrigation = matches!(record.get(3).map(str::trim), Some("1"));
        let mut active = Vec::new();
        for (column, number) in &crop_columns {
            match record.get(*column).map(str::trim) {
                Some("1") => active.push(*number),
                Some("0") | Some("") | None => {}
                Some(other) => {
                    return Err(DualKcError::Table {
                        table: FLAGS_TABLE.to_string(),
                        row: i + 1,
                        reason: format!("crop {number}: '{other}' is not a 0/1 flag"),
                    })
                }
            }
        }
        rows.insert(id, (irrigation, active));
    }
    Ok(FlagMatrix { rows })
}

/// All cells of a run, keyed by cell id in table order.
#[derive(Debug, Clone, Default)]
pub struct CellStore {
    cells: IndexMap<String, CellProperties>,
}

impl CellStore {
    pub fn get(&self, id: &str) -> Option<&CellProperties> {
        self.cells.get(id)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CellProperties> {
        self.cells.values()
    }

    /// Load and merge the three domain tables from paths.
    pub fn load(
        properties: &Path,
        crop_flags: &Path,
        mean_cuttings: Option<&Path>,
        delimiter: char,
        elevation_unit: LengthUnit,
    ) -> DualKcResult<Self> {
        let props = read_table(properties, &properties_schema(delimiter))?;
        let file = std::fs::File::open(crop_flags).map_err(|source| {
            DualKcError::MissingInputFile {
                path: crop_flags.to_path_buf(),
                source,
            }
        })?;
        let flags = read_flag_matrix(file, delimiter)?;
        let cuttings = match mean_cuttings {
            Some(path) => Some(read_table(path, &cuttings_schema(delimiter))?),
            None => None,
        };
        Self::assemble(&props, &flags, cuttings.as_ref(), elevation_unit)
    }

    /// In-memory variant used by tests.
    pub fn from_readers<R1: Read, R2: Read, R3: Read>(
        properties: R1,
        crop_flags: R2,
        mean_cuttings: Option<R3>,
        delimiter: char,
        elevation_unit: LengthUnit,
    ) -> DualKcResult<Self> {
        let props = read_table_from(properties, &properties_schema(delimiter))?;
        let flags = read_flag_matrix(crop_flags, delimiter)?;
        let cuttings = match mean_cuttings {
            Some(reader) => Some(read_table_from(reader, &cuttings_schema(delimiter))?),
            None => None,
        };
        Self::assemble(&props, &flags, cuttings.as_ref(), elevation_unit)
    }

    fn assemble(
        props: &Table,
        flags: &FlagMatrix,
        cuttings: Option<&Table>,
        elevation_unit: LengthUnit,
    ) -> DualKcResult<Self> {
        let mut cutting_rows: IndexMap<String, MeanCuttings> = IndexMap::new();
        if let Some(table) = cuttings {
            for row in 0..table.num_rows() {
                let id = table.require(row, "cell_id")?.to_string();
                let dairy = table.require_f64(row, "dairy")?.round().max(0.0) as u32;
                let beef = table.require_f64(row, "beef")?.round().max(0.0) as u32;
                cutting_rows.insert(id, MeanCuttings { dairy, beef });
            }
        }

        let mut cells = IndexMap::new();
        for row in 0..props.num_rows() {
            let id = props.require(row, "cell_id")?.to_string();
            let group_index = props.require_f64(row, "hydro_group")? as i64;
            let hydro_group =
                HydrologicGroup::from_index(group_index).ok_or_else(|| DualKcError::Table {
                    table: props.name().to_string(),
                    row,
                    reason: format!("hydrologic group {group_index} not in 1..3"),
                })?;

            let (irrigation_flag, crop_flags) = match flags.rows.get(&id) {
                Some((irrigation, active)) => (*irrigation, active.clone()),
                None => {
                    warn!(cell = %id, "no crop-flag row; cell carries no crops");
                    (false, Vec::new())
                }
            };
            let cuttings = match cutting_rows.get(&id) {
                Some(counts) => *counts,
                None => {
                    if cuttings.is_some() {
                        warn!(cell = %id, "no mean-cuttings row; cutting cap is zero");
                    }
                    MeanCuttings::default()
                }
            };

            // WHC arrives in inches of water per foot of soil
            let awc = props.require_f64(row, "awc")? / 12.0;
            let cell = CellProperties {
                id: id.clone(),
                name: props.require(row, "cell_name")?.to_string(),
                ref_et_id: props.require(row, "ref_et_id")?.to_string(),
                latitude: props.require_f64(row, "latitude")?,
                longitude: props.require_f64(row, "longitude")?,
                elevation: elevation_unit.to_m(props.require_f64(row, "elevation")?),
                permeability: props.require_f64(row, "permeability")?,
                awc,
                soil_depth: props.require_f64(row, "soil_depth")?,
                hydro_group_letter: props.require(row, "hydro_letter")?.to_string(),
                hydro_group,
                aridity_rating: props.require_f64(row, "aridity")?.clamp(0.0, 100.0),
                irrigation_flag,
                crop_flags,
                cuttings,
            };
            cells.insert(id, cell);
        }
        Ok(CellStore { cells })
    }
}
