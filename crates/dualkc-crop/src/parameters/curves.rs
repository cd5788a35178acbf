//! Kcb Curves
//!
//! Each crop references one tabulated basal-coefficient curve. A curve is an
//! ordered list of `(progress key, Kcb)` points evaluated by linear
//! interpolation; the progress variable depends on the curve kind:
//!
//! - `NormalizedCgdd`: crop GDD from planting divided by GDD-to-EFC
//!   (1.0 = effective full cover)
//! - `PercentTimeFromPlant`: percent of `time_for_harvest` elapsed
//! - `PercentTimeToEfc`: percent of `time_for_efc` elapsed; runs past 100
//! - `CgddFromPlant`: absolute crop GDD from planting
//!
//! Below the first key the first value applies; past the last key the last
//! tabulated value holds until a termination trigger ends the season.

use std::io::Read;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use dualkc_core::errors::{DualKcError, DualKcResult};
use dualkc_core::schema::{FieldSpec, TableSchema};
use dualkc_core::table::{read_table, read_table_from, Table};
use dualkc_core::FloatValue;

/// Progress variable a curve is indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveKind {
    NormalizedCgdd,
    PercentTimeFromPlant,
    PercentTimeToEfc,
    CgddFromPlant,
}

impl CurveKind {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "ncgdd" | "normalized_cgdd" => Some(CurveKind::NormalizedCgdd),
            "percent_time_from_plant" | "%time_from_plant" => Some(CurveKind::PercentTimeFromPlant),
            "percent_time_to_efc" | "%time_to_efc" => Some(CurveKind::PercentTimeToEfc),
            "cgdd_from_plant" | "cgdd" => Some(CurveKind::CgddFromPlant),
            _ => None,
        }
    }

    /// Whether the progress variable is elapsed time rather than GDD.
    pub fn is_time_based(&self) -> bool {
        matches!(
            self,
            CurveKind::PercentTimeFromPlant | CurveKind::PercentTimeToEfc
        )
    }
}

/// One tabulated Kcb curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KcbCurve {
    pub id: u8,
    pub kind: CurveKind,
    points: Vec<(FloatValue, FloatValue)>,
    /// Progress key the curve restarts from after a cutting; 0 when unset.
    pub regrowth_key: Option<FloatValue>,
}

impl KcbCurve {
    /// Build a curve, checking that keys strictly increase and Kcb values
    /// are non-negative.
    pub fn new(
        id: u8,
        kind: CurveKind,
        points: Vec<(FloatValue, FloatValue)>,
        regrowth_key: Option<FloatValue>,
    ) -> DualKcResult<Self> {
        if points.len() < 2 {
            return Err(DualKcError::Configuration(format!(
                "curve {id}: at least two points required, got {}",
                points.len()
            )));
        }
        for pair in points.windows(2) {
            if pair[1].0 <= pair[0].0 {
                return Err(DualKcError::Configuration(format!(
                    "curve {id}: progress keys must strictly increase ({} then {})",
                    pair[0].0, pair[1].0
                )));
            }
        }
        if let Some((key, kcb)) = points.iter().find(|(_, kcb)| *kcb < 0.0) {
            return Err(DualKcError::Configuration(format!(
                "curve {id}: negative Kcb {kcb} at key {key}"
            )));
        }
        Ok(Self {
            id,
            kind,
            points,
            regrowth_key,
        })
    }

    pub fn first_key(&self) -> FloatValue {
        self.points[0].0
    }

    pub fn last_key(&self) -> FloatValue {
        self.points[self.points.len() - 1].0
    }

    /// Kcb at the first tabulated point.
    pub fn first_kcb(&self) -> FloatValue {
        self.points[0].1
    }

    /// Largest tabulated Kcb.
    pub fn peak_kcb(&self) -> FloatValue {
        self.points.iter().map(|(_, kcb)| *kcb).fold(0.0, f64::max)
    }

    /// Kcb at `progress`: linear interpolation between bracketing points,
    /// clamped to the first value below the table and held at the last value
    /// beyond it.
    pub fn evaluate(&self, progress: FloatValue) -> FloatValue {
        let first = self.points[0];
        if progress <= first.0 {
            return first.1;
        }
        for pair in self.points.windows(2) {
            let (k0, v0) = pair[0];
            let (k1, v1) = pair[1];
            if progress <= k1 {
                let t = (progress - k0) / (k1 - k0);
                return v0 + t * (v1 - v0);
            }
        }
        self.points[self.points.len() - 1].1
    }
}

/// Read-only store of Kcb curves keyed by curve id.
#[derive(Debug, Clone, Default)]
pub struct CurveStore {
    curves: IndexMap<u8, KcbCurve>,
}

fn curve_schema() -> TableSchema {
    TableSchema::new("kcb curves")
        .with_field(FieldSpec::required("curve_id", "Curve ID", None))
        .with_field(FieldSpec::required("curve_type", "Curve Type", None))
        .with_field(FieldSpec::required("progress", "Progress", None))
        .with_field(FieldSpec::required("kcb", "Kcb", None))
        .with_field(FieldSpec::optional("regrowth", "Regrowth", None))
}

impl CurveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, curve: KcbCurve) {
        self.curves.insert(curve.id, curve);
    }

    pub fn get(&self, id: u8) -> Option<&KcbCurve> {
        self.curves.get(&id)
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    pub fn from_path(path: &Path, delimiter: char) -> DualKcResult<Self> {
        let schema = curve_schema().with_delimiter(delimiter);
        Self::from_table(&read_table(path, &schema)?)
    }

    pub fn from_reader<R: Read>(reader: R, delimiter: char) -> DualKcResult<Self> {
        let schema = curve_schema().with_delimiter(delimiter);
        Self::from_table(&read_table_from(reader, &schema)?)
    }

    /// Assemble curves from the long-format table: one row per point, rows
    /// of one curve contiguous and in key order.
    fn from_table(table: &Table) -> DualKcResult<Self> {
        struct Partial {
            kind: CurveKind,
            points: Vec<(FloatValue, FloatValue)>,
            regrowth_key: Option<FloatValue>,
        }
        let mut partials: IndexMap<u8, Partial> = IndexMap::new();

        for row in 0..table.num_rows() {
            let id = table.require_f64(row, "curve_id")? as i64;
            if !(0..=255).contains(&id) {
                return Err(DualKcError::Table {
                    table: table.name().to_string(),
                    row,
                    reason: format!("curve id {id} out of range"),
                });
            }
            let id = id as u8;
            let kind_label = table.require(row, "curve_type")?;
            let kind = CurveKind::parse(kind_label).ok_or_else(|| DualKcError::Table {
                table: table.name().to_string(),
                row,
                reason: format!("unknown curve type '{kind_label}'"),
            })?;
            let key = table.require_f64(row, "progress")?;
            let kcb = table.require_f64(row, "kcb")?;
            let regrowth = matches!(table.f64_at(row, "regrowth")?, Some(flag) if flag != 0.0);

            let partial = partials.entry(id).or_insert_with(|| Partial {
                kind,
                points: Vec::new(),
                regrowth_key: None,
            });
            if partial.kind != kind {
                return Err(DualKcError::Table {
                    table: table.name().to_string(),
                    row,
                    reason: format!("curve {id}: mixed curve types"),
                });
            }
            if regrowth {
                partial.regrowth_key = Some(key);
            }
            partial.points.push((key, kcb));
        }

        let mut store = CurveStore::new();
        for (id, partial) in partials {
            store.insert(KcbCurve::new(
                id,
                partial.kind,
                partial.points,
                partial.regrowth_key,
            )?);
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    fn ncgdd_curve() -> KcbCurve {
        KcbCurve::new(
            1,
            CurveKind::NormalizedCgdd,
            vec![(0.0, 0.15), (0.25, 0.15), (1.0, 1.15), (1.5, 0.3)],
            None,
        )
        .unwrap()
    }

    #[test]
    fn interpolates_between_points() {
        let curve = ncgdd_curve();
        // Halfway from (0.25, 0.15) to (1.0, 1.15)
        let mid = curve.evaluate(0.625);
        assert!(is_close!(mid, 0.65), "got {mid}");
        assert!(is_close!(curve.evaluate(1.0), 1.15));
    }

    #[test]
    fn clamps_below_and_holds_past_the_table() {
        let curve = ncgdd_curve();
        assert!(is_close!(curve.evaluate(-0.5), 0.15));
        // Past the last key the final value holds until termination
        assert!(is_close!(curve.evaluate(2.4), 0.3));
    }

    #[test]
    fn peak_kcb_is_table_maximum() {
        assert!(is_close!(ncgdd_curve().peak_kcb(), 1.15));
    }

    #[test]
    fn rejects_non_increasing_keys() {
        let err = KcbCurve::new(
            9,
            CurveKind::CgddFromPlant,
            vec![(0.0, 0.2), (100.0, 0.4), (100.0, 0.5)],
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("strictly increase"));
    }

    #[test]
    fn rejects_negative_kcb() {
        let err = KcbCurve::new(
            9,
            CurveKind::NormalizedCgdd,
            vec![(0.0, 0.1), (1.0, -0.2)],
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("negative Kcb"));
    }

    #[test]
    fn loads_long_format_table() {
        let data = "\
Curve ID,Curve Type,Progress,Kcb,Regrowth
2,ncgdd,0.0,0.2,0
2,ncgdd,0.5,0.8,0
2,ncgdd,1.0,1.1,0
2,ncgdd,1.2,0.25,1
5,percent_time_from_plant,0,0.15,
5,percent_time_from_plant,40,1.0,
5,percent_time_from_plant,100,0.35,
";
        let store = CurveStore::from_reader(data.as_bytes(), ',').unwrap();
        assert_eq!(store.len(), 2);

        let alfalfa = store.get(2).unwrap();
        assert_eq!(alfalfa.kind, CurveKind::NormalizedCgdd);
        assert_eq!(alfalfa.regrowth_key, Some(1.2));

        let corn = store.get(5).unwrap();
        assert!(corn.kind.is_time_based());
        assert!(is_close!(corn.evaluate(70.0), 0.675));
        assert_eq!(corn.regrowth_key, None);
    }

    #[test]
    fn mixed_kinds_for_one_curve_fail() {
        let data = "\
Curve ID,Curve Type,Progress,Kcb
4,ncgdd,0.0,0.2
4,cgdd_from_plant,10,0.4
";
        let err = CurveStore::from_reader(data.as_bytes(), ',').unwrap_err();
        assert!(err.to_string().contains("mixed curve types"));
    }
}
