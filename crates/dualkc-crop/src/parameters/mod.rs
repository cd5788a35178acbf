//! Parameter stores for cells, crops, and Kcb curves
//!
//! All three stores are loaded once, validated, and shared read-only across
//! cell workers. Spatial calibration never mutates the shared crop store:
//! per-cell copies are taken and the override subset is applied to the copy.

pub mod cells;
pub mod crop;
pub mod curves;

pub use cells::{CellProperties, CellStore, HydrologicGroup, MeanCuttings};
pub use crop::{
    Co2Class, CropOverride, CropParameters, CropStore, CuttingSchedule, PlantingMethod,
    WinterCoverClass,
};
pub use curves::{CurveKind, CurveStore, KcbCurve};
