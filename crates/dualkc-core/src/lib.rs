//! Core types and I/O for daily dual-crop-coefficient ET simulation
//!
//! This crate holds the domain-independent pieces shared by the simulation
//! engine: the error taxonomy, closed unit enums with conversions to the
//! canonical mm/°C/m-per-s system, calendar helpers for daily simulation
//! windows, psychrometric formulas, and a schema-driven reader for the
//! delimited input tables.

pub mod errors;
pub mod meteo;
pub mod schema;
pub mod table;
pub mod time;
pub mod units;

pub use errors::{DualKcError, DualKcResult};
pub use schema::{FieldOrigin, FieldSpec, TableSchema};
pub use time::{DateWindow, ResolvedWindow};

/// Alias for the floating point type used throughout the crates.
pub type FloatValue = f64;
