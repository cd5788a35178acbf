//! FAO-56 dual crop coefficient daily simulation engine
//!
//! Computes daily crop evapotranspiration and net irrigation water
//! requirement for every (cell × crop) pair over a multi-year daily weather
//! record. The basal coefficient Kcb comes from per-crop curves driven by
//! growing-degree-days or elapsed time, the evaporation coefficient Ke from a
//! thin surface-layer balance, and actual ET from a single-layer root-zone
//! water balance with SCS curve-number runoff and MAD-triggered irrigation.
//!
//! # Module Organisation
//!
//! - `config`: immutable run configuration (paths, schemas, units, toggles)
//! - `parameters`: cell, crop, and Kcb-curve stores with per-cell overrides
//! - `weather`: forcing ingest and normalization to canonical units
//! - `climate`: derived temperature/GDD/snow series for phenology
//! - `phenology`: the crop cycle state machine
//! - `kcb`: basal coefficient evaluation and climatic adjustment
//! - `balance`: the daily soil-water balance
//! - `cell`: per-cell orchestrator running every active crop in lock-step
//! - `output`: daily rows, aggregation, and CSV writers
//! - `runner`: parallel across-cell driver
//!
//! Within a cell the daily loop is strictly sequential (each day depends on
//! the previous day's depletions); across cells the driver runs in parallel
//! with no shared mutable state.

pub mod balance;
pub mod cell;
pub mod climate;
pub mod config;
pub mod kcb;
pub mod output;
pub mod parameters;
pub mod phenology;
pub mod runner;
pub mod weather;
