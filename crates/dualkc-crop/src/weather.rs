//! Daily weather ingest
//!
//! One delimited file per weather station carries daily maxima, minima,
//! precipitation, an optional snow pair, wind and a humidity column. The
//! reference ET series rides either as an etref column of the same file or
//! in a separate per-station file merged on date, in which case the run
//! covers the overlap of the two files. Readers bind the canonical field
//! keys to headers from the run configuration, convert every series to
//! engine units (Celsius, mm, m/s at 2 m), enforce the temperature
//! ceilings and fill the humidity chain: dew point directly, else from
//! vapor pressure or specific humidity, else from a fixed offset below the
//! daily minimum.

use std::io::Read;

use chrono::{Datelike, NaiveDate};
use ndarray::Array1;
use tracing::debug;

use dualkc_core::errors::{DualKcError, DualKcResult};
use dualkc_core::meteo;
use dualkc_core::schema::{FieldOrigin, FieldSpec, TableSchema};
use dualkc_core::table::{read_table, read_table_from, Table};
use dualkc_core::time::{DateWindow, ResolvedWindow};
use dualkc_core::units::{DepthUnit, HumidityUnit, TempUnit, WindUnit};
use dualkc_core::FloatValue;

use crate::config::{RefEtConfig, WeatherConfig};
use crate::parameters::Co2Class;

/// Hard ceiling on daily maximum temperature, degC.
const TMAX_CEILING: FloatValue = 48.9;
/// Hard ceiling on daily minimum temperature, degC.
const TMIN_CEILING: FloatValue = 32.2;
/// Wind speed assumed when no wind column is bound, m/s at 2 m.
const DEFAULT_WIND: FloatValue = 2.0;
/// Dew point offset below Tmin used when no humidity column is bound, degC.
const DEW_OFFSET: FloatValue = 2.0;

/// Provenance of the series that readers may synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesOrigins {
    pub snow: FieldOrigin,
    pub snow_depth: FieldOrigin,
    pub wind: FieldOrigin,
    pub humidity: FieldOrigin,
}

/// Daily CO2 response factors, one optional series per crop class.
#[derive(Debug, Clone, Default)]
pub struct Co2Daily {
    pub grass: Option<Array1<FloatValue>>,
    pub tree: Option<Array1<FloatValue>>,
    pub c4: Option<Array1<FloatValue>>,
}

impl Co2Daily {
    pub fn has_any(&self) -> bool {
        self.grass.is_some() || self.tree.is_some() || self.c4.is_some()
    }

    /// Factor for one class on one day; 1.0 when the class has no series.
    pub fn factor(&self, class: Co2Class, index: usize) -> FloatValue {
        let series = match class {
            Co2Class::Grass => &self.grass,
            Co2Class::Tree => &self.tree,
            Co2Class::C4 => &self.c4,
        };
        series.as_ref().map(|s| s[index]).unwrap_or(1.0)
    }
}

/// One station's daily forcing, truncated to the resolved window and fully
/// converted to engine units.
#[derive(Debug, Clone)]
pub struct DailyWeather {
    pub station_id: String,
    pub window: ResolvedWindow,
    pub dates: Vec<NaiveDate>,
    /// degC
    pub tmax: Array1<FloatValue>,
    /// degC
    pub tmin: Array1<FloatValue>,
    /// mm/day
    pub precip: Array1<FloatValue>,
    /// mm/day snow water equivalent
    pub snow: Array1<FloatValue>,
    /// mm, reported depth on the ground
    pub snow_depth: Array1<FloatValue>,
    /// m/s at 2 m
    pub wind_2m: Array1<FloatValue>,
    /// degC
    pub tdew: Array1<FloatValue>,
    /// percent
    pub rh_min: Array1<FloatValue>,
    /// mm/day, after the monthly ratio adjustment
    pub etref: Array1<FloatValue>,
    pub co2: Co2Daily,
    pub origins: SeriesOrigins,
}

impl DailyWeather {
    pub fn num_days(&self) -> usize {
        self.dates.len()
    }

    /// Position of `date` in the series, if covered.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        if !self.window.contains(date) {
            return None;
        }
        Some((date - self.window.start).num_days() as usize)
    }

    pub fn date_at(&self, index: usize) -> NaiveDate {
        self.dates[index]
    }
}

/// Optional CO2 factor column sliced to the resolved window; gaps hold 1.0.
fn co2_series(
    table: &Table,
    key: &str,
    first: usize,
    n: usize,
) -> DualKcResult<Option<Array1<FloatValue>>> {
    if !table.has_column(key) {
        return Ok(None);
    }
    let mut values = Vec::with_capacity(n);
    for row in first..first + n {
        values.push(table.f64_at(row, key)?.unwrap_or(1.0));
    }
    Ok(Some(Array1::from(values)))
}

fn bound_unit<U, F>(
    config: &WeatherConfig,
    key: &str,
    parse: F,
    fallback: U,
) -> DualKcResult<U>
where
    F: Fn(&str) -> Option<U>,
{
    match config.binding(key).and_then(|b| b.unit.as_deref()) {
        None => Ok(fallback),
        Some(label) => parse(label).ok_or_else(|| DualKcError::BadUnits {
            unit: label.to_string(),
            field: key.to_string(),
        }),
    }
}

fn weather_schema(config: &WeatherConfig) -> DualKcResult<TableSchema> {
    let mut schema = TableSchema::new("weather")
        .with_delimiter(config.delimiter_char()?)
        .with_header_rows(config.header_rows, config.names_row);
    let mut required: Vec<&str> = vec!["date", "tmax", "tmin", "precip"];
    // A separate reference ET file supersedes any etref column here.
    if config.ref_et.is_none() {
        required.push("etref");
    }
    for key in required {
        let binding = config.binding(key).ok_or_else(|| {
            DualKcError::Configuration(format!("weather field '{key}' has no column binding"))
        })?;
        schema = schema.with_field(FieldSpec::required(
            key,
            &binding.header,
            binding.unit.as_deref(),
        ));
    }
    for key in [
        "snow",
        "snow_depth",
        "wind",
        "tdew",
        "q",
        "co2_grass",
        "co2_tree",
        "co2_c4",
    ] {
        if let Some(binding) = config.binding(key) {
            schema = schema.with_field(FieldSpec::optional(
                key,
                &binding.header,
                binding.unit.as_deref(),
            ));
        }
    }
    Ok(schema)
}

/// Reference ET read from its own per-station file: consecutive daily
/// values in mm starting at `start`.
#[derive(Debug, Clone)]
pub struct RefEtSeries {
    start: NaiveDate,
    values: Vec<FloatValue>,
}

impl RefEtSeries {
    fn coverage_end(&self) -> NaiveDate {
        self.start + chrono::Duration::days(self.values.len() as i64 - 1)
    }

    fn value_on(&self, date: NaiveDate) -> FloatValue {
        self.values[(date - self.start).num_days() as usize]
    }
}

fn ref_et_schema(config: &RefEtConfig) -> DualKcResult<TableSchema> {
    let mut schema = TableSchema::new("etref")
        .with_delimiter(config.delimiter_char()?)
        .with_header_rows(config.header_rows, config.names_row);
    for key in ["date", "etref"] {
        let binding = config.binding(key).ok_or_else(|| {
            DualKcError::Configuration(format!(
                "reference ET field '{key}' has no column binding"
            ))
        })?;
        schema = schema.with_field(FieldSpec::required(
            key,
            &binding.header,
            binding.unit.as_deref(),
        ));
    }
    Ok(schema)
}

/// Read one station's reference ET file from disk.
pub fn load_ref_et(config: &RefEtConfig, station_id: &str) -> DualKcResult<RefEtSeries> {
    let path = config.path_for(station_id);
    let table = read_table(&path, &ref_et_schema(config)?)?;
    assemble_ref_et(&table, config, station_id)
}

/// Read one station's reference ET series from any reader; used by tests.
pub fn read_ref_et_from<R: Read>(
    reader: R,
    config: &RefEtConfig,
    station_id: &str,
) -> DualKcResult<RefEtSeries> {
    let table = read_table_from(reader, &ref_et_schema(config)?)?;
    assemble_ref_et(&table, config, station_id)
}

fn assemble_ref_et(
    table: &Table,
    config: &RefEtConfig,
    station_id: &str,
) -> DualKcResult<RefEtSeries> {
    if table.num_rows() == 0 {
        return Err(DualKcError::Table {
            table: table.name().to_string(),
            row: 0,
            reason: format!("station {station_id}: no data rows"),
        });
    }
    let unit = match config.binding("etref").and_then(|b| b.unit.as_deref()) {
        None => DepthUnit::Millimeters,
        Some(label) => DepthUnit::parse(label).ok_or_else(|| DualKcError::BadUnits {
            unit: label.to_string(),
            field: "etref".to_string(),
        })?,
    };
    let mut start = None;
    let mut prev: Option<NaiveDate> = None;
    let mut values = Vec::with_capacity(table.num_rows());
    for row in 0..table.num_rows() {
        let date = table.date_at(row, "date")?.ok_or_else(|| DualKcError::Table {
            table: table.name().to_string(),
            row,
            reason: "missing date".to_string(),
        })?;
        if let Some(p) = prev {
            if date != p + chrono::Duration::days(1) {
                return Err(DualKcError::Table {
                    table: table.name().to_string(),
                    row,
                    reason: format!("dates must be consecutive; {p} is followed by {date}"),
                });
            }
        }
        start.get_or_insert(date);
        prev = Some(date);
        values.push(unit.to_mm(table.require_f64(row, "etref")?).max(0.0));
    }
    Ok(RefEtSeries {
        // num_rows > 0, so the first iteration set it
        start: start.expect("first row seen"),
        values,
    })
}

/// Read one station file from disk, together with its separate reference
/// ET file when one is configured.
pub fn load_station(
    config: &WeatherConfig,
    station_id: &str,
    elevation: FloatValue,
    window: &DateWindow,
) -> DualKcResult<DailyWeather> {
    let ref_et = match &config.ref_et {
        Some(layout) => Some(load_ref_et(layout, station_id)?),
        None => None,
    };
    let path = config.path_for(station_id);
    let table = read_table(&path, &weather_schema(config)?)?;
    assemble(&table, config, ref_et.as_ref(), station_id, elevation, window)
}

/// Read one single-file station series from any reader; used by tests.
pub fn read_station_from<R: Read>(
    reader: R,
    config: &WeatherConfig,
    station_id: &str,
    elevation: FloatValue,
    window: &DateWindow,
) -> DualKcResult<DailyWeather> {
    let table = read_table_from(reader, &weather_schema(config)?)?;
    assemble(&table, config, None, station_id, elevation, window)
}

/// Read a station plus its separate reference ET series from readers;
/// used by tests.
pub fn read_station_with_ref_et_from<R1: Read, R2: Read>(
    weather: R1,
    etref: R2,
    config: &WeatherConfig,
    station_id: &str,
    elevation: FloatValue,
    window: &DateWindow,
) -> DualKcResult<DailyWeather> {
    let layout = config.ref_et.as_ref().ok_or_else(|| {
        DualKcError::Configuration("no reference ET file layout is configured".to_string())
    })?;
    let series = read_ref_et_from(etref, layout, station_id)?;
    let table = read_table_from(weather, &weather_schema(config)?)?;
    assemble(&table, config, Some(&series), station_id, elevation, window)
}

fn assemble(
    table: &Table,
    config: &WeatherConfig,
    ref_et: Option<&RefEtSeries>,
    station_id: &str,
    elevation: FloatValue,
    window: &DateWindow,
) -> DualKcResult<DailyWeather> {
    if table.num_rows() == 0 {
        return Err(DualKcError::Table {
            table: table.name().to_string(),
            row: 0,
            reason: format!("station {station_id}: no data rows"),
        });
    }

    let mut dates = Vec::with_capacity(table.num_rows());
    for row in 0..table.num_rows() {
        let date = table.date_at(row, "date")?.ok_or_else(|| DualKcError::Table {
            table: table.name().to_string(),
            row,
            reason: "missing date".to_string(),
        })?;
        if let Some(prev) = dates.last() {
            if date != *prev + chrono::Duration::days(1) {
                return Err(DualKcError::Table {
                    table: table.name().to_string(),
                    row,
                    reason: format!("dates must be consecutive; {prev} is followed by {date}"),
                });
            }
        }
        dates.push(date);
    }
    let file_start = dates[0];
    let mut coverage_start = file_start;
    let mut coverage_end = *dates.last().ok_or_else(|| DualKcError::Table {
        table: table.name().to_string(),
        row: 0,
        reason: "empty date column".to_string(),
    })?;
    // A separate reference ET file narrows the coverage to the overlap.
    if let Some(series) = ref_et {
        coverage_start = coverage_start.max(series.start);
        coverage_end = coverage_end.min(series.coverage_end());
    }
    let resolved = window.resolve(coverage_start, coverage_end, table.name())?;
    let first = (resolved.start - file_start).num_days() as usize;
    let n = resolved.num_days();

    let temp_unit = bound_unit(config, "tmax", TempUnit::parse, TempUnit::Celsius)?;
    let tmin_unit = bound_unit(config, "tmin", TempUnit::parse, TempUnit::Celsius)?;
    let precip_unit = bound_unit(config, "precip", DepthUnit::parse, DepthUnit::Millimeters)?;
    let snow_unit = bound_unit(config, "snow", DepthUnit::parse, DepthUnit::Millimeters)?;
    let depth_unit = bound_unit(config, "snow_depth", DepthUnit::parse, DepthUnit::Millimeters)?;
    let wind_unit = bound_unit(config, "wind", WindUnit::parse, WindUnit::MetersPerSecond)?;
    let tdew_unit = bound_unit(config, "tdew", TempUnit::parse, TempUnit::Celsius)?;
    let q_unit = bound_unit(config, "q", HumidityUnit::parse, HumidityUnit::KgPerKg)?;
    let etref_unit = bound_unit(config, "etref", DepthUnit::parse, DepthUnit::Millimeters)?;

    let has_snow = table.has_column("snow");
    let has_depth = table.has_column("snow_depth");
    let has_wind = table.has_column("wind");
    let has_tdew = table.has_column("tdew");
    let has_q = table.has_column("q");

    let wind_factor = meteo::wind_2m_factor(config.wind_height);
    let pressure = meteo::pressure_from_elevation(elevation);

    let mut tmax = Vec::with_capacity(n);
    let mut tmin = Vec::with_capacity(n);
    let mut precip = Vec::with_capacity(n);
    let mut snow = Vec::with_capacity(n);
    let mut snow_depth = Vec::with_capacity(n);
    let mut wind_2m = Vec::with_capacity(n);
    let mut tdew = Vec::with_capacity(n);
    let mut rh_min = Vec::with_capacity(n);
    let mut etref = Vec::with_capacity(n);

    let mut clipped_tmax = 0usize;
    let mut clipped_tmin = 0usize;
    let mut raised_tmax = 0usize;

    for row in first..first + n {
        let mut tx = temp_unit.to_celsius(table.require_f64(row, "tmax")?);
        let mut tn = tmin_unit.to_celsius(table.require_f64(row, "tmin")?);
        if tx > TMAX_CEILING {
            tx = TMAX_CEILING;
            clipped_tmax += 1;
        }
        if tn > TMIN_CEILING {
            tn = TMIN_CEILING;
            clipped_tmin += 1;
        }
        if tx < tn {
            tx = tn;
            raised_tmax += 1;
        }

        let p = precip_unit.to_mm(table.require_f64(row, "precip")?).max(0.0);
        let sn = if has_snow {
            snow_unit
                .to_mm(table.f64_at(row, "snow")?.unwrap_or(0.0))
                .max(0.0)
        } else {
            0.0
        };
        let sd = if has_depth {
            depth_unit
                .to_mm(table.f64_at(row, "snow_depth")?.unwrap_or(0.0))
                .max(0.0)
        } else {
            0.0
        };
        let wind = if has_wind {
            match table.f64_at(row, "wind")? {
                Some(raw) => wind_unit.to_mps(raw).max(0.0) * wind_factor,
                None => DEFAULT_WIND,
            }
        } else {
            DEFAULT_WIND
        };

        let td = if has_tdew {
            match table.f64_at(row, "tdew")? {
                Some(raw) => tdew_unit.to_celsius(raw),
                None => tn - DEW_OFFSET,
            }
        } else if has_q {
            match table.f64_at(row, "q")? {
                Some(raw) => {
                    let ea = if q_unit.is_specific_humidity() {
                        meteo::vapor_pressure_from_specific_humidity(raw, pressure)
                    } else {
                        q_unit.to_kpa(raw)
                    };
                    meteo::dewpoint_from_vapor_pressure(ea)
                }
                None => tn - DEW_OFFSET,
            }
        } else {
            tn - DEW_OFFSET
        };

        let month = dates[row].month() as usize;
        let ratio = config
            .etref_ratios
            .map(|ratios| ratios[month - 1])
            .unwrap_or(1.0);
        let raw_et = match ref_et {
            Some(series) => series.value_on(dates[row]),
            None => etref_unit.to_mm(table.require_f64(row, "etref")?).max(0.0),
        };
        let et = raw_et * ratio;

        tmax.push(tx);
        tmin.push(tn);
        precip.push(p);
        snow.push(sn);
        snow_depth.push(sd);
        wind_2m.push(wind);
        tdew.push(td);
        rh_min.push(meteo::rh_min_from_dewpoint(td, tx));
        etref.push(et);
    }

    if clipped_tmax + clipped_tmin + raised_tmax > 0 {
        debug!(
            station = %station_id,
            clipped_tmax,
            clipped_tmin,
            raised_tmax,
            "temperature limits applied"
        );
    }

    let co2 = Co2Daily {
        grass: co2_series(table, "co2_grass", first, n)?,
        tree: co2_series(table, "co2_tree", first, n)?,
        c4: co2_series(table, "co2_c4", first, n)?,
    };

    let origins = SeriesOrigins {
        // No snow column means the snow store simply stays empty; nothing
        // is estimated.
        snow: if has_snow {
            FieldOrigin::Provided
        } else {
            FieldOrigin::Unused
        },
        snow_depth: if has_depth {
            FieldOrigin::Provided
        } else {
            FieldOrigin::Unused
        },
        wind: if has_wind {
            FieldOrigin::Provided
        } else {
            FieldOrigin::Estimated
        },
        humidity: if has_tdew {
            FieldOrigin::Provided
        } else {
            FieldOrigin::Estimated
        },
    };

    Ok(DailyWeather {
        station_id: station_id.to_string(),
        window: resolved,
        dates: dates[first..first + n].to_vec(),
        tmax: Array1::from(tmax),
        tmin: Array1::from(tmin),
        precip: Array1::from(precip),
        snow: Array1::from(snow),
        snow_depth: Array1::from(snow_depth),
        wind_2m: Array1::from(wind_2m),
        tdew: Array1::from(tdew),
        rh_min: Array1::from(rh_min),
        etref: Array1::from(etref),
        co2,
        origins,
    })
}
