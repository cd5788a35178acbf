//! Daily output rows, aggregation, and CSV writers
//!
//! The orchestrator pushes one [`DailyOutput`] per (cell, crop, day). Flux
//! columns aggregate by sum, the coefficient columns by mean: monthly totals
//! are sums of the daily rows, annual totals sums of the monthly ones, and
//! growing-season totals sum only the days with the season flag set, carrying
//! the first and last in-season day of year.
//!
//! Writers emit one file per (cell, crop) so parallel workers never share a
//! handle. The Kc/Kcb and NIWR columns follow the run's output toggles.

use std::io::Write;

use chrono::{Datelike, NaiveDate};

use dualkc_core::errors::{DualKcError, DualKcResult};
use dualkc_core::FloatValue;

use crate::config::RunFlags;

/// One simulated day of one crop on one cell. All depths in mm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyOutput {
    pub date: NaiveDate,
    pub doy: u16,
    pub etref: FloatValue,
    pub ppt: FloatValue,
    pub et_act: FloatValue,
    pub et_pot: FloatValue,
    pub et_bas: FloatValue,
    pub kc: FloatValue,
    pub kcb: FloatValue,
    pub irrigation: FloatValue,
    pub runoff: FloatValue,
    pub dperc: FloatValue,
    pub niwr: FloatValue,
    pub p_rz: FloatValue,
    pub p_eft: FloatValue,
    /// 1 while the crop is in season, else 0.
    pub season: u8,
    /// Cuttings so far this calendar year.
    pub cuttings: u32,
}

/// The full daily series of one crop on one cell.
#[derive(Debug, Clone)]
pub struct CropSeries {
    pub cell_id: String,
    pub crop_number: u8,
    pub crop_name: String,
    pub rows: Vec<DailyOutput>,
}

/// Everything one cell produced.
#[derive(Debug, Clone)]
pub struct CellOutput {
    pub cell_id: String,
    pub series: Vec<CropSeries>,
}

/// Summed flux columns shared by every aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FluxTotals {
    pub etref: FloatValue,
    pub ppt: FloatValue,
    pub et_act: FloatValue,
    pub et_pot: FloatValue,
    pub et_bas: FloatValue,
    pub irrigation: FloatValue,
    pub runoff: FloatValue,
    pub dperc: FloatValue,
    pub niwr: FloatValue,
    pub p_rz: FloatValue,
    pub p_eft: FloatValue,
}

impl FluxTotals {
    fn add_day(&mut self, row: &DailyOutput) {
        self.etref += row.etref;
        self.ppt += row.ppt;
        self.et_act += row.et_act;
        self.et_pot += row.et_pot;
        self.et_bas += row.et_bas;
        self.irrigation += row.irrigation;
        self.runoff += row.runoff;
        self.dperc += row.dperc;
        self.niwr += row.niwr;
        self.p_rz += row.p_rz;
        self.p_eft += row.p_eft;
    }

    fn add(&mut self, other: &FluxTotals) {
        self.etref += other.etref;
        self.ppt += other.ppt;
        self.et_act += other.et_act;
        self.et_pot += other.et_pot;
        self.et_bas += other.et_bas;
        self.irrigation += other.irrigation;
        self.runoff += other.runoff;
        self.dperc += other.dperc;
        self.niwr += other.niwr;
        self.p_rz += other.p_rz;
        self.p_eft += other.p_eft;
    }
}

/// One calendar month of one crop series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyOutput {
    pub year: i32,
    pub month: u32,
    pub days: u32,
    pub totals: FluxTotals,
    pub kc_mean: FloatValue,
    pub kcb_mean: FloatValue,
}

/// One calendar year of one crop series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnualOutput {
    pub year: i32,
    pub days: u32,
    pub totals: FluxTotals,
    pub kc_mean: FloatValue,
    pub kcb_mean: FloatValue,
}

/// One growing season (calendar year) of one crop series. The totals cover
/// only the days with the season flag set; a year the crop never grew keeps
/// `start_doy`/`end_doy` empty and zero totals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonOutput {
    pub year: i32,
    pub start_doy: Option<u16>,
    pub end_doy: Option<u16>,
    pub days_in_season: u32,
    pub totals: FluxTotals,
    pub cuttings: u32,
}

/// Reduce daily rows to per-month aggregates, in date order.
pub fn monthly_totals(rows: &[DailyOutput]) -> Vec<MonthlyOutput> {
    let mut months: Vec<MonthlyOutput> = Vec::new();
    let mut kc_sum = 0.0;
    let mut kcb_sum = 0.0;
    for row in rows {
        let (year, month) = (row.date.year(), row.date.month());
        let open = months
            .last()
            .is_some_and(|m| m.year == year && m.month == month);
        if !open {
            if let Some(last) = months.last_mut() {
                last.kc_mean = kc_sum / last.days as FloatValue;
                last.kcb_mean = kcb_sum / last.days as FloatValue;
            }
            kc_sum = 0.0;
            kcb_sum = 0.0;
            months.push(MonthlyOutput {
                year,
                month,
                days: 0,
                totals: FluxTotals::default(),
                kc_mean: 0.0,
                kcb_mean: 0.0,
            });
        }
        let current = months.last_mut().expect("month entry just pushed");
        current.days += 1;
        current.totals.add_day(row);
        kc_sum += row.kc;
        kcb_sum += row.kcb;
    }
    if let Some(last) = months.last_mut() {
        last.kc_mean = kc_sum / last.days as FloatValue;
        last.kcb_mean = kcb_sum / last.days as FloatValue;
    }
    months
}

/// Reduce monthly aggregates to per-year ones. Fluxes sum; coefficient means
/// weight each month by its day count so the result matches the daily mean.
pub fn annual_totals(months: &[MonthlyOutput]) -> Vec<AnnualOutput> {
    let mut years: Vec<AnnualOutput> = Vec::new();
    let mut kc_sum = 0.0;
    let mut kcb_sum = 0.0;
    for month in months {
        let open = years.last().is_some_and(|y| y.year == month.year);
        if !open {
            if let Some(last) = years.last_mut() {
                last.kc_mean = kc_sum / last.days as FloatValue;
                last.kcb_mean = kcb_sum / last.days as FloatValue;
            }
            kc_sum = 0.0;
            kcb_sum = 0.0;
            years.push(AnnualOutput {
                year: month.year,
                days: 0,
                totals: FluxTotals::default(),
                kc_mean: 0.0,
                kcb_mean: 0.0,
            });
        }
        let current = years.last_mut().expect("year entry just pushed");
        current.days += month.days;
        current.totals.add(&month.totals);
        kc_sum += month.kc_mean * month.days as FloatValue;
        kcb_sum += month.kcb_mean * month.days as FloatValue;
    }
    if let Some(last) = years.last_mut() {
        last.kc_mean = kc_sum / last.days as FloatValue;
        last.kcb_mean = kcb_sum / last.days as FloatValue;
    }
    years
}

/// Reduce daily rows to per-year growing-season aggregates. Every simulated
/// year gets an entry so a season that never started is visible as zeros.
pub fn growing_season_totals(rows: &[DailyOutput]) -> Vec<SeasonOutput> {
    let mut seasons: Vec<SeasonOutput> = Vec::new();
    for row in rows {
        let year = row.date.year();
        if !seasons.last().is_some_and(|s| s.year == year) {
            seasons.push(SeasonOutput {
                year,
                start_doy: None,
                end_doy: None,
                days_in_season: 0,
                totals: FluxTotals::default(),
                cuttings: 0,
            });
        }
        let current = seasons.last_mut().expect("season entry just pushed");
        current.cuttings = current.cuttings.max(row.cuttings);
        if row.season == 1 {
            current.days_in_season += 1;
            current.totals.add_day(row);
            if current.start_doy.is_none() {
                current.start_doy = Some(row.doy);
            }
            current.end_doy = Some(row.doy);
        }
    }
    seasons
}

fn io_error(context: &str, err: std::io::Error) -> DualKcError {
    DualKcError::Error(format!("{context}: {err}"))
}

fn push_float(record: &mut Vec<String>, value: FloatValue) {
    record.push(format!("{value:.6}"));
}

/// Write one crop's daily series as CSV. The Kc/Kcb and NIWR columns follow
/// the run toggles.
pub fn write_daily<W: Write>(
    writer: W,
    series: &CropSeries,
    flags: &RunFlags,
) -> DualKcResult<()> {
    let mut out = csv::Writer::from_writer(writer);
    let mut header = vec!["Date", "DOY", "ETref", "PPT", "ETact", "ETpot", "ETbas"];
    if flags.kc {
        header.extend(["Kc", "Kcb"]);
    }
    header.extend(["Irrigation", "Runoff", "DPerc"]);
    if flags.niwr {
        header.push("NIWR");
    }
    header.extend(["P_rz", "P_eft", "Season", "Cuttings"]);
    out.write_record(&header)?;

    for row in &series.rows {
        let mut record = Vec::with_capacity(header.len());
        record.push(row.date.format("%Y-%m-%d").to_string());
        record.push(row.doy.to_string());
        for value in [row.etref, row.ppt, row.et_act, row.et_pot, row.et_bas] {
            push_float(&mut record, value);
        }
        if flags.kc {
            push_float(&mut record, row.kc);
            push_float(&mut record, row.kcb);
        }
        for value in [row.irrigation, row.runoff, row.dperc] {
            push_float(&mut record, value);
        }
        if flags.niwr {
            push_float(&mut record, row.niwr);
        }
        push_float(&mut record, row.p_rz);
        push_float(&mut record, row.p_eft);
        record.push(row.season.to_string());
        record.push(row.cuttings.to_string());
        out.write_record(&record)?;
    }
    out.flush().map_err(|e| io_error("flushing daily output", e))
}

fn flux_columns(record: &mut Vec<String>, totals: &FluxTotals, niwr: bool) {
    for value in [
        totals.etref,
        totals.ppt,
        totals.et_act,
        totals.et_pot,
        totals.et_bas,
        totals.irrigation,
        totals.runoff,
        totals.dperc,
    ] {
        push_float(record, value);
    }
    if niwr {
        push_float(record, totals.niwr);
    }
    push_float(record, totals.p_rz);
    push_float(record, totals.p_eft);
}

fn flux_header(header: &mut Vec<&str>, niwr: bool) {
    header.extend([
        "ETref", "PPT", "ETact", "ETpot", "ETbas", "Irrigation", "Runoff", "DPerc",
    ]);
    if niwr {
        header.push("NIWR");
    }
    header.extend(["P_rz", "P_eft"]);
}

/// Write per-month aggregates as CSV.
pub fn write_monthly<W: Write>(
    writer: W,
    months: &[MonthlyOutput],
    flags: &RunFlags,
) -> DualKcResult<()> {
    let mut out = csv::Writer::from_writer(writer);
    let mut header = vec!["Year", "Month", "Days"];
    flux_header(&mut header, flags.niwr);
    if flags.kc {
        header.extend(["Kc", "Kcb"]);
    }
    out.write_record(&header)?;
    for month in months {
        let mut record = vec![
            month.year.to_string(),
            month.month.to_string(),
            month.days.to_string(),
        ];
        flux_columns(&mut record, &month.totals, flags.niwr);
        if flags.kc {
            push_float(&mut record, month.kc_mean);
            push_float(&mut record, month.kcb_mean);
        }
        out.write_record(&record)?;
    }
    out.flush()
        .map_err(|e| io_error("flushing monthly output", e))
}

/// Write per-year aggregates as CSV.
pub fn write_annual<W: Write>(
    writer: W,
    years: &[AnnualOutput],
    flags: &RunFlags,
) -> DualKcResult<()> {
    let mut out = csv::Writer::from_writer(writer);
    let mut header = vec!["Year", "Days"];
    flux_header(&mut header, flags.niwr);
    if flags.kc {
        header.extend(["Kc", "Kcb"]);
    }
    out.write_record(&header)?;
    for year in years {
        let mut record = vec![year.year.to_string(), year.days.to_string()];
        flux_columns(&mut record, &year.totals, flags.niwr);
        if flags.kc {
            push_float(&mut record, year.kc_mean);
            push_float(&mut record, year.kcb_mean);
        }
        out.write_record(&record)?;
    }
    out.flush()
        .map_err(|e| io_error("flushing annual output", e))
}

/// Write per-year growing-season aggregates as CSV. Years with no season
/// leave the start/end columns empty.
pub fn write_growing_season<W: Write>(
    writer: W,
    seasons: &[SeasonOutput],
    flags: &RunFlags,
) -> DualKcResult<()> {
    let mut out = csv::Writer::from_writer(writer);
    let mut header = vec!["Year", "Start_DOY", "End_DOY", "Season_Days"];
    flux_header(&mut header, flags.niwr);
    header.push("Cuttings");
    out.write_record(&header)?;
    for season in seasons {
        let mut record = vec![
            season.year.to_string(),
            season.start_doy.map(|d| d.to_string()).unwrap_or_default(),
            season.end_doy.map(|d| d.to_string()).unwrap_or_default(),
            season.days_in_season.to_string(),
        ];
        flux_columns(&mut record, &season.totals, flags.niwr);
        record.push(season.cuttings.to_string());
        out.write_record(&record)?;
    }
    out.flush()
        .map_err(|e| io_error("flushing growing-season output", e))
}
