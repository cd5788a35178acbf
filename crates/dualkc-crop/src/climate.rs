//! Derived climate series
//!
//! Phenology does not read the raw weather directly; it works from series
//! derived once per (cell, station) pair: aridity-adjusted temperatures,
//! the 30 day mean temperature, cumulative growing degree days from 1
//! January (base 0), long-term per-day-of-year means of both, and an
//! effective snow depth that accumulates settled snowfall and melts with
//! warm maxima.

use chrono::{Datelike, NaiveDate};
use ndarray::Array1;

use dualkc_core::time::{days_in_month, doy};
use dualkc_core::FloatValue;

use crate::weather::DailyWeather;

/// Monthly aridity effect on station temperatures, degC at rating 100.
/// Index 0 is unused; months are 1-based.
const ARIDITY_EFFECT: [FloatValue; 13] = [
    0.0, 0.0, 0.0, 0.0, 1.0, 1.5, 2.0, 3.5, 4.5, 3.0, 0.0, 0.0, 0.0,
];

/// Days in the temperature rolling mean.
const T30_DAYS: usize = 30;
/// Settled fraction of fresh snowfall.
const SNOW_SETTLE: FloatValue = 0.5;
/// Melt per degree of positive daily maximum, mm/degC.
pub const SNOW_MELT_RATE: FloatValue = 4.0;

/// Aridity effect for a date, interpolated between mid-month anchors with a
/// December to January wrap.
pub fn aridity_effect(date: NaiveDate) -> FloatValue {
    let month = date.month() as usize;
    let day = date.day() as i64;
    if day == 15 {
        return ARIDITY_EFFECT[month];
    }
    if day < 15 {
        let prev = if month == 1 { 12 } else { month - 1 };
        let span = days_in_month(date.year(), prev as u32) as FloatValue;
        let elapsed = (span - 15.0) + day as FloatValue;
        ARIDITY_EFFECT[prev] + (ARIDITY_EFFECT[month] - ARIDITY_EFFECT[prev]) * elapsed / span
    } else {
        let next = if month == 12 { 1 } else { month + 1 };
        let span = days_in_month(date.year(), month as u32) as FloatValue;
        let elapsed = (day - 15) as FloatValue;
        ARIDITY_EFFECT[month] + (ARIDITY_EFFECT[next] - ARIDITY_EFFECT[month]) * elapsed / span
    }
}

/// Knobs for [`CellClimate::build`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ClimateOptions {
    /// 0..100; scales the monthly aridity effect.
    pub aridity_rating: FloatValue,
    /// Drive T30/CGDD from unadjusted temperatures.
    pub phenology_from_observed: bool,
}

/// Climate series for one cell, aligned with its weather arrays.
#[derive(Debug, Clone)]
pub struct CellClimate {
    /// degC, aridity adjusted
    pub tmax: Array1<FloatValue>,
    /// degC, aridity adjusted
    pub tmin: Array1<FloatValue>,
    /// degC, mean of the adjusted pair
    pub tmean: Array1<FloatValue>,
    /// degC, 30 day rolling mean of the phenology temperature
    pub t30: Array1<FloatValue>,
    /// degC-days from 1 January, base 0
    pub cgdd0: Array1<FloatValue>,
    /// Long-term mean T30 by day of year; index 0 mirrors index 1.
    pub t30_lt: [FloatValue; 367],
    /// Long-term mean CGDD by day of year; index 0 mirrors index 1.
    pub cgdd0_lt: [FloatValue; 367],
    /// mm, effective snow depth after settling and melt
    pub snow_depth: Array1<FloatValue>,
}

impl CellClimate {
    pub fn build(weather: &DailyWeather, options: &ClimateOptions) -> Self {
        let n = weather.num_days();
        let rating = options.aridity_rating.clamp(0.0, 100.0) / 100.0;

        let mut tmax = Vec::with_capacity(n);
        let mut tmin = Vec::with_capacity(n);
        let mut tmean = Vec::with_capacity(n);
        let mut pheno = Vec::with_capacity(n);
        for i in 0..n {
            let effect = if rating > 0.0 {
                aridity_effect(weather.date_at(i)) * rating
            } else {
                0.0
            };
            let tx = weather.tmax[i] - effect;
            let tn = weather.tmin[i] - effect;
            tmax.push(tx);
            tmin.push(tn);
            tmean.push(0.5 * (tx + tn));
            if options.phenology_from_observed {
                pheno.push(0.5 * (weather.tmax[i] + weather.tmin[i]));
            } else {
                pheno.push(0.5 * (tx + tn));
            }
        }

        // Rolling mean over up to the last 30 days; shorter at the start.
        let mut t30 = Vec::with_capacity(n);
        let mut window_sum = 0.0;
        for i in 0..n {
            window_sum += pheno[i];
            if i >= T30_DAYS {
                window_sum -= pheno[i - T30_DAYS];
            }
            let len = (i + 1).min(T30_DAYS) as FloatValue;
            t30.push(window_sum / len);
        }

        let mut cgdd0 = Vec::with_capacity(n);
        let mut accum = 0.0;
        let mut year = weather.date_at(0).year();
        for i in 0..n {
            let date = weather.date_at(i);
            if date.year() != year {
                year = date.year();
                accum = 0.0;
            }
            accum += pheno[i].max(0.0);
            cgdd0.push(accum);
        }

        let mut t30_lt = [0.0; 367];
        let mut cgdd0_lt = [0.0; 367];
        let mut counts = [0u32; 367];
        for i in 0..n {
            let d = doy(weather.date_at(i)) as usize;
            t30_lt[d] += t30[i];
            cgdd0_lt[d] += cgdd0[i];
            counts[d] += 1;
        }
        for d in 1..367 {
            if counts[d] > 0 {
                t30_lt[d] /= counts[d] as FloatValue;
                cgdd0_lt[d] /= counts[d] as FloatValue;
            }
        }
        if counts[366] == 0 {
            t30_lt[366] = t30_lt[365];
            cgdd0_lt[366] = cgdd0_lt[365];
        }
        t30_lt[0] = t30_lt[1];
        cgdd0_lt[0] = cgdd0_lt[1];

        let mut snow_depth = Vec::with_capacity(n);
        let mut pack = 0.0f64;
        for i in 0..n {
            pack += SNOW_SETTLE * weather.snow[i];
            let melt = SNOW_MELT_RATE * tmax[i].max(0.0);
            pack = (pack - melt).max(0.0);
            snow_depth.push(weather.snow_depth[i].min(pack));
        }

        CellClimate {
            tmax: Array1::from(tmax),
            tmin: Array1::from(tmin),
            tmean: Array1::from(tmean),
            t30: Array1::from(t30),
            cgdd0: Array1::from(cgdd0),
            t30_lt,
            cgdd0_lt,
            snow_depth: Array1::from(snow_depth),
        }
    }
}
