//! Growing cycle state machine
//!
//! One [`CycleState`] per (cell, crop) pair walks the daily climate and
//! decides where the crop sits in its year: waiting to plant or green up,
//! progressing along its basal coefficient curve, being cut and regrowing,
//! or terminated by frost, heat-unit exhaustion or the calendar. The state
//! also carries the slowly varying canopy height and rooting depth that the
//! soil-water balance needs.
//!
//! Planting uses either the 30 day mean temperature inside a spring search
//! window (shifted half a year in the southern hemisphere) or cumulative
//! base-0 growing degree days. Termination checks run in a fixed order:
//! killing frost first, then heat units, then elapsed time.

use chrono::{Datelike, NaiveDate};

use dualkc_core::time::doy;
use dualkc_core::FloatValue;

use crate::parameters::{
    CellProperties, CropParameters, CurveKind, CuttingSchedule, KcbCurve,
};

/// First day of year of the northern spring planting search.
const SEARCH_OPEN: u16 = 60;
/// Last day of the search when the season limit is on.
const SEARCH_CLOSE: u16 = 212;
/// Half-year shift applied to southern hemisphere day numbers.
const HEMISPHERE_SHIFT: i32 = 182;

/// Where the crop is in its annual cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropPhase {
    /// Before this year's planting or green-up; the search is live.
    PreSeason,
    /// Growing; the coefficient curve is active.
    InSeason,
    /// Terminated this year; waits for the new year to search again.
    PostSeason,
}

/// Per-day phenology result handed to the balance and the writers.
#[derive(Debug, Clone, Copy)]
pub struct PhenoDay {
    pub in_season: bool,
    /// Curve (or winter cover) basal coefficient before climate and CO2
    /// adjustments.
    pub kcb_basis: FloatValue,
    /// m
    pub height: FloatValue,
    /// m
    pub root_depth: FloatValue,
    /// Management allowed depletion as a fraction of TAW.
    pub mad_fraction: FloatValue,
    pub season_started: bool,
    pub season_ended: bool,
    pub cutting: bool,
    /// Days after planting, counting the planting day as zero.
    pub days_after_planting: Option<u32>,
}

/// One day of climate forcing, already cell-adjusted.
#[derive(Debug, Clone, Copy)]
pub struct DayClimate {
    /// degC
    pub tmean: FloatValue,
    /// degC
    pub tmin: FloatValue,
    /// degC, 30 day rolling mean
    pub t30: FloatValue,
    /// degC, long-term mean T30 for this day of year
    pub t30_lt: FloatValue,
    /// degC-days from 1 January, base 0
    pub cgdd0: FloatValue,
}

/// Run-level phenology settings resolved once per (cell, crop).
#[derive(Debug, Clone, Copy)]
pub struct PhenologySettings {
    pub northern: bool,
    /// Enforce the late limit of the planting search window.
    pub season_limit: bool,
    /// Allow cutting cycles at all.
    pub cutting_enabled: bool,
    /// This cell's cutting cap for the crop's schedule, if any.
    pub cutting_cap: u32,
}

impl PhenologySettings {
    pub fn resolve(
        cell: &CellProperties,
        params: &CropParameters,
        cutting_flag: bool,
        season_limit: bool,
    ) -> Self {
        let cutting_cap = match params.cutting_schedule {
            Some(CuttingSchedule::Dairy) => cell.cuttings.dairy,
            Some(CuttingSchedule::Beef) => cell.cuttings.beef,
            None => 0,
        };
        Self {
            northern: cell.is_northern(),
            season_limit,
            cutting_enabled: cutting_flag && params.cutting_schedule.is_some(),
            cutting_cap,
        }
    }
}

/// Day of year mapped into the northern search frame.
fn effective_doy(day_of_year: u16, northern: bool) -> u16 {
    if northern {
        return day_of_year;
    }
    let shifted = (day_of_year as i32 - HEMISPHERE_SHIFT).rem_euclid(365);
    if shifted == 0 {
        365
    } else {
        shifted as u16
    }
}

#[derive(Debug, Clone)]
pub struct CycleState {
    phase: CropPhase,
    planting_date: Option<NaiveDate>,
    days_after_planting: u32,
    /// Heat units since planting at the crop's base temperature.
    cgdd: FloatValue,
    /// Heat units since the last cutting, same base.
    cgdd_since_cut: FloatValue,
    /// Curve key where regrowth restarted, zero before the first cutting.
    key_base: FloatValue,
    /// Days since the last cutting, for time-keyed curves.
    days_since_cut: u32,
    cuttings: u32,
    efc_reached: bool,
    height: FloatValue,
    root_depth: FloatValue,
}

impl CycleState {
    pub fn new(params: &CropParameters) -> Self {
        let phase = if params.is_winter_surface {
            CropPhase::InSeason
        } else {
            CropPhase::PreSeason
        };
        Self {
            phase,
            planting_date: None,
            days_after_planting: 0,
            cgdd: 0.0,
            cgdd_since_cut: 0.0,
            key_base: 0.0,
            days_since_cut: 0,
            cuttings: 0,
            efc_reached: false,
            height: params.height_initial,
            root_depth: params.rooting_depth_initial,
        }
    }

    pub fn phase(&self) -> CropPhase {
        self.phase
    }

    pub fn cuttings(&self) -> u32 {
        self.cuttings
    }

    fn start_season(&mut self, date: NaiveDate, params: &CropParameters) {
        self.phase = CropPhase::InSeason;
        self.planting_date = Some(date);
        self.days_after_planting = 0;
        self.cgdd = 0.0;
        self.cgdd_since_cut = 0.0;
        self.key_base = 0.0;
        self.days_since_cut = 0;
        self.efc_reached = false;
        self.height = params.height_initial;
        self.root_depth = params.rooting_depth_initial;
    }

    fn end_season(&mut self, params: &CropParameters) {
        self.phase = CropPhase::PostSeason;
        self.height = params.height_initial;
        self.root_depth = params.rooting_depth_initial;
    }

    fn wants_planting(
        &self,
        date: NaiveDate,
        climate: &DayClimate,
        params: &CropParameters,
        settings: &PhenologySettings,
    ) -> bool {
        match params.planting_method {
            crate::parameters::PlantingMethod::T30 => {
                let eff = effective_doy(doy(date), settings.northern);
                if eff < SEARCH_OPEN {
                    return false;
                }
                if settings.season_limit && eff > SEARCH_CLOSE {
                    return false;
                }
                climate.t30 >= params.t30_for_planting
                    && climate.t30_lt >= params.t30_for_planting
            }
            crate::parameters::PlantingMethod::Cgdd => climate.cgdd0 >= params.cgdd_for_planting,
        }
    }

    /// Progress toward effective full cover on the curve's own clock, 1.0
    /// at EFC.
    fn efc_progress(&self, params: &CropParameters, kind: CurveKind) -> FloatValue {
        match kind {
            CurveKind::NormalizedCgdd | CurveKind::CgddFromPlant => {
                if params.cgdd_for_efc > 0.0 {
                    self.cgdd / params.cgdd_for_efc
                } else {
                    1.0
                }
            }
            CurveKind::PercentTimeFromPlant | CurveKind::PercentTimeToEfc => {
                if params.time_for_efc > 0.0 {
                    self.days_after_planting as FloatValue / params.time_for_efc
                } else {
                    1.0
                }
            }
        }
    }

    /// Curve key for today, counting from the last regrowth point once a
    /// cutting has happened.
    fn curve_key(&self, params: &CropParameters, curve: &KcbCurve) -> FloatValue {
        let since = match curve.kind {
            CurveKind::NormalizedCgdd => {
                if params.cgdd_for_efc > 0.0 {
                    self.cgdd_since_cut / params.cgdd_for_efc
                } else {
                    0.0
                }
            }
            CurveKind::CgddFromPlant => self.cgdd_since_cut,
            CurveKind::PercentTimeFromPlant => {
                if params.time_for_harvest > 0.0 {
                    100.0 * self.days_since_cut as FloatValue / params.time_for_harvest
                } else {
                    0.0
                }
            }
            CurveKind::PercentTimeToEfc => {
                if params.time_for_efc > 0.0 {
                    100.0 * self.days_since_cut as FloatValue / params.time_for_efc
                } else {
                    0.0
                }
            }
        };
        self.key_base + since
    }

    fn grow_canopy(&mut self, kcb: FloatValue, params: &CropParameters, curve: &KcbCurve) {
        let first = curve.first_kcb();
        let peak = curve.peak_kcb();
        let target = if peak > first {
            let ratio = ((kcb - first) / (peak - first)).clamp(0.0, 1.0);
            params.height_initial + (params.height_max - params.height_initial) * ratio
        } else {
            params.height_max
        };
        self.height = self.height.max(target.min(params.height_max));
    }

    fn grow_roots(&mut self, params: &CropParameters, kind: CurveKind) {
        let frac_time = params.end_of_root_growth_fraction_time.max(1e-6);
        let fraction = (self.efc_progress(params, kind) / frac_time).clamp(0.0, 1.0);
        let target = params.rooting_depth_initial
            + (params.rooting_depth_max - params.rooting_depth_initial) * fraction;
        self.root_depth = self.root_depth.max(target.min(params.rooting_depth_max));
    }

    /// Advance one day and report today's phenology.
    pub fn advance(
        &mut self,
        date: NaiveDate,
        climate: &DayClimate,
        params: &CropParameters,
        curve: &KcbCurve,
        settings: &PhenologySettings,
    ) -> PhenoDay {
        // New calendar year: cutting counters restart and a finished season
        // may search again.
        if date.month() == 1 && date.day() == 1 {
            self.cuttings = 0;
            if self.phase == CropPhase::PostSeason {
                self.phase = CropPhase::PreSeason;
            }
        }

        if params.is_winter_surface {
            return PhenoDay {
                in_season: true,
                kcb_basis: params.winter_kcb(),
                height: params.height_initial,
                root_depth: params.rooting_depth_initial,
                mad_fraction: params.mad_midseason_fraction(),
                season_started: false,
                season_ended: false,
                cutting: false,
                days_after_planting: None,
            };
        }

        let mut season_started = false;
        if self.phase == CropPhase::PreSeason
            && self.wants_planting(date, climate, params, settings)
        {
            self.start_season(date, params);
            season_started = true;
        }

        if self.phase != CropPhase::InSeason {
            return PhenoDay {
                in_season: false,
                kcb_basis: params.winter_kcb(),
                height: params.height_initial,
                root_depth: params.rooting_depth_initial,
                mad_fraction: params.mad_midseason_fraction(),
                season_started: false,
                season_ended: false,
                cutting: false,
                days_after_planting: None,
            };
        }

        if !season_started {
            self.days_after_planting += 1;
            self.days_since_cut += 1;
        }
        let gdd = (climate.tmean - params.tbase).max(0.0);
        self.cgdd += gdd;
        self.cgdd_since_cut += gdd;

        if self.efc_progress(params, curve.kind) >= 1.0 {
            self.efc_reached = true;
        }

        // Cutting fires once the regrowth accumulates a full set of heat
        // units, until the cell's cap for this schedule is spent.
        let mut cutting = false;
        if settings.cutting_enabled
            && curve.regrowth_key.is_some()
            && self.cuttings < settings.cutting_cap
            && params.cgdd_for_efc > 0.0
            && self.cgdd_since_cut >= params.cgdd_for_efc
        {
            cutting = true;
            self.cuttings += 1;
            self.cgdd_since_cut = 0.0;
            self.days_since_cut = 0;
            self.key_base = curve.regrowth_key.unwrap_or(0.0);
            self.height = params.height_initial;
        }

        let kcb = curve.evaluate(self.curve_key(params, curve));
        self.grow_canopy(kcb, params, curve);
        self.grow_roots(params, curve.kind);

        let mad = if self.efc_reached {
            params.mad_midseason_fraction()
        } else {
            params.mad_initial_fraction()
        };

        // Termination: frost, then heat units, then the calendar.
        let mut season_ended = false;
        if climate.tmin <= params.killing_frost_temperature {
            season_ended = true;
        } else if params.cgdd_for_termination > 0.0 && self.cgdd >= params.cgdd_for_termination {
            season_ended = true;
        } else if params.time_for_harvest > 0.0
            && self.days_after_planting as FloatValue >= params.time_for_harvest
        {
            season_ended = true;
        }

        let day = PhenoDay {
            in_season: true,
            kcb_basis: kcb,
            height: self.height,
            root_depth: self.root_depth,
            mad_fraction: mad,
            season_started,
            season_ended,
            cutting,
            days_after_planting: Some(self.days_after_planting),
        };
        if season_ended {
            self.end_season(params);
        }
        day
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{PlantingMethod, WinterCoverClass};
    use approx::assert_abs_diff_eq;

    fn annual() -> CropParameters {
        CropParameters::default()
    }

    fn curve_time() -> KcbCurve {
        KcbCurve::new(
            5,
            CurveKind::PercentTimeFromPlant,
            vec![(0.0, 0.15), (40.0, 1.05), (80.0, 1.05), (100.0, 0.4)],
            None,
        )
        .unwrap()
    }

    fn alfalfa() -> CropParameters {
        CropParameters {
            name: "Alfalfa".to_string(),
            is_annual: false,
            planting_method: PlantingMethod::Cgdd,
            cgdd_for_planting: 50.0,
            tbase: 0.0,
            cgdd_for_efc: 800.0,
            cgdd_for_termination: 0.0,
            time_for_efc: 0.0,
            time_for_harvest: 0.0,
            killing_frost_temperature: -6.0,
            winter_cover_class: WinterCoverClass::Sod,
            cutting_schedule: Some(crate::parameters::CuttingSchedule::Dairy),
            ..CropParameters::default()
        }
    }

    fn alfalfa_curve() -> KcbCurve {
        KcbCurve::new(
            2,
            CurveKind::NormalizedCgdd,
            vec![(0.0, 0.3), (0.5, 1.0), (1.0, 1.15)],
            Some(0.4),
        )
        .unwrap()
    }

    fn settings(cap: u32) -> PhenologySettings {
        PhenologySettings {
            northern: true,
            season_limit: true,
            cutting_enabled: true,
            cutting_cap: cap,
        }
    }

    fn warm(t30: FloatValue) -> DayClimate {
        DayClimate {
            tmean: 18.0,
            tmin: 8.0,
            t30,
            t30_lt: t30,
            cgdd0: 0.0,
        }
    }

    fn run_days(
        state: &mut CycleState,
        start: NaiveDate,
        days: usize,
        climate: impl Fn(usize) -> DayClimate,
        params: &CropParameters,
        curve: &KcbCurve,
        settings: &PhenologySettings,
    ) -> Vec<PhenoDay> {
        (0..days)
            .map(|i| {
                let date = start + chrono::Duration::days(i as i64);
                state.advance(date, &climate(i), params, curve, settings)
            })
            .collect()
    }

    #[test]
    fn t30_planting_waits_for_the_window() {
        let params = annual();
        let curve = curve_time();
        let mut state = CycleState::new(&params);
        let start = NaiveDate::from_ymd_opt(1995, 1, 1).unwrap();
        // Warm enough from the start, but the window opens at day 60
        let days = run_days(
            &mut state,
            start,
            70,
            |_| warm(12.0),
            &params,
            &curve,
            &settings(0),
        );
        assert!(!days[58].in_season);
        assert!(days[59].season_started);
        assert!(days[59].in_season);
        assert_eq!(days[59].days_after_planting, Some(0));
        assert_eq!(days[60].days_after_planting, Some(1));
    }

    #[test]
    fn cold_spring_never_plants() {
        let params = annual();
        let curve = curve_time();
        let mut state = CycleState::new(&params);
        let start = NaiveDate::from_ymd_opt(1995, 1, 1).unwrap();
        let days = run_days(
            &mut state,
            start,
            365,
            |_| warm(4.0),
            &params,
            &curve,
            &settings(0),
        );
        assert!(days.iter().all(|d| !d.in_season));
        assert_eq!(state.phase(), CropPhase::PreSeason);
    }

    #[test]
    fn season_limit_blocks_late_planting() {
        let params = annual();
        let curve = curve_time();
        let start = NaiveDate::from_ymd_opt(1995, 1, 1).unwrap();
        // Warmth only arrives at day 250, past the search close
        let late = |i: usize| warm(if i >= 249 { 15.0 } else { 4.0 });

        let mut capped = CycleState::new(&params);
        let days = run_days(&mut capped, start, 300, late, &params, &curve, &settings(0));
        assert!(days.iter().all(|d| !d.in_season));

        let mut open = CycleState::new(&params);
        let mut settings = settings(0);
        settings.season_limit = false;
        let days = run_days(&mut open, start, 300, late, &params, &curve, &settings);
        assert!(days[249].season_started);
    }

    #[test]
    fn southern_window_shifts_half_a_year() {
        let params = annual();
        let curve = curve_time();
        let mut settings = settings(0);
        settings.northern = false;
        let mut state = CycleState::new(&params);
        let start = NaiveDate::from_ymd_opt(1995, 1, 1).unwrap();
        // Warmth from day 200: calendar days 201..241 sit outside the
        // shifted window, so planting waits for day 242 (effective day 60)
        let days = run_days(
            &mut state,
            start,
            300,
            |i| warm(if i >= 199 { 15.0 } else { 4.0 }),
            &params,
            &curve,
            &settings,
        );
        let planted: Vec<usize> = days
            .iter()
            .enumerate()
            .filter(|(_, d)| d.season_started)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(planted, vec![241]);
    }

    #[test]
    fn southern_search_spans_new_year() {
        // The shifted window wraps: early January is still searchable
        assert_eq!(effective_doy(1, false), 184);
        assert_eq!(effective_doy(242, false), 60);
        assert_eq!(effective_doy(29, false), 212);
        assert_eq!(effective_doy(100, false), 283);
    }

    #[test]
    fn cgdd_planting_ignores_the_window() {
        let params = alfalfa();
        let curve = alfalfa_curve();
        let mut state = CycleState::new(&params);
        let start = NaiveDate::from_ymd_opt(1995, 1, 1).unwrap();
        // 17.5 degC-days per day crosses 50 on the third day
        let days = run_days(
            &mut state,
            start,
            10,
            |i| DayClimate {
                tmean: 17.5,
                tmin: 10.0,
                t30: 17.5,
                t30_lt: 17.5,
                cgdd0: 17.5 * (i + 1) as FloatValue,
            },
            &params,
            &curve,
            &settings(4),
        );
        assert!(!days[1].in_season);
        assert!(days[2].season_started);
    }

    #[test]
    fn frost_ends_the_season_that_day() {
        let params = annual();
        let curve = curve_time();
        let mut state = CycleState::new(&params);
        let start = NaiveDate::from_ymd_opt(1995, 3, 1).unwrap();
        let days = run_days(
            &mut state,
            start,
            40,
            |i| {
                let mut c = warm(15.0);
                if i == 30 {
                    c.tmin = -10.0;
                }
                c
            },
            &params,
            &curve,
            &settings(0),
        );
        assert!(days[29].in_season && !days[29].season_ended);
        assert!(days[30].in_season && days[30].season_ended);
        assert!(!days[31].in_season);
        assert_eq!(state.phase(), CropPhase::PostSeason);
    }

    #[test]
    fn harvest_time_ends_the_season() {
        let mut params = annual();
        params.time_for_harvest = 20.0;
        params.cgdd_for_termination = 0.0;
        params.killing_frost_temperature = -30.0;
        let curve = curve_time();
        let mut state = CycleState::new(&params);
        let start = NaiveDate::from_ymd_opt(1995, 3, 1).unwrap();
        let days = run_days(
            &mut state,
            start,
            40,
            |_| warm(15.0),
            &params,
            &curve,
            &settings(0),
        );
        let end = days.iter().position(|d| d.season_ended).unwrap();
        assert_eq!(days[end].days_after_planting, Some(20));
    }

    #[test]
    fn heat_units_end_the_season_before_time() {
        let mut params = annual();
        params.time_for_harvest = 300.0;
        params.cgdd_for_termination = 130.0;
        params.killing_frost_temperature = -30.0;
        params.tbase = 5.0;
        let curve = curve_time();
        let mut state = CycleState::new(&params);
        let start = NaiveDate::from_ymd_opt(1995, 3, 1).unwrap();
        // 13 degC-days per day at base 5 reaches 130 on the tenth day
        let days = run_days(
            &mut state,
            start,
            40,
            |_| DayClimate {
                tmean: 18.0,
                tmin: 8.0,
                t30: 15.0,
                t30_lt: 15.0,
                cgdd0: 0.0,
            },
            &params,
            &curve,
            &settings(0),
        );
        let end = days.iter().position(|d| d.season_ended).unwrap();
        assert_eq!(end, 9);
    }

    #[test]
    fn cuttings_reset_the_curve_and_respect_the_cap() {
        let params = alfalfa();
        let curve = alfalfa_curve();
        let mut state = CycleState::new(&params);
        let start = NaiveDate::from_ymd_opt(1995, 4, 1).unwrap();
        // 20 degC-days per day: EFC (800) reached after 40 days of growth
        let days = run_days(
            &mut state,
            start,
            200,
            |i| DayClimate {
                tmean: 20.0,
                tmin: 10.0,
                t30: 20.0,
                t30_lt: 20.0,
                cgdd0: 100.0 + 20.0 * i as FloatValue,
            },
            &params,
            &curve,
            &settings(2),
        );
        let cut_days: Vec<usize> = days
            .iter()
            .enumerate()
            .filter(|(_, d)| d.cutting)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(cut_days.len(), 2);
        assert_eq!(state.cuttings(), 2);
        // Kcb falls to the regrowth point the day after a cutting
        let after = cut_days[0] + 1;
        assert!(days[after].kcb_basis < days[cut_days[0] - 1].kcb_basis);
        assert_abs_diff_eq!(
            days[after].kcb_basis,
            curve.evaluate(0.4 + 20.0 / 800.0),
            epsilon = 1e-12
        );
        // The cap leaves later regrowth uncut and the curve holds its tail
        assert!(days[199].in_season);
    }

    #[test]
    fn mad_switches_at_effective_full_cover() {
        let mut params = annual();
        params.killing_frost_temperature = -30.0;
        params.cgdd_for_termination = 0.0;
        params.time_for_harvest = 0.0;
        params.time_for_efc = 10.0;
        let curve = curve_time();
        let mut state = CycleState::new(&params);
        let start = NaiveDate::from_ymd_opt(1995, 3, 1).unwrap();
        let days = run_days(
            &mut state,
            start,
            30,
            |_| warm(15.0),
            &params,
            &curve,
            &settings(0),
        );
        assert_abs_diff_eq!(days[5].mad_fraction, params.mad_initial_fraction());
        assert_abs_diff_eq!(days[15].mad_fraction, params.mad_midseason_fraction());
    }

    #[test]
    fn roots_grow_monotonically_to_the_maximum() {
        let mut params = annual();
        params.killing_frost_temperature = -30.0;
        params.cgdd_for_termination = 0.0;
        params.time_for_harvest = 0.0;
        params.time_for_efc = 20.0;
        params.end_of_root_growth_fraction_time = 0.5;
        let curve = curve_time();
        let mut state = CycleState::new(&params);
        let start = NaiveDate::from_ymd_opt(1995, 3, 1).unwrap();
        let days = run_days(
            &mut state,
            start,
            40,
            |_| warm(15.0),
            &params,
            &curve,
            &settings(0),
        );
        let depths: Vec<FloatValue> = days.iter().map(|d| d.root_depth).collect();
        assert!(depths.windows(2).all(|w| w[1] >= w[0]));
        // Roots hit their maximum halfway to EFC
        assert_abs_diff_eq!(depths[12], params.rooting_depth_max, epsilon = 1e-12);
        assert!(depths[0] < params.rooting_depth_max);
    }

    #[test]
    fn winter_surface_is_always_in_season() {
        let mut params = annual();
        params.is_winter_surface = true;
        params.winter_cover_class = WinterCoverClass::Mulched;
        let curve = curve_time();
        let mut state = CycleState::new(&params);
        let start = NaiveDate::from_ymd_opt(1995, 1, 1).unwrap();
        let days = run_days(
            &mut state,
            start,
            365,
            |_| warm(-5.0),
            &params,
            &curve,
            &settings(0),
        );
        assert!(days.iter().all(|d| d.in_season));
        assert!(days.iter().all(|d| (d.kcb_basis - 0.05).abs() < 1e-12));
    }

    #[test]
    fn new_year_reopens_the_search() {
        let mut params = annual();
        params.time_for_harvest = 30.0;
        params.killing_frost_temperature = -30.0;
        params.cgdd_for_termination = 0.0;
        let curve = curve_time();
        let mut state = CycleState::new(&params);
        let start = NaiveDate::from_ymd_opt(1995, 1, 1).unwrap();
        let days = run_days(
            &mut state,
            start,
            800,
            |_| warm(15.0),
            &params,
            &curve,
            &settings(0),
        );
        let starts: Vec<usize> = days
            .iter()
            .enumerate()
            .filter(|(_, d)| d.season_started)
            .map(|(i, _)| i)
            .collect();
        // One planting per calendar year at the window opening
        assert_eq!(starts.len(), 3);
        assert_eq!(starts[0], 59);
        assert_eq!(starts[1], 59 + 365);
    }
}
