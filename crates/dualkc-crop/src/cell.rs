//! Per-cell orchestrator
//!
//! One call runs every active crop of a cell over the cell's resolved
//! window: derive the climate series, resolve a (parameters, cycle, balance)
//! triple per crop, then advance all crops in lock-step over the dates. Each
//! day the cycle controller moves first, the coefficient adjustments follow,
//! the water balance closes the day, and a [`DailyOutput`] row is pushed.
//! Crops never interact; they share only the weather.
//!
//! Invariant checks run on every day's fluxes. A violation aborts the cell
//! with a `FatalInternal` diagnostic naming (cell, crop, date).

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use dualkc_core::errors::{DualKcError, DualKcResult};
use dualkc_core::time::doy;
use dualkc_core::FloatValue;

use crate::balance::{BalanceContext, CoefficientDay, DayFluxes, SoilState};
use crate::climate::{CellClimate, ClimateOptions};
use crate::config::RunConfig;
use crate::kcb;
use crate::output::{CellOutput, CropSeries, DailyOutput};
use crate::parameters::{
    CellProperties, Co2Class, CropParameters, CropStore, CurveStore, KcbCurve,
};
use crate::phenology::{CycleState, DayClimate, PhenologySettings};
use crate::weather::DailyWeather;

/// Everything one crop carries through the daily loop.
struct CropRun<'a> {
    number: u8,
    params: CropParameters,
    curve: &'a KcbCurve,
    settings: PhenologySettings,
    co2_class: Option<Co2Class>,
    cycle: CycleState,
    soil: SoilState,
    ctx: BalanceContext,
    rows: Vec<DailyOutput>,
}

fn admits_crop(config: &RunConfig, params: &CropParameters) -> bool {
    if params.is_winter_surface {
        return true;
    }
    if params.is_annual && config.flags.annual_skip {
        return false;
    }
    if !params.is_annual && config.flags.perennial_skip {
        return false;
    }
    true
}

fn resolve_crops<'a>(
    config: &RunConfig,
    cell: &CellProperties,
    crops: &CropStore,
    curves: &'a CurveStore,
) -> DualKcResult<Vec<CropRun<'a>>> {
    let mut runs = Vec::new();
    for &number in &cell.crop_flags {
        if !config.crops.admits(number) {
            continue;
        }
        let Some(params) =
            crops.resolve_for_cell(number, config.override_for(&cell.id, number))
        else {
            warn!(cell = %cell.id, crop = number, "crop not in parameter store; skipped");
            continue;
        };
        if !admits_crop(config, &params) {
            continue;
        }
        let curve = curves.get(params.curve_id).ok_or_else(|| {
            DualKcError::Configuration(format!(
                "crop {number} ('{}') references missing curve {}",
                params.name, params.curve_id
            ))
        })?;
        let co2_class = if config.flags.co2 {
            config.co2.class_for(number)
        } else {
            None
        };
        let settings =
            PhenologySettings::resolve(cell, &params, config.flags.cutting, config.flags.gs_limit);
        let ctx = BalanceContext::resolve(cell, &params, config.irrigation.refill_fraction);
        let cycle = CycleState::new(&params);
        let soil = SoilState::new(&params);
        runs.push(CropRun {
            number,
            params,
            curve,
            settings,
            co2_class,
            cycle,
            soil,
            ctx,
            rows: Vec::new(),
        });
    }
    Ok(runs)
}

fn check_fluxes(
    cell: &str,
    crop: u8,
    date: NaiveDate,
    fluxes: &DayFluxes,
    tew: FloatValue,
) -> DualKcResult<()> {
    const EPS: FloatValue = 1e-9;
    let checks: [(&str, bool); 6] = [
        (
            "Dr outside [0, TAW]",
            fluxes.dr >= -EPS && fluxes.dr <= fluxes.taw + EPS,
        ),
        (
            "De outside [0, TEW]",
            fluxes.de >= -EPS && fluxes.de <= tew + EPS,
        ),
        (
            "stress coefficients outside [0, 1]",
            (0.0..=1.0 + EPS).contains(&fluxes.ks) && (0.0..=1.0 + EPS).contains(&fluxes.kr),
        ),
        (
            "negative coefficient",
            fluxes.kcb >= 0.0 && fluxes.ke >= 0.0 && fluxes.kc >= 0.0,
        ),
        (
            "NIWR outside [0, ETact]",
            fluxes.niwr >= 0.0 && fluxes.niwr <= fluxes.et_act + EPS,
        ),
        ("TAW not positive", fluxes.taw > 0.0),
    ];
    for (reason, ok) in checks {
        if !ok {
            return Err(DualKcError::FatalInternal {
                cell: cell.to_string(),
                crop,
                date,
                reason: reason.to_string(),
            });
        }
    }
    Ok(())
}

/// Run every admitted crop of one cell over its weather record.
pub fn run_cell(
    config: &RunConfig,
    cell: &CellProperties,
    weather: &DailyWeather,
    crops: &CropStore,
    curves: &CurveStore,
) -> DualKcResult<CellOutput> {
    if config.flags.co2 && !weather.co2.has_any() {
        return Err(DualKcError::MissingField {
            field: "co2_grass|co2_tree|co2_c4".to_string(),
            table: format!("weather ({})", weather.station_id),
        });
    }

    let climate = CellClimate::build(
        weather,
        &ClimateOptions {
            aridity_rating: cell.aridity_rating,
            phenology_from_observed: config.flags.phenology_from_observed,
        },
    );
    let mut runs = resolve_crops(config, cell, crops, curves)?;
    info!(
        cell = %cell.id,
        crops = runs.len(),
        days = weather.num_days(),
        "simulating cell"
    );

    for i in 0..weather.num_days() {
        let date = weather.date_at(i);
        let day_of_year = doy(date);
        let day_climate = DayClimate {
            tmean: climate.tmean[i],
            tmin: climate.tmin[i],
            t30: climate.t30[i],
            t30_lt: climate.t30_lt[day_of_year as usize],
            cgdd0: climate.cgdd0[i],
        };

        for run in &mut runs {
            let pheno = run
                .cycle
                .advance(date, &day_climate, &run.params, run.curve, &run.settings);
            // Termination takes effect the same day: the surface falls to
            // its winter cover and transpiration stops.
            let (active, kcb_basis) = if pheno.season_ended {
                (false, run.params.winter_kcb())
            } else {
                (pheno.in_season, pheno.kcb_basis)
            };
            let mut kcb_adj = kcb::adjust_kcb(
                kcb_basis,
                weather.wind_2m[i],
                weather.rh_min[i],
                pheno.height,
            );
            if active {
                if let Some(class) = run.co2_class {
                    kcb_adj *= weather.co2.factor(class, i);
                }
            }
            if pheno.season_started {
                debug!(cell = %cell.id, crop = run.number, %date, "season started");
            }
            if pheno.season_ended {
                debug!(cell = %cell.id, crop = run.number, %date, "season ended");
            }

            let forcing = crate::balance::DayForcing {
                rain: weather.precip[i],
                snow: weather.snow[i],
                tmax: climate.tmax[i],
                etref: weather.etref[i],
                u2: weather.wind_2m[i],
                rh_min: weather.rh_min[i],
            };
            let crop_day = CoefficientDay {
                in_season: active,
                kcb: kcb_adj,
                height: pheno.height,
                root_depth: pheno.root_depth,
                mad_fraction: pheno.mad_fraction,
            };
            let fluxes = run.soil.step(&forcing, &crop_day, &run.ctx);
            check_fluxes(&cell.id, run.number, date, &fluxes, run.ctx.tew)?;

            run.rows.push(DailyOutput {
                date,
                doy: day_of_year,
                etref: fluxes.etref,
                ppt: fluxes.precip,
                et_act: fluxes.et_act,
                et_pot: fluxes.et_pot,
                et_bas: fluxes.et_bas,
                kc: fluxes.kc,
                kcb: fluxes.kcb,
                irrigation: fluxes.irrigation,
                runoff: fluxes.runoff,
                dperc: fluxes.dperc,
                niwr: fluxes.niwr,
                p_rz: fluxes.p_rz,
                p_eft: fluxes.p_eft,
                season: u8::from(active),
                cuttings: run.cycle.cuttings(),
            });
        }
    }

    let series = runs
        .into_iter()
        .map(|run| CropSeries {
            cell_id: cell.id.clone(),
            crop_number: run.number,
            crop_name: run.params.name.clone(),
            rows: run.rows,
        })
        .collect();
    Ok(CellOutput {
        cell_id: cell.id.clone(),
        series,
    })
}
