//! Across-cell driver
//!
//! Cells are independent: each worker owns all mutable state for its cell
//! and writes to (cell, crop)-partitioned output files, so the run
//! parallelizes with rayon and no locking. A failing cell is recorded and
//! skipped; it never disturbs another cell's output. Configuration and
//! store-loading errors abort before any cell starts.

use std::fs::{self, File};
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{error, info, warn};

use dualkc_core::errors::{DualKcError, DualKcResult};

use crate::cell::run_cell;
use crate::config::RunConfig;
use crate::output::{self, CellOutput, CropSeries};
use crate::parameters::{CellProperties, CellStore, CropStore, CurveStore};
use crate::weather::load_station;

/// The minimal bundle a worker needs to simulate one cell: the cell
/// descriptor plus shared read-only configuration and stores. Weather is
/// read inside the worker so file I/O also fans out.
pub struct CellWorkItem<'a> {
    pub config: &'a RunConfig,
    pub cell: &'a CellProperties,
    pub crops: &'a CropStore,
    pub curves: &'a CurveStore,
}

impl CellWorkItem<'_> {
    pub fn run(&self) -> DualKcResult<CellOutput> {
        let weather = load_station(
            &self.config.weather,
            &self.cell.ref_et_id,
            self.cell.elevation,
            &self.config.window,
        )?;
        run_cell(self.config, self.cell, &weather, self.crops, self.curves)
    }
}

/// Outcome of one cell.
#[derive(Debug)]
pub enum CellRun {
    Completed { cell_id: String, output: CellOutput },
    Skipped { cell_id: String, reason: String },
    Failed { cell_id: String, reason: String },
}

impl CellRun {
    pub fn cell_id(&self) -> &str {
        match self {
            CellRun::Completed { cell_id, .. }
            | CellRun::Skipped { cell_id, .. }
            | CellRun::Failed { cell_id, .. } => cell_id,
        }
    }
}

/// Counts by outcome, logged and returned at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// A loaded, validated run: immutable configuration plus the three shared
/// read-only stores.
#[derive(Debug)]
pub struct Simulation {
    config: RunConfig,
    cells: CellStore,
    crops: CropStore,
    curves: CurveStore,
}

impl Simulation {
    /// Load and validate everything the run shares. Any error here is fatal
    /// and aborts before a single cell is simulated.
    pub fn load(config: RunConfig) -> DualKcResult<Self> {
        config.validate()?;
        let delimiter = config.paths.delimiter_char()?;
        let elevation_unit = config.paths.elevation_unit()?;
        let cells = CellStore::load(
            &config.paths.cell_properties,
            &config.paths.cell_crop_flags,
            config.paths.mean_cuttings.as_deref(),
            delimiter,
            elevation_unit,
        )?;
        let crops = CropStore::from_path(&config.paths.crop_parameters, delimiter)?;
        let curves = CurveStore::from_path(&config.paths.crop_coefficients, delimiter)?;
        info!(
            cells = cells.len(),
            crops = crops.len(),
            curves = curves.len(),
            "stores loaded"
        );
        Ok(Self {
            config,
            cells,
            crops,
            curves,
        })
    }

    /// Build a simulation from already-loaded stores; used by tests.
    pub fn from_parts(
        config: RunConfig,
        cells: CellStore,
        crops: CropStore,
        curves: CurveStore,
    ) -> Self {
        Self {
            config,
            cells,
            crops,
            curves,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Simulate every admitted cell, in parallel, writing the configured
    /// outputs as each cell finishes.
    pub fn run(&self) -> DualKcResult<(Vec<CellRun>, RunSummary)> {
        let out = &self.config.output;
        if out.daily || out.monthly || out.annual || out.growing_season {
            fs::create_dir_all(&out.directory).map_err(|e| {
                DualKcError::Error(format!(
                    "cannot create output directory {}: {e}",
                    out.directory.display()
                ))
            })?;
        }

        let admitted: Vec<&CellProperties> = self
            .cells
            .iter()
            .filter(|cell| self.config.cells.admits(&cell.id))
            .collect();
        info!(cells = admitted.len(), "starting run");

        let runs: Vec<CellRun> = admitted
            .par_iter()
            .map(|cell| self.run_one(cell))
            .collect();

        let mut summary = RunSummary::default();
        for run in &runs {
            match run {
                CellRun::Completed { .. } => summary.completed += 1,
                CellRun::Skipped { .. } => summary.skipped += 1,
                CellRun::Failed { .. } => summary.failed += 1,
            }
        }
        info!(
            completed = summary.completed,
            skipped = summary.skipped,
            failed = summary.failed,
            "run finished"
        );
        Ok((runs, summary))
    }

    fn run_one(&self, cell: &CellProperties) -> CellRun {
        let item = CellWorkItem {
            config: &self.config,
            cell,
            crops: &self.crops,
            curves: &self.curves,
        };
        let result = item
            .run()
            .and_then(|output| self.write_outputs(&output).map(|()| output));
        match result {
            Ok(output) => CellRun::Completed {
                cell_id: cell.id.clone(),
                output,
            },
            Err(err) if err.is_skippable() => {
                warn!(cell = %cell.id, %err, "cell skipped");
                CellRun::Skipped {
                    cell_id: cell.id.clone(),
                    reason: err.to_string(),
                }
            }
            Err(err) => {
                error!(cell = %cell.id, %err, "cell failed");
                CellRun::Failed {
                    cell_id: cell.id.clone(),
                    reason: err.to_string(),
                }
            }
        }
    }

    fn output_path(&self, series: &CropSeries, kind: &str) -> PathBuf {
        self.config.output.directory.join(format!(
            "{}_crop{:02}_{kind}.csv",
            series.cell_id, series.crop_number
        ))
    }

    fn create(&self, path: &PathBuf) -> DualKcResult<File> {
        File::create(path)
            .map_err(|e| DualKcError::Error(format!("cannot create {}: {e}", path.display())))
    }

    fn write_outputs(&self, output: &CellOutput) -> DualKcResult<()> {
        let out = &self.config.output;
        let flags = &self.config.flags;
        for series in &output.series {
            if out.daily {
                let file = self.create(&self.output_path(series, "daily"))?;
                output::write_daily(file, series, flags)?;
            }
            if out.monthly || out.annual {
                let months = output::monthly_totals(&series.rows);
                if out.monthly {
                    let file = self.create(&self.output_path(series, "monthly"))?;
                    output::write_monthly(file, &months, flags)?;
                }
                if out.annual {
                    let years = output::annual_totals(&months);
                    let file = self.create(&self.output_path(series, "annual"))?;
                    output::write_annual(file, &years, flags)?;
                }
            }
            if out.growing_season {
                let seasons = output::growing_season_totals(&series.rows);
                let file = self.create(&self.output_path(series, "gs"))?;
                output::write_growing_season(file, &seasons, flags)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};
    use std::path::Path;

    const PROPS: &str = "\
ET Cell ID\tET Cell Name\tRef ET ID\tLatitude\tLongitude\tElevation\tArea Weighted Average Permeability\tArea Weighted Average WHC\tAverage Soil Depth\tHydrologic Group (A-C)\tHydrologic Group (1-3)\tAridity Rating
c01\tNorth Bench\tstn4\t41.5\t-112.3\t4250\t2.4\t1.8\t60\tB\t2\t0
c02\tDry Hollow\tstn9\t41.1\t-112.6\t4400\t2.0\t1.5\t48\tA\t1\t0
";

    const FLAGS: &str = "\
ET Cell ID\tET Cell Name\tRef ET ID\tIrrigation\t7
c01\tNorth Bench\tstn4\t1\t1
c02\tDry Hollow\tstn9\t0\t1
";

    const CROPS: &str = "\
parameter\t7
name\tSweet corn
annual_flag\t1
winter_surface_flag\t0
curve_id\t5
planting_method\t2
t30_for_planting\t11
cgdd_for_planting\t0
tbase\t10
cgdd_for_efc\t750
cgdd_for_termination\t0
time_for_efc\t50
time_for_harvest\t95
killing_frost_temperature\t-1.5
winter_cover_class\t1
height_initial\t0.1
height_max\t1.8
rooting_depth_initial\t0.2
rooting_depth_max\t0.9
end_of_root_growth_fraction_time\t0.65
mad_initial\t40
mad_midseason\t50
fw_irrigation\t0.8
cn_coarse_soil\t67
cn_medium_soil\t77
cn_fine_soil\t86
invoke_stress\t1
cutting_schedule\t0
";

    const CURVES: &str = "\
Curve ID\tCurve Type\tProgress\tKcb\tRegrowth
5\tpercent_time_from_plant\t0\t0.15\t0
5\tpercent_time_from_plant\t45\t1.05\t0
5\tpercent_time_from_plant\t85\t1.05\t0
5\tpercent_time_from_plant\t100\t0.4\t0
";

    fn weather_csv(year: i32) -> String {
        let start = NaiveDate::from_ymd_opt(year, 1, 1).unwrap();
        let days = if dualkc_core::time::is_leap_year(year) {
            366
        } else {
            365
        };
        let mut csv = String::from("Date,TMax,TMin,Prcp,Snow,SDep,Wind,TDew,ETr\n");
        for i in 0..days {
            let date = start + chrono::Duration::days(i);
            let doy = date.ordinal() as f64;
            let wave = (std::f64::consts::TAU * (doy - 196.0) / 365.0).cos();
            let tmax = 18.0 + 14.0 * wave;
            let tmin = 4.0 + 10.0 * wave;
            let rain = if i % 11 == 0 { 7.0 } else { 0.0 };
            let et = (2.5 + 4.0 * wave).max(0.5);
            csv.push_str(&format!(
                "{},{tmax:.2},{tmin:.2},{rain:.1},0.0,0.0,2.0,{:.2},{et:.2}\n",
                date.format("%Y-%m-%d"),
                tmin - 2.0,
            ));
        }
        csv
    }

    fn write(path: &Path, text: &str) {
        fs::write(path, text).unwrap();
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dualkc-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("weather")).unwrap();
        dir
    }

    fn config_for(dir: &Path) -> RunConfig {
        let mut config = RunConfig::default();
        config.paths.cell_properties = dir.join("cells.txt");
        config.paths.cell_crop_flags = dir.join("flags.txt");
        config.paths.mean_cuttings = None;
        config.paths.crop_parameters = dir.join("crops.txt");
        config.paths.crop_coefficients = dir.join("curves.txt");
        config.weather.directory = dir.join("weather");
        config.output.directory = dir.join("output");
        config
    }

    #[test]
    fn end_to_end_run_writes_partitioned_outputs() {
        let dir = scratch_dir("e2e");
        write(&dir.join("cells.txt"), PROPS);
        write(&dir.join("flags.txt"), FLAGS);
        write(&dir.join("crops.txt"), CROPS);
        write(&dir.join("curves.txt"), CURVES);
        // Only c01's station has a weather file; c02 must be skipped
        write(&dir.join("weather/stn4_daily.csv"), &weather_csv(1999));

        let sim = Simulation::load(config_for(&dir)).unwrap();
        let (runs, summary) = sim.run().unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert!(runs
            .iter()
            .any(|r| matches!(r, CellRun::Skipped { cell_id, .. } if cell_id == "c02")));

        let daily = fs::read_to_string(dir.join("output/c01_crop07_daily.csv")).unwrap();
        assert_eq!(daily.lines().count(), 366);
        assert!(daily.starts_with("Date,DOY,ETref"));
        let monthly = fs::read_to_string(dir.join("output/c01_crop07_monthly.csv")).unwrap();
        assert_eq!(monthly.lines().count(), 13);
        let annual = fs::read_to_string(dir.join("output/c01_crop07_annual.csv")).unwrap();
        assert_eq!(annual.lines().count(), 2);
        let gs = fs::read_to_string(dir.join("output/c01_crop07_gs.csv")).unwrap();
        assert_eq!(gs.lines().count(), 2);
        // The growing season started, so the sentinels are populated
        let season_line = gs.lines().nth(1).unwrap();
        assert!(!season_line.starts_with("1999,,"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn cell_filter_restricts_the_run() {
        let dir = scratch_dir("filter");
        write(&dir.join("cells.txt"), PROPS);
        write(&dir.join("flags.txt"), FLAGS);
        write(&dir.join("crops.txt"), CROPS);
        write(&dir.join("curves.txt"), CURVES);
        write(&dir.join("weather/stn4_daily.csv"), &weather_csv(1999));

        let mut config = config_for(&dir);
        config.cells.test = vec!["c01".to_string()];
        let sim = Simulation::load(config).unwrap();
        let (runs, summary) = sim.run().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(runs[0].cell_id(), "c01");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_static_table_aborts_the_load() {
        let dir = scratch_dir("abort");
        write(&dir.join("cells.txt"), PROPS);
        write(&dir.join("flags.txt"), FLAGS);
        write(&dir.join("curves.txt"), CURVES);
        // crops.txt deliberately absent

        let err = Simulation::load(config_for(&dir)).unwrap_err();
        assert!(matches!(err, DualKcError::MissingInputFile { .. }));

        fs::remove_dir_all(&dir).unwrap();
    }
}
