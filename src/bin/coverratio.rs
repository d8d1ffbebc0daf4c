//! Documentation for the binary is with the definition of `CoverRatioOptionsInit` below.

use clap::Parser;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{info, LevelFilter};
use satcover::{
    analyze_cell, cells_for_grid, scale_to_degrees, AnalysisCell, CellCoverage, CoverageDatabase,
    CoverageSummary, DateWindow, SampleGrid, SatCoverResult, SceneCatalog, SensorFamily,
    ANALYSIS_SCALE_M,
};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::PathBuf,
    thread::JoinHandle,
};

const CHANNEL_SIZE: usize = 100;

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Measure the proportion of the sample points' surrounding area with usable imagery.
///
/// For the analysis day (the 15th of the chosen month in 2020) this program scans a local archive
/// of red band granules, accumulates per pixel observation counts for the Landsat 7/8 and
/// Sentinel-2 archives, pools them onto a 20 km analysis grid, and prints the proportion of the
/// sample points' nominal 20 km x 20 km surroundings that carries at least one valid observation.
/// One line for Landsat, one line for Sentinel-2.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "coverratio")]
#[clap(author, version, about)]
struct CoverRatioOptionsInit {
    /// The path to the sample grid GeoJSON file.
    ///
    /// If this is not specified, then the program will check for it in the "SAMPLE_GRID"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "SAMPLE_GRID")]
    grid_file: PathBuf,

    /// The path to the granule archive directory.
    ///
    /// If this is not specified, then the program will check for it in the "SCENE_ARCHIVE"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "SCENE_ARCHIVE")]
    archive_dir: PathBuf,

    /// The path to a coverage database file to record this run in.
    ///
    /// If this is not specified, then the program will check for it in the "COVERAGE_DB"
    /// environment variable. If that is missing too, the run is not recorded.
    #[clap(short, long)]
    #[clap(env = "COVERAGE_DB")]
    database_file: Option<PathBuf>,

    /// The month of the analysis day.
    ///
    /// The analysis day is always the 15th of this month in 2020.
    #[clap(short, long)]
    #[clap(parse(try_from_str=parse_month))]
    #[clap(default_value = "04")]
    month: u32,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

fn parse_month(month: &str) -> SatCoverResult<u32> {
    let month: u32 = month.parse()?;

    if !(1..=12).contains(&month) {
        return Err(format!("month must be 1 through 12, got {}", month).into());
    }

    Ok(month)
}

#[derive(Debug)]
struct CoverRatioOptionsChecked {
    /// The path to the sample grid GeoJSON file.
    grid_file: PathBuf,

    /// The path to the granule archive directory.
    archive_dir: PathBuf,

    /// The path to a coverage database file, if the run should be recorded.
    database_file: Option<PathBuf>,

    /// The month of the analysis day.
    month: u32,

    /// Verbose output
    verbose: bool,
}

impl Display for CoverRatioOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "  Sample grid: {}", self.grid_file.display())?;
        writeln!(f, "      Archive: {}", self.archive_dir.display())?;
        match &self.database_file {
            Some(path) => writeln!(f, "     Database: {}", path.display())?,
            None => writeln!(f, "     Database: (run not recorded)")?,
        }
        writeln!(f, "        Month: {:02}", self.month)?;
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
///
/// If there is missing data, try to fill it in with environment variables.
fn parse_args() -> SatCoverResult<CoverRatioOptionsChecked> {
    let CoverRatioOptionsInit {
        grid_file,
        archive_dir,
        database_file,
        month,
        verbose,
    } = CoverRatioOptionsInit::parse();

    if !archive_dir.is_dir() {
        return Err(format!(
            "archive directory {} does not exist",
            archive_dir.display()
        )
        .into());
    }

    let checked = CoverRatioOptionsChecked {
        grid_file,
        archive_dir,
        database_file,
        month,
        verbose,
    };

    if checked.verbose {
        println!("{}", checked);
    }

    Ok(checked)
}

/*-------------------------------------------------------------------------------------------------
 *                                            Main
 *-----------------------------------------------------------------------------------------------*/
fn main() -> SatCoverResult<()> {
    let opts = parse_args()?;

    let module_level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .with_module_level("satcover", module_level)
        .init()?;

    //
    // Load the sample grid and reduce it to the distinct analysis cells.
    //
    let grid = SampleGrid::load(&opts.grid_file)?;
    let num_points = grid.len();

    let region = match grid.bounding_box() {
        Some(region) => region.padded(scale_to_degrees(ANALYSIS_SCALE_M)),
        None => return Err("no valid sample points in the grid".into()),
    };

    let cells = cells_for_grid(&grid);

    if opts.verbose {
        info!(
            target: "startup",
            "{} sample points in {} analysis cells",
            num_points,
            cells.len()
        );
    }

    //
    // Index the archive for the analysis day.
    //
    let window = DateWindow::for_month(opts.month)?;
    let catalog = SceneCatalog::build(&opts.archive_dir, window, region)?;

    //
    // Analyze the cells in a worker pool.
    //
    let (to_workers, from_cell_gen) = bounded(CHANNEL_SIZE);
    let (to_accumulator, from_workers) = bounded(CHANNEL_SIZE);

    let cell_gen = start_cell_gen(cells, to_workers)?;
    let workers = start_workers(&catalog, from_cell_gen, to_accumulator)?;
    let accumulator = start_accumulator(num_points, from_workers)?;

    let gen_res = cell_gen.join().expect("Error joining the cell generator");
    let worker_res: Vec<_> = workers
        .into_iter()
        .map(|jh| jh.join().expect("Error joining an analysis worker"))
        .collect();
    let acc_res = accumulator.join().expect("Error joining the accumulator");

    // When a worker fails, the accumulator holds the root cause and the other threads exit with
    // disconnected channel errors. Report the accumulator first.
    let (summary, cell_results) = acc_res?;
    gen_res?;
    for res in worker_res {
        res?;
    }

    //
    // Print the headline numbers, Landsat first.
    //
    println!(
        "Landsat: Proportion of sensed area {}",
        summary.proportion(SensorFamily::Landsat)
    );
    println!(
        "Sentinel-2: Proportion of sensed area {}",
        summary.proportion(SensorFamily::Sentinel2)
    );

    //
    // Record the run if a database was given.
    //
    if let Some(db_file) = &opts.database_file {
        CoverageDatabase::initialize(db_file)?;
        let db = CoverageDatabase::connect(db_file)?;
        let run_id = db.add_run(opts.month, &summary, &cell_results)?;

        if opts.verbose {
            info!(
                target: "summary",
                "Recorded run {} in {}",
                run_id,
                db_file.display()
            );
        }
    }

    Ok(())
}

/*-------------------------------------------------------------------------------------------------
 *                           Threads - Functions that start threads
 *-----------------------------------------------------------------------------------------------*/
fn start_cell_gen(
    cells: Vec<AnalysisCell>,
    to_workers: Sender<AnalysisCell>,
) -> SatCoverResult<JoinHandle<SatCoverResult<()>>> {
    let jh = std::thread::Builder::new()
        .name("coverratio-cells".to_owned())
        .spawn(move || {
            for cell in cells {
                to_workers.send(cell)?;
            }

            Ok(())
        })?;

    Ok(jh)
}

fn start_workers(
    catalog: &SceneCatalog,
    from_cell_gen: Receiver<AnalysisCell>,
    to_accumulator: Sender<SatCoverResult<Vec<CellCoverage>>>,
) -> SatCoverResult<Vec<JoinHandle<SatCoverResult<()>>>> {
    let mut handles = Vec::with_capacity(num_cpus::get());

    for _ in 0..num_cpus::get() {
        let catalog = catalog.clone();
        let from_cell_gen = from_cell_gen.clone();
        let to_accumulator = to_accumulator.clone();

        let jh = std::thread::Builder::new()
            .name("coverratio-analysis".to_owned())
            .spawn(move || {
                for cell in from_cell_gen {
                    to_accumulator.send(analyze_cell(&catalog, cell))?;
                }

                Ok(())
            })?;

        handles.push(jh);
    }

    Ok(handles)
}

fn start_accumulator(
    num_points: usize,
    from_workers: Receiver<SatCoverResult<Vec<CellCoverage>>>,
) -> SatCoverResult<JoinHandle<SatCoverResult<(CoverageSummary, Vec<CellCoverage>)>>> {
    let jh = std::thread::Builder::new()
        .name("coverratio-accumulate".to_owned())
        .spawn(move || {
            let mut summary = CoverageSummary::new(num_points)?;
            let mut cell_results: Vec<CellCoverage> = vec![];

            for result in from_workers {
                for cover in result? {
                    summary.add_cell(&cover);
                    cell_results.push(cover);
                }
            }

            Ok((summary, cell_results))
        })?;

    Ok(jh)
}
