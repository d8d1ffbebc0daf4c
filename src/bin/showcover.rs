//! Documentation for the binary is with the definition of `ShowCoverOptionsInit` below.

use chrono::{NaiveTime, TimeZone, Utc};
use clap::Parser;
use satcover::{CellRecord, CoverageDatabase, DateWindow, KmlFile, SatCoverResult, SensorFamily};
use std::{
    fmt::{self, Display, Write},
    path::PathBuf,
};
use strum::IntoEnumIterator;

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Export a stored coverage run as a KML map.
///
/// This program reads a run from the coverage database, the most recently stored one unless
/// --run picks another, and writes a KML file with one folder per sensor family and a colored
/// polygon for every observed analysis cell.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "showcover")]
#[clap(author, version, about)]
struct ShowCoverOptionsInit {
    /// The path to the coverage database file.
    ///
    /// If this is not specified, then the program will check for it in the "COVERAGE_DB"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "COVERAGE_DB")]
    database_file: PathBuf,

    /// The path to a KML file to produce from this run.
    ///
    /// If this is not specified, then the program will create one automatically by replacing the
    /// file extension on the database_file with "*.kml".
    #[clap(short, long)]
    kml_file: Option<PathBuf>,

    /// The id of the stored run to export.
    ///
    /// If this is not specified, then the most recently stored run is exported.
    #[clap(short, long)]
    run: Option<i64>,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct ShowCoverOptionsChecked {
    /// The path to the database file.
    database_file: PathBuf,

    /// The path to a KML file to produce from this run.
    kml_file: PathBuf,

    /// The id of the stored run to export, or the latest run when None.
    run: Option<i64>,

    /// Verbose output
    verbose: bool,
}

impl Display for ShowCoverOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "    Database: {}", self.database_file.display())?;
        writeln!(f, "  Output KML: {}", self.kml_file.display())?;
        match self.run {
            Some(id) => writeln!(f, "         Run: {}", id)?,
            None => writeln!(f, "         Run: latest")?,
        }
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
///
/// If there is missing data, try to fill it in with environment variables.
fn parse_args() -> SatCoverResult<ShowCoverOptionsChecked> {
    let ShowCoverOptionsInit {
        database_file,
        kml_file,
        run,
        verbose,
    } = ShowCoverOptionsInit::parse();

    let kml_file = match kml_file {
        Some(v) => v,
        None => {
            let mut clone = database_file.clone();
            clone.set_extension("kml");
            clone
        }
    };

    let checked = ShowCoverOptionsChecked {
        database_file,
        kml_file,
        run,
        verbose,
    };

    if checked.verbose {
        println!("{}", checked);
    }

    Ok(checked)
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> SatCoverResult<()> {
    let opts = parse_args()?;

    //
    // Load the stored run and its cell results.
    //
    let db = CoverageDatabase::connect(&opts.database_file)?;

    let run = match opts.run {
        Some(id) => db.get_run(id)?,
        None => db
            .find_latest_run()?
            .ok_or("no stored runs in the database")?,
    };

    if opts.verbose {
        println!(
            "Run {} covers {}-{:02}: {} points, Landsat {:.6}, Sentinel-2 {:.6}",
            run.id,
            run.year,
            run.month,
            run.num_points,
            run.landsat_proportion,
            run.sentinel2_proportion
        );
    }

    let cells: Vec<CellRecord> = {
        let mut query = db.cell_query_handle()?;
        let cells = query
            .records_for(run.id)?
            .collect::<SatCoverResult<Vec<_>>>()?;
        cells
    };

    drop(db);

    if opts.verbose {
        println!("Retrieved {} cell results.", cells.len());
    }

    //
    // Output the KML
    //
    let window = DateWindow::for_month(run.month)?;
    let begin = Utc.from_utc_datetime(&window.start().and_time(NaiveTime::MIN));
    let end = Utc.from_utc_datetime(&window.end().and_time(NaiveTime::MIN));

    let mut kfile = KmlFile::new(&opts.kml_file)?;

    for family in SensorFamily::iter() {
        kfile.start_style(Some(style_id(family)))?;
        kfile.create_poly_style(Some(family_color(family)), true, true)?;
        kfile.finish_style()?;
    }

    let mut description = String::new();
    for family in SensorFamily::iter() {
        kfile.start_folder(Some(family.name()), None, false)?;
        kfile.timespan(begin, end)?;

        for rec in cells.iter().filter(|rec| rec.family == family && rec.observed) {
            description.clear();
            let _ = write!(
                &mut description,
                concat!(
                    "<h3>{} coverage</h3>",
                    "<p>Observed fraction of native pixels: {:.3}</p>",
                    "<p>Cell area: {:.1} km&sup2;</p>",
                ),
                family.name(),
                rec.fraction,
                rec.area_m2 / 1.0e6,
            );

            kfile.start_placemark(None, Some(&description), Some(style_url(family)))?;
            kfile.start_polygon(false, false, Some("clampToGround"))?;
            kfile.polygon_start_outer_ring()?;
            kfile.start_linear_ring()?;

            let bounds = rec.cell.bounds();
            kfile.linear_ring_add_vertex(bounds.ll.lat, bounds.ll.lon, 0.0)?;
            kfile.linear_ring_add_vertex(bounds.ll.lat, bounds.ur.lon, 0.0)?;
            kfile.linear_ring_add_vertex(bounds.ur.lat, bounds.ur.lon, 0.0)?;
            kfile.linear_ring_add_vertex(bounds.ur.lat, bounds.ll.lon, 0.0)?;
            // Close the ring back at the first vertex.
            kfile.linear_ring_add_vertex(bounds.ll.lat, bounds.ll.lon, 0.0)?;

            kfile.finish_linear_ring()?;
            kfile.polygon_finish_outer_ring()?;
            kfile.finish_polygon()?;
            kfile.finish_placemark()?;
        }

        kfile.finish_folder()?;
    }

    if opts.verbose {
        println!("Wrote {}", opts.kml_file.display());
    }

    Ok(())
}

fn style_id(family: SensorFamily) -> &'static str {
    match family {
        SensorFamily::Landsat => "landsat",
        SensorFamily::Sentinel2 => "sentinel2",
    }
}

fn style_url(family: SensorFamily) -> &'static str {
    match family {
        SensorFamily::Landsat => "#landsat",
        SensorFamily::Sentinel2 => "#sentinel2",
    }
}

/// KML colors are aabbggrr.
fn family_color(family: SensorFamily) -> &'static str {
    match family {
        SensorFamily::Landsat => "7f0050ff",
        SensorFamily::Sentinel2 => "7fff9000",
    }
}
