/*! Library for measuring how much of a sample grid the Landsat and Sentinel-2 archives imaged.
 *
 * Sample points come in as a GeoJSON collection, granules come out of a local archive of
 * analysis-ready red band clips, and the headline numbers are the per family proportions of the
 * points' nominal 20 km x 20 km surroundings that carry at least one valid observation on the
 * analysis day.
 */

pub use crate::{
    catalog::{DateWindow, SceneCatalog, SceneMeta, ANALYSIS_DAY, ANALYSIS_YEAR},
    coverage::{
        analyze_cell, cells_for_grid, AnalysisCell, CellCoverage, CoverageSummary,
        ObservationGrid, ANALYSIS_SCALE_M, NOMINAL_POINT_AREA_M2,
    },
    coverage_database::{AddCellsTransaction, CellQuery, CellRecord, CoverageDatabase, RunRecord},
    error::CoverageError,
    geo::{scale_to_degrees, BoundingBox, Coord},
    kml::KmlFile,
    points::{SampleGrid, SamplePoint},
    satellite::{Platform, SensorFamily},
    scene::{find_acquisition_date, parse_granule_file_name, Scene},
};

use std::error::Error;

/// A general purpose result type for the crate.
///
/// The error is Send + Sync so results can come back over a channel from a worker thread.
pub type SatCoverResult<T> = Result<T, Box<dyn Error + Send + Sync + 'static>>;

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod catalog;
mod coverage;
mod coverage_database;
mod error;
mod geo;
mod kml;
mod points;
mod satellite;
mod scene;
