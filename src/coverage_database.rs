/*!
 * Storage for analysis runs.
 *
 * Each run gets a row in the runs table with its headline ratios, and every analysis cell that
 * went into the run gets a row in the cells table so coverage maps can be drawn later without
 * redoing the raster work.
 */

use crate::{
    catalog::ANALYSIS_YEAR,
    coverage::{AnalysisCell, CellCoverage, CoverageSummary},
    satellite::SensorFamily,
    SatCoverResult,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, ToSql};
use std::path::Path;

/// A connection to the database where analysis runs are stored.
pub struct CoverageDatabase {
    conn: Connection,
}

impl CoverageDatabase {
    /// Initialize a database.
    ///
    /// Initialize a database to make sure it exists and is set up properly. This should be run
    /// in the main thread before any other threads open a connection to the database to ensure
    /// consistency.
    pub fn initialize<P: AsRef<Path>>(path: P) -> SatCoverResult<()> {
        let path = path.as_ref();

        let _conn = Self::open_database_to_write(path)?;
        Ok(())
    }

    /// Open a connection to the database for storing and querying runs.
    pub fn connect<P: AsRef<Path>>(path: P) -> SatCoverResult<Self> {
        let path = path.as_ref();

        let conn = Self::open_database_to_write(path)?;
        Ok(CoverageDatabase { conn })
    }

    fn open_database_to_write(path: &Path) -> SatCoverResult<Connection> {
        let conn = rusqlite::Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        const QUERY: &str = include_str!("coverage_database/create_db.sql");
        conn.execute_batch(QUERY)?;

        Ok(conn)
    }

    /// Record a finished run and all of its cell results. Returns the new run id.
    pub fn add_run(
        &self,
        month: u32,
        summary: &CoverageSummary,
        cells: &[CellCoverage],
    ) -> SatCoverResult<i64> {
        const ADD_RUN: &str = include_str!("coverage_database/add_run.sql");

        self.conn.execute(
            ADD_RUN,
            [
                &(ANALYSIS_YEAR as i64) as &dyn ToSql,
                &(month as i64),
                &(summary.num_points() as i64),
                &summary.proportion(SensorFamily::Landsat),
                &summary.proportion(SensorFamily::Sentinel2),
                &Utc::now(),
            ],
        )?;
        let run_id = self.conn.last_insert_rowid();

        {
            let mut add = self.add_cells_handle()?;
            for cover in cells {
                add.add_cell(run_id, cover)?;
            }
        }

        Ok(run_id)
    }

    /// Prepare to add cell rows to the database.
    pub fn add_cells_handle(&self) -> SatCoverResult<AddCellsTransaction> {
        const ADD_CELL: &str = include_str!("coverage_database/add_cell.sql");
        let stmt = self.conn.prepare(ADD_CELL)?;

        self.conn.execute("BEGIN", [])?;
        Ok(AddCellsTransaction(stmt, &self.conn))
    }

    /// The most recently stored run, if there is one.
    pub fn find_latest_run(&self) -> SatCoverResult<Option<RunRecord>> {
        const QUERY: &str = include_str!("coverage_database/find_latest_run.sql");

        let record = self
            .conn
            .query_row(QUERY, [], row_to_run_record)
            .optional()?;

        Ok(record)
    }

    /// Look up a stored run by id.
    pub fn get_run(&self, run_id: i64) -> SatCoverResult<RunRecord> {
        const QUERY: &str = include_str!("coverage_database/get_run.sql");

        let record = self.conn.query_row(QUERY, [run_id], row_to_run_record)?;

        Ok(record)
    }

    /// Prepare to query the cell results of stored runs.
    pub fn cell_query_handle(&self) -> SatCoverResult<CellQuery> {
        const QUERY: &str = include_str!("coverage_database/get_cells.sql");
        let stmt = self.conn.prepare(QUERY)?;

        Ok(CellQuery(stmt))
    }
}

/// One stored analysis run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunRecord {
    pub id: i64,
    pub year: i32,
    pub month: u32,
    pub num_points: i64,
    pub landsat_proportion: f64,
    pub sentinel2_proportion: f64,
    pub created: DateTime<Utc>,
}

/// One stored cell result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellRecord {
    pub run_id: i64,
    pub family: SensorFamily,
    pub cell: AnalysisCell,
    pub observed: bool,
    pub fraction: f64,
    pub area_m2: f64,
}

pub struct AddCellsTransaction<'a>(rusqlite::Statement<'a>, &'a Connection);

impl<'a> AddCellsTransaction<'a> {
    /// Add a single cell result for a run.
    pub fn add_cell(&mut self, run_id: i64, cover: &CellCoverage) -> SatCoverResult<()> {
        let _ = self.0.execute([
            &run_id as &dyn ToSql,
            &cover.family.name(),
            &cover.cell.x(),
            &cover.cell.y(),
            &cover.observed,
            &cover.fraction,
            &cover.area_m2,
        ])?;

        Ok(())
    }
}

impl<'a> Drop for AddCellsTransaction<'a> {
    fn drop(&mut self) {
        self.1.execute("COMMIT", []).unwrap();
    }
}

pub struct CellQuery<'a>(rusqlite::Statement<'a>);

impl<'a> CellQuery<'a> {
    /// Get an iterator over the stored cell results of a run.
    pub fn records_for(
        &mut self,
        run_id: i64,
    ) -> SatCoverResult<impl Iterator<Item = SatCoverResult<CellRecord>> + '_> {
        Ok(self.0.query_and_then([run_id], row_to_cell_record)?)
    }
}

fn row_to_run_record(row: &rusqlite::Row) -> Result<RunRecord, rusqlite::Error> {
    Ok(RunRecord {
        id: row.get(0)?,
        year: row.get(1)?,
        month: row.get(2)?,
        num_points: row.get(3)?,
        landsat_proportion: row.get(4)?,
        sentinel2_proportion: row.get(5)?,
        created: row.get(6)?,
    })
}

fn row_to_cell_record(row: &rusqlite::Row) -> SatCoverResult<CellRecord> {
    let run_id: i64 = row.get(0)?;
    let family: String = row.get(1)?;
    let family = family_from_name(&family)?;
    let cell_x: i64 = row.get(2)?;
    let cell_y: i64 = row.get(3)?;
    let observed: bool = row.get(4)?;
    let fraction: f64 = row.get(5)?;
    let area_m2: f64 = row.get(6)?;

    Ok(CellRecord {
        run_id,
        family,
        cell: AnalysisCell::from_indexes(cell_x, cell_y),
        observed,
        fraction,
        area_m2,
    })
}

fn family_from_name(name: &str) -> SatCoverResult<SensorFamily> {
    match name {
        "Landsat" => Ok(SensorFamily::Landsat),
        "Sentinel-2" => Ok(SensorFamily::Sentinel2),
        _ => Err(format!("unknown sensor family in database: {}", name).into()),
    }
}
