/*!
 * An index of the granules on hand for one analysis.
 *
 * The catalog walks an archive directory tree once, keeps the granules whose acquisition date
 * falls in the analysis window and whose footprint touches the sample region, and hands out
 * per-family views of the survivors. Rasters are not decoded at this stage, only file headers
 * are read.
 */

use crate::{
    geo::BoundingBox,
    satellite::{Platform, SensorFamily},
    scene::{self, Scene},
    SatCoverResult,
};
use chrono::NaiveDate;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// All runs analyze a day in this fixed year.
pub const ANALYSIS_YEAR: i32 = 2020;

/// All runs analyze the 15th of the month.
pub const ANALYSIS_DAY: u32 = 15;

/// The day of acquisitions to analyze. Start inclusive, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// The analysis window for a month: one day starting on the 15th.
    pub fn for_month(month: u32) -> SatCoverResult<Self> {
        let start = NaiveDate::from_ymd_opt(ANALYSIS_YEAR, month, ANALYSIS_DAY)
            .ok_or("month must be in the range 1 through 12")?;
        let end = start.succ_opt().ok_or("analysis day has no successor")?;

        Ok(DateWindow { start, end })
    }

    /// First day inside the window.
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// First day past the window.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Does an acquisition date fall inside the window?
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// A granule admitted to the analysis, not yet decoded.
#[derive(Debug, Clone)]
pub struct SceneMeta {
    /// Where the granule lives on disk.
    pub path: PathBuf,
    /// The platform that acquired it.
    pub platform: Platform,
    /// The acquisition date from the product file name.
    pub acquired: NaiveDate,
    /// The granule footprint from the file header.
    pub bounds: BoundingBox,
}

impl SceneMeta {
    /// Decode the granule raster.
    pub fn load(&self) -> SatCoverResult<Scene> {
        Scene::open(&self.path)
    }
}

/**
 * The granules that survived the archive scan.
 */
#[derive(Debug, Clone, Default)]
pub struct SceneCatalog {
    scenes: Vec<SceneMeta>,
}

impl SceneCatalog {
    /// Walk an archive and index every granule inside the window that touches the region.
    ///
    /// Files with unrecognized names or unreadable headers are logged and skipped, they never
    /// fail the scan.
    pub fn build<P: AsRef<Path>>(
        archive_root: P,
        window: DateWindow,
        region: BoundingBox,
    ) -> SatCoverResult<Self> {
        let mut scenes: Vec<SceneMeta> = vec![];

        for path in WalkDir::new(archive_root.as_ref())
            .into_iter()
            .filter_map(|res| res.ok())
            // Ignore directory entries.
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            // Only consider granule files.
            .filter(|path| is_granule_extension(path))
        {
            let fname: String = path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_default();

            let (platform, acquired) = match scene::parse_granule_file_name(&fname) {
                Some(parsed) => parsed,
                None => {
                    debug!("skipping {}, not a recognized granule name", fname);
                    continue;
                }
            };

            if !platform.family().file_name_has_band(&fname) {
                debug!("skipping {}, not a red band granule", fname);
                continue;
            }

            if !window.contains(acquired) {
                continue;
            }

            if acquired < platform.operational().date() {
                warn!(
                    "granule {} predates the operational start of {}",
                    fname,
                    platform.name()
                );
            }

            let bounds = match Scene::peek_bounds(&path) {
                Ok(bounds) => bounds,
                Err(err) => {
                    warn!("skipping {}, unreadable header: {}", fname, err);
                    continue;
                }
            };

            if !bounds.intersects(&region) {
                continue;
            }

            scenes.push(SceneMeta {
                path,
                platform,
                acquired,
                bounds,
            });
        }

        debug!("indexed {} granules", scenes.len());

        Ok(SceneCatalog { scenes })
    }

    /// Number of indexed granules.
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// All indexed granules.
    pub fn iter(&self) -> impl Iterator<Item = &SceneMeta> {
        self.scenes.iter()
    }

    /// The indexed granules of one sensor family whose footprint touches a bounding box.
    pub fn scenes_for(
        &self,
        family: SensorFamily,
        bounds: BoundingBox,
    ) -> impl Iterator<Item = &SceneMeta> {
        self.scenes
            .iter()
            .filter(move |meta| meta.platform.family() == family && meta.bounds.intersects(&bounds))
    }
}

fn is_granule_extension(path: &Path) -> bool {
    match path.extension() {
        Some(ext) => {
            ext.eq_ignore_ascii_case("tif")
                || ext.eq_ignore_ascii_case("tiff")
                || ext.eq_ignore_ascii_case("zip")
        }
        None => false,
    }
}
