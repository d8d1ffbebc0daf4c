/*!
 * The coverage computation.
 *
 * Observation counts are accumulated per sensor family on the family's native grid, thresholded
 * to an "ever observed" mask, max-pooled onto the coarse analysis grid, and converted to areas.
 * The headline ratio for a family is the summed area of the observed analysis cells containing
 * the sample points over the nominal 20 km x 20 km surrounding area of every point.
 */

use crate::{
    catalog::SceneCatalog,
    geo::{scale_to_degrees, BoundingBox, Coord},
    points::SampleGrid,
    satellite::SensorFamily,
    scene::Scene,
    SatCoverResult,
};
use rustc_hash::FxHashSet;
use strum::IntoEnumIterator;

/// Nominal surrounding area per sample point, 20 km x 20 km.
pub const NOMINAL_POINT_AREA_M2: f64 = 400_000_000.0;

/// The coarse analysis scale in meters.
pub const ANALYSIS_SCALE_M: f64 = 20_000.0;

/// One cell of the coarse analysis grid.
///
/// The grid is equirectangular, anchored at (0°, 0°), with square cells of the analysis scale
/// converted to degrees at the equator. Cells are identified by column and row index, negative
/// west of the prime meridian and south of the equator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnalysisCell {
    x: i64,
    y: i64,
}

impl AnalysisCell {
    /// The cell containing a coordinate. Cells own their south and west edges.
    pub fn containing(coord: Coord) -> Self {
        let size = scale_to_degrees(ANALYSIS_SCALE_M);

        AnalysisCell {
            x: (coord.lon / size).floor() as i64,
            y: (coord.lat / size).floor() as i64,
        }
    }

    /// A cell from its stored grid indexes.
    pub fn from_indexes(x: i64, y: i64) -> Self {
        AnalysisCell { x, y }
    }

    /// Column index in the analysis grid.
    pub fn x(&self) -> i64 {
        self.x
    }

    /// Row index in the analysis grid.
    pub fn y(&self) -> i64 {
        self.y
    }

    /// The cell footprint.
    pub fn bounds(&self) -> BoundingBox {
        let size = scale_to_degrees(ANALYSIS_SCALE_M);

        BoundingBox {
            ll: Coord {
                lat: self.y as f64 * size,
                lon: self.x as f64 * size,
            },
            ur: Coord {
                lat: (self.y + 1) as f64 * size,
                lon: (self.x + 1) as f64 * size,
            },
        }
    }

    /// The true spherical area of the cell in square meters.
    ///
    /// Near the equator this is a little under the nominal 4.0e8, and it shrinks with the
    /// cosine of the latitude, so summed ratios top out just below 1.0.
    pub fn area_m2(&self) -> f64 {
        self.bounds().area_m2()
    }
}

/// The distinct analysis cells containing a grid's sample points, in first seen order.
///
/// Neighboring points often share a cell. The summed area counts each cell once no matter how
/// many points fall in it, while the ratio denominator still counts every point.
pub fn cells_for_grid(grid: &SampleGrid) -> Vec<AnalysisCell> {
    let mut cells: Vec<AnalysisCell> = vec![];
    let mut seen: FxHashSet<AnalysisCell> = FxHashSet::default();

    for point in grid.iter() {
        let cell = AnalysisCell::containing(point.coord);
        if seen.insert(cell) {
            cells.push(cell);
        }
    }

    cells
}

/**
 * Per-pixel observation counts on a sensor family's native grid, clipped to one analysis cell.
 *
 * The native grid shares the analysis grid's anchor at (0°, 0°). A native pixel belongs to the
 * analysis cell that contains its center.
 */
pub struct ObservationGrid {
    family: SensorFamily,
    /// First native column whose center lies in the cell.
    col0: i64,
    /// First native row whose center lies in the cell, counted northward from the equator.
    row0: i64,
    width: usize,
    height: usize,
    /// Observation counts in row-major order, row 0 southernmost.
    counts: Vec<u16>,
}

impl ObservationGrid {
    /// An empty count grid covering one analysis cell.
    pub fn new(family: SensorFamily, cell: AnalysisCell) -> Self {
        let native = scale_to_degrees(family.native_scale_m());
        let bounds = cell.bounds();

        let col0 = first_center_index(bounds.ll.lon, native);
        let col1 = first_center_index(bounds.ur.lon, native);
        let row0 = first_center_index(bounds.ll.lat, native);
        let row1 = first_center_index(bounds.ur.lat, native);

        let width = (col1 - col0).max(0) as usize;
        let height = (row1 - row0).max(0) as usize;

        ObservationGrid {
            family,
            col0,
            row0,
            width,
            height,
            counts: vec![0; width * height],
        }
    }

    /// Number of native pixels in the cell.
    pub fn num_pixels(&self) -> usize {
        self.counts.len()
    }

    /// Add a granule's observation mask into the counts.
    ///
    /// Only native pixels whose centers fall inside both the cell and the granule footprint are
    /// touched. Counts from different granules, and different platforms of the same family, add
    /// into the same grid. Counts saturate rather than wrap.
    pub fn accumulate(&mut self, scene: &Scene) {
        let native = scale_to_degrees(self.family.native_scale_m());
        let footprint = scene.bounding_box();

        let col_lo = first_center_index(footprint.ll.lon, native).max(self.col0);
        let col_hi =
            first_center_index(footprint.ur.lon, native).min(self.col0 + self.width as i64);
        let row_lo = first_center_index(footprint.ll.lat, native).max(self.row0);
        let row_hi =
            first_center_index(footprint.ur.lat, native).min(self.row0 + self.height as i64);

        for row in row_lo..row_hi {
            for col in col_lo..col_hi {
                let center = Coord {
                    lat: (row as f64 + 0.5) * native,
                    lon: (col as f64 + 0.5) * native,
                };

                if scene.observed_at(center) {
                    let idx = (row - self.row0) as usize * self.width + (col - self.col0) as usize;
                    self.counts[idx] = self.counts[idx].saturating_add(1);
                }
            }
        }
    }

    /// Threshold and pool: was any native pixel in the cell observed at least once?
    pub fn observed(&self) -> bool {
        self.counts.iter().any(|cnt| *cnt > 0)
    }

    /// The fraction of the cell's native pixels observed at least once.
    pub fn observed_fraction(&self) -> f64 {
        if self.counts.is_empty() {
            return 0.0;
        }

        let observed = self.counts.iter().filter(|cnt| **cnt > 0).count();

        observed as f64 / self.counts.len() as f64
    }
}

/// Smallest native index whose pixel center sits at or east/north of an edge.
fn first_center_index(edge_degrees: f64, native_degrees: f64) -> i64 {
    (edge_degrees / native_degrees - 0.5).ceil() as i64
}

/// The analysis result for one cell and one sensor family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellCoverage {
    pub cell: AnalysisCell,
    pub family: SensorFamily,
    /// Any native pixel in the cell observed inside the window.
    pub observed: bool,
    /// Fraction of the cell's native pixels observed at least once.
    pub fraction: f64,
    /// True spherical cell area in square meters.
    pub area_m2: f64,
}

/// Analyze one cell for every sensor family.
///
/// Each matching granule is decoded and folded into the family's count grid, then the grid is
/// pooled down to the observed flag and fraction.
pub fn analyze_cell(
    catalog: &SceneCatalog,
    cell: AnalysisCell,
) -> SatCoverResult<Vec<CellCoverage>> {
    let bounds = cell.bounds();
    let mut results: Vec<CellCoverage> = Vec::with_capacity(2);

    for family in SensorFamily::iter() {
        let mut grid = ObservationGrid::new(family, cell);

        for meta in catalog.scenes_for(family, bounds) {
            let scene = meta.load()?;
            grid.accumulate(&scene);
        }

        results.push(CellCoverage {
            cell,
            family,
            observed: grid.observed(),
            fraction: grid.observed_fraction(),
            area_m2: cell.area_m2(),
        });
    }

    Ok(results)
}

/**
 * Running totals for a whole analysis.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageSummary {
    num_points: usize,
    landsat_area_m2: f64,
    sentinel2_area_m2: f64,
}

impl CoverageSummary {
    /// A zeroed summary over a known number of sample points.
    pub fn new(num_points: usize) -> SatCoverResult<Self> {
        if num_points == 0 {
            return Err("no valid sample points, nothing to analyze".into());
        }

        Ok(CoverageSummary {
            num_points,
            landsat_area_m2: 0.0,
            sentinel2_area_m2: 0.0,
        })
    }

    /// Fold one cell result into the totals.
    pub fn add_cell(&mut self, cover: &CellCoverage) {
        if cover.observed {
            match cover.family {
                SensorFamily::Landsat => self.landsat_area_m2 += cover.area_m2,
                SensorFamily::Sentinel2 => self.sentinel2_area_m2 += cover.area_m2,
            }
        }
    }

    /// The number of sample points, the ratio denominator.
    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Summed area of the observed analysis cells for a family, in square meters.
    pub fn observed_area_m2(&self, family: SensorFamily) -> f64 {
        match family {
            SensorFamily::Landsat => self.landsat_area_m2,
            SensorFamily::Sentinel2 => self.sentinel2_area_m2,
        }
    }

    /// The headline number: observed area over the nominal surrounding area of all points.
    pub fn proportion(&self, family: SensorFamily) -> f64 {
        self.observed_area_m2(family) / NOMINAL_POINT_AREA_M2 / self.num_points as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::testing::granule_scene;

    #[test]
    fn cells_use_floor_semantics() {
        let size = scale_to_degrees(ANALYSIS_SCALE_M);

        let origin = AnalysisCell::containing(Coord { lat: 0.0, lon: 0.0 });
        assert_eq!(origin, AnalysisCell::from_indexes(0, 0));

        let inside = AnalysisCell::containing(Coord {
            lat: 0.5 * size,
            lon: 0.5 * size,
        });
        assert_eq!(inside, origin);

        let west_of_meridian = AnalysisCell::containing(Coord {
            lat: 0.5 * size,
            lon: -0.5 * size,
        });
        assert_eq!(west_of_meridian, AnalysisCell::from_indexes(-1, 0));

        let southern = AnalysisCell::containing(Coord {
            lat: -35.0,
            lon: 18.5,
        });
        assert!(southern.y() < 0);
        assert!(southern.bounds().contains(Coord {
            lat: -35.0,
            lon: 18.5
        }));
    }

    #[test]
    fn cell_bounds_are_anchored_at_the_origin() {
        let size = scale_to_degrees(ANALYSIS_SCALE_M);
        let bounds = AnalysisCell::from_indexes(0, 0).bounds();

        assert!(bounds.ll.is_close(Coord { lat: 0.0, lon: 0.0 }, 1.0e-12));
        assert!(bounds.ur.is_close(
            Coord {
                lat: size,
                lon: size
            },
            1.0e-12
        ));
    }

    #[test]
    fn points_sharing_a_cell_deduplicate() {
        let size = scale_to_degrees(ANALYSIS_SCALE_M);
        let text = format!(
            concat!(
                r#"{{"type":"FeatureCollection","features":["#,
                r#"{{"type":"Feature","properties":{{"id":1}},"geometry":{{"type":"Point","coordinates":[{a},{a}]}}}},"#,
                r#"{{"type":"Feature","properties":{{"id":2}},"geometry":{{"type":"Point","coordinates":[{b},{b}]}}}},"#,
                r#"{{"type":"Feature","properties":{{"id":3}},"geometry":{{"type":"Point","coordinates":[{c},{c}]}}}}"#,
                r#"]}}"#
            ),
            a = 0.25 * size,
            b = 0.75 * size,
            c = 1.5 * size,
        );
        let grid = SampleGrid::from_geojson(&text).unwrap();
        assert_eq!(grid.len(), 3);

        let cells = cells_for_grid(&grid);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0], AnalysisCell::from_indexes(0, 0));
        assert_eq!(cells[1], AnalysisCell::from_indexes(1, 1));
    }

    #[test]
    fn native_grids_tile_the_analysis_grid() {
        // 20 km of 10 m pixels is exactly 2000 on a side.
        let s2 = ObservationGrid::new(SensorFamily::Sentinel2, AnalysisCell::from_indexes(0, 0));
        assert_eq!((s2.width, s2.height), (2000, 2000));

        // 20 km is 666 2/3 Landsat pixels, so cell widths alternate 667, 666, 667.
        let widths: Vec<usize> = (0..3)
            .map(|x| {
                ObservationGrid::new(SensorFamily::Landsat, AnalysisCell::from_indexes(x, 0)).width
            })
            .collect();
        assert_eq!(widths, vec![667, 666, 667]);
        assert_eq!(widths.iter().sum::<usize>(), 2000);
    }

    #[test]
    fn a_granule_covering_half_the_cell() {
        let cell = AnalysisCell::from_indexes(0, 0);
        let bounds = cell.bounds();
        let size = bounds.ur.lon - bounds.ll.lon;

        // Real 30 m pixels are overkill here, a coarse granule of fat pixels covering the west
        // half of the cell samples the same way.
        let samples = vec![1u16; 200];
        let scene = granule_scene(0.0, size, size / 20.0, 10, 20, &samples);

        let mut grid = ObservationGrid::new(SensorFamily::Landsat, cell);
        grid.accumulate(&scene);

        assert!(grid.observed());
        let frac = grid.observed_fraction();
        assert!(frac > 0.45 && frac < 0.55, "fraction was {}", frac);
    }

    #[test]
    fn nodata_never_counts_as_observed() {
        let cell = AnalysisCell::from_indexes(0, 0);
        let bounds = cell.bounds();
        let size = bounds.ur.lon - bounds.ll.lon;

        let samples = vec![0u16; 100];
        let scene = granule_scene(0.0, size, size / 10.0, 10, 10, &samples);

        let mut grid = ObservationGrid::new(SensorFamily::Landsat, cell);
        grid.accumulate(&scene);

        assert!(!grid.observed());
        assert_eq!(grid.observed_fraction(), 0.0);
    }

    #[test]
    fn counts_from_two_platforms_add_into_one_grid() {
        let cell = AnalysisCell::from_indexes(0, 0);
        let bounds = cell.bounds();
        let size = bounds.ur.lon - bounds.ll.lon;

        // Each granule spans the whole cell but only saw half of it: one the west half, the
        // other the east half. Together they cover the cell.
        let mut west_half = vec![0u16; 100];
        let mut east_half = vec![0u16; 100];
        for row in 0..10 {
            for col in 0..10 {
                if col < 5 {
                    west_half[row * 10 + col] = 1;
                } else {
                    east_half[row * 10 + col] = 1;
                }
            }
        }

        let first = granule_scene(0.0, size, size / 10.0, 10, 10, &west_half);
        let second = granule_scene(0.0, size, size / 10.0, 10, 10, &east_half);

        let mut grid = ObservationGrid::new(SensorFamily::Landsat, cell);
        grid.accumulate(&first);
        assert!((grid.observed_fraction() - 0.5).abs() < 0.01);

        grid.accumulate(&second);
        assert!(grid.observed());
        assert!((grid.observed_fraction() - 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn proportions_divide_by_every_point() {
        let cell_a = AnalysisCell::from_indexes(0, 0);
        let cell_b = AnalysisCell::from_indexes(1, 0);

        // Pretend areas exactly match the nominal area so the arithmetic is exact.
        let covered = |cell| CellCoverage {
            cell,
            family: SensorFamily::Landsat,
            observed: true,
            fraction: 1.0,
            area_m2: NOMINAL_POINT_AREA_M2,
        };

        let mut summary = CoverageSummary::new(2).unwrap();
        summary.add_cell(&covered(cell_a));
        summary.add_cell(&covered(cell_b));

        assert_eq!(summary.proportion(SensorFamily::Landsat), 1.0);
        assert_eq!(summary.proportion(SensorFamily::Sentinel2), 0.0);

        // Three points over the same two observed cells: the summed area is unchanged and the
        // per point ratio drops.
        let mut summary = CoverageSummary::new(3).unwrap();
        summary.add_cell(&covered(cell_a));
        summary.add_cell(&covered(cell_b));

        assert!((summary.proportion(SensorFamily::Landsat) - 2.0 / 3.0).abs() < 1.0e-12);
    }

    #[test]
    fn unobserved_cells_add_nothing() {
        let mut summary = CoverageSummary::new(1).unwrap();
        summary.add_cell(&CellCoverage {
            cell: AnalysisCell::from_indexes(0, 0),
            family: SensorFamily::Sentinel2,
            observed: false,
            fraction: 0.0,
            area_m2: NOMINAL_POINT_AREA_M2,
        });

        assert_eq!(summary.proportion(SensorFamily::Sentinel2), 0.0);
        assert_eq!(summary.observed_area_m2(SensorFamily::Sentinel2), 0.0);
    }

    #[test]
    fn a_summary_needs_sample_points() {
        assert!(CoverageSummary::new(0).is_err());
    }
}
