/*!
 * The sample point grid.
 *
 * The analysis runs over a fixed collection of geographic sample sites distributed as a GeoJSON
 * FeatureCollection of points. Each feature carries a numeric `id` property; sites with a whole
 * number id greater than zero are the valid ones, everything else in the file is a placeholder
 * and gets dropped on load.
 */

use crate::{
    error::CoverageError,
    geo::{BoundingBox, Coord},
    SatCoverResult,
};
use geojson::{Feature, GeoJson, Value};
use std::{fs, path::Path};

/** One valid sample site from the grid. */
#[derive(Debug, Clone, Copy)]
pub struct SamplePoint {
    /// The grid id, always greater than zero.
    pub id: i64,
    /// The site location.
    pub coord: Coord,
}

/** The collection of sample sites the coverage proportions are reported over. */
#[derive(Debug, Clone)]
pub struct SampleGrid {
    points: Vec<SamplePoint>,
}

impl SampleGrid {
    /// Load a sample grid from a GeoJSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> SatCoverResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_geojson(&text)
    }

    /// Parse a sample grid from GeoJSON text.
    ///
    /// Features without point geometry or without a whole number `id` property are skipped with
    /// a log message, and ids less than or equal to zero are dropped as invalid sites. Only a
    /// file that is not a FeatureCollection at all is an error.
    pub fn from_geojson(text: &str) -> SatCoverResult<Self> {
        let geojson: GeoJson = text.parse()?;

        let collection = match geojson {
            GeoJson::FeatureCollection(fc) => fc,
            _ => {
                return Err(CoverageError {
                    msg: "sample grid is not a GeoJSON FeatureCollection",
                }
                .into())
            }
        };

        let mut points = Vec::with_capacity(collection.features.len());

        for feature in collection.features {
            let id = match feature_id(&feature) {
                Some(id) => id,
                None => {
                    log::debug!("skipping grid feature without a whole number id property");
                    continue;
                }
            };

            if id <= 0 {
                log::debug!("skipping invalid sample site with id {}", id);
                continue;
            }

            let coord = match feature.geometry.as_ref().map(|g| &g.value) {
                // GeoJSON positions are (longitude, latitude).
                Some(Value::Point(position)) if position.len() >= 2 => Coord {
                    lat: position[1],
                    lon: position[0],
                },
                _ => {
                    log::debug!("skipping grid feature {} without point geometry", id);
                    continue;
                }
            };

            points.push(SamplePoint { id, coord });
        }

        Ok(SampleGrid { points })
    }

    /// The number of valid sample sites, the N the per-point proportions divide by.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SamplePoint> {
        self.points.iter()
    }

    /// The box containing every valid sample site, or None for an empty grid.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.points.first()?;

        let mut bbox = BoundingBox {
            ll: first.coord,
            ur: first.coord,
        };

        for point in &self.points[1..] {
            bbox.ll.lat = bbox.ll.lat.min(point.coord.lat);
            bbox.ll.lon = bbox.ll.lon.min(point.coord.lon);
            bbox.ur.lat = bbox.ur.lat.max(point.coord.lat);
            bbox.ur.lon = bbox.ur.lon.max(point.coord.lon);
        }

        Some(bbox)
    }
}

/// Some grid exports type the id attribute as a double. Accept whole valued floats too.
fn feature_id(feature: &Feature) -> Option<i64> {
    let id = feature.property("id")?;

    id.as_i64()
        .or_else(|| id.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "id": 1 },
                "geometry": { "type": "Point", "coordinates": [-120.0, 45.0] }
            },
            {
                "type": "Feature",
                "properties": { "id": 2 },
                "geometry": { "type": "Point", "coordinates": [17.5, -33.25] }
            },
            {
                "type": "Feature",
                "properties": { "id": 0 },
                "geometry": { "type": "Point", "coordinates": [0.0, 0.0] }
            },
            {
                "type": "Feature",
                "properties": { "id": -4 },
                "geometry": { "type": "Point", "coordinates": [1.0, 1.0] }
            },
            {
                "type": "Feature",
                "properties": { "name": "no id here" },
                "geometry": { "type": "Point", "coordinates": [2.0, 2.0] }
            },
            {
                "type": "Feature",
                "properties": { "id": 9 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                }
            }
        ]
    }"#;

    #[test]
    fn loads_only_valid_sites() {
        let grid = SampleGrid::from_geojson(GRID).unwrap();

        assert_eq!(grid.len(), 2);

        let ids: Vec<i64> = grid.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn positions_are_lon_lat() {
        let grid = SampleGrid::from_geojson(GRID).unwrap();
        let first = grid.iter().next().unwrap();

        assert_eq!(first.coord.lat, 45.0);
        assert_eq!(first.coord.lon, -120.0);
    }

    #[test]
    fn bounding_box_covers_all_sites() {
        let grid = SampleGrid::from_geojson(GRID).unwrap();
        let bbox = grid.bounding_box().unwrap();

        assert_eq!(bbox.ll.lat, -33.25);
        assert_eq!(bbox.ll.lon, -120.0);
        assert_eq!(bbox.ur.lat, 45.0);
        assert_eq!(bbox.ur.lon, 17.5);
    }

    #[test]
    fn double_typed_ids_are_accepted_when_whole() {
        let grid_text = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "id": 3.0 },
                    "geometry": { "type": "Point", "coordinates": [5.0, 10.0] }
                },
                {
                    "type": "Feature",
                    "properties": { "id": 2.5 },
                    "geometry": { "type": "Point", "coordinates": [6.0, 11.0] }
                },
                {
                    "type": "Feature",
                    "properties": { "id": -2.0 },
                    "geometry": { "type": "Point", "coordinates": [7.0, 12.0] }
                }
            ]
        }"#;

        let grid = SampleGrid::from_geojson(grid_text).unwrap();

        let ids: Vec<i64> = grid.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn rejects_non_collections() {
        let point_only = r#"{ "type": "Point", "coordinates": [0.0, 0.0] }"#;
        assert!(SampleGrid::from_geojson(point_only).is_err());
    }

    #[test]
    fn empty_grid_has_no_bounding_box() {
        let empty = r#"{ "type": "FeatureCollection", "features": [] }"#;
        let grid = SampleGrid::from_geojson(empty).unwrap();

        assert!(grid.is_empty());
        assert!(grid.bounding_box().is_none());
    }
}
