/*!
 * Geographic calculations.
 *
 * Everything in this crate works in plain geographic coordinates (latitude and longitude in
 * degrees), so the only real math needed here is the area of a lat-lon aligned quadrangle on
 * the sphere. That is implemented directly rather than pulling in a projection library.
 */

/// Meters in one degree of arc along the equator.
///
/// This is the factor used to translate a metric scale (10 m, 30 m, 20 km) into the size of a
/// geographic grid cell, so a "20,000 meter" analysis grid has cells 20,000 / 111,319.49 degrees
/// on a side no matter the latitude.
pub const EQUATOR_METERS_PER_DEGREE: f64 = 111_319.490793;

/// The authalic Earth radius in meters, used for true surface areas.
pub const EARTH_RADIUS_M: f64 = 6_371_007.18;

/** A location on the Earth's surface. */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Longitude in degrees, positive east.
    pub lon: f64,
}

impl Coord {
    /// Test if these coordinates are within eps degrees of each other on both axes.
    pub fn is_close(&self, other: Coord, eps: f64) -> bool {
        (self.lat - other.lat).abs() < eps && (self.lon - other.lon).abs() < eps
    }
}

/** A lat-lon aligned bounding box. */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// The lower left (southwest) corner.
    pub ll: Coord,
    /// The upper right (northeast) corner.
    pub ur: Coord,
}

impl BoundingBox {
    /// Is the coordinate inside this box?
    ///
    /// The southern and western edges are inside, the northern and eastern edges are out, so
    /// adjacent boxes partition the plane without double counting.
    pub fn contains(&self, coord: Coord) -> bool {
        coord.lat >= self.ll.lat
            && coord.lat < self.ur.lat
            && coord.lon >= self.ll.lon
            && coord.lon < self.ur.lon
    }

    /// Do these boxes overlap at all?
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.ll.lat < other.ur.lat
            && other.ll.lat < self.ur.lat
            && self.ll.lon < other.ur.lon
            && other.ll.lon < self.ur.lon
    }

    /// Grow the box by the given number of degrees on every side.
    pub fn padded(&self, degrees: f64) -> BoundingBox {
        BoundingBox {
            ll: Coord {
                lat: self.ll.lat - degrees,
                lon: self.ll.lon - degrees,
            },
            ur: Coord {
                lat: self.ur.lat + degrees,
                lon: self.ur.lon + degrees,
            },
        }
    }

    /**
     * The true area of this lat-lon quadrangle in square meters.
     *
     * Computed on the authalic sphere: R² · Δλ · (sin φ₂ - sin φ₁). For a nominal 20 km cell
     * this comes out a little under the 20 km × 20 km figure, shrinking with the cosine of
     * latitude, which is exactly the behavior of the per-pixel areas the archive reductions
     * report.
     *
     * #Returns
     * The area in square meters, zero or negative if the box is degenerate.
     */
    pub fn area_m2(&self) -> f64 {
        let dlon = (self.ur.lon - self.ll.lon).to_radians();
        let sin_span = self.ur.lat.to_radians().sin() - self.ll.lat.to_radians().sin();

        EARTH_RADIUS_M * EARTH_RADIUS_M * dlon * sin_span
    }
}

/// Convert a metric scale to the matching geographic cell size in degrees.
pub fn scale_to_degrees(scale_m: f64) -> f64 {
    scale_m / EQUATOR_METERS_PER_DEGREE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coords_close() {
        let left = Coord {
            lat: 45.5,
            lon: -120.0,
        };
        let right = Coord {
            lat: 45.5000002,
            lon: -120.0000002,
        };

        assert!(left.is_close(left, 1.0e-6));
        assert!(right.is_close(right, 1.0e-6));
        assert!(left.is_close(right, 1.0e-6));

        assert!(!left.is_close(right, 1.0e-8));
    }

    #[test]
    fn bounding_box_contains() {
        let bbox = BoundingBox {
            ll: Coord {
                lat: 44.0,
                lon: -120.0,
            },
            ur: Coord {
                lat: 45.0,
                lon: -119.0,
            },
        };

        assert!(bbox.contains(Coord {
            lat: 44.5,
            lon: -119.5
        }));
        // Southwest edges are in, northeast edges are out.
        assert!(bbox.contains(Coord {
            lat: 44.0,
            lon: -120.0
        }));
        assert!(!bbox.contains(Coord {
            lat: 45.0,
            lon: -119.5
        }));
        assert!(!bbox.contains(Coord {
            lat: 44.5,
            lon: -119.0
        }));
        assert!(!bbox.contains(Coord {
            lat: 43.5,
            lon: -119.5
        }));
    }

    #[test]
    fn bounding_box_intersects() {
        let a = BoundingBox {
            ll: Coord { lat: 0.0, lon: 0.0 },
            ur: Coord { lat: 2.0, lon: 2.0 },
        };
        let b = BoundingBox {
            ll: Coord { lat: 1.0, lon: 1.0 },
            ur: Coord { lat: 3.0, lon: 3.0 },
        };
        let c = BoundingBox {
            ll: Coord { lat: 2.0, lon: 2.0 },
            ur: Coord { lat: 3.0, lon: 3.0 },
        };

        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        // Only touching along an edge does not count as overlap.
        assert!(!a.intersects(&c));
    }

    #[test]
    fn area_of_nominal_cell_at_equator() {
        let d = scale_to_degrees(20_000.0);
        let cell = BoundingBox {
            ll: Coord { lat: 0.0, lon: 0.0 },
            ur: Coord { lat: d, lon: d },
        };

        // True spherical area of a "20 km" geographic cell at the equator is a bit under the
        // 4.0e8 m² nominal because a degree of latitude on the authalic sphere is shorter than
        // the equatorial degree used to size the cell.
        let area = cell.area_m2();
        assert!(area > 3.9e8 && area < 4.0e8, "area = {}", area);
    }

    #[test]
    fn area_shrinks_with_latitude() {
        let d = scale_to_degrees(20_000.0);
        let equator = BoundingBox {
            ll: Coord { lat: 0.0, lon: 0.0 },
            ur: Coord { lat: d, lon: d },
        };
        let high = BoundingBox {
            ll: Coord {
                lat: 60.0,
                lon: 0.0,
            },
            ur: Coord {
                lat: 60.0 + d,
                lon: d,
            },
        };

        let ratio = high.area_m2() / equator.area_m2();
        // cos(60°) = 0.5
        assert!((ratio - 0.5).abs() < 0.01, "ratio = {}", ratio);
    }
}
