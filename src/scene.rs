/*!
 * Access to a single granule raster.
 *
 * Granules are analysis-ready clips of a platform's red reflectance band: one sample per pixel,
 * north-up, in geographic (longitude/latitude) coordinates, georeferenced through the standard
 * GeoTIFF ModelPixelScale and ModelTiepoint tags. Granules may sit directly on disk as
 * `.tif`/`.tiff` files or wrapped in a `.zip` holding exactly one image.
 */

use crate::{
    geo::{BoundingBox, Coord},
    satellite::Platform,
    SatCoverResult,
};
use chrono::NaiveDate;
use std::{
    fs::File,
    io::{BufReader, Cursor, Read, Seek},
    path::Path,
};
use tiff::{
    decoder::{Decoder, DecodingResult, Limits},
    tags::Tag,
};

/**
 * A granule raster held in memory along with its georeferencing.
 */
#[derive(Debug, Clone)]
pub struct Scene {
    /// Image width in pixels
    width: usize,
    /// Image height in pixels
    height: usize,
    /// All the information needed for transforming between pixel indexes and coordinates.
    tran: GeoTransform,
    /// The single band of sample values.
    samples: Vec<f64>,
    /// Original file name the granule was loaded from.
    fname: String,
}

impl Scene {
    /// Open a granule file, dispatching on the file extension.
    pub fn open<P: AsRef<Path>>(path: P) -> SatCoverResult<Self> {
        let p: &Path = path.as_ref();
        let fname: String = p
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .ok_or("granule path has no file name")?;

        match p.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("zip") => Self::open_zip(p, fname),
            Some(ext) if ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff") => {
                let reader = BufReader::new(File::open(p)?);
                Self::from_reader(reader, fname)
            }
            _ => Err(std::io::Error::from(std::io::ErrorKind::Unsupported).into()),
        }
    }

    fn open_zip(p: &Path, fname: String) -> SatCoverResult<Self> {
        let file = File::open(p)?;
        let mut zip = zip::ZipArchive::new(file)?;

        if zip.len() != 1 {
            return Err(format!(
                "zipped granule {} must hold exactly one image, found {} entries",
                fname,
                zip.len()
            )
            .into());
        }

        let mut member = zip.by_index(0)?;
        let member_name = member.name().to_string();
        let mut buf: Vec<u8> = Vec::with_capacity(member.size() as usize + 10);
        let _size_read = member.read_to_end(&mut buf)?;

        Self::from_reader(Cursor::new(buf), member_name)
    }

    /// Decode a granule from any seekable reader.
    pub fn from_reader<R: Read + Seek>(reader: R, fname: String) -> SatCoverResult<Self> {
        let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());

        let (width, height) = decoder.dimensions()?;
        let (width, height) = (width as usize, height as usize);
        let tran = GeoTransform::from_decoder(&mut decoder, &fname)?;

        let samples: Vec<f64> = match decoder.read_image()? {
            DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
            DecodingResult::F64(v) => v,
            _ => {
                return Err(format!("unsupported sample format in granule {}", fname).into());
            }
        };

        if samples.len() != width * height {
            return Err(format!(
                "granule {} is not a single band image: {} samples for {}x{} pixels",
                fname,
                samples.len(),
                width,
                height
            )
            .into());
        }

        Ok(Scene {
            width,
            height,
            tran,
            samples,
            fname,
        })
    }

    /// Read only the georeferencing of a granule, without decoding the raster.
    ///
    /// The catalog uses this to find a granule's footprint; zipped granules still have to be
    /// decompressed to reach the image header.
    pub fn peek_bounds<P: AsRef<Path>>(path: P) -> SatCoverResult<BoundingBox> {
        let p: &Path = path.as_ref();
        let fname: String = p
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .ok_or("granule path has no file name")?;

        match p.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("zip") => {
                let file = File::open(p)?;
                let mut zip = zip::ZipArchive::new(file)?;

                if zip.len() != 1 {
                    return Err(format!(
                        "zipped granule {} must hold exactly one image, found {} entries",
                        fname,
                        zip.len()
                    )
                    .into());
                }

                let mut member = zip.by_index(0)?;
                let mut buf: Vec<u8> = Vec::with_capacity(member.size() as usize + 10);
                let _size_read = member.read_to_end(&mut buf)?;

                Self::bounds_from_reader(Cursor::new(buf), &fname)
            }
            Some(ext) if ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff") => {
                let reader = BufReader::new(File::open(p)?);
                Self::bounds_from_reader(reader, &fname)
            }
            _ => Err(std::io::Error::from(std::io::ErrorKind::Unsupported).into()),
        }
    }

    fn bounds_from_reader<R: Read + Seek>(reader: R, fname: &str) -> SatCoverResult<BoundingBox> {
        let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());

        let (width, height) = decoder.dimensions()?;
        let tran = GeoTransform::from_decoder(&mut decoder, fname)?;

        Ok(tran.bounds(width as usize, height as usize))
    }

    /// The file name this granule was loaded from.
    pub fn file_name(&self) -> &str {
        &self.fname
    }

    /// The footprint of the granule.
    pub fn bounding_box(&self) -> BoundingBox {
        self.tran.bounds(self.width, self.height)
    }

    /// Sample the granule at a coordinate, None outside the raster.
    pub fn sample(&self, coord: Coord) -> Option<f64> {
        let (col, row) = self.tran.coord_to_pixel(coord);

        if col < 0.0 || row < 0.0 {
            return None;
        }

        let (col, row) = (col as usize, row as usize);
        if col >= self.width || row >= self.height {
            return None;
        }

        Some(self.samples[row * self.width + col])
    }

    /// Was this location observed by the granule's acquisition?
    ///
    /// Both archives store 0 as the fill for unobserved pixels, so a strictly positive red-band
    /// value is the whole test.
    pub fn observed_at(&self, coord: Coord) -> bool {
        matches!(self.sample(coord), Some(v) if v > 0.0)
    }
}

/// Parse the platform and acquisition date out of a granule file name.
///
/// Returns None for files that do not follow either product naming scheme; the catalog skips
/// those rather than failing the run.
pub fn parse_granule_file_name(fname: &str) -> Option<(Platform, NaiveDate)> {
    let platform = Platform::string_contains_platform(fname)?;
    let acquired = find_acquisition_date(fname).ok()?;

    Some((platform, acquired))
}

/// Find the acquisition date in a granule file name.
///
/// Landsat product ids carry a bare `YYYYMMDD` acquisition token (the first all-digit token of
/// eight characters; the later processing date never comes first). Sentinel-2 product ids carry
/// a `YYYYMMDDTHHMMSS` sensing timestamp.
pub fn find_acquisition_date(fname: &str) -> SatCoverResult<NaiveDate> {
    for token in fname.split(['_', '.']) {
        if let Some(date) = parse_date_token(token) {
            return Ok(date);
        }
    }

    Err(format!("no acquisition date in granule file name: {}", fname).into())
}

fn parse_date_token(token: &str) -> Option<NaiveDate> {
    let digits = if token.len() == 8 {
        token
    } else if token.len() == 15 && token.as_bytes()[8] == b'T' {
        &token[..8]
    } else {
        return None;
    };

    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

/// Georeferencing for a north-up geographic raster.
///
/// Only the degenerate affine case is supported: no rotation terms, positive pixel sizes, rows
/// advancing southward. That is what the analysis-ready clips look like.
#[derive(Debug, Clone, Copy)]
struct GeoTransform {
    /// Longitude of the west edge of pixel column 0.
    west: f64,
    /// Latitude of the north edge of pixel row 0.
    north: f64,
    /// Pixel width in degrees of longitude.
    x_size: f64,
    /// Pixel height in degrees of latitude.
    y_size: f64,
}

impl GeoTransform {
    fn from_decoder<R: Read + Seek>(
        decoder: &mut Decoder<R>,
        fname: &str,
    ) -> SatCoverResult<Self> {
        let scale = decoder
            .get_tag_f64_vec(Tag::ModelPixelScaleTag)
            .map_err(|_| format!("granule {} has no ModelPixelScale tag", fname))?;
        let tie = decoder
            .get_tag_f64_vec(Tag::ModelTiepointTag)
            .map_err(|_| format!("granule {} has no ModelTiepoint tag", fname))?;

        if scale.len() < 2 || scale[0] <= 0.0 || scale[1] <= 0.0 {
            return Err(format!("granule {} has an unusable pixel scale", fname).into());
        }

        if tie.len() < 6 {
            return Err(format!("granule {} has an unusable tiepoint", fname).into());
        }

        let (x_size, y_size) = (scale[0], scale[1]);

        // The tiepoint maps raster position (i, j) to model position (x, y); shift it back to
        // the outer corner of pixel (0, 0).
        let west = tie[3] - tie[0] * x_size;
        let north = tie[4] + tie[1] * y_size;

        Ok(GeoTransform {
            west,
            north,
            x_size,
            y_size,
        })
    }

    /// Fractional pixel position of a coordinate, unbounded.
    fn coord_to_pixel(&self, coord: Coord) -> (f64, f64) {
        let col = (coord.lon - self.west) / self.x_size;
        let row = (self.north - coord.lat) / self.y_size;

        (col, row)
    }

    fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        BoundingBox {
            ll: Coord {
                lat: self.north - height as f64 * self.y_size,
                lon: self.west,
            },
            ur: Coord {
                lat: self.north,
                lon: self.west + width as f64 * self.x_size,
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for building granules in memory, shared by the unit tests of several modules.

    use super::*;
    use tiff::encoder::{colortype, TiffEncoder};

    /// Encode a little georeferenced granule: Gray16 samples, ModelPixelScale + ModelTiepoint
    /// tags, northwest corner at (`north`, `west`).
    pub(crate) fn granule_bytes(
        west: f64,
        north: f64,
        pixel_degrees: f64,
        width: u32,
        height: u32,
        samples: &[u16],
    ) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut bytes).unwrap();
            let mut image = encoder
                .new_image::<colortype::Gray16>(width, height)
                .unwrap();

            let scale = [pixel_degrees, pixel_degrees, 0.0];
            let tie = [0.0, 0.0, 0.0, west, north, 0.0];
            image
                .encoder()
                .write_tag(Tag::ModelPixelScaleTag, &scale[..])
                .unwrap();
            image
                .encoder()
                .write_tag(Tag::ModelTiepointTag, &tie[..])
                .unwrap();

            image.write_data(samples).unwrap();
        }

        bytes.into_inner()
    }

    /// Decode a granule built by [granule_bytes] straight into a [Scene].
    pub(crate) fn granule_scene(
        west: f64,
        north: f64,
        pixel_degrees: f64,
        width: u32,
        height: u32,
        samples: &[u16],
    ) -> Scene {
        let bytes = granule_bytes(west, north, pixel_degrees, width, height, samples);
        Scene::from_reader(Cursor::new(bytes), "test.tif".to_string()).unwrap()
    }
}
