/*! Contains all the information about satellites. */

use chrono::{NaiveDate, NaiveDateTime};
use strum::{EnumIter, IntoStaticStr};

/** The imaging platforms this library works with. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum Platform {
    /// The Sentinel-2 constellation. S2A and S2B fly the same multispectral imager and are
    /// treated as one source.
    #[strum(serialize = "S2")]
    Sentinel2,
    /// Landsat 7, carrying the ETM+ instrument.
    #[strum(serialize = "LE07")]
    Landsat7,
    /// Landsat 8, carrying the OLI instrument.
    #[strum(serialize = "LC08")]
    Landsat8,
}

impl Platform {
    /// Get a string representing the name of the platform.
    ///
    /// This is also the product id prefix used in the standard granule naming schemes, so it
    /// doubles as the needle for [Platform::string_contains_platform].
    pub fn name(&self) -> &'static str {
        use Platform::*;

        match self {
            Sentinel2 => "S2",
            Landsat7 => "LE07",
            Landsat8 => "LC08",
        }
    }

    /// The archive collection this platform's level-2 granules are drawn from.
    pub fn collection(&self) -> &'static str {
        use Platform::*;

        match self {
            Sentinel2 => "COPERNICUS/S2_HARMONIZED",
            Landsat7 => "LANDSAT/LE07/C02/T1_L2",
            Landsat8 => "LANDSAT/LC08/C02/T1_L2",
        }
    }

    /// Scan the string for the occurence of a platform product id.
    ///
    /// The Landsat ids are checked first since they are the more specific needles; the
    /// Sentinel-2 needle "S2" matches both the S2A and S2B spacecraft prefixes.
    pub fn string_contains_platform(string: &str) -> Option<Platform> {
        use Platform::*;

        let all_platforms = [Landsat7, Landsat8, Sentinel2];
        for platform in all_platforms {
            if string.contains(platform.name()) {
                return Some(platform);
            }
        }

        None
    }

    /// The sensor family whose coverage this platform's granules count toward.
    pub fn family(&self) -> SensorFamily {
        use Platform::*;

        match self {
            Sentinel2 => SensorFamily::Sentinel2,
            Landsat7 | Landsat8 => SensorFamily::Landsat,
        }
    }

    /// Get the date and time (in UTC) that the platform became operational.
    ///
    /// Acquisitions dated before this are suspect, so the catalog logs a warning when an
    /// analysis window predates it.
    pub fn operational(&self) -> NaiveDateTime {
        use Platform::*;

        match self {
            Sentinel2 => NaiveDate::from_ymd_opt(2015, 10, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            Landsat7 => NaiveDate::from_ymd_opt(1999, 7, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            Landsat8 => NaiveDate::from_ymd_opt(2013, 5, 30)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }
}

/** The two sensor families coverage is reported for. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum SensorFamily {
    /// The Sentinel-2 MSI archive.
    #[strum(serialize = "Sentinel-2")]
    Sentinel2,
    /// The combined Landsat 7 and Landsat 8 optical archives. Observation counts from the two
    /// spacecraft add into one coverage mask.
    #[strum(serialize = "Landsat")]
    Landsat,
}

impl SensorFamily {
    /// Get a string representing the name of the family.
    ///
    /// These are the labels used on the printed report lines.
    pub fn name(&self) -> &'static str {
        use SensorFamily::*;

        match self {
            Sentinel2 => "Sentinel-2",
            Landsat => "Landsat",
        }
    }

    /// The red reflectance band sampled for the observation test.
    pub fn band(&self) -> &'static str {
        use SensorFamily::*;

        match self {
            Sentinel2 => "B4",
            Landsat => "SR_B4",
        }
    }

    /// The native scale of this family's granules in meters.
    pub fn native_scale_m(&self) -> f64 {
        use SensorFamily::*;

        match self {
            Sentinel2 => 10.0,
            Landsat => 30.0,
        }
    }

    /// Check whether a granule file name carries this family's red band token.
    ///
    /// Landsat collection-2 products spell it "SR_B4". Sentinel-2 products use "B04" (the SAFE
    /// convention, possibly followed by a resolution suffix) or a bare "B4" in flat exports.
    pub fn file_name_has_band(&self, fname: &str) -> bool {
        use SensorFamily::*;

        match self {
            Sentinel2 => fname.contains("_B04") || fname.contains("_B4."),
            Landsat => fname.contains("_SR_B4"),
        }
    }

    /// The platforms contributing granules to this family.
    pub fn platforms(&self) -> &'static [Platform] {
        use SensorFamily::*;

        match self {
            Sentinel2 => &[Platform::Sentinel2],
            Landsat => &[Platform::Landsat7, Platform::Landsat8],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_from_product_ids() {
        assert_eq!(
            Platform::string_contains_platform("LE07_L2SP_038029_20200415_20200820_02_T1_SR_B4.TIF"),
            Some(Platform::Landsat7)
        );
        assert_eq!(
            Platform::string_contains_platform("LC08_L2SP_038029_20200415_20200822_02_T1_SR_B4.TIF"),
            Some(Platform::Landsat8)
        );
        assert_eq!(
            Platform::string_contains_platform("S2A_MSIL2A_20200415T183921_T11TLH_B04.tif"),
            Some(Platform::Sentinel2)
        );
        assert_eq!(
            Platform::string_contains_platform("S2B_MSIL2A_20200415T183919_T11TLH_B04_10m.tif"),
            Some(Platform::Sentinel2)
        );
        assert_eq!(Platform::string_contains_platform("random_raster.tif"), None);
    }

    #[test]
    fn platforms_group_into_families() {
        assert_eq!(Platform::Sentinel2.family(), SensorFamily::Sentinel2);
        assert_eq!(Platform::Landsat7.family(), SensorFamily::Landsat);
        assert_eq!(Platform::Landsat8.family(), SensorFamily::Landsat);

        assert_eq!(SensorFamily::Landsat.platforms().len(), 2);
        assert_eq!(SensorFamily::Sentinel2.platforms().len(), 1);
    }

    #[test]
    fn band_tokens() {
        assert!(SensorFamily::Landsat
            .file_name_has_band("LC08_L2SP_038029_20200415_20200822_02_T1_SR_B4.TIF"));
        assert!(!SensorFamily::Landsat
            .file_name_has_band("LC08_L2SP_038029_20200415_20200822_02_T1_SR_B5.TIF"));

        assert!(SensorFamily::Sentinel2.file_name_has_band("T11TLH_20200415T183921_B04_10m.tif"));
        assert!(SensorFamily::Sentinel2.file_name_has_band("S2A_20200415T183921_B4.tif"));
        assert!(!SensorFamily::Sentinel2.file_name_has_band("T11TLH_20200415T183921_B08.tif"));
    }

    #[test]
    fn collections_and_scales() {
        assert_eq!(Platform::Sentinel2.collection(), "COPERNICUS/S2_HARMONIZED");
        assert_eq!(Platform::Landsat7.collection(), "LANDSAT/LE07/C02/T1_L2");
        assert_eq!(Platform::Landsat8.collection(), "LANDSAT/LC08/C02/T1_L2");

        assert_eq!(SensorFamily::Sentinel2.native_scale_m(), 10.0);
        assert_eq!(SensorFamily::Landsat.native_scale_m(), 30.0);

        assert_eq!(SensorFamily::Sentinel2.band(), "B4");
        assert_eq!(SensorFamily::Landsat.band(), "SR_B4");
    }

    #[test]
    fn operational_ordering() {
        assert!(Platform::Landsat7.operational() < Platform::Landsat8.operational());
        assert!(Platform::Landsat8.operational() < Platform::Sentinel2.operational());
    }
}
