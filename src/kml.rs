//! Very simple functions for producing KML files specifically suited to this crate and the
//! programs that use it.
//!
//! This is not a general KML solution, only the elements the coverage maps actually need, with a
//! streaming style API so a large map never has to be held in memory. That means the user is
//! responsible for closing all tags.

use crate::SatCoverResult;
use chrono::{DateTime, Utc};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

pub struct KmlFile(BufWriter<File>);

impl KmlFile {
    /// Open a file for output and start by putting the header out.
    pub fn new<P: AsRef<Path>>(pth: P) -> SatCoverResult<Self> {
        let p = pth.as_ref();

        const HEADER: &str = concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "\n",
            r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#,
            "\n",
            "<Document>\n"
        );

        let f = std::fs::File::create(p)?;
        let mut new = KmlFile(BufWriter::new(f));
        new.0.write_all(HEADER.as_bytes())?;

        Ok(new)
    }

    /// Write a description element to the file.
    pub fn write_description(&mut self, description: &str) -> SatCoverResult<()> {
        writeln!(
            self.0,
            "<description><![CDATA[{}]]></description>",
            description
        )?;
        Ok(())
    }

    /// Start a KML folder.
    pub fn start_folder(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        is_open: bool,
    ) -> SatCoverResult<()> {
        self.0.write_all("<Folder>\n".as_bytes())?;

        if let Some(name) = name {
            writeln!(self.0, "<name>{}</name>", name)?;
        }

        if let Some(description) = description {
            self.write_description(description)?;
        }

        if is_open {
            self.0.write_all("<open>1</open>\n".as_bytes())?;
        }

        Ok(())
    }

    /// Close out a folder element
    pub fn finish_folder(&mut self) -> SatCoverResult<()> {
        writeln!(self.0, "</Folder>")?;
        Ok(())
    }

    /// Start a placemark element.
    pub fn start_placemark(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        style_url: Option<&str>,
    ) -> SatCoverResult<()> {
        writeln!(self.0, "<Placemark>")?;

        if let Some(name) = name {
            writeln!(self.0, "<name>{}</name>", name)?;
        }

        if let Some(description) = description {
            self.write_description(description)?;
        }

        if let Some(style_url) = style_url {
            writeln!(self.0, "<styleUrl>{}</styleUrl>", style_url)?;
        }

        Ok(())
    }

    /// Close out a placemark element.
    pub fn finish_placemark(&mut self) -> SatCoverResult<()> {
        writeln!(self.0, "</Placemark>")?;
        Ok(())
    }

    /// Start a style definition.
    pub fn start_style(&mut self, style_id: Option<&str>) -> SatCoverResult<()> {
        if let Some(style_id) = style_id {
            writeln!(self.0, "<Style id=\"{}\">", style_id)?;
        } else {
            writeln!(self.0, "<Style>")?;
        }
        Ok(())
    }

    /// Close out a style definition.
    pub fn finish_style(&mut self) -> SatCoverResult<()> {
        writeln!(self.0, "</Style>")?;
        Ok(())
    }

    /// Create a PolyStyle element.
    ///
    /// These should ONLY go inside a style element.
    pub fn create_poly_style(
        &mut self,
        color: Option<&str>,
        filled: bool,
        outlined: bool,
    ) -> SatCoverResult<()> {
        writeln!(self.0, "<PolyStyle>")?;

        if let Some(color) = color {
            writeln!(self.0, "<color>{}</color>", color)?;
            writeln!(self.0, "<colorMode>normal</colorMode>")?;
        } else {
            writeln!(self.0, "<colorMode>random</colorMode>")?;
        }

        let filled = if filled { 1 } else { 0 };
        let outlined = if outlined { 1 } else { 0 };

        writeln!(self.0, "<fill>{}</fill>", filled)?;
        writeln!(self.0, "<outline>{}</outline>", outlined)?;

        writeln!(self.0, "</PolyStyle>")?;
        Ok(())
    }

    /// Write out a TimeSpan element.
    pub fn timespan(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> SatCoverResult<()> {
        self.0.write_all("<TimeSpan>\n".as_bytes())?;
        writeln!(
            self.0,
            "<begin>{}</begin>",
            start.format("%Y-%m-%dT%H:%M:%S.000Z")
        )?;
        writeln!(
            self.0,
            "<end>{}</end>",
            end.format("%Y-%m-%dT%H:%M:%S.000Z")
        )?;
        self.0.write_all("</TimeSpan>\n".as_bytes())?;
        Ok(())
    }

    /// Start a Polygon element.
    pub fn start_polygon(
        &mut self,
        extrude: bool,
        tessellate: bool,
        altitude_mode: Option<&str>,
    ) -> SatCoverResult<()> {
        self.0.write_all("<Polygon>\n".as_bytes())?;

        if let Some(altitude_mode) = altitude_mode {
            debug_assert!(
                altitude_mode == "clampToGround"
                    || altitude_mode == "relativeToGround"
                    || altitude_mode == "absolute"
            );

            writeln!(self.0, "<altitudeMode>{}</altitudeMode>", altitude_mode)?;
        }

        if extrude {
            self.0.write_all("<extrude>1</extrude>\n".as_bytes())?;
        }

        if tessellate {
            self.0.write_all("<tessellate>1</tessellate>\n".as_bytes())?;
        }

        Ok(())
    }

    /// Close out a Polygon element.
    pub fn finish_polygon(&mut self) -> SatCoverResult<()> {
        self.0.write_all("</Polygon>\n".as_bytes())?;
        Ok(())
    }

    /// Start the polygon outer ring.
    ///
    /// This should only be used inside a Polygon element.
    pub fn polygon_start_outer_ring(&mut self) -> SatCoverResult<()> {
        self.0.write_all("<outerBoundaryIs>\n".as_bytes())?;
        Ok(())
    }

    /// End the polygon outer ring.
    ///
    /// This should only be used inside a Polygon element.
    pub fn polygon_finish_outer_ring(&mut self) -> SatCoverResult<()> {
        self.0.write_all("</outerBoundaryIs>\n".as_bytes())?;
        Ok(())
    }

    /// Start a LinearRing.
    pub fn start_linear_ring(&mut self) -> SatCoverResult<()> {
        self.0.write_all("<LinearRing>\n<coordinates>\n".as_bytes())?;
        Ok(())
    }

    /// End a LinearRing.
    pub fn finish_linear_ring(&mut self) -> SatCoverResult<()> {
        self.0
            .write_all("</coordinates>\n</LinearRing>\n".as_bytes())?;
        Ok(())
    }

    /// Add a vertex to the LinearRing
    ///
    /// Must be used inside a linear ring element.
    pub fn linear_ring_add_vertex(&mut self, lat: f64, lon: f64, z: f64) -> SatCoverResult<()> {
        writeln!(self.0, "{},{},{}", lon, lat, z)?;
        Ok(())
    }
}

impl Drop for KmlFile {
    fn drop(&mut self) {
        const FOOTER: &str = concat!(r#"</Document>"#, "\n", r#"</kml>"#, "\n");
        let _ = self.0.write_all(FOOTER.as_bytes());
    }
}
