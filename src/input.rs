//! CSV readers for the current field and the particle seeds, plus the
//! matching writer for final positions.

use crate::field::CurrentField;
use crate::simulation::RunOutput;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::{Read, Write};
use std::path::Path;
use transport_common::GeoPoint;

/// One grid cell. `w` and `max_speed` columns are optional.
#[derive(Debug, Deserialize)]
struct FieldRecord {
    lon: f64,
    lat: f64,
    depth: f64,
    u: f64,
    v: f64,
    #[serde(default)]
    w: Option<f64>,
    #[serde(default)]
    max_speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ParticleRecord {
    lon: f64,
    lat: f64,
    #[serde(default)]
    depth: f64,
}

pub fn read_field<P: AsRef<Path>>(path: P) -> Result<CurrentField> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open field file '{}'", path.display()))?;
    read_field_from(file).with_context(|| format!("Invalid field file '{}'", path.display()))
}

pub fn read_field_from<R: Read>(reader: R) -> Result<CurrentField> {
    let mut reader = csv::Reader::from_reader(reader);
    let (mut lon, mut lat, mut depth, mut u, mut v) = (Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new());
    let mut w = Vec::new();
    let mut max_speed = Vec::new();
    let mut has_w = true;
    let mut has_max_speed = true;

    for record in reader.deserialize() {
        let record: FieldRecord = record?;
        lon.push(record.lon);
        lat.push(record.lat);
        depth.push(record.depth);
        u.push(record.u);
        v.push(record.v);
        match record.w {
            Some(value) => w.push(value),
            None => has_w = false,
        }
        match record.max_speed {
            Some(value) => max_speed.push(value),
            None => has_max_speed = false,
        }
    }

    let mut field = CurrentField::new(lon, lat, depth, u, v)?;
    if has_w && !w.is_empty() {
        field = field.with_vertical(w)?;
    }
    if has_max_speed && !max_speed.is_empty() {
        field = field.with_max_speed(max_speed)?;
    }
    Ok(field)
}

pub fn read_particles<P: AsRef<Path>>(path: P) -> Result<Vec<GeoPoint>> {
    let path = path.as_ref();
    let file =
        std::fs::File::open(path).with_context(|| format!("Failed to open particle file '{}'", path.display()))?;
    read_particles_from(file).with_context(|| format!("Invalid particle file '{}'", path.display()))
}

pub fn read_particles_from<R: Read>(reader: R) -> Result<Vec<GeoPoint>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut particles = Vec::new();
    for record in reader.deserialize() {
        let record: ParticleRecord = record?;
        particles.push(GeoPoint::new(record.lon, record.lat, record.depth));
    }
    if particles.is_empty() {
        anyhow::bail!("no particles found");
    }
    Ok(particles)
}

/// Final position and stop step of every particle, one row each.
pub fn write_final_positions<W: Write>(writer: W, output: &RunOutput) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["particle", "lon", "lat", "depth", "stop_step"])?;
    for (idx, point) in output.final_positions.points().iter().enumerate() {
        writer.write_record(&[
            idx.to_string(),
            format!("{:.6}", point.lon),
            format!("{:.6}", point.lat),
            format!("{:.3}", point.depth),
            output.stop_times[idx].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
