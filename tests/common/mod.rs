//! Container fixtures built with the crate's own Exdir writer.
#![allow(dead_code)]

use std::path::PathBuf;

use ndarray::{Array1, Array3};
use plotters::coord::Shift;
use plotters::prelude::*;
use tempfile::TempDir;

use vian::exdir::{Attributes, Dataset, File, Group};
use vian::units::{Quantity, Unit};

pub struct Recording {
    _dir: TempDir,
    pub path: PathBuf,
    pub file: File,
}

/// Empty container with a session duration (s).
pub fn recording(duration: f64) -> Recording {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("recording.exdir");
    let file = File::create(&path).unwrap();
    let mut attrs = Attributes::empty("/");
    attrs.insert_quantity("session_duration", Quantity::new(duration, Unit::SECOND));
    file.set_attrs(&attrs).unwrap();
    Recording {
        _dir: dir,
        path,
        file,
    }
}

fn update(attrs: Attributes, fill: impl FnOnce(&mut Attributes)) -> Attributes {
    let mut attrs = attrs;
    fill(&mut attrs);
    attrs
}

pub fn set_group_attrs(group: &Group, fill: impl FnOnce(&mut Attributes)) {
    group.set_attrs(&update(group.attrs().unwrap(), fill)).unwrap();
}

pub fn set_dataset_attrs(dataset: &Dataset, fill: impl FnOnce(&mut Attributes)) {
    dataset.set_attrs(&update(dataset.attrs().unwrap(), fill)).unwrap();
}

pub fn channel_group(file: &File, n: usize) -> Group {
    file.require_group("processing")
        .and_then(|g| g.require_group("electrophysiology"))
        .and_then(|g| g.require_group(&format!("channel_group_{n}")))
        .unwrap()
}

/// One LFP channel stored under `name`, samples in microvolts.
pub fn add_lfp_channel(file: &File, group: usize, name: &str, electrode_idx: i64, samples: &[f64], rate: f64) {
    let lfp = channel_group(file, group).require_group("LFP").unwrap();
    let channel = lfp.create_group(name).unwrap();
    set_group_attrs(&channel, |a| {
        a.insert("electrode_idx", electrode_idx);
        a.insert_quantity("sample_rate", Quantity::new(rate, Unit::HERTZ));
    });
    let data = channel
        .create_dataset("data", &Array1::from(samples.to_vec()))
        .unwrap();
    set_dataset_attrs(&data, |a| a.insert("unit", "uV"));
}

/// A sorted unit with spike times given as sample indices at `rate`.
pub fn add_unit(file: &File, group: usize, id: &str, indices: &[f64], rate: f64, cluster_group: Option<&str>) -> Group {
    let unit_times = channel_group(file, group).require_group("UnitTimes").unwrap();
    set_group_attrs(&unit_times, |a| {
        a.insert_quantity("sample_rate", Quantity::new(rate, Unit::HERTZ))
    });
    let unit = unit_times.create_group(id).unwrap();
    if let Some(label) = cluster_group {
        set_group_attrs(&unit, |a| a.insert("cluster_group", label));
    }
    unit.create_dataset("times", &Array1::from(indices.to_vec()))
        .unwrap();
    unit
}

pub fn add_waveforms(unit: &Group, data: &Array3<f64>, rate: f64) {
    let ds = unit.create_dataset("waveforms", data).unwrap();
    set_dataset_attrs(&ds, |a| {
        a.insert("unit", "uV");
        a.insert_quantity("sample_rate", Quantity::new(rate, Unit::HERTZ));
    });
}

/// An epoch group with times and durations in seconds and numeric labels in
/// degrees.
pub fn add_epoch(parent: &Group, name: &str, times: &[f64], durations: Option<&[f64]>, labels: Option<&[f64]>) -> Group {
    let epoch = parent.create_group(name).unwrap();
    let ts = epoch
        .create_dataset("timestamps", &Array1::from(times.to_vec()))
        .unwrap();
    set_dataset_attrs(&ts, |a| a.insert("unit", "s"));
    if let Some(durations) = durations {
        let ds = epoch
            .create_dataset("durations", &Array1::from(durations.to_vec()))
            .unwrap();
        set_dataset_attrs(&ds, |a| a.insert("unit", "s"));
    }
    if let Some(labels) = labels {
        let ds = epoch
            .create_dataset("data", &Array1::from(labels.to_vec()))
            .unwrap();
        set_dataset_attrs(&ds, |a| a.insert("unit", "deg"));
    }
    epoch
}

/// Render into an in-memory SVG document.
pub fn render_svg<F>(size: (u32, u32), draw: F) -> String
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> anyhow::Result<()>,
{
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE).unwrap();
        draw(&root).unwrap();
        root.present().unwrap();
    }
    svg
}
