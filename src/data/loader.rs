use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ndarray::{Array2, Ix3};
use serde::{Deserialize, Serialize};

use super::filter::{exclude_label, CLUSTER_GROUP};
use super::model::{AnalogSignal, Annotations, Epoch, MetadataValue, SpikeTrain, Waveforms};
use crate::exdir::{Attributes, Dataset, DatasetData, File, Group};
use crate::units::Unit;

/// Group holding all processed electrophysiology data.
pub const ELECTROPHYSIOLOGY: &str = "processing/electrophysiology";

/// Canonical unit for continuous signals.
pub const DISPLAY_UNIT: Unit = Unit::MILLIVOLT;

// ---------------------------------------------------------------------------
// Query options
// ---------------------------------------------------------------------------

/// Which spike trains [`load_spiketrains`] returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeTrainQuery {
    /// Restrict to `channel_group_<N>`; `None` reads every channel group.
    pub channel_group: Option<usize>,
    /// Drop clusters whose `cluster_group` contains this label.
    pub remove_label: Option<String>,
}

impl Default for SpikeTrainQuery {
    fn default() -> Self {
        SpikeTrainQuery {
            channel_group: None,
            remove_label: Some("noise".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load the LFP of one channel group, columns ordered by electrode index and
/// rescaled to millivolts.
///
/// Layout: `processing/electrophysiology/channel_group_<N>/LFP/<channel>/data`,
/// each `<channel>` group carrying `electrode_idx` and `sample_rate`.
pub fn load_lfp(path: &Path, channel_group: usize) -> Result<AnalogSignal> {
    let file = open(path)?;
    let t_stop = session_duration(&file)?;
    let lfp = file
        .group(&format!("{ELECTROPHYSIOLOGY}/channel_group_{channel_group}/LFP"))
        .with_context(|| format!("locating LFP of channel group {channel_group}"))?;

    let channels = lfp.groups()?;
    let Some(first) = channels.first() else {
        bail!("LFP group '{}' holds no channels", lfp.name());
    };

    let mut columns: Vec<(i64, Vec<f64>)> = Vec::with_capacity(channels.len());
    for channel in &channels {
        let electrode_idx = channel
            .attrs()?
            .i64("electrode_idx")
            .with_context(|| format!("reading electrode index of '{}'", channel.name()))?;
        let samples = channel
            .dataset("data")
            .and_then(|d| d.read_f64())
            .with_context(|| format!("reading samples of '{}'", channel.name()))?;
        columns.push((electrode_idx, samples.iter().copied().collect()));
    }

    let sampling_rate = first
        .attrs()?
        .quantity("sample_rate", Unit::HERTZ)?
        .value_in(Unit::HERTZ)?;
    let units = dataset_unit(&first.dataset("data")?)?;

    // Storage order is arbitrary; the electrode index is the physical order.
    columns.sort_by_key(|(idx, _)| *idx);

    let n_samples = columns[0].1.len();
    if let Some((idx, samples)) = columns.iter().find(|(_, s)| s.len() != n_samples) {
        bail!(
            "electrode {idx} has {} samples, expected {n_samples}",
            samples.len()
        );
    }
    let data = Array2::from_shape_fn((n_samples, columns.len()), |(i, j)| columns[j].1[i]);
    let channel_ids = columns.iter().map(|(idx, _)| *idx).collect();

    let signal = AnalogSignal::new(data, units, sampling_rate, 0.0, t_stop, channel_ids)?
        .rescale(DISPLAY_UNIT)?;
    log::info!(
        "loaded LFP: {} channels x {} samples at {} Hz from {}",
        signal.num_channels(),
        signal.num_samples(),
        signal.sampling_rate(),
        path.display()
    );
    Ok(signal)
}

/// Load every epoch below `epochs`, at any depth. A group is an epoch when it
/// holds a `timestamps` dataset.
pub fn load_epochs(path: &Path) -> Result<Vec<Epoch>> {
    let file = open(path)?;
    let epochs_group = file.group("epochs").context("locating 'epochs' group")?;
    let mut epochs = Vec::new();
    collect_epochs(&epochs_group, &mut epochs)?;
    log::info!("loaded {} epochs from {}", epochs.len(), path.display());
    Ok(epochs)
}

/// Load sorted units as spike trains, optionally removing a curation label.
///
/// Layout: `processing/electrophysiology/channel_group_<N>/UnitTimes/<unit>/times`
/// holding sample indices (converted with the `sample_rate` of `UnitTimes`),
/// or times when the dataset has its own `unit`. An optional `waveforms`
/// dataset next to `times` holds spikes x channels x samples snippets.
pub fn load_spiketrains(path: &Path, query: &SpikeTrainQuery) -> Result<Vec<SpikeTrain>> {
    let file = open(path)?;
    let t_stop = session_duration(&file)?;
    let ephys = file
        .group(ELECTROPHYSIOLOGY)
        .context("locating electrophysiology group")?;

    let mut trains = Vec::new();
    match query.channel_group {
        Some(n) => {
            let unit_times = ephys
                .group(&format!("channel_group_{n}/UnitTimes"))
                .with_context(|| format!("locating sorted units of channel group {n}"))?;
            read_units(&unit_times, n, t_stop, &mut trains)?;
        }
        None => {
            for (n, group) in channel_groups(&ephys)? {
                if !group.contains("UnitTimes") {
                    log::debug!("'{}' has no sorted units", group.name());
                    continue;
                }
                read_units(&group.group("UnitTimes")?, n, t_stop, &mut trains)?;
            }
        }
    }
    log::info!("loaded {} spike trains from {}", trains.len(), path.display());

    match &query.remove_label {
        Some(label) if !trains.is_empty() => Ok(exclude_label(trains, CLUSTER_GROUP, label)),
        _ => Ok(trains),
    }
}

/// Resolve the main data container of an experiment action directory
/// (`<project>/actions/<action>`), from the `data.main` attribute.
pub fn resolve_action_data_path(action_dir: &Path) -> Result<PathBuf> {
    let attrs_path = action_dir.join("attributes.yaml");
    let text = std::fs::read_to_string(&attrs_path)
        .with_context(|| format!("reading {}", attrs_path.display()))?;
    let attrs = Attributes::from_yaml(&action_dir.display().to_string(), &text)?;
    let main = attrs
        .require("data")?
        .get("main")
        .and_then(|v| v.as_str())
        .context("action attribute 'data' has no 'main' entry")?;

    // Actions registered on Windows store backslash-separated paths.
    let data_path: PathBuf = main.split(&['\\', '/'][..]).filter(|p| !p.is_empty()).collect();
    let project_path = action_dir
        .parent()
        .and_then(Path::parent)
        .with_context(|| format!("'{}' is not inside a project", action_dir.display()))?;

    log::info!(
        "project path: {}, data path: {}",
        project_path.display(),
        data_path.display()
    );
    Ok(project_path.join(data_path))
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("opening exdir container {}", path.display()))
}

/// Recording length in seconds, from the root `session_duration` attribute.
fn session_duration(file: &File) -> Result<f64> {
    let duration = file
        .attrs()?
        .quantity("session_duration", Unit::SECOND)
        .context("reading session duration")?;
    Ok(duration.value_in(Unit::SECOND)?)
}

/// The required `unit` attribute of a dataset.
fn dataset_unit(dataset: &Dataset) -> Result<Unit> {
    dataset
        .attrs()?
        .unit()?
        .with_context(|| format!("dataset '{}' has no 'unit' attribute", dataset.name()))
}

/// Flattened values of a dataset with a `unit`, expressed in `target`.
fn read_quantities(dataset: &Dataset, target: Unit) -> Result<Vec<f64>> {
    let factor = dataset_unit(dataset)?.factor_to(target)?;
    let values = dataset.read_f64()?;
    Ok(values.iter().map(|v| v * factor).collect())
}

fn annotations_from(attrs: &Attributes) -> Annotations {
    attrs
        .iter()
        .map(|(k, v)| (k.to_string(), MetadataValue::from_yaml(v)))
        .collect()
}

/// `channel_group_<N>` children, ordered by `N`.
fn channel_groups(ephys: &Group) -> Result<Vec<(usize, Group)>> {
    let mut groups = Vec::new();
    for group in ephys.groups()? {
        let key = group.name().rsplit('/').next().unwrap_or_default();
        if let Some(n) = key
            .strip_prefix("channel_group_")
            .and_then(|n| n.parse::<usize>().ok())
        {
            groups.push((n, group));
        }
    }
    groups.sort_by_key(|(n, _)| *n);
    Ok(groups)
}

fn last_segment(group: &Group) -> String {
    group.name().rsplit('/').next().unwrap_or_default().to_string()
}

// ---------------------------------------------------------------------------
// Epochs
// ---------------------------------------------------------------------------

fn collect_epochs(group: &Group, out: &mut Vec<Epoch>) -> Result<()> {
    for child in group.groups()? {
        if child.contains("timestamps") {
            out.push(read_epoch(&child)?);
        } else {
            collect_epochs(&child, out)?;
        }
    }
    Ok(())
}

fn read_epoch(group: &Group) -> Result<Epoch> {
    let context = || format!("reading epoch '{}'", group.name());

    let times = read_quantities(&group.dataset("timestamps")?, Unit::SECOND).with_context(context)?;
    let durations = if group.contains("durations") {
        Some(read_quantities(&group.dataset("durations")?, Unit::SECOND).with_context(context)?)
    } else {
        None
    };
    let labels = if group.contains("data") {
        Some(read_labels(&group.dataset("data")?).with_context(context)?)
    } else {
        None
    };

    let mut annotations = annotations_from(&group.attrs()?);
    annotations.insert(
        "exdir_path".to_string(),
        MetadataValue::String(group.name().to_string()),
    );

    let epoch = Epoch::build(last_segment(group), times, durations, labels)
        .with_context(context)?
        .with_annotations(annotations);
    log::debug!("read epoch '{}' with {} entries", group.name(), epoch.len());
    Ok(epoch)
}

/// Text labels as strings; numeric labels as quantities when the dataset
/// has a `unit`.
fn read_labels(dataset: &Dataset) -> Result<Vec<MetadataValue>> {
    let labels = match dataset.read()? {
        DatasetData::Text(values) => values.iter().map(|s| MetadataValue::String(s.clone())).collect(),
        DatasetData::Numeric(values) => match dataset.attrs()?.unit()? {
            Some(unit) => values
                .iter()
                .map(|&v| MetadataValue::Quantity(v, unit.symbol().to_string()))
                .collect(),
            None => values.iter().map(|&v| MetadataValue::Float(v)).collect(),
        },
    };
    Ok(labels)
}

// ---------------------------------------------------------------------------
// Spike trains
// ---------------------------------------------------------------------------

fn read_units(
    unit_times: &Group,
    channel_group: usize,
    t_stop: f64,
    out: &mut Vec<SpikeTrain>,
) -> Result<()> {
    let group_attrs = unit_times.attrs()?;
    let mut units = unit_times.groups()?;
    // Unit ids are numeric cluster ids; order 2 before 10.
    units.sort_by_key(|g| {
        let key = last_segment(g);
        (key.parse::<i64>().unwrap_or(i64::MAX), key)
    });

    for unit in &units {
        let train = read_unit(unit, &group_attrs, channel_group, t_stop)
            .with_context(|| format!("reading unit '{}'", unit.name()))?;
        out.push(train);
    }
    Ok(())
}

fn read_unit(
    unit: &Group,
    group_attrs: &Attributes,
    channel_group: usize,
    t_stop: f64,
) -> Result<SpikeTrain> {
    let times_ds = unit.dataset("times")?;
    let times: Vec<f64> = match times_ds.attrs()?.unit()? {
        Some(_) => read_quantities(&times_ds, Unit::SECOND)?,
        None => {
            let rate = group_attrs
                .quantity("sample_rate", Unit::HERTZ)?
                .value_in(Unit::HERTZ)?;
            times_ds.read_f64()?.iter().map(|&index| index / rate).collect()
        }
    };

    let attrs = unit.attrs()?;
    let key = last_segment(unit);
    let name = attrs.str("name").map(str::to_string).unwrap_or(key);
    let description = attrs
        .str("description")
        .or_else(|_| attrs.str(CLUSTER_GROUP))
        .unwrap_or_default()
        .to_string();

    let mut annotations = annotations_from(&attrs);
    annotations.insert(
        "channel_group".to_string(),
        MetadataValue::Integer(channel_group as i64),
    );

    let mut train = SpikeTrain::build(times, 0.0, t_stop)?
        .with_name(name)
        .with_description(description)
        .with_annotations(annotations);

    if unit.contains("waveforms") {
        let dataset = unit.dataset("waveforms")?;
        let data = dataset
            .read_f64()?
            .into_dimensionality::<Ix3>()
            .context("waveforms must be spikes x channels x samples")?;
        let wf_attrs = dataset.attrs()?;
        let rate_attrs = if wf_attrs.contains("sample_rate") {
            &wf_attrs
        } else {
            group_attrs
        };
        let sampling_rate = rate_attrs
            .quantity("sample_rate", Unit::HERTZ)?
            .value_in(Unit::HERTZ)?;
        train = train.with_waveforms(Waveforms {
            data,
            units: dataset_unit(&dataset)?,
            sampling_rate,
        })?;
    }
    log::debug!("read unit '{}' with {} spikes", unit.name(), train.len());
    Ok(train)
}
