use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use ndarray::{Array2, Array3, ArrayView1, Axis};
use serde_yaml::Value as YamlValue;
use thiserror::Error;

use crate::units::{Dimension, Quantity, Unit, UnitError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("spike times must be finite")]
    NonFiniteTimes,
    #[error("spike times must be non-decreasing ({prev} then {next})")]
    UnsortedTimes { prev: f64, next: f64 },
    #[error("spike time {time} outside [{t_start}, {t_stop}]")]
    TimeOutOfRange { time: f64, t_start: f64, t_stop: f64 },
    #[error("t_stop ({t_stop}) precedes t_start ({t_start})")]
    InvalidWindow { t_start: f64, t_stop: f64 },
    #[error("{what} has {found} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("sampling rate must be positive, got {0}")]
    InvalidSamplingRate(f64),
    #[error("{0} is not a voltage unit")]
    NotAVoltage(Unit),
    #[error(transparent)]
    Unit(#[from] UnitError),
}

// ---------------------------------------------------------------------------
// MetadataValue – a single annotation value
// ---------------------------------------------------------------------------

/// A dynamically-typed annotation value, as found in Exdir attributes.
/// Used as a `BTreeMap` / `BTreeSet` key downstream, so it must be `Ord`.
/// Equality follows the ordering: floats compare by `total_cmp`, so a NaN
/// label equals itself.
#[derive(Debug, Clone)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// A magnitude with its unit symbol (`{value, unit}` in YAML).
    Quantity(f64, String),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
    Null,
}

pub type Annotations = BTreeMap<String, MetadataValue>;

// -- Manual Eq/Ord so we can put MetadataValue in BTreeSet --

impl PartialEq for MetadataValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetadataValue::*;
        fn discriminant(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                Quantity(..) => 4,
                String(_) => 5,
                List(_) => 6,
                Map(_) => 7,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Quantity(a, ua), Quantity(b, ub)) => ua.cmp(ub).then(a.total_cmp(b)),
            (String(a), String(b)) => a.cmp(b),
            (List(a), List(b)) => a.cmp(b),
            (Map(a), Map(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for MetadataValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MetadataValue::String(s) => s.hash(state),
            MetadataValue::Integer(i) => i.hash(state),
            MetadataValue::Float(f) => f.to_bits().hash(state),
            MetadataValue::Bool(b) => b.hash(state),
            MetadataValue::Quantity(v, u) => {
                v.to_bits().hash(state);
                u.hash(state);
            }
            MetadataValue::List(items) => items.hash(state),
            MetadataValue::Map(map) => map.hash(state),
            MetadataValue::Null => {}
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Quantity(v, u) => write!(f, "{v} {u}"),
            MetadataValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            MetadataValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    /// Try to interpret the value as an `f64` (quantities yield their magnitude).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            MetadataValue::Quantity(v, _) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as a quantity; bare numbers take `default_unit`.
    pub fn as_quantity(&self, default_unit: Unit) -> Option<Result<Quantity, UnitError>> {
        match self {
            MetadataValue::Quantity(v, u) => Some(Unit::parse(u).map(|unit| Quantity::new(*v, unit))),
            MetadataValue::Float(_) | MetadataValue::Integer(_) => {
                self.as_f64().map(|v| Ok(Quantity::new(v, default_unit)))
            }
            _ => None,
        }
    }

    /// Convert a YAML attribute value. `{value, unit}` mappings become quantities.
    pub fn from_yaml(value: &YamlValue) -> Self {
        match value {
            YamlValue::Null => MetadataValue::Null,
            YamlValue::Bool(b) => MetadataValue::Bool(*b),
            YamlValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    MetadataValue::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    MetadataValue::Float(f)
                } else {
                    MetadataValue::String(n.to_string())
                }
            }
            YamlValue::String(s) => MetadataValue::String(s.clone()),
            YamlValue::Sequence(items) => {
                MetadataValue::List(items.iter().map(MetadataValue::from_yaml).collect())
            }
            YamlValue::Mapping(m) => {
                let magnitude = m.get("value").and_then(YamlValue::as_f64);
                let unit = m.get("unit").and_then(YamlValue::as_str);
                if let (Some(v), Some(u), 2) = (magnitude, unit, m.len()) {
                    return MetadataValue::Quantity(v, u.to_string());
                }
                MetadataValue::Map(
                    m.iter()
                        .map(|(k, v)| {
                            let key = match k {
                                YamlValue::String(s) => s.clone(),
                                other => MetadataValue::from_yaml(other).to_string(),
                            };
                            (key, MetadataValue::from_yaml(v))
                        })
                        .collect(),
                )
            }
            YamlValue::Tagged(tagged) => MetadataValue::from_yaml(&tagged.value),
        }
    }

    /// Inverse of [`from_yaml`](Self::from_yaml), used when writing containers.
    pub fn to_yaml(&self) -> YamlValue {
        match self {
            MetadataValue::String(s) => YamlValue::from(s.as_str()),
            MetadataValue::Integer(i) => YamlValue::from(*i),
            MetadataValue::Float(f) => YamlValue::from(*f),
            MetadataValue::Bool(b) => YamlValue::from(*b),
            MetadataValue::Quantity(v, u) => {
                let mut m = serde_yaml::Mapping::new();
                m.insert(YamlValue::from("value"), YamlValue::from(*v));
                m.insert(YamlValue::from("unit"), YamlValue::from(u.as_str()));
                YamlValue::Mapping(m)
            }
            MetadataValue::List(items) => {
                YamlValue::Sequence(items.iter().map(MetadataValue::to_yaml).collect())
            }
            MetadataValue::Map(map) => YamlValue::Mapping(
                map.iter()
                    .map(|(k, v)| (YamlValue::from(k.as_str()), v.to_yaml()))
                    .collect(),
            ),
            MetadataValue::Null => YamlValue::Null,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Integer(v)
    }
}

impl From<Quantity> for MetadataValue {
    fn from(q: Quantity) -> Self {
        MetadataValue::Quantity(q.value, q.unit.symbol().to_string())
    }
}

// ---------------------------------------------------------------------------
// AnalogSignal – continuous multi-channel recording
// ---------------------------------------------------------------------------

/// A continuous signal, samples x channels.
///
/// Columns are ordered by ascending electrode index, which `channel_ids`
/// records for each column.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogSignal {
    data: Array2<f64>,
    units: Unit,
    sampling_rate: f64,
    t_start: f64,
    t_stop: f64,
    channel_ids: Vec<i64>,
}

impl AnalogSignal {
    /// `sampling_rate` in Hz, times in seconds.
    pub fn new(
        data: Array2<f64>,
        units: Unit,
        sampling_rate: f64,
        t_start: f64,
        t_stop: f64,
        channel_ids: Vec<i64>,
    ) -> Result<Self, ModelError> {
        if !(sampling_rate > 0.0) {
            return Err(ModelError::InvalidSamplingRate(sampling_rate));
        }
        if t_stop < t_start {
            return Err(ModelError::InvalidWindow { t_start, t_stop });
        }
        if units.dimension() != Dimension::Voltage {
            return Err(ModelError::NotAVoltage(units));
        }
        if channel_ids.len() != data.ncols() {
            return Err(ModelError::LengthMismatch {
                what: "channel_ids",
                expected: data.ncols(),
                found: channel_ids.len(),
            });
        }
        Ok(AnalogSignal {
            data,
            units,
            sampling_rate,
            t_start,
            t_stop,
            channel_ids,
        })
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn units(&self) -> Unit {
        self.units
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn t_start(&self) -> f64 {
        self.t_start
    }

    pub fn t_stop(&self) -> f64 {
        self.t_stop
    }

    pub fn duration(&self) -> f64 {
        self.t_stop - self.t_start
    }

    pub fn channel_ids(&self) -> &[i64] {
        &self.channel_ids
    }

    pub fn num_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn num_channels(&self) -> usize {
        self.data.ncols()
    }

    pub fn sampling_period(&self) -> f64 {
        1.0 / self.sampling_rate
    }

    /// Samples of one column.
    pub fn channel(&self, column: usize) -> ArrayView1<'_, f64> {
        self.data.index_axis(Axis(1), column)
    }

    /// Sample times in seconds.
    pub fn times(&self) -> Vec<f64> {
        (0..self.num_samples())
            .map(|i| self.t_start + i as f64 / self.sampling_rate)
            .collect()
    }

    /// Copy of the signal expressed in `target`.
    pub fn rescale(&self, target: Unit) -> Result<AnalogSignal, ModelError> {
        let factor = self.units.factor_to(target)?;
        let data = if factor == 1.0 {
            self.data.clone()
        } else {
            self.data.mapv(|v| v * factor)
        };
        Ok(AnalogSignal {
            data,
            units: target,
            ..self.clone()
        })
    }
}

// ---------------------------------------------------------------------------
// SpikeTrain – one sorted unit
// ---------------------------------------------------------------------------

/// Waveform snippets attached to a spike train, spikes x channels x samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveforms {
    pub data: Array3<f64>,
    pub units: Unit,
    pub sampling_rate: f64,
}

/// Spike times (s) of one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeTrain {
    times: Vec<f64>,
    t_start: f64,
    t_stop: f64,
    name: String,
    description: String,
    waveforms: Option<Waveforms>,
    annotations: Annotations,
}

impl SpikeTrain {
    /// Build a spike train. Times must be finite, non-decreasing and inside
    /// `[t_start, t_stop]`.
    pub fn build(times: Vec<f64>, t_start: f64, t_stop: f64) -> Result<Self, ModelError> {
        if t_stop < t_start {
            return Err(ModelError::InvalidWindow { t_start, t_stop });
        }
        if times.iter().any(|t| !t.is_finite()) {
            return Err(ModelError::NonFiniteTimes);
        }
        for ts in times.windows(2) {
            if ts[1] < ts[0] {
                return Err(ModelError::UnsortedTimes {
                    prev: ts[0],
                    next: ts[1],
                });
            }
        }
        if let Some(&time) = times.iter().find(|&&t| t < t_start || t > t_stop) {
            return Err(ModelError::TimeOutOfRange {
                time,
                t_start,
                t_stop,
            });
        }
        Ok(SpikeTrain {
            times,
            t_start,
            t_stop,
            name: String::new(),
            description: String::new(),
            waveforms: None,
            annotations: Annotations::new(),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_annotation(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.annotations.insert(key.to_string(), value.into());
        self
    }

    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations.extend(annotations);
        self
    }

    /// Attach waveform snippets; one snippet per spike.
    pub fn with_waveforms(mut self, waveforms: Waveforms) -> Result<Self, ModelError> {
        let found = waveforms.data.shape()[0];
        if found != self.times.len() {
            return Err(ModelError::LengthMismatch {
                what: "waveforms",
                expected: self.times.len(),
                found,
            });
        }
        if !(waveforms.sampling_rate > 0.0) {
            return Err(ModelError::InvalidSamplingRate(waveforms.sampling_rate));
        }
        self.waveforms = Some(waveforms);
        Ok(self)
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn t_start(&self) -> f64 {
        self.t_start
    }

    pub fn t_stop(&self) -> f64 {
        self.t_stop
    }

    pub fn duration(&self) -> f64 {
        self.t_stop - self.t_start
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn waveforms(&self) -> Option<&Waveforms> {
        self.waveforms.as_ref()
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn annotation(&self, key: &str) -> Option<&MetadataValue> {
        self.annotations.get(key)
    }

    /// Spikes in `[t0, t1]`, with the window as the new bounds. Waveforms of
    /// the kept spikes are kept too.
    pub fn time_slice(&self, t0: f64, t1: f64) -> Result<SpikeTrain, ModelError> {
        if t1 < t0 {
            return Err(ModelError::InvalidWindow {
                t_start: t0,
                t_stop: t1,
            });
        }
        let first = self.times.partition_point(|&t| t < t0);
        let last = self.times.partition_point(|&t| t <= t1);
        let waveforms = self.waveforms.as_ref().map(|w| Waveforms {
            data: w
                .data
                .slice(ndarray::s![first..last, .., ..])
                .to_owned(),
            units: w.units,
            sampling_rate: w.sampling_rate,
        });
        Ok(SpikeTrain {
            times: self.times[first..last].to_vec(),
            t_start: t0,
            t_stop: t1,
            name: self.name.clone(),
            description: self.description.clone(),
            waveforms,
            annotations: self.annotations.clone(),
        })
    }

    /// Copy with every time (bounds included) moved by `-offset`.
    pub fn shifted(&self, offset: f64) -> SpikeTrain {
        SpikeTrain {
            times: self.times.iter().map(|t| t - offset).collect(),
            t_start: self.t_start - offset,
            t_stop: self.t_stop - offset,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Epoch – labelled intervals or events
// ---------------------------------------------------------------------------

/// Start times (s) with optional durations (s) and labels, all equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct Epoch {
    name: String,
    times: Vec<f64>,
    durations: Option<Vec<f64>>,
    labels: Option<Vec<MetadataValue>>,
    annotations: Annotations,
}

impl Epoch {
    pub fn build(
        name: impl Into<String>,
        times: Vec<f64>,
        durations: Option<Vec<f64>>,
        labels: Option<Vec<MetadataValue>>,
    ) -> Result<Self, ModelError> {
        if let Some(d) = &durations {
            if d.len() != times.len() {
                return Err(ModelError::LengthMismatch {
                    what: "durations",
                    expected: times.len(),
                    found: d.len(),
                });
            }
        }
        if let Some(l) = &labels {
            if l.len() != times.len() {
                return Err(ModelError::LengthMismatch {
                    what: "labels",
                    expected: times.len(),
                    found: l.len(),
                });
            }
        }
        Ok(Epoch {
            name: name.into(),
            times,
            durations,
            labels,
            annotations: Annotations::new(),
        })
    }

    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations.extend(annotations);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn durations(&self) -> Option<&[f64]> {
        self.durations.as_deref()
    }

    pub fn labels(&self) -> Option<&[MetadataValue]> {
        self.labels.as_deref()
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// `(time, duration, label)` per entry.
    pub fn iter(&self) -> impl Iterator<Item = (f64, Option<f64>, Option<&MetadataValue>)> + '_ {
        self.times.iter().enumerate().map(move |(i, &t)| {
            (
                t,
                self.durations.as_ref().map(|d| d[i]),
                self.labels.as_ref().map(|l| &l[i]),
            )
        })
    }

    /// Sorted distinct labels; empty when the epoch carries none.
    pub fn unique_labels(&self) -> Vec<MetadataValue> {
        self.labels
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Start times of the entries carrying `label`.
    pub fn times_with_label(&self, label: &MetadataValue) -> Vec<f64> {
        self.iter()
            .filter(|(_, _, l)| *l == Some(label))
            .map(|(t, _, _)| t)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_spike_train_build() {
        let st = SpikeTrain::build(vec![0.1, 0.2, 0.2, 0.9], 0.0, 1.0).unwrap();
        assert_eq!(st.len(), 4);

        assert_eq!(
            SpikeTrain::build(vec![0.5, 0.1], 0.0, 1.0),
            Err(ModelError::UnsortedTimes { prev: 0.5, next: 0.1 })
        );
        assert_eq!(
            SpikeTrain::build(vec![0.5, 1.5], 0.0, 1.0),
            Err(ModelError::TimeOutOfRange {
                time: 1.5,
                t_start: 0.0,
                t_stop: 1.0
            })
        );
        assert_eq!(
            SpikeTrain::build(vec![f64::NAN], 0.0, 1.0),
            Err(ModelError::NonFiniteTimes)
        );
    }

    #[test]
    fn time_slice_keeps_matching_waveforms() {
        let waveforms = Waveforms {
            data: Array3::from_shape_fn((4, 2, 3), |(s, _, _)| s as f64),
            units: Unit::MICROVOLT,
            sampling_rate: 30000.0,
        };
        let st = SpikeTrain::build(vec![0.1, 0.4, 0.6, 0.9], 0.0, 1.0)
            .unwrap()
            .with_waveforms(waveforms)
            .unwrap();
        let sliced = st.time_slice(0.3, 0.6).unwrap();
        assert_eq!(sliced.times(), &[0.4, 0.6]);
        assert_eq!((sliced.t_start(), sliced.t_stop()), (0.3, 0.6));
        let w = sliced.waveforms().unwrap();
        assert_eq!(w.data.shape(), &[2, 2, 3]);
        assert_eq!(w.data[[0, 0, 0]], 1.0);

        let shifted = sliced.shifted(0.3);
        assert!((shifted.times()[0] - 0.1).abs() < 1e-12);
        assert!(shifted.t_start().abs() < 1e-12);
    }

    #[test]
    fn waveforms_must_match_spike_count() {
        let waveforms = Waveforms {
            data: Array3::zeros((3, 1, 8)),
            units: Unit::MICROVOLT,
            sampling_rate: 30000.0,
        };
        let err = SpikeTrain::build(vec![0.1], 0.0, 1.0)
            .unwrap()
            .with_waveforms(waveforms)
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::LengthMismatch {
                what: "waveforms",
                expected: 1,
                found: 3
            }
        );
    }

    #[test]
    fn epoch_requires_equal_lengths() {
        let err = Epoch::build("stim", vec![0.0, 1.0], Some(vec![0.5]), None).unwrap_err();
        assert!(matches!(err, ModelError::LengthMismatch { what: "durations", .. }));

        let labels = vec![MetadataValue::from("a")];
        let err = Epoch::build("stim", vec![0.0, 1.0], None, Some(labels)).unwrap_err();
        assert!(matches!(err, ModelError::LengthMismatch { what: "labels", .. }));
    }

    #[test]
    fn epoch_unique_labels_are_sorted() {
        let labels = vec![
            MetadataValue::from(90.0),
            MetadataValue::from(0.0),
            MetadataValue::from(90.0),
        ];
        let epoch = Epoch::build("stim", vec![0.0, 1.0, 2.0], None, Some(labels)).unwrap();
        assert_eq!(
            epoch.unique_labels(),
            vec![MetadataValue::from(0.0), MetadataValue::from(90.0)]
        );
        assert_eq!(epoch.times_with_label(&MetadataValue::from(90.0)), vec![0.0, 2.0]);
    }

    #[test]
    fn rescale_is_idempotent() {
        let signal = AnalogSignal::new(
            array![[1000.0, -500.0], [250.0, 0.0]],
            Unit::MICROVOLT,
            1000.0,
            0.0,
            0.002,
            vec![0, 1],
        )
        .unwrap();
        let once = signal.rescale(Unit::MILLIVOLT).unwrap();
        let twice = once.rescale(Unit::MILLIVOLT).unwrap();
        assert_eq!(once, twice);
        assert!((once.data()[[0, 0]] - 1.0).abs() < 1e-12);
        assert_eq!(once.units(), Unit::MILLIVOLT);
    }

    #[test]
    fn yaml_quantities_become_quantity_values() {
        let yaml: YamlValue = serde_yaml::from_str("{value: 90.0, unit: deg}").unwrap();
        let value = MetadataValue::from_yaml(&yaml);
        assert_eq!(value, MetadataValue::Quantity(90.0, "deg".to_string()));
        assert_eq!(MetadataValue::from_yaml(&value.to_yaml()), value);

        let q = value.as_quantity(Unit::RADIAN).unwrap().unwrap();
        assert_eq!(q.unit, Unit::DEGREE);
    }
}
