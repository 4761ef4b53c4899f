use super::statistics::mean_firing_rate;
use super::AnalysisError;
use crate::data::model::{Epoch, MetadataValue, SpikeTrain};
use crate::units::Unit;

/// Annotation carrying the stimulus orientation of a trial.
pub const ORIENT: &str = "orient";

const ANGLE_TOLERANCE: f64 = 1e-9;

/// Cut one trial per stimulus presentation.
///
/// Each trial covers `[onset, onset + duration]` and is re-referenced so the
/// onset is at 0. The presentation label is stored as the `orient`
/// annotation and its index as `trial`.
pub fn make_stimulus_trials(
    train: &SpikeTrain,
    epoch: &Epoch,
) -> Result<Vec<SpikeTrain>, AnalysisError> {
    let durations = epoch
        .durations()
        .ok_or_else(|| AnalysisError::MissingDurations(epoch.name().to_string()))?;

    let mut trials = Vec::with_capacity(epoch.len());
    for (i, ((onset, _, label), &duration)) in epoch.iter().zip(durations).enumerate() {
        let mut trial = train
            .time_slice(onset, onset + duration)?
            .shifted(onset)
            .with_annotation("trial", i as i64);
        if let Some(label) = label {
            trial = trial.with_annotation(ORIENT, label.clone());
        }
        trials.push(trial);
    }
    Ok(trials)
}

// ---------------------------------------------------------------------------
// OrientationTrials
// ---------------------------------------------------------------------------

/// Trials grouped by orientation (deg), in ascending order. Trials whose
/// orientation is NaN (blank screen) are kept apart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrientationTrials {
    groups: Vec<(f64, Vec<SpikeTrain>)>,
    blank: Vec<SpikeTrain>,
}

impl OrientationTrials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trial under `orientation` (deg).
    pub fn insert(&mut self, orientation: f64, trial: SpikeTrain) {
        if orientation.is_nan() {
            self.blank.push(trial);
            return;
        }
        match self
            .groups
            .iter_mut()
            .find(|(o, _)| (*o - orientation).abs() < ANGLE_TOLERANCE)
        {
            Some((_, trials)) => trials.push(trial),
            None => {
                let at = self.groups.partition_point(|(o, _)| *o < orientation);
                self.groups.insert(at, (orientation, vec![trial]));
            }
        }
    }

    pub fn orientations(&self) -> Vec<f64> {
        self.groups.iter().map(|(o, _)| *o).collect()
    }

    pub fn get(&self, orientation: f64) -> Option<&[SpikeTrain]> {
        self.groups
            .iter()
            .find(|(o, _)| (*o - orientation).abs() < ANGLE_TOLERANCE)
            .map(|(_, trials)| trials.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &[SpikeTrain])> {
        self.groups.iter().map(|(o, trials)| (*o, trials.as_slice()))
    }

    /// Number of distinct orientations.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn blank(&self) -> &[SpikeTrain] {
        &self.blank
    }
}

/// Orientation of a trial in degrees, from its `orient` annotation. Bare
/// numbers are degrees; quantities are rescaled.
fn orientation_of(trial: &SpikeTrain) -> Result<f64, AnalysisError> {
    let value = trial
        .annotation(ORIENT)
        .ok_or_else(|| AnalysisError::MissingOrientation(trial.name().to_string()))?;
    let invalid = || AnalysisError::InvalidOrientation(trial.name().to_string());
    match value {
        MetadataValue::String(s) => s.trim().parse::<f64>().map_err(|_| invalid()),
        other => {
            let quantity = other.as_quantity(Unit::DEGREE).ok_or_else(invalid)??;
            quantity.value_in(Unit::DEGREE).map_err(|_| invalid())
        }
    }
}

/// Group trials by their `orient` annotation.
pub fn make_orientation_trials(trials: &[SpikeTrain]) -> Result<OrientationTrials, AnalysisError> {
    let mut grouped = OrientationTrials::new();
    for trial in trials {
        grouped.insert(orientation_of(trial)?, trial.clone());
    }
    log::debug!(
        "grouped {} trials into {} orientations ({} blank)",
        trials.len(),
        grouped.len(),
        grouped.blank().len()
    );
    Ok(grouped)
}

/// Mean firing rate over the blank trials, if there are any.
pub fn spontaneous_rate(trials: &OrientationTrials) -> Result<Option<f64>, AnalysisError> {
    if trials.blank().is_empty() {
        return Ok(None);
    }
    let rates = trials
        .blank()
        .iter()
        .map(mean_firing_rate)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(rates.iter().sum::<f64>() / rates.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(orient: MetadataValue, n_spikes: usize) -> SpikeTrain {
        let times = (0..n_spikes).map(|i| i as f64 * 0.01).collect();
        SpikeTrain::build(times, 0.0, 1.0)
            .unwrap()
            .with_annotation(ORIENT, orient)
    }

    #[test]
    fn groups_sorted_by_angle_and_rescaled() {
        let trials = vec![
            trial(MetadataValue::from(90.0), 1),
            trial(MetadataValue::Quantity(std::f64::consts::PI, "rad".to_string()), 2),
            trial(MetadataValue::from(0.0), 3),
            trial(MetadataValue::Integer(90), 4),
            trial(MetadataValue::from(f64::NAN), 5),
        ];
        let grouped = make_orientation_trials(&trials).unwrap();
        assert_eq!(grouped.len(), 3);
        let orientations = grouped.orientations();
        assert_eq!(orientations[0], 0.0);
        assert_eq!(orientations[1], 90.0);
        assert!((orientations[2] - 180.0).abs() < 1e-9);
        assert_eq!(grouped.get(90.0).unwrap().len(), 2);
        assert_eq!(grouped.blank().len(), 1);
        assert_eq!(spontaneous_rate(&grouped).unwrap(), Some(5.0));
    }

    #[test]
    fn missing_orientation_is_an_error() {
        let st = SpikeTrain::build(vec![], 0.0, 1.0).unwrap().with_name("u1");
        assert_eq!(
            make_orientation_trials(&[st]),
            Err(AnalysisError::MissingOrientation("u1".to_string()))
        );
    }

    #[test]
    fn stimulus_trials_are_onset_relative() {
        let st = SpikeTrain::build(vec![0.5, 1.1, 1.2, 2.6, 3.9], 0.0, 5.0).unwrap();
        let epoch = Epoch::build(
            "grating",
            vec![1.0, 2.5],
            Some(vec![1.0, 1.0]),
            Some(vec![
                MetadataValue::Quantity(0.0, "deg".to_string()),
                MetadataValue::Quantity(90.0, "deg".to_string()),
            ]),
        )
        .unwrap();
        let trials = make_stimulus_trials(&st, &epoch).unwrap();
        assert_eq!(trials.len(), 2);
        assert_eq!(trials[0].len(), 2);
        assert!((trials[0].times()[0] - 0.1).abs() < 1e-12);
        assert!(trials[1].t_start().abs() < 1e-12);
        assert!((trials[1].t_stop() - 1.0).abs() < 1e-12);
        assert_eq!(trials[1].annotation("trial"), Some(&MetadataValue::Integer(1)));

        let grouped = make_orientation_trials(&trials).unwrap();
        assert_eq!(grouped.orientations(), vec![0.0, 90.0]);
    }

    #[test]
    fn stimulus_trials_need_durations() {
        let st = SpikeTrain::build(vec![], 0.0, 5.0).unwrap();
        let epoch = Epoch::build("onsets", vec![1.0], None, None).unwrap();
        assert_eq!(
            make_stimulus_trials(&st, &epoch),
            Err(AnalysisError::MissingDurations("onsets".to_string()))
        );
    }
}
