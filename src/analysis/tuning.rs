use serde::{Deserialize, Serialize};

use super::statistics::mean_firing_rate;
use super::trials::OrientationTrials;
use super::AnalysisError;

const ANGLE_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Tuning curve
// ---------------------------------------------------------------------------

/// Blend of the per-orientation mean and median trial rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub mean: f64,
    pub median: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            mean: 1.0,
            median: 0.6,
        }
    }
}

impl Weights {
    fn validate(&self) -> Result<(), AnalysisError> {
        let ok = self.mean >= 0.0 && self.median >= 0.0 && self.mean + self.median > 0.0;
        if ok {
            Ok(())
        } else {
            Err(AnalysisError::InvalidWeights)
        }
    }
}

/// Firing rate (Hz) per orientation (deg), orientations ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningCurve {
    rates: Vec<f64>,
    orientations: Vec<f64>,
}

impl TuningCurve {
    pub fn new(rates: Vec<f64>, orientations: Vec<f64>) -> Result<Self, AnalysisError> {
        if rates.len() != orientations.len() {
            return Err(AnalysisError::LengthMismatch {
                rates: rates.len(),
                orientations: orientations.len(),
            });
        }
        if rates.is_empty() {
            return Err(AnalysisError::NoTrials);
        }
        Ok(Self {
            rates,
            orientations,
        })
    }

    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    pub fn orientations(&self) -> &[f64] {
        &self.orientations
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Index of the highest rate; the first one wins ties.
    pub fn preferred_index(&self) -> usize {
        let mut best = 0;
        for (i, &r) in self.rates.iter().enumerate() {
            if r > self.rates[best] {
                best = i;
            }
        }
        best
    }

    pub fn preferred_orientation(&self) -> f64 {
        self.orientations[self.preferred_index()]
    }

    pub fn max_rate(&self) -> f64 {
        self.rates[self.preferred_index()]
    }

    /// Whether the curve spans directions (0-360) rather than orientations
    /// (0-180).
    pub fn spans_directions(&self) -> bool {
        self.orientations.iter().any(|&o| o >= 180.0)
    }

    fn period(&self) -> f64 {
        if self.spans_directions() {
            360.0
        } else {
            180.0
        }
    }

    /// Rate at `angle` (deg), wrapped onto the curve's period.
    pub fn rate_at(&self, angle: f64) -> Option<f64> {
        let period = self.period();
        let wrapped = angle.rem_euclid(period);
        self.orientations
            .iter()
            .position(|&o| {
                let d = (o.rem_euclid(period) - wrapped).abs();
                d < ANGLE_TOLERANCE || (period - d) < ANGLE_TOLERANCE
            })
            .map(|i| self.rates[i])
    }

    fn require_rate_at(&self, angle: f64) -> Result<f64, AnalysisError> {
        self.rate_at(angle)
            .ok_or(AnalysisError::MissingAngle(angle.rem_euclid(self.period())))
    }

    /// Curve with `background` subtracted from every rate.
    pub fn without_background(&self, background: f64) -> TuningCurve {
        TuningCurve {
            rates: self.rates.iter().map(|r| r - background).collect(),
            orientations: self.orientations.clone(),
        }
    }
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

/// Rate per orientation from grouped trials.
///
/// Without weights the rate is the plain mean over trials. With weights it is
/// `(w_mean * mean + w_median * median) / (w_mean + w_median)`.
pub fn compute_orientation_tuning(
    trials: &OrientationTrials,
    weights: Option<Weights>,
) -> Result<TuningCurve, AnalysisError> {
    if trials.is_empty() {
        return Err(AnalysisError::NoTrials);
    }
    if let Some(w) = &weights {
        w.validate()?;
    }

    let mut rates = Vec::with_capacity(trials.len());
    let mut orientations = Vec::with_capacity(trials.len());
    for (orientation, group) in trials.iter() {
        let mut trial_rates = group
            .iter()
            .map(mean_firing_rate)
            .collect::<Result<Vec<_>, _>>()?;
        let mean = trial_rates.iter().sum::<f64>() / trial_rates.len() as f64;
        let rate = match weights {
            None => mean,
            Some(w) => {
                let median = median(&mut trial_rates);
                (w.mean * mean + w.median * median) / (w.mean + w.median)
            }
        };
        rates.push(rate);
        orientations.push(orientation);
    }
    TuningCurve::new(rates, orientations)
}

// ---------------------------------------------------------------------------
// Selectivity indices
// ---------------------------------------------------------------------------

/// Variants of the orientation selectivity index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsiOptions {
    /// Pool both directions of each axis (`R(θ) + R(θ+180)`).
    pub normalise: bool,
    /// Divide by the preferred response only.
    pub relative: bool,
}

/// Orientation selectivity index.
///
/// `(Rp - Ro) / (Rp + Ro)` with `Rp` the preferred rate and `Ro` the rate 90
/// deg away; `(Rp - Ro) / Rp` when `relative`. A zero denominator yields NaN.
pub fn compute_osi(curve: &TuningCurve, options: OsiOptions) -> Result<f64, AnalysisError> {
    let pref = curve.preferred_orientation();
    let axis = |angle: f64| -> Result<f64, AnalysisError> {
        let rate = curve.require_rate_at(angle)?;
        if options.normalise {
            Ok(rate + curve.require_rate_at(angle + 180.0)?)
        } else {
            Ok(rate)
        }
    };
    let r_pref = axis(pref)?;
    let r_orth = axis(pref + 90.0)?;
    let index = if options.relative {
        (r_pref - r_orth) / r_pref
    } else {
        (r_pref - r_orth) / (r_pref + r_orth)
    };
    Ok(index)
}

/// Direction selectivity index, `(Rp - Rn) / (Rp + Rn)` with `Rn` the rate
/// opposite the preferred direction. Needs a curve spanning 0-360.
pub fn compute_dsi(curve: &TuningCurve) -> Result<f64, AnalysisError> {
    let pref = curve.preferred_orientation();
    if !curve.spans_directions() {
        return Err(AnalysisError::MissingAngle(pref + 180.0));
    }
    let r_pref = curve.max_rate();
    let r_null = curve.require_rate_at(pref + 180.0)?;
    Ok((r_pref - r_null) / (r_pref + r_null))
}

/// Circular variance on the doubled angle, `1 - |Σ R e^{2iθ}| / Σ R`.
/// 0 for a perfectly selective cell, 1 for a flat curve.
pub fn compute_circular_variance(curve: &TuningCurve) -> f64 {
    let (mut re, mut im, mut total) = (0.0, 0.0, 0.0);
    for (&r, &o) in curve.rates().iter().zip(curve.orientations()) {
        let theta = 2.0 * o.to_radians();
        re += r * theta.cos();
        im += r * theta.sin();
        total += r;
    }
    1.0 - re.hypot(im) / total
}

/// The indices shown in a tuning overview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningIndices {
    pub preferred_orientation: f64,
    pub osi: f64,
    /// OSI with the alternate options, when requested.
    pub secondary_osi: Option<f64>,
    /// Absent when the curve only spans orientations.
    pub dsi: Option<f64>,
    pub circular_variance: f64,
}

impl TuningIndices {
    pub fn compute(
        curve: &TuningCurve,
        osi: OsiOptions,
        secondary: Option<OsiOptions>,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            preferred_orientation: curve.preferred_orientation(),
            osi: compute_osi(curve, osi)?,
            secondary_osi: secondary.map(|o| compute_osi(curve, o)).transpose()?,
            dsi: compute_dsi(curve).ok(),
            circular_variance: compute_circular_variance(curve),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::trials::make_orientation_trials;
    use crate::analysis::ORIENT;
    use crate::data::model::SpikeTrain;

    fn curve(rates: &[f64], orientations: &[f64]) -> TuningCurve {
        TuningCurve::new(rates.to_vec(), orientations.to_vec()).unwrap()
    }

    fn trial(orient: f64, n_spikes: usize) -> SpikeTrain {
        let times = (0..n_spikes).map(|i| i as f64 / (n_spikes as f64 + 1.0)).collect();
        SpikeTrain::build(times, 0.0, 1.0)
            .unwrap()
            .with_annotation(ORIENT, orient)
    }

    #[test]
    fn preferred_orientation_of_four_directions() {
        let c = curve(&[2.0, 10.0, 4.0, 1.0], &[0.0, 90.0, 180.0, 270.0]);
        assert_eq!(c.preferred_orientation(), 90.0);
        // orthogonal to 90 is 180
        let osi = compute_osi(&c, OsiOptions::default()).unwrap();
        assert!((osi - 6.0 / 14.0).abs() < 1e-12);
        let dsi = compute_dsi(&c).unwrap();
        assert!((dsi - 9.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn first_maximum_wins_ties() {
        let c = curve(&[5.0, 5.0, 1.0], &[0.0, 45.0, 90.0]);
        assert_eq!(c.preferred_orientation(), 0.0);
    }

    #[test]
    fn osi_variants() {
        let c = curve(&[8.0, 2.0, 4.0, 2.0], &[0.0, 90.0, 180.0, 270.0]);
        let relative = compute_osi(
            &c,
            OsiOptions {
                normalise: false,
                relative: true,
            },
        )
        .unwrap();
        assert!((relative - 0.75).abs() < 1e-12);

        let normalised = compute_osi(
            &c,
            OsiOptions {
                normalise: true,
                relative: false,
            },
        )
        .unwrap();
        assert!((normalised - (12.0 - 4.0) / 16.0).abs() < 1e-12);
    }

    #[test]
    fn orientation_only_curve_wraps_at_180() {
        let c = curve(&[1.0, 3.0, 9.0, 3.0], &[0.0, 45.0, 90.0, 135.0]);
        // orthogonal to 90 is 180, which wraps to 0
        let osi = compute_osi(&c, OsiOptions::default()).unwrap();
        assert!((osi - 0.8).abs() < 1e-12);
        assert!(compute_dsi(&c).is_err());

        let indices = TuningIndices::compute(&c, OsiOptions::default(), None).unwrap();
        assert_eq!(indices.dsi, None);
        assert_eq!(indices.preferred_orientation, 90.0);
    }

    #[test]
    fn missing_orthogonal_angle_is_an_error() {
        let c = curve(&[1.0, 9.0], &[0.0, 45.0]);
        assert_eq!(
            compute_osi(&c, OsiOptions::default()),
            Err(AnalysisError::MissingAngle(135.0))
        );
    }

    #[test]
    fn circular_variance_bounds() {
        let flat = curve(&[3.0; 4], &[0.0, 45.0, 90.0, 135.0]);
        assert!((compute_circular_variance(&flat) - 1.0).abs() < 1e-12);
        let sharp = curve(&[0.0, 0.0, 7.0, 0.0], &[0.0, 45.0, 90.0, 135.0]);
        assert!(compute_circular_variance(&sharp).abs() < 1e-12);
    }

    #[test]
    fn tuning_from_trials() {
        let trials = vec![
            trial(0.0, 1),
            trial(0.0, 3),
            trial(90.0, 10),
            trial(90.0, 12),
            trial(90.0, 20),
        ];
        let grouped = make_orientation_trials(&trials).unwrap();

        let plain = compute_orientation_tuning(&grouped, None).unwrap();
        assert_eq!(plain.orientations(), &[0.0, 90.0]);
        assert_eq!(plain.rates(), &[2.0, 14.0]);

        let weighted = compute_orientation_tuning(
            &grouped,
            Some(Weights {
                mean: 1.0,
                median: 1.0,
            }),
        )
        .unwrap();
        assert!((weighted.rates()[1] - 13.0).abs() < 1e-12);

        assert_eq!(
            compute_orientation_tuning(
                &grouped,
                Some(Weights {
                    mean: 0.0,
                    median: 0.0
                })
            ),
            Err(AnalysisError::InvalidWeights)
        );
    }
}
