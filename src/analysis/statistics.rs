use super::AnalysisError;
use crate::data::model::SpikeTrain;

/// Trains with fewer spikes than this are left out of ISI summaries.
pub const MIN_ISI_SPIKES: usize = 4;

/// Spike count over the train's window, in Hz.
pub fn mean_firing_rate(train: &SpikeTrain) -> Result<f64, AnalysisError> {
    let duration = train.duration();
    if duration <= 0.0 {
        return Err(AnalysisError::EmptyWindow {
            t_start: train.t_start(),
            t_stop: train.t_stop(),
        });
    }
    Ok(train.len() as f64 / duration)
}

/// Inter-spike intervals (s).
pub fn isi(train: &SpikeTrain) -> Vec<f64> {
    train.times().windows(2).map(|w| w[1] - w[0]).collect()
}

/// Intervals of every train with at least `min_spikes` spikes, pooled.
pub fn pooled_isi(trains: &[SpikeTrain], min_spikes: usize) -> Vec<f64> {
    let mut intervals = Vec::new();
    for train in trains {
        if train.len() < min_spikes {
            log::debug!(
                "skipping '{}' in ISI summary: {} spikes < {min_spikes}",
                train.name(),
                train.len()
            );
            continue;
        }
        intervals.extend(isi(train));
    }
    intervals
}

/// Gaussian kernel density estimate of `samples` evaluated on `grid`, with
/// Scott's rule for the bandwidth. Empty or degenerate input yields zeros.
pub fn gaussian_kde(samples: &[f64], grid: &[f64]) -> Vec<f64> {
    let n = samples.len();
    if n < 2 {
        return vec![0.0; grid.len()];
    }
    let mean = samples.iter().sum::<f64>() / n as f64;
    let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let bandwidth = var.sqrt() * (n as f64).powf(-0.2);
    if bandwidth <= 0.0 || !bandwidth.is_finite() {
        return vec![0.0; grid.len()];
    }
    let norm = 1.0 / (n as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    grid.iter()
        .map(|&x| {
            samples
                .iter()
                .map(|&s| (-0.5 * ((x - s) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train(times: &[f64]) -> SpikeTrain {
        SpikeTrain::build(times.to_vec(), 0.0, 2.0).unwrap()
    }

    #[test]
    fn rate_is_count_over_duration() {
        assert_eq!(mean_firing_rate(&train(&[0.1, 0.5, 1.0, 1.5])).unwrap(), 2.0);
        let empty = SpikeTrain::build(vec![], 1.0, 1.0).unwrap();
        assert!(matches!(
            mean_firing_rate(&empty),
            Err(AnalysisError::EmptyWindow { .. })
        ));
    }

    #[test]
    fn isi_of_short_trains_are_skipped() {
        let trains = vec![
            train(&[0.1, 0.3, 0.6, 1.0]),
            train(&[0.1, 0.2, 0.3]),
            train(&[]),
        ];
        let pooled = pooled_isi(&trains, MIN_ISI_SPIKES);
        assert_eq!(pooled.len(), 3);
        assert!((pooled[2] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn kde_integrates_to_about_one() {
        let samples = [0.01, 0.012, 0.02, 0.025, 0.03, 0.05];
        let grid: Vec<f64> = (0..2000).map(|i| -0.05 + i as f64 * 1e-4).collect();
        let density = gaussian_kde(&samples, &grid);
        let area: f64 = density.iter().sum::<f64>() * 1e-4;
        assert!((area - 1.0).abs() < 0.01, "area {area}");
        assert_eq!(gaussian_kde(&[0.1], &grid), vec![0.0; grid.len()]);
    }
}
