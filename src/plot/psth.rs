use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};

use super::{histogram_counts, vline, CAPTION_SIZE, FONT, LABEL_AREA};
use crate::color::TRACE_BLUE;
use crate::data::model::{Epoch, SpikeTrain};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsthOptions {
    /// Window around each stimulus onset (s).
    pub lags: (f64, f64),
    pub bin_size: f64,
    /// Trials per label shown and counted.
    pub n_trials: usize,
}

impl Default for PsthOptions {
    fn default() -> Self {
        Self {
            lags: (-0.5, 1.0),
            bin_size: 0.02,
            n_trials: 10,
        }
    }
}

/// Spike times relative to each onset, for the first `n_trials` onsets.
fn aligned_trials(train: &SpikeTrain, onsets: &[f64], options: &PsthOptions) -> Result<Vec<Vec<f64>>> {
    let (lo, hi) = options.lags;
    onsets
        .iter()
        .take(options.n_trials)
        .map(|&onset| {
            let slice = train
                .time_slice(onset + lo, onset + hi)
                .with_context(|| format!("slicing trial at {onset} s"))?;
            Ok(slice.times().iter().map(|t| t - onset).collect())
        })
        .collect()
}

/// Peri-stimulus raster and histogram, one column per stimulus label.
///
/// The top row shows up to `n_trials` trials per label, the bottom row the
/// spike count per lag bin over those trials. Bottom panels share a y scale.
pub fn plot_psth<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    train: &SpikeTrain,
    epoch: &Epoch,
    options: &PsthOptions,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let (lo, hi) = options.lags;
    if !(hi > lo) || !(options.bin_size > 0.0) {
        anyhow::bail!(
            "invalid PSTH window {lo}..{hi} s with bin size {} s",
            options.bin_size
        );
    }
    let labels = epoch.unique_labels();
    if labels.is_empty() {
        anyhow::bail!("epoch '{}' has no labels to group trials by", epoch.name());
    }

    let per_label = labels
        .iter()
        .map(|label| aligned_trials(train, &epoch.times_with_label(label), options))
        .collect::<Result<Vec<_>>>()?;

    let n_bins = (((hi - lo) / options.bin_size).floor() as usize).max(1);
    let bin_width = (hi - lo) / n_bins as f64;
    let histograms: Vec<Vec<(f64, usize)>> = per_label
        .iter()
        .map(|trials| {
            let lags: Vec<f64> = trials.iter().flatten().copied().collect();
            histogram_counts(&lags, lo, hi, bin_width)
        })
        .collect();
    let count_max = histograms
        .iter()
        .flatten()
        .map(|&(_, c)| c)
        .max()
        .unwrap_or(0)
        .max(1) as f64
        * 1.1;

    let area = area.titled(
        &format!("unit {} ({})", train.name(), train.description()),
        (FONT, CAPTION_SIZE + 2),
    )?;
    let cells = area.split_evenly((2, labels.len()));
    let (top, bottom) = cells.split_at(labels.len());

    for (i, label) in labels.iter().enumerate() {
        let trials = &per_label[i];
        let raster_y = -0.5..(options.n_trials.max(1) as f64 - 0.5);
        let mut raster = ChartBuilder::on(&top[i])
            .caption(label.to_string(), (FONT, CAPTION_SIZE - 4))
            .margin(5)
            .x_label_area_size(LABEL_AREA / 2)
            .y_label_area_size(LABEL_AREA)
            .build_cartesian_2d(lo..hi, raster_y.clone())?;
        let mut mesh = raster.configure_mesh();
        mesh.disable_mesh();
        if i == 0 {
            mesh.y_desc("trial #");
        }
        mesh.draw()?;
        for (row, lags) in trials.iter().enumerate() {
            let y = row as f64;
            raster.draw_series(lags.iter().map(|&t| {
                PathElement::new(vec![(t, y - 0.4), (t, y + 0.4)], TRACE_BLUE)
            }))?;
        }
        raster.draw_series(std::iter::once(vline(0.0, &raster_y, RED)))?;

        let hist_y = 0.0..count_max;
        let mut hist = ChartBuilder::on(&bottom[i])
            .margin(5)
            .x_label_area_size(LABEL_AREA)
            .y_label_area_size(LABEL_AREA)
            .build_cartesian_2d(lo..hi, hist_y.clone())?;
        let mut mesh = hist.configure_mesh();
        mesh.disable_mesh().x_desc("lag (s)");
        if i == 0 {
            mesh.y_desc("#");
        }
        mesh.draw()?;
        hist.draw_series(histograms[i].iter().map(|&(start, count)| {
            Rectangle::new(
                [(start, 0.0), (start + bin_width, count as f64)],
                TRACE_BLUE.filled(),
            )
        }))?;
        hist.draw_series(std::iter::once(vline(0.0, &hist_y, RED)))?;
    }
    Ok(())
}
