use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};

use super::{histogram_counts, CAPTION_SIZE, FONT, LABEL_AREA};
use crate::analysis::{gaussian_kde, pooled_isi, MIN_ISI_SPIKES};
use crate::color::TRACE_BLUE;
use crate::data::model::SpikeTrain;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsiOptions {
    pub bins: usize,
    /// Upper edge of the histogram (s); the longest interval when unset.
    pub max_isi: Option<f64>,
    /// Trains with fewer spikes are skipped.
    pub min_spikes: usize,
    pub kde: bool,
}

impl Default for IsiOptions {
    fn default() -> Self {
        Self {
            bins: 50,
            max_isi: None,
            min_spikes: MIN_ISI_SPIKES,
            kde: true,
        }
    }
}

/// Density histogram of the pooled inter-spike intervals, with a Gaussian
/// KDE on top.
pub fn isi_distribution<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    trains: &[SpikeTrain],
    options: &IsiOptions,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let intervals = pooled_isi(trains, options.min_spikes);
    if intervals.is_empty() {
        log::warn!(
            "no spike train with at least {} spikes; ISI distribution left empty",
            options.min_spikes
        );
        area.titled("ISI distribution (no data)", (FONT, CAPTION_SIZE))?;
        return Ok(());
    }

    let longest = intervals.iter().copied().fold(0.0, f64::max);
    let max = options.max_isi.unwrap_or(longest).max(f64::EPSILON);
    let bin_width = max / options.bins.max(1) as f64;
    let counts = histogram_counts(&intervals, 0.0, max, bin_width);
    let norm = 1.0 / (intervals.len() as f64 * bin_width);

    let grid: Vec<f64> = (0..=200).map(|i| max * i as f64 / 200.0).collect();
    let density = if options.kde {
        gaussian_kde(&intervals, &grid)
    } else {
        Vec::new()
    };

    let y_max = counts
        .iter()
        .map(|&(_, c)| c as f64 * norm)
        .chain(density.iter().copied())
        .fold(0.0, f64::max)
        .max(f64::EPSILON)
        * 1.1;

    let mut chart = ChartBuilder::on(area)
        .caption(
            format!("ISI distribution (n = {})", intervals.len()),
            (FONT, CAPTION_SIZE),
        )
        .margin(10)
        .x_label_area_size(LABEL_AREA)
        .y_label_area_size(LABEL_AREA + 20)
        .build_cartesian_2d(0.0..max, 0.0..y_max)?;

    chart
        .configure_mesh()
        .x_desc("ISI (s)")
        .y_desc("density")
        .draw()?;

    chart.draw_series(counts.iter().map(|&(start, count)| {
        Rectangle::new(
            [(start, 0.0), (start + bin_width, count as f64 * norm)],
            TRACE_BLUE.mix(0.5).filled(),
        )
    }))?;

    if !density.is_empty() {
        chart.draw_series(LineSeries::new(
            grid.iter().copied().zip(density.iter().copied()),
            TRACE_BLUE.stroke_width(2),
        ))?;
    }
    Ok(())
}
