//! Figure rendering onto caller-supplied plotters drawing areas.
//!
//! Every function takes a `&DrawingArea<DB, Shift>` so the same figure can be
//! drawn to any backend; filling the background and presenting the result is
//! the caller's business.

pub mod isi;
pub mod lineplot;
pub mod psth;
pub mod raster;
pub mod tuning;

use std::ops::Range;

use plotters::prelude::*;

pub use isi::{isi_distribution, IsiOptions};
pub use lineplot::{draw_lineplot, plot_lfp, plot_waveforms, LineplotOptions};
pub use psth::{plot_psth, PsthOptions};
pub use raster::{orient_raster_plots, plot_raster, spike_raster};
pub use tuning::{polar_tuning_curve, tuning_curve, tuning_overview, TuningOverviewOptions};

pub(crate) const FONT: &str = "sans-serif";
pub(crate) const CAPTION_SIZE: u32 = 18;
pub(crate) const LABEL_AREA: i32 = 40;

/// `(bin_start, count)` for equal-width bins covering `[min, max]`. Values
/// outside the range are dropped; `max` itself lands in the last bin.
pub(crate) fn histogram_counts(values: &[f64], min: f64, max: f64, bin_width: f64) -> Vec<(f64, usize)> {
    if !(bin_width > 0.0) || !(max > min) {
        return Vec::new();
    }
    let bins = ((max - min) / bin_width).ceil().max(1.0) as usize;
    let mut counts = vec![0usize; bins];
    for &value in values {
        if value < min || value > max {
            continue;
        }
        let idx = (((value - min) / bin_width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, c)| (min + i as f64 * bin_width, c))
        .collect()
}

/// Range spanning `values` with a relative margin; falls back to `0..1` when
/// there is nothing finite to span.
pub(crate) fn padded_range(values: impl IntoIterator<Item = f64>, margin: f64) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return 0.0..1.0;
    }
    if hi > lo {
        let span = hi - lo;
        (lo - margin * span)..(hi + margin * span)
    } else {
        let half = 0.5 * lo.abs().max(1.0);
        (lo - half)..(hi + half)
    }
}

/// Vertical marker line across a y range.
pub(crate) fn vline<S: Into<ShapeStyle>>(x: f64, y: &Range<f64>, style: S) -> PathElement<(f64, f64)> {
    PathElement::new(vec![(x, y.start), (x, y.end)], style)
}

/// Label for a row at integer `y`, empty between rows.
pub(crate) fn row_label(labels: &[String], y: f64) -> String {
    let row = y.round();
    if (y - row).abs() > 1e-6 || row < 0.0 {
        return String::new();
    }
    labels.get(row as usize).cloned().unwrap_or_default()
}
