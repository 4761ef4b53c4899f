use std::ops::Range;

use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;

use super::{padded_range, row_label, vline, CAPTION_SIZE, FONT, LABEL_AREA};
use crate::analysis::make_orientation_trials;
use crate::color::{ColorMap, TRACE_BLUE};
use crate::data::filter::{unique_values, CLUSTER_GROUP};
use crate::data::model::{Epoch, SpikeTrain};

const TICK_HALF_HEIGHT: f64 = 0.4;

/// One vertical tick per spike, centred on `row`.
fn spike_ticks(times: &[f64], row: f64, color: RGBColor) -> impl Iterator<Item = PathElement<(f64, f64)>> + '_ {
    times.iter().map(move |&t| {
        PathElement::new(
            vec![(t, row - TICK_HALF_HEIGHT), (t, row + TICK_HALF_HEIGHT)],
            color,
        )
    })
}

fn trial_raster<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    trials: &[SpikeTrain],
    title: &str,
    onset_marker: bool,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let x_range = padded_range(
        trials.iter().flat_map(|t| [t.t_start(), t.t_stop()]),
        0.0,
    );
    let y_range = -0.5..(trials.len().max(1) as f64 - 0.5);

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, CAPTION_SIZE))
        .margin(5)
        .x_label_area_size(LABEL_AREA)
        .y_label_area_size(LABEL_AREA)
        .build_cartesian_2d(x_range, y_range.clone())?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("t (s)")
        .y_desc("trial #")
        .draw()?;

    for (row, trial) in trials.iter().enumerate() {
        chart.draw_series(spike_ticks(trial.times(), row as f64, TRACE_BLUE))?;
    }
    if onset_marker {
        chart.draw_series(std::iter::once(vline(0.0, &y_range, RED)))?;
    }
    Ok(())
}

/// Raster of trials, one per row.
pub fn plot_raster<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    trials: &[SpikeTrain],
    title: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    trial_raster(area, trials, title, false)
}

/// Grid of trial rasters, two per row, one per orientation, with the
/// stimulus onset marked.
pub fn orient_raster_plots<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    trials: &[SpikeTrain],
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    const COLUMNS: usize = 2;
    let grouped = make_orientation_trials(trials)?;
    if grouped.is_empty() {
        anyhow::bail!("no oriented trials to plot");
    }
    let rows = grouped.len().div_ceil(COLUMNS);
    let cells = area.split_evenly((rows, COLUMNS));
    for ((orientation, group), cell) in grouped.iter().zip(cells.iter()) {
        trial_raster(cell, group, &format!("{orientation} deg"), true)?;
    }
    Ok(())
}

/// Raster of whole spike trains over `window` (s), one unit per row.
///
/// Rows are coloured by curation label when every train carries one. With an
/// epoch, stimulus onsets are marked green and offsets red.
pub fn spike_raster<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    trains: &[SpikeTrain],
    window: Range<f64>,
    epoch: Option<&Epoch>,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    if !(window.end > window.start) {
        anyhow::bail!("empty raster window {}..{}", window.start, window.end);
    }
    let labels: Vec<String> = trains
        .iter()
        .map(|st| format!("{} ({})", st.name(), st.description()))
        .collect();
    let curated = !trains.is_empty() && trains.iter().all(|st| st.annotation(CLUSTER_GROUP).is_some());
    let color_map = curated.then(|| ColorMap::new(CLUSTER_GROUP, &unique_values(trains, CLUSTER_GROUP)));

    let y_range = -0.5..(trains.len().max(1) as f64 - 0.5);
    let mut chart = ChartBuilder::on(area)
        .caption("Spike Raster", (FONT, CAPTION_SIZE))
        .margin(10)
        .x_label_area_size(LABEL_AREA)
        .y_label_area_size(LABEL_AREA * 3)
        .build_cartesian_2d(window.clone(), y_range.clone())?;

    let label_fmt = |y: &f64| row_label(&labels, *y);
    chart
        .configure_mesh()
        .disable_mesh()
        .y_labels(trains.len().max(1) + 1)
        .y_label_formatter(&label_fmt)
        .x_desc("t (s)")
        .y_desc("unit id")
        .draw()?;

    for (row, st) in trains.iter().enumerate() {
        let color = match (&color_map, st.annotation(CLUSTER_GROUP)) {
            (Some(map), Some(value)) => map.color_for(value),
            _ => TRACE_BLUE,
        };
        let times = st.time_slice(window.start, window.end)?;
        chart.draw_series(spike_ticks(times.times(), row as f64, color))?;
    }

    if let Some(epoch) = epoch {
        let in_window = |t: &f64| window.contains(t);
        chart.draw_series(
            epoch
                .times()
                .iter()
                .filter(|t| in_window(t))
                .map(|&t| vline(t, &y_range, GREEN)),
        )?;
        if let Some(durations) = epoch.durations() {
            chart.draw_series(
                epoch
                    .times()
                    .iter()
                    .zip(durations)
                    .map(|(t, d)| t + d)
                    .filter(|t| in_window(t))
                    .map(|t| vline(t, &y_range, RED)),
            )?;
        }
    }

    if let Some(map) = &color_map {
        for (label, color) in map.legend_entries() {
            chart
                .draw_series(std::iter::empty::<PathElement<(f64, f64)>>())?
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}
