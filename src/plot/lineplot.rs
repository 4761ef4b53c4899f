use anyhow::{anyhow, Result};
use ndarray::{Array2, Axis};
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontTransform;
use serde::{Deserialize, Serialize};

use super::{row_label, CAPTION_SIZE, FONT, LABEL_AREA};
use crate::analysis::lowpass::butter_lowpass_filtfilt;
use crate::color::GREY;
use crate::data::model::{AnalogSignal, SpikeTrain};

/// Snippets drawn per channel in a waveform overlay.
const MAX_SNIPPETS: usize = 100;
/// Room right of the traces for the scale bar label, as a share of the span.
const RIGHT_PAD: f64 = 0.08;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineplotOptions {
    /// Sample spacing (ms).
    pub dt: f64,
    /// Time window shown (ms). A negative start shifts the time axis.
    pub window: (f64, f64),
    pub scaling_factor: f64,
    /// Trace amplitude mapped to one row; rounded to a power of two when unset.
    pub vlimround: Option<f64>,
    /// Legend entry for the traces.
    pub label: Option<String>,
    pub scalebar: bool,
    pub unit: String,
    pub ylabels: bool,
    pub color: (u8, u8, u8),
    /// Subtract each channel's mean.
    pub ztransform: bool,
    /// Low-pass the traces before drawing.
    pub filter: bool,
    pub filter_order: usize,
    /// Normalised cutoff (1 = Nyquist).
    pub filter_wn: f64,
}

impl Default for LineplotOptions {
    fn default() -> Self {
        Self {
            dt: 0.1,
            window: (0.0, 200.0),
            scaling_factor: 1.0,
            vlimround: None,
            label: None,
            scalebar: true,
            unit: "mV".to_string(),
            ylabels: true,
            color: (0, 0, 0),
            ztransform: true,
            filter: false,
            filter_order: 2,
            filter_wn: 0.02,
        }
    }
}

/// Nearest power of two to `v`, or 1 for values without a logarithm.
fn round_pow2(v: f64) -> f64 {
    if v > 0.0 && v.is_finite() {
        2f64.powf(v.log2().round())
    } else {
        1.0
    }
}

type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Vertical bar one row high ending at `top`, labelled `2^k unit`.
fn draw_scale_bar<DB: DrawingBackend>(
    chart: &mut Chart<'_, DB>,
    x: f64,
    label_x: f64,
    top: f64,
    vlimround: f64,
    unit: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let exponent = vlimround.log2().round() as i32;
    chart.draw_series(std::iter::once(PathElement::new(
        vec![(x, top), (x, top - 1.0)],
        BLACK.stroke_width(2),
    )))?;
    let style = (FONT, 14)
        .into_font()
        .transform(FontTransform::Rotate270)
        .color(&RED);
    chart.draw_series(std::iter::once(Text::new(
        format!("2^{exponent} {unit}"),
        (label_x, top - 0.5),
        style,
    )))?;
    Ok(())
}

/// Stacked line plot of `data` (channels x samples), channel `i` drawn at
/// height `i`. Returns the amplitude that spans one row.
pub fn draw_lineplot<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    data: &Array2<f64>,
    options: &LineplotOptions,
) -> Result<f64>
where
    DB::ErrorType: 'static,
{
    let (n_channels, n_samples) = data.dim();
    if n_channels == 0 || n_samples == 0 {
        anyhow::bail!("nothing to draw: data is {n_channels} x {n_samples}");
    }
    if !(options.dt > 0.0) {
        anyhow::bail!("sample spacing must be positive, got {}", options.dt);
    }

    let mut data = if options.filter {
        butter_lowpass_filtfilt(data, options.filter_order, options.filter_wn)?
    } else {
        data.clone()
    };
    if options.ztransform {
        for mut row in data.axis_iter_mut(Axis(0)) {
            let mean = row.mean().unwrap_or(0.0);
            row.mapv_inplace(|v| v - mean);
        }
    }

    let (t0, t1) = options.window;
    let offset = t0.min(0.0);
    let shown: Vec<(usize, f64)> = (0..n_samples)
        .map(|i| (i, i as f64 * options.dt + offset))
        .filter(|&(_, t)| t >= t0 && t <= t1)
        .collect();
    let (Some(&(_, first)), Some(&(_, last))) = (shown.first(), shown.last()) else {
        anyhow::bail!("no samples inside the window {t0}..{t1} ms");
    };

    let vlim = shown
        .iter()
        .flat_map(|&(i, _)| data.column(i).to_vec())
        .fold(0.0, |m: f64, v| m.max(v.abs()));
    let vlimround = options
        .vlimround
        .unwrap_or_else(|| round_pow2(vlim) / options.scaling_factor);

    let span = (last - first).max(options.dt);
    let x_range = first..(first + span * (1.0 + RIGHT_PAD));
    let y_range = -1.0..n_channels as f64;

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(LABEL_AREA)
        .y_label_area_size(LABEL_AREA + 10)
        .build_cartesian_2d(x_range, y_range)?;

    let labels: Vec<String> = if options.ylabels {
        (1..=n_channels).map(|i| format!("ch. {i}")).collect()
    } else {
        Vec::new()
    };
    let label_fmt = |y: &f64| row_label(&labels, *y);
    chart
        .configure_mesh()
        .disable_mesh()
        .y_labels(n_channels + 2)
        .y_label_formatter(&label_fmt)
        .x_desc("time (ms)")
        .draw()?;

    let color = RGBColor(options.color.0, options.color.1, options.color.2);
    for ch in 0..n_channels {
        let row = data.row(ch);
        let points: Vec<(f64, f64)> = shown
            .iter()
            .map(|&(i, t)| (t, row[i] / vlimround + ch as f64))
            .collect();
        let series = chart.draw_series(LineSeries::new(points, color))?;
        if ch == 0 {
            if let Some(label) = &options.label {
                series
                    .label(label.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            }
        }
    }
    if options.label.is_some() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    if options.scalebar {
        draw_scale_bar(
            &mut chart,
            last,
            last + span * RIGHT_PAD / 2.0,
            (n_channels - 1) as f64,
            vlimround,
            &options.unit,
        )?;
    }
    Ok(vlimround)
}

/// [`draw_lineplot`] for a continuous signal; sample spacing and unit come
/// from the signal.
pub fn plot_lfp<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    signal: &AnalogSignal,
    options: &LineplotOptions,
) -> Result<f64>
where
    DB::ErrorType: 'static,
{
    let data = signal.data().t().to_owned();
    let options = LineplotOptions {
        dt: 1000.0 * signal.sampling_period(),
        unit: signal.units().symbol().to_string(),
        ..options.clone()
    };
    log::debug!(
        "plotting {} channels x {} samples of LFP",
        signal.num_channels(),
        signal.num_samples()
    );
    draw_lineplot(area, &data, &options)
}

/// Per-channel overlay of a unit's waveform snippets with their mean in
/// black, channels stacked like [`draw_lineplot`]. Returns the amplitude that
/// spans one row.
pub fn plot_waveforms<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    train: &SpikeTrain,
) -> Result<f64>
where
    DB::ErrorType: 'static,
{
    let waveforms = train
        .waveforms()
        .ok_or_else(|| anyhow!("spike train '{}' has no waveforms", train.name()))?;
    let (n_spikes, n_channels, n_samples) = waveforms.data.dim();
    let mean = waveforms
        .data
        .mean_axis(Axis(0))
        .filter(|_| n_channels > 0 && n_samples > 0)
        .ok_or_else(|| anyhow!("spike train '{}' has empty waveforms", train.name()))?;

    let vlim = mean.iter().fold(0.0, |m: f64, v| m.max(v.abs()));
    let vlimround = round_pow2(vlim);
    let dt_ms = 1000.0 / waveforms.sampling_rate;
    let last = (n_samples - 1) as f64 * dt_ms;
    let span = last.max(dt_ms);
    let times: Vec<f64> = (0..n_samples).map(|i| i as f64 * dt_ms).collect();

    let mut chart = ChartBuilder::on(area)
        .caption(
            format!("{} waveforms ({n_spikes} spikes)", train.name()),
            (FONT, CAPTION_SIZE),
        )
        .margin(10)
        .x_label_area_size(LABEL_AREA)
        .y_label_area_size(LABEL_AREA + 10)
        .build_cartesian_2d(0.0..span * (1.0 + RIGHT_PAD), -1.0..n_channels as f64)?;

    let labels: Vec<String> = (1..=n_channels).map(|i| format!("ch. {i}")).collect();
    let label_fmt = |y: &f64| row_label(&labels, *y);
    chart
        .configure_mesh()
        .disable_mesh()
        .y_labels(n_channels + 2)
        .y_label_formatter(&label_fmt)
        .x_desc("time (ms)")
        .draw()?;

    for ch in 0..n_channels {
        let offset = ch as f64;
        for snippet in waveforms.data.outer_iter().take(MAX_SNIPPETS) {
            let trace = snippet.row(ch);
            chart.draw_series(LineSeries::new(
                times.iter().zip(trace.iter()).map(|(&t, &v)| (t, v / vlimround + offset)),
                GREY.mix(0.3),
            ))?;
        }
        let mean_trace = mean.row(ch);
        chart.draw_series(LineSeries::new(
            times.iter().zip(mean_trace.iter()).map(|(&t, &v)| (t, v / vlimround + offset)),
            BLACK.stroke_width(2),
        ))?;
    }

    draw_scale_bar(
        &mut chart,
        last,
        last + span * RIGHT_PAD / 2.0,
        (n_channels - 1) as f64,
        vlimround,
        waveforms.units.symbol(),
    )?;
    Ok(vlimround)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_nearest_power_of_two() {
        assert_eq!(round_pow2(0.3), 0.25);
        assert_eq!(round_pow2(5.0), 4.0);
        assert_eq!(round_pow2(6.0), 8.0);
        assert_eq!(round_pow2(0.0), 1.0);
        assert_eq!(round_pow2(f64::NAN), 1.0);
    }
}
