use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};

use super::isi::{isi_distribution, IsiOptions};
use super::{padded_range, CAPTION_SIZE, FONT, LABEL_AREA};
use crate::analysis::{
    compute_orientation_tuning, make_orientation_trials, spontaneous_rate, OsiOptions,
    TuningCurve, TuningIndices, Weights,
};
use crate::color::TRACE_BLUE;
use crate::data::model::SpikeTrain;

const BACKGROUND_ORANGE: RGBColor = RGBColor(255, 127, 14);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningOverviewOptions {
    pub weights: Weights,
    /// Background rate (Hz) subtracted in the second tuning line. Taken from
    /// blank trials when unset.
    pub spontaneous_rate: Option<f64>,
    /// Variant reported next to the plain OSI.
    pub secondary_osi: OsiOptions,
    pub isi: IsiOptions,
}

impl Default for TuningOverviewOptions {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            spontaneous_rate: None,
            secondary_osi: OsiOptions {
                normalise: false,
                relative: true,
            },
            isi: IsiOptions::default(),
        }
    }
}

/// Rate against orientation, plus the background-subtracted curve when a
/// spontaneous rate is given.
pub fn tuning_curve<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    curve: &TuningCurve,
    spontaneous_rate: Option<f64>,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let background = spontaneous_rate.map(|s| curve.without_background(s));
    let x_range = padded_range(curve.orientations().iter().copied(), 0.05);
    let y_range = padded_range(
        curve
            .rates()
            .iter()
            .chain(background.iter().flat_map(|b| b.rates()))
            .copied()
            .chain(std::iter::once(0.0)),
        0.1,
    );

    let mut chart = ChartBuilder::on(area)
        .caption("Orientation tuning", (FONT, CAPTION_SIZE))
        .margin(10)
        .x_label_area_size(LABEL_AREA)
        .y_label_area_size(LABEL_AREA + 10)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_labels(curve.len().max(2))
        .x_desc("Orientation angle (deg)")
        .y_desc("Rate (Hz)")
        .draw()?;

    let mut lines = vec![("with bkg", curve, TRACE_BLUE)];
    if let Some(b) = &background {
        lines.push(("without bkg", b, BACKGROUND_ORANGE));
    }
    for (label, c, color) in lines {
        let points: Vec<(f64, f64)> = c
            .orientations()
            .iter()
            .copied()
            .zip(c.rates().iter().copied())
            .collect();
        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        chart.draw_series(points.into_iter().map(|p| Circle::new(p, 4, color.filled())))?;
    }

    if background.is_some() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

/// Tuning curve in polar form: radius is the rate, angle the orientation.
/// Drawn on equal Cartesian axes with rings and spokes as guides.
pub fn polar_tuning_curve<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    curve: &TuningCurve,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let r_max = curve
        .rates()
        .iter()
        .copied()
        .filter(|r| r.is_finite())
        .fold(0.0, f64::max)
        .max(f64::EPSILON);
    let lim = r_max * 1.15;

    // keep the plot square so circles stay round
    let (w, h) = area.dim_in_pixel();
    let side = w.min(h);
    let pad_y = ((h - side) / 2) as i32;
    let pad_x = ((w - side) / 2) as i32;
    let square = area.margin(pad_y, pad_y, pad_x, pad_x);

    let mut chart = ChartBuilder::on(&square)
        .caption("Polar tuning (Hz)", (FONT, CAPTION_SIZE))
        .margin(10)
        .build_cartesian_2d(-lim..lim, -lim..lim)?;

    let polar = |r: f64, deg: f64| {
        let theta = deg.to_radians();
        (r * theta.cos(), r * theta.sin())
    };

    for ring in 1..=4 {
        let r = r_max * ring as f64 / 4.0;
        let circle: Vec<(f64, f64)> = (0..=120).map(|i| polar(r, i as f64 * 3.0)).collect();
        chart.draw_series(std::iter::once(PathElement::new(circle, BLACK.mix(0.15))))?;
    }
    for &o in curve.orientations() {
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(0.0, 0.0), polar(lim, o)],
            BLACK.mix(0.15),
        )))?;
        chart.draw_series(std::iter::once(Text::new(
            format!("{o}°"),
            polar(r_max * 1.05, o),
            (FONT, 12).into_font(),
        )))?;
    }

    let mut outline: Vec<(f64, f64)> = curve
        .rates()
        .iter()
        .zip(curve.orientations())
        .map(|(&r, &o)| polar(r, o))
        .collect();
    if let Some(&first) = outline.first() {
        outline.push(first);
    }
    chart.draw_series(std::iter::once(PathElement::new(
        outline,
        TRACE_BLUE.stroke_width(2),
    )))?;
    Ok(())
}

fn indices_line(prefix: &str, indices: &TuningIndices, secondary: &str) -> String {
    let dsi = indices
        .dsi
        .map(|d| format!("{d:.2}"))
        .unwrap_or_else(|| "n/a".to_string());
    let extra = indices
        .secondary_osi
        .map(|v| format!("  {secondary}={v:.2}"))
        .unwrap_or_default();
    format!(
        "{prefix} OSI={:.2}{extra}  CV={:.2}  DSI={dsi}",
        indices.osi, indices.circular_variance
    )
}

fn osi_name(options: OsiOptions) -> &'static str {
    match (options.normalise, options.relative) {
        (false, false) => "OSI",
        (true, false) => "nOSI",
        (false, true) => "rOSI",
        (true, true) => "nrOSI",
    }
}

/// Summary figure for one unit: the tuning indices as a header, tuning line
/// plot and polar plot side by side, and the unit's ISI distribution below.
pub fn tuning_overview<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    trials: &[SpikeTrain],
    unit_train: &SpikeTrain,
    options: &TuningOverviewOptions,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let grouped = make_orientation_trials(trials).context("grouping trials by orientation")?;
    let rates = compute_orientation_tuning(&grouped, None)?;
    let weighted = compute_orientation_tuning(&grouped, Some(options.weights))?;
    let plain_osi = OsiOptions::default();
    let secondary = Some(options.secondary_osi);
    let indices = TuningIndices::compute(&rates, plain_osi, secondary)?;
    let w_indices = TuningIndices::compute(&weighted, plain_osi, secondary)?;

    let spontaneous = match options.spontaneous_rate {
        Some(rate) => Some(rate),
        None => spontaneous_rate(&grouped)?,
    };
    log::info!(
        "unit '{}': preferred orientation {} deg, OSI {:.2}",
        unit_train.name(),
        indices.preferred_orientation,
        indices.osi
    );

    let name = osi_name(options.secondary_osi);
    let header_lines = [
        format!(
            "Preferred orientation={}  Weighted PO={}",
            indices.preferred_orientation, w_indices.preferred_orientation
        ),
        indices_line("Non-weighted:", &indices, name),
        indices_line("Weighted:    ", &w_indices, name),
    ];

    let (_, h) = area.dim_in_pixel();
    let header_height = 3 * (CAPTION_SIZE + 6) + 10;
    let (header, body) = area.split_vertically(header_height.min(h / 3) as i32);
    let style = TextStyle::from((FONT, CAPTION_SIZE).into_font());
    let line_height = CAPTION_SIZE as i32 + 6;
    for (i, line) in header_lines.iter().enumerate() {
        header.draw_text(line, &style, (10, 5 + i as i32 * line_height))?;
    }

    let (_, body_h) = body.dim_in_pixel();
    let (top, bottom) = body.split_vertically((body_h / 2) as i32);
    let (top_w, _) = top.dim_in_pixel();
    let (left, right) = top.split_horizontally((top_w / 2) as i32);

    tuning_curve(&left, &rates, spontaneous)?;
    polar_tuning_curve(&right, &rates)?;
    isi_distribution(&bottom, std::slice::from_ref(unit_train), &options.isi)?;
    Ok(())
}
