//! Zero-phase Butterworth low-pass, as cascaded second-order sections run
//! forward then backward.

use std::f64::consts::PI;

use ndarray::{Array2, ArrayView1, Axis};

use super::AnalysisError;

/// `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`
#[derive(Debug, Clone, Copy, PartialEq)]
struct Section {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Section {
    /// Run the section over `signal` in place (direct form II transposed),
    /// starting from the steady state for a constant input equal to the
    /// first sample.
    fn run(&self, signal: &mut [f64]) {
        let Some(&x0) = signal.first() else {
            return;
        };
        let mut z1 = x0 * (1.0 - self.b0);
        let mut z2 = x0 * (self.b2 - self.a2);
        for x in signal.iter_mut() {
            let input = *x;
            let output = self.b0 * input + z1;
            z1 = self.b1 * input - self.a1 * output + z2;
            z2 = self.b2 * input - self.a2 * output;
            *x = output;
        }
    }
}

/// Bilinear-transform Butterworth low-pass of `order` with normalised cutoff
/// `wn` (1 = Nyquist). Every section has unit gain at DC.
fn design(order: usize, wn: f64) -> Vec<Section> {
    let k = (PI * wn / 2.0).tan();
    let k2 = k * k;
    let mut sections = Vec::with_capacity(order.div_ceil(2));
    for i in 0..order / 2 {
        let theta = PI * (2 * i + 1) as f64 / (2 * order) as f64;
        let q = 1.0 / (2.0 * theta.cos());
        let norm = 1.0 / (1.0 + k / q + k2);
        let b0 = k2 * norm;
        sections.push(Section {
            b0,
            b1: 2.0 * b0,
            b2: b0,
            a1: 2.0 * (k2 - 1.0) * norm,
            a2: (1.0 - k / q + k2) * norm,
        });
    }
    if order % 2 == 1 {
        let b0 = k / (1.0 + k);
        sections.push(Section {
            b0,
            b1: b0,
            b2: 0.0,
            a1: (k - 1.0) / (k + 1.0),
            a2: 0.0,
        });
    }
    sections
}

fn filtfilt_row(sections: &[Section], row: ArrayView1<'_, f64>, padlen: usize) -> Vec<f64> {
    let n = row.len();
    let pad = padlen.min(n.saturating_sub(1));
    let first = row[0];
    let last = row[n - 1];

    // odd extension at both ends
    let mut ext = Vec::with_capacity(n + 2 * pad);
    ext.extend((1..=pad).rev().map(|i| 2.0 * first - row[i]));
    ext.extend(row.iter().copied());
    ext.extend((1..=pad).map(|i| 2.0 * last - row[n - 1 - i]));

    for s in sections {
        s.run(&mut ext);
    }
    ext.reverse();
    for s in sections {
        s.run(&mut ext);
    }
    ext.reverse();
    ext[pad..pad + n].to_vec()
}

/// Low-pass every row of `data` (channels x samples) without phase shift.
pub fn butter_lowpass_filtfilt(
    data: &Array2<f64>,
    order: usize,
    wn: f64,
) -> Result<Array2<f64>, AnalysisError> {
    if order == 0 {
        return Err(AnalysisError::InvalidFilter("order must be at least 1".into()));
    }
    if !(wn > 0.0 && wn < 1.0) {
        return Err(AnalysisError::InvalidFilter(format!(
            "cutoff {wn} outside (0, 1)"
        )));
    }
    let mut out = data.clone();
    if data.ncols() == 0 {
        return Ok(out);
    }
    let sections = design(order, wn);
    let padlen = 3 * (order + 1);
    for (mut dst, src) in out.axis_iter_mut(Axis(0)).zip(data.axis_iter(Axis(0))) {
        let filtered = filtfilt_row(&sections, src, padlen);
        for (d, f) in dst.iter_mut().zip(filtered) {
            *d = f;
        }
    }
    Ok(out)
}
