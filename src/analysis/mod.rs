//! Spike-train statistics and orientation tuning.
//!
//! ```text
//!  SpikeTrain + stimulus Epoch
//!        │ make_stimulus_trials
//!        ▼
//!   trials ──make_orientation_trials──▶ OrientationTrials
//!                                            │ compute_orientation_tuning
//!                                            ▼
//!                                       TuningCurve ──▶ OSI / DSI / CV
//! ```

pub mod lowpass;
pub mod statistics;
pub mod trials;
pub mod tuning;

use thiserror::Error;

use crate::data::model::ModelError;
use crate::units::UnitError;

pub use statistics::{gaussian_kde, isi, mean_firing_rate, pooled_isi, MIN_ISI_SPIKES};
pub use trials::{
    make_orientation_trials, make_stimulus_trials, spontaneous_rate, OrientationTrials, ORIENT,
};
pub use tuning::{
    compute_circular_variance, compute_dsi, compute_orientation_tuning, compute_osi, OsiOptions,
    TuningCurve, TuningIndices, Weights,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("no orientation trials to analyse")]
    NoTrials,
    #[error("trial '{0}' has no 'orient' annotation")]
    MissingOrientation(String),
    #[error("orientation of trial '{0}' is not an angle")]
    InvalidOrientation(String),
    #[error("tuning curve has no rate at {0} deg")]
    MissingAngle(f64),
    #[error("{rates} rates for {orientations} orientations")]
    LengthMismatch { rates: usize, orientations: usize },
    #[error("empty time window [{t_start}, {t_stop}]")]
    EmptyWindow { t_start: f64, t_stop: f64 },
    #[error("weights must be non-negative with a positive sum")]
    InvalidWeights,
    #[error("epoch '{0}' has no durations")]
    MissingDurations(String),
    #[error("invalid low-pass filter: {0}")]
    InvalidFilter(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Unit(#[from] UnitError),
}
