mod common;

use common::*;
use vian::analysis::{
    compute_dsi, compute_orientation_tuning, compute_osi, make_orientation_trials,
    make_stimulus_trials, pooled_isi, spontaneous_rate, OsiOptions, MIN_ISI_SPIKES,
};
use vian::{load_epochs, load_spiketrains, SpikeTrainQuery};

/// Spikes every `1 / rate` s inside `[onset, onset + 1)`.
fn regular_spikes(onset: f64, rate: usize) -> Vec<f64> {
    (0..rate)
        .map(|i| onset + (i as f64 + 0.5) / rate as f64)
        .collect()
}

#[test]
fn preferred_orientation_from_a_recording() {
    let orientations = [0.0, 90.0, 180.0, 270.0, 0.0, 90.0, 180.0, 270.0, f64::NAN];
    let rates = |o: f64| match o as i64 {
        0 => 4,
        90 => 12,
        180 => 6,
        270 => 2,
        _ => 1,
    };
    let onsets: Vec<f64> = (0..orientations.len()).map(|i| 1.0 + 2.0 * i as f64).collect();

    // sample indices at 1 kHz
    let mut spikes = Vec::new();
    for (&onset, &o) in onsets.iter().zip(&orientations) {
        let rate = if o.is_nan() { 1 } else { rates(o) };
        spikes.extend(regular_spikes(onset, rate).into_iter().map(|t| (t * 1000.0).round()));
    }

    let rec = recording(20.0);
    add_unit(&rec.file, 0, "7", &spikes, 1000.0, Some("good"));
    let epochs = rec.file.create_group("epochs").unwrap();
    add_epoch(
        &epochs,
        "grating",
        &onsets,
        Some(&vec![1.0; onsets.len()]),
        Some(&orientations),
    );

    let trains = load_spiketrains(&rec.path, &SpikeTrainQuery::default()).unwrap();
    let epochs = load_epochs(&rec.path).unwrap();
    let trials = make_stimulus_trials(&trains[0], &epochs[0]).unwrap();
    assert_eq!(trials.len(), orientations.len());

    let grouped = make_orientation_trials(&trials).unwrap();
    assert_eq!(grouped.orientations(), vec![0.0, 90.0, 180.0, 270.0]);
    assert!(grouped.iter().all(|(_, t)| t.len() == 2));
    assert_eq!(grouped.blank().len(), 1);
    assert_eq!(spontaneous_rate(&grouped).unwrap(), Some(1.0));

    let curve = compute_orientation_tuning(&grouped, None).unwrap();
    assert_eq!(curve.preferred_orientation(), 90.0);
    assert_eq!(curve.rates(), &[4.0, 12.0, 6.0, 2.0]);

    let osi = compute_osi(&curve, OsiOptions::default()).unwrap();
    assert!((osi - 6.0 / 18.0).abs() < 1e-12);
    let dsi = compute_dsi(&curve).unwrap();
    assert!((dsi - 10.0 / 14.0).abs() < 1e-12);
}

#[test]
fn short_trains_are_left_out_of_isi() {
    let rec = recording(5.0);
    add_unit(&rec.file, 0, "1", &[100.0, 300.0, 600.0, 1000.0, 1500.0], 1000.0, Some("good"));
    add_unit(&rec.file, 0, "2", &[100.0, 200.0, 300.0], 1000.0, Some("good"));
    add_unit(&rec.file, 0, "3", &[], 1000.0, Some("good"));

    let trains = load_spiketrains(&rec.path, &SpikeTrainQuery::default()).unwrap();
    assert_eq!(trains.len(), 3);
    let intervals = pooled_isi(&trains, MIN_ISI_SPIKES);
    assert_eq!(intervals.len(), 4);
    assert!((intervals[3] - 0.5).abs() < 1e-12);
}
