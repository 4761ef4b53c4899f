mod common;

use std::fs;

use common::*;
use vian::data::model::ModelError;
use vian::units::Unit;
use vian::{load_epochs, load_lfp, load_spiketrains, resolve_action_data_path, MetadataValue, SpikeTrainQuery};

#[test]
fn lfp_channels_follow_electrode_order() {
    let rec = recording(1.0);
    // stored as [3, 1, 2, 0]
    for (slot, electrode) in [3i64, 1, 2, 0].into_iter().enumerate() {
        let samples = vec![electrode as f64 * 100.0; 50];
        add_lfp_channel(&rec.file, 0, &format!("LFP_timeseries_{slot}"), electrode, &samples, 50.0);
    }

    let lfp = load_lfp(&rec.path, 0).unwrap();
    assert_eq!(lfp.channel_ids(), &[0, 1, 2, 3]);
    assert_eq!(lfp.units(), Unit::MILLIVOLT);
    assert_eq!(lfp.sampling_rate(), 50.0);
    assert_eq!(lfp.num_samples(), 50);
    assert_eq!(lfp.t_stop(), 1.0);
    for col in 0..4 {
        // 100 uV per electrode index, in mV
        assert!((lfp.channel(col)[0] - col as f64 * 0.1).abs() < 1e-12);
    }

    let once = lfp.rescale(Unit::MILLIVOLT).unwrap();
    let twice = once.rescale(Unit::MILLIVOLT).unwrap();
    assert_eq!(once.data(), twice.data());
    assert_eq!(once.data(), lfp.data());
}

#[test]
fn lfp_with_ragged_channels_fails() {
    let rec = recording(1.0);
    add_lfp_channel(&rec.file, 0, "a", 0, &[0.0; 10], 10.0);
    add_lfp_channel(&rec.file, 0, "b", 1, &[0.0; 9], 10.0);
    let err = load_lfp(&rec.path, 0).unwrap_err();
    assert!(err.to_string().contains("samples"), "{err:#}");
}

#[test]
fn missing_channel_group_is_reported() {
    let rec = recording(1.0);
    let err = load_lfp(&rec.path, 4).unwrap_err();
    assert!(format!("{err:#}").contains("channel group 4"));
}

#[test]
fn epochs_are_found_at_any_depth() {
    let rec = recording(10.0);
    let epochs = rec.file.create_group("epochs").unwrap();
    add_epoch(&epochs, "visual", &[1.0, 3.0], Some(&[1.0, 1.0]), Some(&[0.0, 90.0]));
    let nested = epochs.create_group("tracking").unwrap();
    add_epoch(&nested, "sync", &[0.5, 5.5, 9.5], None, None);

    let mut loaded = load_epochs(&rec.path).unwrap();
    loaded.sort_by(|a, b| a.name().cmp(b.name()));
    assert_eq!(loaded.len(), 2);

    let sync = &loaded[0];
    assert_eq!(sync.name(), "sync");
    assert_eq!(sync.times(), &[0.5, 5.5, 9.5]);
    assert!(sync.durations().is_none());
    assert_eq!(
        sync.annotations().get("exdir_path"),
        Some(&MetadataValue::from("/epochs/tracking/sync"))
    );

    let visual = &loaded[1];
    assert_eq!(visual.durations(), Some(&[1.0, 1.0][..]));
    assert_eq!(
        visual.labels().unwrap()[1],
        MetadataValue::Quantity(90.0, "deg".to_string())
    );
}

#[test]
fn epochs_with_mismatched_lengths_fail() {
    let rec = recording(10.0);
    let epochs = rec.file.create_group("epochs").unwrap();
    add_epoch(&epochs, "broken", &[1.0, 2.0, 3.0], Some(&[1.0, 1.0]), None);

    let err = load_epochs(&rec.path).unwrap_err();
    assert!(err
        .chain()
        .any(|e| matches!(e.downcast_ref::<ModelError>(), Some(ModelError::LengthMismatch { .. }))));
}

#[test]
fn noise_clusters_are_removed() {
    let rec = recording(2.0);
    add_unit(&rec.file, 0, "10", &[100.0, 200.0], 1000.0, Some("good"));
    add_unit(&rec.file, 0, "2", &[300.0], 1000.0, Some("noise"));
    add_unit(&rec.file, 0, "3", &[400.0, 1500.0], 1000.0, Some("mua"));

    let trains = load_spiketrains(&rec.path, &SpikeTrainQuery::default()).unwrap();
    let names: Vec<&str> = trains.iter().map(|t| t.name()).collect();
    assert_eq!(names, vec!["3", "10"]);
    assert_eq!(trains[0].times(), &[0.4, 1.5]);
    assert_eq!(trains[0].t_stop(), 2.0);
    assert_eq!(
        trains[1].annotation("channel_group"),
        Some(&MetadataValue::Integer(0))
    );

    let all = load_spiketrains(
        &rec.path,
        &SpikeTrainQuery {
            remove_label: None,
            ..SpikeTrainQuery::default()
        },
    )
    .unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn uncurated_units_are_all_returned() {
    let rec = recording(2.0);
    add_unit(&rec.file, 0, "1", &[100.0], 1000.0, None);
    add_unit(&rec.file, 0, "2", &[200.0], 1000.0, Some("noise"));

    let trains = load_spiketrains(&rec.path, &SpikeTrainQuery::default()).unwrap();
    assert_eq!(trains.len(), 2);
}

#[test]
fn channel_group_query_and_waveforms() {
    let rec = recording(1.0);
    add_unit(&rec.file, 0, "1", &[10.0], 100.0, Some("good"));
    let unit = add_unit(&rec.file, 1, "1", &[10.0, 20.0], 100.0, Some("good"));
    add_waveforms(&unit, &ndarray::Array3::from_elem((2, 3, 8), -40.0), 8000.0);

    let query = SpikeTrainQuery {
        channel_group: Some(1),
        ..SpikeTrainQuery::default()
    };
    let trains = load_spiketrains(&rec.path, &query).unwrap();
    assert_eq!(trains.len(), 1);
    let waveforms = trains[0].waveforms().unwrap();
    assert_eq!(waveforms.data.dim(), (2, 3, 8));
    assert_eq!(waveforms.units, Unit::MICROVOLT);
    assert_eq!(waveforms.sampling_rate, 8000.0);

    let both = load_spiketrains(&rec.path, &SpikeTrainQuery::default()).unwrap();
    assert_eq!(both.len(), 2);
}

#[test]
fn action_data_path_is_resolved_against_project() {
    let dir = tempfile::TempDir::new().unwrap();
    let action = dir.path().join("project").join("actions").join("session-1");
    fs::create_dir_all(&action).unwrap();
    fs::write(
        action.join("attributes.yaml"),
        "data:\n  main: 'actions\\session-1\\data\\main.exdir'\n",
    )
    .unwrap();

    let resolved = resolve_action_data_path(&action).unwrap();
    assert_eq!(
        resolved,
        dir.path()
            .join("project")
            .join("actions")
            .join("session-1")
            .join("data")
            .join("main.exdir")
    );
}
