use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array3};
use plotters::prelude::*;

use vian::analysis::make_stimulus_trials;
use vian::exdir::{Attributes, File, Group};
use vian::plot::{
    draw_lineplot, isi_distribution, orient_raster_plots, plot_lfp, plot_psth, plot_waveforms,
    spike_raster, tuning_overview, IsiOptions, LineplotOptions, PsthOptions,
    TuningOverviewOptions,
};
use vian::units::{Quantity, Unit};
use vian::{load_epochs, load_lfp, load_spiketrains, SpikeTrainQuery};

const DURATION: f64 = 80.0;
const LFP_RATE: f64 = 1000.0;
const SPIKE_RATE: f64 = 30000.0;
const WAVEFORM_SAMPLES: usize = 40;
const N_CHANNELS: usize = 4;

const ORIENTATIONS: [f64; 8] = [0.0, 45.0, 90.0, 135.0, 180.0, 225.0, 270.0, 315.0];
const REPEATS: usize = 5;
const BLANKS: usize = 5;
const STIM_ON: f64 = 1.0;
const STIM_OFF: f64 = 0.5;
const FIRST_ONSET: f64 = 2.0;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        mean + std_dev * z
    }

    fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = (self.next_u64() % (i as u64 + 1)) as usize;
            items.swap(i, j);
        }
    }
}

// ---------------------------------------------------------------------------
// Synthetic recording
// ---------------------------------------------------------------------------

/// One stimulus presentation: onset (s) and orientation (deg, NaN = blank).
struct Presentation {
    onset: f64,
    orientation: f64,
}

fn stimulus_schedule(rng: &mut SimpleRng) -> Vec<Presentation> {
    let mut orientations: Vec<f64> = ORIENTATIONS
        .iter()
        .flat_map(|&o| std::iter::repeat(o).take(REPEATS))
        .chain(std::iter::repeat(f64::NAN).take(BLANKS))
        .collect();
    rng.shuffle(&mut orientations);
    orientations
        .into_iter()
        .enumerate()
        .map(|(i, orientation)| Presentation {
            onset: FIRST_ONSET + i as f64 * (STIM_ON + STIM_OFF),
            orientation,
        })
        .collect()
}

/// Sorted unit: curation label, baseline rate (Hz), and direction tuning as
/// (preferred direction, peak rate, concentration).
struct UnitModel {
    id: &'static str,
    cluster_group: &'static str,
    baseline: f64,
    tuning: Option<(f64, f64, f64)>,
    amplitude: f64,
}

const UNITS: [UnitModel; 4] = [
    UnitModel {
        id: "1",
        cluster_group: "good",
        baseline: 3.0,
        tuning: Some((90.0, 40.0, 2.5)),
        amplitude: -80.0,
    },
    UnitModel {
        id: "2",
        cluster_group: "good",
        baseline: 5.0,
        tuning: Some((225.0, 20.0, 1.0)),
        amplitude: -50.0,
    },
    UnitModel {
        id: "3",
        cluster_group: "noise",
        baseline: 12.0,
        tuning: None,
        amplitude: -15.0,
    },
    UnitModel {
        id: "10",
        cluster_group: "mua",
        baseline: 8.0,
        tuning: None,
        amplitude: -30.0,
    },
];

fn rate_at(unit: &UnitModel, t: f64, schedule: &[Presentation]) -> f64 {
    let Some((preferred, peak, kappa)) = unit.tuning else {
        return unit.baseline;
    };
    let current = schedule
        .iter()
        .find(|p| t >= p.onset && t < p.onset + STIM_ON && !p.orientation.is_nan());
    match current {
        // von Mises bump over direction
        Some(p) => {
            let delta = (p.orientation - preferred).to_radians();
            unit.baseline + peak * (kappa * (delta.cos() - 1.0)).exp()
        }
        None => unit.baseline,
    }
}

/// Spike sample indices from an inhomogeneous Poisson process with a 2 ms
/// refractory period.
fn spike_indices(unit: &UnitModel, schedule: &[Presentation], rng: &mut SimpleRng) -> Vec<f64> {
    let dt = 1e-3;
    let mut spikes = Vec::new();
    let mut last = f64::NEG_INFINITY;
    let steps = (DURATION / dt) as usize;
    for step in 0..steps {
        let t = step as f64 * dt;
        if t - last < 2e-3 {
            continue;
        }
        if rng.next_f64() < rate_at(unit, t, schedule) * dt {
            let jitter = rng.next_f64() * dt;
            spikes.push(((t + jitter) * SPIKE_RATE).floor());
            last = t;
        }
    }
    spikes
}

fn waveform_snippets(unit: &UnitModel, n_spikes: usize, rng: &mut SimpleRng) -> Array3<f64> {
    Array3::from_shape_fn((n_spikes, N_CHANNELS, WAVEFORM_SAMPLES), |(_, ch, s)| {
        let x = s as f64 - 12.0;
        let trough = (-x * x / 8.0).exp();
        let rebound = 0.35 * (-(x - 8.0).powi(2) / 30.0).exp();
        let falloff = 1.0 / (1.0 + ch as f64);
        unit.amplitude * falloff * (trough - rebound) + rng.gauss(0.0, 4.0)
    })
}

fn hz(value: f64) -> Quantity {
    Quantity::new(value, Unit::HERTZ)
}

fn with_attrs(group: &Group, fill: impl FnOnce(&mut Attributes)) -> Result<()> {
    let mut attrs = group.attrs()?;
    fill(&mut attrs);
    group.set_attrs(&attrs)?;
    Ok(())
}

fn write_lfp(ephys: &Group, schedule: &[Presentation], rng: &mut SimpleRng) -> Result<()> {
    let lfp = ephys.require_group("channel_group_0")?.create_group("LFP")?;
    let n = (DURATION * LFP_RATE) as usize;
    // stored out of electrode order on purpose
    for (slot, &electrode) in [2usize, 0, 3, 1].iter().enumerate() {
        let channel = lfp.create_group(&format!("LFP_timeseries_{slot}"))?;
        with_attrs(&channel, |a| {
            a.insert("electrode_idx", electrode as i64);
            a.insert_quantity("sample_rate", hz(LFP_RATE));
        })?;
        let phase = electrode as f64 * 0.4;
        let samples = Array1::from_shape_fn(n, |i| {
            let t = i as f64 / LFP_RATE;
            let evoked = if schedule
                .iter()
                .any(|p| t >= p.onset && t < p.onset + 0.2 && !p.orientation.is_nan())
            {
                -60.0
            } else {
                0.0
            };
            80.0 * (2.0 * PI * 8.0 * t + phase).sin()
                + 25.0 * (2.0 * PI * 40.0 * t).sin()
                + evoked
                + rng.gauss(0.0, 10.0)
        });
        let data = channel.create_dataset("data", &samples)?;
        with_attrs_ds(&data, |a| a.insert("unit", "uV"))?;
    }
    Ok(())
}

fn with_attrs_ds(dataset: &vian::exdir::Dataset, fill: impl FnOnce(&mut Attributes)) -> Result<()> {
    let mut attrs = dataset.attrs()?;
    fill(&mut attrs);
    dataset.set_attrs(&attrs)?;
    Ok(())
}

fn write_units(ephys: &Group, schedule: &[Presentation], rng: &mut SimpleRng) -> Result<()> {
    let unit_times = ephys.require_group("channel_group_0")?.create_group("UnitTimes")?;
    with_attrs(&unit_times, |a| a.insert_quantity("sample_rate", hz(SPIKE_RATE)))?;

    for unit in &UNITS {
        let group = unit_times.create_group(unit.id)?;
        with_attrs(&group, |a| {
            a.insert("cluster_group", unit.cluster_group);
            a.insert("description", format!("unit #{}", unit.id));
        })?;
        let indices = spike_indices(unit, schedule, rng);
        group.create_dataset("times", &Array1::from(indices.clone()))?;

        let waveforms = group.create_dataset("waveforms", &waveform_snippets(unit, indices.len(), rng))?;
        with_attrs_ds(&waveforms, |a| {
            a.insert("unit", "uV");
            a.insert_quantity("sample_rate", hz(SPIKE_RATE));
        })?;
        log::info!(
            "unit {} ({}): {} spikes",
            unit.id,
            unit.cluster_group,
            indices.len()
        );
    }
    Ok(())
}

fn write_epochs(file: &File, schedule: &[Presentation]) -> Result<()> {
    let epochs = file.create_group("epochs")?;

    let visual = epochs.create_group("visual_stimulus")?;
    let onsets: Vec<f64> = schedule.iter().map(|p| p.onset).collect();
    let timestamps = visual.create_dataset("timestamps", &Array1::from(onsets.clone()))?;
    with_attrs_ds(&timestamps, |a| a.insert("unit", "s"))?;
    let durations = visual.create_dataset("durations", &Array1::from_elem(onsets.len(), STIM_ON))?;
    with_attrs_ds(&durations, |a| a.insert("unit", "s"))?;
    let orientations: Vec<f64> = schedule.iter().map(|p| p.orientation).collect();
    let labels = visual.create_dataset("data", &Array1::from(orientations))?;
    with_attrs_ds(&labels, |a| a.insert("unit", "deg"))?;
    with_attrs(&visual, |a| a.insert("stimulus", "drifting grating"))?;

    // nested event marker group without durations
    let sync = epochs.create_group("tracking")?.create_group("led_sync")?;
    let pulses: Vec<f64> = (0..(DURATION as usize / 10)).map(|i| i as f64 * 10.0 + 0.5).collect();
    let ts = sync.create_dataset("timestamps", &Array1::from(pulses.clone()))?;
    with_attrs_ds(&ts, |a| a.insert("unit", "s"))?;
    let names: Vec<String> = (0..pulses.len()).map(|i| format!("pulse {i}")).collect();
    sync.create_text_dataset("data", &names)?;
    Ok(())
}

fn write_recording(path: &Path, rng: &mut SimpleRng) -> Result<()> {
    let file = File::create(path)?;
    with_attrs(&file, |a| {
        a.insert_quantity("session_duration", Quantity::new(DURATION, Unit::SECOND))
    })?;
    let schedule = stimulus_schedule(rng);
    let ephys = file
        .require_group("processing")?
        .require_group("electrophysiology")?;
    write_lfp(&ephys, &schedule, rng)?;
    write_units(&ephys, &schedule, rng)?;
    write_epochs(&file, &schedule)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Figures
// ---------------------------------------------------------------------------

fn render<F>(path: PathBuf, size: (u32, u32), draw: F) -> Result<()>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, plotters::coord::Shift>) -> Result<()>,
{
    let root = SVGBackend::new(&path, size).into_drawing_area();
    root.fill(&WHITE)?;
    draw(&root).with_context(|| format!("rendering {}", path.display()))?;
    root.present()?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn render_figures(recording: &Path, out: &Path) -> Result<()> {
    let lfp = load_lfp(recording, 0)?;
    let epochs = load_epochs(recording)?;
    let trains = load_spiketrains(recording, &SpikeTrainQuery::default())?;
    let Some(stimulus) = epochs.iter().find(|e| e.name() == "visual_stimulus") else {
        bail!("recording has no visual_stimulus epoch");
    };

    render(out.join("lfp.svg"), (1200, 600), |area| {
        let options = LineplotOptions {
            window: (0.0, 3000.0),
            filter: true,
            ..LineplotOptions::default()
        };
        plot_lfp(area, &lfp, &options).map(|_| ())
    })?;

    render(out.join("lfp_raw.svg"), (1200, 600), |area| {
        let data = lfp.data().t().to_owned();
        let options = LineplotOptions {
            dt: 1.0,
            window: (0.0, 500.0),
            unit: lfp.units().symbol().to_string(),
            label: Some("raw".to_string()),
            ..LineplotOptions::default()
        };
        draw_lineplot(area, &data, &options).map(|_| ())
    })?;

    render(out.join("spike_raster.svg"), (1200, 500), |area| {
        spike_raster(area, &trains, 0.0..20.0, Some(stimulus))
    })?;

    render(out.join("isi.svg"), (900, 500), |area| {
        isi_distribution(area, &trains, &IsiOptions::default())
    })?;

    for train in &trains {
        let unit = train.name();
        let trials = make_stimulus_trials(train, stimulus)?;

        render(out.join(format!("tuning_overview_{unit}.svg")), (1600, 900), |area| {
            tuning_overview(area, &trials, train, &TuningOverviewOptions::default())
        })?;
        render(out.join(format!("orient_rasters_{unit}.svg")), (800, 900), |area| {
            orient_raster_plots(area, &trials)
        })?;
        render(out.join(format!("psth_{unit}.svg")), (1800, 500), |area| {
            let options = PsthOptions {
                lags: (-0.5, 1.5),
                bin_size: 0.05,
                n_trials: REPEATS,
            };
            plot_psth(area, train, stimulus, &options)
        })?;
        render(out.join(format!("waveforms_{unit}.svg")), (600, 700), |area| {
            plot_waveforms(area, train).map(|_| ())
        })?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let out: PathBuf = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_output".to_string())
        .into();
    if out.exists() {
        bail!("{} already exists; remove it or pass another directory", out.display());
    }
    let recording = out.join("recording.exdir");
    let figures = out.join("figures");
    std::fs::create_dir_all(&figures)?;

    let mut rng = SimpleRng::new(42);
    write_recording(&recording, &mut rng)?;
    println!("Wrote synthetic recording to {}", recording.display());

    render_figures(&recording, &figures)
}
