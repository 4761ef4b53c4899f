//! Loading and plotting helpers for electrophysiology recordings stored in
//! Exdir containers.
//!
//! ```text
//!  recording.exdir ──data::loader──▶ AnalogSignal / SpikeTrain / Epoch
//!                                          │
//!                          analysis ◀──────┤
//!                    (tuning, ISI, OSI)    │
//!                                          ▼
//!                                 plot ──▶ plotters DrawingArea
//! ```

pub mod analysis;
pub mod color;
pub mod data;
pub mod exdir;
pub mod plot;
pub mod units;

pub use data::loader::{
    load_epochs, load_lfp, load_spiketrains, resolve_action_data_path, SpikeTrainQuery,
};
pub use data::model::{AnalogSignal, Epoch, MetadataValue, SpikeTrain};
pub use units::{Quantity, Unit};
