//! Data layer: typed recording objects, loading, and filtering.
//!
//! Architecture:
//! ```text
//!  recording.exdir
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  exdir groups → AnalogSignal / Epoch / SpikeTrain
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  drop curated noise clusters
//!   └──────────┘
//!        │
//!        ▼
//!   analysis / plot
//! ```

pub mod filter;
pub mod loader;
pub mod model;
