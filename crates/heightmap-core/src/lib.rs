//! Core terrain generation pipeline: six stages turning pseudo-random noise
//! into a constrained, geologically plausible elevation field for the
//! Cities: Skylines 2 import format.
//!
//! The primary entry point is [`pipeline::generate`]. Everything else —
//! export, UI, undo/redo, worldmap generation — is an external collaborator
//! consuming this crate's outputs.

pub mod detail;
pub mod erosion;
pub mod error;
pub mod heightfield;
pub mod hydrology;
pub mod metrics;
pub mod noise;
pub mod params;
pub mod pipeline;
pub mod ridge;
pub mod rng;
pub mod stats;
pub mod synth;
pub mod verify;
pub mod zone;

pub use error::{Error, Result};
pub use heightfield::HeightField;
pub use params::GenerateParams;
pub use pipeline::generate;
pub use stats::{SlopeSummary, StageTimings, Stats, Status};

pub use metrics::{buildable_fraction, slope_field};
pub use hydrology::{compute_d8_flow as flow_accumulation, dam_sites, extract_rivers, DamSite, FlowField, River, RiverThreshold};
