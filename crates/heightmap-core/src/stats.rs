//! Statistics record returned alongside the generated heightfield.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome classification for a `generate` call. Always `Ok` unless the
/// verifier could not reach `target_buildable` within its pass budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Ok,
    BuildabilityMissed,
    Clamped,
}

/// Per-stage elapsed wall-clock time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageTimings {
    pub zone_generator: Duration,
    pub terrain_synth: Duration,
    pub ridge_enhancer: Duration,
    pub hydraulic_erosion: Duration,
    pub hydrology_analyzer: Duration,
    pub detail_and_verify: Duration,
}

/// Slope distribution summary, all values grades (rise/run).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SlopeSummary {
    pub mean: f32,
    pub median: f32,
    pub p90: f32,
    pub p99: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub timings: StageTimings,
    pub buildable_fraction_initial: f32,
    pub buildable_fraction_final: f32,
    pub slope: SlopeSummary,
    /// Fraction of cells where conditional detail noise was actually applied.
    pub detail_application_fraction: f32,
    /// Number of verifier smoothing passes performed (0..=3).
    pub verification_passes: u32,
    /// Total non-finite cells repaired across all stages.
    pub repaired_cell_count: usize,
    pub status: Status,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            timings: StageTimings::default(),
            buildable_fraction_initial: 0.0,
            buildable_fraction_final: 0.0,
            slope: SlopeSummary::default(),
            detail_application_fraction: 0.0,
            verification_passes: 0,
            repaired_cell_count: 0,
            status: Status::Ok,
        }
    }
}
