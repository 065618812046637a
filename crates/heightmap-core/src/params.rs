//! Caller-facing generation parameters.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Parameters recognized by [`crate::pipeline::generate`]. All fields have
/// documented defaults (see [`Default`]); a caller typically starts from
/// `GenerateParams::default()` and overrides a handful of fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateParams {
    /// Side length N of the output grid. Power of two, 64..=8192.
    pub resolution: usize,
    /// 64-bit seed. Identical seeds with identical other params produce
    /// identical H in single-threaded mode.
    pub seed: u64,
    /// Desired buildable fraction beta, for reporting only. The verifier's
    /// smoothing trigger is the separate fixed constant
    /// `verify::TARGET_LOW` (0.55), not this field — see spec §4.6.
    pub target_buildable: f32,
    /// Zone generator target coverage tau.
    pub target_coverage: f32,
    /// Base amplitude A (see WeightedTerrainSynth).
    pub base_amplitude: f32,
    /// Minimum amplitude fraction m.
    pub min_amplitude_fraction: f32,
    /// Octave count K.
    pub octaves: u32,
    pub apply_ridges: bool,
    pub ridge_strength: f32,
    pub apply_erosion: bool,
    pub erosion_particles: u32,
    pub erosion_rate: f32,
    pub deposition_rate: f32,
    pub evaporation_rate: f32,
    pub sediment_capacity: f32,
    pub apply_detail: bool,
    pub apply_verification: bool,
    pub parallel: bool,
    /// `None` means auto (rayon's global pool / hardware parallelism).
    pub thread_count: Option<usize>,
    /// Physical spacing between adjacent cells, in metres.
    pub cell_size_m: f32,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            resolution: 4096,
            seed: 42,
            target_buildable: 0.60,
            target_coverage: 0.77,
            base_amplitude: 0.18,
            min_amplitude_fraction: 0.30,
            octaves: 6,
            apply_ridges: false,
            ridge_strength: 0.15,
            apply_erosion: true,
            erosion_particles: 100_000,
            erosion_rate: 0.2,
            deposition_rate: 0.08,
            evaporation_rate: 0.015,
            sediment_capacity: 3.0,
            apply_detail: false,
            apply_verification: true,
            parallel: true,
            thread_count: None,
            cell_size_m: 3.5,
        }
    }
}

impl GenerateParams {
    /// Validate every field, returning the first violation found.
    pub fn validate(&self) -> Result<(), Error> {
        if self.resolution < 64 || self.resolution > 8192 || !self.resolution.is_power_of_two() {
            return Err(Error::InvalidParameter {
                field: "resolution",
                message: format!(
                    "must be a power of two in 64..=8192, got {}",
                    self.resolution
                ),
            });
        }
        if !(0.0..1.0).contains(&self.target_coverage) {
            return Err(Error::InvalidParameter {
                field: "target_coverage",
                message: format!("must be in (0,1), got {}", self.target_coverage),
            });
        }
        if !(0.0..=1.0).contains(&self.target_buildable) {
            return Err(Error::InvalidParameter {
                field: "target_buildable",
                message: format!("must be in [0,1], got {}", self.target_buildable),
            });
        }
        if self.base_amplitude <= 0.0 {
            return Err(Error::InvalidParameter {
                field: "base_amplitude",
                message: "must be positive".into(),
            });
        }
        if !(0.0..1.0).contains(&self.min_amplitude_fraction) {
            return Err(Error::InvalidParameter {
                field: "min_amplitude_fraction",
                message: format!("must be in (0,1), got {}", self.min_amplitude_fraction),
            });
        }
        if self.octaves == 0 {
            return Err(Error::InvalidParameter {
                field: "octaves",
                message: "must be at least 1".into(),
            });
        }
        if self.ridge_strength < 0.0 {
            return Err(Error::InvalidParameter {
                field: "ridge_strength",
                message: "must be non-negative".into(),
            });
        }
        if self.erosion_rate < 0.0
            || self.deposition_rate < 0.0
            || self.evaporation_rate < 0.0
            || self.sediment_capacity < 0.0
        {
            return Err(Error::InvalidParameter {
                field: "erosion_rate|deposition_rate|evaporation_rate|sediment_capacity",
                message: "erosion rate constants must be non-negative".into(),
            });
        }
        if !(0.0..1.0).contains(&self.evaporation_rate) {
            return Err(Error::InvalidParameter {
                field: "evaporation_rate",
                message: format!("must be in [0,1), got {}", self.evaporation_rate),
            });
        }
        if self.cell_size_m <= 0.0 {
            return Err(Error::InvalidParameter {
                field: "cell_size_m",
                message: "must be positive".into(),
            });
        }
        if let Some(0) = self.thread_count {
            return Err(Error::InvalidParameter {
                field: "thread_count",
                message: "must be at least 1 when set".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(GenerateParams::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_power_of_two_resolution() {
        let p = GenerateParams {
            resolution: 500,
            ..Default::default()
        };
        assert!(matches!(
            p.validate(),
            Err(Error::InvalidParameter { field: "resolution", .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_coverage() {
        let p = GenerateParams {
            target_coverage: 1.5,
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn rejects_zero_thread_count() {
        let p = GenerateParams {
            thread_count: Some(0),
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }
}
