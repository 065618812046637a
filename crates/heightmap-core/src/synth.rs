//! Stage 2 — WeightedTerrainSynth: zone-weighted amplitude-modulated fBm.

use rand::Rng;
use rayon::prelude::*;
use tracing::info;

use crate::error::Error;
use crate::heightfield::HeightField;
use crate::noise::Fbm;
use crate::rng::{noise_seed32, synth_rng};

/// Produce the base elevation field H0 from the zone potential `p`.
///
/// The same `octaves` octaves at the same frequencies are evaluated
/// everywhere; only the per-cell amplitude envelope varies with `p`, per
/// the contract that forbids frequency-domain (octave-count) modulation.
/// Returns the base elevation field together with the number of non-finite
/// cells repaired during synthesis.
#[allow(clippy::too_many_arguments)]
pub fn synthesize_base_terrain(
    p: &HeightField,
    seed: u64,
    base_amplitude: f32,
    min_amplitude_fraction: f32,
    octaves: u32,
    base_frequency: f64,
) -> Result<(HeightField, usize), Error> {
    if base_amplitude <= 0.0 {
        return Err(Error::InvalidParameter {
            field: "base_amplitude",
            message: "must be positive".into(),
        });
    }
    if !(0.0..1.0).contains(&min_amplitude_fraction) {
        return Err(Error::InvalidParameter {
            field: "min_amplitude_fraction",
            message: format!("must be in (0,1), got {min_amplitude_fraction}"),
        });
    }
    if octaves == 0 {
        return Err(Error::InvalidParameter {
            field: "octaves",
            message: "must be at least 1".into(),
        });
    }

    let start = std::time::Instant::now();
    let n = p.size;

    let mut rng = synth_rng(seed);
    let phase_x: f64 = rng.gen_range(0.0..1000.0);
    let phase_y: f64 = rng.gen_range(0.0..1000.0);

    let fbm = Fbm::new(noise_seed32(seed, 0x1357_9BDF_2468_ACE0), octaves);
    let a = base_amplitude as f64;
    let m = min_amplitude_fraction as f64;

    let mut data = vec![0.0f32; n * n];
    data.par_chunks_mut(n).enumerate().for_each(|(r, row)| {
        for (c, cell) in row.iter_mut().enumerate() {
            let x = c as f64 * base_frequency + phase_x;
            let y = r as f64 * base_frequency + phase_y;
            let noise_val = fbm.sample(x, y);

            let p_val = p.get(r, c) as f64;
            let amplitude = a * (m + (1.0 - m) * (1.0 - p_val));
            let h = 0.5 + amplitude * noise_val;
            *cell = h.clamp(0.0, 1.0) as f32;
        }
    });

    let mut h0 = HeightField {
        data,
        size: n,
        cell_size_m: p.cell_size_m,
    };
    let repaired = h0.repair_non_finite();

    info!(
        stage = "weighted_terrain_synth",
        elapsed_ms = start.elapsed().as_millis(),
        repaired,
        "base terrain synthesized"
    );

    Ok((h0, repaired))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_potential(n: usize, value: f32) -> HeightField {
        HeightField::filled(n, 3.5, value)
    }

    #[test]
    fn rejects_invalid_params() {
        let p = flat_potential(64, 0.5);
        assert!(synthesize_base_terrain(&p, 1, -1.0, 0.3, 6, 0.01).is_err());
        assert!(synthesize_base_terrain(&p, 1, 0.18, 1.5, 6, 0.01).is_err());
        assert!(synthesize_base_terrain(&p, 1, 0.18, 0.3, 0, 0.01).is_err());
    }

    #[test]
    fn output_in_unit_range() {
        let p = flat_potential(128, 0.3);
        let (h0, _) = synthesize_base_terrain(&p, 42, 0.18, 0.3, 6, 0.02).unwrap();
        assert!(h0.data.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn high_potential_yields_lower_amplitude_variance() {
        let n = 256;
        let p_buildable = flat_potential(n, 1.0);
        let p_scenic = flat_potential(n, 0.0);

        let (h_buildable, _) = synthesize_base_terrain(&p_buildable, 7, 0.18, 0.3, 6, 0.03).unwrap();
        let (h_scenic, _) = synthesize_base_terrain(&p_scenic, 7, 0.18, 0.3, 6, 0.03).unwrap();

        let std = |hf: &HeightField| {
            let mean = hf.mean_elevation();
            let var = hf
                .data
                .iter()
                .map(|&v| (v as f64 - mean).powi(2))
                .sum::<f64>()
                / hf.data.len() as f64;
            var.sqrt()
        };

        assert!(
            std(&h_buildable) < std(&h_scenic),
            "buildable-zone variance should be damped relative to scenic-zone variance"
        );
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let p = flat_potential(128, 0.5);
        let (a, _) = synthesize_base_terrain(&p, 5, 0.18, 0.3, 6, 0.02).unwrap();
        let (b, _) = synthesize_base_terrain(&p, 5, 0.18, 0.3, 6, 0.02).unwrap();
        assert_eq!(a.data, b.data);
    }
}
