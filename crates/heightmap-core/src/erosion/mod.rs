//! Stage 4 — HydraulicErosion: particle-based erosion and deposition.
//!
//! This is the largest and numerically most sensitive stage. Particles are
//! independent except for the shared grid they write to; the production
//! path partitions particles across worker threads, each accumulating
//! writes into a private delta grid, folded into H via a `rayon` `reduce`
//! (sum). Atomic per-cell increments on the shared grid are deliberately
//! not used — at 16.7M cells and up to 200k particles this is a documented
//! contention bottleneck.

mod particle;

use rayon::prelude::*;
use tracing::info;

use crate::error::Error;
use crate::heightfield::HeightField;
use crate::rng::erosion_rng;

pub use particle::ErosionParams;

/// Run the particle-based hydraulic erosion simulation over `h_in`,
/// modulated by the zone potential `p`. Renormalizes `h` to `[0,1]` exactly
/// once, after every particle has finished — the pipeline driver must not
/// renormalize again before stage 6. Returns the result together with the
/// number of non-finite cells repaired.
pub fn erode(
    h_in: &HeightField,
    p: &HeightField,
    seed: u64,
    params: &ErosionParams,
    parallel: bool,
) -> Result<(HeightField, usize), Error> {
    if params.particle_count == 0 {
        // Zero particles: erosion is a no-op beyond the one normalization
        // point this stage owns.
        let mut h = h_in.clone();
        h.normalize();
        return Ok((h, 0));
    }

    let start = std::time::Instant::now();
    let mean_before = h_in.mean_elevation();

    let delta = if parallel {
        erode_parallel(h_in, p, seed, params)
    } else {
        erode_serial(h_in, p, seed, params)
    };

    let mut h = h_in.clone();
    for (cell, d) in h.data.iter_mut().zip(delta.iter()) {
        *cell += *d;
    }

    let repaired = h.repair_non_finite();
    let mean_after_pre_renorm = h.mean_elevation();
    let mass_drift = (mean_after_pre_renorm - mean_before).abs();

    h.normalize();

    info!(
        stage = "hydraulic_erosion",
        elapsed_ms = start.elapsed().as_millis(),
        particles = params.particle_count,
        parallel,
        mass_drift,
        repaired,
        "erosion complete"
    );

    Ok((h, repaired))
}

/// Deterministic serial path: a single shared delta buffer, particles
/// processed one at a time in a fixed order, each seeing every earlier
/// particle's writes via `delta` — bit-identical across runs for a fixed
/// seed.
fn erode_serial(h: &HeightField, p: &HeightField, seed: u64, params: &ErosionParams) -> Vec<f32> {
    let mut rng = erosion_rng(seed);
    let mut delta = vec![0.0f32; h.data.len()];
    for _ in 0..params.particle_count {
        particle::simulate_one(h, p, &mut delta, &mut rng, params);
    }
    delta
}

/// Partition particles across rayon's thread pool; each task simulates its
/// share against the shared, read-only `h` into a private delta grid, which
/// are then summed (never atomically merged into a shared grid).
fn erode_parallel(
    h: &HeightField,
    p: &HeightField,
    seed: u64,
    params: &ErosionParams,
) -> Vec<f32> {
    let n = h.data.len();
    let threads = rayon::current_num_threads().max(1);
    let per_thread = (params.particle_count as usize).div_ceil(threads);

    (0..threads)
        .into_par_iter()
        .map(|t| {
            let count = per_thread.min(
                (params.particle_count as usize).saturating_sub(t * per_thread),
            );
            let mut delta = vec![0.0f32; n];
            if count == 0 {
                return delta;
            }
            // Read-only access to `h`; each worker's private RNG stream is
            // derived from the stage seed and the worker index so threads
            // never share generator state.
            let mut rng = erosion_rng(seed ^ (t as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
            for _ in 0..count {
                particle::simulate_one(h, p, &mut delta, &mut rng, params);
            }
            delta
        })
        .reduce(
            || vec![0.0f32; n],
            |mut acc, next| {
                for (a, b) in acc.iter_mut().zip(next.iter()) {
                    *a += *b;
                }
                acc
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::slope::{slope_field, VERTICAL_SCALE_M};
    use crate::zone::generate_zone_potential;

    fn gentle_slope(n: usize) -> HeightField {
        let mut hf = HeightField::flat(n, 3.5);
        for r in 0..n {
            for c in 0..n {
                // ~5% grade ramp across the tile.
                hf.set(r, c, 0.3 + 0.05 * (c as f32 / n as f32));
            }
        }
        hf
    }

    #[test]
    fn zero_particles_is_normalization_only() {
        let h_in = gentle_slope(64);
        let p = HeightField::filled(64, 3.5, 0.5);
        let params = ErosionParams {
            particle_count: 0,
            ..ErosionParams::default()
        };
        let (h_out, _) = erode(&h_in, &p, 42, &params, false).unwrap();

        let mut expected = h_in.clone();
        expected.normalize();
        for (a, b) in h_out.data.iter().zip(expected.data.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn mass_conserved_before_renormalization() {
        let h_in = gentle_slope(128);
        let p = HeightField::filled(128, 3.5, 0.3);
        let params = ErosionParams {
            particle_count: 5_000,
            ..ErosionParams::default()
        };

        let mean_before = h_in.mean_elevation();
        // Replicate the pre-renormalization mean check directly since
        // `erode` only exposes the post-renormalization result.
        let delta = erode_serial(&h_in, &p, 7, &params);
        let mut h = h_in.clone();
        for (cell, d) in h.data.iter_mut().zip(delta.iter()) {
            *cell += *d;
        }
        let mean_after = h.mean_elevation();
        assert!(
            (mean_after - mean_before).abs() < 1e-3,
            "mass drift {} exceeds tolerance",
            (mean_after - mean_before).abs()
        );
    }

    #[test]
    fn output_in_unit_range_after_renormalization() {
        let h_in = gentle_slope(128);
        let p = HeightField::filled(128, 3.5, 0.3);
        let params = ErosionParams {
            particle_count: 5_000,
            ..ErosionParams::default()
        };
        let (h_out, _) = erode(&h_in, &p, 7, &params, false).unwrap();
        assert!((h_out.min_elevation() - 0.0).abs() < 1e-6);
        assert!((h_out.max_elevation() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn calibration_gentle_slope_does_not_produce_steep_terrain() {
        // Failure mode to avoid (spec §4.4): erosion applied to <=10% slope
        // terrain must not produce any slope >20%. Mirrors the spec's own
        // baseline-default scenario (N=512, default particle count) so the
        // particles-per-cell ratio matches what the defaults were actually
        // calibrated against; build a ramp whose grade, under the same
        // vertical/horizontal scale `slope_field` uses, is exactly 10%.
        let n = 512;
        let cell_size_m = 3.5;
        let target_grade = 0.10;
        let dh_per_cell = (target_grade * cell_size_m as f64 / VERTICAL_SCALE_M) as f32;
        let mut h_in = HeightField::flat(n, cell_size_m);
        for r in 0..n {
            for c in 0..n {
                h_in.set(r, c, 0.4 + dh_per_cell * c as f32);
            }
        }
        let p = generate_zone_potential(n, 11, 0.77, cell_size_m).unwrap();
        let params = ErosionParams::default();
        let (h_out, _) = erode(&h_in, &p, 11, &params, false).unwrap();

        let max_slope = slope_field(&h_out)
            .into_iter()
            .fold(0.0f32, |acc, s| acc.max(s));
        assert!(
            max_slope <= 0.20,
            "calibration failure: max slope {max_slope:.3} exceeds 0.20"
        );
    }

    #[test]
    fn parallel_and_serial_both_conserve_mass_roughly() {
        let h_in = gentle_slope(96);
        let p = HeightField::filled(96, 3.5, 0.4);
        let params = ErosionParams {
            particle_count: 3_000,
            ..ErosionParams::default()
        };
        let (serial, _) = erode(&h_in, &p, 3, &params, false).unwrap();
        let (parallel, _) = erode(&h_in, &p, 3, &params, true).unwrap();
        assert!((serial.min_elevation() - 0.0).abs() < 1e-6);
        assert!((parallel.min_elevation() - 0.0).abs() < 1e-6);
    }
}
