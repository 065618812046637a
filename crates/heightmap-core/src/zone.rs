//! Stage 1 — ZoneGenerator: the continuous buildability-potential field P.

use rand::Rng;
use rayon::prelude::*;
use tracing::info;

use crate::error::Error;
use crate::heightfield::HeightField;
use crate::noise::Fbm;
use crate::rng::{noise_seed32, zone_rng};

const ZONE_OCTAVES: u32 = 2;

/// Generate the buildability-potential field `P`: smooth, isotropic, with
/// mean approximately `target_coverage` after a monotone empirical-CDF
/// remap. Rank order of cells is preserved by construction.
pub fn generate_zone_potential(
    resolution: usize,
    seed: u64,
    target_coverage: f32,
    cell_size_m: f32,
) -> Result<HeightField, Error> {
    if resolution < 64 {
        return Err(Error::InvalidParameter {
            field: "resolution",
            message: "must be >= 64".into(),
        });
    }
    if !(0.0..1.0).contains(&target_coverage) {
        return Err(Error::InvalidParameter {
            field: "target_coverage",
            message: format!("must be in (0,1), got {target_coverage}"),
        });
    }

    let start = std::time::Instant::now();

    let mut rng = zone_rng(seed);
    // Small random phase offset so adjacent seeds don't share a lattice origin.
    let phase_x: f64 = rng.gen_range(0.0..1000.0);
    let phase_y: f64 = rng.gen_range(0.0..1000.0);

    let wavelength = resolution as f64 / 0.6;
    let base_freq = 1.0 / wavelength;
    let fbm = Fbm::new(noise_seed32(seed, 0x5A5A_5A5A_5A5A_5A5A), ZONE_OCTAVES);

    let n = resolution;
    let mut raw = vec![0.0f32; n * n];
    raw.par_chunks_mut(n).enumerate().for_each(|(r, row)| {
        for (c, cell) in row.iter_mut().enumerate() {
            let x = c as f64 * base_freq + phase_x;
            let y = r as f64 * base_freq + phase_y;
            *cell = fbm.sample(x, y) as f32;
        }
    });

    let mut p = HeightField {
        data: raw,
        size: n,
        cell_size_m,
    };
    remap_to_coverage(&mut p, target_coverage);

    let mean = p.mean_elevation();
    info!(
        stage = "zone_generator",
        elapsed_ms = start.elapsed().as_millis(),
        mean_p = mean,
        target_coverage,
        "zone potential generated"
    );

    Ok(p)
}

/// Monotone remap of `p`'s empirical distribution so the field's mean sits
/// near `target_coverage`. Implemented as a rank-preserving quantile remap:
/// sort cell values to get each cell's empirical-CDF rank in `[0,1]`, then
/// apply `mapped = rank^power`, where `power` is solved so that
/// `E[rank^power] = target_coverage` under the (near-)uniform rank
/// distribution produced by the sort. Power functions are monotone
/// increasing for any positive exponent, so cell rank order is preserved.
fn remap_to_coverage(field: &mut HeightField, target_coverage: f32) {
    let n = field.data.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        field.data[a]
            .partial_cmp(&field.data[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let tc = (target_coverage as f64).clamp(0.01, 0.99);
    // E[U^power] = 1/(power+1) for U ~ Uniform(0,1) => power = 1/tc - 1.
    let power = 1.0 / tc - 1.0;

    for (i, &idx) in order.iter().enumerate() {
        let rank = if n > 1 {
            i as f64 / (n - 1) as f64
        } else {
            0.5
        };
        let mapped = rank.powf(power);
        field.data[idx] = mapped.clamp(0.0, 1.0) as f32;
    }
}
