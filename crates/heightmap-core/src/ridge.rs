//! Stage 3 — RidgeEnhancer: inject ridgelines into scenic zones only.

use rand::Rng;
use rayon::prelude::*;
use tracing::info;

use crate::heightfield::HeightField;
use crate::noise::Fbm;
use crate::rng::{noise_seed32, ridge_rng};

const RIDGE_THRESHOLD: f32 = 0.4;
const RIDGE_OCTAVES: u32 = 6;

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Blend ridged fractal noise into `h_in` wherever `p < 0.4`, with the
/// contribution smoothly vanishing as `p` approaches the threshold so the
/// result stays C1-continuous. Cells with `p >= 0.4` are returned bit-for-bit
/// unchanged. Returns the result together with the number of non-finite
/// cells repaired.
pub fn enhance_ridges(
    h_in: &HeightField,
    p: &HeightField,
    seed: u64,
    ridge_strength: f32,
    base_frequency: f64,
) -> (HeightField, usize) {
    let start = std::time::Instant::now();
    let n = h_in.size;

    let mut rng = ridge_rng(seed);
    let phase_x: f64 = rng.gen_range(0.0..1000.0);
    let phase_y: f64 = rng.gen_range(0.0..1000.0);

    let fbm = Fbm::new(
        noise_seed32(seed, 0xC0FF_EE00_D15E_A5E5),
        RIDGE_OCTAVES,
    );

    let mut data = vec![0.0f32; n * n];
    data.par_chunks_mut(n).enumerate().for_each(|(r, row)| {
        for (c, cell) in row.iter_mut().enumerate() {
            let p_val = p.get(r, c);
            let h_val = h_in.get(r, c);

            // smoothstep(0.4, 0.0, p): w = 0 when p >= 0.4, w = 1 when p <= 0.
            let w = smoothstep(RIDGE_THRESHOLD, 0.0, p_val);
            if w <= 0.0 {
                *cell = h_val;
                continue;
            }

            let x = c as f64 * base_frequency + phase_x;
            let y = r as f64 * base_frequency + phase_y;
            let ridged = fbm.sample_ridged(x, y) as f32;

            let h1 = h_val + ridge_strength * w * (ridged - 0.5);
            *cell = h1.clamp(0.0, 1.0);
        }
    });

    let mut h1 = HeightField {
        data,
        size: n,
        cell_size_m: h_in.cell_size_m,
    };
    let repaired = h1.repair_non_finite();

    info!(
        stage = "ridge_enhancer",
        elapsed_ms = start.elapsed().as_millis(),
        repaired,
        "ridges enhanced"
    );

    (h1, repaired)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buildable_cells_preserved_exactly() {
        let n = 64;
        let mut p = HeightField::flat(n, 3.5);
        let mut h_in = HeightField::flat(n, 3.5);
        for r in 0..n {
            for c in 0..n {
                // Alternate high/low potential in a checkerboard.
                let pv = if (r + c) % 2 == 0 { 0.9 } else { 0.1 };
                p.set(r, c, pv);
                h_in.set(r, c, 0.5);
            }
        }

        let (h1, _) = enhance_ridges(&h_in, &p, 42, 0.15, 0.05);

        for r in 0..n {
            for c in 0..n {
                if p.get(r, c) >= 0.4 {
                    assert!(
                        (h1.get(r, c) - h_in.get(r, c)).abs() < 1e-6,
                        "buildable cell ({r},{c}) was modified"
                    );
                }
            }
        }
    }

    #[test]
    fn scenic_cells_change() {
        let n = 64;
        let p = HeightField::filled(n, 3.5, 0.0);
        let h_in = HeightField::filled(n, 3.5, 0.5);
        let (h1, _) = enhance_ridges(&h_in, &p, 42, 0.15, 0.05);
        let changed = h1
            .data
            .iter()
            .zip(h_in.data.iter())
            .filter(|(a, b)| (**a - **b).abs() > 1e-6)
            .count();
        assert!(changed > 0, "scenic zone should receive a ridge contribution");
    }

    #[test]
    fn output_stays_in_unit_range() {
        let n = 64;
        let p = HeightField::filled(n, 3.5, 0.0);
        let h_in = HeightField::filled(n, 3.5, 0.5);
        let (h1, _) = enhance_ridges(&h_in, &p, 1, 0.15, 0.07);
        assert!(h1.data.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
