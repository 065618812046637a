//! Stage 6a — ConditionalDetail: micro-relief that only touches cells
//! already steep enough that it cannot push them past buildable.

use rand::Rng;
use rayon::prelude::*;
use tracing::info;

use crate::heightfield::HeightField;
use crate::metrics::slope::{slope_field, BUILDABLE_GRADE};
use crate::noise::Fbm;
use crate::rng::{detail_rng, noise_seed32};

const DETAIL_OCTAVES: u32 = 2;
const DETAIL_AMPLITUDE: f32 = 0.02;
const DETAIL_SALT: u64 = 0xDE7A_11ED_DE7A_11ED;
/// Grade band over which the detail contribution tapers in, avoiding a
/// discontinuity right at the buildable threshold.
const TAPER_BAND: f32 = 0.02;

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Add high-frequency detail noise `D` wherever `S > 5%`, tapered smoothly
/// in over `[BUILDABLE_GRADE, BUILDABLE_GRADE + TAPER_BAND)` so buildable
/// cells (`S <= 5%`) are returned bit-for-bit unchanged. Returns the
/// detailed field, the fraction of cells that actually received a nonzero
/// contribution, and the number of non-finite cells repaired.
pub fn apply_conditional_detail(
    h_in: &HeightField,
    seed: u64,
    base_frequency: f64,
) -> (HeightField, f32, usize) {
    let start = std::time::Instant::now();
    let n = h_in.size;
    let slopes = slope_field(h_in);

    let mut rng = detail_rng(seed);
    let phase_x: f64 = rng.gen_range(0.0..1000.0);
    let phase_y: f64 = rng.gen_range(0.0..1000.0);
    let fbm = Fbm::new(noise_seed32(seed, DETAIL_SALT), DETAIL_OCTAVES);

    let mut data = h_in.data.clone();
    let applied = std::sync::atomic::AtomicUsize::new(0);

    data.par_chunks_mut(n).enumerate().for_each(|(r, row)| {
        for (c, cell) in row.iter_mut().enumerate() {
            let s = slopes[r * n + c];
            if s <= BUILDABLE_GRADE {
                continue;
            }
            let w = smoothstep(BUILDABLE_GRADE, BUILDABLE_GRADE + TAPER_BAND, s);
            if w <= 0.0 {
                continue;
            }
            let x = c as f64 * base_frequency + phase_x;
            let y = r as f64 * base_frequency + phase_y;
            let d = fbm.sample(x, y) as f32 * DETAIL_AMPLITUDE;
            *cell = (*cell + d * w).clamp(0.0, 1.0);
            applied.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    });

    let mut h_out = HeightField {
        data,
        size: n,
        cell_size_m: h_in.cell_size_m,
    };
    let repaired = h_out.repair_non_finite();
    let fraction = applied.load(std::sync::atomic::Ordering::Relaxed) as f32 / (n * n) as f32;

    info!(
        stage = "conditional_detail",
        elapsed_ms = start.elapsed().as_millis(),
        repaired,
        detail_application_fraction = fraction,
        "conditional detail applied"
    );

    (h_out, fraction, repaired)
}
