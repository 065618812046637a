//! Slope field, buildability mask, and buildable-fraction queries.
//!
//! `H` is stored normalized to `[0,1]`; the physical vertical scale it
//! represents (commonly 4096 m per unit, per the export convention) is
//! applied here too, since buildability is a physical-grade concept and a
//! bare `[0,1]`-per-cell gradient would never cross the 5% threshold.

use rayon::prelude::*;

use crate::heightfield::HeightField;
use crate::stats::SlopeSummary;

use super::gradient::horn_gradient;

/// Real-world metres represented by the full `[0,1]` elevation range.
pub const VERTICAL_SCALE_M: f64 = 4096.0;

/// Grade (rise/run, dimensionless) considered the buildable cutoff.
pub const BUILDABLE_GRADE: f32 = 0.05;

/// Compute the grade (`|gradient H| * vertical_scale`) at every cell.
/// Border cells (no full 3×3 neighborhood) copy their nearest interior
/// neighbor's value.
pub fn slope_field(hf: &HeightField) -> Vec<f32> {
    let n = hf.size;
    let mut out = vec![0.0f32; n * n];
    out.par_chunks_mut(n).enumerate().for_each(|(r, row)| {
        if r == 0 || r == n - 1 {
            return;
        }
        for (c, cell) in row.iter_mut().enumerate() {
            if c == 0 || c == n - 1 {
                continue;
            }
            let (dx, dy) = horn_gradient(hf, r, c);
            *cell = ((dx * dx + dy * dy).sqrt() * VERTICAL_SCALE_M) as f32;
        }
    });

    if n >= 3 {
        for c in 1..n - 1 {
            out[c] = out[n + c];
            out[(n - 1) * n + c] = out[(n - 2) * n + c];
        }
        for r in 0..n {
            out[r * n] = out[r * n + 1];
            out[r * n + n - 1] = out[r * n + n - 2];
        }
    }
    out
}

/// Fraction of cells whose grade is at or below [`BUILDABLE_GRADE`].
pub fn buildable_fraction(hf: &HeightField) -> f32 {
    let slopes = slope_field(hf);
    let buildable = slopes.iter().filter(|&&s| s <= BUILDABLE_GRADE).count();
    buildable as f32 / slopes.len() as f32
}

/// Mean/median/P90/P99 of the slope distribution.
pub fn slope_summary(hf: &HeightField) -> SlopeSummary {
    let mut slopes = slope_field(hf);
    slopes.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());
    let n = slopes.len();
    let mean = slopes.iter().sum::<f32>() / n as f32;
    let percentile = |p: f64| -> f32 {
        let idx = ((n as f64 - 1.0) * p).round() as usize;
        slopes[idx.min(n - 1)]
    };
    SlopeSummary {
        mean,
        median: percentile(0.5),
        p90: percentile(0.9),
        p99: percentile(0.99),
    }
}
