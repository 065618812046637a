//! Shared Horn (1981) 3×3 gradient helper used by the slope metric.
//! `pub(crate)` only — not re-exported from metrics/mod.rs.

use crate::heightfield::HeightField;

/// Horn (1981) weighted 3×3 gradient at interior cell `(r, c)`.
///
/// Returns `(dz_dx, dz_dy)` — dimensionless rise/run values.
///
/// 3×3 neighbourhood layout:
/// ```text
///   NW(-1,-1)  N(-1, 0)  NE(-1,+1)
///   W ( 0,-1)  *         E ( 0,+1)
///   SW(+1,-1)  S(+1, 0)  SE(+1,+1)
/// ```
///
/// `dz/dx = ((NE + 2E + SE) − (NW + 2W + SW)) / (8 · cellsize)`
/// `dz/dy = ((NW + 2N + NE) − (SW + 2S + SE)) / (8 · cellsize)`
///
/// Caller must ensure `1 <= r <= size-2` and `1 <= c <= size-2`.
pub(crate) fn horn_gradient(hf: &HeightField, r: usize, c: usize) -> (f64, f64) {
    let cellsize = hf.cell_size_m as f64;
    let nw = hf.get(r - 1, c - 1) as f64;
    let n = hf.get(r - 1, c) as f64;
    let ne = hf.get(r - 1, c + 1) as f64;
    let w = hf.get(r, c - 1) as f64;
    let e = hf.get(r, c + 1) as f64;
    let sw = hf.get(r + 1, c - 1) as f64;
    let s = hf.get(r + 1, c) as f64;
    let se = hf.get(r + 1, c + 1) as f64;

    let dz_dx = ((ne + 2.0 * e + se) - (nw + 2.0 * w + sw)) / (8.0 * cellsize);
    let dz_dy = ((nw + 2.0 * n + ne) - (sw + 2.0 * s + se)) / (8.0 * cellsize);
    (dz_dx, dz_dy)
}
