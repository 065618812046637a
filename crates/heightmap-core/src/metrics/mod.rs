//! Derived read-only queries over a heightfield: slope, buildability.

mod gradient;
pub mod slope;

pub use slope::{buildable_fraction, slope_field, slope_summary, BUILDABLE_GRADE, VERTICAL_SCALE_M};
