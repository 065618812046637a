//! Fractal gradient-noise building blocks shared by every generation stage.

pub mod fbm;

pub use fbm::Fbm;
