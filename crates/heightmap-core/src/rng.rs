//! Per-stage random number generation.
//!
//! Each stage owns a private PCG-family generator seeded from
//! `seed XOR stage_salt`, never the thread-local global generator — a
//! previous implementation mutated global RNG state and made runs
//! non-deterministic.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

const SALT_ZONE: u64 = 0x5A5A_5A5A_5A5A_5A5A;
const SALT_SYNTH: u64 = 0x1357_9BDF_2468_ACE0;
const SALT_RIDGE: u64 = 0xC0FF_EE00_D15E_A5E5;
const SALT_EROSION: u64 = 0xE205_10E5_E205_10E5;
const SALT_DETAIL: u64 = 0xDE7A_11ED_DE7A_11ED;

fn derive(seed: u64, salt: u64) -> Pcg64Mcg {
    Pcg64Mcg::seed_from_u64(seed ^ salt)
}

pub fn zone_rng(seed: u64) -> Pcg64Mcg {
    derive(seed, SALT_ZONE)
}

pub fn synth_rng(seed: u64) -> Pcg64Mcg {
    derive(seed, SALT_SYNTH)
}

pub fn ridge_rng(seed: u64) -> Pcg64Mcg {
    derive(seed, SALT_RIDGE)
}

pub fn erosion_rng(seed: u64) -> Pcg64Mcg {
    derive(seed, SALT_EROSION)
}

pub fn detail_rng(seed: u64) -> Pcg64Mcg {
    derive(seed, SALT_DETAIL)
}

/// Derive a 32-bit seed for the `noise` crate's `Perlin` constructor, which
/// only accepts a `u32`.
pub fn noise_seed32(seed: u64, salt: u64) -> u32 {
    ((seed ^ salt) & 0xFFFF_FFFF) as u32
}
