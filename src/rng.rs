//! Seeding for the particle generators. Not for anything security related.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Seeded from the browser's crypto source when the `rng` feature is on,
/// otherwise from `performance.now()`.
pub fn from_entropy() -> SmallRng {
    SmallRng::seed_from_u64(entropy_seed())
}

/// Uniform in `[-half, half)`; a zero `half` yields zero instead of an empty range.
pub fn spread(rng: &mut impl Rng, half: f64) -> f64 {
    (rng.r#gen::<f64>() * 2.0 - 1.0) * half
}

/// Uniform in `[0, extent)` for viewport sizes that may still be zero.
pub fn within(rng: &mut impl Rng, extent: f64) -> f64 {
    rng.r#gen::<f64>() * extent
}

#[cfg(feature = "rng")]
fn entropy_seed() -> u64 {
    let mut buf = [0u8; 8];
    match getrandom::getrandom(&mut buf) {
        Ok(()) => u64::from_le_bytes(buf),
        Err(err) => {
            log::warn!("getrandom failed ({err}); seeding from the clock");
            clock_seed()
        }
    }
}

#[cfg(not(feature = "rng"))]
fn entropy_seed() -> u64 {
    clock_seed()
}

fn clock_seed() -> u64 {
    #[cfg(target_arch = "wasm32")]
    let now = crate::background::frame::now_ms();
    #[cfg(not(target_arch = "wasm32"))]
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0);
    (now * 1000.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spread_and_within_stay_in_bounds() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let s = spread(&mut rng, 0.25);
            assert!((-0.25..0.25).contains(&s));
            let w = within(&mut rng, 800.0);
            assert!((0.0..800.0).contains(&w));
        }
    }

    #[test]
    fn test_empty_extents_yield_zero() {
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(spread(&mut rng, 0.0), 0.0);
        assert_eq!(within(&mut rng, 0.0), 0.0);
    }

    #[test]
    fn test_entropy_seeded_generators_differ_from_a_fixed_seed() {
        let mut a = from_entropy();
        let mut b = SmallRng::seed_from_u64(0);
        let xs: Vec<u64> = (0..4).map(|_| a.r#gen()).collect();
        let ys: Vec<u64> = (0..4).map(|_| b.r#gen()).collect();
        assert_ne!(xs, ys);
    }
}
