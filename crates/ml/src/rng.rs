//! Sampling helpers on top of an explicitly owned [`fastrand::Rng`].
//!
//! Nothing in this crate touches the thread-local generator; every random
//! draw goes through a generator the caller seeded.

/// Standard normal sample (Box–Muller).
pub fn normal(rng: &mut fastrand::Rng) -> f64 {
    // 1 - u keeps the logarithm argument in (0, 1].
    let u1 = 1.0 - rng.f64();
    let u2 = rng.f64();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Uniform sample in `[low, high)`; returns `low` for a degenerate interval.
pub fn uniform(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    if high > low {
        (high - low).mul_add(rng.f64(), low)
    } else {
        low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_has_unit_moments() {
        let mut rng = fastrand::Rng::with_seed(7);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| normal(&mut rng)).collect();
        let mean = samples.iter().sum::<f64>() / f64::from(n);
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / f64::from(n);
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.05, "var {var}");
        assert!(samples.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = fastrand::Rng::with_seed(3);
        let mut b = fastrand::Rng::with_seed(3);
        for _ in 0..10 {
            assert_eq!(normal(&mut a).to_bits(), normal(&mut b).to_bits());
        }
    }

    #[test]
    fn uniform_stays_in_range() {
        let mut rng = fastrand::Rng::with_seed(11);
        for _ in 0..1000 {
            let x = uniform(&mut rng, 2.0, 3.0);
            assert!((2.0..3.0).contains(&x));
        }
        assert_eq!(uniform(&mut rng, 5.0, 5.0), 5.0);
    }
}
