//! Probability distributions for rider inter-arrival times.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

/// Trait for sampling inter-arrival times (in milliseconds).
pub trait InterArrivalDistribution: Send + Sync + std::fmt::Debug {
    /// Sample the next inter-arrival time in milliseconds.
    /// `sample_index` is the number of samples drawn so far.
    fn sample_ms(&self, sample_index: u64) -> f64;
}

/// Uniform distribution: constant inter-arrival time.
#[derive(Debug, Clone)]
pub struct UniformInterArrival {
    /// Inter-arrival time in milliseconds.
    pub interval_ms: f64,
}

impl UniformInterArrival {
    pub fn new(interval_ms: f64) -> Self {
        Self { interval_ms }
    }
}

impl InterArrivalDistribution for UniformInterArrival {
    fn sample_ms(&self, _sample_index: u64) -> f64 {
        self.interval_ms
    }
}

/// Exponential distribution: a Poisson arrival process with a fixed mean gap.
#[derive(Debug, Clone)]
pub struct ExponentialInterArrival {
    /// Mean inter-arrival time in milliseconds.
    pub mean_interval_ms: f64,
    /// Seed for RNG (for reproducibility).
    pub seed: u64,
}

impl ExponentialInterArrival {
    pub fn new(mean_interval_ms: f64, seed: u64) -> Self {
        Self {
            mean_interval_ms: mean_interval_ms.max(0.0),
            seed,
        }
    }

    /// Create from rate (arrivals per second). A non-positive rate never fires.
    pub fn from_rate(rate_per_sec: f64, seed: u64) -> Self {
        if rate_per_sec <= 0.0 {
            return Self {
                mean_interval_ms: f64::INFINITY,
                seed,
            };
        }
        Self::new(1000.0 / rate_per_sec, seed)
    }
}

impl InterArrivalDistribution for ExponentialInterArrival {
    fn sample_ms(&self, sample_index: u64) -> f64 {
        if !self.mean_interval_ms.is_finite() {
            return f64::INFINITY;
        }
        // Each sample gets its own stream so results do not depend on call order elsewhere.
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(sample_index));
        let u: f64 = rng.gen();
        let u = u.max(1e-10);
        -u.ln() * self.mean_interval_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_is_constant() {
        let dist = UniformInterArrival::new(1500.0);
        assert_eq!(dist.sample_ms(0), 1500.0);
        assert_eq!(dist.sample_ms(99), 1500.0);
    }

    #[test]
    fn exponential_is_reproducible() {
        let a = ExponentialInterArrival::new(2000.0, 42);
        let b = ExponentialInterArrival::new(2000.0, 42);
        for i in 0..20 {
            assert_eq!(a.sample_ms(i), b.sample_ms(i));
            assert!(a.sample_ms(i) >= 0.0);
        }
    }

    #[test]
    fn exponential_mean_is_close_to_configured() {
        let dist = ExponentialInterArrival::new(1000.0, 7);
        let n = 20_000;
        let mean = (0..n).map(|i| dist.sample_ms(i)).sum::<f64>() / n as f64;
        assert!((mean - 1000.0).abs() < 50.0, "mean was {mean}");
    }

    #[test]
    fn zero_rate_never_fires() {
        let dist = ExponentialInterArrival::from_rate(0.0, 1);
        assert!(dist.sample_ms(0).is_infinite());
        assert_eq!(ExponentialInterArrival::from_rate(2.0, 1).mean_interval_ms, 500.0);
    }
}
