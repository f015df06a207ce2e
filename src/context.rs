//! Explicit randomness and time budget passed to the optimizers.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};

/// Wall-clock budget started at construction.
#[derive(Debug, Clone)]
pub struct TimeBudget {
    start: Instant,
    limit: Duration,
}

impl TimeBudget {
    /// Budget of `seconds` (negative or NaN values count as zero).
    pub fn new(seconds: f64) -> Self {
        let limit = if seconds.is_nan() || seconds <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
        };
        TimeBudget {
            start: Instant::now(),
            limit,
        }
    }

    pub fn unlimited() -> Self {
        TimeBudget {
            start: Instant::now(),
            limit: Duration::MAX,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// True once the elapsed time reaches the limit. A zero budget is expired
    /// from the start.
    pub fn expired(&self) -> bool {
        self.elapsed() >= self.limit
    }
}

/// Random source plus clock for one optimization run.
#[derive(Debug, Clone)]
pub struct SolveContext {
    pub rng: ChaCha8Rng,
    pub budget: TimeBudget,
}

impl SolveContext {
    pub fn new(rng: ChaCha8Rng, budget: TimeBudget) -> Self {
        SolveContext { rng, budget }
    }

    pub fn seeded(seed: u64, time_limit: f64) -> Self {
        SolveContext {
            rng: ChaCha8Rng::seed_from_u64(seed),
            budget: TimeBudget::new(time_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_zero_budget_is_expired() {
        assert!(TimeBudget::new(0.0).expired());
        assert!(TimeBudget::new(-3.0).expired());
        assert!(!TimeBudget::new(3600.0).expired());
        assert!(!TimeBudget::unlimited().expired());
        assert!(!TimeBudget::new(f64::INFINITY).expired());
    }

    #[test]
    fn test_seeded_context_is_reproducible() {
        let mut a = SolveContext::seeded(7, 1.0);
        let mut b = SolveContext::seeded(7, 1.0);
        let xs: Vec<u32> = (0..8).map(|_| a.rng.gen()).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.rng.gen()).collect();
        assert_eq!(xs, ys);
    }
}
