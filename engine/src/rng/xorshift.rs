//! Seeded variate source for one simulation instance
//!
//! xorshift64* with a 64-bit state. Replications differ only by seed.

use serde::{Deserialize, Serialize};

/// Per-instance xorshift64* stream lent to every callable
///
/// # Example
/// ```
/// use queue_simulator_core_rs::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let service = rng.exponential(4.0);
/// assert!(service >= 0.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngManager {
    state: u64,
}

impl RngManager {
    /// Seed a new stream
    ///
    /// A zero seed is mapped to 1 (xorshift has no zero state).
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Raw 64-bit draw
    pub fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Current internal state
    pub fn get_state(&self) -> u64 {
        self.state
    }

    /// Uniform f64 in [0.0, 1.0)
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next();
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Uniform f64 in [min, max)
    pub fn uniform(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.next_f64()
    }

    /// Exponential variate with the given rate (mean `1 / rate`)
    ///
    /// # Panics
    /// Panics if `rate` is not strictly positive
    pub fn exponential(&mut self, rate: f64) -> f64 {
        assert!(rate > 0.0, "rate must be positive");
        // 1 - u is in (0, 1], so the log is finite
        -(1.0 - self.next_f64()).ln() / rate
    }

    /// Standard normal variate (Box-Muller)
    pub fn standard_normal(&mut self) -> f64 {
        let u1 = 1.0 - self.next_f64();
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Bernoulli trial: true with probability `p`
    ///
    /// `p <= 0` is always false and `p >= 1` always true; neither consumes
    /// a draw.
    pub fn bernoulli(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.next_f64() < p
    }
}
