//! Seeded randomness: uniform primitives, weighted interval picks and the
//! exponential inter-arrival draws the stream generator lives on.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// One weighted interval of a percentage partition.
#[derive(Debug, Clone, Copy)]
pub struct RandInterval {
    pub pcts_total: u32,
    pub from_pct: u32,
    pub to_pct: u32,
}

impl RandInterval {
    /// Builds cumulative intervals from the allotted percentages. The
    /// percentages must total exactly 100.
    pub fn build(pcts: &[u32]) -> Vec<RandInterval> {
        let mut intervals = Vec::with_capacity(pcts.len());
        let mut accum = 0u32;
        for &pct in pcts {
            intervals.push(RandInterval {
                pcts_total: pct,
                from_pct: accum,
                to_pct: accum + pct,
            });
            accum += pct;
        }
        assert!(accum == 100, "interval percentages must total 100, got {}", accum);
        intervals
    }
}

/// Deterministically seeded random source.
pub struct Rand {
    rng: StdRng,
}

impl Rand {
    /// Seeds from the supplied value, or from the wall clock when none is
    /// given. Returns the seed actually used so it can be reported.
    pub fn from_seed(seed: Option<u64>) -> (Rand, u64) {
        let seed = seed.unwrap_or_else(clock_seed);
        (
            Rand {
                rng: StdRng::seed_from_u64(seed),
            },
            seed,
        )
    }

    #[inline]
    pub fn uint32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    /// Uniform integer in the inclusive range `[from, to]`.
    #[inline]
    pub fn int_range(&mut self, from: u32, to: u32) -> u32 {
        self.rng.gen_range(from..=to)
    }

    #[inline]
    pub fn capital_letter(&mut self) -> u8 {
        self.rng.gen_range(b'A'..=b'Z')
    }

    /// Uniform float in `(0, 1]`; never zero, so a logarithm of it is finite.
    #[inline]
    pub fn uniform_open(&mut self) -> f64 {
        1.0 - self.rng.gen::<f64>()
    }

    /// Exponential inter-arrival time for a process of `rate` events/sec.
    #[inline]
    pub fn exp_by_rate(&mut self, rate: f64) -> f64 {
        -self.uniform_open().ln() / rate
    }

    /// Exponential holding time with the given mean.
    #[inline]
    pub fn exp_by_mean(&mut self, mean: f64) -> f64 {
        -self.uniform_open().ln() * mean
    }

    /// Picks one interval index according to the percentage weights.
    pub fn choose(&mut self, intervals: &[RandInterval]) -> usize {
        let pct = self.rng.gen_range(0..100u32);
        for (i, interval) in intervals.iter().enumerate() {
            if pct < interval.to_pct {
                return i;
            }
        }
        unreachable!("intervals cover 0..100 by construction");
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is set before the unix epoch")
        .as_nanos() as u64
}

/// Whole seconds of a floating-point timestamp.
#[inline]
pub fn dtime_to_sec(dtime: f64) -> u32 {
    dtime.trunc() as u32
}

/// Nanosecond remainder of a floating-point timestamp.
#[inline]
pub fn dtime_to_nsec(dtime: f64) -> u32 {
    ((dtime - dtime.trunc()) * 1.0e9).trunc() as u32
}

/// Microsecond remainder of a floating-point timestamp.
#[inline]
pub fn dtime_to_usec(dtime: f64) -> u32 {
    ((dtime - dtime.trunc()) * 1.0e6).trunc() as u32
}
