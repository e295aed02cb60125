//! Uniform random sources for jitter policies.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of uniformly distributed integers.
///
/// Jitter policies draw whole microseconds from a source. The source is
/// injected at construction, so tests can supply a deterministic one
/// (see [`crate::testing`]) while production code uses [`ThreadRandom`].
///
/// Implementations must be shareable across threads because policies are.
pub trait RandomSource: Debug + Send + Sync {
    /// Returns a value uniformly distributed over `0..=upper`.
    fn uniform(&self, upper: u64) -> u64;
}

impl<R: RandomSource + ?Sized> RandomSource for Arc<R> {
    fn uniform(&self, upper: u64) -> u64 {
        (**self).uniform(upper)
    }
}

/// Draws from the calling thread's own generator.
///
/// Every thread gets an independent stream and no lock is taken. This is
/// the default source for the plain jitter constructors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn uniform(&self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        rand::rng().random_range(0..=upper)
    }
}

/// A reproducible source seeded once at construction.
///
/// The generator is shared behind a mutex, so draws from concurrent retry
/// loops interleave in an unspecified order. Use one per loop when exact
/// replay matters.
///
/// # Examples
///
/// ```rust
/// use retry_algebra::{RandomSource, SeededRandom};
///
/// let a = SeededRandom::new(7);
/// let b = SeededRandom::new(7);
/// assert_eq!(a.uniform(1_000), b.uniform(1_000));
/// ```
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    /// Create a source whose stream is fully determined by `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn uniform(&self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        // A panic mid-draw cannot leave the generator in a bad state.
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        rng.random_range(0..=upper)
    }
}
