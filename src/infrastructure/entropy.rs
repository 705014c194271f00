//! Seed sources for identifier generation.

use rand::rngs::OsRng;
use rand::RngCore;

/// Provides the one-time seed for the identifier generator.
pub trait EntropySource: Send {
    /// Returns a seed value. Called at most once per generator.
    fn seed(&mut self) -> u64;
}

/// Seeds from the operating system (or hardware) random number generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn seed(&mut self) -> u64 {
        OsRng.next_u64()
    }
}

/// Always yields the same seed, making identifier sequences reproducible.
#[derive(Debug, Clone, Copy)]
pub struct FixedEntropy {
    seed: u64,
}

impl FixedEntropy {
    /// Creates a source that always returns `seed`.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl EntropySource for FixedEntropy {
    fn seed(&mut self) -> u64 {
        self.seed
    }
}
