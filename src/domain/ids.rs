//! Random trace and span identifiers.
//!
//! Identifiers are drawn from a [`StdRng`] that is seeded lazily, on the first
//! draw, from the injected [`EntropySource`]. Each 64-bit id is assembled from
//! eight independently drawn bytes; 128-bit trace ids combine two draws.
//! Collisions are not prevented here (the span store re-draws on the rare
//! collision with a span it still holds).

use opentelemetry::trace::{SpanId, TraceId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::infrastructure::EntropySource;

/// Generator for span and trace identifiers.
pub struct IdGenerator {
    entropy: Box<dyn EntropySource>,
    rng: Option<StdRng>,
}

impl IdGenerator {
    /// Creates a generator. The entropy source is not consulted until the
    /// first identifier is requested.
    #[must_use]
    pub fn new(entropy: Box<dyn EntropySource>) -> Self {
        Self { entropy, rng: None }
    }

    /// Returns a uniformly distributed 64-bit value.
    pub fn next_u64(&mut self) -> u64 {
        let entropy = &mut self.entropy;
        let rng = self.rng.get_or_insert_with(|| {
            let seed = entropy.seed();
            tracing::trace!(seed, "seeding identifier generator");
            StdRng::seed_from_u64(seed)
        });

        let mut id = 0u64;
        for _ in 0..8 {
            id = (id << 8) | u64::from(rng.gen::<u8>());
        }
        id
    }

    /// Returns a non-zero span id.
    pub fn span_id(&mut self) -> SpanId {
        loop {
            let id = self.next_u64();
            if id != 0 {
                return SpanId::from_bytes(id.to_be_bytes());
            }
        }
    }

    /// Returns a non-zero 128-bit trace id built from two draws.
    pub fn trace_id(&mut self) -> TraceId {
        loop {
            let high = u128::from(self.next_u64());
            let low = u128::from(self.next_u64());
            let id = (high << 64) | low;
            if id != 0 {
                return TraceId::from_bytes(id.to_be_bytes());
            }
        }
    }

    /// Whether the generator has been seeded yet.
    #[must_use]
    pub const fn is_seeded(&self) -> bool {
        self.rng.is_some()
    }
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator")
            .field("seeded", &self.is_seeded())
            .finish_non_exhaustive()
    }
}
