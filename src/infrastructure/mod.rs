//! Infrastructure layer for platform services the engine depends on.
//!
//! Time and randomness are owned by the host firmware. The engine consumes them
//! through the narrow [`Clock`] and [`EntropySource`] traits so deterministic
//! providers can be substituted in tests or replay tooling.

pub mod clock;
pub mod entropy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entropy::{EntropySource, FixedEntropy, OsEntropy};
