//! Tracing initialization and subscriber setup.
//!
//! This module installs the `tracing` subscriber that receives the crate's own
//! diagnostics: the structured events emitted by the storage and export layers
//! and the operator messages routed through [`super::TracingLogger`].

use crate::Config;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter applied when neither the configuration nor `RUST_LOG` sets one.
const DEFAULT_FILTER: &str = "info";

/// Initializes the global tracing subscriber.
///
/// Sets up a subscriber pipeline that:
/// 1. Filters events by the resolved level
/// 2. Formats them as single lines on stderr
///
/// # Parameters
///
/// * `config` - Engine configuration containing the `trace_level` option
///
/// # Level Resolution
///
/// The filter directive is taken from:
/// 1. `config.trace_level` if set
/// 2. The `RUST_LOG` environment variable
/// 3. Default: `"info"`
///
/// # Initialization Behavior
///
/// Idempotent: only the first call in a process installs a subscriber; later
/// calls (or a subscriber installed by the host) are left untouched. An
/// invalid directive falls back to the default filter.
///
/// # Example
///
/// ```rust
/// use otel_edge::observability::init_tracing;
/// use otel_edge::Config;
///
/// let config = Config {
///     trace_level: Some("otel_edge=debug".to_string()),
///     ..Default::default()
/// };
///
/// init_tracing(&config);
/// init_tracing(&config);
///
/// tracing::debug!("tracing is now active");
/// ```
pub fn init_tracing(config: &Config) {
    let filter = match config.trace_level.as_deref() {
        Some(directive) => EnvFilter::try_new(directive).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true));

    if subscriber.try_init().is_ok() {
        tracing::debug!(service = %config.service_name, "tracing initialized");
    }
}
