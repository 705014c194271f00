//! Diagnostics for the telemetry engine itself.
//!
//! The engine reports on its own behaviour on two channels:
//!
//! - structured `tracing` events from the storage and export layers, for
//!   developers
//! - short operator messages (cleanup passes, export outcomes, summaries)
//!   through the injected [`Logger`]
//!
//! # Architecture
//!
//! ```text
//! storage / export ──tracing::debug!────────────────┐
//!                                                    ├─▶ tracing-subscriber → stderr
//! facade / capacity ──Logger──▶ TracingLogger ──────┘
//!                          └──▶ MemoryLogger / NoopLogger / firmware sink
//! ```
//!
//! # Configuration
//!
//! The subscriber level is controlled via:
//! 1. `trace_level` option in the engine configuration (highest priority)
//! 2. `RUST_LOG` environment variable
//! 3. Default: `"info"`
//!
//! # Modules
//!
//! - [`init`]: Tracing initialization and subscriber setup
//! - [`logger`]: The `Logger` capability and its implementations

pub mod init;
pub mod logger;

pub use init::init_tracing;
pub use logger::{Logger, MemoryLogger, NoopLogger, TracingLogger};
