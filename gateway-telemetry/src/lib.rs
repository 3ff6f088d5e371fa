//! Ambient logging setup for the routing fabric binary (SPEC_FULL.md §2
//! ambient-stack supplement). Scoped to console output; OTLP/span-export
//! backends are explicitly out of scope (see `init.rs`).

pub mod init;

pub use init::{init_telemetry, TelemetryConfig};
