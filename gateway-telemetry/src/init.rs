//! Console tracing setup for `omnigate-cli`. Console/`EnvFilter`-only:
//! grounded on `adk-telemetry::init`'s `TelemetryConfig`/`EnvFilter`/
//! `tracing_subscriber::fmt` layering, with the OTLP, ADK-span, and
//! LangSmith export backends dropped — nothing in this fabric emits spans
//! to any of those, so carrying `opentelemetry`/`langsmith-rust` would be
//! dead weight, not ambient stack.

use std::sync::Once;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// How the console logger should be configured. `RUST_LOG` always takes
/// precedence over `default_level` when both are set.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub default_level: String,
    pub log_directives: Vec<String>,
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into(), default_level: "info".to_string(), log_directives: Vec::new() }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }

    pub fn with_log_directive(mut self, directive: impl Into<String>) -> Self {
        self.log_directives.push(directive.into());
        self
    }

    /// `SERVICE_NAME` / `LOG_LEVEL` environment variables, matching the
    /// variable names `adk-telemetry::TelemetryConfig::from_env` uses.
    pub fn from_env() -> Self {
        let service_name = std::env::var("SERVICE_NAME").unwrap_or_else(|_| "omnigate".to_string());
        let default_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        Self { service_name, default_level, log_directives: Vec::new() }
    }
}

/// Installs the global `tracing` subscriber exactly once per process.
/// Idempotent: later calls are silently ignored, so library code and
/// tests can call this defensively without double-initializing.
pub fn init_telemetry(config: TelemetryConfig) {
    INIT.call_once(|| {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.default_level.clone()));
        for directive in &config.log_directives {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }

        let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).with_line_number(true);

        tracing_subscriber::registry().with(filter).with(fmt_layer).init();

        tracing::info!(service.name = %config.service_name, "telemetry initialized");
    });
}
