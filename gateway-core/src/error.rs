//! The gateway-wide error enum.
//!
//! Every subsystem in the routing fabric returns [`Result<T>`] built on top
//! of [`GatewayError`]. Variants map directly onto the error kinds of the
//! routing-fabric specification (§7): `NoCandidates`, `RateLimited`,
//! `QuotaExceeded`, `UpstreamProtocol`, `Unsupported`, `Cancelled`,
//! `Internal`, plus a couple of plumbing variants (`Config`, `Io`) that the
//! spec doesn't name but any real deployment needs.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Routing found no endpoint at all (filtered list AND unfiltered
    /// fallback both empty). Fatal for the request.
    #[error("no endpoints available for this request")]
    NoCandidates,

    /// The state store's rate gate denied the call; retry after `wait_for`.
    #[error("rate limited, retry after {wait_for:?}")]
    RateLimited { wait_for: Duration },

    /// Upstream returned HTTP 429. The endpoint has been disabled in the
    /// state store for a provider-recommended back-off.
    #[error("quota exceeded on {provider}/{region}: {message}")]
    QuotaExceeded { provider: String, region: String, message: String },

    /// Upstream returned a non-2xx (other than 429) or a malformed body.
    #[error("upstream protocol error from {provider}/{region}: {message}")]
    UpstreamProtocol { provider: String, region: String, message: String },

    /// The adapter doesn't implement the requested capability. Never counts
    /// as a circuit-breaker failure — it isn't a reliability signal.
    #[error("{provider} does not support {capability}")]
    Unsupported { provider: String, capability: String },

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// An invariant was violated. Never retried.
    #[error("internal invariant violated: {0}")]
    Internal(String),

    /// Configuration failed to load or validate.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level IO failure (HTTP client, network, serialization).
    #[error("io error: {0}")]
    Io(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn unsupported(provider: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::Unsupported { provider: provider.into(), capability: capability.into() }
    }

    pub fn upstream_protocol(
        provider: impl Into<String>,
        region: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::UpstreamProtocol {
            provider: provider.into(),
            region: region.into(),
            message: message.into(),
        }
    }

    pub fn quota_exceeded(
        provider: impl Into<String>,
        region: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::QuotaExceeded {
            provider: provider.into(),
            region: region.into(),
            message: message.into(),
        }
    }

    /// Whether this error should count against a circuit breaker's
    /// consecutive-failure tally. Matches the propagation policy of §7:
    /// `Unsupported`, `NoCandidates`, `Cancelled`, and config/internal
    /// errors are not reliability signals for a *specific endpoint*.
    pub fn counts_as_breaker_failure(&self) -> bool {
        matches!(self, Self::UpstreamProtocol { .. } | Self::QuotaExceeded { .. })
    }

    /// Whether the orchestrator may attempt one fallback routing pass.
    pub fn allows_fallback(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::QuotaExceeded { .. })
    }

    /// The OpenAI-shaped error `type` field for the HTTP envelope.
    pub fn openai_error_type(&self) -> &'static str {
        match self {
            Self::NoCandidates => "no_endpoints_available",
            Self::RateLimited { .. } => "rate_limit_exceeded",
            Self::QuotaExceeded { .. } => "insufficient_quota",
            Self::UpstreamProtocol { .. } => "upstream_error",
            Self::Unsupported { .. } => "unsupported_operation",
            Self::Cancelled => "request_cancelled",
            Self::Internal(_) => "internal_error",
            Self::Config(_) => "configuration_error",
            Self::Io(_) => "io_error",
            Self::Other(_) => "internal_error",
        }
    }

    /// The HTTP status code the client-facing envelope should carry.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NoCandidates => 503,
            Self::RateLimited { .. } => 429,
            Self::QuotaExceeded { .. } => 429,
            Self::UpstreamProtocol { .. } => 502,
            Self::Unsupported { .. } => 400,
            Self::Cancelled => 499,
            Self::Internal(_) => 500,
            Self::Config(_) => 500,
            Self::Io(_) => 502,
            Self::Other(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_failure_classification_matches_policy() {
        assert!(GatewayError::upstream_protocol("openai", "us", "bad gateway")
            .counts_as_breaker_failure());
        assert!(
            GatewayError::quota_exceeded("openai", "us", "429").counts_as_breaker_failure()
        );
        assert!(!GatewayError::NoCandidates.counts_as_breaker_failure());
        assert!(!GatewayError::Cancelled.counts_as_breaker_failure());
        assert!(!GatewayError::unsupported("ollama", "embedding").counts_as_breaker_failure());
    }

    #[test]
    fn fallback_eligibility_matches_policy() {
        assert!(GatewayError::RateLimited { wait_for: Duration::from_millis(1) }.allows_fallback());
        assert!(GatewayError::quota_exceeded("a", "b", "c").allows_fallback());
        assert!(!GatewayError::NoCandidates.allows_fallback());
        assert!(!GatewayError::Internal("oops".into()).allows_fallback());
    }

    #[test]
    fn http_status_codes_are_sane() {
        assert_eq!(GatewayError::NoCandidates.http_status(), 503);
        assert_eq!(
            GatewayError::RateLimited { wait_for: Duration::ZERO }.http_status(),
            429
        );
        assert_eq!(GatewayError::Internal("x".into()).http_status(), 500);
    }
}
