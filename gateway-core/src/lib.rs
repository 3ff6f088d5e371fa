//! Core types shared by every crate in the Omnigate request-routing fabric:
//! the error enum, the generic min-heap, endpoint identity, an
//! OpenAI-shaped request/response vocabulary, routing configuration, and an
//! injectable clock.

pub mod clock;
pub mod config;
pub mod content;
pub mod error;
pub mod heap;
pub mod ids;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::{
    AdaptiveConfig, CircuitBreakerConfig, PerformanceWeights, RoutingConfig, RoutingConfigPatch,
    Strategy,
};
pub use content::{ChatChoice, ChatMessage, ChatRequest, ChatResponse, ContentPart, ImageUrl,
    MessageContent, Usage};
pub use error::{GatewayError, Result};
pub use heap::{max_heap, Heap};
pub use ids::{Capability, EndpointId};
