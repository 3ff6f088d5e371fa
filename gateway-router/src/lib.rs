//! The multi-strategy router (spec §4.E): filters candidates by breaker
//! state, scores survivors under the configured strategy (or the adaptive
//! meta-strategy's current pick), and feeds outcomes back into
//! `omnigate-metrics`.

pub mod adaptive;
pub mod cost;
pub mod router;
pub mod status;
pub mod strategy;

pub use adaptive::{AdaptiveState, FleetSnapshot, StrategyChange};
pub use cost::{estimate_request_cost, estimate_tokens, normalize_model_name, ModelPricing, PricingTable};
pub use router::Router;
pub use status::{CapabilityDescriptor, EndpointStatus};
