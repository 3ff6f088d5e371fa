//! The orchestrator (spec §4.I): glues the cache, router, and state-store
//! contracts into the single-request pipeline, owning the
//! active-connections increment/decrement guarantee (spec §5).

pub mod guard;
pub mod pipeline;

pub use guard::ActiveGuard;
pub use pipeline::{Gateway, OrchestratorConfig};
