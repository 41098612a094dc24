//! Resilience primitives for the external stages
//!
//! - [`CircuitBreaker`]: shared, per-provider failure isolation
//! - [`RetryPolicy`]: bounded retry with exponential backoff
//! - [`ResilientStage`]: both of them plus a per-call timeout around one call

pub mod breaker;
pub mod retry;
pub mod stage;

pub use breaker::{BreakerConfig, BreakerState, CallPermit, CircuitBreaker};
pub use retry::RetryPolicy;
pub use stage::ResilientStage;
