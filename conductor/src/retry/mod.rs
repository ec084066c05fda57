//! Retry and circuit-breaking contract for peer requests (§4.12).

pub mod backoff;
pub mod circuit_breaker;

pub use backoff::BackoffPolicy;
pub use circuit_breaker::{CircuitBreaker, CircuitState};
