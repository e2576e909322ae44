//! slipway-infra — production adapters for the orchestration ports.
//!
//! Two HTTP adapters connect the engine to a real operations plane:
//! [`HttpSignalSource`] reads preflight telemetry and [`WebhookDriver`]
//! executes rollout effects, both over a minimal one-connection-per-
//! request HTTP/1.1 client. The deterministic in-process doubles used
//! by dry runs are re-exported here so the daemon wires either flavor
//! from one place.

pub mod client;
pub mod effects;
pub mod signals;

pub use client::HttpClient;
pub use effects::WebhookDriver;
pub use signals::HttpSignalSource;

// Deterministic doubles for dry runs.
pub use slipway_preflight::sim::SimSignals;
pub use slipway_rollout::sim::{SimDriver, SimScript};
