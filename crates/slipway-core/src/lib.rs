//! slipway-core — shared foundation for the Slipway deployment engine.
//!
//! Provides the domain types (requests, records, plans, check results),
//! the pure request validator, the single validated engine configuration,
//! and the observability ports (telemetry spans, alert sink, clock) that
//! the orchestrator is constructed against.
//!
//! # Architecture
//!
//! ```text
//! DeploymentSubmission ──validate()──▶ DeploymentRequest
//!                                          │
//!                                          ▼
//!                              DeploymentRecord (lifecycle)
//!                                          │
//!                         StrategyResult / RollbackPlan / CriticalAlert
//! ```
//!
//! Everything here is infrastructure-free: no I/O, no async runtime
//! requirements beyond the trait definitions in `ports`.

pub mod config;
pub mod ports;
pub mod types;
pub mod validate;

pub use config::{ConfigError, EngineConfig, ValidationConfig};
pub use types::*;
pub use validate::{ValidationError, validate};
