//! slipway-preflight — environment readiness checks for Slipway.
//!
//! Before a strategy executes, five checks read the target environment
//! through the [`SignalSource`] port and decide whether the deployment
//! may proceed: system health score, resource headroom, dependency
//! reachability, security posture, and backup freshness.
//!
//! The [`Preflight`] runner spawns every check concurrently with a
//! per-check timeout and joins them all before aggregating, so one
//! report enumerates every failure instead of stopping at the first.

pub mod checks;
pub mod runner;
pub mod signal;
pub mod sim;

pub use checks::{CheckOutcome, PreflightCheck};
pub use runner::Preflight;
pub use signal::{DependencyStatus, ResourceUsage, SecurityPosture, SignalSource};
pub use sim::SimSignals;
