//! slipway-engine — the deployment orchestrator.
//!
//! Ties the pieces together: request validation (slipway-core), the
//! preflight runner (slipway-preflight), strategy execution and
//! rollback compensation (slipway-rollout), and the record store
//! (slipway-store). One [`Orchestrator::run`] call drives a submission
//! to a terminal record status and either a [`DeploymentTicket`] or an
//! [`EngineError`] that tells the caller exactly how far the run got.

pub mod error;
pub mod orchestrator;

pub use error::{EngineError, EngineResult};
pub use orchestrator::{DeploymentTicket, Orchestrator};
