//! slipway-rollout — rollout strategies and rollback compensation.
//!
//! Four strategy executors (blue/green, canary, rolling, hotfix) drive
//! a release through its phases against the [`EffectDriver`] port.
//! Every phase is gated: a failing gate aborts the run with an
//! [`ExecutionError`] that already carries the compensating
//! [`RollbackPlan`](slipway_core::RollbackPlan) for the work done so
//! far. The [`Compensator`] executes that plan exactly once; if the
//! compensation itself fails, the result is a [`CriticalEscalation`]
//! carrying both failures.
//!
//! All effects are named and deterministic. The [`sim`] module provides
//! a scripted driver for dry runs and tests.

pub mod compensator;
pub mod driver;
pub mod error;
pub mod executor;
pub mod sim;

pub use compensator::{Compensator, RollbackOutcome};
pub use driver::{EffectDriver, RolloutMetrics, SlotLayout, SmokeReport};
pub use error::{CriticalEscalation, ExecutionError, ExecutionResult};
pub use executor::{StrategyExecutor, StrategyOutcome};
pub use sim::{SimDriver, SimScript};
