//! slipway-store — embedded deployment record store for Slipway.
//!
//! Backed by [redb](https://docs.rs/redb), persists deployment records,
//! the per-environment release index used for duplicate-version
//! detection, and the critical alert log.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value
//! columns. Records are keyed by deployment id; releases by
//! `{environment}/{version}` for direct idempotency lookups; alerts by
//! a zero-padded timestamp so iteration order is chronological.
//!
//! The `RecordStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks. Status
//! transitions are checked inside the write transaction, so a record
//! can never leave a terminal status or move backwards through the
//! phase order regardless of caller interleaving.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StoreError, StoreResult};
pub use store::{RecordOutcome, RecordStore, ReleaseMarker};
