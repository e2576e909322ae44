//! redb table definitions for the Slipway record store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized
//! domain types).

use redb::TableDefinition;

/// Deployment records keyed by `{deployment_id}`.
pub const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// Completed release markers keyed by `{environment}/{version}`.
pub const RELEASES: TableDefinition<&str, &[u8]> = TableDefinition::new("releases");

/// Critical alerts keyed by `{raised_at_millis:020}:{deployment_id}` so
/// lexicographic iteration yields chronological order.
pub const ALERTS: TableDefinition<&str, &[u8]> = TableDefinition::new("alerts");
