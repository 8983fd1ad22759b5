//! Casbin adapter backed by a relational table
//!
//! Policy rules are stored one per row: a rule-type column (`ptype`) followed
//! by positional value columns (`v0`..`v5` by default). Table and column names
//! are configurable so the adapter can sit on top of an existing schema.
//!
//! The adapter holds no cache. `casbin` keeps its own in-memory copy after
//! `load_policy`, and every mutation with auto-save enabled is written straight
//! to the table. Batch mutations run in a single transaction.

pub mod adapter;
pub mod error;
pub mod fields;
pub mod query;
pub mod rule;
pub mod settings;
pub mod updatable;

#[cfg(test)]
mod testing;

pub use adapter::{AdapterOptions, TableAdapter};
pub use error::{Result, StoreError};
pub use fields::{FieldNames, FieldNamesOverride, DEFAULT_TABLE_NAME, MIN_VALUE_COLUMNS};
pub use rule::RuleRow;
pub use settings::{create_pool, AdapterSettings};
pub use updatable::UpdatableAdapter;
