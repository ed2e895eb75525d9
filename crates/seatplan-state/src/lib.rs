//! seatplan-state — embedded state store for the assignment engine.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for regions, clusters, examination centers, schools, roster
//! headcounts, assignments and the skip log.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Year-scoped keys (`{exam_year_id}:{school_id}`) enable prefix scans over
//! one exam year.
//!
//! redb admits a single write transaction at a time. [`StateStore::write_scope`]
//! exposes that transaction as a [`StoreTxn`] so callers can re-validate and
//! write under the same exclusive lock.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across threads and async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::{StateStore, StoreTxn, epoch_secs};
pub use types::*;
