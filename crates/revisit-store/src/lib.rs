//! revisit-store: durable state for revisit
//!
//! An embedded turso (SQLite-compatible) database holding three tables:
//!
//! ```text
//! checkpoint     (key TEXT PRIMARY KEY, value TEXT)
//! neighbor_stats (counterparty TEXT PRIMARY KEY, likes, comments, replies)
//! visit_ledger   (counterparty TEXT PRIMARY KEY, last_engaged_at, count)
//! ```
//!
//! [`Database`] implements the `CheckpointStore`, `StatsStore` and
//! `VisitLedger` seams from `revisit-core`. A scan commit updates counters
//! and checkpoint inside a single transaction.
//!
//! ```no_run
//! use revisit_store::Database;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::open(".revisit/revisit.db").await?;
//! db.init_schema().await?;
//! # Ok(())
//! # }
//! ```

pub mod db;

pub use db::{Database, DbError};
