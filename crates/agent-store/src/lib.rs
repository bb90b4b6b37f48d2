//! Checkpoint persistence for the agent core runtime.
//!
//! Provides SQLite-backed state storage with WAL mode and mmap, behind the
//! abstract [`Checkpointer`] trait the graph runtime consumes to persist and
//! resume session state across node transitions.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Checkpointer (trait)                    │
//! ├─────────────────────────────────────────┤
//! │  SqliteCheckpointer    (production)      │
//! │  InMemoryCheckpointer  (tests)           │
//! ├─────────────────────────────────────────┤
//! │  Database (rusqlite WAL + mmap)          │
//! │  Migrations (versioned, transactional)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use agent_store::{Checkpointer, Database, SqliteCheckpointer};
//!
//! let db = Database::open_and_migrate("data/agent.db").await?;
//! let checkpoints = SqliteCheckpointer::new(db);
//! ```

pub mod checkpoint;
pub mod db;
pub mod error;
pub mod migration;

pub use checkpoint::{Checkpointer, InMemoryCheckpointer, SqliteCheckpointer};
pub use db::Database;
pub use error::{StoreError, StoreResult};
