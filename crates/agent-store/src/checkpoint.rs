//! Checkpoint persistence for the agent graph.
//!
//! The graph runtime persists session state after every node transition so
//! an interrupted run (HITL approval, a subagent's `ask_human`) can resume
//! later from the same point. This crate never interprets the persisted
//! state — it is an opaque JSON blob from here down; the runtime owns its
//! shape.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;

use crate::db::Database;
use crate::error::StoreResult;

/// Persists and retrieves session state keyed by `thread_id`.
///
/// `put` records the state as of a given node transition; `get` returns the
/// most recently written state for a thread, regardless of which node wrote
/// it last — resuming a run only needs "where did we leave off", not a full
/// per-node history.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Persist `state` as the result of `node` for `thread_id`.
    async fn put(&self, thread_id: &str, node: &str, state: &Value) -> StoreResult<()>;

    /// Fetch the most recently persisted state for `thread_id`, if any.
    async fn get(&self, thread_id: &str) -> StoreResult<Option<Value>>;

    /// Delete all persisted state for `thread_id` (explicit session deletion).
    async fn delete(&self, thread_id: &str) -> StoreResult<()>;
}

/// SQLite-backed checkpointer — one row per `(thread_id, node)`, most recent
/// write per thread wins on `get`.
#[derive(Clone)]
pub struct SqliteCheckpointer {
    db: Database,
}

impl SqliteCheckpointer {
    /// Create a checkpointer backed by `db`. Assumes migrations have run.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Checkpointer for SqliteCheckpointer {
    async fn put(&self, thread_id: &str, node: &str, state: &Value) -> StoreResult<()> {
        let thread_id = thread_id.to_owned();
        let node = node.to_owned();
        let state = serde_json::to_string(state)?;
        let now = Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO checkpoints (thread_id, node, state, updated_at) \
                     VALUES (?1, ?2, ?3, ?4) \
                     ON CONFLICT(thread_id, node) DO UPDATE SET \
                        state = excluded.state, updated_at = excluded.updated_at",
                    rusqlite::params![thread_id, node, state, now],
                )?;
                Ok(())
            })
            .await
    }

    async fn get(&self, thread_id: &str) -> StoreResult<Option<Value>> {
        let thread_id = thread_id.to_owned();
        let raw: Option<String> = self
            .db
            .execute(move |conn| {
                let result: Result<String, rusqlite::Error> = conn.query_row(
                    "SELECT state FROM checkpoints WHERE thread_id = ?1 \
                     ORDER BY updated_at DESC LIMIT 1",
                    rusqlite::params![thread_id],
                    |row| row.get(0),
                );
                match result {
                    Ok(state) => Ok(Some(state)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(other) => Err(other.into()),
                }
            })
            .await?;

        raw.map(|s| serde_json::from_str(&s).map_err(Into::into))
            .transpose()
    }

    async fn delete(&self, thread_id: &str) -> StoreResult<()> {
        let thread_id = thread_id.to_owned();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "DELETE FROM checkpoints WHERE thread_id = ?1",
                    rusqlite::params![thread_id],
                )?;
                Ok(())
            })
            .await
    }
}

/// In-memory checkpointer for tests — keeps only the most recent state per
/// thread, same resume semantics as the SQLite implementation.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointer {
    states: Arc<DashMap<String, Value>>,
}

impl InMemoryCheckpointer {
    /// Create an empty in-memory checkpointer.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn put(&self, thread_id: &str, _node: &str, state: &Value) -> StoreResult<()> {
        self.states.insert(thread_id.to_owned(), state.clone());
        Ok(())
    }

    async fn get(&self, thread_id: &str) -> StoreResult<Option<Value>> {
        Ok(self.states.get(thread_id).map(|e| e.value().clone()))
    }

    async fn delete(&self, thread_id: &str) -> StoreResult<()> {
        self.states.remove(thread_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn in_memory_roundtrip() {
        let cp = InMemoryCheckpointer::new();
        assert!(cp.get("t1").await.unwrap().is_none());

        cp.put("t1", "planner", &json!({"loops": 1})).await.unwrap();
        assert_eq!(cp.get("t1").await.unwrap(), Some(json!({"loops": 1})));

        cp.put("t1", "tools", &json!({"loops": 2})).await.unwrap();
        assert_eq!(cp.get("t1").await.unwrap(), Some(json!({"loops": 2})));
    }

    #[tokio::test]
    async fn in_memory_delete() {
        let cp = InMemoryCheckpointer::new();
        cp.put("t1", "planner", &json!({})).await.unwrap();
        cp.delete("t1").await.unwrap();
        assert!(cp.get("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        let cp = SqliteCheckpointer::new(db);

        assert!(cp.get("t1").await.unwrap().is_none());

        cp.put("t1", "planner", &json!({"loops": 1})).await.unwrap();
        assert_eq!(cp.get("t1").await.unwrap(), Some(json!({"loops": 1})));
    }

    #[tokio::test]
    async fn sqlite_most_recent_node_wins_on_get() {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        let cp = SqliteCheckpointer::new(db);

        cp.put("t1", "planner", &json!({"node": "planner"}))
            .await
            .unwrap();
        cp.put("t1", "tools", &json!({"node": "tools"}))
            .await
            .unwrap();

        assert_eq!(
            cp.get("t1").await.unwrap(),
            Some(json!({"node": "tools"}))
        );
    }

    #[tokio::test]
    async fn sqlite_put_same_node_updates_in_place() {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        let cp = SqliteCheckpointer::new(db);

        cp.put("t1", "planner", &json!({"loops": 1})).await.unwrap();
        cp.put("t1", "planner", &json!({"loops": 2})).await.unwrap();

        assert_eq!(cp.get("t1").await.unwrap(), Some(json!({"loops": 2})));
    }

    #[tokio::test]
    async fn sqlite_threads_are_isolated() {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        let cp = SqliteCheckpointer::new(db);

        cp.put("t1", "planner", &json!({"thread": "t1"})).await.unwrap();
        cp.put("t2", "planner", &json!({"thread": "t2"})).await.unwrap();

        assert_eq!(cp.get("t1").await.unwrap(), Some(json!({"thread": "t1"})));
        assert_eq!(cp.get("t2").await.unwrap(), Some(json!({"thread": "t2"})));
    }
}
