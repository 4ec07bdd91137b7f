use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use beacon_types::{KeepPolicy, MetaMap, StorageScope};

use crate::error::{Error, Result};
use crate::schema::init_schema;

/// One cached-but-unsent record.
#[derive(Debug, Clone)]
pub struct OutboxRecord {
    pub id: String,
    pub kind: String,
    /// Wire JSON of the record, everything-dump form.
    pub body: serde_json::Value,
    pub created_ms: i64,
}

/// Durable local cache: storage entries, the unsent-record outbox, and
/// small key-value state (device id, module cursor, super-metadata).
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        init_schema(&store.conn)?;
        store.release_taken_all()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        init_schema(&store.conn)?;
        Ok(store)
    }

    // --- storage entries ---

    /// Write a storage entry under the given keep policy.
    pub fn put_entry(
        &self,
        scope: StorageScope,
        name: &str,
        policy: KeepPolicy,
        payload: &MetaMap,
        created_ms: i64,
    ) -> Result<()> {
        if policy == KeepPolicy::KeepLatest {
            self.conn.execute(
                "DELETE FROM entries WHERE scope = ?1 AND name = ?2",
                params![scope.as_str(), name],
            )?;
        }
        self.conn.execute(
            "INSERT INTO entries (scope, name, payload, created_ms) VALUES (?1, ?2, ?3, ?4)",
            params![
                scope.as_str(),
                name,
                payload.to_json_object().to_string(),
                created_ms
            ],
        )?;
        Ok(())
    }

    /// All stored payloads for a name, oldest first.
    pub fn get_entries(&self, scope: StorageScope, name: &str) -> Result<Vec<MetaMap>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM entries WHERE scope = ?1 AND name = ?2 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![scope.as_str(), name], |row| {
            row.get::<_, String>(0)
        })?;

        let mut payloads = Vec::new();
        for row in rows {
            let text = row?;
            let value: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| Error::Corrupt(format!("entry '{}': {}", name, e)))?;
            let map = MetaMap::from_json_object(&value)
                .map_err(|e| Error::Corrupt(format!("entry '{}': {}", name, e)))?;
            payloads.push(map);
        }
        Ok(payloads)
    }

    pub fn remove_entry(&self, scope: StorageScope, name: &str) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM entries WHERE scope = ?1 AND name = ?2",
            params![scope.as_str(), name],
        )?;
        Ok(removed)
    }

    pub fn remove_all(&self, scope: StorageScope) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM entries WHERE scope = ?1",
            params![scope.as_str()],
        )?;
        Ok(removed)
    }

    // --- outbox ---

    pub fn outbox_push(
        &self,
        id: &str,
        kind: &str,
        body: &serde_json::Value,
        created_ms: i64,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO outbox (id, kind, body, created_ms)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET body = ?3
            "#,
            params![id, kind, body.to_string(), created_ms],
        )?;
        Ok(())
    }

    /// Unclaimed records of one kind, insertion order, up to `limit`.
    pub fn outbox_pending(&self, kind: &str, limit: usize) -> Result<Vec<OutboxRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, kind, body, created_ms FROM outbox
            WHERE kind = ?1 AND taken = 0 AND pending_delete = 0
            ORDER BY created_ms ASC, id ASC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![kind, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, kind, body, created_ms) = row?;
            let body: serde_json::Value = serde_json::from_str(&body)
                .map_err(|e| Error::Corrupt(format!("outbox '{}': {}", id, e)))?;
            records.push(OutboxRecord {
                id,
                kind,
                body,
                created_ms,
            });
        }
        Ok(records)
    }

    pub fn outbox_mark_taken(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            self.conn
                .execute("UPDATE outbox SET taken = 1 WHERE id = ?1", params![id])?;
        }
        Ok(())
    }

    /// Return every claimed record of one kind to the pool.
    pub fn outbox_release_taken(&self, kind: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE outbox SET taken = 0 WHERE kind = ?1",
            params![kind],
        )?;
        Ok(())
    }

    pub fn outbox_delete(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            self.conn
                .execute("DELETE FROM outbox WHERE id = ?1", params![id])?;
        }
        Ok(())
    }

    /// Drop records older than `cutoff_ms`, then enforce the per-kind row
    /// cap by dropping the oldest surplus.
    pub fn outbox_prune(&self, kind: &str, cutoff_ms: i64, max_rows: usize) -> Result<usize> {
        let mut removed = self.conn.execute(
            "DELETE FROM outbox WHERE kind = ?1 AND created_ms < ?2",
            params![kind, cutoff_ms],
        )?;

        removed += self.conn.execute(
            r#"
            DELETE FROM outbox WHERE kind = ?1 AND id NOT IN (
                SELECT id FROM outbox WHERE kind = ?1
                ORDER BY created_ms DESC, id DESC LIMIT ?2
            )
            "#,
            params![kind, max_rows as i64],
        )?;

        Ok(removed)
    }

    pub fn outbox_count(&self, kind: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM outbox WHERE kind = ?1",
            params![kind],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn release_taken_all(&self) -> Result<()> {
        // Claims do not survive a restart; the sender re-claims on demand.
        self.conn.execute("UPDATE outbox SET taken = 0", [])?;
        self.conn
            .execute("DELETE FROM outbox WHERE pending_delete = 1", [])?;
        Ok(())
    }

    // --- key-value state ---

    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO kv (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = ?2
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(pairs: &[(&str, &str)]) -> MetaMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_keep_latest_replaces() {
        let store = Store::open_in_memory().unwrap();
        store
            .put_entry(
                StorageScope::Device,
                "prefs",
                KeepPolicy::KeepLatest,
                &meta(&[("a", "1")]),
                1,
            )
            .unwrap();
        store
            .put_entry(
                StorageScope::Device,
                "prefs",
                KeepPolicy::KeepLatest,
                &meta(&[("a", "2")]),
                2,
            )
            .unwrap();

        let entries = store.get_entries(StorageScope::Device, "prefs").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].get("a"), Some("2"));
    }

    #[test]
    fn test_append_history_accumulates_in_order() {
        let store = Store::open_in_memory().unwrap();
        for (i, ms) in [("1", 10), ("2", 20)] {
            store
                .put_entry(
                    StorageScope::User,
                    "attempts",
                    KeepPolicy::AppendHistory,
                    &meta(&[("n", i)]),
                    ms,
                )
                .unwrap();
        }

        let entries = store.get_entries(StorageScope::User, "attempts").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].get("n"), Some("1"));
        assert_eq!(entries[1].get("n"), Some("2"));
    }

    #[test]
    fn test_scopes_are_isolated() {
        let store = Store::open_in_memory().unwrap();
        store
            .put_entry(
                StorageScope::Device,
                "prefs",
                KeepPolicy::KeepLatest,
                &meta(&[("a", "1")]),
                1,
            )
            .unwrap();

        assert!(store.get_entries(StorageScope::User, "prefs").unwrap().is_empty());
        store.remove_all(StorageScope::User).unwrap();
        assert_eq!(store.get_entries(StorageScope::Device, "prefs").unwrap().len(), 1);
    }

    #[test]
    fn test_outbox_pending_respects_order_and_claims() {
        let store = Store::open_in_memory().unwrap();
        store.outbox_push("a", "event", &json!({"n": 1}), 10).unwrap();
        store.outbox_push("b", "event", &json!({"n": 2}), 20).unwrap();
        store.outbox_push("c", "log", &json!({"n": 3}), 5).unwrap();

        let pending = store.outbox_pending("event", 10).unwrap();
        assert_eq!(
            pending.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );

        store.outbox_mark_taken(&["a".to_string()]).unwrap();
        let pending = store.outbox_pending("event", 10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "b");

        store.outbox_release_taken("event").unwrap();
        assert_eq!(store.outbox_pending("event", 10).unwrap().len(), 2);
    }

    #[test]
    fn test_outbox_prune_by_age_and_cap() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .outbox_push(&format!("r{}", i), "event", &json!({}), i * 10)
                .unwrap();
        }

        // Age cutoff drops r0 (created at 0) and r1 (created at 10).
        let removed = store.outbox_prune("event", 15, 100).unwrap();
        assert_eq!(removed, 2);

        // Cap keeps only the newest two of the remaining three.
        let removed = store.outbox_prune("event", 0, 2).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.outbox_count("event").unwrap(), 2);
    }

    #[test]
    fn test_kv_round_trip() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.kv_get("device_id").unwrap(), None);

        store.kv_set("device_id", "abc").unwrap();
        store.kv_set("device_id", "def").unwrap();
        assert_eq!(store.kv_get("device_id").unwrap(), Some("def".to_string()));

        store.kv_delete("device_id").unwrap();
        assert_eq!(store.kv_get("device_id").unwrap(), None);
    }

    #[test]
    fn test_open_reuses_file_and_releases_claims() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache.db");

        {
            let store = Store::open(&path).unwrap();
            store.outbox_push("a", "event", &json!({}), 1).unwrap();
            store.outbox_mark_taken(&["a".to_string()]).unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.outbox_pending("event", 10).unwrap().len(), 1);
    }
}
