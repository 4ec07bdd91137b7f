use rusqlite::Connection;

use crate::Result;

// Schema version (increment when changing table definitions)
pub const SCHEMA_VERSION: i32 = 1;

// NOTE: Cache Design Rationale
//
// Why JSON payload columns?
// - Entities already have a registry-driven wire form; storing that form
//   keeps the cache schema stable while entity fields evolve
// - The cache is an outbox plus a key-value mirror, not a query surface
//
// Why taken/pending_delete columns on the outbox?
// - They mirror the in-memory batch flags, so an abrupt termination can be
//   recovered: taken rows are released on open, pending_delete rows are
//   flushed

pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current_version != SCHEMA_VERSION {
        drop_all_tables(conn)?;
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scope TEXT NOT NULL,
            name TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS outbox (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            body TEXT NOT NULL,
            created_ms INTEGER NOT NULL,
            taken INTEGER NOT NULL DEFAULT 0,
            pending_delete INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_entries_scope_name ON entries(scope, name);
        CREATE INDEX IF NOT EXISTS idx_outbox_kind ON outbox(kind, created_ms);
        "#,
    )?;

    conn.execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;

    Ok(())
}

fn drop_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DROP TABLE IF EXISTS entries;
        DROP TABLE IF EXISTS outbox;
        DROP TABLE IF EXISTS kv;
        "#,
    )?;
    Ok(())
}
