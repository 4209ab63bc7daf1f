//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use warden_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::info!(from = current, to = CURRENT_VERSION, "sqlite schema migrated");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Snapshot header: at most one row
        CREATE TABLE snapshot_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            taken_at INTEGER NOT NULL,
            saved_at INTEGER NOT NULL
        );

        -- Groups, keyed by case-folded name
        CREATE TABLE group_entries (
            group_key TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            display_name TEXT NOT NULL,
            description TEXT NOT NULL,
            priority INTEGER NOT NULL
        );

        -- Ordered inheritance lists
        CREATE TABLE group_parents (
            group_key TEXT NOT NULL,
            position INTEGER NOT NULL,
            parent TEXT NOT NULL,
            PRIMARY KEY (group_key, position)
        );

        -- Group-level records
        CREATE TABLE group_permissions (
            group_key TEXT NOT NULL,
            node TEXT NOT NULL,
            value INTEGER NOT NULL,
            expires_at INTEGER,               -- Unix ms, NULL = permanent
            granted_by TEXT,
            reason TEXT,
            PRIMARY KEY (group_key, node)
        );

        -- Principals
        CREATE TABLE principals (
            principal_id TEXT PRIMARY KEY,
            last_updated INTEGER NOT NULL
        );

        -- Ordered memberships
        CREATE TABLE principal_groups (
            principal_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            group_key TEXT NOT NULL,
            PRIMARY KEY (principal_id, position)
        );

        -- Direct records
        CREATE TABLE principal_permissions (
            principal_id TEXT NOT NULL,
            node TEXT NOT NULL,
            value INTEGER NOT NULL,
            expires_at INTEGER,
            granted_by TEXT,
            reason TEXT,
            PRIMARY KEY (principal_id, node)
        );

        CREATE INDEX idx_group_permissions_expiry ON group_permissions(expires_at);
        CREATE INDEX idx_principal_permissions_expiry ON principal_permissions(expires_at);
        "#,
    )?;

    Ok(())
}
