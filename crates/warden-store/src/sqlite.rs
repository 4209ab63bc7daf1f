//! SQLite implementation of the SnapshotStore trait.
//!
//! Snapshots are stored relationally, one table per collection, so the data
//! stays inspectable with ordinary SQL. A save replaces every row inside one
//! transaction. rusqlite calls run under `tokio::task::spawn_blocking`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use warden_core::{
    now_millis, Group, PermissionRecord, PrincipalId, PrincipalPermissions, Snapshot,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::SnapshotStore;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|e| {
        StoreError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            Some(format!("mutex poisoned: {}", e)),
        ))
    })
}

// Helper to read the trailing record columns
// (node, value, expires_at, granted_by, reason) starting at `offset`.
fn row_to_record(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<PermissionRecord> {
    Ok(PermissionRecord {
        node: row.get(offset)?,
        value: row.get(offset + 1)?,
        expires_at: row.get(offset + 2)?,
        granted_by: row.get(offset + 3)?,
        reason: row.get(offset + 4)?,
    })
}

/// Replace the stored snapshot inside one transaction.
fn write_snapshot(conn: &mut Connection, snapshot: &Snapshot) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        "DELETE FROM snapshot_meta;
         DELETE FROM group_entries;
         DELETE FROM group_parents;
         DELETE FROM group_permissions;
         DELETE FROM principals;
         DELETE FROM principal_groups;
         DELETE FROM principal_permissions;",
    )?;

    tx.execute(
        "INSERT INTO snapshot_meta (id, version, taken_at, saved_at) VALUES (1, ?1, ?2, ?3)",
        params![snapshot.version, snapshot.taken_at, now_millis()],
    )?;

    for group in &snapshot.groups {
        let key = group.key();
        tx.execute(
            "INSERT INTO group_entries (group_key, name, display_name, description, priority)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                key,
                group.name,
                group.display_name,
                group.description,
                group.priority
            ],
        )?;

        for (position, parent) in group.inherited_groups.iter().enumerate() {
            tx.execute(
                "INSERT INTO group_parents (group_key, position, parent) VALUES (?1, ?2, ?3)",
                params![key, position as i64, parent],
            )?;
        }

        for record in group.permissions.values() {
            tx.execute(
                "INSERT INTO group_permissions (group_key, node, value, expires_at, granted_by, reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    key,
                    record.node,
                    record.value,
                    record.expires_at,
                    record.granted_by.as_deref(),
                    record.reason.as_deref()
                ],
            )?;
        }
    }

    for principal in &snapshot.principals {
        let id = principal.principal_id.as_str();
        tx.execute(
            "INSERT INTO principals (principal_id, last_updated) VALUES (?1, ?2)",
            params![id, principal.last_updated],
        )?;

        for (position, group) in principal.groups.iter().enumerate() {
            tx.execute(
                "INSERT INTO principal_groups (principal_id, position, group_key) VALUES (?1, ?2, ?3)",
                params![id, position as i64, group],
            )?;
        }

        for record in principal.direct_permissions.values() {
            tx.execute(
                "INSERT INTO principal_permissions (principal_id, node, value, expires_at, granted_by, reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    record.node,
                    record.value,
                    record.expires_at,
                    record.granted_by.as_deref(),
                    record.reason.as_deref()
                ],
            )?;
        }
    }

    tx.commit()?;
    Ok(())
}

/// Rebuild the stored snapshot, or `None` if nothing was saved.
fn read_snapshot(conn: &Connection) -> Result<Option<Snapshot>> {
    let meta: Option<(u32, i64)> = conn
        .query_row(
            "SELECT version, taken_at FROM snapshot_meta WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((version, taken_at)) = meta else {
        return Ok(None);
    };

    // Groups
    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT group_key, name, display_name, description, priority FROM group_entries",
        )?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let group = Group {
                name: row.get(1)?,
                display_name: row.get(2)?,
                description: row.get(3)?,
                priority: row.get(4)?,
                permissions: BTreeMap::new(),
                inherited_groups: Vec::new(),
            };
            Ok((key, group))
        })?;
        for row in rows {
            let (key, group) = row?;
            groups.insert(key, group);
        }
    }
    {
        let mut stmt = conn.prepare(
            "SELECT group_key, parent FROM group_parents ORDER BY group_key, position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, parent) = row?;
            group_for(&mut groups, &key)?.inherited_groups.push(parent);
        }
    }
    {
        let mut stmt = conn.prepare(
            "SELECT group_key, node, value, expires_at, granted_by, reason FROM group_permissions",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row_to_record(row, 1)?))
        })?;
        for row in rows {
            let (key, record) = row?;
            group_for(&mut groups, &key)?.set_permission(record);
        }
    }

    // Principals
    let mut principals: BTreeMap<String, PrincipalPermissions> = BTreeMap::new();
    {
        let mut stmt = conn.prepare("SELECT principal_id, last_updated FROM principals")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (id, last_updated) = row?;
            principals.insert(
                id.clone(),
                PrincipalPermissions {
                    principal_id: PrincipalId::new(id),
                    groups: Vec::new(),
                    direct_permissions: BTreeMap::new(),
                    last_updated,
                },
            );
        }
    }
    {
        let mut stmt = conn.prepare(
            "SELECT principal_id, group_key FROM principal_groups ORDER BY principal_id, position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (id, group) = row?;
            principal_for(&mut principals, &id)?.groups.push(group);
        }
    }
    {
        let mut stmt = conn.prepare(
            "SELECT principal_id, node, value, expires_at, granted_by, reason
             FROM principal_permissions",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row_to_record(row, 1)?))
        })?;
        for row in rows {
            let (id, record) = row?;
            let principal = principal_for(&mut principals, &id)?;
            principal
                .direct_permissions
                .insert(record.node.clone(), record);
        }
    }

    let snapshot = Snapshot {
        version,
        taken_at,
        groups: groups.into_values().collect(),
        principals: principals.into_values().collect(),
    };
    snapshot.validate()?;
    Ok(Some(snapshot))
}

fn group_for<'a>(groups: &'a mut BTreeMap<String, Group>, key: &str) -> Result<&'a mut Group> {
    groups
        .get_mut(key)
        .ok_or_else(|| StoreError::InvalidData(format!("rows reference unknown group {:?}", key)))
}

fn principal_for<'a>(
    principals: &'a mut BTreeMap<String, PrincipalPermissions>,
    id: &str,
) -> Result<&'a mut PrincipalPermissions> {
    principals
        .get_mut(id)
        .ok_or_else(|| StoreError::InvalidData(format!("rows reference unknown principal {:?}", id)))
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        snapshot.validate()?;
        let snapshot = snapshot.clone();
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            write_snapshot(&mut conn, &snapshot)?;
            tracing::debug!(
                groups = snapshot.groups.len(),
                principals = snapshot.principals.len(),
                "snapshot written to sqlite"
            );
            Ok(())
        })
        .await?
    }

    async fn load(&self) -> Result<Option<Snapshot>> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            read_snapshot(&conn)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        let moderator = Group::new("Moderator")
            .with_display_name("Mod")
            .with_description("keeps order")
            .with_priority(500)
            .with_permission(PermissionRecord::allow("admin.kick"))
            .inherits("default")
            .inherits("helper");
        let default = Group::new("default")
            .with_permission(PermissionRecord::allow("basic.chat"))
            .with_permission(
                PermissionRecord::deny("basic.build")
                    .expires_at(1_234)
                    .reason("maintenance"),
            );

        let mut p1 = PrincipalPermissions::new(PrincipalId::from("p1"), "default", 10);
        p1.join("moderator", 11);
        p1.set_permission(
            PermissionRecord::deny("admin.kick")
                .granted_by("console")
                .reason("probation"),
            12,
        );
        let p2 = PrincipalPermissions::new(PrincipalId::from("p2"), "default", 20);

        Snapshot::new(99, vec![moderator, default], vec![p1, p2])
    }

    #[tokio::test]
    async fn test_empty_database_loads_none() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        store.save(&sample()).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, sample());

        let moderator = loaded.group("moderator").unwrap();
        assert_eq!(
            moderator.inherited_groups,
            vec!["default".to_string(), "helper".to_string()]
        );
    }

    #[tokio::test]
    async fn test_save_replaces_previous() {
        let store = SqliteStore::open_memory().unwrap();
        store.save(&sample()).await.unwrap();

        let smaller = Snapshot::new(100, vec![Group::new("solo")], Vec::new());
        store.save(&smaller).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(smaller));
    }

    #[tokio::test]
    async fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.save(&sample()).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load().await.unwrap(), Some(sample()));
    }

    #[tokio::test]
    async fn test_invalid_snapshot_is_not_written() {
        let store = SqliteStore::open_memory().unwrap();
        let mut bad = sample();
        bad.principals[0].principal_id = PrincipalId::from("");

        assert!(matches!(
            store.save(&bad).await,
            Err(StoreError::Snapshot(_))
        ));
        assert!(store.load().await.unwrap().is_none());
    }
}
