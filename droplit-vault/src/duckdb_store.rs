//! DuckDB-backed key record store.

use crate::error::{VaultError, VaultResult};
use crate::record::KeyRecord;
use crate::store::KeyRecordStore;
use duckdb::{Connection, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Stores one JSON-encoded [`KeyRecord`] per identity in a `key_records` table.
pub struct DuckDbKeyRecordStore {
    conn: Mutex<Connection>,
}

impl DuckDbKeyRecordStore {
    /// Opens (or creates) the store at `path`.
    ///
    /// If the first open fails and a `.wal` file exists alongside the
    /// database, the WAL is removed and the open retried once. An unclean
    /// shutdown can leave a WAL that prevents reopening.
    pub fn open(path: &Path) -> VaultResult<Self> {
        let conn = match Connection::open(path) {
            Ok(c) => c,
            Err(first_err) => {
                let wal_path = path.with_extension(
                    path.extension()
                        .map(|ext| format!("{}.wal", ext.to_string_lossy()))
                        .unwrap_or_else(|| "wal".to_string()),
                );
                if !wal_path.exists() {
                    return Err(first_err.into());
                }
                warn!(
                    "key store open failed, removing stale WAL and retrying: {}",
                    wal_path.display()
                );
                std::fs::remove_file(&wal_path).map_err(|e| VaultError::Storage(e.to_string()))?;
                Connection::open(path)?
            }
        };

        // DuckDB defaults to ~80% of RAM and every core per connection.
        conn.execute_batch("PRAGMA memory_limit='16MB'; PRAGMA threads=1;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_tables()?;
        Ok(store)
    }

    pub fn open_in_memory() -> VaultResult<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.ensure_tables()?;
        Ok(store)
    }

    fn ensure_tables(&self) -> VaultResult<()> {
        let conn = self.conn.lock().map_err(|e| VaultError::Storage(e.to_string()))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS key_records (
                identity VARCHAR PRIMARY KEY,
                key_id VARCHAR NOT NULL,
                record VARCHAR NOT NULL,
                created_at BIGINT NOT NULL
            );",
        )?;
        Ok(())
    }
}

impl KeyRecordStore for DuckDbKeyRecordStore {
    fn load(&self, identity: &str) -> VaultResult<Option<KeyRecord>> {
        let conn = self.conn.lock().map_err(|e| VaultError::Storage(e.to_string()))?;
        let mut stmt = conn.prepare("SELECT record FROM key_records WHERE identity = ?")?;
        let mut rows = stmt.query_map(params![identity], |row| row.get::<_, String>(0))?;

        let Some(json) = rows.next().transpose()? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&json)
            .map_err(|e| VaultError::Storage(format!("corrupt key record: {e}")))?;
        Ok(Some(record))
    }

    fn save(&self, identity: &str, record: &KeyRecord) -> VaultResult<()> {
        let json =
            serde_json::to_string(record).map_err(|e| VaultError::Storage(e.to_string()))?;

        let conn = self.conn.lock().map_err(|e| VaultError::Storage(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO key_records (identity, key_id, record, created_at)
             VALUES (?, ?, ?, ?)",
            params![
                identity,
                record.key_id.as_str(),
                json,
                record.created_at.timestamp_millis()
            ],
        )?;
        debug!("persisted key record {} for {identity}", record.key_id);
        Ok(())
    }

    fn delete(&self, identity: &str) -> VaultResult<bool> {
        let conn = self.conn.lock().map_err(|e| VaultError::Storage(e.to_string()))?;
        let affected = conn.execute(
            "DELETE FROM key_records WHERE identity = ?",
            params![identity],
        )?;
        Ok(affected > 0)
    }
}
