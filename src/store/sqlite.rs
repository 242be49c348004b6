// src/store/sqlite.rs

//! SQLite-backed state store

use std::fs;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use super::schema;
use super::{PassRecord, StateStore, StoreError};

/// Pass records persisted in a SQLite database
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Open (or create) the database at `path` and bring its schema up to date
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                StoreError::Io(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(path)?;
        info!("Opened state database {}", path.display());
        Self::from_connection(conn)
    }

    /// Database that lives only as long as this store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Serials of all stored passes
    pub fn serials(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT serial FROM pass_state ORDER BY serial")?;
        let serials = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(serials)
    }
}

impl StateStore for SqliteStateStore {
    fn get(&self, serial: &str) -> Result<Option<PassRecord>, StoreError> {
        let conn = self.conn.lock();
        let json: Option<String> = conn
            .query_row(
                "SELECT record FROM pass_state WHERE serial = ?1",
                [serial],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|text| serde_json::from_str(&text).map_err(StoreError::from))
            .transpose()
    }

    fn put(&self, serial: &str, record: &PassRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO pass_state (serial, record, updated_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(serial) DO UPDATE SET
                record = excluded.record,
                updated_at = excluded.updated_at",
            params![serial, json],
        )?;
        debug!("Stored state for pass {}", serial);
        Ok(())
    }
}
