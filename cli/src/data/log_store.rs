//! Persistent battery activity log.
//!
//! One SQLite file holds the activity rows of every device that ever wrote to
//! it, plus a per-device best-session record. The daemon is the only writer;
//! readers open the file, walk it, and close it again.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension, Row, Statement};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DATABASE_NAME: &str = "battery_logs.sqlite";

/// One logged segment: `level` held for `duration` seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub device_serial: String,
    /// Percent as logged; may exceed 100 on drifting gauges.
    pub level: i32,
    pub duration: u64,
    pub charging: bool,
}

impl ActivityRecord {
    pub fn new(device_serial: impl Into<String>, level: i32, duration: u64, charging: bool) -> Self {
        Self {
            device_serial: device_serial.into(),
            level,
            duration,
            charging,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            device_serial: row.get(0)?,
            level: row.get(1)?,
            duration: row.get::<_, i64>(2)?.max(0) as u64,
            charging: row.get::<_, i64>(3)? != 0,
        })
    }
}

/// Errors that can occur during log store operations
#[derive(Debug, thiserror::Error)]
pub enum LogStoreError {
    #[error("battery log unavailable at {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("cannot create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("query failed: {0}")]
    QueryFailed(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, LogStoreError>;

/// Handle on the battery log file.
pub struct LogStore {
    conn: Connection,
    path: PathBuf,
}

impl LogStore {
    /// Open the log at `path`, creating the directory, file, and schema if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| LogStoreError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let unavailable = |source| LogStoreError::StorageUnavailable {
            path: path.clone(),
            source,
        };

        let conn = Connection::open(&path).map_err(unavailable)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;",
        )
        .map_err(unavailable)?;

        create_schema(&conn).map_err(unavailable)?;

        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the database file size in bytes
    pub fn size_bytes(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    pub fn insert_activity(&self, record: &ActivityRecord) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO bat_activity (device_serial, bat_level, duration, is_charging)
             VALUES (?, ?, ?, ?)",
            params![
                record.device_serial,
                record.level,
                record.duration as i64,
                record.charging as i64,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Prepare a newest-first walk over one device's records.
    pub fn query_activity(&self, device_serial: &str) -> Result<ActivityCursor<'_>> {
        let stmt = self.conn.prepare(
            "SELECT device_serial, bat_level, duration, is_charging
             FROM bat_activity
             WHERE device_serial = ?
             ORDER BY id DESC",
        )?;
        Ok(ActivityCursor {
            stmt,
            device_serial: device_serial.to_string(),
        })
    }

    pub fn count_activity(&self, device_serial: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM bat_activity WHERE device_serial = ?",
            [device_serial],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Serials that have activity rows, in first-seen order.
    pub fn device_serials(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT device_serial FROM bat_activity
             GROUP BY device_serial
             ORDER BY MIN(id)",
        )?;
        let serials = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(serials)
    }

    /// Stored best session in seconds. Creates the device row with 0 if absent.
    pub fn get_best_session(&self, device_serial: &str) -> Result<u64> {
        let best: Option<i64> = self
            .conn
            .query_row(
                "SELECT best_session FROM device_specifics
                 WHERE device_serial = ? ORDER BY id LIMIT 1",
                [device_serial],
                |row| row.get(0),
            )
            .optional()?;

        match best {
            Some(best) => Ok(best.max(0) as u64),
            None => {
                self.conn.execute(
                    "INSERT INTO device_specifics (device_serial, best_session) VALUES (?, 0)",
                    [device_serial],
                )?;
                debug!(device_serial, "Created device specifics row");
                Ok(0)
            }
        }
    }

    pub fn set_best_session(&self, device_serial: &str, best_session: u64) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE device_specifics SET best_session = ? WHERE device_serial = ?",
            params![best_session as i64, device_serial],
        )?;
        if updated == 0 {
            self.conn.execute(
                "INSERT INTO device_specifics (device_serial, best_session) VALUES (?, ?)",
                params![device_serial, best_session as i64],
            )?;
        }
        Ok(())
    }

    /// Release the handle. Close errors are logged; there is nothing left to undo.
    pub fn close(self) {
        if let Err((_, e)) = self.conn.close() {
            warn!(path = %self.path.display(), error = %e, "Error closing battery log");
        }
    }
}

fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS bat_activity (
            id INTEGER PRIMARY KEY,
            device_serial TEXT,
            bat_level INTEGER,
            duration INTEGER,
            is_charging INTEGER
        );
        CREATE INDEX IF NOT EXISTS bat_activity_device_SN_index
            ON bat_activity(device_serial);

        CREATE TABLE IF NOT EXISTS device_specifics (
            id INTEGER PRIMARY KEY,
            device_serial TEXT,
            best_session INTEGER
        );
        CREATE INDEX IF NOT EXISTS device_specifics_index
            ON device_specifics(device_serial);
        "#,
    )
}

/// Prepared newest-first walk over a device's activity rows.
///
/// [`records`](ActivityCursor::records) can be called repeatedly; each call
/// restarts from the newest row. Iteration is lazy, so callers that stop early
/// never read older rows.
pub struct ActivityCursor<'conn> {
    stmt: Statement<'conn>,
    device_serial: String,
}

impl ActivityCursor<'_> {
    pub fn records(&mut self) -> Result<impl Iterator<Item = ActivityRecord> + '_> {
        let rows = self
            .stmt
            .query_map([self.device_serial.as_str()], ActivityRecord::from_row)?;

        Ok(rows.map_while(|row| match row {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "Unreadable activity row, ending walk");
                None
            }
        }))
    }
}
