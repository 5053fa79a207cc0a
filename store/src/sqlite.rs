use crate::error::StoreError;
use chrono::{
    DateTime,
    SecondsFormat,
    Utc,
};
use rusqlite::Connection;
use std::{
    path::Path,
    sync::{
        Mutex,
        MutexGuard,
    },
};

pub(crate) fn open(path: &Path, schema: &str) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;",
    )?;
    conn.execute_batch(schema)?;
    debug!(path = %path.display(), "opened sqlite database");
    Ok(conn)
}

pub(crate) fn open_in_memory(schema: &str) -> Result<Connection, StoreError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(schema)?;
    Ok(conn)
}

pub(crate) fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StoreError> {
    conn.lock().map_err(|_| StoreError::Poisoned)
}

/// Fixed-width RFC 3339 with microseconds, so text order is time order.
pub(crate) fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidTimestamp(value.to_string()))
}
