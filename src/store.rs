//! Session persistence with a SQLite backend.
//!
//! The engine never touches storage. The driver saves the flat
//! [`SessionRecord`] after every turn and loads the latest one for a
//! profile at startup: any stored record marks a returning user, and a
//! record whose state is not `SESSION_END` is resumed where it stopped.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::memory::SessionRecord;

/// Storage interface for session records.
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Create tables and indexes.
    fn init_db(&self) -> Result<(), anyhow::Error>;

    /// Append the record for one turn of a session.
    fn save_record(
        &self,
        profile: &str,
        session_id: &str,
        record: &SessionRecord,
    ) -> Result<(), anyhow::Error>;

    /// Most recent record for a profile, across sessions.
    fn load_latest(&self, profile: &str) -> Result<Option<SessionRecord>, anyhow::Error>;

    /// Whether the profile has any stored session.
    fn has_history(&self, profile: &str) -> Result<bool, anyhow::Error> {
        Ok(self.load_latest(profile)?.is_some())
    }
}

/// SQLite implementation of [`SessionStore`].
///
/// Each save appends a row holding the record's key/value map as JSON; the
/// latest row per profile is the resume point.
#[derive(Debug)]
pub struct SqliteSessionStore {
    /// Path to the SQLite database file.
    pub db_path: String,
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Open (creating if needed) the database at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            db_path: path.to_string_lossy().into_owned(),
            conn: Mutex::new(conn),
        };
        store.init_db()?;
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, anyhow::Error> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to acquire database lock: {}", e))
    }
}

impl SessionStore for SqliteSessionStore {
    fn init_db(&self) -> Result<(), anyhow::Error> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS session_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                profile TEXT NOT NULL,
                session_id TEXT NOT NULL,
                timestamp DATETIME NOT NULL,
                state TEXT NOT NULL,
                record_json TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_session_records_profile
             ON session_records(profile)",
            [],
        )?;

        Ok(())
    }

    fn save_record(
        &self,
        profile: &str,
        session_id: &str,
        record: &SessionRecord,
    ) -> Result<(), anyhow::Error> {
        let conn = self.lock()?;

        let record_json = serde_json::to_string(&record.to_map())?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO session_records (profile, session_id, timestamp, state, record_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![profile, session_id, now, record.state, record_json],
        )?;

        log::debug!(
            "SqliteSessionStore::save_record: profile={}, session={}, state={}",
            profile,
            session_id,
            record.state
        );

        Ok(())
    }

    fn load_latest(&self, profile: &str) -> Result<Option<SessionRecord>, anyhow::Error> {
        let conn = self.lock()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT record_json FROM session_records
                 WHERE profile = ?1
                 ORDER BY id DESC
                 LIMIT 1",
                params![profile],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => {
                let map: BTreeMap<String, String> = serde_json::from_str(&json)?;
                Ok(Some(SessionRecord::from_map(&map)?))
            }
            None => Ok(None),
        }
    }
}
