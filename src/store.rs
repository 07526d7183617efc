use chrono::{DateTime, Local, TimeZone};
use itertools::Itertools;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{AuraError, Result};
use crate::trace::{summed_duration_ms, Session, SessionId, SessionRecord, SESSION_KEY_PREFIX};
use crate::util::mean;

/// Minimal string-to-string persistence the session store is built on
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    /// Returns whether the key existed
    fn remove(&mut self, key: &str) -> Result<bool>;
    fn keys(&self) -> Result<Vec<String>>;
}

/// SQLite-backed store, one row per key
#[derive(Debug)]
pub struct SqliteKeyValueStore {
    conn: Connection,
}

impl SqliteKeyValueStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!(path = %path.display(), "opening session database");
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO kv (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        let removed = self.conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(removed > 0)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }
}

/// In-process store for tests and throwaway runs
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: BTreeMap<String, String>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Sessions without patterns are never written
    EmptySessionDiscarded,
}

/// One row of the session browser
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub rank: usize,
    pub id: String,
    pub started_at_ms: i64,
    pub duration_ms: i64,
    pub pattern_count: usize,
    pub avg_pattern_len: f64,
}

impl SessionSummary {
    /// Key the row was listed under, exactly as stored
    pub fn session_id(&self) -> SessionId {
        self.id
            .parse()
            .unwrap_or_else(|_| SessionId::from_millis(self.started_at_ms))
    }

    pub fn started_at_local(&self) -> Option<DateTime<Local>> {
        Local.timestamp_millis_opt(self.started_at_ms).single()
    }
}

/// Sessions persisted as JSON records keyed by `session_<millis>`
#[derive(Debug)]
pub struct SessionStore<S: KeyValueStore> {
    kv: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn backend(&self) -> &S {
        &self.kv
    }

    pub fn save(&mut self, session: &Session) -> Result<SaveOutcome> {
        if session.is_empty() {
            debug!(id = %session.id, "not saving empty session");
            return Ok(SaveOutcome::EmptySessionDiscarded);
        }

        let json = Self::encode(session)?;
        self.kv.set(session.id.as_str(), &json)?;
        debug!(id = %session.id, patterns = session.patterns.len(), "session saved");
        Ok(SaveOutcome::Saved)
    }

    pub fn contains(&self, id: &SessionId) -> Result<bool> {
        Ok(self.kv.get(id.as_str())?.is_some())
    }

    pub fn load(&self, id: &SessionId) -> Result<Session> {
        let raw = self
            .kv
            .get(id.as_str())?
            .ok_or_else(|| AuraError::NotFound(id.clone()))?;
        let record: SessionRecord =
            serde_json::from_str(&raw).map_err(|source| AuraError::CorruptSession {
                id: id.clone(),
                source,
            })?;
        Ok(Session::from_record(id.clone(), record))
    }

    /// Stored bytes exactly as written, for per-session downloads
    pub fn raw_record(&self, id: &SessionId) -> Result<Vec<u8>> {
        self.kv
            .get(id.as_str())?
            .map(String::into_bytes)
            .ok_or_else(|| AuraError::NotFound(id.clone()))
    }

    pub fn delete(&mut self, id: &SessionId) -> Result<bool> {
        let removed = self.kv.remove(id.as_str())?;
        if removed {
            info!(id = %id, "session deleted");
        }
        Ok(removed)
    }

    /// Stored session ids, most recent first
    pub fn ids(&self) -> Result<Vec<SessionId>> {
        Ok(self
            .kv
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(SESSION_KEY_PREFIX))
            .filter_map(|k| k.parse::<SessionId>().ok())
            .sorted_by(|a, b| b.cmp(a))
            .collect())
    }

    /// Summaries for every readable session, most recent first.
    ///
    /// Records that fail to parse are skipped so one bad entry does not hide
    /// the rest.
    pub fn list(&self) -> Result<Vec<SessionSummary>> {
        let mut summaries = Vec::new();
        for id in self.ids()? {
            let Some(raw) = self.kv.get(id.as_str())? else {
                continue;
            };
            let record: SessionRecord = match serde_json::from_str(&raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!(id = %id, error = %e, "skipping corrupt session record");
                    continue;
                }
            };

            let lengths: Vec<f64> = record.patterns.iter().map(|p| p.len() as f64).collect();
            summaries.push(SessionSummary {
                rank: summaries.len() + 1,
                id: id.to_string(),
                started_at_ms: id.timestamp().unwrap_or(record.session_start_time),
                duration_ms: summed_duration_ms(&record.patterns),
                pattern_count: record.patterns.len(),
                avg_pattern_len: mean(&lengths).unwrap_or(0.0),
            });
        }
        Ok(summaries)
    }

    /// Key with the largest lexical value, matching how the browser app
    /// picked the session to restore
    pub fn last_key(&self) -> Result<Option<SessionId>> {
        Ok(self
            .kv
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(SESSION_KEY_PREFIX))
            .max()
            .and_then(|k| k.parse().ok()))
    }

    /// An id for a new session started at `now` that no stored session uses yet
    pub fn fresh_id(&self, now: i64) -> Result<SessionId> {
        let mut ts = now;
        loop {
            let id = SessionId::from_millis(ts);
            if !self.contains(&id)? {
                return Ok(id);
            }
            ts += 1;
        }
    }

    fn encode(session: &Session) -> Result<String> {
        serde_json::to_string(&session.to_record()).map_err(AuraError::Encode)
    }

    pub fn export_to_bytes(session: &Session) -> Result<Vec<u8>> {
        Self::encode(session).map(String::into_bytes)
    }

    /// Parses an exported record into a new session.
    ///
    /// The session gets a fresh id; nothing is written to the store.
    pub fn import_from_bytes(&self, bytes: &[u8], now: i64) -> Result<Session> {
        let record: SessionRecord = serde_json::from_slice(bytes).map_err(AuraError::Import)?;
        let id = self.fresh_id(now)?;
        Ok(Session::from_record(id, record))
    }
}
