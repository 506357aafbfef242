//! Durable session storage, one JSON document per session.
//!
//! Every mutating call is a whole-record read-modify-write; no partial-field
//! updates are exposed. Writes go through a temp file + rename so a crash at
//! any point leaves either the previous or the new record, never a torn one.
//! Mutations are serialized per session id by a process-wide lock map;
//! sessions are independent and need no cross-session coordination.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::state::WorkflowState;
use crate::core::types::LogEntry;

/// The durable record of one workflow's full history and latest state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    /// Append-only role/content/timestamp records across all attempts.
    pub conversation_log: Vec<LogEntry>,
    /// Latest snapshot; overwritten on every transition.
    pub state: WorkflowState,
}

impl Session {
    pub fn new(session_id: impl Into<String>, state: WorkflowState) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: Utc::now(),
            conversation_log: Vec::new(),
            state,
        }
    }
}

/// File-backed session store rooted at a sessions directory.
#[derive(Debug)]
pub struct FileSessionStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("create sessions directory {}", dir.display()))?;
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch the stored session, or `None` when absent.
    pub fn get(&self, session_id: &str) -> Result<Option<Session>> {
        validate_session_id(session_id)?;
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read session {}", path.display()))?;
        let session: Session = serde_json::from_str(&contents)
            .with_context(|| format!("parse session {}", path.display()))?;
        debug!(session_id, log_entries = session.conversation_log.len(), "session loaded");
        Ok(Some(session))
    }

    /// Replace the whole session record.
    pub fn put(&self, session_id: &str, session: &Session) -> Result<()> {
        validate_session_id(session_id)?;
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().map_err(|_| anyhow!("session lock poisoned"))?;
        self.write_session(session_id, session)
    }

    /// Remove the session record. Deleting an absent session is not an error.
    pub fn delete(&self, session_id: &str) -> Result<()> {
        validate_session_id(session_id)?;
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().map_err(|_| anyhow!("session lock poisoned"))?;
        let path = self.session_path(session_id);
        if !path.exists() {
            debug!(session_id, "delete of absent session is a no-op");
            return Ok(());
        }
        fs::remove_file(&path).with_context(|| format!("delete session {}", path.display()))?;
        info!(session_id, "session deleted");
        Ok(())
    }

    /// Append one entry to the conversation log (read-modify-write of the
    /// whole record under the per-session lock).
    pub fn append_to_log(&self, session_id: &str, entry: LogEntry) -> Result<()> {
        validate_session_id(session_id)?;
        let lock = self.lock_for(session_id);
        let _guard = lock.lock().map_err(|_| anyhow!("session lock poisoned"))?;
        let mut session = self
            .read_session(session_id)?
            .ok_or_else(|| anyhow!("cannot append to missing session '{session_id}'"))?;
        session.conversation_log.push(entry);
        self.write_session(session_id, &session)
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn read_session(&self, session_id: &str) -> Result<Option<Session>> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read session {}", path.display()))?;
        let session = serde_json::from_str(&contents)
            .with_context(|| format!("parse session {}", path.display()))?;
        Ok(Some(session))
    }

    /// Atomically write the session document (temp file + rename).
    fn write_session(&self, session_id: &str, session: &Session) -> Result<()> {
        let path = self.session_path(session_id);
        let mut buf = serde_json::to_string_pretty(session)?;
        buf.push('\n');
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, &buf)
            .with_context(|| format!("write temp session {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("replace session {}", path.display()))?;
        debug!(session_id, bytes = buf.len(), "session written");
        Ok(())
    }
}

/// Validate a session id for use as a file stem.
pub fn validate_session_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(anyhow!("session id must not be empty"));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(anyhow!(
            "session id '{id}' contains characters outside [A-Za-z0-9._-]"
        ));
    }
    Ok(())
}

/// Generate a fresh session id unique within this process.
pub fn generate_session_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("sess-{:x}-{seq}", Utc::now().timestamp_millis())
}
