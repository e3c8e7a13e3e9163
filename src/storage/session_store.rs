//! Persistent session store: one directory per session under the root,
//! `session.json` written with a temp-file-and-rename pattern so readers
//! never observe a partial record.
//!
//! The store is process-local. It provides no inter-process locking;
//! callers that need exclusivity supply it externally.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{EngineError, Result};
use crate::models::Session;
use crate::storage::file_gateway::SESSION_FILE;

const TEMP_SESSION_FILE: &str = ".session.json.tmp";

#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    /// Serialize and atomically replace `session.json`.
    pub fn save(&self, session: &Session) -> Result<()> {
        let dir = self.session_dir(&session.session_id);
        fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(session)?;
        let temp = dir.join(TEMP_SESSION_FILE);
        let target = dir.join(SESSION_FILE);

        fs::write(&temp, &json)?;
        fs::rename(&temp, &target)?;
        Ok(())
    }

    pub fn load(&self, session_id: &str) -> Result<Session> {
        let path = self.session_dir(session_id).join(SESSION_FILE);
        if !path.exists() {
            return Err(EngineError::SessionNotFound(session_id.to_string()));
        }
        let json = fs::read_to_string(&path)?;
        serde_json::from_str(&json).map_err(|e| EngineError::SessionCorrupt {
            id: session_id.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.session_dir(session_id).join(SESSION_FILE).exists()
    }

    /// All session ids under the root, lexically sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        if self.root.exists() {
            for entry in fs::read_dir(&self.root)? {
                let entry = entry?;
                if entry.path().join(SESSION_FILE).exists() {
                    ids.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Remove the session directory and everything under it.
    pub fn delete(&self, session_id: &str) -> Result<()> {
        let dir = self.session_dir(session_id);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }
}
