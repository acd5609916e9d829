//! Durable single-slot store for the staged action.
//!
//! One JSON record at a well-known path, overwritten on each new staged
//! action and removed on commit or undo. The record outlives the process
//! on purpose: the queue re-reads the slot on open and either resumes
//! the countdown or commits what expired while the client was away.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::PendingAction;

/// Errors specific to slot persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create state directory: {0}")]
    CreateDir(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Single-slot store for the pending action.
pub struct PendingStore {
    path: PathBuf,
}

impl PendingStore {
    /// Store at the default location, `~/.leadflow/pending_action.json`.
    pub fn at_default_path() -> Result<Self, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::HomeDirNotFound)?;
        Ok(Self::at_path(
            home.join(".leadflow").join("pending_action.json"),
        ))
    }

    /// Store at an explicit path; tests and embedders inject their own.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the slot. `Ok(None)` when nothing is staged; `Err` on an
    /// unreadable or corrupt record (the caller decides whether to clear).
    pub fn load(&self) -> Result<Option<PendingAction>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let action = serde_json::from_str(&content)?;
        Ok(Some(action))
    }

    /// Overwrite the slot with `action`.
    pub fn save(&self, action: &PendingAction) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(StoreError::CreateDir)?;
            }
        }
        let content = serde_json::to_string_pretty(action)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Empty the slot. Clearing an already-empty slot is not an error.
    pub fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
