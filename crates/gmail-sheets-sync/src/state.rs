//! Durable record of processed message ids.

use crate::error::{SyncError, SyncResult};
use shared_types::SyncState;
use std::fs;
use std::path::{Path, PathBuf};

/// JSON file holding the `SyncState` between runs
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved state, starting fresh when it is missing or unreadable
    pub fn load(&self) -> SyncState {
        if !self.path.exists() {
            tracing::info!("No state file found, starting fresh");
            return SyncState::default();
        }

        match self.read() {
            Ok(state) => {
                tracing::info!(
                    "Loaded state: {} processed email(s)",
                    state.processed_message_ids.len()
                );
                state
            }
            Err(e) => {
                tracing::warn!("Error loading state from {}: {}", self.path.display(), e);
                SyncState::default()
            }
        }
    }

    fn read(&self) -> SyncResult<SyncState> {
        let content = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Overwrite the state file with `state`.
    ///
    /// The new content is written to a sibling temp file and renamed into
    /// place, so a crash never leaves a half-written state file.
    pub fn save(&self, state: &SyncState) -> SyncResult<()> {
        let json = serde_json::to_string_pretty(state)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, json).map_err(|e| self.io_error(e))?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.io_error(e));
        }

        tracing::info!(
            "State saved: {} total processed email(s)",
            state.processed_message_ids.len()
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> SyncError {
        SyncError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}
