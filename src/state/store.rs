use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{PersistedState, STATE_VERSION};
use crate::error::StateError;

/// Load/save of the engine's owned fields at process start/stop.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<Option<PersistedState>, StateError>;
    async fn save(&self, state: &PersistedState) -> Result<(), StateError>;
}

/// Single JSON document on disk, replaced atomically on save.
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move an unreadable state file out of the way so the next save does
    /// not overwrite it. Returns where it went, or `None` if there was no file.
    pub async fn quarantine(&self) -> Result<Option<PathBuf>, StateError> {
        let target = self.sibling(&format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%SZ")));
        match tokio::fs::rename(&self.path, &target).await {
            Ok(()) => {
                warn!(
                    path = %self.path.display(),
                    moved_to = %target.display(),
                    "JsonFileStateStore: moved unreadable state aside"
                );
                Ok(Some(target))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn load(&self) -> Result<Option<PersistedState>, StateError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "JsonFileStateStore: no state file yet");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let state: PersistedState = serde_json::from_slice(&bytes)?;
        if state.version != STATE_VERSION {
            warn!(
                path = %self.path.display(),
                found = state.version,
                expected = STATE_VERSION,
                "JsonFileStateStore: ignoring state with unknown version"
            );
            return Ok(None);
        }
        Ok(Some(state))
    }

    async fn save(&self, state: &PersistedState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(state)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        debug!(path = %self.path.display(), tick = state.tick, "JsonFileStateStore: saved");
        Ok(())
    }
}
