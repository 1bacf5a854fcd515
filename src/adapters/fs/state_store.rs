//! Filesystem-backed iteration state storage.
//!
//! One pretty-printed JSON file per (repository, change-id), written via
//! temp-file-then-rename so a crash can never leave a record half-written.
//! Corrupt files are treated as absent and re-initialized by the caller.
//! That is a documented data-loss path: the corruption is logged, the loop
//! starts over.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::IterationState;
use crate::domain::ports::StateRepository;

/// Iteration state as JSON files under a base directory.
pub struct FsStateRepository {
    dir: PathBuf,
}

impl FsStateRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, repository: &str, change_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", file_stem(repository, change_id)))
    }
}

/// Filename-safe key for one change record.
fn file_stem(repository: &str, change_id: &str) -> String {
    let sanitize = |s: &str| s.replace(['/', '\\', ':'], "_");
    format!("{}__{}", sanitize(repository), sanitize(change_id))
}

#[async_trait]
impl StateRepository for FsStateRepository {
    async fn load(
        &self,
        repository: &str,
        change_id: &str,
    ) -> DomainResult<Option<IterationState>> {
        let path = self.path_for(repository, change_id);
        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&json) {
            Ok(state) => Ok(Some(state)),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "persisted state is corrupt; treating as absent"
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, state: &IterationState) -> DomainResult<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&state.repository, &state.change_id);
        let json = serde_json::to_string_pretty(state)?;

        // Atomic on POSIX: rename within the same directory.
        let tmp = tmp_path(&path);
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), phase = state.phase.name(), "state saved");
        Ok(())
    }

    async fn delete(&self, repository: &str, change_id: &str) -> DomainResult<()> {
        let path = self.path_for(repository, change_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let dir = TempDir::new().unwrap();
        let repo = FsStateRepository::new(dir.path());
        let state = IterationState::new("octo/widgets", "42", 5);

        repo.save(&state).await.unwrap();
        let loaded = repo.load("octo/widgets", "42").await.unwrap().unwrap();

        assert_eq!(loaded.run_id, state.run_id);
        assert_eq!(loaded.repository, "octo/widgets");
        assert_eq!(loaded.change_id, "42");
    }

    #[tokio::test]
    async fn missing_state_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let repo = FsStateRepository::new(dir.path());
        assert!(repo.load("octo/widgets", "42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_state_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let repo = FsStateRepository::new(dir.path());
        let path = repo.path_for("octo/widgets", "42");
        tokio::fs::create_dir_all(dir.path()).await.unwrap();
        tokio::fs::write(&path, "{not json").await.unwrap();

        assert!(repo.load("octo/widgets", "42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let repo = FsStateRepository::new(dir.path());
        let state = IterationState::new("octo/widgets", "42", 5);

        repo.save(&state).await.unwrap();
        repo.delete("octo/widgets", "42").await.unwrap();
        repo.delete("octo/widgets", "42").await.unwrap();
        assert!(repo.load("octo/widgets", "42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let repo = FsStateRepository::new(dir.path());
        repo.save(&IterationState::new("octo/widgets", "42", 5))
            .await
            .unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            assert_ne!(
                entry.path().extension().and_then(|e| e.to_str()),
                Some("tmp")
            );
        }
    }
}
