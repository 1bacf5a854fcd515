//! Filesystem-backed append-only cost event log.
//!
//! Every event is one JSON line, appended twice: to the per-change log and
//! to the billing-period log for the month it lands in. Totals are never
//! stored; readers replay the lines. Appends are O_APPEND writes, so
//! concurrent change loops interleave whole lines instead of clobbering a
//! shared aggregate.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::domain::errors::DomainResult;
use crate::domain::models::CostEvent;
use crate::domain::ports::CostStore;

/// Cost events as JSONL files under a base directory.
pub struct FsCostStore {
    dir: PathBuf,
}

impl FsCostStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn change_log(&self, repository: &str, change_id: &str) -> PathBuf {
        let sanitize = |s: &str| s.replace(['/', '\\', ':'], "_");
        self.dir
            .join(format!("{}__{}.jsonl", sanitize(repository), sanitize(change_id)))
    }

    fn period_log(&self, period: &str) -> PathBuf {
        self.dir.join(format!("period-{period}.jsonl"))
    }

    async fn append_line(path: &Path, line: &str) -> DomainResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_events(path: &Path) -> DomainResult<Vec<CostEvent>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut events = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str(line) {
                Ok(event) => events.push(event),
                Err(err) => {
                    // A torn or corrupt line loses one event, not the log.
                    warn!(path = %path.display(), error = %err, "skipping unparsable cost line");
                }
            }
        }
        Ok(events)
    }
}

#[async_trait]
impl CostStore for FsCostStore {
    async fn append(&self, event: &CostEvent) -> DomainResult<()> {
        fs::create_dir_all(&self.dir).await?;
        let line = serde_json::to_string(event)?;
        Self::append_line(&self.change_log(&event.repository, &event.change_id), &line).await?;
        Self::append_line(&self.period_log(&event.period()), &line).await
    }

    async fn change_events(
        &self,
        repository: &str,
        change_id: &str,
    ) -> DomainResult<Vec<CostEvent>> {
        Self::read_events(&self.change_log(repository, change_id)).await
    }

    async fn period_events(&self, period: &str) -> DomainResult<Vec<CostEvent>> {
        Self::read_events(&self.period_log(period)).await
    }
}
