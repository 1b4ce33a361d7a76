//! Boundary contracts of the analysis and persistence collaborators.

use crate::media::{MediaStream, RemoteStream};
use anyhow::Context;
use async_trait::async_trait;
use duet_core::{CallAnalyticsRecord, EmotionEvent};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Clone)]
pub enum AnalysisTarget {
    Local(MediaStream),
    Remote(RemoteStream),
}

/// Receives a live stream and emits tagged events on its own schedule.
///
/// Emission stops being useful once `events` is closed, which happens at teardown.
pub trait StreamAnalyzer: Send + Sync {
    fn attach(&self, target: AnalysisTarget, events: mpsc::Sender<EmotionEvent>);
}

/// Stores a finished call's aggregated record, keyed by session id.
#[async_trait]
pub trait CallRecordStore: Send + Sync {
    async fn store(&self, record: CallAnalyticsRecord) -> anyhow::Result<()>;
}

/// Writes each record as `<session_id>.json` into a directory.
#[derive(Debug, Clone)]
pub struct JsonFileRecordStore {
    dir: PathBuf,
}

impl JsonFileRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl CallRecordStore for JsonFileRecordStore {
    async fn store(&self, record: CallAnalyticsRecord) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.dir.join(format!("{}.json", record.session_id));
        let json = serde_json::to_vec_pretty(&record).context("Failed to encode call record")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(path = %path.display(), events = record.events.len(), "Stored call record");
        Ok(())
    }
}
