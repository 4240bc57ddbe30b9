//! In-process pub/sub for job event streaming.
//!
//! One broadcast channel per job id. The pipeline and controller publish
//! typed events; SSE endpoints subscribe and forward. Publishing to a job
//! nobody watches is a no-op.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use crate::domains::search::JobStatus;

/// A streamed search event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchEvent {
    BatchStarted {
        batch_num: i64,
    },
    BatchCompleted {
        batch_num: i64,
        domains_checked: i64,
        domains_available: i64,
        good_results: i64,
    },
    StatusChanged {
        status: JobStatus,
    },
}

/// Job-keyed broadcast hub. Cheap to clone; shared across the server.
#[derive(Clone)]
pub struct StreamHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<SearchEvent>>>>,
    capacity: usize,
}

impl StreamHub {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: 128,
        }
    }

    /// Publish an event for a job. Dropped silently when nobody listens.
    pub async fn publish(&self, job_id: &str, event: SearchEvent) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(job_id) {
            let _ = tx.send(event);
        }
    }

    /// Subscribe to a job's events, creating the channel on first use.
    pub async fn subscribe(&self, job_id: &str) -> broadcast::Receiver<SearchEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(job_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Drop channels that lost all their subscribers.
    pub async fn prune(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}
