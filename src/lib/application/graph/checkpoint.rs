//! In-memory conversation checkpoints keyed by thread id.

use super::GraphState;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub state: GraphState,
    /// Number of saves for this thread so far.
    pub version: u64,
    pub saved_at: DateTime<Utc>,
}

/// Keeps the latest state of every thread for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryCheckpointer {
    threads: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(&self, thread_id: &str) -> Option<GraphState> {
        self.threads
            .lock()
            .await
            .get(thread_id)
            .map(|checkpoint| checkpoint.state.clone())
    }

    pub async fn save(&self, thread_id: &str, state: &GraphState) {
        let mut threads = self.threads.lock().await;
        let version = threads.get(thread_id).map_or(0, |c| c.version) + 1;
        threads.insert(
            thread_id.to_string(),
            Checkpoint {
                state: state.clone(),
                version,
                saved_at: Utc::now(),
            },
        );
    }

    pub async fn latest(&self, thread_id: &str) -> Option<Checkpoint> {
        self.threads.lock().await.get(thread_id).cloned()
    }
}
