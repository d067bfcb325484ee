use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::warehouse::LoadMarker;

/// Outcome of one task, printed by the CLI as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task: String,
    pub table: String,
    pub rows: u64,
    pub checksum: String,
    pub attempts: u32,
    /// Extraction and data-quality counters, for tasks that read the extracts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<serde_json::Value>,
}

impl TaskReport {
    pub fn new(task: &str, marker: &LoadMarker) -> Self {
        Self {
            task: task.to_string(),
            table: marker.table.clone(),
            rows: marker.row_count,
            checksum: marker.checksum.clone(),
            attempts: 1,
            stats: None,
        }
    }

    pub fn with_stats(mut self, stats: serde_json::Value) -> Self {
        self.stats = Some(stats);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tasks: Vec<TaskReport>,
}

impl RunReport {
    pub fn task(&self, name: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.task == name)
    }
}
