//! # Crew Events
//!
//! Progress events emitted while a development cycle runs.

use super::pipeline::StageKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CrewEventKind {
    PipelineStarted,
    StageStarted,
    StageCompleted,
    StageFailed,
    PipelineCompleted,
    PipelineFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: CrewEventKind,
    /// Stage the event refers to, if any
    #[serde(default)]
    pub stage: Option<StageKind>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl CrewEvent {
    pub fn new(kind: CrewEventKind) -> Self {
        Self {
            id: event_id(),
            timestamp: Utc::now(),
            kind,
            stage: None,
            data: None,
        }
    }

    pub fn for_stage(kind: CrewEventKind, stage: StageKind) -> Self {
        Self {
            stage: Some(stage),
            ..Self::new(kind)
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Time-ordered id, unique within a process
pub(crate) fn event_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{:x}-{:04x}", nanos, SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0xffff)
}
