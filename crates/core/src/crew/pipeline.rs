//! # Pipeline Stages
//!
//! The four-stage state machine of a development cycle and the typed
//! stage output passed between stages.

use crate::agents::AgentKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stage of the development cycle, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Analysis,
    Architecture,
    Implementation,
    Review,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Analysis,
        StageKind::Architecture,
        StageKind::Implementation,
        StageKind::Review,
    ];

    /// Fixed 1-based position
    pub fn position(&self) -> usize {
        match self {
            StageKind::Analysis => 1,
            StageKind::Architecture => 2,
            StageKind::Implementation => 3,
            StageKind::Review => 4,
        }
    }

    /// Agent kind bound to this stage
    pub fn agent(&self) -> AgentKind {
        match self {
            StageKind::Analysis => AgentKind::Analyst,
            StageKind::Architecture => AgentKind::Architect,
            StageKind::Implementation => AgentKind::Developer,
            StageKind::Review => AgentKind::Reviewer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Analysis => "analysis",
            StageKind::Architecture => "architecture",
            StageKind::Implementation => "implementation",
            StageKind::Review => "review",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque text produced by one stage, tagged with its stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutput {
    pub kind: StageKind,
    pub text: String,
}

impl StageOutput {
    pub fn new(kind: StageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "stage")]
pub enum PipelineState {
    Running(StageKind),
    Done,
    Failed(StageKind),
}

/// The pipeline state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub state: PipelineState,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            state: PipelineState::Running(StageKind::Analysis),
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage currently executing, if any
    pub fn current(&self) -> Option<StageKind> {
        match self.state {
            PipelineState::Running(stage) => Some(stage),
            _ => None,
        }
    }

    /// Move to the next stage after the current one produced output
    pub fn advance(&mut self) {
        self.state = match self.state {
            PipelineState::Running(StageKind::Analysis) => {
                PipelineState::Running(StageKind::Architecture)
            }
            PipelineState::Running(StageKind::Architecture) => {
                PipelineState::Running(StageKind::Implementation)
            }
            PipelineState::Running(StageKind::Implementation) => {
                PipelineState::Running(StageKind::Review)
            }
            PipelineState::Running(StageKind::Review) => PipelineState::Done,
            terminal => terminal,
        };
    }

    /// Fail at the current stage. Terminal states are absorbing.
    pub fn fail(&mut self) {
        if let PipelineState::Running(stage) = self.state {
            self.state = PipelineState::Failed(stage);
        }
    }

    pub fn is_complete(&self) -> bool {
        !matches!(self.state, PipelineState::Running(_))
    }

    pub fn is_success(&self) -> bool {
        self.state == PipelineState::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_advance() {
        let mut pipeline = Pipeline::new();
        let mut seen = Vec::new();
        while let Some(stage) = pipeline.current() {
            seen.push(stage);
            pipeline.advance();
        }
        assert_eq!(seen, StageKind::ALL.to_vec());
        assert!(pipeline.is_success());

        pipeline.advance();
        assert_eq!(pipeline.state, PipelineState::Done);
    }

    #[test]
    fn test_failed_is_absorbing() {
        let mut pipeline = Pipeline::new();
        pipeline.advance();
        pipeline.fail();
        assert_eq!(pipeline.state, PipelineState::Failed(StageKind::Architecture));
        assert!(pipeline.is_complete());
        assert!(!pipeline.is_success());

        pipeline.advance();
        pipeline.fail();
        assert_eq!(pipeline.state, PipelineState::Failed(StageKind::Architecture));
    }

    #[test]
    fn test_stage_metadata() {
        let positions: Vec<usize> = StageKind::ALL.iter().map(|s| s.position()).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);
        assert_eq!(StageKind::Review.agent(), AgentKind::Reviewer);
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(PipelineState::Failed(StageKind::Architecture)).unwrap();
        assert_eq!(json, serde_json::json!({"state": "failed", "stage": "architecture"}));
        let done = serde_json::to_value(PipelineState::Done).unwrap();
        assert_eq!(done, serde_json::json!({"state": "done"}));
    }
}
