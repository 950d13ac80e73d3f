//! # Pipeline Runs
//!
//! The record of one full-cycle invocation. Outputs are filled strictly in
//! stage order; a run that failed at stage k keeps outputs 1..k-1.

use super::events::{event_id, CrewEvent};
use super::pipeline::{Pipeline, PipelineState, StageKind, StageOutput};
use super::CrewError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outputs of a completed cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleResult {
    pub specification: String,
    pub architecture: String,
    pub implementation: String,
    pub review: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: String,
    pub language: String,
    pub requirements: String,
    pub context: Option<String>,
    pub constraints: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pipeline: Pipeline,
    specification: Option<StageOutput>,
    architecture: Option<StageOutput>,
    implementation: Option<StageOutput>,
    review: Option<StageOutput>,
    pub events: Vec<CrewEvent>,
}

impl PipelineRun {
    pub fn new(
        language: &str,
        requirements: &str,
        context: Option<&str>,
        constraints: Option<&str>,
    ) -> Self {
        Self {
            id: event_id(),
            language: language.to_string(),
            requirements: requirements.to_string(),
            context: context.map(str::to_string),
            constraints: constraints.map(str::to_string),
            started_at: Utc::now(),
            finished_at: None,
            pipeline: Pipeline::new(),
            specification: None,
            architecture: None,
            implementation: None,
            review: None,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.pipeline.state
    }

    /// Stage that runs next, if the run is still in progress
    pub fn current_stage(&self) -> Option<StageKind> {
        self.pipeline.current()
    }

    pub fn is_complete(&self) -> bool {
        self.pipeline.is_complete()
    }

    pub fn is_success(&self) -> bool {
        self.pipeline.is_success()
    }

    pub fn output(&self, stage: StageKind) -> Option<&StageOutput> {
        match stage {
            StageKind::Analysis => self.specification.as_ref(),
            StageKind::Architecture => self.architecture.as_ref(),
            StageKind::Implementation => self.implementation.as_ref(),
            StageKind::Review => self.review.as_ref(),
        }
    }

    /// Store the output of the current stage and advance
    pub fn record(&mut self, output: StageOutput) -> Result<(), CrewError> {
        let current = self.pipeline.current();
        if current != Some(output.kind) {
            return Err(CrewError::InvalidStageInput {
                expected: current.map_or_else(|| "no".to_string(), |s| s.to_string()),
                found: output.kind.to_string(),
            });
        }
        let slot = match output.kind {
            StageKind::Analysis => &mut self.specification,
            StageKind::Architecture => &mut self.architecture,
            StageKind::Implementation => &mut self.implementation,
            StageKind::Review => &mut self.review,
        };
        *slot = Some(output);
        self.pipeline.advance();
        if self.pipeline.is_complete() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Mark the current stage as failed
    pub fn fail(&mut self) {
        self.pipeline.fail();
        self.finished_at = Some(Utc::now());
    }

    /// All four outputs, once the run is done
    pub fn result(&self) -> Option<CycleResult> {
        if !self.pipeline.is_success() {
            return None;
        }
        Some(CycleResult {
            specification: self.specification.as_ref()?.text.clone(),
            architecture: self.architecture.as_ref()?.text.clone(),
            implementation: self.implementation.as_ref()?.text.clone(),
            review: self.review.as_ref()?.text.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outputs_fill_in_order() {
        let mut run = PipelineRun::new("Java", "Build a task API", None, None);
        run.record(StageOutput::new(StageKind::Analysis, "spec")).unwrap();
        assert!(run.result().is_none());

        let err = run
            .record(StageOutput::new(StageKind::Implementation, "code"))
            .unwrap_err();
        assert!(err.to_string().contains("expected architecture"));
        assert!(run.output(StageKind::Implementation).is_none());

        run.record(StageOutput::new(StageKind::Architecture, "arch")).unwrap();
        run.record(StageOutput::new(StageKind::Implementation, "code")).unwrap();
        run.record(StageOutput::new(StageKind::Review, "lgtm")).unwrap();

        let result = run.result().unwrap();
        assert_eq!(result.specification, "spec");
        assert_eq!(result.review, "lgtm");
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_failed_run_keeps_prefix() {
        let mut run = PipelineRun::new("Java", "Build a task API", None, Some("use Spring"));
        run.record(StageOutput::new(StageKind::Analysis, "spec")).unwrap();
        run.fail();

        assert_eq!(run.state(), PipelineState::Failed(StageKind::Architecture));
        assert_eq!(run.output(StageKind::Analysis).unwrap().text, "spec");
        assert!(run.output(StageKind::Architecture).is_none());
        assert!(run.result().is_none());

        let err = run.record(StageOutput::new(StageKind::Architecture, "late"));
        assert!(err.is_err());
    }
}
