//! # Crew
//!
//! The development pipeline: four role agents run as
//! `Analysis -> Architecture -> Implementation -> Review`, each stage one
//! agent executing one task built from the previous stages' outputs.
//!
//! ## Architecture
//!
//! - `pipeline` - stage kinds, the state machine and typed stage outputs
//! - `tasks` - stage task templates and their materialization
//! - `run` - the record of one cycle, kept even when a stage fails
//! - `events` - progress events for dashboards
//! - `dev_team` - [`DevTeamCrew`], the orchestrator

pub mod dev_team;
pub mod events;
pub mod pipeline;
pub mod prompts;
pub mod run;
pub mod tasks;

pub use dev_team::{CrewBuilder, DevTeamCrew};
pub use events::{CrewEvent, CrewEventKind};
pub use pipeline::{Pipeline, PipelineState, StageKind, StageOutput};
pub use run::{CycleResult, PipelineRun};
pub use tasks::{Task, TaskOverride, TaskTemplates, DEFAULT_REVIEW_SPECIFICATIONS};

/// Pipeline wiring failures
#[derive(Debug, thiserror::Error)]
pub enum CrewError {
    #[error("orchestration error: expected {expected} stage output, found {found}")]
    InvalidStageInput { expected: String, found: String },
}
