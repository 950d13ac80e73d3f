//! # Agents
//!
//! Role-specialized agents: a profile (role, goal, backstory, language,
//! model, tools) bound to a language model, plus the role wrappers that
//! expose each kind's domain operations.

pub mod agent;
pub mod profile;
pub mod roles;

pub use agent::{Agent, AgentBuilder, ModelBinding};
pub use profile::{AgentKind, AgentProfile, ProfileUpdate, DEFAULT_LANGUAGE};
pub use roles::{
    AnalystAgent, ArchitectAgent, CodeReview, DeveloperAgent, PerformanceFinding, ReviewIssue,
    ReviewSuggestion, ReviewerAgent, SecurityFinding,
};
