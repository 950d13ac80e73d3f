//! # DevTeam Core
//!
//! A crew of role-specialized language-model agents (analyst, architect,
//! developer, reviewer) that turns a requirements statement into a
//! specification, an architecture, code and a review.
//!
//! ## Architecture
//!
//! - `errors/` - Error taxonomy and the shared error store
//! - `guard/` - Classifies and records every failing public operation
//! - `agents/` - Agent profiles, model bindings and role operations
//! - `crew/` - The four-stage pipeline orchestrator
//! - `llm/` - Language-model seam, response cache and rate limiting
//! - `models/` - LLM provider configuration
//! - `tools/` - Web search, file read, GitHub and static analysis
//! - `config/` - YAML + environment settings
//!
//! ## Usage
//!
//! ```rust,ignore
//! use devteam_core::config::Settings;
//! use devteam_core::crew::DevTeamCrew;
//!
//! let settings = Settings::load(None)?;
//! let mut crew = DevTeamCrew::builder_from_settings(&settings).build()?;
//! let result = crew.run_full_cycle("Build a task API", None, Some("Use Spring Boot")).await?;
//! ```

pub mod agents;
pub mod config;
pub mod crew;
pub mod errors;
pub mod guard;
pub mod llm;
pub mod models;
pub mod tools;

pub use errors::{AppError, ErrorCategory, ErrorStore, Severity};
pub use guard::ClassifiedError;
