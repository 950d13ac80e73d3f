//! Default stage task templates bundled at compile time.
//!
//! Placeholders use `{name}` syntax and are resolved by
//! [`render`](super::tasks::render). Templates can be overridden per stage
//! from the `tasks` section of the settings file.

use super::pipeline::StageKind;

/// Analysis - requirements into specifications
pub const ANALYSIS: &str = include_str!("defaults/analysis.md");
pub const ANALYSIS_EXPECTED: &str = include_str!("defaults/analysis_expected.md");

/// Architecture - specifications into a design
pub const ARCHITECTURE: &str = include_str!("defaults/architecture.md");
pub const ARCHITECTURE_EXPECTED: &str = include_str!("defaults/architecture_expected.md");

/// Implementation - design into code
pub const IMPLEMENTATION: &str = include_str!("defaults/implementation.md");
pub const IMPLEMENTATION_EXPECTED: &str = include_str!("defaults/implementation_expected.md");

/// Review - code against specifications
pub const REVIEW: &str = include_str!("defaults/review.md");
pub const REVIEW_EXPECTED: &str = include_str!("defaults/review_expected.md");

/// (description, expected output) defaults for a stage
pub fn defaults_for(stage: StageKind) -> (&'static str, &'static str) {
    match stage {
        StageKind::Analysis => (ANALYSIS, ANALYSIS_EXPECTED),
        StageKind::Architecture => (ARCHITECTURE, ARCHITECTURE_EXPECTED),
        StageKind::Implementation => (IMPLEMENTATION, IMPLEMENTATION_EXPECTED),
        StageKind::Review => (REVIEW, REVIEW_EXPECTED),
    }
}
