//! # Stage Tasks
//!
//! A [`Task`] is one fully materialized stage prompt: the description with
//! every placeholder resolved plus the expected-output contract. Tasks are
//! built from [`TaskTemplates`] before the stage starts, so an agent never
//! sees a partially interpolated description.

use super::pipeline::{StageKind, StageOutput};
use super::prompts;
use super::CrewError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const NO_CONTEXT: &str = "No additional context provided.";
pub const NO_CONSTRAINTS: &str = "No specific constraints provided.";
/// Substituted when a standalone review is requested without specifications
pub const DEFAULT_REVIEW_SPECIFICATIONS: &str =
    "No specific specifications provided, focus on code quality, security, and performance.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    kind: StageKind,
    description: String,
    expected_output: String,
}

impl Task {
    pub fn new(
        kind: StageKind,
        description: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            expected_output: expected_output.into(),
        }
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn expected_output(&self) -> &str {
        &self.expected_output
    }

    /// Prompt sent to the stage's agent
    pub fn prompt(&self) -> String {
        format!(
            "{}\n\nExpected output:\n{}",
            self.description, self.expected_output
        )
    }
}

/// Per-stage template override from the settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOverride {
    pub description: Option<String>,
    pub expected_output: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct TaskTemplate {
    description: String,
    expected_output: String,
}

/// Description and expected-output templates for the four stages
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTemplates {
    templates: HashMap<StageKind, TaskTemplate>,
}

impl Default for TaskTemplates {
    fn default() -> Self {
        let templates = StageKind::ALL
            .iter()
            .map(|&stage| {
                let (description, expected_output) = prompts::defaults_for(stage);
                (
                    stage,
                    TaskTemplate {
                        description: description.trim_end().to_string(),
                        expected_output: expected_output.trim_end().to_string(),
                    },
                )
            })
            .collect();
        Self { templates }
    }
}

impl TaskTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the parts of stage templates that `overrides` sets
    pub fn with_overrides(mut self, overrides: &HashMap<StageKind, TaskOverride>) -> Self {
        for (stage, update) in overrides {
            if let Some(template) = self.templates.get_mut(stage) {
                if let Some(description) = &update.description {
                    template.description = description.trim_end().to_string();
                }
                if let Some(expected) = &update.expected_output {
                    template.expected_output = expected.trim_end().to_string();
                }
                tracing::debug!(stage = %stage, "Task template overridden");
            }
        }
        self
    }

    fn materialize(&self, stage: StageKind, vars: &[(&str, &str)]) -> Task {
        let (description, expected) = match self.templates.get(&stage) {
            Some(t) => (t.description.as_str(), t.expected_output.as_str()),
            None => prompts::defaults_for(stage),
        };
        Task::new(stage, render(description, vars), render(expected, vars))
    }

    pub fn analysis(&self, language: &str, requirements: &str, context: Option<&str>) -> Task {
        self.materialize(
            StageKind::Analysis,
            &[
                ("language", language),
                ("requirements", requirements),
                ("context", or_default(context, NO_CONTEXT)),
            ],
        )
    }

    pub fn architecture(
        &self,
        language: &str,
        specification: &StageOutput,
        constraints: Option<&str>,
    ) -> Result<Task, CrewError> {
        let specifications = expect_output(specification, StageKind::Analysis)?;
        Ok(self.materialize(
            StageKind::Architecture,
            &[
                ("language", language),
                ("specifications", specifications),
                ("constraints", or_default(constraints, NO_CONSTRAINTS)),
            ],
        ))
    }

    pub fn implementation(
        &self,
        language: &str,
        specification: &StageOutput,
        architecture: &StageOutput,
    ) -> Result<Task, CrewError> {
        let specifications = expect_output(specification, StageKind::Analysis)?;
        let architecture = expect_output(architecture, StageKind::Architecture)?;
        Ok(self.materialize(
            StageKind::Implementation,
            &[
                ("language", language),
                ("specifications", specifications),
                ("architecture", architecture),
            ],
        ))
    }

    /// Review stage of a full cycle: the implementation against stage 1's
    /// specification
    pub fn review_stage(
        &self,
        language: &str,
        implementation: &StageOutput,
        specification: &StageOutput,
    ) -> Result<Task, CrewError> {
        let code = expect_output(implementation, StageKind::Implementation)?;
        let specifications = expect_output(specification, StageKind::Analysis)?;
        Ok(self.review(language, code, Some(specifications)))
    }

    /// Review of arbitrary code
    pub fn review(&self, language: &str, code: &str, specifications: Option<&str>) -> Task {
        self.materialize(
            StageKind::Review,
            &[
                ("language", language),
                ("code", code),
                (
                    "specifications",
                    or_default(specifications, DEFAULT_REVIEW_SPECIFICATIONS),
                ),
            ],
        )
    }
}

fn or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or(default)
}

fn expect_output(output: &StageOutput, expected: StageKind) -> Result<&str, CrewError> {
    if output.kind != expected {
        return Err(CrewError::InvalidStageInput {
            expected: expected.to_string(),
            found: output.kind.to_string(),
        });
    }
    Ok(&output.text)
}

/// Resolve `{name}` placeholders in a single pass. Unknown placeholders and
/// stray braces are kept as written, and substituted values are never
/// rescanned.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let value = if after[name_len..].starts_with('}') {
            let name = &after[..name_len];
            vars.iter().find(|(key, _)| *key == name).map(|(_, v)| *v)
        } else {
            None
        };

        match value {
            Some(value) => {
                out.push_str(value);
                rest = &after[name_len + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
