//! # Role Agents
//!
//! Kind-checked wrappers around [`Agent`] exposing each role's domain
//! operations. Every operation is a model-backed prompt run under the guard.

use super::agent::Agent;
use super::profile::AgentKind;
use crate::guard::{guarded, ClassifiedError};
use crate::tools::ToolKind;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::ops::{Deref, DerefMut};

macro_rules! role_agent {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        pub struct $name(Agent);

        impl $name {
            pub const KIND: AgentKind = $kind;

            pub fn into_inner(self) -> Agent {
                self.0
            }
        }

        impl TryFrom<Agent> for $name {
            type Error = anyhow::Error;

            fn try_from(agent: Agent) -> anyhow::Result<Self> {
                if agent.kind() != $kind {
                    anyhow::bail!(
                        "invalid agent kind: expected {}, got {}",
                        $kind,
                        agent.kind()
                    );
                }
                Ok(Self(agent))
            }
        }

        impl Deref for $name {
            type Target = Agent;

            fn deref(&self) -> &Agent {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Agent {
                &mut self.0
            }
        }
    };
}

role_agent!(
    /// Turns requirements into specifications
    AnalystAgent,
    AgentKind::Analyst
);
role_agent!(
    /// Designs the architecture
    ArchitectAgent,
    AgentKind::Architect
);
role_agent!(
    /// Writes code and tests
    DeveloperAgent,
    AgentKind::Developer
);
role_agent!(
    /// Reviews code for bugs, security and performance
    ReviewerAgent,
    AgentKind::Reviewer
);

// ============================================================================
// Review Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewIssue {
    pub severity: String,
    pub description: String,
    /// Line number, function or file the issue refers to
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewSuggestion {
    pub description: String,
    /// Replacement or example code
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CodeReview {
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub suggestions: Vec<ReviewSuggestion>,
    pub overall_assessment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SecurityFinding {
    pub severity: String,
    pub vulnerability_type: String,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    pub mitigation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SecurityReview {
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub vulnerabilities: Vec<SecurityFinding>,
    pub overall_assessment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PerformanceFinding {
    pub severity: String,
    pub issue_type: String,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PerformanceReview {
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub performance_issues: Vec<PerformanceFinding>,
    pub overall_assessment: String,
}

/// Pull the outermost JSON object out of a model answer that may wrap it
/// in prose or a fenced block, then deserialize it.
pub fn parse_json_answer<T: DeserializeOwned>(answer: &str) -> anyhow::Result<T> {
    let start = answer.find('{');
    let end = answer.rfind('}');
    let body = match (start, end) {
        (Some(start), Some(end)) if end > start => &answer[start..=end],
        _ => anyhow::bail!("invalid model answer: no JSON object found"),
    };
    serde_json::from_str(body).map_err(|e| anyhow::anyhow!("invalid model answer: {}", e))
}

fn json_instructions<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    let schema = serde_json::to_string_pretty(&schema).unwrap_or_default();
    format!(
        "Answer with a single JSON object matching this schema and nothing else:\n```json\n{}\n```",
        schema
    )
}

// ============================================================================
// Domain Operations
// ============================================================================

impl ArchitectAgent {
    /// Component diagram (Mermaid) for the given specifications
    pub async fn create_architecture_diagram(
        &self,
        specifications: &str,
    ) -> Result<String, ClassifiedError> {
        let prompt = format!(
            "Create an architecture diagram for a {} application based on these specifications:\n\n{}\n\n\
             Use a Mermaid component or class diagram. Show the main components, their \
             responsibilities and the interfaces between them, then explain the diagram briefly.",
            self.profile().language(),
            specifications
        );
        self.ask(prompt).await
    }
}

impl DeveloperAgent {
    pub async fn generate_code(
        &self,
        specifications: &str,
        architecture: &str,
    ) -> Result<String, ClassifiedError> {
        let prompt = format!(
            "Write {lang} code implementing these specifications:\n\n{specifications}\n\n\
             Follow this architecture:\n\n{architecture}\n\n\
             Produce complete, documented {lang} source files with error handling.",
            lang = self.profile().language(),
        );
        self.ask(prompt).await
    }

    pub async fn generate_unit_tests(&self, code: &str) -> Result<String, ClassifiedError> {
        let lang = self.profile().language();
        let prompt = format!(
            "Write thorough unit tests for this {lang} code using the standard {lang} test \
             tooling. Cover normal paths, edge cases and failures.\n\n```{lang}\n{code}\n```",
        );
        self.ask(prompt).await
    }

    pub async fn fix_code_issues(&self, code: &str, issues: &[String]) -> Result<String, ClassifiedError> {
        let lang = self.profile().language();
        let listed: String = issues.iter().map(|i| format!("- {}\n", i)).collect();
        let prompt = format!(
            "Fix the following issues in this {lang} code and return the corrected code.\n\n\
             Issues:\n{listed}\n```{lang}\n{code}\n```",
        );
        self.ask(prompt).await
    }
}

impl ReviewerAgent {
    async fn structured<T>(&self, operation: &str, prompt: String) -> Result<T, ClassifiedError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let prompt = format!("{}\n\n{}", prompt, json_instructions::<T>());
        guarded(self.store(), operation, async {
            let answer = self.complete(prompt).await?;
            parse_json_answer::<T>(&answer)
        })
        .await
    }

    /// Heuristic findings to show the model, when this reviewer holds the
    /// static-analysis capability
    async fn heuristic_evidence(&self, code: &str, analysis: &str) -> String {
        if !self.profile().tools().contains(&ToolKind::StaticAnalysis) {
            return String::new();
        }
        match self
            .run_tool(ToolKind::StaticAnalysis, analysis, json!({ "code": code }))
            .await
        {
            Ok(output) => format!(
                "\n\nStatic analysis heuristics reported the following. Confirm or dismiss each \
                 finding:\n\n{}",
                output
            ),
            Err(e) => {
                tracing::debug!("Static analysis unavailable for review: {:#}", e);
                String::new()
            }
        }
    }

    pub async fn review_code(&self, code: &str, specifications: &str) -> Result<CodeReview, ClassifiedError> {
        let lang = self.profile().language();
        let evidence = self.heuristic_evidence(code, "all").await;
        let prompt = format!(
            "Review this {lang} code against the specifications. List the issues with their \
             severity and location, concrete suggestions with example code, and an overall \
             assessment.\n\nSpecifications:\n{specifications}\n\n```{lang}\n{code}\n```{evidence}",
        );
        self.structured("reviewer.review_code", prompt).await
    }

    pub async fn analyze_security(&self, code: &str) -> Result<Vec<SecurityFinding>, ClassifiedError> {
        let lang = self.profile().language();
        let evidence = self.heuristic_evidence(code, "security").await;
        let prompt = format!(
            "Audit this {lang} code for security vulnerabilities such as injection, hardcoded \
             secrets, unsafe deserialization and missing validation. Give each vulnerability a \
             type, severity, location and mitigation.\n\n```{lang}\n{code}\n```{evidence}",
        );
        let review: SecurityReview = self.structured("reviewer.analyze_security", prompt).await?;
        Ok(review.vulnerabilities)
    }

    pub async fn analyze_performance(
        &self,
        code: &str,
    ) -> Result<Vec<PerformanceFinding>, ClassifiedError> {
        let lang = self.profile().language();
        let evidence = self.heuristic_evidence(code, "performance").await;
        let prompt = format!(
            "Analyze this {lang} code for performance problems such as needless allocation, \
             quadratic loops and blocking I/O. Give each problem a type, severity, location and \
             a suggested fix.\n\n```{lang}\n{code}\n```{evidence}",
        );
        let review: PerformanceReview = self.structured("reviewer.analyze_performance", prompt).await?;
        Ok(review.performance_issues)
    }
}
