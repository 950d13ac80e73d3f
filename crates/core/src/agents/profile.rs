//! # Agent Profiles
//!
//! One table-driven builder turns `{kind, language}` into a complete
//! profile. Role and backstory are rendered from the kind's template with
//! the target language, so they always agree on the language.

use crate::models::ModelConfig;
use crate::tools::ToolKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default target language of a new crew
pub const DEFAULT_LANGUAGE: &str = "Java";

pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Analyst,
    Architect,
    Developer,
    Reviewer,
}

struct RoleTemplate {
    role: &'static str,
    goal: &'static str,
    backstory: &'static str,
}

const ANALYST: RoleTemplate = RoleTemplate {
    role: "Technical and functional requirements analyst specialized in {language}",
    goal: "Understand and formalize project needs into actionable specifications",
    backstory: "You excel at turning vague requests into clear, structured specifications \
        for {language} projects. You ask the right questions to remove ambiguity and anticipate \
        needs nobody stated. Your experience lets you break complex problems into manageable \
        components and prioritize features effectively. You balance user needs, technical \
        constraints and business goals, and you know the design practices and patterns of \
        {language} thoroughly.",
};

const ARCHITECT: RoleTemplate = RoleTemplate {
    role: "Senior Software Architect specialized in {language}",
    goal: "Design a robust, extensible and maintainable software architecture",
    backstory: "You are a software architect with 15 years of experience designing complex \
        systems in {language}. You create architectures that anticipate future needs while \
        staying pragmatic. You master design patterns and principles such as SOLID and apply \
        them with judgement, never overcomplicating things. You know the standard frameworks \
        and libraries of {language} in depth and when each one fits. You foresee integration, \
        performance and security challenges from the design phase on.",
};

const DEVELOPER: RoleTemplate = RoleTemplate {
    role: "Senior Developer specialized in {language}",
    goal: "Turn specifications into high-quality code following best practices",
    backstory: "You are a meticulous developer who writes clean, well documented and tested \
        {language} code. You master design patterns and SOLID principles. Your code always \
        ships with thorough unit tests and clear documentation. You implement complex features \
        elegantly and efficiently, and you care about readability and long-term \
        maintainability. You know the {language} ecosystem, its popular frameworks and its \
        current best practices in depth.",
};

const REVIEWER: RoleTemplate = RoleTemplate {
    role: "{language} code review expert",
    goal: "Identify potential problems, security flaws and possible optimizations",
    backstory: "You have a critical eye for subtle bugs, performance problems and security \
        flaws in {language} code, and you always propose constructive improvements. You \
        routinely catch problems other developers miss. You know the good practices and common \
        pitfalls specific to {language} and its frameworks. You explain not only what could be \
        improved but also why and how, with particular attention to security, performance, \
        readability and maintainability.",
};

fn render(template: &str, language: &str) -> String {
    template.replace("{language}", language)
}

impl AgentKind {
    pub fn all() -> [AgentKind; 4] {
        [
            AgentKind::Analyst,
            AgentKind::Architect,
            AgentKind::Developer,
            AgentKind::Reviewer,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Analyst => "analyst",
            AgentKind::Architect => "architect",
            AgentKind::Developer => "developer",
            AgentKind::Reviewer => "reviewer",
        }
    }

    fn template(&self) -> &'static RoleTemplate {
        match self {
            AgentKind::Analyst => &ANALYST,
            AgentKind::Architect => &ARCHITECT,
            AgentKind::Developer => &DEVELOPER,
            AgentKind::Reviewer => &REVIEWER,
        }
    }

    /// Web search and file read for every kind; developers and reviewers
    /// also get source control and static analysis.
    pub fn default_tools(&self) -> Vec<ToolKind> {
        let mut tools = vec![ToolKind::WebSearch, ToolKind::FileRead];
        if matches!(self, AgentKind::Developer | AgentKind::Reviewer) {
            tools.extend([ToolKind::SourceControl, ToolKind::StaticAnalysis]);
        }
        tools
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything an agent's model binding is built from.
///
/// Fields are private: role and backstory can only change together with
/// the language, through [`AgentProfile::apply`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentProfile {
    kind: AgentKind,
    language: String,
    role: String,
    goal: String,
    goal_override: Option<String>,
    backstory: String,
    model: ModelConfig,
    verbose: bool,
    allow_delegation: bool,
    tools: Vec<ToolKind>,
    max_iterations: u32,
    max_rpm: Option<u32>,
}

impl AgentProfile {
    pub fn build(kind: AgentKind, language: &str) -> Self {
        let template = kind.template();
        Self {
            kind,
            language: language.to_string(),
            role: render(template.role, language),
            goal: template.goal.to_string(),
            goal_override: None,
            backstory: render(template.backstory, language),
            model: ModelConfig::default(),
            verbose: true,
            allow_delegation: true,
            tools: kind.default_tools(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_rpm: None,
        }
    }

    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn backstory(&self) -> &str {
        &self.backstory
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn allow_delegation(&self) -> bool {
        self.allow_delegation
    }

    pub fn tools(&self) -> &[ToolKind] {
        &self.tools
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn max_rpm(&self) -> Option<u32> {
        self.max_rpm
    }

    /// Return a new profile with `update` applied. `self` is untouched.
    pub fn apply(&self, update: &ProfileUpdate) -> AgentProfile {
        let mut next = self.clone();

        if let Some(language) = &update.language {
            next.language = language.clone();
        }
        if let Some(goal) = &update.goal {
            next.goal_override = Some(goal.clone());
        }
        if let Some(model) = &update.model {
            next.model = model.clone();
        }
        if let Some(temperature) = update.temperature {
            next.model.temperature = temperature;
        }
        if let Some(verbose) = update.verbose {
            next.verbose = verbose;
        }
        if let Some(allow_delegation) = update.allow_delegation {
            next.allow_delegation = allow_delegation;
        }
        if let Some(tools) = &update.tools {
            next.tools = tools.clone();
        }
        if let Some(max_iterations) = update.max_iterations {
            next.max_iterations = max_iterations;
        }
        if let Some(max_rpm) = update.max_rpm {
            next.max_rpm = max_rpm;
        }

        let template = next.kind.template();
        next.role = render(template.role, &next.language);
        next.backstory = render(template.backstory, &next.language);
        next.goal = next
            .goal_override
            .clone()
            .unwrap_or_else(|| template.goal.to_string());
        next
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.language.trim().is_empty() {
            anyhow::bail!("invalid agent profile: target language is empty");
        }
        if self.max_iterations == 0 {
            anyhow::bail!("invalid agent profile: max_iterations must be at least 1");
        }
        self.model.validate()
    }

    /// Role, goal and backstory as model system instructions
    pub fn system_instructions(&self) -> String {
        format!(
            "You are a {}.\n\nGoal: {}\n\nBackground: {}\n\nWork on at most {} reasoning steps and answer in Markdown.",
            self.role, self.goal, self.backstory, self.max_iterations
        )
    }
}

/// A partial change to an [`AgentProfile`]. Unset fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub language: Option<String>,
    pub goal: Option<String>,
    pub model: Option<ModelConfig>,
    pub temperature: Option<f32>,
    pub verbose: Option<bool>,
    pub allow_delegation: Option<bool>,
    pub tools: Option<Vec<ToolKind>>,
    pub max_iterations: Option<u32>,
    /// `Some(None)` removes the rate limit
    pub max_rpm: Option<Option<u32>>,
}

impl ProfileUpdate {
    pub fn language(language: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_renders_language() {
        let profile = AgentProfile::build(AgentKind::Reviewer, "Kotlin");
        assert_eq!(profile.role(), "Kotlin code review expert");
        assert!(profile.backstory().contains("Kotlin"));
        assert!(!profile.role().contains("{language}"));
        assert!(profile.verbose());
        assert!(profile.allow_delegation());
        assert_eq!(profile.max_iterations(), DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn test_language_change_regenerates_role_and_backstory() {
        for kind in AgentKind::all() {
            let before = AgentProfile::build(kind, "Kotlin");
            let after = before.apply(&ProfileUpdate::language("Haskell"));

            assert!(after.role().contains("Haskell"), "{kind}");
            assert!(after.backstory().contains("Haskell"), "{kind}");
            assert!(!after.role().contains("Kotlin"), "{kind}");
            assert!(!after.backstory().contains("Kotlin"), "{kind}");
            assert_eq!(after.goal(), before.goal());
            assert_eq!(before.language(), "Kotlin");
        }
    }

    #[test]
    fn test_goal_override_survives_language_change() {
        let profile = AgentProfile::build(AgentKind::Analyst, "Java").apply(&ProfileUpdate {
            goal: Some("Write user stories".to_string()),
            ..ProfileUpdate::default()
        });
        let moved = profile.apply(&ProfileUpdate::language("Go"));
        assert_eq!(moved.goal(), "Write user stories");
    }

    #[test]
    fn test_default_tools_by_kind() {
        assert_eq!(
            AgentKind::Analyst.default_tools(),
            vec![ToolKind::WebSearch, ToolKind::FileRead]
        );
        let reviewer = AgentKind::Reviewer.default_tools();
        assert!(reviewer.contains(&ToolKind::SourceControl));
        assert!(reviewer.contains(&ToolKind::StaticAnalysis));
    }

    #[test]
    fn test_validate() {
        let profile = AgentProfile::build(AgentKind::Developer, "Rust");
        assert!(profile.validate().is_ok());

        let hot = profile.apply(&ProfileUpdate {
            temperature: Some(1.2),
            ..ProfileUpdate::default()
        });
        assert!(hot.validate().is_err());

        let blank = profile.apply(&ProfileUpdate::language(" "));
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_rate_limit_can_be_removed() {
        let limited = AgentProfile::build(AgentKind::Analyst, "Java").apply(&ProfileUpdate {
            max_rpm: Some(Some(10)),
            ..ProfileUpdate::default()
        });
        assert_eq!(limited.max_rpm(), Some(10));
        let unlimited = limited.apply(&ProfileUpdate {
            max_rpm: Some(None),
            ..ProfileUpdate::default()
        });
        assert_eq!(unlimited.max_rpm(), None);
    }
}
