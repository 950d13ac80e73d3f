//! # Tool Capabilities
//!
//! Side operations an agent may invoke. Every tool exposes a single
//! dispatch entry point, `run(action, params)`. Unrecognized actions
//! return an `"Unknown action: ..."` message instead of failing.
//!
//! ## Modules
//!
//! - `search` - Web search through SearXNG instances
//! - `file_read` - Read files below a root directory
//! - `github` - GitHub REST operations (issues, pull requests, files)
//! - `code_analysis` - Regex heuristics for quality, security and performance
//! - `radkit_tools` - The same capabilities exposed to the model as radkit tools

pub mod code_analysis;
pub mod file_read;
pub mod github;
pub mod radkit_tools;
pub mod search;

use crate::config::Settings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use code_analysis::CodeAnalysisTool;
pub use file_read::FileReadTool;
pub use github::{GitHubConfig, GitHubError, GitHubTool};
pub use search::WebSearchTool;

/// Kind of capability an agent can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    WebSearch,
    FileRead,
    SourceControl,
    StaticAnalysis,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::WebSearch => "web_search",
            ToolKind::FileRead => "file_read",
            ToolKind::SourceControl => "source_control",
            ToolKind::StaticAnalysis => "static_analysis",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a tool dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Text(String),
    Structured(serde_json::Value),
}

impl ToolOutput {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ToolOutput::Text(text) => Some(text),
            ToolOutput::Structured(_) => None,
        }
    }
}

impl fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolOutput::Text(text) => f.write_str(text),
            ToolOutput::Structured(value) => {
                let pretty = serde_json::to_string_pretty(value).map_err(|_| fmt::Error)?;
                f.write_str(&pretty)
            }
        }
    }
}

/// Normalize an action name: `create-issue` and `create_issue` are the same
pub fn normalize_action(action: &str) -> String {
    action.trim().to_lowercase().replace('-', "_")
}

/// The standard message for unrecognized actions
pub fn unknown_action(action: &str) -> ToolOutput {
    ToolOutput::Text(format!("Unknown action: {}", action))
}

/// A capability invoked through a single dispatch operation
#[async_trait]
pub trait ToolCapability: Send + Sync {
    fn kind(&self) -> ToolKind;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn run(&self, action: &str, params: &serde_json::Value) -> anyhow::Result<ToolOutput>;
}

/// The tools available to a crew, one per kind
#[derive(Clone, Default)]
pub struct ToolBox {
    tools: HashMap<ToolKind, Arc<dyn ToolCapability>>,
}

impl ToolBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in tool, configured from settings
    pub fn standard(settings: &Settings) -> Self {
        Self::new()
            .with(Arc::new(WebSearchTool::new(settings.search_url.clone())))
            .with(Arc::new(FileReadTool::new(settings.workspace_root.clone())))
            .with(Arc::new(GitHubTool::new(settings.github.clone())))
            .with(Arc::new(CodeAnalysisTool::new()))
    }

    pub fn with(mut self, tool: Arc<dyn ToolCapability>) -> Self {
        self.tools.insert(tool.kind(), tool);
        self
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn ToolCapability>> {
        self.tools.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<ToolKind> {
        let mut kinds: Vec<ToolKind> = self.tools.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

impl fmt::Debug for ToolBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolBox").field("tools", &self.kinds()).finish()
    }
}
