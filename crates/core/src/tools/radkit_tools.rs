//! # Model-Facing Tools
//!
//! An agent's capabilities exposed to its bound model as radkit function
//! tools. [`AgentTools`] carries the crew's [`ToolBox`], built from
//! settings, and the shared [`ErrorStore`], so a tool call made by the
//! model goes through the same dispatch and the same guard as
//! [`Agent::invoke_tool`](crate::agents::Agent::invoke_tool).

use super::{ToolBox, ToolKind, ToolOutput};
use crate::agents::AgentKind;
use crate::errors::ErrorStore;
use crate::guard::guarded;
use anyhow::Context;
use radkit::tools::{FunctionTool, ToolResult};
use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize, JsonSchema)]
pub struct SearchWebArgs {
    /// Search query
    pub query: String,
    /// Maximum number of results (default: 5)
    pub max_results: Option<u32>,
}

#[derive(Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// Path relative to the workspace root
    pub path: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct AnalyzeCodeArgs {
    /// Source code to analyze
    pub code: String,
    /// quality, security, performance or all (default: all)
    pub analysis_type: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct GitHubArgs {
    /// Action name, e.g. get_issues, get_file_content, get_pull_request_files
    pub action: String,
    /// Action parameters as a JSON object
    pub params: Option<Value>,
}

/// Name the model sees for a capability
pub fn function_name(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::WebSearch => "search_web",
        ToolKind::FileRead => "read_file",
        ToolKind::SourceControl => "github",
        ToolKind::StaticAnalysis => "analyze_code",
    }
}

fn description(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::WebSearch => {
            "Search the web for information. Returns search results with URLs and snippets."
        }
        ToolKind::FileRead => {
            "Read a file's contents from the workspace. Returns the content and line count."
        }
        ToolKind::SourceControl => {
            "Query or update the configured GitHub repository. Actions: get_repo_info, \
             get_issues, create_issue, get_pull_requests, get_pull_request, \
             get_pull_request_files, review_pull_request, get_file_content, \
             create_or_update_file."
        }
        ToolKind::StaticAnalysis => {
            "Run static heuristics over code. Reports quality issues, security \
             vulnerabilities and performance problems."
        }
    }
}

fn parameters_schema(kind: ToolKind) -> Value {
    match kind {
        ToolKind::WebSearch => schema_for!(SearchWebArgs).to_value(),
        ToolKind::FileRead => schema_for!(ReadFileArgs).to_value(),
        ToolKind::SourceControl => schema_for!(GitHubArgs).to_value(),
        ToolKind::StaticAnalysis => schema_for!(AnalyzeCodeArgs).to_value(),
    }
}

/// Translate model arguments into a tool action and its parameters
fn tool_call(kind: ToolKind, args: Value) -> anyhow::Result<(String, Value)> {
    match kind {
        ToolKind::WebSearch => {
            let args: SearchWebArgs =
                serde_json::from_value(args).context("invalid search_web arguments")?;
            let max_results = args.max_results.unwrap_or(5);
            Ok((
                "search".to_string(),
                json!({ "query": args.query, "max_results": max_results }),
            ))
        }
        ToolKind::FileRead => {
            let args: ReadFileArgs =
                serde_json::from_value(args).context("invalid read_file arguments")?;
            Ok(("read".to_string(), json!({ "path": args.path })))
        }
        ToolKind::SourceControl => {
            let args: GitHubArgs =
                serde_json::from_value(args).context("invalid github arguments")?;
            Ok((args.action, args.params.unwrap_or_else(|| json!({}))))
        }
        ToolKind::StaticAnalysis => {
            let args: AnalyzeCodeArgs =
                serde_json::from_value(args).context("invalid analyze_code arguments")?;
            let analysis = args.analysis_type.unwrap_or_else(|| "all".to_string());
            Ok((analysis, json!({ "code": args.code, "format": "json" })))
        }
    }
}

/// The capabilities one agent holds, bound to the crew's tools
#[derive(Debug, Clone)]
pub struct AgentTools {
    agent: AgentKind,
    kinds: Vec<ToolKind>,
    toolbox: ToolBox,
    store: ErrorStore,
    language: String,
}

impl AgentTools {
    pub fn new(
        agent: AgentKind,
        kinds: &[ToolKind],
        toolbox: ToolBox,
        store: ErrorStore,
        language: &str,
    ) -> Self {
        Self {
            agent,
            kinds: kinds.to_vec(),
            toolbox,
            store,
            language: language.to_string(),
        }
    }

    /// Capabilities held by the agent
    pub fn kinds(&self) -> &[ToolKind] {
        &self.kinds
    }

    /// Held capabilities that have a configured tool
    pub fn available(&self) -> Vec<ToolKind> {
        self.kinds
            .iter()
            .copied()
            .filter(|kind| self.toolbox.get(*kind).is_some())
            .collect()
    }

    /// Check the capability and run `action` on the configured tool.
    /// Static analysis defaults to the agent's language.
    pub(crate) async fn dispatch(
        &self,
        kind: ToolKind,
        action: &str,
        mut params: Value,
    ) -> anyhow::Result<ToolOutput> {
        if !self.kinds.contains(&kind) {
            anyhow::bail!(
                "invalid tool request: the {} agent does not hold the {} capability",
                self.agent,
                kind
            );
        }
        let Some(tool) = self.toolbox.get(kind) else {
            anyhow::bail!("invalid tool request: no {} tool is configured", kind);
        };

        if kind == ToolKind::StaticAnalysis {
            if let Some(map) = params.as_object_mut() {
                map.entry("language")
                    .or_insert_with(|| json!(self.language));
            }
        }

        tracing::debug!(agent = %self.agent, tool = %kind, action, "Invoking tool");
        tool.run(action, &params).await
    }

    /// Run a model tool call. Failures are recorded in the store once and
    /// handed back to the model as an error result.
    pub async fn call(&self, kind: ToolKind, args: Value) -> ToolResult {
        let operation = format!("tool.{}", function_name(kind));
        let outcome = guarded(&self.store, &operation, async {
            let (action, params) = tool_call(kind, args)?;
            self.dispatch(kind, &action, params).await
        })
        .await;

        match outcome {
            Ok(ToolOutput::Structured(value)) => ToolResult::success(value),
            Ok(ToolOutput::Text(text)) => ToolResult::success(json!({ "result": text })),
            Err(e) => ToolResult::error(e.record().message().to_string()),
        }
    }

    /// radkit function tools for every available capability
    pub fn function_tools(&self) -> Vec<FunctionTool> {
        self.available()
            .into_iter()
            .map(|kind| {
                let tools = self.clone();
                FunctionTool::new(function_name(kind), description(kind), move |args, _ctx| {
                    let tools = tools.clone();
                    Box::pin(async move {
                        tools
                            .call(kind, Value::Object(args.into_iter().collect()))
                            .await
                    })
                })
                .with_parameters_schema(parameters_schema(kind))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::errors::ErrorCategory;
    use crate::tools::CodeAnalysisTool;
    use radkit::tools::{BaseTool, DefaultExecutionState, ToolContext};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn workspace_tools(kinds: &[ToolKind], store: &ErrorStore) -> (tempfile::TempDir, AgentTools) {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "# Shop\nSells things\n").unwrap();
        let settings = Settings {
            workspace_root: dir.path().to_path_buf(),
            ..Settings::default()
        };
        let tools = AgentTools::new(
            AgentKind::Developer,
            kinds,
            ToolBox::standard(&settings),
            store.clone(),
            "Rust",
        );
        (dir, tools)
    }

    #[test]
    fn test_function_tools_follow_held_capabilities() {
        let store = ErrorStore::new();
        let tools = AgentTools::new(
            AgentKind::Reviewer,
            &[ToolKind::WebSearch, ToolKind::StaticAnalysis, ToolKind::SourceControl],
            ToolBox::new().with(Arc::new(CodeAnalysisTool::new())),
            store,
            "Go",
        );
        let names: Vec<String> = tools
            .function_tools()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["analyze_code".to_string()]);
        assert_eq!(tools.kinds().len(), 3);
    }

    #[tokio::test]
    async fn test_read_file_uses_configured_workspace() {
        let store = ErrorStore::new();
        let (_dir, tools) = workspace_tools(&[ToolKind::FileRead], &store);

        let result = tools
            .call(ToolKind::FileRead, json!({ "path": "README.md" }))
            .await;
        assert!(result.is_success());
        assert!(result.data().to_string().contains("Sells things"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failed_call_is_recorded_once() {
        let store = ErrorStore::new();
        let (_dir, tools) = workspace_tools(&[ToolKind::FileRead], &store);

        let result = tools
            .call(ToolKind::FileRead, json!({ "path": "missing.txt" }))
            .await;
        assert!(!result.is_success());
        assert!(result.error_message().is_some());
        assert_eq!(store.len(), 1);
        let record = store.last_error().unwrap();
        assert_eq!(record.details()["operation"], json!("tool.read_file"));
    }

    #[tokio::test]
    async fn test_malformed_arguments_are_validation_errors() {
        let store = ErrorStore::new();
        let (_dir, tools) = workspace_tools(&[ToolKind::FileRead], &store);

        let result = tools.call(ToolKind::FileRead, json!({ "file": 3 })).await;
        assert!(!result.is_success());
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.last_error().unwrap().category(),
            ErrorCategory::Validation
        );
    }

    #[tokio::test]
    async fn test_unheld_capability_is_rejected() {
        let store = ErrorStore::new();
        let (_dir, tools) = workspace_tools(&[ToolKind::FileRead], &store);

        let result = tools
            .call(ToolKind::StaticAnalysis, json!({ "code": "x" }))
            .await;
        assert!(!result.is_success());
        assert!(result
            .error_message()
            .unwrap()
            .contains("does not hold the static_analysis capability"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_function_tool_runs_through_radkit() {
        let store = ErrorStore::new();
        let (_dir, tools) =
            workspace_tools(&[ToolKind::FileRead, ToolKind::StaticAnalysis], &store);
        let function_tools = tools.function_tools();
        let analyze = function_tools
            .iter()
            .find(|t| t.name() == "analyze_code")
            .unwrap();

        let state = DefaultExecutionState::new();
        let ctx = ToolContext::builder().with_state(&state).build().unwrap();
        let mut args = HashMap::new();
        args.insert("code".to_string(), json!("let password = \"hunter2\";"));
        args.insert("analysis_type".to_string(), json!("security"));

        let result = analyze.run_async(args, &ctx).await;
        assert!(result.is_success());
        let report = result.data().to_string();
        assert!(report.contains("Hardcoded password"));
        assert!(report.contains("Rust"));
        assert!(store.is_empty());
    }
}
