//! Standalone static analysis of a source file.

use anyhow::Context;
use devteam_core::tools::{CodeAnalysisTool, ToolCapability};
use serde_json::json;
use std::path::Path;

pub const FORMATS: [&str; 2] = ["text", "json"];
pub const ANALYSIS_TYPES: [&str; 4] = ["all", "quality", "security", "performance"];

/// Analyze `code_file` and return the report as Markdown or pretty JSON
pub async fn analyze_file(
    code_file: &Path,
    language: &str,
    format: &str,
    analysis_type: &str,
) -> anyhow::Result<String> {
    if !FORMATS.contains(&format) {
        anyhow::bail!("invalid format '{}': expected text or json", format);
    }
    let code = tokio::fs::read_to_string(code_file)
        .await
        .with_context(|| format!("reading code file {}", code_file.display()))?;

    let output = CodeAnalysisTool::new()
        .run(
            analysis_type,
            &json!({ "code": code, "language": language, "format": format }),
        )
        .await?;

    tracing::info!(file = %code_file.display(), language, analysis_type, "Code analysis finished");
    Ok(output.to_string())
}
