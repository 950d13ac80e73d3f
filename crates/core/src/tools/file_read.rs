//! File reading below a root directory. Paths that leave the root are refused.

use super::{normalize_action, unknown_action, ToolCapability, ToolKind, ToolOutput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileReadTool {
    root: PathBuf,
}

impl FileReadTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        let escapes = path.is_absolute()
            || path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if escapes {
            anyhow::bail!("permission denied: '{}' is outside the workspace", relative);
        }
        Ok(self.root.join(path))
    }

    pub async fn read(&self, relative: &str) -> Result<serde_json::Value> {
        let full_path = self.resolve(relative)?;
        let content = tokio::fs::read_to_string(&full_path)
            .await
            .with_context(|| format!("Failed to read '{}'", relative))?;
        Ok(json!({
            "path": relative,
            "lines": content.lines().count(),
            "content": content,
        }))
    }
}

#[async_trait]
impl ToolCapability for FileReadTool {
    fn kind(&self) -> ToolKind {
        ToolKind::FileRead
    }

    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read a file's contents from the workspace. Returns the content and line count."
    }

    async fn run(&self, action: &str, params: &serde_json::Value) -> Result<ToolOutput> {
        if normalize_action(action) != "read" {
            return Ok(unknown_action(action));
        }
        let Some(path) = params.get("path").and_then(|p| p.as_str()) else {
            anyhow::bail!("invalid file request: missing 'path'");
        };
        Ok(ToolOutput::Structured(self.read(path).await?))
    }
}
