//! # GitHub Integration
//!
//! A small REST client over `reqwest` and the source-control capability
//! built on it. The tool answers with plain text; API failures surface as
//! [`GitHubError`] so the guard classifies them as source-control errors.

use super::{normalize_action, unknown_action, ToolCapability, ToolKind, ToolOutput};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const NOT_INITIALIZED: &str = "GitHub client not initialized. Please provide a valid GitHub token.";
const REPOSITORY_NOT_SET: &str = "Repository not set. Please provide owner and repo.";

/// Pages fetched at most when pull requests crowd out issues
const MAX_ISSUE_PAGES: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("GitHub API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("missing GitHub token, set GITHUB_ACCESS_TOKEN or GITHUB_TOKEN")]
    MissingToken,

    #[error("repository not set, provide an owner and a repository name")]
    MissingRepository,

    #[error("unexpected GitHub response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, GitHubError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            owner: None,
            repo: None,
            api_url: default_api_url(),
        }
    }
}

impl GitHubConfig {
    /// Replace fields with non-empty values from `GITHUB_ACCESS_TOKEN` (or
    /// `GITHUB_TOKEN`), `GITHUB_OWNER`, `GITHUB_REPO` and `GITHUB_API_URL`
    pub fn overlay(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(token) = lookup("GITHUB_ACCESS_TOKEN").or_else(|| lookup("GITHUB_TOKEN")) {
            self.token = Some(token);
        }
        if let Some(owner) = lookup("GITHUB_OWNER") {
            self.owner = Some(owner);
        }
        if let Some(repo) = lookup("GITHUB_REPO") {
            self.repo = Some(repo);
        }
        if let Some(api_url) = lookup("GITHUB_API_URL") {
            self.api_url = api_url;
        }
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    pub default_branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub html_url: String,
    pub created_at: String,
    /// Present when the "issue" is really a pull request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitUser {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub name: String,
    pub sha: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub html_url: String,
    pub created_at: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<GitUser>,
    pub head: GitRef,
    pub base: GitRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestFile {
    pub filename: String,
    pub status: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    /// Unified diff; absent for binary or very large files
    #[serde(default)]
    pub patch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

/// Decoded file from the contents API
#[derive(Debug, Clone, PartialEq)]
pub struct FileContent {
    pub text: String,
    pub sha: String,
}

fn decode_content(entry: ContentEntry) -> Result<FileContent> {
    if entry.encoding != "base64" {
        return Err(GitHubError::Decode(format!(
            "unsupported content encoding '{}'",
            entry.encoding
        )));
    }
    let compact: String = entry.content.split_whitespace().collect();
    let bytes = BASE64
        .decode(compact)
        .map_err(|e| GitHubError::Decode(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| GitHubError::Decode(e.to_string()))?;
    Ok(FileContent {
        text,
        sha: entry.sha,
    })
}

// ============================================================================
// Client
// ============================================================================

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    token: String,
    api_url: String,
    owner: Option<String>,
    repo: Option<String>,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(GitHubError::MissingToken)?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("devteam/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            token,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone().filter(|o| !o.is_empty()),
            repo: config.repo.clone().filter(|r| !r.is_empty()),
        })
    }

    /// `owner/repo`, if both are configured
    pub fn full_name(&self) -> Option<String> {
        match (&self.owner, &self.repo) {
            (Some(owner), Some(repo)) => Some(format!("{}/{}", owner, repo)),
            _ => None,
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let full_name = self.full_name().ok_or(GitHubError::MissingRepository)?;
        let url = format!("{}/repos/{}{}", self.api_url, full_name, path);
        tracing::debug!(method = %method, url = %url, "GitHub request");

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or(text);
            return Err(GitHubError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GitHubError::Decode(e.to_string()))
    }

    pub async fn get_repository(&self) -> Result<Repository> {
        self.request(Method::GET, "", None).await
    }

    pub async fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> Result<Issue> {
        let payload = json!({ "title": title, "body": body, "labels": labels });
        self.request(Method::POST, "/issues", Some(payload)).await
    }

    /// Up to `limit` issues in `state`. The issues endpoint also returns
    /// pull requests; those are dropped and further pages are fetched
    /// until `limit` issues are collected or the listing runs out.
    pub async fn list_issues(&self, state: &str, labels: &[String], limit: usize) -> Result<Vec<Issue>> {
        let per_page = limit.clamp(1, 100);
        let mut query = format!("state={}&per_page={}", urlencoding::encode(state), per_page);
        if !labels.is_empty() {
            let _ = write!(query, "&labels={}", urlencoding::encode(&labels.join(",")));
        }

        let mut issues = Vec::new();
        for page in 1..=MAX_ISSUE_PAGES {
            let path = format!("/issues?{}&page={}", query, page);
            let batch: Vec<Issue> = self.request(Method::GET, &path, None).await?;
            let exhausted = batch.len() < per_page;
            issues.extend(batch.into_iter().filter(|i| i.pull_request.is_none()));
            if issues.len() >= limit || exhausted {
                break;
            }
        }
        issues.truncate(limit);
        Ok(issues)
    }

    pub async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
        draft: bool,
    ) -> Result<PullRequest> {
        let payload = json!({
            "title": title,
            "body": body,
            "head": head,
            "base": base,
            "draft": draft,
        });
        self.request(Method::POST, "/pulls", Some(payload)).await
    }

    pub async fn get_pull_request(&self, number: u64) -> Result<PullRequest> {
        self.request(Method::GET, &format!("/pulls/{}", number), None)
            .await
    }

    pub async fn list_pull_requests(&self, state: &str, limit: usize) -> Result<Vec<PullRequest>> {
        let path = format!(
            "/pulls?state={}&per_page={}",
            urlencoding::encode(state),
            limit.clamp(1, 100)
        );
        let mut pulls: Vec<PullRequest> = self.request(Method::GET, &path, None).await?;
        pulls.truncate(limit);
        Ok(pulls)
    }

    pub async fn list_pull_request_files(&self, number: u64) -> Result<Vec<PullRequestFile>> {
        self.request(
            Method::GET,
            &format!("/pulls/{}/files?per_page=100", number),
            None,
        )
        .await
    }

    /// Submit a review; `event` is APPROVE, REQUEST_CHANGES or COMMENT
    pub async fn create_review(&self, number: u64, body: &str, event: &str) -> Result<()> {
        let payload = json!({ "body": body, "event": event });
        let _: serde_json::Value = self
            .request(
                Method::POST,
                &format!("/pulls/{}/reviews", number),
                Some(payload),
            )
            .await?;
        Ok(())
    }

    pub async fn get_file_content(&self, path: &str, git_ref: Option<&str>) -> Result<FileContent> {
        let mut url_path = format!("/contents/{}", path.trim_start_matches('/'));
        if let Some(git_ref) = git_ref {
            let _ = write!(url_path, "?ref={}", urlencoding::encode(git_ref));
        }
        let entry: ContentEntry = self.request(Method::GET, &url_path, None).await?;
        decode_content(entry)
    }

    /// Create a file, or replace it when `sha` names the current blob
    pub async fn put_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        branch: Option<&str>,
        sha: Option<&str>,
    ) -> Result<()> {
        let mut payload = json!({
            "message": message,
            "content": BASE64.encode(content.as_bytes()),
        });
        if let Some(branch) = branch {
            payload["branch"] = json!(branch);
        }
        if let Some(sha) = sha {
            payload["sha"] = json!(sha);
        }
        let _: serde_json::Value = self
            .request(
                Method::PUT,
                &format!("/contents/{}", path.trim_start_matches('/')),
                Some(payload),
            )
            .await?;
        Ok(())
    }
}

// ============================================================================
// Text Formatting
// ============================================================================

pub fn format_repository(repo: &Repository) -> String {
    format!(
        "Repository: {}\nDescription: {}\nURL: {}\nStars: {}\nForks: {}\nOpen Issues: {}\nDefault Branch: {}\n",
        repo.full_name,
        repo.description.as_deref().unwrap_or("None"),
        repo.html_url,
        repo.stargazers_count,
        repo.forks_count,
        repo.open_issues_count,
        repo.default_branch
    )
}

pub fn format_issues(state: &str, labels: &[String], issues: &[Issue]) -> String {
    let mut out = format!("Found {} {} issues", issues.len(), state);
    if !labels.is_empty() {
        let _ = write!(out, " with labels: {}", labels.join(", "));
    }
    out.push_str("\n\n");
    for issue in issues {
        let _ = write!(
            out,
            "#{}: {}\nState: {}, Created: {}\nURL: {}\n\n",
            issue.number, issue.title, issue.state, issue.created_at, issue.html_url
        );
    }
    out
}

pub fn format_pull_requests(state: &str, pulls: &[PullRequest]) -> String {
    let mut out = format!("Found {} {} pull requests\n\n", pulls.len(), state);
    for pr in pulls {
        let _ = write!(
            out,
            "#{}: {}\nState: {}, Created: {}\nURL: {}\n\n",
            pr.number, pr.title, pr.state, pr.created_at, pr.html_url
        );
    }
    out
}

// ============================================================================
// Tool Capability
// ============================================================================

fn required_str<'a>(params: &'a serde_json::Value, key: &str) -> anyhow::Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("invalid parameters: missing '{}'", key))
}

fn optional_str<'a>(params: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

fn required_number(params: &serde_json::Value, key: &str) -> anyhow::Result<u64> {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| anyhow::anyhow!("invalid parameters: missing numeric '{}'", key))
}

fn string_list(params: &serde_json::Value, key: &str) -> Vec<String> {
    params
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

const ACTIONS: &[&str] = &[
    "get_repo_info",
    "create_issue",
    "get_issues",
    "create_pull_request",
    "review_pull_request",
    "get_pull_requests",
    "get_pull_request",
    "get_pull_request_files",
    "get_file_content",
    "create_or_update_file",
];

/// Source-control capability. Without a token every action answers with
/// the "not initialized" message.
#[derive(Debug, Clone)]
pub struct GitHubTool {
    client: Option<GitHubClient>,
}

impl GitHubTool {
    pub fn new(config: GitHubConfig) -> Self {
        let client = match GitHubClient::new(&config) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!("GitHub tool unavailable: {}", e);
                None
            }
        };
        Self { client }
    }

    pub fn is_initialized(&self) -> bool {
        self.client.is_some()
    }

    async fn dispatch(
        &self,
        client: &GitHubClient,
        action: &str,
        params: &serde_json::Value,
    ) -> anyhow::Result<String> {
        let text = match action {
            "get_repo_info" => format_repository(&client.get_repository().await?),
            "create_issue" => {
                let issue = client
                    .create_issue(
                        required_str(params, "title")?,
                        optional_str(params, "body").unwrap_or(""),
                        &string_list(params, "labels"),
                    )
                    .await?;
                format!("Successfully created issue #{}: {}", issue.number, issue.html_url)
            }
            "get_issues" => {
                let state = optional_str(params, "state").unwrap_or("open");
                let labels = string_list(params, "labels");
                let limit = params.get("limit").and_then(|v| v.as_u64()).unwrap_or(10) as usize;
                let issues = client.list_issues(state, &labels, limit).await?;
                format_issues(state, &labels, &issues)
            }
            "create_pull_request" => {
                let pr = client
                    .create_pull_request(
                        required_str(params, "title")?,
                        optional_str(params, "body").unwrap_or(""),
                        required_str(params, "head")?,
                        optional_str(params, "base").unwrap_or("main"),
                        params.get("draft").and_then(|v| v.as_bool()).unwrap_or(false),
                    )
                    .await?;
                format!("Successfully created pull request #{}: {}", pr.number, pr.html_url)
            }
            "review_pull_request" => {
                let number = required_number(params, "pr_number")?;
                client
                    .create_review(
                        number,
                        required_str(params, "body")?,
                        optional_str(params, "event").unwrap_or("COMMENT"),
                    )
                    .await?;
                format!("Successfully submitted review for pull request #{}", number)
            }
            "get_pull_requests" => {
                let state = optional_str(params, "state").unwrap_or("open");
                let limit = params.get("limit").and_then(|v| v.as_u64()).unwrap_or(10) as usize;
                format_pull_requests(state, &client.list_pull_requests(state, limit).await?)
            }
            "get_pull_request" => {
                let pr = client
                    .get_pull_request(required_number(params, "pr_number")?)
                    .await?;
                format!(
                    "#{}: {}\nState: {}\nAuthor: {}\nHead: {} -> Base: {}\nURL: {}\n\n{}",
                    pr.number,
                    pr.title,
                    pr.state,
                    pr.user.as_ref().map_or("unknown", |u| u.login.as_str()),
                    pr.head.name,
                    pr.base.name,
                    pr.html_url,
                    pr.body.as_deref().unwrap_or("")
                )
            }
            "get_pull_request_files" => {
                let files = client
                    .list_pull_request_files(required_number(params, "pr_number")?)
                    .await?;
                let mut out = format!("Found {} changed files\n\n", files.len());
                for file in &files {
                    let _ = writeln!(
                        out,
                        "{} ({}, +{} -{})",
                        file.filename, file.status, file.additions, file.deletions
                    );
                }
                out
            }
            "get_file_content" => {
                client
                    .get_file_content(required_str(params, "path")?, optional_str(params, "ref"))
                    .await?
                    .text
            }
            "create_or_update_file" => {
                let path = required_str(params, "path")?;
                let content = required_str(params, "content")?;
                let message = required_str(params, "message")?;
                let branch = optional_str(params, "branch");
                let update = params.get("update").and_then(|v| v.as_bool()).unwrap_or(false);
                if update {
                    let existing = client.get_file_content(path, branch).await?;
                    client
                        .put_file(path, content, message, branch, Some(&existing.sha))
                        .await?;
                    format!("Successfully updated file {}", path)
                } else {
                    client.put_file(path, content, message, branch, None).await?;
                    format!("Successfully created file {}", path)
                }
            }
            _ => return Ok(format!("Unknown action: {}", action)),
        };
        Ok(text)
    }
}

#[async_trait]
impl ToolCapability for GitHubTool {
    fn kind(&self) -> ToolKind {
        ToolKind::SourceControl
    }

    fn name(&self) -> &str {
        "github"
    }

    fn description(&self) -> &str {
        "Interact with GitHub: repository info, issues, pull requests, reviews and files."
    }

    async fn run(&self, action: &str, params: &serde_json::Value) -> anyhow::Result<ToolOutput> {
        let normalized = normalize_action(action);
        if !ACTIONS.contains(&normalized.as_str()) {
            return Ok(unknown_action(action));
        }
        let Some(client) = &self.client else {
            return Ok(ToolOutput::Text(NOT_INITIALIZED.to_string()));
        };
        if client.full_name().is_none() {
            return Ok(ToolOutput::Text(REPOSITORY_NOT_SET.to_string()));
        }

        tracing::info!(action = %normalized, repo = ?client.full_name(), "GitHub action");
        let text = self.dispatch(client, &normalized, params).await?;
        Ok(ToolOutput::Text(text))
    }
}
