//! # Pull Request Workflow
//!
//! Reviews every changed file of a pull request with the reviewer agent
//! and posts the result as one `COMMENT` review.

use devteam_core::agents::{Agent, AgentKind, CodeReview, ReviewerAgent};
use devteam_core::config::Settings;
use devteam_core::errors::ErrorStore;
use devteam_core::llm::{ModelProvider, RadkitProvider};
use devteam_core::tools::github::{GitHubClient, GitHubConfig, PullRequest, PullRequestFile};
use devteam_core::tools::{GitHubError, ToolBox};
use std::fmt::Write as _;
use std::sync::Arc;

pub const REVIEW_SIGNATURE: &str = "Automated code review by the DevTeam assistant";

#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    pub pr: u64,
    pub repo: Option<String>,
    pub owner: Option<String>,
    pub language: Option<String>,
}

/// Resolve owner and repository: explicit options first, then settings,
/// then `GITHUB_REPOSITORY` (`owner/repo`) as set by CI runners.
pub fn resolve_repository(
    base: &GitHubConfig,
    options: &WorkflowOptions,
    lookup: impl Fn(&str) -> Option<String>,
) -> GitHubConfig {
    let mut config = base.clone();
    let from_ci = lookup("GITHUB_REPOSITORY").and_then(|full| {
        let (owner, repo) = full.split_once('/')?;
        Some((owner.to_string(), repo.to_string()))
    });

    config.owner = options
        .owner
        .clone()
        .or(config.owner)
        .or_else(|| from_ci.as_ref().map(|(o, _)| o.clone()));
    config.repo = options
        .repo
        .clone()
        .or(config.repo)
        .or_else(|| from_ci.as_ref().map(|(_, r)| r.clone()));
    config
}

pub async fn run_review_workflow(
    settings: &Settings,
    store: &ErrorStore,
    options: &WorkflowOptions,
) -> anyhow::Result<()> {
    review_pull_request(settings, store, options, Arc::new(RadkitProvider::new())).await
}

/// Review the pull request with a reviewer bound through `provider`.
/// Fails only when every reviewable file failed; otherwise the failed
/// files are listed in the posted review.
pub async fn review_pull_request(
    settings: &Settings,
    store: &ErrorStore,
    options: &WorkflowOptions,
    provider: Arc<dyn ModelProvider>,
) -> anyhow::Result<()> {
    let github = resolve_repository(&settings.github, options, |key| std::env::var(key).ok());
    let client = GitHubClient::new(&github)?;
    let repository = client.full_name().ok_or(GitHubError::MissingRepository)?;

    tracing::info!(repository = %repository, pr = options.pr, "Starting pull request review");
    let pr = client.get_pull_request(options.pr).await?;
    let files = client.list_pull_request_files(options.pr).await?;

    let language = options.language.as_deref().unwrap_or(&settings.language);
    let reviewer = ReviewerAgent::try_from(
        Agent::builder(AgentKind::Reviewer, language)
            .with_store(store.clone())
            .with_provider(provider)
            .with_model(settings.model_config())
            .with_toolbox(ToolBox::standard(settings))
            .with_cache_dir(settings.cache_dir.clone())
            .build()?,
    )?;

    let specifications = pull_request_specifications(&pr);
    let mut sections = Vec::with_capacity(files.len());
    let mut reviewed = 0usize;
    let mut failed = 0usize;

    for file in &files {
        let Some(patch) = file.patch.as_deref() else {
            sections.push(format!("### `{}`\n\nNo textual diff to review.\n", file.filename));
            continue;
        };
        match reviewer.review_code(patch, &specifications).await {
            Ok(review) => {
                reviewed += 1;
                sections.push(format_file_review(file, &review));
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(file = %file.filename, "File review failed: {}", e);
                sections.push(format!(
                    "### `{}`\n\nReview failed: {}\n",
                    file.filename,
                    e.record().message()
                ));
            }
        }
    }

    if reviewed == 0 && failed > 0 {
        anyhow::bail!(
            "pull request #{} review failed for all {} reviewable files",
            pr.number,
            failed
        );
    }

    let body = compose_review_body(&pr, &sections);
    client.create_review(pr.number, &body, "COMMENT").await?;
    tracing::info!(pr = pr.number, reviewed, failed, "Posted pull request review");
    Ok(())
}

fn pull_request_specifications(pr: &PullRequest) -> String {
    match pr.body.as_deref().filter(|b| !b.trim().is_empty()) {
        Some(body) => format!("Pull request: {}\n\n{}", pr.title, body),
        None => format!("Pull request: {}", pr.title),
    }
}

pub fn format_file_review(file: &PullRequestFile, review: &CodeReview) -> String {
    let mut out = format!(
        "### `{}` (+{} -{})\n\n{}\n",
        file.filename, file.additions, file.deletions, review.overall_assessment
    );
    if !review.issues.is_empty() {
        out.push_str("\n**Issues**\n\n");
        for issue in &review.issues {
            let _ = write!(out, "- **{}**: {}", issue.severity, issue.description);
            if let Some(location) = &issue.location {
                let _ = write!(out, " ({})", location);
            }
            out.push('\n');
        }
    }
    if !review.suggestions.is_empty() {
        out.push_str("\n**Suggestions**\n\n");
        for suggestion in &review.suggestions {
            let _ = writeln!(out, "- {}", suggestion.description);
            if let Some(code) = &suggestion.code {
                let _ = writeln!(out, "\n```\n{}\n```", code.trim_end());
            }
        }
    }
    out
}

pub fn compose_review_body(pr: &PullRequest, sections: &[String]) -> String {
    let mut body = format!("{} for #{}: {}\n\n", REVIEW_SIGNATURE, pr.number, pr.title);
    if sections.is_empty() {
        body.push_str("No changed files to review.\n");
    } else {
        body.push_str(&sections.join("\n"));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve, CannedModel};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use devteam_core::agents::{ReviewIssue, ReviewSuggestion};
    use devteam_core::llm::ModelError;
    use devteam_core::tools::github::GitRef;
    use serde_json::json;
    use std::sync::Mutex;

    const REVIEW_ANSWER: &str = r#"{"issues": [{"severity": "high", "description": "Hardcoded password", "location": "line 2"}], "suggestions": [], "overall_assessment": "Needs changes"}"#;

    /// GitHub stub for pull request #7 of acme/shop; posted reviews land in the returned slot
    async fn stub_github() -> (String, Arc<Mutex<Option<serde_json::Value>>>) {
        let posted = Arc::new(Mutex::new(None));
        let sink = posted.clone();
        let app = Router::new()
            .route(
                "/repos/acme/shop/pulls/7",
                get(|| async {
                    Json(json!({
                        "number": 7,
                        "title": "Add login",
                        "state": "open",
                        "html_url": "https://github.com/acme/shop/pull/7",
                        "created_at": "2024-01-01T00:00:00Z",
                        "body": "Adds a login form",
                        "head": {"ref": "feature", "sha": "abc"},
                        "base": {"ref": "main", "sha": "def"}
                    }))
                }),
            )
            .route(
                "/repos/acme/shop/pulls/7/files",
                get(|| async {
                    Json(json!([
                        {
                            "filename": "src/Login.java",
                            "status": "added",
                            "additions": 3,
                            "deletions": 0,
                            "patch": "+class Login {\n+  String password = \"x\";\n+}"
                        },
                        {
                            "filename": "src/Cart.java",
                            "status": "modified",
                            "additions": 1,
                            "deletions": 1,
                            "patch": "-int total;\n+long total;"
                        },
                        {
                            "filename": "logo.png",
                            "status": "added",
                            "additions": 0,
                            "deletions": 0
                        }
                    ]))
                }),
            )
            .route(
                "/repos/acme/shop/pulls/7/reviews",
                post(move |Json(body): Json<serde_json::Value>| {
                    let sink = sink.clone();
                    async move {
                        *sink.lock().unwrap() = Some(body);
                        Json(json!({ "id": 1 }))
                    }
                }),
            );
        (serve(app).await, posted)
    }

    fn workflow_settings(api_url: String, dir: &std::path::Path) -> Settings {
        Settings {
            github: GitHubConfig {
                token: Some("ghp_test".to_string()),
                api_url,
                ..GitHubConfig::default()
            },
            cache_dir: dir.to_path_buf(),
            workspace_root: dir.to_path_buf(),
            ..Settings::default()
        }
    }

    fn pr_options() -> WorkflowOptions {
        WorkflowOptions {
            pr: 7,
            owner: Some("acme".to_string()),
            repo: Some("shop".to_string()),
            language: None,
        }
    }

    fn pr() -> PullRequest {
        let git_ref = |name: &str| GitRef {
            name: name.to_string(),
            sha: "abc".to_string(),
        };
        PullRequest {
            number: 7,
            title: "Add login".to_string(),
            state: "open".to_string(),
            html_url: "https://github.com/acme/shop/pull/7".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            body: Some("Adds a login form".to_string()),
            user: None,
            head: git_ref("feature"),
            base: git_ref("main"),
        }
    }

    #[test]
    fn test_resolve_repository_precedence() {
        let lookup = |key: &str| (key == "GITHUB_REPOSITORY").then(|| "ci-owner/ci-repo".to_string());

        let base = GitHubConfig {
            owner: Some("settings-owner".to_string()),
            ..GitHubConfig::default()
        };
        let options = WorkflowOptions {
            pr: 1,
            repo: Some("cli-repo".to_string()),
            ..WorkflowOptions::default()
        };
        let resolved = resolve_repository(&base, &options, lookup);
        assert_eq!(resolved.owner.as_deref(), Some("settings-owner"));
        assert_eq!(resolved.repo.as_deref(), Some("cli-repo"));

        let resolved = resolve_repository(&GitHubConfig::default(), &WorkflowOptions::default(), lookup);
        assert_eq!(resolved.owner.as_deref(), Some("ci-owner"));
        assert_eq!(resolved.repo.as_deref(), Some("ci-repo"));
    }

    #[test]
    fn test_format_file_review() {
        let file = PullRequestFile {
            filename: "src/Login.java".to_string(),
            status: "modified".to_string(),
            additions: 10,
            deletions: 2,
            patch: Some("+ String password = \"x\";".to_string()),
        };
        let review = CodeReview {
            issues: vec![ReviewIssue {
                severity: "high".to_string(),
                description: "Hardcoded password".to_string(),
                location: Some("line 1".to_string()),
            }],
            suggestions: vec![ReviewSuggestion {
                description: "Read it from the environment".to_string(),
                code: Some("System.getenv(\"PASSWORD\")".to_string()),
            }],
            overall_assessment: "Needs changes".to_string(),
        };

        let text = format_file_review(&file, &review);
        assert!(text.starts_with("### `src/Login.java` (+10 -2)"));
        assert!(text.contains("- **high**: Hardcoded password (line 1)"));
        assert!(text.contains("System.getenv"));
    }

    #[test]
    fn test_compose_review_body() {
        let body = compose_review_body(&pr(), &[]);
        assert!(body.starts_with(REVIEW_SIGNATURE));
        assert!(body.contains("#7: Add login"));
        assert!(body.contains("No changed files"));

        let specs = pull_request_specifications(&pr());
        assert_eq!(specs, "Pull request: Add login\n\nAdds a login form");
    }

    #[tokio::test]
    async fn test_missing_token_is_source_control_error() {
        let store = ErrorStore::new();
        let mut settings = Settings::default();
        settings.github = GitHubConfig::default();
        let options = WorkflowOptions {
            pr: 1,
            owner: Some("acme".to_string()),
            repo: Some("shop".to_string()),
            language: None,
        };
        let err = devteam_core::guard::guarded(
            &store,
            "cli.workflow",
            run_review_workflow(&settings, &store, &options),
        )
        .await
        .unwrap_err();
        assert_eq!(err.category(), devteam_core::ErrorCategory::SourceControl);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_review_posts_partial_results() {
        let (api_url, posted) = stub_github().await;
        let dir = tempfile::tempdir().unwrap();
        let settings = workflow_settings(api_url, dir.path());
        let store = ErrorStore::new();
        let model = CannedModel::new(|request| {
            if request.prompt.contains("long total") {
                Err(ModelError::Timeout)
            } else {
                Ok(REVIEW_ANSWER.to_string())
            }
        });

        review_pull_request(&settings, &store, &pr_options(), model.provider())
            .await
            .unwrap();

        let review = posted.lock().unwrap().clone().unwrap();
        assert_eq!(review["event"], json!("COMMENT"));
        let body = review["body"].as_str().unwrap();
        assert!(body.starts_with(REVIEW_SIGNATURE));
        assert!(body.contains("### `src/Login.java` (+3 -0)"));
        assert!(body.contains("- **high**: Hardcoded password (line 2)"));
        assert!(body.contains("### `src/Cart.java`\n\nReview failed:"));
        assert!(body.contains("### `logo.png`\n\nNo textual diff to review."));
        assert_eq!(model.calls(), 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_review_fails_when_every_file_fails() {
        let (api_url, posted) = stub_github().await;
        let dir = tempfile::tempdir().unwrap();
        let settings = workflow_settings(api_url, dir.path());
        let store = ErrorStore::new();
        let model = CannedModel::new(|_| Err(ModelError::Timeout));

        let err = review_pull_request(&settings, &store, &pr_options(), model.provider())
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("pull request #7 review failed for all 2 reviewable files"));
        assert!(posted.lock().unwrap().is_none());
        assert_eq!(store.len(), 2);
    }
}
