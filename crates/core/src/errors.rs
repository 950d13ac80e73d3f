//! # Error Taxonomy
//!
//! Structured error records shared by every component of the crew.
//!
//! An [`AppError`] can only be created through [`ErrorStore::create_error`],
//! so every record is appended to the store and logged at its severity the
//! moment it exists. The store is an explicitly owned handle: clone it into
//! each agent / crew that should report into the same log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Structured key/value details attached to an error
pub type ErrorDetails = BTreeMap<String, serde_json::Value>;

/// Severity of a recorded error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Api,
    Network,
    Authentication,
    Validation,
    SourceControl,
    LanguageModel,
    Interface,
    General,
    Orchestration,
}

impl ErrorCategory {
    pub fn all() -> [ErrorCategory; 10] {
        [
            ErrorCategory::Configuration,
            ErrorCategory::Api,
            ErrorCategory::Network,
            ErrorCategory::Authentication,
            ErrorCategory::Validation,
            ErrorCategory::SourceControl,
            ErrorCategory::LanguageModel,
            ErrorCategory::Interface,
            ErrorCategory::General,
            ErrorCategory::Orchestration,
        ]
    }

    /// Human-readable label used in log lines and `Display`
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "Configuration Error",
            ErrorCategory::Api => "API Error",
            ErrorCategory::Network => "Network Error",
            ErrorCategory::Authentication => "Authentication Error",
            ErrorCategory::Validation => "Validation Error",
            ErrorCategory::SourceControl => "Source Control Error",
            ErrorCategory::LanguageModel => "Language Model Error",
            ErrorCategory::Interface => "Interface Error",
            ErrorCategory::General => "General Error",
            ErrorCategory::Orchestration => "Orchestration Error",
        }
    }

    /// Default remediation suggestions for this category
    pub fn default_suggestions(&self) -> Vec<String> {
        let items: &[&str] = match self {
            ErrorCategory::Configuration => &[
                "Check that all configuration files exist and are well formed",
                "Make sure the required environment variables are set",
                "Review the documentation for the expected configuration keys",
            ],
            ErrorCategory::Api => &[
                "Check your internet connection",
                "Make sure your API key is valid and has not expired",
                "Check the quotas and limits of your API account",
            ],
            ErrorCategory::Network => &[
                "Check your internet connection",
                "Check whether the remote service is available",
                "Retry the operation later",
            ],
            ErrorCategory::Authentication => &[
                "Check that your credentials are correct",
                "Make sure your token has not expired",
                "Check the permissions granted to your account",
            ],
            ErrorCategory::Validation => &[
                "Check the format of the input data",
                "Make sure every required value is provided",
                "Review the documentation for the expected formats",
            ],
            ErrorCategory::SourceControl => &[
                "Check your GitHub access token",
                "Make sure you have the required permissions on the repository",
                "Check whether GitHub is reachable and operational",
            ],
            ErrorCategory::LanguageModel => &[
                "Check the API key of your language model provider",
                "Make sure the requested model is available",
                "Check your usage quotas on the provider platform",
            ],
            ErrorCategory::Interface => &[
                "Refresh the dashboard",
                "Clear your browser cache",
                "Restart the application",
            ],
            ErrorCategory::Orchestration => &[
                "Check the agent and task configuration",
                "Make sure every stage agent could be constructed",
                "Inspect the last pipeline run to see which stage failed",
            ],
            ErrorCategory::General => &[
                "Check the logs for more details",
                "Review the documentation for troubleshooting steps",
                "Restart the application and try again",
            ],
        };
        items.iter().map(|s| s.to_string()).collect()
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Generic suggestions used when an empty suggestion list is supplied
/// and the category table yields nothing.
fn fallback_suggestions() -> Vec<String> {
    vec!["Check the documentation for more information".to_string()]
}

/// A recorded, immutable application error
#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    message: String,
    category: ErrorCategory,
    severity: Severity,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    details: ErrorDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<String>,
    suggestions: Vec<String>,
}

impl AppError {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    /// Captured cause chain of the failure, if one was supplied
    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_string())
    }

    fn log(&self) {
        let line = format!("{}: {}", self.category.label(), self.message);
        let trace = self.trace.as_deref().unwrap_or("");
        match self.severity {
            Severity::Critical => tracing::error!(critical = true, trace = %trace, "{}", line),
            Severity::Error => tracing::error!(trace = %trace, "{}", line),
            Severity::Warning => tracing::warn!("{}", line),
            Severity::Info => tracing::info!("{}", line),
            Severity::Debug => tracing::debug!("{}", line),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.category.label(),
            self.severity,
            self.message
        )
    }
}

/// Count of recorded errors per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ErrorSummary {
    pub critical: usize,
    pub error: usize,
    pub warning: usize,
    pub info: usize,
    pub debug: usize,
}

impl ErrorSummary {
    /// (critical, error, warning, info, debug)
    pub fn as_tuple(&self) -> (usize, usize, usize, usize, usize) {
        (
            self.critical,
            self.error,
            self.warning,
            self.info,
            self.debug,
        )
    }

    pub fn total(&self) -> usize {
        self.critical + self.error + self.warning + self.info + self.debug
    }
}

/// Append-only log of [`AppError`]s.
///
/// Cloning yields another handle onto the same log. Access is serialized
/// by a mutex so concurrent runs sharing one store never lose records.
#[derive(Debug, Clone, Default)]
pub struct ErrorStore {
    errors: Arc<Mutex<Vec<AppError>>>,
}

impl ErrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<AppError>> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an error, append it to the store and log it.
    ///
    /// `suggestions` of `None` (or an empty list) falls back to the
    /// category's default suggestions.
    pub fn create_error(
        &self,
        message: impl Into<String>,
        category: ErrorCategory,
        severity: Severity,
        details: Option<ErrorDetails>,
        cause: Option<&anyhow::Error>,
        suggestions: Option<Vec<String>>,
    ) -> AppError {
        let suggestions = match suggestions {
            Some(list) if !list.is_empty() => list,
            _ => {
                let defaults = category.default_suggestions();
                if defaults.is_empty() {
                    fallback_suggestions()
                } else {
                    defaults
                }
            }
        };

        let error = AppError {
            message: message.into(),
            category,
            severity,
            timestamp: Utc::now(),
            details: details.unwrap_or_default(),
            trace: cause.map(|e| format!("{:?}", e)),
            suggestions,
        };

        error.log();
        self.entries().push(error.clone());
        error
    }

    /// Shorthand for a Warning-level record without cause
    pub fn warning(&self, message: impl Into<String>, category: ErrorCategory) -> AppError {
        self.create_error(message, category, Severity::Warning, None, None, None)
    }

    /// Snapshot of every recorded error, oldest first
    pub fn errors(&self) -> Vec<AppError> {
        self.entries().clone()
    }

    pub fn last_error(&self) -> Option<AppError> {
        self.entries().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn summary(&self) -> ErrorSummary {
        let entries = self.entries();
        let mut summary = ErrorSummary::default();
        for error in entries.iter() {
            match error.severity {
                Severity::Critical => summary.critical += 1,
                Severity::Error => summary.error += 1,
                Severity::Warning => summary.warning += 1,
                Severity::Info => summary.info += 1,
                Severity::Debug => summary.debug += 1,
            }
        }
        summary
    }

    pub fn has_critical_errors(&self) -> bool {
        self.entries()
            .iter()
            .any(|e| e.severity == Severity::Critical)
    }

    /// Remove every recorded error. Single errors are never removed.
    pub fn clear(&self) {
        self.entries().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_error_records_and_returns() {
        let store = ErrorStore::new();
        let error = store.create_error(
            "model unavailable",
            ErrorCategory::LanguageModel,
            Severity::Error,
            None,
            None,
            None,
        );

        assert_eq!(store.len(), 1);
        assert_eq!(store.last_error().unwrap().message(), "model unavailable");
        assert_eq!(error.category(), ErrorCategory::LanguageModel);
        assert_eq!(
            error.to_string(),
            "Language Model Error (ERROR): model unavailable"
        );
    }

    #[test]
    fn test_default_suggestions_by_category() {
        let store = ErrorStore::new();
        for category in ErrorCategory::all() {
            let error = store.create_error("x", category, Severity::Info, None, None, None);
            assert!(!error.suggestions().is_empty());
            assert_eq!(error.suggestions(), category.default_suggestions().as_slice());
        }
    }

    #[test]
    fn test_explicit_and_empty_suggestions() {
        let store = ErrorStore::new();
        let custom = store.create_error(
            "x",
            ErrorCategory::General,
            Severity::Warning,
            None,
            None,
            Some(vec!["Do the thing".to_string()]),
        );
        assert_eq!(custom.suggestions(), ["Do the thing".to_string()]);

        let empty = store.create_error(
            "x",
            ErrorCategory::Network,
            Severity::Warning,
            None,
            None,
            Some(vec![]),
        );
        assert_eq!(
            empty.suggestions(),
            ErrorCategory::Network.default_suggestions().as_slice()
        );
    }

    #[test]
    fn test_cause_is_captured_as_trace() {
        let store = ErrorStore::new();
        let cause = anyhow::anyhow!("socket closed").context("fetching issues");
        let error = store.create_error(
            "request failed",
            ErrorCategory::Network,
            Severity::Error,
            None,
            Some(&cause),
            None,
        );
        let trace = error.trace().unwrap();
        assert!(trace.contains("fetching issues"));
        assert!(trace.contains("socket closed"));
    }

    #[test]
    fn test_summary_counts_and_idempotence() {
        let store = ErrorStore::new();
        store.create_error("a", ErrorCategory::General, Severity::Critical, None, None, None);
        store.create_error("b", ErrorCategory::General, Severity::Error, None, None, None);
        store.create_error("c", ErrorCategory::General, Severity::Error, None, None, None);
        store.warning("d", ErrorCategory::Configuration);
        store.create_error("e", ErrorCategory::General, Severity::Debug, None, None, None);

        let first = store.summary();
        let second = store.summary();
        assert_eq!(first, second);
        assert_eq!(first.as_tuple(), (1, 2, 1, 0, 1));
        assert_eq!(first.total(), 5);
        assert!(store.has_critical_errors());
    }

    #[test]
    fn test_clear_resets_everything() {
        let store = ErrorStore::new();
        store.create_error("a", ErrorCategory::General, Severity::Critical, None, None, None);
        store.warning("b", ErrorCategory::Validation);

        store.clear();

        assert_eq!(store.summary().as_tuple(), (0, 0, 0, 0, 0));
        assert!(!store.has_critical_errors());
        assert!(store.last_error().is_none());
    }

    #[test]
    fn test_cloned_handles_share_the_log() {
        let store = ErrorStore::new();
        let other = store.clone();
        other.warning("shared", ErrorCategory::General);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let store = ErrorStore::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        store.create_error(
                            format!("{}-{}", i, j),
                            ErrorCategory::General,
                            Severity::Info,
                            None,
                            None,
                            None,
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.summary().info, 200);
    }

    #[test]
    fn test_serializes_details() {
        let store = ErrorStore::new();
        let mut details = ErrorDetails::new();
        details.insert("stage".to_string(), serde_json::json!("architecture"));
        let error = store.create_error(
            "x",
            ErrorCategory::Orchestration,
            Severity::Error,
            Some(details),
            None,
            None,
        );
        let json: serde_json::Value = serde_json::from_str(&error.to_json()).unwrap();
        assert_eq!(json["category"], "orchestration");
        assert_eq!(json["severity"], "ERROR");
        assert_eq!(json["details"]["stage"], "architecture");
    }
}
