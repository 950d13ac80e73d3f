//! # Error Guard
//!
//! A single interceptor applied to every public operation of agents,
//! the crew and tool capabilities. A failing operation is classified into
//! an [`ErrorCategory`], recorded exactly once in the shared
//! [`ErrorStore`] at `Error` severity, and surfaced to the caller as a
//! [`ClassifiedError`] whose message is prefixed with `"Error: "`.
//!
//! A [`ClassifiedError`] travelling through an outer guard is passed
//! through untouched, so nested guarded calls never double-record.

use crate::crew::CrewError;
use crate::errors::{AppError, ErrorCategory, ErrorDetails, ErrorStore, Severity};
use crate::llm::ModelError;
use crate::tools::github::GitHubError;
use std::future::Future;

/// Failure surfaced by a guarded operation
#[derive(Debug, thiserror::Error)]
#[error("Error: {record}")]
pub struct ClassifiedError {
    record: AppError,
    #[source]
    source: anyhow::Error,
}

impl ClassifiedError {
    /// The store entry created for this failure
    pub fn record(&self) -> &AppError {
        &self.record
    }

    pub fn category(&self) -> ErrorCategory {
        self.record.category()
    }

    /// The underlying failure
    pub fn cause(&self) -> &anyhow::Error {
        &self.source
    }

    pub fn into_record(self) -> AppError {
        self.record
    }
}

/// Map a failure to an error category.
///
/// Typed failures are checked first (language model, then source control,
/// then orchestration), followed by the lowercased message text: network
/// markers, then authentication, configuration and validation markers.
pub fn classify(err: &anyhow::Error) -> ErrorCategory {
    if err.chain().any(|c| c.downcast_ref::<ModelError>().is_some()) {
        return ErrorCategory::LanguageModel;
    }
    if err.chain().any(|c| c.downcast_ref::<GitHubError>().is_some()) {
        return ErrorCategory::SourceControl;
    }
    if err.chain().any(|c| c.downcast_ref::<CrewError>().is_some()) {
        return ErrorCategory::Orchestration;
    }

    let text = format!("{:#}", err).to_lowercase();
    let mentions = |markers: &[&str]| markers.iter().any(|m| text.contains(m));

    if mentions(&["connection", "timeout", "timed out"]) {
        ErrorCategory::Network
    } else if mentions(&["permission", "unauthorized"]) {
        ErrorCategory::Authentication
    } else if mentions(&["config"]) {
        ErrorCategory::Configuration
    } else if mentions(&["validation", "invalid"]) {
        ErrorCategory::Validation
    } else {
        ErrorCategory::General
    }
}

fn classify_and_record(store: &ErrorStore, operation: &str, err: anyhow::Error) -> ClassifiedError {
    match err.downcast::<ClassifiedError>() {
        Ok(already) => already,
        Err(err) => {
            let category = classify(&err);
            let mut details = ErrorDetails::new();
            details.insert("operation".to_string(), serde_json::json!(operation));
            let record = store.create_error(
                format!("{:#}", err),
                category,
                Severity::Error,
                Some(details),
                Some(&err),
                None,
            );
            ClassifiedError {
                record,
                source: err,
            }
        }
    }
}

/// Run an async operation under the guard
pub async fn guarded<T, F>(store: &ErrorStore, operation: &str, fut: F) -> Result<T, ClassifiedError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    fut.await
        .map_err(|err| classify_and_record(store, operation, err))
}

/// Run a synchronous operation under the guard
pub fn guarded_sync<T>(
    store: &ErrorStore,
    operation: &str,
    f: impl FnOnce() -> anyhow::Result<T>,
) -> Result<T, ClassifiedError> {
    f().map_err(|err| classify_and_record(store, operation, err))
}
