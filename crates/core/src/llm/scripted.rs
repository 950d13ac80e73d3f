//! Scripted model and provider for tests.
//!
//! Every request is recorded; responses are popped from a script in call
//! order, falling back to an echo of the prompt's first line.

use super::{LanguageModel, ModelError, ModelProvider, ModelRequest};
use crate::models::ModelConfig;
use crate::tools::radkit_tools::AgentTools;
use crate::tools::ToolKind;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<String, ModelError>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_script(script: Vec<Result<String, ModelError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, response: Result<String, ModelError>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Ok(format!(
                "echo: {}",
                request.prompt.lines().next().unwrap_or_default()
            )),
        }
    }
}

/// Hands out the same [`ScriptedModel`] to every binding
pub struct ScriptedProvider {
    model: Arc<ScriptedModel>,
    fail_after: Option<usize>,
    bindings: Mutex<Vec<(ModelConfig, Vec<ToolKind>)>>,
}

impl ScriptedProvider {
    pub fn new(model: Arc<ScriptedModel>) -> Arc<Self> {
        Arc::new(Self {
            model,
            fail_after: None,
            bindings: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Self::failing_after(0)
    }

    /// Succeed for the first `n` bindings, then refuse every one after
    pub fn failing_after(n: usize) -> Arc<Self> {
        Arc::new(Self {
            model: ScriptedModel::new(),
            fail_after: Some(n),
            bindings: Mutex::new(Vec::new()),
        })
    }

    pub fn bindings(&self) -> Vec<(ModelConfig, Vec<ToolKind>)> {
        self.bindings.lock().unwrap().clone()
    }
}

impl ModelProvider for ScriptedProvider {
    fn bind(
        &self,
        config: &ModelConfig,
        tools: &AgentTools,
    ) -> Result<Arc<dyn LanguageModel>, ModelError> {
        let mut bindings = self.bindings.lock().unwrap();
        if self.fail_after.is_some_and(|n| bindings.len() >= n) {
            return Err(ModelError::Binding {
                model: config.model.clone(),
                reason: "unknown model identifier".to_string(),
            });
        }
        bindings.push((config.clone(), tools.kinds().to_vec()));
        Ok(self.model.clone())
    }
}
