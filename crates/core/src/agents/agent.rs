//! # Agent
//!
//! An [`AgentProfile`] bound to a language model. The binding is immutable:
//! reconfiguration builds a new profile and a new binding and swaps both in
//! only when the rebuild succeeds.

use super::profile::{AgentKind, AgentProfile, ProfileUpdate};
use crate::crew::tasks::Task;
use crate::errors::ErrorStore;
use crate::guard::{guarded, guarded_sync, ClassifiedError};
use crate::llm::cache::AGENT_CACHE_FILE;
use crate::llm::{
    LanguageModel, ModelError, ModelProvider, ModelRequest, RadkitProvider, RateLimiter,
    ResponseCache,
};
use crate::models::ModelConfig;
use crate::tools::radkit_tools::AgentTools;
use crate::tools::{ToolBox, ToolKind, ToolOutput};
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;

/// Immutable model binding built from one profile
pub struct ModelBinding {
    system: String,
    config: ModelConfig,
    tools: AgentTools,
    model: Arc<dyn LanguageModel>,
    limiter: Option<Arc<RateLimiter>>,
}

impl ModelBinding {
    /// Validate the profile and bind it. Every failure, an invalid profile
    /// included, is a [`ModelError::Binding`].
    fn build(
        profile: &AgentProfile,
        provider: &dyn ModelProvider,
        toolbox: &ToolBox,
        store: &ErrorStore,
    ) -> anyhow::Result<Self> {
        profile.validate().map_err(|e| ModelError::Binding {
            model: profile.model().model.clone(),
            reason: format!("{:#}", e),
        })?;
        let tools = AgentTools::new(
            profile.kind(),
            profile.tools(),
            toolbox.clone(),
            store.clone(),
            profile.language(),
        );
        let model = provider
            .bind(profile.model(), &tools)
            .with_context(|| format!("binding {} agent", profile.kind()))?;
        Ok(Self {
            system: profile.system_instructions(),
            config: profile.model().clone(),
            tools,
            model,
            limiter: profile
                .max_rpm()
                .and_then(RateLimiter::per_minute)
                .map(Arc::new),
        })
    }

    pub fn system_instructions(&self) -> &str {
        &self.system
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn request(&self, prompt: String) -> ModelRequest {
        ModelRequest {
            system: self.system.clone(),
            prompt,
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            tools: self.tools.kinds().to_vec(),
        }
    }
}

pub struct AgentBuilder {
    profile: AgentProfile,
    store: Option<ErrorStore>,
    provider: Option<Arc<dyn ModelProvider>>,
    cache: Option<ResponseCache>,
    cache_dir: Option<PathBuf>,
    toolbox: ToolBox,
}

impl AgentBuilder {
    pub fn with_store(mut self, store: ErrorStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Directory for the default cache file when no cache handle is given
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_toolbox(mut self, toolbox: ToolBox) -> Self {
        self.toolbox = toolbox;
        self
    }

    /// Replace the default tool set for this agent kind
    pub fn with_tools(mut self, tools: Vec<ToolKind>) -> Self {
        self.profile = self.profile.apply(&ProfileUpdate {
            tools: Some(tools),
            ..ProfileUpdate::default()
        });
        self
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.profile = self.profile.apply(&ProfileUpdate {
            model: Some(model),
            ..ProfileUpdate::default()
        });
        self
    }

    pub fn with_update(mut self, update: &ProfileUpdate) -> Self {
        self.profile = self.profile.apply(update);
        self
    }

    /// Bind the model. Failures are recorded in the store and returned.
    pub fn build(self) -> Result<Agent, ClassifiedError> {
        let store = self.store.unwrap_or_default();
        let provider: Arc<dyn ModelProvider> = self
            .provider
            .unwrap_or_else(|| Arc::new(RadkitProvider::new()));
        let profile = self.profile;
        let cache = self.cache;
        let cache_dir = self.cache_dir;

        let toolbox = self.toolbox;

        let (binding, cache) = guarded_sync(&store, "agent.build", || {
            let binding = ModelBinding::build(&profile, provider.as_ref(), &toolbox, &store)?;
            let cache = match cache {
                Some(cache) => cache,
                None => {
                    let path = cache_dir.unwrap_or_default().join(AGENT_CACHE_FILE);
                    ResponseCache::open_at(path)?
                }
            };
            Ok((binding, cache))
        })?;

        tracing::info!(
            kind = %profile.kind(),
            language = %profile.language(),
            model = %profile.model().model,
            "Agent ready"
        );

        Ok(Agent {
            profile,
            binding,
            provider,
            cache,
            toolbox,
            store,
        })
    }
}

pub struct Agent {
    profile: AgentProfile,
    binding: ModelBinding,
    provider: Arc<dyn ModelProvider>,
    cache: ResponseCache,
    toolbox: ToolBox,
    store: ErrorStore,
}

impl Agent {
    pub fn builder(kind: AgentKind, language: &str) -> AgentBuilder {
        AgentBuilder {
            profile: AgentProfile::build(kind, language),
            store: None,
            provider: None,
            cache: None,
            cache_dir: None,
            toolbox: ToolBox::new(),
        }
    }

    pub fn kind(&self) -> AgentKind {
        self.profile.kind()
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn binding(&self) -> &ModelBinding {
        &self.binding
    }

    pub fn store(&self) -> &ErrorStore {
        &self.store
    }

    /// Apply `update` and rebind. On failure the agent keeps its previous
    /// profile and binding.
    #[tracing::instrument(skip(self, update), fields(kind = %self.kind()))]
    pub fn reconfigure(&mut self, update: ProfileUpdate) -> Result<(), ClassifiedError> {
        let store = self.store.clone();
        let (profile, binding) =
            guarded_sync(&store, "agent.reconfigure", || self.prepare(&update))?;
        self.commit(profile, binding);
        Ok(())
    }

    /// Build the profile and binding `update` would produce, without
    /// touching the agent
    pub(crate) fn prepare(
        &self,
        update: &ProfileUpdate,
    ) -> anyhow::Result<(AgentProfile, ModelBinding)> {
        let profile = self.profile.apply(update);
        let binding =
            ModelBinding::build(&profile, self.provider.as_ref(), &self.toolbox, &self.store)?;
        Ok((profile, binding))
    }

    pub(crate) fn commit(&mut self, profile: AgentProfile, binding: ModelBinding) {
        tracing::info!(kind = %profile.kind(), language = %profile.language(), "Agent reconfigured");
        self.profile = profile;
        self.binding = binding;
    }

    pub fn set_language(&mut self, language: &str) -> Result<(), ClassifiedError> {
        self.reconfigure(ProfileUpdate::language(language))
    }

    /// Run one task through the bound model
    pub async fn execute(&self, task: &Task) -> Result<String, ClassifiedError> {
        guarded(&self.store, "agent.execute", self.complete(task.prompt())).await
    }

    /// Prompt the bound model directly
    pub async fn ask(&self, prompt: impl Into<String>) -> Result<String, ClassifiedError> {
        guarded(&self.store, "agent.ask", self.complete(prompt.into())).await
    }

    pub(crate) async fn complete(&self, prompt: String) -> anyhow::Result<String> {
        let request = self.binding.request(prompt);
        let key = request.fingerprint();

        if let Some(hit) = self.cache.get(&key)? {
            tracing::debug!(kind = %self.kind(), "Response cache hit");
            return Ok(hit);
        }

        if let Some(limiter) = &self.binding.limiter {
            limiter.acquire().await;
        }

        tracing::debug!(kind = %self.kind(), model = %request.model, "Calling language model");
        let response = self.binding.model.complete(&request).await?;
        self.cache.put(&key, &response)?;
        Ok(response)
    }

    /// Dispatch an action to one of this agent's tools
    pub async fn invoke_tool(
        &self,
        kind: ToolKind,
        action: &str,
        params: serde_json::Value,
    ) -> Result<ToolOutput, ClassifiedError> {
        guarded(&self.store, "agent.invoke_tool", self.run_tool(kind, action, params)).await
    }

    pub(crate) async fn run_tool(
        &self,
        kind: ToolKind,
        action: &str,
        params: serde_json::Value,
    ) -> anyhow::Result<ToolOutput> {
        self.binding.tools.dispatch(kind, action, params).await
    }
}
