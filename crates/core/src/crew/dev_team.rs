//! # Dev Team Crew
//!
//! Runs the four role agents as a sequential pipeline. Each stage is one
//! agent executing one fully materialized task; its output becomes the
//! input of the next stage. A failing stage ends the run: the error is
//! recorded once, the partial run is kept as [`DevTeamCrew::last_run`],
//! and the caller gets the classified error.

use super::events::{CrewEvent, CrewEventKind};
use super::pipeline::{StageKind, StageOutput};
use super::run::{CycleResult, PipelineRun};
use super::tasks::{Task, TaskTemplates};
use crate::agents::{
    Agent, AgentKind, AnalystAgent, ArchitectAgent, DeveloperAgent, ProfileUpdate, ReviewerAgent,
};
use crate::config::Settings;
use crate::errors::ErrorStore;
use crate::guard::{guarded, guarded_sync, ClassifiedError};
use crate::llm::cache::CREW_CACHE_FILE;
use crate::llm::{ModelProvider, RadkitProvider, ResponseCache};
use crate::models::ModelConfig;
use crate::tools::ToolBox;
use anyhow::Context;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct CrewBuilder {
    language: String,
    model: ModelConfig,
    store: Option<ErrorStore>,
    provider: Option<Arc<dyn ModelProvider>>,
    cache: Option<ResponseCache>,
    cache_dir: Option<PathBuf>,
    toolbox: ToolBox,
    templates: TaskTemplates,
    agent_overrides: HashMap<AgentKind, ProfileUpdate>,
    event_tx: Option<mpsc::Sender<CrewEvent>>,
}

impl CrewBuilder {
    pub fn with_store(mut self, store: ErrorStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Cache shared by all four agents
    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    pub fn with_toolbox(mut self, toolbox: ToolBox) -> Self {
        self.toolbox = toolbox;
        self
    }

    pub fn with_templates(mut self, templates: TaskTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_agent_override(mut self, kind: AgentKind, update: ProfileUpdate) -> Self {
        self.agent_overrides.insert(kind, update);
        self
    }

    /// Set event channel for progress updates
    pub fn with_event_channel(mut self, tx: mpsc::Sender<CrewEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Build all four agents. Any agent failing to bind fails the crew.
    pub fn build(self) -> Result<DevTeamCrew, ClassifiedError> {
        let store = self.store.unwrap_or_default();
        let provider: Arc<dyn ModelProvider> = self
            .provider
            .unwrap_or_else(|| Arc::new(RadkitProvider::new()));
        let language = self.language;
        let model = self.model;
        let toolbox = self.toolbox;
        let overrides = self.agent_overrides;
        let cache = self.cache;
        let cache_dir = self.cache_dir;

        let (cache, analyst, architect, developer, reviewer) = guarded_sync(&store, "crew.build", || {
            let cache = match cache {
                Some(cache) => cache,
                None => ResponseCache::open_at(cache_dir.unwrap_or_default().join(CREW_CACHE_FILE))?,
            };

            let build = |kind: AgentKind| -> anyhow::Result<Agent> {
                let mut builder = Agent::builder(kind, &language)
                    .with_store(store.clone())
                    .with_provider(provider.clone())
                    .with_cache(cache.clone())
                    .with_toolbox(toolbox.clone())
                    .with_model(model.clone());
                if let Some(update) = overrides.get(&kind) {
                    builder = builder.with_update(update);
                }
                Ok(builder.build()?)
            };

            let analyst = AnalystAgent::try_from(build(AgentKind::Analyst)?)?;
            let architect = ArchitectAgent::try_from(build(AgentKind::Architect)?)?;
            let developer = DeveloperAgent::try_from(build(AgentKind::Developer)?)?;
            let reviewer = ReviewerAgent::try_from(build(AgentKind::Reviewer)?)?;
            Ok((cache, analyst, architect, developer, reviewer))
        })?;

        tracing::info!(language = %language, model = %model.model, "Crew assembled");

        Ok(DevTeamCrew {
            language,
            analyst,
            architect,
            developer,
            reviewer,
            templates: self.templates,
            store,
            cache,
            event_tx: self.event_tx,
            last_run: None,
        })
    }
}

pub struct DevTeamCrew {
    language: String,
    analyst: AnalystAgent,
    architect: ArchitectAgent,
    developer: DeveloperAgent,
    reviewer: ReviewerAgent,
    templates: TaskTemplates,
    store: ErrorStore,
    cache: ResponseCache,
    event_tx: Option<mpsc::Sender<CrewEvent>>,
    last_run: Option<PipelineRun>,
}

impl DevTeamCrew {
    pub fn builder(language: &str) -> CrewBuilder {
        CrewBuilder {
            language: language.to_string(),
            model: ModelConfig::default(),
            store: None,
            provider: None,
            cache: None,
            cache_dir: None,
            toolbox: ToolBox::new(),
            templates: TaskTemplates::new(),
            agent_overrides: HashMap::new(),
            event_tx: None,
        }
    }

    /// Builder preconfigured from settings: model, standard tools, cache
    /// location, agent and task overrides
    pub fn builder_from_settings(settings: &Settings) -> CrewBuilder {
        let mut builder = Self::builder(&settings.language)
            .with_model(settings.model_config())
            .with_toolbox(ToolBox::standard(settings))
            .with_cache_dir(settings.cache_dir.clone())
            .with_templates(TaskTemplates::new().with_overrides(&settings.tasks));
        for (kind, update) in &settings.agents {
            builder = builder.with_agent_override(*kind, update.clone());
        }
        builder
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn store(&self) -> &ErrorStore {
        &self.store
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn analyst(&self) -> &AnalystAgent {
        &self.analyst
    }

    pub fn architect(&self) -> &ArchitectAgent {
        &self.architect
    }

    pub fn developer(&self) -> &DeveloperAgent {
        &self.developer
    }

    pub fn reviewer(&self) -> &ReviewerAgent {
        &self.reviewer
    }

    /// The most recent full-cycle run, complete or failed
    pub fn last_run(&self) -> Option<&PipelineRun> {
        self.last_run.as_ref()
    }

    fn agent_for(&self, stage: StageKind) -> &Agent {
        match stage {
            StageKind::Analysis => &self.analyst,
            StageKind::Architecture => &self.architect,
            StageKind::Implementation => &self.developer,
            StageKind::Review => &self.reviewer,
        }
    }

    fn agent_for_mut(&mut self, stage: StageKind) -> &mut Agent {
        match stage {
            StageKind::Analysis => &mut self.analyst,
            StageKind::Architecture => &mut self.architect,
            StageKind::Implementation => &mut self.developer,
            StageKind::Review => &mut self.reviewer,
        }
    }

    /// Switch every agent to `language`. All four rebindings are built
    /// before any agent changes, so a failure leaves the crew untouched.
    #[tracing::instrument(skip(self), fields(from = %self.language))]
    pub fn set_language(&mut self, language: &str) -> Result<(), ClassifiedError> {
        let store = self.store.clone();
        let update = ProfileUpdate::language(language);

        let staged = guarded_sync(&store, "crew.set_language", || {
            if language.trim().is_empty() {
                anyhow::bail!("invalid language: must not be empty");
            }
            StageKind::ALL
                .into_iter()
                .map(|stage| -> anyhow::Result<_> {
                    let agent = self.agent_for(stage);
                    let rebound = agent
                        .prepare(&update)
                        .with_context(|| format!("rebinding the {} agent", agent.kind()))?;
                    Ok((stage, rebound))
                })
                .collect::<anyhow::Result<Vec<_>>>()
        })?;

        for (stage, (profile, binding)) in staged {
            self.agent_for_mut(stage).commit(profile, binding);
        }
        self.language = language.to_string();
        tracing::info!(language, "Crew language changed");
        Ok(())
    }

    async fn emit(&self, run: &mut PipelineRun, event: CrewEvent) {
        run.events.push(event.clone());
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Run all four stages in order.
    ///
    /// There is no partial result: on failure the caller gets the
    /// classified error, and the outputs produced so far stay available
    /// through [`DevTeamCrew::last_run`].
    #[tracing::instrument(
        skip(self, context, constraints),
        fields(language = %self.language, requirements_preview = %requirements.chars().take(50).collect::<String>())
    )]
    pub async fn run_full_cycle(
        &mut self,
        requirements: &str,
        context: Option<&str>,
        constraints: Option<&str>,
    ) -> Result<CycleResult, ClassifiedError> {
        let store = self.store.clone();
        guarded(
            &store,
            "crew.run_full_cycle",
            self.execute_cycle(requirements, context, constraints),
        )
        .await
    }

    async fn execute_cycle(
        &mut self,
        requirements: &str,
        context: Option<&str>,
        constraints: Option<&str>,
    ) -> anyhow::Result<CycleResult> {
        if requirements.trim().is_empty() {
            anyhow::bail!("invalid input: requirements must not be empty");
        }

        let mut run = PipelineRun::new(&self.language, requirements, context, constraints);
        tracing::info!(run_id = %run.id, "Development cycle started");
        let started = CrewEvent::new(CrewEventKind::PipelineStarted)
            .with_data(json!({ "run_id": run.id, "language": run.language }));
        self.emit(&mut run, started).await;

        let outcome = self.drive(&mut run).await;

        match &outcome {
            Ok(_) => {
                tracing::info!(run_id = %run.id, "Development cycle completed");
                self.emit(&mut run, CrewEvent::new(CrewEventKind::PipelineCompleted))
                    .await;
            }
            Err(e) => {
                tracing::error!(run_id = %run.id, state = ?run.state(), "Development cycle failed: {:#}", e);
                self.emit(
                    &mut run,
                    CrewEvent::new(CrewEventKind::PipelineFailed)
                        .with_data(json!({ "error": format!("{:#}", e) })),
                )
                .await;
            }
        }

        self.last_run = Some(run);
        outcome
    }

    async fn drive(&self, run: &mut PipelineRun) -> anyhow::Result<CycleResult> {
        let language = self.language.as_str();

        let task = self
            .templates
            .analysis(language, &run.requirements, run.context.as_deref());
        let specification = self.stage(run, task).await?;

        let task = self
            .templates
            .architecture(language, &specification, run.constraints.as_deref())?;
        let architecture = self.stage(run, task).await?;

        let task = self
            .templates
            .implementation(language, &specification, &architecture)?;
        let implementation = self.stage(run, task).await?;

        let task = self
            .templates
            .review_stage(language, &implementation, &specification)?;
        let review = self.stage(run, task).await?;

        Ok(CycleResult {
            specification: specification.text,
            architecture: architecture.text,
            implementation: implementation.text,
            review: review.text,
        })
    }

    /// One agent, one task
    async fn stage(&self, run: &mut PipelineRun, task: Task) -> anyhow::Result<StageOutput> {
        let stage = task.kind();
        let agent = self.agent_for(stage);
        tracing::info!(stage = %stage, position = stage.position(), agent = %agent.kind(), "Stage started");
        self.emit(
            run,
            CrewEvent::for_stage(CrewEventKind::StageStarted, stage)
                .with_data(json!({ "agent": agent.kind() })),
        )
        .await;

        match agent.execute(&task).await {
            Ok(text) => {
                let output = StageOutput::new(stage, text);
                run.record(output.clone())?;
                self.emit(
                    run,
                    CrewEvent::for_stage(CrewEventKind::StageCompleted, stage)
                        .with_data(json!({ "chars": output.text.len() })),
                )
                .await;
                Ok(output)
            }
            Err(e) => {
                run.fail();
                tracing::warn!(stage = %stage, category = %e.category(), "Stage failed");
                self.emit(
                    run,
                    CrewEvent::for_stage(CrewEventKind::StageFailed, stage)
                        .with_data(json!({ "error": e.record().message(), "category": e.category() })),
                )
                .await;
                Err(e.into())
            }
        }
    }

    /// Review `code` on its own, outside a full cycle
    #[tracing::instrument(skip(self, code, specifications), fields(language = %self.language, code_len = code.len()))]
    pub async fn run_code_review(
        &self,
        code: &str,
        specifications: Option<&str>,
    ) -> Result<String, ClassifiedError> {
        guarded(&self.store, "crew.run_code_review", async {
            if code.trim().is_empty() {
                anyhow::bail!("invalid input: no code to review");
            }
            let task = self.templates.review(&self.language, code, specifications);
            Ok(self.reviewer.execute(&task).await?)
        })
        .await
    }
}
