//! Language model doubles and a local HTTP stub for handler and workflow tests.

use async_trait::async_trait;
use axum::Router;
use devteam_core::llm::{LanguageModel, ModelError, ModelProvider, ModelRequest};
use devteam_core::models::ModelConfig;
use devteam_core::tools::radkit_tools::AgentTools;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

type Answer = Box<dyn Fn(&ModelRequest) -> Result<String, ModelError> + Send + Sync>;

/// Answers every request through a closure, optionally holding each call
/// until [`CannedModel::open`] is called
pub struct CannedModel {
    answer: Answer,
    gate: Option<Semaphore>,
    entered: Notify,
    calls: AtomicUsize,
}

impl CannedModel {
    pub fn new(
        answer: impl Fn(&ModelRequest) -> Result<String, ModelError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            answer: Box::new(answer),
            gate: None,
            entered: Notify::new(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn gated(
        answer: impl Fn(&ModelRequest) -> Result<String, ModelError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            answer: Box::new(answer),
            gate: Some(Semaphore::new(0)),
            entered: Notify::new(),
            calls: AtomicUsize::new(0),
        })
    }

    /// Wait until a call has reached the model
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Let held calls through, one at a time
    pub fn open(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn provider(self: &Arc<Self>) -> Arc<dyn ModelProvider> {
        Arc::new(CannedProvider(self.clone()))
    }
}

#[async_trait]
impl LanguageModel for CannedModel {
    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| ModelError::Provider(e.to_string()))?;
            return (self.answer)(request);
        }
        (self.answer)(request)
    }
}

struct CannedProvider(Arc<CannedModel>);

impl ModelProvider for CannedProvider {
    fn bind(
        &self,
        _config: &ModelConfig,
        _tools: &AgentTools,
    ) -> Result<Arc<dyn LanguageModel>, ModelError> {
        Ok(self.0.clone())
    }
}

/// Serve `app` on an ephemeral local port and return its base URL
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
