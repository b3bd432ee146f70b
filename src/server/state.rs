use std::sync::Arc;

use anyhow::{Context, Result};
use bookgen_core::contract::{ArtifactStore, BookRenderer, CompletionClient};
use bookgen_core::render::PdfBookRenderer;
use bookgen_core::storage::FilesystemStore;
use bookgen_core::PipelineConfig;

use crate::load_config::BookgenConfig;
use crate::openai::OpenAiClient;

/// Shared application state accessible to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// LLM backend used for the outline and every subchapter
    pub client: Arc<dyn CompletionClient>,

    pub renderer: Arc<dyn BookRenderer>,

    /// Snapshots and rendered books
    pub store: Arc<dyn ArtifactStore>,

    pub pipeline: Arc<PipelineConfig>,
}

impl AppState {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        renderer: Arc<dyn BookRenderer>,
        store: Arc<dyn ArtifactStore>,
        pipeline: PipelineConfig,
    ) -> Self {
        Self {
            client,
            renderer,
            store,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Production wiring: OpenAI client from env, PDF renderer, filesystem store.
    pub async fn from_config(config: &BookgenConfig) -> Result<Self> {
        let client = OpenAiClient::new_from_env(&config.llm)
            .context("Failed to construct completion client from env")?;
        let store = FilesystemStore::new(config.storage.output_dir.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialise storage: {e}"))?;
        tracing::info!(
            output_dir = %config.storage.output_dir.display(),
            isolate_requests = config.storage.isolate_requests,
            max_concurrent_requests = ?config.generation.max_concurrent_requests,
            "Application state ready"
        );
        Ok(Self::new(
            Arc::new(client),
            Arc::new(PdfBookRenderer::new(config.render_options())),
            Arc::new(store),
            config.pipeline_config(),
        ))
    }
}
