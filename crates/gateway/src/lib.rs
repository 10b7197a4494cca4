//! HTTP gateway for Delve.
//!
//! Exposes the research loop as an SSE chat endpoint, read access to
//! persisted research, and voice transcription. Built on Axum.

pub mod api;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use delve_agent::ResearchLoop;
use delve_config::AppConfig;
use delve_core::provider::Provider;
use delve_core::research::ResearchStore;
use delve_core::transcription::Transcriber;
use delve_providers::{GroqTranscriber, OpenAiCompatProvider};
use delve_store::{InMemoryStore, SqliteStore};
use delve_tools::{ToolContext, default_registry};
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Everything a request handler needs, built once at startup.
pub struct AppContext {
    pub config: AppConfig,
    pub research_loop: ResearchLoop,
    pub store: Arc<dyn ResearchStore>,
    pub transcriber: Arc<dyn Transcriber>,
    /// Research runs started by `/chat`, including ones whose client left.
    pub runs: TaskTracker,
}

pub type SharedContext = Arc<AppContext>;

impl AppContext {
    /// Wire up the configured provider, the SQLite store, the tool registry
    /// and the transcriber.
    pub async fn init(config: &AppConfig) -> Result<Self, delve_core::Error> {
        let provider = Arc::new(OpenAiCompatProvider::from_config(config)?);
        let store = Arc::new(SqliteStore::open(&config.store.path).await?);
        info!(path = %config.store.path.display(), "Research store opened");
        Ok(Self::assemble(config, provider, store))
    }

    /// Like [`AppContext::init`], but nothing is written to disk.
    pub fn init_ephemeral(config: &AppConfig) -> Result<Self, delve_core::Error> {
        let provider = Arc::new(OpenAiCompatProvider::from_config(config)?);
        Ok(Self::assemble(config, provider, Arc::new(InMemoryStore::new())))
    }

    fn assemble(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        store: Arc<dyn ResearchStore>,
    ) -> Self {
        let transcriber = Arc::new(GroqTranscriber::from_config(&config.transcription));
        Self::from_parts(config, provider, store, transcriber)
    }

    /// Build a context from explicit collaborators.
    pub fn from_parts(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        store: Arc<dyn ResearchStore>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        let tools = Arc::new(default_registry(&ToolContext::new(store.clone())));
        let mut research_loop = ResearchLoop::new(provider, tools, &config.default_model)
            .with_temperature(config.temperature);
        if let Some(prompt) = &config.system_prompt_override {
            research_loop = research_loop.with_system_prompt(prompt);
        }
        if let Some(max) = config.max_iterations {
            research_loop = research_loop.with_max_iterations(max);
        }

        Self {
            config: config.clone(),
            research_loop,
            store,
            transcriber,
            runs: TaskTracker::new(),
        }
    }

    /// Wait for in-flight runs, then release the store's resources.
    pub async fn dispose(&self) {
        self.runs.close();
        if !self.runs.is_empty() {
            info!(runs = self.runs.len(), "Waiting for research runs to finish");
        }
        self.runs.wait().await;
        self.store.close().await;
        info!(store = self.store.name(), "Research store closed");
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(ctx: SharedContext) -> Router {
    let upload_limit = ctx.config.gateway.max_upload_bytes;
    Router::new()
        .route("/health", get(api::health_handler))
        .route("/research", get(api::list_research_handler))
        .route("/research/{id}", get(api::get_research_handler))
        .route("/chat", post(api::chat_handler))
        .route(
            "/transcribe",
            post(api::transcribe_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Serve until Ctrl-C, then dispose of the context.
pub async fn serve(ctx: SharedContext) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", ctx.config.gateway.host, ctx.config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");

    axum::serve(listener, build_router(ctx.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ctx.dispose().await;
    Ok(())
}

/// Start the gateway HTTP server from configuration.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Arc::new(AppContext::init(&config).await?);
    serve(ctx).await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
