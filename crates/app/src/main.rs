mod server;

use chrono::Utc;
use clap::Parser;
use pdf_rag_core::{
    ChatClient, ChromaStore, Embedder, EnrichmentConfig, HashedNgramEmbedder, IngestionPipeline,
    OllamaEmbedder, OpenAiChatClient, OpenAiEmbedder, RetrievalEngine, SemanticChunkerConfig,
    SplitterConfig, TranslationStage,
};
use server::{app_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-rag-server", version)]
struct Cli {
    /// Bind address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Bind port
    #[arg(long, env = "PORT", default_value = "8003")]
    port: u16,

    /// Embedding provider: openai, ollama, or local
    #[arg(long, env = "AI_PROVIDER", default_value = "openai")]
    ai_provider: String,

    /// Chat model for synthesis, enrichment, and translation
    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4o-mini")]
    llm_model: String,

    /// Embedding model name
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    embedding_model: String,

    /// Vision model used by the contextual chunker
    #[arg(long, env = "VISION_MODEL", default_value = "gpt-4o")]
    vision_model: String,

    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    openai_api_key: String,

    /// Ollama base URL (embedding provider "ollama")
    #[arg(long, env = "OLLAMA_BASE_URL", default_value = "http://localhost:11434")]
    ollama_base_url: String,

    /// ChromaDB host
    #[arg(long, env = "CHROMA_HOST", default_value = "localhost")]
    chroma_host: String,

    /// ChromaDB port
    #[arg(long, env = "CHROMA_PORT", default_value = "8000")]
    chroma_port: u16,

    /// ChromaDB auth credentials; empty disables store auth
    #[arg(long, env = "CHROMA_CLIENT_AUTH_CREDENTIALS", default_value = "")]
    chroma_auth_credentials: String,

    /// Header carrying the ChromaDB credential
    #[arg(
        long,
        env = "CHROMA_AUTH_TOKEN_TRANSPORT_HEADER",
        default_value = "Authorization"
    )]
    chroma_auth_header: String,

    /// Wall-clock budget for one upload, in seconds
    #[arg(long, env = "UPLOAD_TIMEOUT", default_value = "600")]
    upload_timeout: u64,

    /// Bearer token required on every route; empty disables auth
    #[arg(long, env = "API_TOKEN", default_value = "")]
    api_token: String,

    /// Target language when a translation request names none
    #[arg(long, env = "DEFAULT_TARGET_LANGUAGE", default_value = "English")]
    default_target_language: String,
}

/// Embedding dimensions for common ollama embedding models.
const OLLAMA_EMBEDDING_DIMENSIONS: usize = 768;

fn build_embedder(cli: &Cli) -> anyhow::Result<Arc<dyn Embedder>> {
    match cli.ai_provider.as_str() {
        "openai" => Ok(Arc::new(
            OpenAiEmbedder::new(&cli.openai_api_key).with_model(&cli.embedding_model),
        )),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(
            &cli.ollama_base_url,
            &cli.embedding_model,
            OLLAMA_EMBEDDING_DIMENSIONS,
        ))),
        "local" => Ok(Arc::new(HashedNgramEmbedder::default())),
        other => anyhow::bail!("unknown embedding provider: {other}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let embedder = build_embedder(&cli)?;
    let chat: Arc<dyn ChatClient> = Arc::new(OpenAiChatClient::new(
        &cli.openai_api_key,
        &cli.llm_model,
    ));

    let mut store = ChromaStore::new(&cli.chroma_host, cli.chroma_port);
    if !cli.chroma_auth_credentials.is_empty() {
        store = store.with_auth(&cli.chroma_auth_header, &cli.chroma_auth_credentials);
    }
    let store = Arc::new(store);

    let state = AppState {
        store: store.clone(),
        pipeline: Arc::new(IngestionPipeline::new(
            store.clone(),
            embedder.clone(),
            chat.clone(),
            SplitterConfig::default(),
            EnrichmentConfig::default(),
        )),
        engine: Arc::new(RetrievalEngine::new(store, embedder, chat.clone())),
        translator: Arc::new(TranslationStage::new(chat)),
        semantic_chunker: SemanticChunkerConfig::new(&cli.vision_model, &cli.openai_api_key),
        upload_timeout: Duration::from_secs(cli.upload_timeout),
        api_token: (!cli.api_token.is_empty()).then(|| cli.api_token.clone()),
        default_target_language: cli.default_target_language.clone(),
    };

    let router = app_router(state);
    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        addr = %addr,
        provider = %cli.ai_provider,
        "pdf-rag-server boot"
    );

    axum::serve(listener, router).await?;

    Ok(())
}
