pub mod chunking;
pub mod embeddings;
pub mod enrich;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod metadata;
pub mod models;
pub mod query;
pub mod stores;
pub mod synthesis;
pub mod traits;
pub mod translate;

pub use chunking::{normalize_whitespace, split_text};
pub use embeddings::{Embedder, HashedNgramEmbedder, OllamaEmbedder, OpenAiEmbedder};
pub use error::{
    EmbeddingError, IngestError, LlmError, LoaderError, QueryError, StoreError, TranslationError,
};
pub use ingest::IngestionPipeline;
pub use llm::{ChatClient, OpenAiChatClient};
pub use loader::{load, SemanticChunkerConfig};
pub use metadata::{sanitize, transform_metadata};
pub use models::{
    CollectionHandle, EnrichmentConfig, IndexedNode, LoaderKind, Metadata, RawFragment,
    ResponseMode, ResponseModeInfo, RetrievalResult, ScoredNode, SplitterConfig,
    TranslationOutcome,
};
pub use query::{RetrievalEngine, DEFAULT_TOP_K};
pub use stores::ChromaStore;
pub use synthesis::ResponseSynthesizer;
pub use traits::VectorCollectionStore;
pub use translate::{TranslationStage, DEFAULT_TARGET_LANGUAGE};
