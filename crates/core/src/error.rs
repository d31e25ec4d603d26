use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a pdf: {0}")]
    UnsupportedFileKind(String),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("document produced no fragments: {0}")]
    EmptyDocument(String),

    #[error("semantic chunker failed: {0}")]
    Upstream(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
#[error("{provider} embedding failed: {message}")]
pub struct EmbeddingError {
    pub provider: String,
    pub message: String,
}

#[derive(Debug, Error)]
#[error("chat completion failed: {0}")]
pub struct LlmError(pub String);

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("loader failed: {0}")]
    Loader(#[from] LoaderError),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("embedding failed for chunk {chunk_index}: {message}")]
    Embedding { chunk_index: usize, message: String },

    #[error("store write failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown response mode: {0}")]
    UnknownResponseMode(String),

    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("retrieval failed: {0}")]
    Store(#[from] StoreError),

    #[error("synthesis failed: {0}")]
    Synthesis(#[from] LlmError),

    #[error("context of {length} chars exceeds the {budget} char budget")]
    ContextOverflow { length: usize, budget: usize },
}

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("translation call failed: {0}")]
    Llm(#[from] LlmError),
}
