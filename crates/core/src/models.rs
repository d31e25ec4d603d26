use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flat, JSON-safe metadata record. Values are scalars after sanitization.
pub type Metadata = Map<String, Value>;

/// Raw output of a document loader: text plus loader-specific metadata,
/// unsanitized (may contain nested values).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFragment {
    pub text: String,
    pub metadata: Metadata,
}

/// A token-bounded chunk ready for embedding, owned by the collection it is
/// written into. Enrichment fields are best-effort annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedNode {
    pub node_id: String,
    pub text: String,
    pub metadata: Metadata,
    pub title: Option<String>,
    pub questions: Option<Vec<String>>,
}

impl IndexedNode {
    /// Metadata as written to the store: the sanitized record plus the
    /// enrichment annotations folded in as scalar strings.
    pub fn stored_metadata(&self) -> Metadata {
        let mut merged = self.metadata.clone();
        if let Some(title) = &self.title {
            merged.insert("document_title".to_string(), Value::String(title.clone()));
        }
        if let Some(questions) = &self.questions {
            merged.insert(
                "questions_this_excerpt_can_answer".to_string(),
                Value::String(questions.join("\n")),
            );
        }
        merged
    }
}

/// A collection resolved against the external vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionHandle {
    pub id: String,
    pub name: String,
}

/// A retrieval hit: stored text, stored metadata, similarity score
/// (larger is better).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredNode {
    pub node_id: String,
    pub text: String,
    pub metadata: Metadata,
    pub score: f64,
}

/// Outcome of one query: synthesized answer plus structured source metadata.
/// Constructed per query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub question: String,
    pub answer: String,
    pub source_nodes: Vec<Metadata>,
    pub raw_metadata: Metadata,
}

/// Outcome of a translation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationOutcome {
    pub original: String,
    pub translated: String,
    pub target_language: String,
}

/// Loader strategy, selected by wire tag at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoaderKind {
    /// Deterministic fixed-layout extraction, one fragment per page.
    Structural,
    /// LLM-guided contextual chunking over the whole document.
    Semantic,
}

impl LoaderKind {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "pymupdf" => Some(Self::Structural),
            "smart" => Some(Self::Semantic),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Structural => "pymupdf",
            Self::Semantic => "smart",
        }
    }
}

/// How retrieved chunks are combined into a final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseMode {
    Refine,
    Compact,
    SimpleSummarize,
    TreeSummarize,
    Generation,
    NoText,
    ContextOnly,
    Accumulate,
    CompactAccumulate,
}

/// Catalog entry describing one response mode.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseModeInfo {
    pub name: &'static str,
    pub value: &'static str,
    pub description: &'static str,
}

impl ResponseMode {
    pub fn parse(value: &str) -> Option<Self> {
        ResponseMode::all()
            .iter()
            .copied()
            .find(|mode| mode.value() == value)
    }

    pub fn value(&self) -> &'static str {
        match self {
            Self::Refine => "refine",
            Self::Compact => "compact",
            Self::SimpleSummarize => "simple_summarize",
            Self::TreeSummarize => "tree_summarize",
            Self::Generation => "generation",
            Self::NoText => "no_text",
            Self::ContextOnly => "context_only",
            Self::Accumulate => "accumulate",
            Self::CompactAccumulate => "compact_accumulate",
        }
    }

    pub fn all() -> &'static [ResponseMode] {
        &[
            Self::Refine,
            Self::Compact,
            Self::SimpleSummarize,
            Self::TreeSummarize,
            Self::Generation,
            Self::NoText,
            Self::ContextOnly,
            Self::Accumulate,
            Self::CompactAccumulate,
        ]
    }

    /// Static registry of every synthesis strategy, served by the info
    /// endpoint.
    pub fn catalog() -> Vec<ResponseModeInfo> {
        vec![
            ResponseModeInfo {
                name: "REFINE",
                value: "refine",
                description: "Refine is an iterative way of generating a response. \
                    The context of the first node and the query produce an initial answer; \
                    that answer, the query, and each following node's context are then fed \
                    through a refine prompt, across all N-1 remaining nodes.",
            },
            ResponseModeInfo {
                name: "COMPACT",
                value: "compact",
                description: "Compact and refine mode first combines text chunks into larger \
                    consolidated chunks that more fully utilize the available context window, \
                    then refines answers across them. Faster than refine since fewer LLM calls \
                    are made.",
            },
            ResponseModeInfo {
                name: "SIMPLE_SUMMARIZE",
                value: "simple_summarize",
                description: "Merge all text chunks into one, and make a single LLM call. \
                    Fails if the merged text chunk exceeds the context window size.",
            },
            ResponseModeInfo {
                name: "TREE_SUMMARIZE",
                value: "tree_summarize",
                description: "Build a tree over the set of candidate nodes with a summary prompt \
                    seeded with the query. The tree is built bottom-up, and the root is returned \
                    as the response.",
            },
            ResponseModeInfo {
                name: "GENERATION",
                value: "generation",
                description: "Ignore context, just use the LLM to generate a response.",
            },
            ResponseModeInfo {
                name: "NO_TEXT",
                value: "no_text",
                description: "Return the retrieved context nodes, without synthesizing a final \
                    response.",
            },
            ResponseModeInfo {
                name: "CONTEXT_ONLY",
                value: "context_only",
                description: "Returns a concatenated string of all text chunks.",
            },
            ResponseModeInfo {
                name: "ACCUMULATE",
                value: "accumulate",
                description: "Synthesize a response for each text chunk, and then return the \
                    concatenation.",
            },
            ResponseModeInfo {
                name: "COMPACT_ACCUMULATE",
                value: "compact_accumulate",
                description: "Compact and accumulate mode first combines text chunks into larger \
                    consolidated chunks, then accumulates answers for each of them and returns \
                    the concatenation. Faster than accumulate since fewer LLM calls are made.",
            },
        ]
    }
}

/// Word-window splitter settings. `chunk_size` must exceed `chunk_overlap`.
#[derive(Debug, Clone, Copy)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 64,
        }
    }
}

/// Enrichment settings: how many leading chunks seed the document title, and
/// how many candidate questions are generated per chunk.
#[derive(Debug, Clone, Copy)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    pub title_sample_chunks: usize,
    pub questions_per_chunk: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            title_sample_chunks: 5,
            questions_per_chunk: 3,
        }
    }
}
