use crate::embeddings::Embedder;
use crate::error::QueryError;
use crate::llm::ChatClient;
use crate::metadata::transform_metadata;
use crate::models::{Metadata, ResponseMode, RetrievalResult};
use crate::synthesis::{ResponseSynthesizer, DEFAULT_CONTEXT_BUDGET_CHARS};
use crate::traits::VectorCollectionStore;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Nodes retrieved per query.
pub const DEFAULT_TOP_K: usize = 3;

/// Answers a question against one collection: embed, filtered top-k
/// retrieval, then mode-driven synthesis.
pub struct RetrievalEngine {
    store: Arc<dyn VectorCollectionStore>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatClient>,
    top_k: usize,
    context_budget_chars: usize,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<dyn VectorCollectionStore>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatClient>,
    ) -> Self {
        Self {
            store,
            embedder,
            chat,
            top_k: DEFAULT_TOP_K,
            context_budget_chars: DEFAULT_CONTEXT_BUDGET_CHARS,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Run one query. The mode tag is validated before anything else runs;
    /// an unknown tag costs zero model and store calls. Querying a collection
    /// that does not exist yet yields an empty result, not an error.
    pub async fn query(
        &self,
        question: &str,
        doc_type: Option<&str>,
        collection_name: &str,
        response_mode: &str,
    ) -> Result<RetrievalResult, QueryError> {
        let mode = ResponseMode::parse(response_mode)
            .ok_or_else(|| QueryError::UnknownResponseMode(response_mode.to_string()))?;

        let collection = self.store.get_or_create_collection(collection_name).await?;

        let query_vector = self.embedder.embed(question).await?;
        let nodes = self
            .store
            .query(&collection, &query_vector, self.top_k, doc_type)
            .await?;

        info!(
            collection = %collection.name,
            mode = mode.value(),
            hit_count = nodes.len(),
            "retrieved nodes"
        );

        let mut raw_metadata = Metadata::new();
        for node in &nodes {
            raw_metadata.insert(
                node.node_id.clone(),
                Value::Object(node.metadata.clone()),
            );
        }

        let contexts: Vec<String> = nodes.iter().map(|node| node.text.clone()).collect();
        let synthesizer = ResponseSynthesizer::new(self.chat.as_ref(), self.context_budget_chars);
        let answer = synthesizer.synthesize(question, &contexts, mode).await?;

        // Stored metadata is sanitized at ingestion, so the filterless path
        // passes through records that are already normalized.
        let source_nodes = transform_metadata(&raw_metadata, doc_type);

        Ok(RetrievalResult {
            question: question.to_string(),
            answer,
            source_nodes,
            raw_metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedNgramEmbedder;
    use crate::error::{LlmError, StoreError};
    use crate::models::{CollectionHandle, IndexedNode, ScoredNode};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct SeededStore {
        nodes: Vec<ScoredNode>,
        query_calls: Mutex<usize>,
        seen_filters: Mutex<Vec<Option<String>>>,
    }

    impl SeededStore {
        fn new(nodes: Vec<ScoredNode>) -> Self {
            Self {
                nodes,
                query_calls: Mutex::new(0),
                seen_filters: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VectorCollectionStore for SeededStore {
        async fn get_or_create_collection(
            &self,
            name: &str,
        ) -> Result<CollectionHandle, StoreError> {
            Ok(CollectionHandle {
                id: name.to_string(),
                name: name.to_string(),
            })
        }

        async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }

        async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
            Err(StoreError::CollectionNotFound(name.to_string()))
        }

        async fn add_nodes(
            &self,
            _collection: &CollectionHandle,
            _nodes: &[IndexedNode],
            _embeddings: &[Vec<f32>],
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn query(
            &self,
            _collection: &CollectionHandle,
            _embedding: &[f32],
            top_k: usize,
            doc_type: Option<&str>,
        ) -> Result<Vec<ScoredNode>, StoreError> {
            *self.query_calls.lock().unwrap() += 1;
            self.seen_filters
                .lock()
                .unwrap()
                .push(doc_type.map(str::to_string));

            let hits = self
                .nodes
                .iter()
                .filter(|node| match doc_type {
                    Some(tag) => node.metadata.get("doc_type") == Some(&Value::from(tag)),
                    None => true,
                })
                .take(top_k)
                .cloned()
                .collect();
            Ok(hits)
        }

        async fn count(&self, _collection: &CollectionHandle) -> Result<usize, StoreError> {
            Ok(self.nodes.len())
        }
    }

    struct CountingChat {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ChatClient for CountingChat {
        async fn complete(&self, _system: Option<&str>, _user: &str) -> Result<String, LlmError> {
            *self.calls.lock().unwrap() += 1;
            Ok("synthesized answer".to_string())
        }
    }

    fn node(id: &str, doc_type: &str) -> ScoredNode {
        let metadata = match json!({"doc_type": doc_type, "page": 1}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        ScoredNode {
            node_id: id.to_string(),
            text: format!("text of {id}"),
            metadata,
            score: 0.9,
        }
    }

    fn engine(store: Arc<SeededStore>, chat: Arc<CountingChat>) -> RetrievalEngine {
        RetrievalEngine::new(store, Arc::new(HashedNgramEmbedder::default()), chat)
    }

    #[tokio::test]
    async fn unknown_mode_is_rejected_before_any_calls() {
        let store = Arc::new(SeededStore::new(vec![node("n1", "CV")]));
        let chat = Arc::new(CountingChat {
            calls: Mutex::new(0),
        });
        let engine = engine(store.clone(), chat.clone());

        let error = engine
            .query("q?", None, "collection_a", "creative")
            .await
            .unwrap_err();

        assert!(matches!(error, QueryError::UnknownResponseMode(_)));
        assert_eq!(*chat.calls.lock().unwrap(), 0);
        assert_eq!(*store.query_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn matching_filter_returns_answer_and_sources() {
        let uuid_key = "9b2f8c4e-1a6d-4f3b-8c2e-5d7a9b0c1d2e";
        let store = Arc::new(SeededStore::new(vec![node(uuid_key, "CV")]));
        let chat = Arc::new(CountingChat {
            calls: Mutex::new(0),
        });
        let engine = engine(store.clone(), chat);

        let result = engine
            .query("q?", Some("CV"), "collection_a", "compact")
            .await
            .unwrap();

        assert_eq!(result.answer, "synthesized answer");
        assert_eq!(result.source_nodes.len(), 1);
        assert_eq!(result.source_nodes[0]["doc_id"], uuid_key);
        assert_eq!(result.source_nodes[0]["doc_type"], "CV");
        assert_eq!(
            store.seen_filters.lock().unwrap()[0],
            Some("CV".to_string())
        );
    }

    #[tokio::test]
    async fn mismatching_filter_yields_empty_metadata_not_error() {
        let store = Arc::new(SeededStore::new(vec![node("n1", "CV")]));
        let chat = Arc::new(CountingChat {
            calls: Mutex::new(0),
        });
        let engine = engine(store, chat.clone());

        let result = engine
            .query("q?", Some("INVOICE"), "collection_a", "compact")
            .await
            .unwrap();

        assert!(result.source_nodes.is_empty());
        assert!(result.raw_metadata.is_empty());
        assert!(result.answer.is_empty());
        assert_eq!(*chat.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn result_metadata_is_capped_at_top_k() {
        let nodes = (0..10).map(|index| node(&format!("n{index}"), "CV")).collect();
        let store = Arc::new(SeededStore::new(nodes));
        let chat = Arc::new(CountingChat {
            calls: Mutex::new(0),
        });
        let engine = engine(store, chat);

        let result = engine
            .query("q?", None, "collection_a", "compact")
            .await
            .unwrap();

        assert!(result.source_nodes.len() <= DEFAULT_TOP_K);
    }
}
