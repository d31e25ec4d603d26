use crate::chunking::{split_text, validate_config};
use crate::embeddings::Embedder;
use crate::enrich::Enricher;
use crate::error::IngestError;
use crate::llm::ChatClient;
use crate::metadata::sanitize;
use crate::models::{
    CollectionHandle, EnrichmentConfig, IndexedNode, RawFragment, SplitterConfig,
};
use crate::traits::VectorCollectionStore;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Splitting, best-effort enrichment, embedding, and the collection write,
/// composed in order. Shared process-wide; all collaborators are injected.
pub struct IngestionPipeline {
    store: Arc<dyn VectorCollectionStore>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatClient>,
    splitter: SplitterConfig,
    enrichment: EnrichmentConfig,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn VectorCollectionStore>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatClient>,
        splitter: SplitterConfig,
        enrichment: EnrichmentConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            chat,
            splitter,
            enrichment,
        }
    }

    /// Index raw fragments into `collection`, returning the number of nodes
    /// written.
    ///
    /// Additive: existing nodes are never touched, and re-ingesting the same
    /// document produces duplicate nodes under fresh ids. Callers that need
    /// idempotence partition by collection name.
    pub async fn ingest(
        &self,
        fragments: &[RawFragment],
        collection: &CollectionHandle,
        doc_type: &str,
    ) -> Result<usize, IngestError> {
        validate_config(&self.splitter)?;

        let mut nodes = Vec::new();
        for fragment in fragments {
            let metadata = sanitize(&fragment.metadata, doc_type);
            for chunk in split_text(&fragment.text, self.splitter) {
                nodes.push(IndexedNode {
                    node_id: Uuid::new_v4().to_string(),
                    text: chunk,
                    metadata: metadata.clone(),
                    title: None,
                    questions: None,
                });
            }
        }

        if nodes.is_empty() {
            return Ok(0);
        }

        self.enrich(&mut nodes).await;

        let mut embeddings = Vec::with_capacity(nodes.len());
        for (chunk_index, node) in nodes.iter().enumerate() {
            let vector = self.embedder.embed(&node.text).await.map_err(|error| {
                IngestError::Embedding {
                    chunk_index,
                    message: error.to_string(),
                }
            })?;
            embeddings.push(vector);
        }

        self.store.add_nodes(collection, &nodes, &embeddings).await?;

        info!(
            collection = %collection.name,
            doc_type,
            node_count = nodes.len(),
            "ingested document"
        );

        Ok(nodes.len())
    }

    async fn enrich(&self, nodes: &mut [IndexedNode]) {
        if !self.enrichment.enabled {
            return;
        }

        let enricher = Enricher::new(self.chat.as_ref(), self.enrichment);
        let chunk_texts: Vec<String> = nodes.iter().map(|node| node.text.clone()).collect();

        let title = enricher.document_title(&chunk_texts).await;
        for node in nodes.iter_mut() {
            node.title = title.clone();
            node.questions = enricher.candidate_questions(&node.text).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, LlmError, StoreError};
    use crate::models::{Metadata, ScoredNode};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingStore {
        written: Mutex<Vec<(IndexedNode, Vec<f32>)>>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                written: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VectorCollectionStore for RecordingStore {
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
            nodes: &[IndexedNode],
            embeddings: &[Vec<f32>],
        ) -> Result<(), StoreError> {
            let mut written = self.written.lock().unwrap();
            for (node, embedding) in nodes.iter().zip(embeddings) {
                written.push((node.clone(), embedding.clone()));
            }
            Ok(())
        }

        async fn query(
            &self,
            _collection: &CollectionHandle,
            _embedding: &[f32],
            _top_k: usize,
            _doc_type: Option<&str>,
        ) -> Result<Vec<ScoredNode>, StoreError> {
            Ok(Vec::new())
        }

        async fn count(&self, _collection: &CollectionHandle) -> Result<usize, StoreError> {
            Ok(self.written.lock().unwrap().len())
        }
    }

    struct StubEmbedder {
        fail_at: Option<usize>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        fn dimensions(&self) -> usize {
            4
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let mut calls = self.calls.lock().unwrap();
            let index = *calls;
            *calls += 1;
            if self.fail_at == Some(index) {
                return Err(EmbeddingError {
                    provider: "stub".to_string(),
                    message: "backend offline".to_string(),
                });
            }
            Ok(vec![0.1, 0.2, 0.3, 0.4])
        }
    }

    struct UnreliableChat;

    #[async_trait]
    impl ChatClient for UnreliableChat {
        async fn complete(&self, _system: Option<&str>, _user: &str) -> Result<String, LlmError> {
            Err(LlmError("model unavailable".to_string()))
        }
    }

    fn fragment(text: &str) -> RawFragment {
        let metadata = match json!({"page": 1, "file_path": "/tmp/cv.pdf"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        RawFragment {
            text: text.to_string(),
            metadata,
        }
    }

    fn pipeline(
        store: Arc<RecordingStore>,
        fail_at: Option<usize>,
    ) -> IngestionPipeline {
        IngestionPipeline::new(
            store,
            Arc::new(StubEmbedder {
                fail_at,
                calls: Mutex::new(0),
            }),
            Arc::new(UnreliableChat),
            SplitterConfig {
                chunk_size: 8,
                chunk_overlap: 2,
            },
            EnrichmentConfig::default(),
        )
    }

    fn collection() -> CollectionHandle {
        CollectionHandle {
            id: "c1".to_string(),
            name: "collection_a".to_string(),
        }
    }

    #[tokio::test]
    async fn every_written_node_carries_doc_type() {
        let store = Arc::new(RecordingStore::new());
        let pipeline = pipeline(store.clone(), None);

        let count = pipeline
            .ingest(&[fragment("some resume text about model evaluation")], &collection(), "CV")
            .await
            .unwrap();

        assert_eq!(count, 1);
        let written = store.written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0.metadata["doc_type"], "CV");
        assert_eq!(written[0].0.metadata["file_name"], "cv.pdf");
    }

    #[tokio::test]
    async fn embedding_failure_names_the_chunk_and_writes_nothing() {
        let store = Arc::new(RecordingStore::new());
        let pipeline = pipeline(store.clone(), Some(1));

        let long_text = (0..40)
            .map(|index| format!("word{index}"))
            .collect::<Vec<_>>()
            .join(" ");
        let error = pipeline
            .ingest(&[fragment(&long_text)], &collection(), "CV")
            .await
            .unwrap_err();

        match error {
            IngestError::Embedding { chunk_index, .. } => assert_eq!(chunk_index, 1),
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn enrichment_failure_does_not_abort_ingestion() {
        let store = Arc::new(RecordingStore::new());
        let pipeline = pipeline(store.clone(), None);

        let count = pipeline
            .ingest(&[fragment("short text")], &collection(), "CV")
            .await
            .unwrap();

        assert_eq!(count, 1);
        let written = store.written.lock().unwrap();
        assert!(written[0].0.title.is_none());
        assert!(written[0].0.questions.is_none());
    }

    #[tokio::test]
    async fn empty_fragments_write_zero_nodes() {
        let store = Arc::new(RecordingStore::new());
        let pipeline = pipeline(store.clone(), None);

        let count = pipeline.ingest(&[], &collection(), "CV").await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn chunks_are_written_in_production_order() {
        let store = Arc::new(RecordingStore::new());
        let pipeline = pipeline(store.clone(), None);

        let long_text = (0..30)
            .map(|index| format!("tok{index}"))
            .collect::<Vec<_>>()
            .join(" ");
        pipeline
            .ingest(&[fragment(&long_text)], &collection(), "CV")
            .await
            .unwrap();

        let written = store.written.lock().unwrap();
        assert!(written.len() > 1);
        assert!(written[0].0.text.starts_with("tok0"));
        assert!(!written[1].0.text.starts_with("tok0"));
    }
}
