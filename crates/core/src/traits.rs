use crate::error::StoreError;
use crate::models::{CollectionHandle, IndexedNode, ScoredNode};
use async_trait::async_trait;

/// Facade over the external vector database: named collections of embedded
/// nodes with exact-match metadata filtering. Implementations are safe for
/// concurrent use; the store resolves concurrent writes per collection.
#[async_trait]
pub trait VectorCollectionStore: Send + Sync {
    /// Resolve a collection by name, creating it when absent.
    async fn get_or_create_collection(&self, name: &str)
        -> Result<CollectionHandle, StoreError>;

    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    /// Delete by name. Absent collections are
    /// [`StoreError::CollectionNotFound`].
    async fn delete_collection(&self, name: &str) -> Result<(), StoreError>;

    /// Append nodes with their embeddings, in order. Existing nodes are never
    /// touched.
    async fn add_nodes(
        &self,
        collection: &CollectionHandle,
        nodes: &[IndexedNode],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError>;

    /// Top-k nodes by similarity to `embedding`, optionally restricted to an
    /// exact `doc_type` match. A collection with no matching nodes yields an
    /// empty result, not an error.
    async fn query(
        &self,
        collection: &CollectionHandle,
        embedding: &[f32],
        top_k: usize,
        doc_type: Option<&str>,
    ) -> Result<Vec<ScoredNode>, StoreError>;

    async fn count(&self, collection: &CollectionHandle) -> Result<usize, StoreError>;
}
