use crate::error::StoreError;
use crate::models::{CollectionHandle, IndexedNode, ScoredNode};
use crate::traits::VectorCollectionStore;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};

/// ChromaDB over its v1 REST API. One client per process, shared across
/// requests; collection writes are resolved by the server.
pub struct ChromaStore {
    endpoint: String,
    client: Client,
    auth: Option<ChromaAuth>,
}

#[derive(Debug, Clone)]
pub struct ChromaAuth {
    pub header: String,
    pub credentials: String,
}

impl ChromaStore {
    pub fn new(host: impl AsRef<str>, port: u16) -> Self {
        Self {
            endpoint: format!("http://{}:{}", host.as_ref(), port),
            client: Client::new(),
            auth: None,
        }
    }

    pub fn with_auth(mut self, header: impl Into<String>, credentials: impl Into<String>) -> Self {
        self.auth = Some(ChromaAuth {
            header: header.into(),
            credentials: credentials.into(),
        });
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.endpoint, path));
        if let Some(auth) = &self.auth {
            let value = if auth.header.eq_ignore_ascii_case("authorization") {
                format!("Bearer {}", auth.credentials)
            } else {
                auth.credentials.clone()
            };
            builder = builder.header(auth.header.as_str(), value);
        }
        builder
    }

    fn backend_error(details: impl Into<String>) -> StoreError {
        StoreError::BackendResponse {
            backend: "chroma".to_string(),
            details: details.into(),
        }
    }
}

#[async_trait]
impl VectorCollectionStore for ChromaStore {
    async fn get_or_create_collection(
        &self,
        name: &str,
    ) -> Result<CollectionHandle, StoreError> {
        let response = self
            .request(Method::POST, "/api/v1/collections")
            .json(&json!({ "name": name, "get_or_create": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(response.status().to_string()));
        }

        let parsed: Value = response.json().await?;
        let id = parsed
            .pointer("/id")
            .and_then(Value::as_str)
            .ok_or_else(|| Self::backend_error("collection response missing id"))?;

        Ok(CollectionHandle {
            id: id.to_string(),
            name: name.to_string(),
        })
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let response = self
            .request(Method::GET, "/api/v1/collections")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(response.status().to_string()));
        }

        let parsed: Value = response.json().await?;
        let collections = parsed
            .as_array()
            .ok_or_else(|| Self::backend_error("collection list is not an array"))?
            .iter()
            .filter_map(|item| item.pointer("/name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        Ok(collections)
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        let response = self
            .request(Method::DELETE, &format!("/api/v1/collections/{name}"))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::CollectionNotFound(name.to_string()));
        }
        if !response.status().is_success() {
            return Err(Self::backend_error(response.status().to_string()));
        }

        Ok(())
    }

    async fn add_nodes(
        &self,
        collection: &CollectionHandle,
        nodes: &[IndexedNode],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        if nodes.len() != embeddings.len() {
            return Err(StoreError::Request(format!(
                "embedding count {} doesn't match node count {}",
                embeddings.len(),
                nodes.len()
            )));
        }
        if nodes.is_empty() {
            return Ok(());
        }

        let ids: Vec<&str> = nodes.iter().map(|node| node.node_id.as_str()).collect();
        let documents: Vec<&str> = nodes.iter().map(|node| node.text.as_str()).collect();
        let metadatas: Vec<Value> = nodes
            .iter()
            .map(|node| Value::Object(node.stored_metadata()))
            .collect();

        let response = self
            .request(
                Method::POST,
                &format!("/api/v1/collections/{}/add", collection.id),
            )
            .json(&json!({
                "ids": ids,
                "embeddings": embeddings,
                "metadatas": metadatas,
                "documents": documents,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(response.status().to_string()));
        }

        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        embedding: &[f32],
        top_k: usize,
        doc_type: Option<&str>,
    ) -> Result<Vec<ScoredNode>, StoreError> {
        let mut body = json!({
            "query_embeddings": [embedding],
            "n_results": top_k,
            "include": ["documents", "metadatas", "distances"],
        });
        if let Some(tag) = doc_type {
            body["where"] = json!({ "doc_type": tag });
        }

        let response = self
            .request(
                Method::POST,
                &format!("/api/v1/collections/{}/query", collection.id),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(response.status().to_string()));
        }

        let parsed: Value = response.json().await?;
        let ids = parsed
            .pointer("/ids/0")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut results = Vec::new();
        for (position, id) in ids.iter().enumerate() {
            let node_id = id.as_str().unwrap_or_default().to_string();
            let text = parsed
                .pointer(&format!("/documents/0/{position}"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let metadata = parsed
                .pointer(&format!("/metadatas/0/{position}"))
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let distance = parsed
                .pointer(&format!("/distances/0/{position}"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0);

            results.push(ScoredNode {
                node_id,
                text,
                metadata,
                // Chroma reports distances; flip so larger is better.
                score: 1.0 - distance,
            });
        }

        Ok(results)
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<usize, StoreError> {
        let response = self
            .request(
                Method::GET,
                &format!("/api/v1/collections/{}/count", collection.id),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error(response.status().to_string()));
        }

        let parsed: Value = response.json().await?;
        parsed
            .as_u64()
            .map(|count| count as usize)
            .ok_or_else(|| Self::backend_error("count is not a number"))
    }
}
