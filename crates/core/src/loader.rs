use crate::error::LoaderError;
use crate::models::{LoaderKind, Metadata, RawFragment};
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

const CONTEXTUAL_CHUNKING_PROMPT: &str = "Split the attached PDF into contextually \
coherent chunks. Each chunk must cover one self-contained topic and stay under \
roughly 400 words. Respond with a JSON array only, no prose, where every element \
is an object with a \"text\" field (the chunk content) and a \"page\" field (the \
1-based page the chunk starts on).";

/// Settings for the LLM-guided contextual chunker.
#[derive(Debug, Clone)]
pub struct SemanticChunkerConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
}

impl SemanticChunkerConfig {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: OPENAI_CHAT_URL.to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

/// Load a PDF into raw fragments using the selected strategy.
///
/// `Structural` extracts one fragment per page deterministically. `Semantic`
/// ships the whole document to a vision model for contextual chunking; that
/// call blocks on the network, so it runs on the blocking pool rather than
/// the caller's task.
pub async fn load(
    path: &Path,
    kind: LoaderKind,
    semantic: &SemanticChunkerConfig,
) -> Result<Vec<RawFragment>, LoaderError> {
    let fragments = match kind {
        LoaderKind::Structural => load_structural(path)?,
        LoaderKind::Semantic => {
            let path = path.to_path_buf();
            let config = semantic.clone();
            tokio::task::spawn_blocking(move || load_semantic_blocking(&path, &config))
                .await
                .map_err(|error| LoaderError::Upstream(format!("chunker task failed: {error}")))??
        }
    };

    if fragments.is_empty() {
        return Err(LoaderError::EmptyDocument(path.display().to_string()));
    }

    Ok(fragments)
}

fn check_pdf_magic(path: &Path) -> Result<(), LoaderError> {
    let bytes = std::fs::read(path)?;
    if !bytes.starts_with(b"%PDF-") {
        return Err(LoaderError::UnsupportedFileKind(path.display().to_string()));
    }
    Ok(())
}

fn load_structural(path: &Path) -> Result<Vec<RawFragment>, LoaderError> {
    check_pdf_magic(path)?;

    let document =
        Document::load(path).map_err(|error| LoaderError::PdfParse(error.to_string()))?;

    let total_pages = document.get_pages().len();
    let mut fragments = Vec::new();

    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| LoaderError::PdfParse(error.to_string()))?;

        if text.trim().is_empty() {
            continue;
        }

        fragments.push(RawFragment {
            text,
            metadata: page_metadata(path, page_no as u64, total_pages as u64),
        });
    }

    Ok(fragments)
}

fn page_metadata(path: &Path, page: u64, total_pages: u64) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("page".to_string(), Value::from(page));
    metadata.insert("total_pages".to_string(), Value::from(total_pages));
    metadata.insert(
        "file_path".to_string(),
        Value::String(path.to_string_lossy().to_string()),
    );
    metadata
}

#[derive(Debug, Serialize)]
struct ChunkerRequest<'a> {
    model: &'a str,
    messages: Vec<ChunkerMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChunkerMessage<'a> {
    role: &'a str,
    content: Vec<ChunkerContent<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ChunkerContent<'a> {
    #[serde(rename = "text")]
    Text { text: &'a str },
    #[serde(rename = "file")]
    File { file: ChunkerFile<'a> },
}

#[derive(Debug, Serialize)]
struct ChunkerFile<'a> {
    filename: &'a str,
    file_data: String,
}

#[derive(Debug, Deserialize)]
struct ChunkerResponse {
    choices: Vec<ChunkerChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkerChoice {
    message: ChunkerResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChunkerResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContextualChunk {
    text: String,
    #[serde(default)]
    page: Option<u64>,
}

fn load_semantic_blocking(
    path: &PathBuf,
    config: &SemanticChunkerConfig,
) -> Result<Vec<RawFragment>, LoaderError> {
    check_pdf_magic(path)?;

    let pdf = std::fs::read(path)?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "document.pdf".to_string());

    debug!(model = %config.model, bytes = pdf.len(), "contextual chunking request");

    let request = ChunkerRequest {
        model: &config.model,
        messages: vec![ChunkerMessage {
            role: "user",
            content: vec![
                ChunkerContent::Text {
                    text: CONTEXTUAL_CHUNKING_PROMPT,
                },
                ChunkerContent::File {
                    file: ChunkerFile {
                        filename: &filename,
                        file_data: format!(
                            "data:application/pdf;base64,{}",
                            STANDARD.encode(pdf)
                        ),
                    },
                },
            ],
        }],
    };

    let response = reqwest::blocking::Client::new()
        .post(&config.endpoint)
        .bearer_auth(&config.api_key)
        .json(&request)
        .send()?;

    if !response.status().is_success() {
        return Err(LoaderError::Upstream(format!(
            "chunker endpoint returned {}",
            response.status()
        )));
    }

    let payload: ChunkerResponse = response.json()?;
    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LoaderError::Upstream("chunker response had no content".to_string()))?;

    chunks_to_fragments(&content, path)
}

fn chunks_to_fragments(content: &str, path: &Path) -> Result<Vec<RawFragment>, LoaderError> {
    let body = strip_code_fence(content);

    let chunks: Vec<ContextualChunk> = serde_json::from_str(body).map_err(|error| {
        LoaderError::Upstream(format!("chunker returned malformed JSON: {error}"))
    })?;

    let fragments = chunks
        .into_iter()
        .filter(|chunk| !chunk.text.trim().is_empty())
        .map(|chunk| {
            let mut metadata = Metadata::new();
            metadata.insert("page".to_string(), Value::from(chunk.page.unwrap_or(1)));
            metadata.insert(
                "file_path".to_string(),
                Value::String(path.to_string_lossy().to_string()),
            );
            RawFragment {
                text: chunk.text,
                metadata,
            }
        })
        .collect();

    Ok(fragments)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoaderKind;

    fn semantic_config() -> SemanticChunkerConfig {
        SemanticChunkerConfig::new("gpt-4o", "test-key")
    }

    #[tokio::test]
    async fn non_pdf_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"plain text, no pdf header").unwrap();

        let error = load(&path, LoaderKind::Structural, &semantic_config())
            .await
            .unwrap_err();
        assert!(matches!(error, LoaderError::UnsupportedFileKind(_)));
    }

    #[tokio::test]
    async fn broken_pdf_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%broken body").unwrap();

        let error = load(&path, LoaderKind::Structural, &semantic_config())
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            LoaderError::PdfParse(_) | LoaderError::EmptyDocument(_)
        ));
    }

    #[test]
    fn chunker_json_becomes_fragments_with_page_metadata() {
        let content = r#"[
            {"text": "First topic.", "page": 1},
            {"text": "Second topic.", "page": 3},
            {"text": "   ", "page": 4}
        ]"#;

        let fragments = chunks_to_fragments(content, Path::new("/tmp/x.pdf")).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].metadata["page"], 1);
        assert_eq!(fragments[1].metadata["page"], 3);
        assert_eq!(fragments[1].metadata["file_path"], "/tmp/x.pdf");
    }

    #[test]
    fn fenced_chunker_output_is_accepted() {
        let content = "```json\n[{\"text\": \"Body\", \"page\": 2}]\n```";
        let fragments = chunks_to_fragments(content, Path::new("/tmp/x.pdf")).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, "Body");
    }

    #[test]
    fn malformed_chunker_output_is_an_upstream_error() {
        let error = chunks_to_fragments("not json at all", Path::new("/tmp/x.pdf")).unwrap_err();
        assert!(matches!(error, LoaderError::Upstream(_)));
    }

    #[test]
    fn missing_page_defaults_to_one() {
        let content = r#"[{"text": "No page given"}]"#;
        let fragments = chunks_to_fragments(content, Path::new("/tmp/x.pdf")).unwrap();
        assert_eq!(fragments[0].metadata["page"], 1);
    }
}
