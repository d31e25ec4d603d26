use crate::llm::ChatClient;
use crate::models::EnrichmentConfig;
use tracing::warn;

const TITLE_PROMPT: &str = "Give a short descriptive title for the document these \
excerpts come from. Respond with the title only, no quotes.";

const QUESTIONS_PROMPT: &str = "List questions that the following excerpt can answer, \
one per line, nothing else.";

/// Best-effort LLM annotations for chunks about to be indexed. Every failure
/// here degrades to an omitted annotation; ingestion never aborts on
/// enrichment.
pub struct Enricher<'a> {
    chat: &'a dyn ChatClient,
    config: EnrichmentConfig,
}

impl<'a> Enricher<'a> {
    pub fn new(chat: &'a dyn ChatClient, config: EnrichmentConfig) -> Self {
        Self { chat, config }
    }

    /// One title per document, derived from a bounded sample of leading
    /// chunks rather than every chunk.
    pub async fn document_title(&self, chunk_texts: &[String]) -> Option<String> {
        if !self.config.enabled || chunk_texts.is_empty() {
            return None;
        }

        let sample = chunk_texts
            .iter()
            .take(self.config.title_sample_chunks)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n\n");

        match self.chat.complete(Some(TITLE_PROMPT), &sample).await {
            Ok(title) => {
                let title = title.trim().to_string();
                (!title.is_empty()).then_some(title)
            }
            Err(error) => {
                warn!(%error, "title extraction failed, skipping annotation");
                None
            }
        }
    }

    /// A fixed-count list of questions this chunk can answer.
    pub async fn candidate_questions(&self, chunk_text: &str) -> Option<Vec<String>> {
        if !self.config.enabled {
            return None;
        }

        let prompt = format!(
            "{QUESTIONS_PROMPT}\nGenerate exactly {} questions.\n\nExcerpt:\n{chunk_text}",
            self.config.questions_per_chunk
        );

        match self.chat.complete(None, &prompt).await {
            Ok(reply) => {
                let questions: Vec<String> = reply
                    .lines()
                    .map(|line| line.trim().trim_start_matches(['-', '*', ' ']).to_string())
                    .filter(|line| !line.is_empty())
                    .take(self.config.questions_per_chunk)
                    .collect();
                (!questions.is_empty()).then_some(questions)
            }
            Err(error) => {
                warn!(%error, "question extraction failed, skipping annotation");
                None
            }
        }
    }
}
