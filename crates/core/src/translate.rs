use crate::error::TranslationError;
use crate::llm::ChatClient;
use crate::models::TranslationOutcome;
use std::sync::Arc;

pub const DEFAULT_TARGET_LANGUAGE: &str = "English";

const TRANSLATION_INSTRUCTION: &str = "You are a translator. Translate the user's text \
into the target language, preserving meaning, tone, and style. If the text is already \
in the target language, return it unchanged. Respond with the translated text only.";

/// Post-hoc answer translation through a chat model. Idempotent when the
/// input is already in the target language (self-detected by the model).
pub struct TranslationStage {
    chat: Arc<dyn ChatClient>,
}

impl TranslationStage {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self { chat }
    }

    /// Translate `text` into `target_language`. Upstream failures surface as
    /// [`TranslationError`]; the untranslated original is never substituted.
    pub async fn translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> Result<TranslationOutcome, TranslationError> {
        let system = format!("{TRANSLATION_INSTRUCTION}\nTarget language: {target_language}");
        let translated = self.chat.complete(Some(&system), text).await?;

        Ok(TranslationOutcome {
            original: text.to_string(),
            translated,
            target_language: target_language.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use async_trait::async_trait;

    /// Deterministic stand-in for the model's own language detection:
    /// echoes input back, as a model does for already-translated text.
    struct IdentityChat;

    #[async_trait]
    impl ChatClient for IdentityChat {
        async fn complete(&self, _system: Option<&str>, user: &str) -> Result<String, LlmError> {
            Ok(user.to_string())
        }
    }

    struct FailingChat;

    #[async_trait]
    impl ChatClient for FailingChat {
        async fn complete(&self, _system: Option<&str>, _user: &str) -> Result<String, LlmError> {
            Err(LlmError("model unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn text_already_in_target_language_passes_through() {
        let stage = TranslationStage::new(Arc::new(IdentityChat));
        let outcome = stage.translate("already English", "English").await.unwrap();

        assert_eq!(outcome.original, "already English");
        assert_eq!(outcome.translated, "already English");
        assert_eq!(outcome.target_language, "English");
    }

    #[tokio::test]
    async fn upstream_failure_is_surfaced_not_swallowed() {
        let stage = TranslationStage::new(Arc::new(FailingChat));
        let error = stage.translate("bonjour", "English").await.unwrap_err();
        assert!(matches!(error, TranslationError::Llm(_)));
    }
}
