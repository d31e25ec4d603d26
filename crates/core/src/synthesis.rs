use crate::error::QueryError;
use crate::llm::ChatClient;
use crate::models::ResponseMode;
use tracing::debug;

/// Character budget one packed prompt may spend on context.
pub const DEFAULT_CONTEXT_BUDGET_CHARS: usize = 16_000;

const ANSWER_SEPARATOR: &str = "\n---------------------\n";

fn qa_prompt(context: &str, question: &str) -> String {
    format!(
        "Context information is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {question}\n\
         Answer: "
    )
}

fn refine_prompt(question: &str, existing_answer: &str, context: &str) -> String {
    format!(
        "The original query is as follows: {question}\n\
         We have provided an existing answer: {existing_answer}\n\
         We have the opportunity to refine the existing answer (only if needed) with \
         some more context below.\n\
         ------------\n\
         {context}\n\
         ------------\n\
         Given the new context, refine the original answer to better answer the query. \
         If the context isn't useful, return the original answer.\n\
         Refined Answer: "
    )
}

fn summary_prompt(context: &str, question: &str) -> String {
    format!(
        "Context information from multiple sources is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Given the information from multiple sources and not prior knowledge, answer \
         the query.\n\
         Query: {question}\n\
         Answer: "
    )
}

/// Turns retrieved chunk texts into a final answer according to a
/// [`ResponseMode`].
pub struct ResponseSynthesizer<'a> {
    chat: &'a dyn ChatClient,
    context_budget_chars: usize,
}

impl<'a> ResponseSynthesizer<'a> {
    pub fn new(chat: &'a dyn ChatClient, context_budget_chars: usize) -> Self {
        Self {
            chat,
            context_budget_chars,
        }
    }

    pub async fn synthesize(
        &self,
        question: &str,
        contexts: &[String],
        mode: ResponseMode,
    ) -> Result<String, QueryError> {
        if contexts.is_empty() && mode != ResponseMode::Generation {
            return Ok(String::new());
        }

        debug!(mode = mode.value(), context_count = contexts.len(), "synthesizing");

        match mode {
            ResponseMode::Refine => self.refine_over(question, contexts).await,
            ResponseMode::Compact => {
                let packed = self.pack(contexts);
                self.refine_over(question, &packed).await
            }
            ResponseMode::SimpleSummarize => {
                let merged = contexts.join("\n\n");
                if merged.len() > self.context_budget_chars {
                    return Err(QueryError::ContextOverflow {
                        length: merged.len(),
                        budget: self.context_budget_chars,
                    });
                }
                Ok(self.chat.complete(None, &qa_prompt(&merged, question)).await?)
            }
            ResponseMode::TreeSummarize => self.tree_summarize(question, contexts).await,
            ResponseMode::Generation => Ok(self.chat.complete(None, question).await?),
            ResponseMode::NoText => Ok(String::new()),
            ResponseMode::ContextOnly => Ok(contexts.join("\n\n")),
            ResponseMode::Accumulate => self.accumulate(question, contexts).await,
            ResponseMode::CompactAccumulate => {
                let packed = self.pack(contexts);
                self.accumulate(question, &packed).await
            }
        }
    }

    /// Greedily pack contexts into as few prompts as fit the budget.
    fn pack(&self, contexts: &[String]) -> Vec<String> {
        let mut packed = Vec::new();
        let mut current = String::new();

        for context in contexts {
            if current.is_empty() {
                current = context.clone();
                continue;
            }
            if current.len() + context.len() + 2 <= self.context_budget_chars {
                current.push_str("\n\n");
                current.push_str(context);
            } else {
                packed.push(std::mem::take(&mut current));
                current = context.clone();
            }
        }

        if !current.is_empty() {
            packed.push(current);
        }

        packed
    }

    /// First context seeds the answer; each following context refines it.
    async fn refine_over(
        &self,
        question: &str,
        contexts: &[String],
    ) -> Result<String, QueryError> {
        let mut answer = String::new();

        for (index, context) in contexts.iter().enumerate() {
            let prompt = if index == 0 {
                qa_prompt(context, question)
            } else {
                refine_prompt(question, &answer, context)
            };
            answer = self.chat.complete(None, &prompt).await?;
        }

        Ok(answer)
    }

    /// One answer per context, concatenated in retrieval order.
    async fn accumulate(
        &self,
        question: &str,
        contexts: &[String],
    ) -> Result<String, QueryError> {
        let mut answers = Vec::with_capacity(contexts.len());
        for context in contexts {
            answers.push(self.chat.complete(None, &qa_prompt(context, question)).await?);
        }
        Ok(answers.join(ANSWER_SEPARATOR))
    }

    /// Bottom-up: summarize packed groups layer by layer until one root
    /// answer remains.
    async fn tree_summarize(
        &self,
        question: &str,
        contexts: &[String],
    ) -> Result<String, QueryError> {
        let mut layer = contexts.to_vec();

        loop {
            let groups = self.pack(&layer);
            let mut next = Vec::with_capacity(groups.len());
            for group in &groups {
                next.push(
                    self.chat
                        .complete(None, &summary_prompt(group, question))
                        .await?,
                );
            }
            if next.len() <= 1 {
                return Ok(next.pop().unwrap_or_default());
            }
            layer = next;
        }
    }
}
