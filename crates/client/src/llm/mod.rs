//! Retrieval-augmented query engine.
//!
//! Retrieves the best-matching passages for a question and asks the chat
//! model to answer from them in rocky's voice.

pub mod chat;
pub mod retriever;

pub use chat::{ChatClient, ChatConfig, LlmError, Message};
pub use retriever::{DocumentIndex, Passage, ScoredPassage};

use async_trait::async_trait;
use tokio::sync::RwLock;

use rocky_core::{DocumentSnapshot, Error, QueryEngine};

const PROMPT_TEMPLATE: &str = "\
Hey! You are rocky. The new friendly, cool and helpful AI assistant for the company Rockfeather. \
Your goal is to provide accurate, informative, and friendly responses to user questions. \
Use a conversational tone and be encouraging in your responses.

Context information is below.
---------------------
{context_str}
---------------------

Given the context information and not prior knowledge, answer the question in a friendly, \
conversational manner. If you don't know the answer, just say that you don't know. \
Don't try to make up an answer.

Question: {query_str}
Friendly Answer: ";

/// Fill the prompt template with retrieved context and the question.
pub fn render_prompt(context: &[ScoredPassage], question: &str) -> String {
    let context_str = context.iter().map(|scored| scored.passage.text.as_str()).collect::<Vec<_>>().join("\n\n");
    PROMPT_TEMPLATE.replace("{context_str}", &context_str).replace("{query_str}", question)
}

/// Query engine over the current document snapshot.
pub struct RagEngine {
    chat: ChatClient,
    index: RwLock<DocumentIndex>,
    top_k: usize,
}

impl RagEngine {
    pub fn new(chat: ChatClient, snapshot: &DocumentSnapshot, top_k: usize) -> Self {
        Self { chat, index: RwLock::new(DocumentIndex::build(snapshot)), top_k: top_k.max(1) }
    }

    /// Swap in the index for a newly built snapshot.
    pub async fn replace_snapshot(&self, snapshot: &DocumentSnapshot) {
        let index = DocumentIndex::build(snapshot);
        *self.index.write().await = index;
    }

    pub async fn indexed_passages(&self) -> usize {
        self.index.read().await.len()
    }

    pub async fn retrieve(&self, question: &str) -> Vec<ScoredPassage> {
        self.index.read().await.search(question, self.top_k)
    }
}

#[async_trait]
impl QueryEngine for RagEngine {
    async fn query(&self, question: &str) -> Result<String, Error> {
        let context = self.retrieve(question).await;
        tracing::info!(passages = context.len(), model = self.chat.model(), "querying the language model");

        let prompt = render_prompt(&context, question);
        let answer = self.chat.complete(&[Message::user(prompt)]).await?;
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocky_core::Document;
    use std::time::Duration;

    fn engine() -> RagEngine {
        let chat = ChatClient::new(ChatConfig {
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            timeout: Duration::from_secs(1),
            user_agent: "rocky-test".into(),
        })
        .unwrap();
        let snapshot = DocumentSnapshot::new(vec![Document::new("a", "Coffee is free on Fridays.")]);
        RagEngine::new(chat, &snapshot, 2)
    }

    #[test]
    fn test_render_prompt() {
        let context = vec![ScoredPassage {
            passage: Passage { document_id: "a".into(), text: "Coffee is free on Fridays.".into() },
            matched_keywords: 1,
            occurrences: 1,
        }];
        let prompt = render_prompt(&context, "Is coffee free?");

        assert!(prompt.starts_with("Hey! You are rocky."));
        assert!(prompt.contains("---------------------\nCoffee is free on Fridays.\n---------------------"));
        assert!(prompt.ends_with("Question: Is coffee free?\nFriendly Answer: "));
    }

    #[tokio::test]
    async fn test_replace_snapshot() {
        let engine = engine();
        assert_eq!(engine.retrieve("coffee").await.len(), 1);

        engine.replace_snapshot(&DocumentSnapshot::default()).await;
        assert_eq!(engine.indexed_passages().await, 0);
        assert!(engine.retrieve("coffee").await.is_empty());
    }

    #[tokio::test]
    async fn test_query_without_key_fails() {
        let err = engine().query("coffee?").await.unwrap_err();
        assert!(matches!(err, Error::QueryFailed(_)));
    }
}
