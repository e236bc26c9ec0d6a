//! The assembled assistant: document source, index builder, answer cache
//! and query engine wired from one [`AppConfig`].

use std::collections::BTreeMap;
use std::sync::Arc;

use rocky_core::{
    AnswerCache, AppConfig, BuildOutcome, CacheScope, DocumentSnapshot, DocumentSource, Error, FreshnessPolicy,
    IndexBuilder, Namespace, NamespaceStats, PersistentCache, RetryingFetcher,
};

use crate::llm::{ChatClient, ChatConfig, RagEngine};
use crate::notion::{NotionClient, NotionConfig};
use crate::pages::resolve_source_ids;

pub struct Assistant {
    cache: PersistentCache,
    builder: IndexBuilder,
    answers: AnswerCache,
    engine: RagEngine,
}

impl Assistant {
    /// Open the cache, resolve source ids and build (or load) the index.
    pub async fn open(config: &AppConfig, force_reload: bool) -> Result<Self, Error> {
        let cache = PersistentCache::open(&config.db_path, config.collection.clone()).await?;
        let source_ids = resolve_source_ids(config).await?;
        let source = NotionClient::new(NotionConfig::from(config)).map_err(|e| Error::Source(e.to_string()))?;
        let chat = ChatClient::new(ChatConfig::from(config))?;

        Self::from_parts(config, cache, Arc::new(source), chat, source_ids, force_reload).await
    }

    /// Assemble from explicit parts.
    pub async fn from_parts(
        config: &AppConfig, cache: PersistentCache, source: Arc<dyn DocumentSource>, chat: ChatClient,
        source_ids: Vec<String>, force_reload: bool,
    ) -> Result<Self, Error> {
        let fetcher = RetryingFetcher::new(source, config.retry_policy()?).with_concurrency(config.fetch_concurrency);
        let policy = FreshnessPolicy::new(config.cache_expiration());
        let builder = IndexBuilder::new(cache.clone(), fetcher, policy, source_ids);
        let answers = AnswerCache::new(cache.clone()).with_ttl(config.answer_ttl());

        let snapshot = builder.current_documents(force_reload).await;
        let engine = RagEngine::new(chat, &snapshot, config.top_k);
        tracing::info!(
            documents = snapshot.len(),
            passages = engine.indexed_passages().await,
            "assistant ready"
        );

        Ok(Self { cache, builder, answers, engine })
    }

    pub fn cache(&self) -> &PersistentCache {
        &self.cache
    }

    pub fn source_ids(&self) -> &[String] {
        self.builder.source_ids()
    }

    /// Answer a question, serving memoized answers when available.
    ///
    /// Query failures come back as an apology string, not an error.
    pub async fn ask(&self, question: &str) -> Result<String, Error> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question must not be empty".into()));
        }

        let outcome = self.builder.build(false, chrono::Utc::now()).await;
        if outcome.rebuilt() {
            self.engine.replace_snapshot(&outcome.snapshot).await;
        }

        Ok(self.answers.ask_engine(question, &self.engine).await)
    }

    /// Current snapshot, rebuilt only when stale.
    pub async fn documents(&self) -> DocumentSnapshot {
        self.builder.current_documents(false).await
    }

    /// Force a rebuild from the remote source.
    pub async fn reload(&self) -> BuildOutcome {
        let outcome = self.builder.build(true, chrono::Utc::now()).await;
        self.engine.replace_snapshot(&outcome.snapshot).await;
        outcome
    }

    pub async fn clear_cache(&self, scope: CacheScope) -> bool {
        self.answers.clear(scope).await
    }

    pub async fn cache_stats(&self, scope: CacheScope) -> Result<Vec<NamespaceStats>, Error> {
        self.cache.stats(scope).await
    }

    /// Raw entries of every namespace in `scope`.
    pub async fn cache_entries(&self, scope: CacheScope) -> BTreeMap<Namespace, BTreeMap<String, String>> {
        let mut entries = BTreeMap::new();
        for namespace in scope.namespaces() {
            entries.insert(*namespace, self.cache.load(*namespace).await);
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rocky_core::answers::is_apology;
    use rocky_core::{Document, SourceError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct StaticSource {
        calls: AtomicU32,
    }

    #[async_trait]
    impl DocumentSource for StaticSource {
        async fn fetch(&self, id: &str) -> Result<Vec<Document>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Document::new(id, format!("Page {id} says coffee is free."))])
        }
    }

    fn chat() -> ChatClient {
        ChatClient::new(ChatConfig {
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            timeout: Duration::from_secs(1),
            user_agent: "rocky-test".into(),
        })
        .unwrap()
    }

    async fn assistant(source: Arc<StaticSource>) -> Assistant {
        let config = AppConfig { max_retries: 1, retry_delay_ms: 0, ..Default::default() };
        let cache = PersistentCache::open_in_memory("rocky").await.unwrap();
        Assistant::from_parts(&config, cache, source, chat(), vec!["a".into(), "b".into()], false).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_builds_then_reuses_snapshot() {
        let source = Arc::new(StaticSource::default());
        let assistant = assistant(source.clone()).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        let _ = assistant.ask("is coffee free?").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected() {
        let assistant = assistant(Arc::new(StaticSource::default())).await;
        assert!(matches!(assistant.ask("   ").await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_query_failure_returns_apology_and_is_not_cached() {
        let assistant = assistant(Arc::new(StaticSource::default())).await;

        let answer = assistant.ask("is coffee free?").await.unwrap();
        assert!(is_apology(&answer));
        assert!(assistant.cache().load(Namespace::Responses).await.is_empty());
    }

    #[tokio::test]
    async fn test_reload_forces_fetch() {
        let source = Arc::new(StaticSource::default());
        let assistant = assistant(source.clone()).await;

        let outcome = assistant.reload().await;
        assert!(outcome.rebuilt());
        assert_eq!(outcome.snapshot.len(), 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_ask_and_reload_run_on_spawned_tasks() {
        let source = Arc::new(StaticSource::default());
        let assistant = Arc::new(assistant(source.clone()).await);

        let asking = Arc::clone(&assistant);
        let answer = tokio::spawn(async move { asking.ask("is coffee free?").await }).await.unwrap().unwrap();
        assert!(is_apology(&answer));

        let reloading = Arc::clone(&assistant);
        let outcome = tokio::spawn(async move { reloading.reload().await }).await.unwrap();
        assert!(outcome.rebuilt());
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_cache_entries_and_clear() {
        let assistant = assistant(Arc::new(StaticSource::default())).await;

        let entries = assistant.cache_entries(CacheScope::Embedding).await;
        assert!(entries[&Namespace::Freshness].contains_key("descriptor"));
        assert!(entries[&Namespace::Documents].contains_key("snapshot"));

        assert!(assistant.clear_cache(CacheScope::Embedding).await);
        let stats = assistant.cache_stats(CacheScope::Embedding).await.unwrap();
        assert!(stats.iter().all(|s| s.entries == 0));
    }
}
