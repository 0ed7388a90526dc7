#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end build -> save -> load -> predict with in-process fake services

use async_trait::async_trait;
use nextword_rag::completion::{CompletionClient, CompletionRequest};
use nextword_rag::config::CompletionConfig;
use nextword_rag::embeddings::{ChunkingConfig, EmbeddingClient};
use nextword_rag::knowledge::{
    KnowledgeBase, KnowledgeBaseBuilder, KnowledgeBaseManager, KnowledgeStore,
};
use nextword_rag::language::Language;
use nextword_rag::predictor::{LlmPredictor, PredictionSource, RagPredictor};
use nextword_rag::selector::PredictionSelector;
use nextword_rag::session::PredictionSession;
use nextword_rag::{RagError, Result};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const DIMENSION: usize = 64;

/// Bag-of-characters embedding: texts sharing characters point the same way.
/// ASCII and non-ASCII land in disjoint halves, so English and Japanese are orthogonal.
struct CharacterEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingClient for CharacterEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let half = DIMENSION / 2;
        let mut vector = vec![0.0; DIMENSION];
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            let bucket = c as usize % half;
            let index = if c.is_ascii() { bucket } else { half + bucket };
            vector[index] += 1.0;
        }
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        "character-bag"
    }
}

struct RecordingCompleter {
    reply: String,
    prompts: Mutex<Vec<CompletionRequest>>,
}

impl RecordingCompleter {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<CompletionRequest> {
        self.prompts.lock().expect("lock not poisoned").clone()
    }
}

#[async_trait]
impl CompletionClient for RecordingCompleter {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.prompts
            .lock()
            .expect("lock not poisoned")
            .push(request.clone());
        Ok(self.reply.clone())
    }
}

struct Pipeline {
    _temp_dir: TempDir,
    manager: KnowledgeBaseManager,
    embedder: Arc<CharacterEmbedder>,
    rag_completer: Arc<RecordingCompleter>,
    plain_completer: Arc<RecordingCompleter>,
    selector: Arc<PredictionSelector>,
}

fn write_sources(root: &Path) {
    let medical = root.join("sources").join("medical");
    std::fs::create_dir_all(&medical).expect("create sources");
    let fees = "診療報酬は医療行為の対価です。初診料は基本診療料に含まれます。\n\
                点数表は二年ごとに改定されます。";
    std::fs::write(medical.join("fees.txt"), fees).expect("write source");
    std::fs::write(medical.join("notes.md"), "再診料の算定には条件があります。")
        .expect("write source");
    std::fs::write(medical.join("scan.pdf"), "%PDF-1.7").expect("write source");
}

fn pipeline(rag_reply: &str, plain_reply: &str) -> Pipeline {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    write_sources(temp_dir.path());

    let store = KnowledgeStore::new();
    let manager = KnowledgeBaseManager::new(
        temp_dir.path().join("knowledge_bases"),
        temp_dir.path().join("sources"),
        store.clone(),
    );

    let embedder = Arc::new(CharacterEmbedder {
        calls: AtomicUsize::new(0),
    });
    let rag_completer = RecordingCompleter::new(rag_reply);
    let plain_completer = RecordingCompleter::new(plain_reply);

    let rag = RagPredictor::new(
        Arc::clone(&embedder) as Arc<dyn EmbeddingClient>,
        Arc::clone(&rag_completer) as Arc<dyn CompletionClient>,
        store,
    );
    let plain = LlmPredictor::new(
        Arc::clone(&plain_completer) as Arc<dyn CompletionClient>,
        &CompletionConfig::default(),
    );

    Pipeline {
        _temp_dir: temp_dir,
        manager,
        embedder,
        rag_completer,
        plain_completer,
        selector: Arc::new(PredictionSelector::new(rag, Arc::new(plain))),
    }
}

async fn build_medical(p: &Pipeline) {
    let builder = KnowledgeBaseBuilder::new(
        Arc::clone(&p.embedder) as Arc<dyn EmbeddingClient>,
        &ChunkingConfig {
            chunk_size: 40,
            chunk_overlap: 10,
            language: Language::Ja,
        },
        Duration::ZERO,
    );
    let report = p
        .manager
        .build_new(&builder, Path::new("medical"), "medical", Language::Ja)
        .await
        .expect("build succeeds");

    assert_eq!(report.documents_read, 2);
    assert_eq!(report.documents_skipped, 1);
    assert!(report.chunks_embedded >= 2);
    assert_eq!(report.chunks_failed, 0);
}

#[tokio::test]
async fn built_knowledge_base_grounds_predictions() {
    let p = pipeline("点数 です", r#"{"word": "unused"}"#);
    build_medical(&p).await;

    let info = p.manager.load_by_name("medical").await.expect("load succeeds");
    assert_eq!(info.metadata.model_name, "character-bag");
    assert_eq!(info.dimension, Some(DIMENSION));

    let outcome = p.selector.select("診療報酬の点数表は", "", Language::Ja).await;

    assert_eq!(outcome.source, PredictionSource::Rag);
    assert_eq!(outcome.word.as_deref(), Some("点数"));
    assert!(outcome.confidence >= 0.3);
    assert_eq!(outcome.top_similarity, Some(outcome.confidence));
    assert!(outcome.relevant_chunk_count >= 1 && outcome.relevant_chunk_count <= 3);
    assert!(p.plain_completer.prompts().is_empty());

    let prompt = &p.rag_completer.prompts()[0];
    assert!(prompt.user_prompt.starts_with("関連知識:"));
    assert!(prompt.user_prompt.ends_with("話者の発言: 診療報酬の点数表は"));
}

#[tokio::test]
async fn unrelated_query_falls_back_to_plain_prediction() {
    let p = pipeline("unused", r#"{"word": "weekend", "confidence": 0.4, "reasoning": "plans"}"#);
    build_medical(&p).await;
    p.manager.load_by_name("medical").await.expect("load succeeds");

    let outcome = p.selector.select("see you on the", "", Language::En).await;

    assert_eq!(outcome.source, PredictionSource::Llm);
    assert_eq!(outcome.word.as_deref(), Some("weekend"));
    assert!(p.rag_completer.prompts().is_empty());
}

#[tokio::test]
async fn saved_file_round_trips_and_lists() {
    let p = pipeline("unused", "unused");
    build_medical(&p).await;

    let path = p.manager.path_for("medical").expect("valid name");
    let loaded = KnowledgeBase::load(&path).await.expect("load succeeds");
    assert_eq!(loaded.stats().total_chunks, loaded.len());
    assert_eq!(loaded.metadata.language, Language::Ja);
    assert_eq!(loaded.metadata.chunk_size, 40);

    let listed = p.manager.list_available().await.expect("list succeeds");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "medical");
    assert_eq!(listed[0].total_chunks, loaded.len());
}

#[tokio::test]
async fn session_tracks_history_across_knowledge_base_switches() {
    let p = pipeline("改定", r#"{"word": "ありがとう", "confidence": 0.5, "reasoning": "礼"}"#);
    build_medical(&p).await;

    let mut session = PredictionSession::new(Arc::clone(&p.selector), Language::Ja);

    let before = session.handle_final_utterance("こんにちは").await;
    assert_eq!(before.source, PredictionSource::Llm);
    let calls_before_load = p.embedder.calls.load(Ordering::SeqCst);

    p.manager.load_by_name("medical").await.expect("load succeeds");
    let during = session.handle_final_utterance("点数表は二年ごとに").await;
    assert_eq!(during.source, PredictionSource::Rag);
    assert_eq!(during.word.as_deref(), Some("改定"));
    assert_eq!(p.embedder.calls.load(Ordering::SeqCst), calls_before_load + 1);

    let rag_prompt = &p.rag_completer.prompts()[0];
    assert!(rag_prompt.user_prompt.contains("これまでの会話:\nこんにちは"));

    assert!(p.manager.unload().await);
    let after = session.handle_final_utterance("またね").await;
    assert_eq!(after.source, PredictionSource::Llm);
    assert_eq!(p.embedder.calls.load(Ordering::SeqCst), calls_before_load + 1);
    assert_eq!(session.history().len(), 3);
}

#[tokio::test]
async fn missing_knowledge_base_is_recoverable() {
    let p = pipeline("unused", r#"{"word": "fine"}"#);

    let error = p
        .manager
        .load_by_name("nonexistent")
        .await
        .expect_err("nothing was built");
    assert!(matches!(error, RagError::KnowledgeBaseNotFound(_)));
    assert!(error.is_recoverable());
    assert!(!p.manager.store().is_loaded().await);

    let outcome = p.selector.select("I am doing", "", Language::En).await;
    assert_eq!(outcome.source, PredictionSource::Llm);
}
