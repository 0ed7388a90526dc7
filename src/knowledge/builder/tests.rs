use super::*;
use crate::knowledge::DocumentKind;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Fails for any text containing "BROKEN", otherwise returns a length-derived vector
struct FakeEmbedder {
    calls: AtomicUsize,
}

impl FakeEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EmbeddingClient for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.contains("BROKEN") {
            return Err(RagError::EmbeddingService("quota exceeded".to_string()));
        }
        Ok(vec![text.chars().count() as f32, 1.0, 0.0])
    }

    fn model_name(&self) -> &str {
        "fake-embedding"
    }
}

struct FakePdfExtractor;

#[async_trait]
impl DocumentExtractor for FakePdfExtractor {
    fn supports(&self, kind: DocumentKind) -> bool {
        kind == DocumentKind::Pdf
    }

    async fn extract(&self, _path: &Path) -> Result<String> {
        Ok("Extracted from pdf.".to_string())
    }
}

fn chunking() -> ChunkingConfig {
    ChunkingConfig {
        chunk_size: 40,
        chunk_overlap: 0,
        language: Language::En,
    }
}

fn builder(embedder: Arc<FakeEmbedder>) -> KnowledgeBaseBuilder {
    KnowledgeBaseBuilder::new(embedder, &chunking(), Duration::ZERO)
}

#[tokio::test]
async fn builds_from_text_documents() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    std::fs::write(
        temp_dir.path().join("a.txt"),
        "Alpha beta gamma. Delta epsilon zeta. Eta theta iota.",
    )
    .expect("write");
    std::fs::write(temp_dir.path().join("b.md"), "Second document here.").expect("write");

    let embedder = FakeEmbedder::new();
    let (kb, report) = builder(Arc::clone(&embedder))
        .build_from_folder(temp_dir.path(), Language::En)
        .await
        .expect("build succeeds");

    assert_eq!(report.documents_read, 2);
    assert_eq!(report.documents_skipped, 0);
    assert_eq!(report.chunks_embedded, 3);
    assert_eq!(report.chunks_failed, 0);
    assert!(!report.has_failures());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);

    assert_eq!(kb.len(), 3);
    assert_eq!(kb.stats().total_chunks, 3);
    assert_eq!(kb.metadata.model_name, "fake-embedding");
    assert_eq!(kb.metadata.language, Language::En);
    assert_eq!(kb.metadata.chunk_size, 40);
    assert_eq!(kb.chunks()[2].text, "Second document here.");
}

#[tokio::test]
async fn failed_chunks_are_skipped() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    std::fs::write(
        temp_dir.path().join("a.txt"),
        "This one works fine.\nBROKEN sentence here.\nAnother good one.",
    )
    .expect("write");

    let (kb, report) = builder(FakeEmbedder::new())
        .build_from_folder(temp_dir.path(), Language::En)
        .await
        .expect("partial build still succeeds");

    assert_eq!(report.chunks_failed, 1);
    assert_eq!(report.chunks_embedded, kb.len());
    assert!(report.has_failures());
    assert!(kb.chunks().iter().all(|c| !c.text.contains("BROKEN")));
    assert!(report.diagnostics.iter().any(|d| d.contains("quota exceeded")));
}

#[tokio::test]
async fn unsupported_documents_are_reported() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    std::fs::write(temp_dir.path().join("a.txt"), "Plain text.").expect("write");
    std::fs::write(temp_dir.path().join("b.pdf"), "%PDF-1.4").expect("write");

    let (_, report) = builder(FakeEmbedder::new())
        .build_from_folder(temp_dir.path(), Language::En)
        .await
        .expect("build succeeds");

    assert_eq!(report.documents_read, 1);
    assert_eq!(report.documents_skipped, 1);
    assert!(report.diagnostics[0].contains("b.pdf"));
}

#[tokio::test]
async fn registered_extractor_handles_extra_formats() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    std::fs::write(temp_dir.path().join("b.pdf"), "%PDF-1.4").expect("write");

    let (kb, report) = builder(FakeEmbedder::new())
        .with_extractor(Box::new(FakePdfExtractor))
        .build_from_folder(temp_dir.path(), Language::En)
        .await
        .expect("build succeeds");

    assert_eq!(report.documents_skipped, 0);
    assert_eq!(kb.chunks()[0].text, "Extracted from pdf.");
}

#[tokio::test]
async fn build_fails_when_nothing_was_embedded() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    std::fs::write(temp_dir.path().join("a.txt"), "BROKEN entirely.").expect("write");

    let result = builder(FakeEmbedder::new())
        .build_from_folder(temp_dir.path(), Language::En)
        .await;

    match result {
        Err(RagError::Build(message)) => assert!(message.contains("quota exceeded")),
        other => panic!("expected build error, got {:?}", other.map(|(_, r)| r)),
    }
}

#[tokio::test]
async fn empty_folder_fails_the_build() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let result = builder(FakeEmbedder::new())
        .build_from_folder(temp_dir.path(), Language::Ja)
        .await;
    assert!(matches!(result, Err(RagError::Build(_))));
}

#[tokio::test]
async fn build_to_file_writes_loadable_output() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let source = temp_dir.path().join("source");
    std::fs::create_dir_all(&source).expect("create dir");
    std::fs::write(source.join("a.txt"), "今日は晴れ。明日は雨。").expect("write");
    let output = temp_dir.path().join("kb").join("weather.json");

    let report = builder(FakeEmbedder::new())
        .build_to_file(&source, Language::Ja, &output)
        .await
        .expect("build succeeds");

    assert_eq!(report.output_path.as_deref(), Some(output.as_path()));
    let kb = KnowledgeBase::load(&output).await.expect("load succeeds");
    assert_eq!(kb.chunks()[0].text, "今日は晴れ。明日は雨。");
}

#[tokio::test]
async fn throttle_spaces_requests() {
    let mut throttle = Throttle::new(Duration::from_millis(25));
    let start = Instant::now();

    throttle.wait().await;
    throttle.wait().await;
    throttle.wait().await;

    assert!(start.elapsed() >= Duration::from_millis(50));
}
