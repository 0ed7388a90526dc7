// Offline knowledge-base build pipeline
// folder -> documents -> chunks -> throttled embeddings -> KnowledgeBase file

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::sources::{DocumentExtractor, PlainTextExtractor, SourceDocument, discover_documents};
use super::{Chunk, KnowledgeBase, KnowledgeBaseMetadata};
use crate::embeddings::{ChunkingConfig, EmbeddingClient, chunk_text};
use crate::language::Language;
use crate::{RagError, Result};

/// Outcome of a build, including everything that was skipped along the way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub documents_read: usize,
    pub documents_skipped: usize,
    pub chunks_embedded: usize,
    pub chunks_failed: usize,
    pub output_path: Option<PathBuf>,
    pub diagnostics: Vec<String>,
}

impl BuildReport {
    fn diagnose(&mut self, message: String) {
        warn!("{}", message);
        self.diagnostics.push(message);
    }

    /// Whether anything was skipped
    #[inline]
    pub fn has_failures(&self) -> bool {
        self.documents_skipped > 0 || self.chunks_failed > 0
    }
}

/// Spaces out embedding requests to stay under the upstream rate limit
#[derive(Debug)]
struct Throttle {
    interval: Duration,
    last_request: Option<Instant>,
}

impl Throttle {
    const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: None,
        }
    }

    async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                sleep(self.interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

pub struct KnowledgeBaseBuilder {
    embedder: Arc<dyn EmbeddingClient>,
    extractors: Vec<Box<dyn DocumentExtractor>>,
    chunk_size: usize,
    chunk_overlap: usize,
    request_interval: Duration,
    show_progress: bool,
}

impl KnowledgeBaseBuilder {
    /// Builder with the plain-text extractor registered
    #[inline]
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        chunking: &ChunkingConfig,
        request_interval: Duration,
    ) -> Self {
        Self {
            embedder,
            extractors: vec![Box::new(PlainTextExtractor)],
            chunk_size: chunking.chunk_size,
            chunk_overlap: chunking.chunk_overlap,
            request_interval,
            show_progress: false,
        }
    }

    /// Register an extractor for additional formats (e.g. PDF)
    #[inline]
    #[must_use]
    pub fn with_extractor(mut self, extractor: Box<dyn DocumentExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Build a knowledge base from every recognised document under `folder`
    ///
    /// Unreadable documents and chunks whose embedding fails are skipped and recorded
    /// in the report. Fails only when no chunk at all could be embedded.
    #[inline]
    pub async fn build_from_folder(
        &self,
        folder: &Path,
        language: Language,
    ) -> Result<(KnowledgeBase, BuildReport)> {
        let mut report = BuildReport::default();

        let documents = discover_documents(folder).await.map_err(|e| {
            RagError::Build(format!("Cannot read source folder {}: {}", folder.display(), e))
        })?;
        info!(
            "Building knowledge base from {} ({} documents)",
            folder.display(),
            documents.len()
        );

        let mut pending_chunks = Vec::new();
        for document in &documents {
            match self.extract(document).await {
                Ok(text) => {
                    let chunks = chunk_text(&text, language, self.chunk_size, self.chunk_overlap);
                    debug!(
                        "{} produced {} chunks",
                        document.path.display(),
                        chunks.len()
                    );
                    report.documents_read += 1;
                    pending_chunks.extend(chunks);
                }
                Err(message) => {
                    report.documents_skipped += 1;
                    report.diagnose(message);
                }
            }
        }

        let chunks = self.embed_chunks(pending_chunks, &mut report).await;

        if chunks.is_empty() {
            let mut message = format!("No chunks could be embedded from {}", folder.display());
            if !report.diagnostics.is_empty() {
                message.push_str(": ");
                message.push_str(&report.diagnostics.join("; "));
            }
            return Err(RagError::Build(message));
        }

        let knowledge_base = KnowledgeBase::build(
            chunks,
            KnowledgeBaseMetadata {
                model_name: self.embedder.model_name().to_string(),
                language,
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
                created_at: Utc::now(),
            },
        );

        info!(
            "Embedded {} chunks ({} failed, {} documents skipped)",
            report.chunks_embedded, report.chunks_failed, report.documents_skipped
        );
        Ok((knowledge_base, report))
    }

    /// Build and write the result to `output`
    #[inline]
    pub async fn build_to_file(
        &self,
        folder: &Path,
        language: Language,
        output: &Path,
    ) -> Result<BuildReport> {
        let (knowledge_base, mut report) = self.build_from_folder(folder, language).await?;
        knowledge_base.save(output).await?;
        report.output_path = Some(output.to_path_buf());
        Ok(report)
    }

    async fn extract(&self, document: &SourceDocument) -> std::result::Result<String, String> {
        let Some(extractor) = self.extractors.iter().find(|e| e.supports(document.kind)) else {
            return Err(format!(
                "Skipped {}: no extractor registered for {:?} documents",
                document.path.display(),
                document.kind
            ));
        };

        extractor
            .extract(&document.path)
            .await
            .map_err(|e| format!("Skipped {}: {}", document.path.display(), e))
    }

    async fn embed_chunks(&self, texts: Vec<String>, report: &mut BuildReport) -> Vec<Chunk> {
        let progress = if self.show_progress && console::user_attended_stderr() {
            ProgressBar::new(texts.len() as u64).with_style(
                ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding chunks {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut throttle = Throttle::new(self.request_interval);
        let mut chunks = Vec::with_capacity(texts.len());
        let mut dimension = None;

        for (index, text) in texts.into_iter().enumerate() {
            throttle.wait().await;

            match self.embedder.embed(&text).await {
                Ok(embedding) => {
                    let expected = *dimension.get_or_insert(embedding.len());
                    if embedding.len() == expected {
                        chunks.push(Chunk { text, embedding });
                        report.chunks_embedded += 1;
                    } else {
                        report.chunks_failed += 1;
                        report.diagnose(format!(
                            "Chunk {} skipped: embedding has {} dimensions, expected {}",
                            index,
                            embedding.len(),
                            expected
                        ));
                    }
                }
                Err(e) => {
                    report.chunks_failed += 1;
                    report.diagnose(format!("Chunk {} skipped: {}", index, e));
                }
            }
            progress.inc(1);
        }

        progress.finish_and_clear();
        chunks
    }
}
