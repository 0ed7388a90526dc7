// Knowledge base module
// A knowledge base is a flat, pre-embedded list of chunks persisted as one JSON file

pub mod builder;
pub mod manager;
pub mod sources;
pub mod store;


use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::{IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::fs;
use tracing::{debug, info};

use crate::language::Language;
use crate::{RagError, Result};

pub use builder::{BuildReport, KnowledgeBaseBuilder};
pub use manager::{KnowledgeBaseInfo, KnowledgeBaseManager, KnowledgeBaseSummary};
pub use sources::{
    DocumentExtractor, DocumentKind, PlainTextExtractor, SourceDocument, SourceFolder,
    discover_documents, list_source_folders,
};
pub use store::{KnowledgeStore, LoadedKnowledgeBase};

/// A span of source text paired with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Build-time settings recorded alongside the chunks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseMetadata {
    pub model_name: String,
    pub language: Language,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeStats {
    pub total_chunks: usize,
    pub avg_chunk_length: f64,
}

impl KnowledgeStats {
    /// Average length is measured in chars
    #[inline]
    pub fn compute(chunks: &[Chunk]) -> Self {
        let total_chunks = chunks.len();
        let total_chars: usize = chunks.iter().map(|c| c.text.chars().count()).sum();
        let avg_chunk_length = if total_chunks == 0 {
            0.0
        } else {
            total_chars as f64 / total_chunks as f64
        };

        Self {
            total_chunks,
            avg_chunk_length,
        }
    }
}

/// In-memory knowledge base
///
/// Chunks are immutable after construction and every embedding shares one dimension.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "KnowledgeBaseFile<Vec<Chunk>>")]
pub struct KnowledgeBase {
    pub metadata: KnowledgeBaseMetadata,
    chunks: Vec<Chunk>,
    stats: KnowledgeStats,
}

/// On-disk layout: metadata keys sit at the top level beside `chunks` and `stats`.
///
/// Generic over the chunk list so a catalog scan can count chunks without
/// materializing their embeddings.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "C: Deserialize<'de> + Default"))]
pub(crate) struct KnowledgeBaseFile<C> {
    model_name: String,
    language: Language,
    chunk_size: usize,
    chunk_overlap: usize,
    created_at: DateTime<Utc>,
    #[serde(default)]
    pub(crate) chunks: C,
}

impl<C> KnowledgeBaseFile<C> {
    pub(crate) fn metadata(&self) -> KnowledgeBaseMetadata {
        KnowledgeBaseMetadata {
            model_name: self.model_name.clone(),
            language: self.language,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            created_at: self.created_at,
        }
    }
}

/// Stored stats are informational, so they are recomputed rather than read
impl From<KnowledgeBaseFile<Vec<Chunk>>> for KnowledgeBase {
    #[inline]
    fn from(file: KnowledgeBaseFile<Vec<Chunk>>) -> Self {
        let metadata = KnowledgeBaseMetadata {
            model_name: file.model_name,
            language: file.language,
            chunk_size: file.chunk_size,
            chunk_overlap: file.chunk_overlap,
            created_at: file.created_at,
        };
        Self::build(file.chunks, metadata)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KnowledgeBaseFileRef<'a> {
    model_name: &'a str,
    language: Language,
    chunk_size: usize,
    chunk_overlap: usize,
    created_at: &'a DateTime<Utc>,
    chunks: &'a [Chunk],
    stats: &'a KnowledgeStats,
}

impl Serialize for KnowledgeBase {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        KnowledgeBaseFileRef {
            model_name: &self.metadata.model_name,
            language: self.metadata.language,
            chunk_size: self.metadata.chunk_size,
            chunk_overlap: self.metadata.chunk_overlap,
            created_at: &self.metadata.created_at,
            chunks: &self.chunks,
            stats: &self.stats,
        }
        .serialize(serializer)
    }
}

/// Number of entries in the `chunks` array, counted without decoding them
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChunkCount(pub(crate) usize);

impl<'de> Deserialize<'de> for ChunkCount {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CountVisitor;

        impl<'de> Visitor<'de> for CountVisitor {
            type Value = ChunkCount;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a sequence of chunks")
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<ChunkCount, A::Error> {
                let mut count = 0;
                while seq.next_element::<IgnoredAny>()?.is_some() {
                    count += 1;
                }
                Ok(ChunkCount(count))
            }
        }

        deserializer.deserialize_seq(CountVisitor)
    }
}

impl KnowledgeBase {
    /// Assemble a knowledge base, computing its stats
    #[inline]
    pub fn build(chunks: Vec<Chunk>, metadata: KnowledgeBaseMetadata) -> Self {
        let stats = KnowledgeStats::compute(&chunks);
        Self {
            metadata,
            chunks,
            stats,
        }
    }

    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[inline]
    pub const fn stats(&self) -> &KnowledgeStats {
        &self.stats
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embedding dimension, or `None` for an empty knowledge base
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.chunks.first().map(|c| c.embedding.len())
    }

    /// Check that all chunks share the first chunk's dimension
    #[inline]
    pub fn validate_dimensions(&self) -> Result<()> {
        let Some(expected) = self.dimension() else {
            return Ok(());
        };

        if let Some((index, chunk)) = self
            .chunks
            .iter()
            .enumerate()
            .find(|(_, c)| c.embedding.len() != expected)
        {
            return Err(RagError::KnowledgeBaseParse(format!(
                "chunk {} has {} dimensions, expected {}",
                index,
                chunk.embedding.len(),
                expected
            )));
        }

        Ok(())
    }

    /// Write the knowledge base as a single JSON file, creating parent directories
    #[inline]
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec(self).map_err(|e| {
            RagError::Other(anyhow::anyhow!("Failed to serialize knowledge base: {}", e))
        })?;
        fs::write(path, bytes).await?;

        info!(
            "Saved knowledge base with {} chunks to {}",
            self.chunks.len(),
            path.display()
        );
        Ok(())
    }

    /// Read a knowledge base file
    ///
    /// Stored stats are ignored and recomputed from the chunks. Files whose chunks
    /// disagree on embedding dimension are rejected.
    #[inline]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RagError::KnowledgeBaseNotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let knowledge_base: Self = serde_json::from_str(&content)
            .map_err(|e| RagError::KnowledgeBaseParse(format!("{}: {}", path.display(), e)))?;

        knowledge_base.validate_dimensions()?;

        debug!(
            "Loaded knowledge base from {} ({} chunks, dimension {:?})",
            path.display(),
            knowledge_base.chunks.len(),
            knowledge_base.dimension()
        );
        Ok(knowledge_base)
    }
}
