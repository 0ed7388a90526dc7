
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use super::builder::{BuildReport, KnowledgeBaseBuilder};
use super::sources::{SourceFolder, list_source_folders};
use super::store::{KnowledgeStore, LoadedKnowledgeBase};
use super::{
    ChunkCount, KnowledgeBase, KnowledgeBaseFile, KnowledgeBaseMetadata, KnowledgeStats,
};
use crate::config::Config;
use crate::language::Language;
use crate::{RagError, Result};

const KNOWLEDGE_BASE_EXTENSION: &str = "json";

/// Listing entry, read from a file's metadata without loading it
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeBaseSummary {
    pub name: String,
    pub path: PathBuf,
    pub metadata: KnowledgeBaseMetadata,
    pub total_chunks: usize,
    pub file_size: u64,
}

/// Description of a loaded (or inspected) knowledge base
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeBaseInfo {
    pub name: String,
    pub path: Option<PathBuf>,
    pub metadata: KnowledgeBaseMetadata,
    pub stats: KnowledgeStats,
    pub dimension: Option<usize>,
}

impl KnowledgeBaseInfo {
    fn describe(name: &str, path: Option<PathBuf>, knowledge_base: &KnowledgeBase) -> Self {
        Self {
            name: name.to_string(),
            path,
            metadata: knowledge_base.metadata.clone(),
            stats: knowledge_base.stats().clone(),
            dimension: knowledge_base.dimension(),
        }
    }
}

impl From<&LoadedKnowledgeBase> for KnowledgeBaseInfo {
    #[inline]
    fn from(loaded: &LoadedKnowledgeBase) -> Self {
        Self::describe(&loaded.name, loaded.path.clone(), &loaded.knowledge_base)
    }
}

/// Catalog view of a file: metadata plus a chunk count, embeddings skipped
type KnowledgeBaseHeader = KnowledgeBaseFile<ChunkCount>;

/// Named knowledge bases on disk plus the process's active one
#[derive(Debug, Clone)]
pub struct KnowledgeBaseManager {
    directory: PathBuf,
    sources_directory: PathBuf,
    store: KnowledgeStore,
}

impl KnowledgeBaseManager {
    #[inline]
    pub fn new(
        directory: impl Into<PathBuf>,
        sources_directory: impl Into<PathBuf>,
        store: KnowledgeStore,
    ) -> Self {
        Self {
            directory: directory.into(),
            sources_directory: sources_directory.into(),
            store,
        }
    }

    #[inline]
    pub fn from_config(config: &Config, store: KnowledgeStore) -> Self {
        Self::new(config.knowledge_bases_dir(), config.sources_dir(), store)
    }

    #[inline]
    pub const fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Names map directly to file names, so separators and leading dots are refused
    #[inline]
    pub fn validate_name(name: &str) -> Result<()> {
        let invalid = name.trim().is_empty()
            || name != name.trim()
            || name.starts_with('.')
            || name.contains(['/', '\\', '\0']);

        if invalid {
            return Err(RagError::InvalidKnowledgeBaseName(name.to_string()));
        }
        Ok(())
    }

    #[inline]
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        Self::validate_name(name)?;
        Ok(self
            .directory
            .join(format!("{}.{}", name, KNOWLEDGE_BASE_EXTENSION)))
    }

    /// Scan the knowledge-base directory, skipping files that fail to parse
    #[inline]
    pub async fn list_available(&self) -> Result<Vec<KnowledgeBaseSummary>> {
        if !fs::try_exists(&self.directory).await? {
            debug!(
                "Knowledge base directory {} does not exist",
                self.directory.display()
            );
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        let mut entries = fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(KNOWLEDGE_BASE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                continue;
            };

            match Self::read_header(&path).await {
                Ok((header, file_size)) => summaries.push(KnowledgeBaseSummary {
                    name,
                    path,
                    metadata: header.metadata(),
                    total_chunks: header.chunks.0,
                    file_size,
                }),
                Err(e) => warn!("Skipping knowledge base file {}: {}", path.display(), e),
            }
        }

        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    async fn read_header(path: &Path) -> Result<(KnowledgeBaseHeader, u64)> {
        let content = fs::read_to_string(path).await?;
        let header: KnowledgeBaseHeader = serde_json::from_str(&content)
            .map_err(|e| RagError::KnowledgeBaseParse(format!("{}: {}", path.display(), e)))?;
        Ok((header, content.len() as u64))
    }

    /// Load `<name>.json` and make it the active knowledge base
    #[inline]
    pub async fn load_by_name(&self, name: &str) -> Result<KnowledgeBaseInfo> {
        let path = self.path_for(name)?;
        let loaded = self.store.load(name, &path).await.map_err(|e| match e {
            RagError::KnowledgeBaseNotFound(_) => RagError::KnowledgeBaseNotFound(name.to_string()),
            other => other,
        })?;

        info!("Loaded knowledge base '{}'", name);
        Ok(KnowledgeBaseInfo::from(&loaded))
    }

    /// Read a knowledge base from disk without activating it
    #[inline]
    pub async fn inspect(&self, name: &str) -> Result<KnowledgeBaseInfo> {
        let path = self.path_for(name)?;
        let knowledge_base = KnowledgeBase::load(&path).await.map_err(|e| match e {
            RagError::KnowledgeBaseNotFound(_) => RagError::KnowledgeBaseNotFound(name.to_string()),
            other => other,
        })?;
        Ok(KnowledgeBaseInfo::describe(name, Some(path), &knowledge_base))
    }

    #[inline]
    pub async fn current_info(&self) -> Option<KnowledgeBaseInfo> {
        self.store
            .snapshot()
            .await
            .map(|loaded| KnowledgeBaseInfo::from(&loaded))
    }

    #[inline]
    pub async fn unload(&self) -> bool {
        self.store.unload().await
    }

    /// Source folders available for `build_new`
    #[inline]
    pub async fn list_sources(&self) -> Result<Vec<SourceFolder>> {
        list_source_folders(&self.sources_directory).await
    }

    /// A bare folder name refers to a sub-folder of the sources directory
    #[inline]
    pub fn resolve_source(&self, folder: &Path) -> PathBuf {
        if folder.is_absolute() || folder.exists() {
            folder.to_path_buf()
        } else {
            self.sources_directory.join(folder)
        }
    }

    /// Build `<name>.json` from a source folder. The active knowledge base is untouched.
    #[inline]
    pub async fn build_new(
        &self,
        builder: &KnowledgeBaseBuilder,
        folder: &Path,
        name: &str,
        language: Language,
    ) -> Result<BuildReport> {
        let output = self.path_for(name)?;
        let source = self.resolve_source(folder);

        if !fs::try_exists(&source).await? {
            return Err(RagError::Build(format!(
                "Source folder not found: {}",
                source.display()
            )));
        }

        info!(
            "Building knowledge base '{}' from {}",
            name,
            source.display()
        );
        builder.build_to_file(&source, language, &output).await
    }
}
