// Source documents for knowledge-base builds


use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    PlainText,
    Markdown,
    Tex,
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Classify a file by extension (case-insensitive)
    #[inline]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" => Some(Self::PlainText),
            "md" | "markdown" => Some(Self::Markdown),
            "tex" => Some(Self::Tex),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }
}

/// Turns a document file into raw text
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    fn supports(&self, kind: DocumentKind) -> bool;

    async fn extract(&self, path: &Path) -> Result<String>;
}

/// Reads text-based formats as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    fn supports(&self, kind: DocumentKind) -> bool {
        matches!(
            kind,
            DocumentKind::PlainText | DocumentKind::Markdown | DocumentKind::Tex
        )
    }

    async fn extract(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path).await?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub kind: DocumentKind,
}

/// A candidate build folder under the sources directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFolder {
    pub name: String,
    pub path: PathBuf,
    pub document_count: usize,
}

/// Recursively collect recognised documents under `folder`, sorted by path
#[inline]
pub async fn discover_documents(folder: &Path) -> Result<Vec<SourceDocument>> {
    let mut documents = Vec::new();
    let mut pending = vec![folder.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                pending.push(path);
            } else if let Some(kind) = DocumentKind::from_path(&path) {
                documents.push(SourceDocument { path, kind });
            } else {
                debug!("Ignoring unrecognised file {}", path.display());
            }
        }
    }

    documents.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(documents)
}

/// List the sub-folders of `root` with their document counts
///
/// A missing root yields an empty list.
#[inline]
pub async fn list_source_folders(root: &Path) -> Result<Vec<SourceFolder>> {
    if !fs::try_exists(root).await? {
        return Ok(Vec::new());
    }

    let mut folders = Vec::new();
    let mut entries = fs::read_dir(root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let document_count = discover_documents(&path).await?.len();
        folders.push(SourceFolder {
            name,
            path,
            document_count,
        });
    }

    folders.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(folders)
}
