
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use super::KnowledgeBase;
use crate::Result;

/// The active knowledge base together with where it came from
#[derive(Debug, Clone)]
pub struct LoadedKnowledgeBase {
    pub name: String,
    pub path: Option<PathBuf>,
    pub knowledge_base: Arc<KnowledgeBase>,
}

/// Handle to the single active knowledge base of a serving process
///
/// Clones share the same slot. Loading replaces whatever was active; readers keep
/// the snapshot they took, so an in-flight prediction finishes against the old data.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeStore {
    active: Arc<RwLock<Option<LoadedKnowledgeBase>>>,
}

impl KnowledgeStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a knowledge base file and make it the active one
    #[inline]
    pub async fn load(&self, name: &str, path: impl AsRef<Path>) -> Result<LoadedKnowledgeBase> {
        let path = path.as_ref();
        let knowledge_base = KnowledgeBase::load(path).await?;

        let loaded = LoadedKnowledgeBase {
            name: name.to_string(),
            path: Some(path.to_path_buf()),
            knowledge_base: Arc::new(knowledge_base),
        };
        self.replace(loaded.clone()).await;
        Ok(loaded)
    }

    /// Activate an in-memory knowledge base
    #[inline]
    pub async fn install(&self, name: &str, knowledge_base: KnowledgeBase) -> LoadedKnowledgeBase {
        let loaded = LoadedKnowledgeBase {
            name: name.to_string(),
            path: None,
            knowledge_base: Arc::new(knowledge_base),
        };
        self.replace(loaded.clone()).await;
        loaded
    }

    async fn replace(&self, loaded: LoadedKnowledgeBase) {
        let mut active = self.active.write().await;
        if let Some(previous) = active.as_ref() {
            info!(
                "Replacing active knowledge base '{}' with '{}'",
                previous.name, loaded.name
            );
        } else {
            info!(
                "Activated knowledge base '{}' ({} chunks)",
                loaded.name,
                loaded.knowledge_base.len()
            );
        }
        *active = Some(loaded);
    }

    /// Clear the active knowledge base. Returns whether one was active.
    #[inline]
    pub async fn unload(&self) -> bool {
        let previous = self.active.write().await.take();
        if let Some(previous) = &previous {
            info!("Unloaded knowledge base '{}'", previous.name);
        }
        previous.is_some()
    }

    #[inline]
    pub async fn snapshot(&self) -> Option<LoadedKnowledgeBase> {
        self.active.read().await.clone()
    }

    #[inline]
    pub async fn current(&self) -> Option<Arc<KnowledgeBase>> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|loaded| Arc::clone(&loaded.knowledge_base))
    }

    #[inline]
    pub async fn is_loaded(&self) -> bool {
        self.active.read().await.is_some()
    }
}
