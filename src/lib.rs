use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    #[error("Completion service error: {0}")]
    CompletionService(String),

    #[error("Knowledge base not found: {0}")]
    KnowledgeBaseNotFound(String),

    #[error("Knowledge base parse error: {0}")]
    KnowledgeBaseParse(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid knowledge base name: {0}")]
    InvalidKnowledgeBaseName(String),

    #[error("Build failed: {0}")]
    Build(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// HTTP-equivalent status for the knowledge-base management surface
    #[inline]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::KnowledgeBaseNotFound(_) => 404,
            Self::KnowledgeBaseParse(_) | Self::DimensionMismatch { .. } => 422,
            Self::InvalidKnowledgeBaseName(_) | Self::Config(_) => 400,
            Self::EmbeddingService(_) | Self::CompletionService(_) => 502,
            Self::Build(_) | Self::Io(_) | Self::Other(_) => 500,
        }
    }

    /// Whether the serving process can keep going after this error
    #[inline]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Other(_))
    }
}

pub mod commands;
pub mod completion;
pub mod config;
pub mod embeddings;
pub mod knowledge;
pub mod language;
pub mod openai;
pub mod predictor;
pub mod search;
pub mod selector;
pub mod session;

#[cfg(test)]
mod test_support;
