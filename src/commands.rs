use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::completion::CompletionClient;
use crate::config::Config;
use crate::embeddings::EmbeddingClient;
use crate::knowledge::{
    KnowledgeBaseBuilder, KnowledgeBaseInfo, KnowledgeBaseManager, KnowledgeStore,
};
use crate::language::Language;
use crate::openai::OpenAiClient;
use crate::predictor::{LlmPredictor, PredictionOutcome, RagPredictor};
use crate::search::search;
use crate::selector::PredictionSelector;
use crate::session::PredictionSession;

fn load_config() -> Result<Config> {
    Config::load().context("Failed to load configuration")
}

fn service_client(config: &Config) -> Result<Arc<OpenAiClient>> {
    let client = OpenAiClient::new(config).context("Failed to initialize service client")?;
    if config.service.api_key().is_none() {
        warn!(
            "{} is not set, requests will be sent without an API key",
            config.service.api_key_env
        );
    }
    Ok(Arc::new(client))
}

fn prediction_selector(
    config: &Config,
    client: &Arc<OpenAiClient>,
    store: KnowledgeStore,
) -> PredictionSelector {
    let rag = RagPredictor::new(
        Arc::clone(client) as Arc<dyn EmbeddingClient>,
        Arc::clone(client) as Arc<dyn CompletionClient>,
        store,
    );
    let plain = LlmPredictor::new(
        Arc::clone(client) as Arc<dyn CompletionClient>,
        &config.completion,
    );
    PredictionSelector::new(rag, Arc::new(plain))
}

fn print_info(info: &KnowledgeBaseInfo) {
    println!("📚 {}", style(&info.name).bold());
    if let Some(path) = &info.path {
        println!("   File: {}", path.display());
    }
    println!("   Model: {}", info.metadata.model_name);
    println!("   Language: {}", info.metadata.language);
    println!(
        "   Chunking: {} chars, {} overlap",
        info.metadata.chunk_size, info.metadata.chunk_overlap
    );
    println!(
        "   Created: {}",
        info.metadata.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("   Chunks: {}", info.stats.total_chunks);
    println!(
        "   Average chunk length: {:.1} chars",
        info.stats.avg_chunk_length
    );
    match info.dimension {
        Some(dimension) => println!("   Embedding dimension: {}", dimension),
        None => println!("   Embedding dimension: (empty)"),
    }
}

fn print_outcome(outcome: &PredictionOutcome) {
    match &outcome.word {
        Some(word) => {
            println!(
                "{} {} ({}, confidence {:.2})",
                style("→").green(),
                style(word).bold(),
                outcome.source,
                outcome.confidence
            );
            if let Some(top) = outcome.top_similarity {
                println!(
                    "  top similarity {:.3}, {} relevant chunks",
                    top, outcome.relevant_chunk_count
                );
            }
        }
        None => println!(
            "{} no prediction ({})",
            style("·").dim(),
            outcome.reasoning.as_deref().unwrap_or("none")
        ),
    }
}

/// Build a knowledge base from a source folder and save it under its name
#[inline]
pub async fn build_knowledge_base(
    folder: &Path,
    name: &str,
    language: Option<Language>,
) -> Result<()> {
    let config = load_config()?;
    KnowledgeBaseManager::validate_name(name)?;
    let language = language.unwrap_or(config.chunking.language);
    let client = service_client(&config)?;

    let builder = KnowledgeBaseBuilder::new(
        Arc::clone(&client) as Arc<dyn EmbeddingClient>,
        &config.chunking,
        config.builder.request_interval(),
    )
    .with_progress(true);
    let manager = KnowledgeBaseManager::from_config(&config, KnowledgeStore::new());

    println!(
        "Building knowledge base '{}' ({}) from {}",
        name,
        language,
        manager.resolve_source(folder).display()
    );

    let report = manager
        .build_new(&builder, folder, name, language)
        .await
        .with_context(|| format!("Failed to build knowledge base '{}'", name))?;

    for diagnostic in &report.diagnostics {
        eprintln!("{} {}", style("⚠").yellow(), diagnostic);
    }

    println!("✓ Build complete");
    println!(
        "  Documents: {} read, {} skipped",
        report.documents_read, report.documents_skipped
    );
    println!(
        "  Chunks: {} embedded, {} failed",
        report.chunks_embedded, report.chunks_failed
    );
    if let Some(path) = &report.output_path {
        println!("  Saved to: {}", path.display());
    }

    Ok(())
}

/// List knowledge bases available in the configured directory
#[inline]
pub async fn list_knowledge_bases() -> Result<()> {
    let config = load_config()?;
    let manager = KnowledgeBaseManager::from_config(&config, KnowledgeStore::new());
    let summaries = manager.list_available().await?;

    if summaries.is_empty() {
        println!("No knowledge bases have been built yet.");
        println!("Use 'nextword build <folder> --name <name>' to build one.");
        return Ok(());
    }

    println!("Knowledge Bases ({} total):", summaries.len());
    println!();
    for summary in &summaries {
        println!("📚 {}", style(&summary.name).bold());
        println!(
            "   Language: {}, Model: {}",
            summary.metadata.language, summary.metadata.model_name
        );
        println!(
            "   Chunks: {}, Size: {:.1} KiB",
            summary.total_chunks,
            summary.file_size as f64 / 1024.0
        );
        println!(
            "   Created: {}",
            summary.metadata.created_at.format("%Y-%m-%d %H:%M")
        );
        println!();
    }

    Ok(())
}

/// List source document folders that can be built
#[inline]
pub async fn list_sources() -> Result<()> {
    let config = load_config()?;
    let manager = KnowledgeBaseManager::from_config(&config, KnowledgeStore::new());
    let folders = manager.list_sources().await?;

    if folders.is_empty() {
        println!(
            "No source folders found in {}",
            config.sources_dir().display()
        );
        return Ok(());
    }

    println!("Source Folders in {}:", config.sources_dir().display());
    for folder in &folders {
        println!("  📁 {} ({} documents)", folder.name, folder.document_count);
    }
    Ok(())
}

/// Show metadata and stats for one knowledge base
#[inline]
pub async fn show_knowledge_base(name: &str) -> Result<()> {
    let config = load_config()?;
    let manager = KnowledgeBaseManager::from_config(&config, KnowledgeStore::new());
    let info = manager.inspect(name).await?;
    print_info(&info);
    Ok(())
}

/// Run a similarity search against a knowledge base
#[inline]
pub async fn search_knowledge_base(name: &str, query: &str, top_k: usize) -> Result<()> {
    let config = load_config()?;
    let store = KnowledgeStore::new();
    let manager = KnowledgeBaseManager::from_config(&config, store.clone());
    manager.load_by_name(name).await?;

    let knowledge_base = store
        .current()
        .await
        .context("Knowledge base was unloaded during search")?;
    let client = service_client(&config)?;
    let query_embedding = client.embed(query).await?;
    let results = search(&knowledge_base, &query_embedding, top_k)?;

    if results.is_empty() {
        println!("No chunks in '{}'", name);
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        println!(
            "{}. [{}] {}",
            rank + 1,
            style(format!("{:.3}", result.score)).cyan(),
            result.text.replace('\n', " ")
        );
    }
    Ok(())
}

/// Predict the next word for a single piece of text
#[inline]
pub async fn predict_once(
    text: &str,
    knowledge_base: Option<&str>,
    history: Option<&str>,
    language: Option<Language>,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let language = language.unwrap_or(config.chunking.language);
    let store = KnowledgeStore::new();
    let manager = KnowledgeBaseManager::from_config(&config, store.clone());
    if let Some(name) = knowledge_base {
        manager.load_by_name(name).await?;
    }

    let client = service_client(&config)?;
    let selector = prediction_selector(&config, &client, store);
    let outcome = selector
        .select(text, history.unwrap_or_default(), language)
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

/// A line read in an interactive session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLine {
    Load(String),
    Unload,
    Info,
    Language(String),
    Quit,
    Utterance(String),
    Blank,
}

impl SessionLine {
    #[inline]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Blank;
        }
        let Some(command) = line.strip_prefix(':') else {
            return Self::Utterance(line.to_string());
        };

        let (verb, argument) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(verb, rest)| (verb, rest.trim()));
        match (verb, argument) {
            ("load", name) if !name.is_empty() => Self::Load(name.to_string()),
            ("unload", _) => Self::Unload,
            ("info", _) => Self::Info,
            ("lang" | "language", code) if !code.is_empty() => Self::Language(code.to_string()),
            ("quit" | "q" | "exit", _) => Self::Quit,
            _ => Self::Utterance(line.to_string()),
        }
    }
}

/// Read finalized utterances from stdin, one per line, predicting after each
#[inline]
pub async fn run_session(
    knowledge_base: Option<&str>,
    language: Option<Language>,
    history_turns: usize,
) -> Result<()> {
    let config = load_config()?;
    let store = KnowledgeStore::new();
    let manager = KnowledgeBaseManager::from_config(&config, store.clone());
    if let Some(name) = knowledge_base {
        let info = manager.load_by_name(name).await?;
        println!(
            "Loaded '{}' ({} chunks)",
            info.name, info.stats.total_chunks
        );
    }

    let client = service_client(&config)?;
    let selector = Arc::new(prediction_selector(&config, &client, store));
    let mut session =
        PredictionSession::new(selector, language.unwrap_or(config.chunking.language))
            .with_history_capacity(history_turns);

    eprintln!(
        "{}",
        style(
            "Type an utterance per line. \
             Commands: :load <name>, :unload, :info, :lang <ja|en>, :quit"
        )
        .dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match SessionLine::parse(&line) {
            SessionLine::Blank => {}
            SessionLine::Quit => break,
            SessionLine::Load(name) => match manager.load_by_name(&name).await {
                Ok(info) => println!(
                    "Loaded '{}' ({} chunks)",
                    info.name, info.stats.total_chunks
                ),
                Err(e) => eprintln!("{} {} (status {})", style("✗").red(), e, e.status_code()),
            },
            SessionLine::Unload => {
                if manager.unload().await {
                    println!("Knowledge base unloaded");
                } else {
                    println!("No knowledge base loaded");
                }
            }
            SessionLine::Info => match manager.current_info().await {
                Some(info) => print_info(&info),
                None => println!("No knowledge base loaded"),
            },
            SessionLine::Language(code) => match code.parse::<Language>() {
                Ok(language) => session.set_language(language),
                Err(e) => eprintln!("{} {}", style("✗").red(), e),
            },
            SessionLine::Utterance(text) => {
                let outcome = session.handle_final_utterance(&text).await;
                print_outcome(&outcome);
            }
        }
    }

    info!(
        "Session ended after {} utterances",
        session.history().len()
    );
    Ok(())
}
