use clap::{Parser, Subcommand};
use nextword_rag::Result;
use nextword_rag::commands::{
    build_knowledge_base, list_knowledge_bases, list_sources, predict_once, run_session,
    search_knowledge_base, show_knowledge_base,
};
use nextword_rag::config::{run_interactive_config, show_config};
use nextword_rag::language::Language;
use nextword_rag::session::DEFAULT_HISTORY_TURNS;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nextword")]
#[command(about = "Retrieval-gated next-word prediction over domain knowledge bases")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding/completion service and chunking settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build a knowledge base from a folder of documents
    Build {
        /// Source folder, either a path or the name of a folder under the sources directory
        folder: PathBuf,
        /// Name to save the knowledge base under
        #[arg(long)]
        name: String,
        /// Document language (ja or en), defaults to the configured language
        #[arg(long)]
        language: Option<Language>,
    },
    /// List built knowledge bases
    List,
    /// List source document folders
    Sources,
    /// Show details of a knowledge base
    Info {
        /// Knowledge base name
        name: String,
    },
    /// Search a knowledge base for chunks similar to a query
    Search {
        /// Knowledge base name
        name: String,
        /// Query text
        query: String,
        /// Number of results to show
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },
    /// Predict the next word for a piece of text
    Predict {
        /// What the speaker has said so far
        text: String,
        /// Knowledge base to ground the prediction in
        #[arg(long)]
        kb: Option<String>,
        /// Previous utterances, newline separated
        #[arg(long)]
        history: Option<String>,
        #[arg(long)]
        language: Option<Language>,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive session reading one finalized utterance per line from stdin
    Session {
        /// Knowledge base to load at start
        #[arg(long)]
        kb: Option<String>,
        #[arg(long)]
        language: Option<Language>,
        /// Finalized utterances kept as conversation history
        #[arg(long, default_value_t = DEFAULT_HISTORY_TURNS)]
        history_turns: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Build {
            folder,
            name,
            language,
        } => {
            build_knowledge_base(&folder, &name, language).await?;
        }
        Commands::List => {
            list_knowledge_bases().await?;
        }
        Commands::Sources => {
            list_sources().await?;
        }
        Commands::Info { name } => {
            show_knowledge_base(&name).await?;
        }
        Commands::Search { name, query, top_k } => {
            search_knowledge_base(&name, &query, top_k).await?;
        }
        Commands::Predict {
            text,
            kb,
            history,
            language,
            json,
        } => {
            predict_once(&text, kb.as_deref(), history.as_deref(), language, json).await?;
        }
        Commands::Session {
            kb,
            language,
            history_turns,
        } => {
            run_session(kb.as_deref(), language, history_turns).await?;
        }
    }

    Ok(())
}
