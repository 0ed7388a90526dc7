
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ConfigError, ServiceConfig};
use crate::language::Language;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 nextword Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Service Configuration").bold().yellow());
    eprintln!("Configure the OpenAI-compatible service used for embeddings and completions.");
    eprintln!();

    configure_service(&mut config.service)?;
    configure_models(&mut config)?;
    configure_chunking(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_service_connection(&config.service) {
        eprintln!("{}", style("✓ Service connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to the service").yellow()
        );
        eprintln!("You can continue, but make sure the service is reachable before building.");
    }

    if config.service.api_key().is_none() {
        eprintln!(
            "{}",
            style(format!(
                "⚠ Environment variable {} is not set",
                config.service.api_key_env
            ))
            .yellow()
        );
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Service Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.service.host).cyan());
    eprintln!("  Port: {}", style(config.service.port).cyan());
    eprintln!(
        "  API key variable: {} ({})",
        style(&config.service.api_key_env).cyan(),
        if config.service.api_key().is_some() {
            style("set").green()
        } else {
            style("not set").red()
        }
    );
    eprintln!("  Timeout: {}s", style(config.service.timeout_secs).cyan());
    match config.service_url() {
        Ok(url) => eprintln!("  Service URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Service URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Models:").bold().yellow());
    eprintln!(
        "  Embedding: {} ({} dimensions)",
        style(&config.embedding.model).cyan(),
        config.embedding.embedding_dimension
    );
    eprintln!(
        "  Completion: {} (max {} tokens, temperature {})",
        style(&config.completion.model).cyan(),
        config.completion.max_tokens,
        config.completion.temperature
    );

    eprintln!();
    eprintln!("{}", style("Knowledge Bases:").bold().yellow());
    eprintln!(
        "  Chunking: {} chars, {} overlap, language {}",
        config.chunking.chunk_size, config.chunking.chunk_overlap, config.chunking.language
    );
    eprintln!(
        "  Embedding request interval: {}ms",
        config.builder.request_interval_ms
    );
    eprintln!(
        "  Directory: {}",
        style(config.knowledge_bases_dir().display()).cyan()
    );
    eprintln!(
        "  Sources: {}",
        style(config.sources_dir().display()).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load().or_else(|_| -> Result<Config> {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        let base_dir = Config::config_dir().context("Failed to determine config directory")?;
        Ok(Config {
            base_dir,
            ..Config::default()
        })
    })
}

fn configure_service(service: &mut ServiceConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == service.protocol)
        .unwrap_or(1);

    let protocol_index = Select::new()
        .with_prompt("Service protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Service host")
        .default(service.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = ServiceConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..ServiceConfig::default()
            };
            temp_config.validate()?;
            Ok(())
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Service port")
        .default(service.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let api_key_env: String = Input::new()
        .with_prompt("Environment variable holding the API key")
        .default(service.api_key_env.clone())
        .interact_text()?;

    let timeout_secs: u64 = Input::new()
        .with_prompt("Request timeout (seconds)")
        .default(service.timeout_secs)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if (1..=600).contains(input) {
                Ok(())
            } else {
                Err("Timeout must be between 1 and 600 seconds")
            }
        })
        .interact_text()?;

    service.set_protocol(protocol)?;
    service.set_host(host)?;
    service.set_port(port)?;
    service.set_timeout_secs(timeout_secs)?;
    service.api_key_env = api_key_env;

    Ok(())
}

fn configure_models(config: &mut Config) -> Result<()> {
    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(config.embedding.model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(config.embedding.embedding_dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 64 and 4096")
            }
        })
        .interact_text()?;

    let completion_model: String = Input::new()
        .with_prompt("Completion model")
        .default(config.completion.model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    config.embedding.set_model(embedding_model)?;
    config.embedding.set_embedding_dimension(dimension)?;
    config.completion.set_model(completion_model)?;

    Ok(())
}

fn configure_chunking(config: &mut Config) -> Result<()> {
    let languages = &[Language::Ja, Language::En];
    let default_index = languages
        .iter()
        .position(|&l| l == config.chunking.language)
        .unwrap_or(0);

    let language_index = Select::new()
        .with_prompt("Default document language")
        .default(default_index)
        .items(languages)
        .interact()?;

    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(config.chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (50..=8000).contains(input) {
                Ok(())
            } else {
                Err("Chunk size must be between 50 and 8000")
            }
        })
        .interact_text()?;

    let chunk_overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(config.chunking.chunk_overlap)
        .interact_text()?;

    config.chunking.language = languages[language_index];
    config.chunking.chunk_size = chunk_size;
    config.chunking.chunk_overlap = chunk_overlap;

    Ok(())
}

fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Model name cannot be empty")
    } else {
        Ok(())
    }
}

fn test_service_connection(service: &ServiceConfig) -> bool {
    let Ok(base_url) = service.service_url() else {
        return false;
    };
    let Ok(url) = base_url.join("/v1/models") else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(url.as_str()).call() {
        Ok(_) => true,
        // Auth failures still prove the host is reachable
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
