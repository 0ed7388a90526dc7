// Configuration management module
// TOML configuration file, validation, and interactive setup

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    BuilderConfig, CompletionConfig, Config, ConfigError, EmbeddingConfig, ServiceConfig,
};
