use super::*;
use crate::language::Language;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.service.protocol, "https");
    assert_eq!(config.service.host, "api.openai.com");
    assert_eq!(config.service.port, 443);
    assert_eq!(config.service.api_key_env, "OPENAI_API_KEY");
    assert_eq!(config.service.retry_attempts, 1);
    assert_eq!(config.embedding.model, "text-embedding-3-small");
    assert_eq!(config.embedding.embedding_dimension, 1536);
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.chunking.chunk_overlap, 50);
    assert_eq!(config.chunking.language, Language::Ja);
    assert_eq!(config.builder.request_interval_ms, 1100);
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.service.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.service.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.service.retry_attempts = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.embedding_dimension = 32;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.completion.temperature = 2.5;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.chunking.chunk_size = 10;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.builder.request_interval_ms = 120_000;
    assert!(invalid_config.validate().is_err());
}

#[test]
fn overlap_above_chunk_size_is_valid() {
    let mut config = Config::default();
    config.chunking.chunk_size = 100;
    config.chunking.chunk_overlap = 200;
    assert!(config.validate().is_ok());
}

#[test]
fn service_url_generation() {
    let mut config = Config::default();
    config.service.protocol = "http".to_string();
    config.service.host = "localhost".to_string();
    config.service.port = 11434;
    let url = config
        .service_url()
        .expect("should generate service_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_section_defaults() {
    let toml_str = r#"
        [service]
        host = "llm.internal"

        [chunking]
        language = "en"
    "#;
    let config: Config = toml::from_str(toml_str).expect("should parse partial toml");
    assert_eq!(config.service.host, "llm.internal");
    assert_eq!(config.service.protocol, "https");
    assert_eq!(config.chunking.language, Language::En);
    assert_eq!(config.chunking.chunk_size, 500);
    assert_eq!(config.builder, BuilderConfig::default());
}

#[test]
fn setter_validation() {
    let mut service = ServiceConfig::default();

    assert!(service.set_protocol("http".to_string()).is_ok());
    assert!(service.set_host("example.com".to_string()).is_ok());
    assert!(service.set_port(8080).is_ok());
    assert!(service.set_timeout_secs(60).is_ok());

    assert!(service.set_protocol("ftp".to_string()).is_err());
    assert!(service.set_port(0).is_err());
    assert!(service.set_timeout_secs(0).is_err());

    let mut embedding = EmbeddingConfig::default();
    assert!(embedding.set_model("nomic-embed-text".to_string()).is_ok());
    assert!(embedding.set_model("  ".to_string()).is_err());
    assert!(embedding.set_embedding_dimension(768).is_ok());
    assert!(embedding.set_embedding_dimension(8192).is_err());
}

#[test]
fn load_missing_config_uses_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load_from(temp_dir.path()).expect("should load defaults");
    assert_eq!(config.service, ServiceConfig::default());
    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert_eq!(
        config.knowledge_bases_dir(),
        temp_dir.path().join("knowledge_bases")
    );
    assert_eq!(config.sources_dir(), temp_dir.path().join("sources"));
}

#[test]
fn save_then_load_round_trips() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().join("nested"),
        ..Config::default()
    };
    config.completion.model = "local-model".to_string();
    config.builder.request_interval_ms = 250;

    config.save().expect("should save config");
    let loaded = Config::load_from(temp_dir.path().join("nested")).expect("should load config");
    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[service]\nport = 0\n",
    )
    .expect("should write config");

    assert!(Config::load_from(temp_dir.path()).is_err());
}
