//! Configuration management
//!
//! This module handles loading, validation, and management of the Insight configuration.
//! Configuration is stored in TOML format at ~/.insight/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **agent**: Objective, iteration cap, inter-cycle delay, retention window
//! - **llm**: Chat-completion endpoint and sampling settings
//! - **embedding**: Embedding endpoint, model and vector dimension
//! - **knowledge**: Vector index backend (Pinecone or in-memory) and index shape
//! - **pubmed** / **mygene**: Biomedical API endpoints and result limits
//! - **execution**: Opt-in sandbox for generated code
//!
//! Credentials are never stored here; see [`crate::secrets`].
//!
//! # Examples
//!
//! ```no_run
//! use insight_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Objective: {}", config.agent.objective);
//! println!("Index: {}", config.knowledge.index_name);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Embedding dimensionality the vector index is created with
pub const EMBEDDING_DIMENSION: usize = 1536;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    pub core: CoreConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Chat model settings
    #[serde(default)]
    pub llm: LLMConfig,

    /// Embedding model settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector index settings
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// PubMed (Entrez) settings
    #[serde(default)]
    pub pubmed: PubMedConfig,

    /// MyGene settings
    #[serde(default)]
    pub mygene: MyGeneConfig,

    /// Generated-code sandbox settings
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Top-level goal driving all planning
    #[serde(default = "default_objective")]
    pub objective: String,

    /// The loop stops once the task counter exceeds this value
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Pause between cycles, to stay under provider rate limits
    #[serde(default = "default_cycle_delay_secs")]
    pub cycle_delay_secs: u64,

    /// Number of related records fed to the worker as context
    #[serde(default = "default_context_top_k")]
    pub context_top_k: usize,

    /// Consecutive empty plans tolerated before the run stops
    #[serde(default = "default_max_idle_cycles")]
    pub max_idle_cycles: u32,

    /// Retries for a cycle that failed with a recoverable error
    #[serde(default = "default_max_cycle_retries")]
    pub max_cycle_retries: u32,

    /// Only the most recent N completed tasks are shown to the planner.
    /// Unset means all of them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_tasks_in_prompt: Option<usize>,

    /// Replaces the built-in tool catalogue shown to the planner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_description: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            objective: default_objective(),
            max_iterations: default_max_iterations(),
            cycle_delay_secs: default_cycle_delay_secs(),
            context_top_k: default_context_top_k(),
            max_idle_cycles: default_max_idle_cycles(),
            max_cycle_retries: default_max_cycle_retries(),
            completed_tasks_in_prompt: None,
            tool_description: None,
        }
    }
}

/// Chat-completion provider configuration (OpenAI-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Base URL for the chat API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Sampling temperature (0.0-2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum completion tokens per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Inputs longer than this are truncated before cleaning or summarizing
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    // Note: API key read from OPENAI_API_KEY, not from config
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_chat_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL for the embeddings API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector dimension; must match the index
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_embedding_model(),
            dimension: default_dimension(),
        }
    }
}

/// Vector index backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeBackend {
    /// Hosted Pinecone index
    Pinecone,

    /// Process-local index, lost on exit
    Memory,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Which backend stores vectors
    #[serde(default = "default_backend")]
    pub backend: KnowledgeBackend,

    /// Index name, created on first start if absent
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Similarity metric
    #[serde(default = "default_metric")]
    pub metric: String,

    /// Pinecone pod type
    #[serde(default = "default_pod_type")]
    pub pod_type: String,

    /// Overrides the controller URL derived from PINECONE_ENV
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_url: Option<String>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            index_name: default_index_name(),
            metric: default_metric(),
            pod_type: default_pod_type(),
            controller_url: None,
        }
    }
}

/// PubMed (NCBI Entrez) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubMedConfig {
    /// Base URL for E-utilities
    #[serde(default = "default_pubmed_base_url")]
    pub base_url: String,

    /// Maximum articles fetched per search
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Tool name reported to NCBI alongside the contact email
    #[serde(default = "default_pubmed_tool")]
    pub tool: String,

    /// Minimum gap between E-utilities requests. NCBI allows three
    /// requests per second without an API key.
    #[serde(default = "default_pubmed_request_interval_ms")]
    pub request_interval_ms: u64,
    // Note: contact email read from EMAIL, not from config
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: default_pubmed_base_url(),
            max_results: default_max_results(),
            tool: default_pubmed_tool(),
            request_interval_ms: default_pubmed_request_interval_ms(),
        }
    }
}

/// MyGene configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MyGeneConfig {
    /// Base URL for the MyGene API
    #[serde(default = "default_mygene_base_url")]
    pub base_url: String,

    /// Maximum hits returned per query
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for MyGeneConfig {
    fn default() -> Self {
        Self {
            base_url: default_mygene_base_url(),
            max_results: default_max_results(),
        }
    }
}

/// Generated-code sandbox configuration
///
/// Generated code runs arbitrary logic on the host. It is disabled unless
/// `enabled = true` is set explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Allow the worker to produce code and the loop to run it
    #[serde(default)]
    pub enabled: bool,

    /// Interpreter used to run generated scripts
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Wall-clock limit per script
    #[serde(default = "default_execution_timeout")]
    pub timeout_secs: u64,

    /// Captured stdout is truncated past this many bytes
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// CPU-time limit (Unix only)
    #[serde(default = "default_cpu_seconds")]
    pub cpu_seconds: u64,

    /// Address-space limit in MB (Unix only)
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interpreter: default_interpreter(),
            timeout_secs: default_execution_timeout(),
            max_output_bytes: default_max_output_bytes(),
            cpu_seconds: default_cpu_seconds(),
            memory_mb: default_memory_mb(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.insight")
}

fn default_objective() -> String {
    "Cure breast cancer".to_string()
}

fn default_max_iterations() -> u32 {
    15
}

fn default_cycle_delay_secs() -> u64 {
    3
}

fn default_context_top_k() -> usize {
    3
}

fn default_max_idle_cycles() -> u32 {
    3
}

fn default_max_cycle_retries() -> u32 {
    2
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.5
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_input_chars() -> usize {
    12_000
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_dimension() -> usize {
    EMBEDDING_DIMENSION
}

fn default_backend() -> KnowledgeBackend {
    KnowledgeBackend::Pinecone
}

fn default_index_name() -> String {
    "insight-1".to_string()
}

fn default_metric() -> String {
    "cosine".to_string()
}

fn default_pod_type() -> String {
    "p1".to_string()
}

fn default_pubmed_base_url() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()
}

fn default_pubmed_tool() -> String {
    "insight".to_string()
}

fn default_pubmed_request_interval_ms() -> u64 {
    334
}

fn default_mygene_base_url() -> String {
    "https://mygene.info/v3".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_execution_timeout() -> u64 {
    60
}

fn default_max_output_bytes() -> usize {
    64 * 1024
}

fn default_cpu_seconds() -> u64 {
    30
}

fn default_memory_mb() -> u64 {
    512
}

impl Config {
    /// Load configuration from the default location (~/.insight/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default_config();
        config.validate_and_process()?;

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.insight/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".insight").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                data_dir: default_data_dir(),
            },
            agent: AgentConfig::default(),
            llm: LLMConfig::default(),
            embedding: EmbeddingConfig::default(),
            knowledge: KnowledgeConfig::default(),
            pubmed: PubMedConfig::default(),
            mygene: MyGeneConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }

    /// Validate the configuration without touching the filesystem
    pub fn validate(&self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.agent.objective.trim().is_empty() {
            return Err(EngineError::Config("objective must not be empty".to_string()));
        }
        if self.agent.max_iterations == 0 {
            return Err(EngineError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.agent.context_top_k == 0 {
            return Err(EngineError::Config(
                "context_top_k must be at least 1".to_string(),
            ));
        }
        if self.agent.max_idle_cycles == 0 {
            return Err(EngineError::Config(
                "max_idle_cycles must be at least 1".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(EngineError::Config(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if self.llm.max_input_chars == 0 {
            return Err(EngineError::Config(
                "max_input_chars must be at least 1".to_string(),
            ));
        }

        // The index is created with a fixed dimension; anything else would
        // silently corrupt similarity search.
        if self.embedding.dimension != EMBEDDING_DIMENSION {
            return Err(EngineError::Config(format!(
                "embedding dimension must be {}, got {}",
                EMBEDDING_DIMENSION, self.embedding.dimension
            )));
        }

        if self.knowledge.metric != "cosine" {
            return Err(EngineError::Config(format!(
                "Invalid metric '{}'. Only 'cosine' is supported",
                self.knowledge.metric
            )));
        }
        if self.knowledge.index_name.trim().is_empty() {
            return Err(EngineError::Config("index_name must not be empty".to_string()));
        }

        if self.pubmed.max_results == 0 || self.mygene.max_results == 0 {
            return Err(EngineError::Config(
                "max_results must be at least 1".to_string(),
            ));
        }

        if self.execution.enabled {
            if self.execution.interpreter.trim().is_empty() {
                return Err(EngineError::Config(
                    "execution.interpreter must not be empty".to_string(),
                ));
            }
            if self.execution.timeout_secs == 0 {
                return Err(EngineError::Config(
                    "execution.timeout_secs must be at least 1".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Validate and process configuration
    ///
    /// Validates all sections, expands ~ in the data directory and creates it
    /// if it does not exist.
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        self.validate()?;

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        self.core.data_dir = self
            .core
            .data_dir
            .canonicalize()
            .map_err(|e| EngineError::PathCanonicalization(self.core.data_dir.clone(), e.to_string()))?;

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.agent.objective, "Cure breast cancer");
        assert_eq!(config.agent.max_iterations, 15);
        assert_eq!(config.agent.cycle_delay_secs, 3);
        assert_eq!(config.agent.context_top_k, 3);
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.knowledge.index_name, "insight-1");
        assert_eq!(config.knowledge.metric, "cosine");
        assert_eq!(config.knowledge.pod_type, "p1");
        assert!(!config.execution.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = expand_path(&path).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        let expanded = expand_path(&path).unwrap();

        assert_eq!(expanded, path);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = Config::default_config();
        config.core.log_level = "loud".to_string();
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_wrong_dimension_rejected() {
        let mut config = Config::default_config();
        config.embedding.dimension = 768;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("1536"));
    }

    #[test]
    fn test_non_cosine_metric_rejected() {
        let mut config = Config::default_config();
        config.knowledge.metric = "euclidean".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mut config = Config::default_config();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default_config();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.core.log_level, deserialized.core.log_level);
        assert_eq!(config.agent.objective, deserialized.agent.objective);
        assert_eq!(config.knowledge.backend, deserialized.knowledge.backend);
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: Config = toml::from_str("[core]\n").unwrap();
        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.agent.max_iterations, 15);
        assert_eq!(config.knowledge.backend, KnowledgeBackend::Pinecone);
    }
}
