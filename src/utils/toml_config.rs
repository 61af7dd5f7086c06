//! TOML-based configuration for Scout
//!
//! This module provides declarative configuration for the server, the LLM
//! provider, the search provider and the research pipeline via a TOML file
//! (`scout.toml`). Every field has a default, so an empty file is valid.
//!
//! # Hot Reloading
//!
//! Configuration changes are automatically detected and applied at runtime.
//! Use `ConfigManager` for thread-safe access to the current configuration.
//! A run takes a snapshot when it starts and keeps it until it ends.

use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Root configuration structure loaded from scout.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoutConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub research: ResearchConfig,

    #[serde(default)]
    pub pipelines: PipelinesConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Allowed CORS origins; `["*"]` allows any origin
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            cors_origins: default_cors_origins(),
        }
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    Ollama,
    OpenAI,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: LlmProviderKind,

    /// Base URL of the provider API
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Environment variable containing the API key (OpenAI only)
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_llm_provider() -> LlmProviderKind {
    LlmProviderKind::Ollama
}

fn default_llm_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "llama3.2".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key_env: None,
            temperature: default_temperature(),
        }
    }
}

// ============= Search Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    /// DuckDuckGo through daedra, no key required
    DuckDuckGo,
    /// Tavily search API
    Tavily,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: SearchProviderKind,

    /// Environment variable containing the API key (Tavily only)
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Override for the provider endpoint
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_search_provider() -> SearchProviderKind {
    SearchProviderKind::DuckDuckGo
}

fn default_max_results() -> usize {
    5
}

fn default_search_timeout() -> u64 {
    30
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key_env: None,
            base_url: None,
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ============= Research Pipeline Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Number of top search results handed to the fetch stage
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Per-page fetch timeout
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Byte ceiling for one retrieved page; larger pages fail
    #[serde(default = "default_max_page_bytes")]
    pub max_page_bytes: usize,

    /// Extracted text lines of this many chars or fewer are dropped
    #[serde(default = "default_min_line_chars")]
    pub min_line_chars: usize,

    /// Cap on extracted text length per page
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Per-source excerpt length in the synthesis prompt
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,

    /// Search results listed in the synthesis prompt
    #[serde(default = "default_prompt_results")]
    pub prompt_results: usize,

    /// Successful sources included in the synthesis prompt
    #[serde(default = "default_prompt_sources")]
    pub prompt_sources: usize,

    /// Longest wait for the next generated token
    #[serde(default = "default_token_idle_timeout")]
    pub token_idle_timeout_secs: u64,

    /// Duration of the planning acknowledgment stage
    #[serde(default = "default_planning_delay")]
    pub planning_delay_ms: u64,

    /// Capacity of the per-run event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_top_k() -> usize {
    3
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_max_page_bytes() -> usize {
    1_000_000
}

fn default_min_line_chars() -> usize {
    10
}

fn default_max_content_chars() -> usize {
    1_000_000
}

fn default_excerpt_chars() -> usize {
    1500
}

fn default_prompt_results() -> usize {
    5
}

fn default_prompt_sources() -> usize {
    3
}

fn default_token_idle_timeout() -> u64 {
    30
}

fn default_planning_delay() -> u64 {
    500
}

fn default_event_buffer() -> usize {
    64
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) ScoutResearch/0.1"
        .to_string()
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            fetch_timeout_secs: default_fetch_timeout(),
            max_page_bytes: default_max_page_bytes(),
            min_line_chars: default_min_line_chars(),
            max_content_chars: default_max_content_chars(),
            excerpt_chars: default_excerpt_chars(),
            prompt_results: default_prompt_results(),
            prompt_sources: default_prompt_sources(),
            token_idle_timeout_secs: default_token_idle_timeout(),
            planning_delay_ms: default_planning_delay(),
            event_buffer: default_event_buffer(),
            user_agent: default_user_agent(),
        }
    }
}

impl ResearchConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn token_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.token_idle_timeout_secs)
    }

    pub fn planning_delay(&self) -> Duration {
        Duration::from_millis(self.planning_delay_ms)
    }
}

// ============= Pipeline Selection Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelinesConfig {
    /// Pipeline used when neither an override nor a keyword decides
    #[serde(default = "default_pipeline")]
    pub default: String,

    /// Extra keywords routing a query to the generation pipeline
    #[serde(default)]
    pub generation_keywords: Vec<String>,

    /// Extra keywords routing a query to the research pipeline
    #[serde(default)]
    pub research_keywords: Vec<String>,
}

fn default_pipeline() -> String {
    "research".to_string()
}

impl Default for PipelinesConfig {
    fn default() -> Self {
        Self {
            default: default_pipeline(),
            generation_keywords: Vec::new(),
            research_keywords: Vec::new(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl From<ConfigError> for crate::types::AppError {
    fn from(e: ConfigError) -> Self {
        crate::types::AppError::Config(e.to_string())
    }
}

impl ScoutConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ScoutConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.provider == LlmProviderKind::OpenAI {
            let env = self.llm.api_key_env.as_deref().ok_or_else(|| {
                ConfigError::ValidationError(
                    "llm.api_key_env is required for the openai provider".to_string(),
                )
            })?;
            self.validate_env_var(env)?;
        }

        if self.search.provider == SearchProviderKind::Tavily {
            let env = self.search.api_key_env.as_deref().ok_or_else(|| {
                ConfigError::ValidationError(
                    "search.api_key_env is required for the tavily provider".to_string(),
                )
            })?;
            self.validate_env_var(env)?;
        }

        if self.search.max_results == 0 {
            return Err(ConfigError::ValidationError(
                "search.max_results must be greater than zero".to_string(),
            ));
        }
        if self.search.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "search.timeout_secs must be greater than zero".to_string(),
            ));
        }

        let research = &self.research;
        if research.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "research.top_k must be greater than zero".to_string(),
            ));
        }
        if research.fetch_timeout_secs == 0 || research.token_idle_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "research timeouts must be greater than zero".to_string(),
            ));
        }
        if research.max_page_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "research.max_page_bytes must be greater than zero".to_string(),
            ));
        }
        if research.event_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "research.event_buffer must be greater than zero".to_string(),
            ));
        }

        if crate::agents::PipelineKind::parse(&self.pipelines.default).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "Unknown default pipeline '{}'",
                self.pipelines.default
            )));
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Socket address string for the HTTP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct ConfigManager {
    config: Arc<ArcSwap<ScoutConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
}

impl ConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Convert to absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = ScoutConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
        })
    }

    /// Create a config manager directly from a config (useful for testing)
    /// This won't have file watching capabilities.
    pub fn from_config(config: ScoutConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("scout.toml"),
            watcher: RwLock::new(None),
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<ScoutConfig> {
        self.config.load_full()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = ScoutConfig::load(&self.config_path)?;
        self.update(new_config);

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Replace the current configuration. Runs already started keep their snapshot.
    pub fn update(&self, config: ScoutConfig) {
        self.config.store(Arc::new(config));
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);
        let file_name = self.config_path.file_name().map(|n| n.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if touches_config && (event.kind.is_modify() || event.kind.is_create()) {
                        // Debounced in the receiver
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        // Watch the config file's parent directory
        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let debounce_duration = Duration::from_millis(500);
            let mut last_reload: Option<std::time::Instant> = None;

            while rx.recv().await.is_some() {
                if last_reload.is_some_and(|t| t.elapsed() < debounce_duration) {
                    continue;
                }

                // Wait a bit for file write to complete
                tokio::time::sleep(Duration::from_millis(100)).await;

                match ScoutConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                        last_reload = Some(std::time::Instant::now());
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_config() -> String {
        r#"
[server]
host = "0.0.0.0"
port = 9000
log_level = "debug"

[llm]
provider = "ollama"
base_url = "http://localhost:11434"
model = "granite4:tiny-h"

[search]
provider = "duckduckgo"
max_results = 8

[research]
top_k = 4
fetch_timeout_secs = 5
token_idle_timeout_secs = 10
planning_delay_ms = 0

[pipelines]
default = "research"
generation_keywords = ["scaffold"]
"#
        .to_string()
    }

    #[test]
    fn test_parse_config() {
        let config = ScoutConfig::from_toml(&create_test_config()).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.llm.model, "granite4:tiny-h");
        assert_eq!(config.search.max_results, 8);
        assert_eq!(config.research.top_k, 4);
        assert_eq!(config.research.fetch_timeout(), Duration::from_secs(5));
        assert_eq!(config.research.planning_delay(), Duration::ZERO);
        assert_eq!(config.pipelines.generation_keywords, vec!["scaffold"]);
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
    }

    #[test]
    fn test_defaults() {
        let config = ScoutConfig::from_toml("").unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.llm.provider, LlmProviderKind::Ollama);
        assert_eq!(config.search.provider, SearchProviderKind::DuckDuckGo);
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.research.top_k, 3);
        assert_eq!(config.research.max_page_bytes, 1_000_000);
        assert_eq!(config.research.min_line_chars, 10);
        assert_eq!(config.research.excerpt_chars, 1500);
        assert_eq!(config.research.token_idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.pipelines.default, "research");
    }

    #[test]
    fn test_validation_rejects_zero_top_k() {
        let result = ScoutConfig::from_toml("[research]\ntop_k = 0\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validation_rejects_zero_byte_ceiling() {
        let result = ScoutConfig::from_toml("[research]\nmax_page_bytes = 0\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validation_rejects_zero_search_timeout() {
        let result = ScoutConfig::from_toml("[search]\ntimeout_secs = 0\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validation_rejects_unknown_default_pipeline() {
        let result = ScoutConfig::from_toml("[pipelines]\ndefault = \"poetry\"\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validation_openai_requires_key_env() {
        let result = ScoutConfig::from_toml("[llm]\nprovider = \"openai\"\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let result = ScoutConfig::from_toml(
            "[llm]\nprovider = \"openai\"\napi_key_env = \"SCOUT_TEST_SURELY_UNSET_KEY\"\n",
        );
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_validation_tavily_requires_key_env() {
        let result = ScoutConfig::from_toml("[search]\nprovider = \"tavily\"\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ScoutConfig::load("/definitely/not/here/scout.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_config_manager_reload() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[research]\ntop_k = 2").unwrap();

        let manager = ConfigManager::new(file.path()).unwrap();
        assert_eq!(manager.config().research.top_k, 2);

        let snapshot = manager.config();

        fs::write(file.path(), "[research]\ntop_k = 6\n").unwrap();
        manager.reload().unwrap();

        assert_eq!(manager.config().research.top_k, 6);
        // Earlier snapshots are unaffected
        assert_eq!(snapshot.research.top_k, 2);
    }

    #[test]
    fn test_config_manager_keeps_config_on_bad_reload() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 8100").unwrap();

        let manager = ConfigManager::new(file.path()).unwrap();
        fs::write(file.path(), "[server\nport = ").unwrap();

        assert!(manager.reload().is_err());
        assert_eq!(manager.config().server.port, 8100);
    }

    #[test]
    fn test_config_manager_from_config() {
        let manager = ConfigManager::from_config(ScoutConfig::default());
        assert_eq!(manager.config().research.top_k, 3);
    }
}
