// src/config/mod.rs
//! Configuration management module
//!
//! This module handles application configuration loading from a TOML file,
//! environment variables, and default values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::services::upload::UploadPolicy;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deployment environment
    pub environment: Environment,
    /// Server configuration
    pub server: ServerConfig,
    /// Hosted function platform configuration
    pub backend: BackendConfig,
    /// Third-party AI API configuration
    pub ai: AiConfig,
    /// Upload limits
    pub upload: UploadConfig,
    /// Analysis timing configuration
    pub analysis: AnalysisConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS allowed origins; empty means permissive
    pub cors_origins: Vec<String>,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

/// Hosted function platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the function platform
    pub base_url: String,
    /// Anonymous key sent as bearer token
    pub anon_key: String,
    /// Name of the document analysis function
    pub document_function: String,
    /// Name of the website analysis function
    pub website_function: String,
}

/// Third-party AI API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: String,
    pub key_prefix: String,
    pub min_key_length: usize,
}

/// Upload limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub allowed_extensions: Vec<String>,
    /// Maximum file size in bytes
    pub max_file_size: u64,
    /// Maximum number of files per project
    pub max_files: usize,
    /// Cosmetic progress tick in milliseconds
    pub progress_interval_ms: u64,
}

/// Analysis timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub document_timeout_secs: u64,
    pub website_timeout_secs: u64,
    /// Run is abandoned if it has not completed after this long
    pub hard_timeout_secs: u64,
    pub website_max_pages: u32,
    pub simulation_interval_ms: u64,
    pub poll_interval_ms: u64,
    pub completion_delay_ms: u64,
    pub processing_mode: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for records and uploaded files
    pub data_directory: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
            request_timeout_secs: 120,
            max_body_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            document_function: "analyze-documents".to_string(),
            website_function: "analyze-website".to_string(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            key_prefix: "sk-ant-".to_string(),
            min_key_length: 40,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: ["pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "txt", "csv", "md"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size: 50 * 1024 * 1024, // 50MB
            max_files: 10,
            progress_interval_ms: 200,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            document_timeout_secs: 60,
            website_timeout_secs: 70,
            hard_timeout_secs: 90,
            website_max_pages: 10,
            simulation_interval_ms: 800,
            poll_interval_ms: 3000,
            completion_delay_ms: 1500,
            processing_mode: "comprehensive".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: get_storage_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if std::path::Path::new("config.toml").exists() {
            config = Self::load_from_file("config.toml")?;
        }

        config.load_from_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path))?;

        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Load configuration from environment variables
    pub fn load_from_env(&mut self) -> Result<()> {
        if let Ok(env) = std::env::var("APP_ENV") {
            self.environment = match env.to_lowercase().as_str() {
                "production" | "prod" => Environment::Production,
                _ => Environment::Development,
            };
        }

        if let Ok(host) = std::env::var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SERVER_PORT") {
            self.server.port = port.parse().context("Invalid SERVER_PORT")?;
        }

        if let Ok(url) = std::env::var("BACKEND_URL") {
            self.backend.base_url = url;
        }
        if let Ok(key) = std::env::var("BACKEND_ANON_KEY") {
            self.backend.anon_key = key;
        }

        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            self.ai.api_key = api_key;
        }

        if let Ok(dir) = std::env::var("STORAGE_DATA_DIRECTORY") {
            self.storage.data_directory = PathBuf::from(dir);
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.backend.base_url.is_empty() {
            return Err(anyhow::anyhow!("Backend base URL cannot be empty"));
        }

        if self.upload.max_files == 0 {
            return Err(anyhow::anyhow!("upload.max_files must be at least 1"));
        }

        if self.analysis.hard_timeout_secs == 0
            || self.analysis.simulation_interval_ms == 0
            || self.analysis.poll_interval_ms == 0
        {
            return Err(anyhow::anyhow!("Analysis timers must be non-zero"));
        }

        if self.upload.progress_interval_ms == 0 {
            return Err(anyhow::anyhow!("upload.progress_interval_ms must be non-zero"));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(anyhow::anyhow!("Invalid log level: {}", self.logging.level)),
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, content).context(format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            allowed_extensions: self.upload.allowed_extensions.clone(),
            max_file_size: self.upload.max_file_size,
            max_files: self.upload.max_files,
        }
    }
}

impl AiConfig {
    /// Check that an API key is present and looks like a real key.
    pub fn is_configured(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key.starts_with(&self.key_prefix) && key.len() >= self.min_key_length
    }

    /// Key with everything past the prefix masked, for display.
    pub fn masked_key(&self) -> String {
        if self.api_key.is_empty() {
            return "<not set>".to_string();
        }
        let visible = self.api_key.chars().take(self.key_prefix.len()).collect::<String>();
        format!("{}****", visible)
    }
}

impl AnalysisConfig {
    pub fn document_timeout(&self) -> Duration {
        Duration::from_secs(self.document_timeout_secs)
    }

    pub fn website_timeout(&self) -> Duration {
        Duration::from_secs(self.website_timeout_secs)
    }

    pub fn hard_timeout(&self) -> Duration {
        Duration::from_secs(self.hard_timeout_secs)
    }

    pub fn simulation_interval(&self) -> Duration {
        Duration::from_millis(self.simulation_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }
}

/// Get the default storage directory path
pub fn get_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("strategy-insights"))
        .unwrap_or_else(|| PathBuf::from("./local_storage/app_data"))
}
