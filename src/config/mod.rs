use crate::google::GoogleEndpoints;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Complete Portico configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PorticoConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub google: GoogleEndpoints,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; `["*"]` allows any origin
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    3000
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Credential storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "credentials.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for PorticoConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            google: GoogleEndpoints::default(),
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &str) -> Result<PorticoConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: PorticoConfig =
        toml::from_str(&contents).with_context(|| format!("Invalid config file {}", path))?;
    Ok(config)
}
