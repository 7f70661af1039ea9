use std::path::{Path, PathBuf};
use std::time::Duration;

use orchestrator::{AgentRoster, ChatCompletionConfig, HubConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

pub const STUDIO_DIR: &str = ".debate-studio";
pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_DB_NAME: &str = "studio.db";
pub const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How often finished, unwatched sessions are dropped from memory.
    pub reap_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            reap_interval_secs: 300,
        }
    }
}

impl ServerConfig {
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Transcripts and session records go to SQLite when enabled,
    /// otherwise they live in memory for the life of the process.
    pub enabled: bool,
    /// Relative paths resolve against the studio directory.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(DEFAULT_DB_NAME),
        }
    }
}

/// Which agents speak in the debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum AgentBackend {
    /// Deterministic offline agents.
    Scripted {
        /// Stream replies this many words at a time; whole replies when unset.
        #[serde(default)]
        words_per_token: Option<usize>,
    },
    OpenaiCompatible {
        base_url: String,
        model: String,
        /// Environment variable holding the API key.
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
    },
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for AgentBackend {
    fn default() -> Self {
        Self::Scripted {
            words_per_token: Some(4),
        }
    }
}

impl AgentBackend {
    pub fn roster(&self) -> AgentRoster {
        match self {
            Self::Scripted {
                words_per_token: Some(words),
            } => AgentRoster::scripted_streaming(*words),
            Self::Scripted {
                words_per_token: None,
            } => AgentRoster::scripted(),
            Self::OpenaiCompatible {
                base_url,
                model,
                api_key_env,
            } => {
                let api_key = std::env::var(api_key_env).unwrap_or_else(|_| {
                    warn!(env = %api_key_env, "API key variable not set, sending no credentials");
                    String::new()
                });
                AgentRoster::chat_completion(ChatCompletionConfig {
                    base_url: base_url.clone(),
                    model: model.clone(),
                    api_key,
                })
            }
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Scripted { .. } => "scripted".to_string(),
            Self::OpenaiCompatible {
                base_url, model, ..
            } => format!("{model} @ {base_url}"),
        }
    }
}

/// Process-level configuration stored in `.debate-studio/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub agents: AgentBackend,
    pub hub: HubConfig,
    pub retry: RetryPolicy,
}

impl StudioConfig {
    pub fn studio_dir(root: &Path) -> PathBuf {
        root.join(STUDIO_DIR)
    }

    /// Read config from a project directory, falling back to defaults.
    pub async fn read(root: &Path) -> Self {
        let config_path = Self::studio_dir(root).join(CONFIG_FILE);

        if !config_path.exists() {
            debug!(path = %config_path.display(), "Config file does not exist, using defaults");
            return Self::default();
        }

        match fs::read_to_string(&config_path).await {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    debug!(path = %config_path.display(), "Config loaded successfully");
                    config
                }
                Err(e) => {
                    warn!(path = %config_path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %config_path.display(), error = %e, "Failed to read config file, using defaults");
                Self::default()
            }
        }
    }

    /// Write config into the project's studio directory.
    pub async fn write(&self, root: &Path) -> std::io::Result<()> {
        let config_dir = Self::studio_dir(root);
        let config_path = config_dir.join(CONFIG_FILE);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).await?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(&config_path, content).await?;
        debug!(path = %config_path.display(), "Config saved successfully");

        Ok(())
    }

    /// SQLite URL for the configured database, if persistence is on.
    pub fn database_url(&self, root: &Path) -> Option<String> {
        if !self.database.enabled {
            return None;
        }
        let path = if self.database.path.is_absolute() {
            self.database.path.clone()
        } else {
            Self::studio_dir(root).join(&self.database.path)
        };
        Some(format!("sqlite:{}", path.display()))
    }
}
