use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure for release-valet.
///
/// Built once at startup and passed explicitly into the gateways, the
/// orchestrator, and the HTTP router. There is no global accessor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValetConfig {
    /// GitHub configuration
    pub github: GitHubConfig,
    /// Telegram configuration
    pub telegram: TelegramConfig,
    /// Branch roles and filtering
    pub branches: BranchConfig,
    /// Inbound authentication secrets
    pub auth: AuthConfig,
    /// HTTP server settings
    pub server: ServerConfig,
    /// Link to the CI log dashboard, appended to success messages
    pub ci_log_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token (can be set via env var)
    pub token: String,
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// API base override for GHES hosts and tests
    pub api_base: Option<String>,
    /// Page size for paginated listings
    pub page_size: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Telegram bot token (can be set via env var)
    pub bot_token: String,
    /// API base override for tests
    pub api_base: Option<String>,
    /// Comma-separated chat ids permitted to trigger deploys
    pub allowed_chat_ids: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BranchConfig {
    /// Branch that feature branches are merged into
    pub integration: String,
    /// Branch that merged pull requests land on
    pub mainline: String,
    /// Branch that triggers the production deploy
    pub release: String,
    /// Administrative branches excluded from the deploy menu
    pub excluded: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret for the trigger-style endpoints
    pub trigger_secret: String,
    /// HMAC secret for the build-completion webhook
    pub webhook_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to
    pub bind_addr: String,
}

impl Default for ValetConfig {
    fn default() -> Self {
        Self {
            github: GitHubConfig::default(),
            telegram: TelegramConfig::default(),
            branches: BranchConfig::default(),
            auth: AuthConfig::default(),
            server: ServerConfig::default(),
            ci_log_url: None,
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: String::new(), // Will be read from env var
            owner: String::new(),
            repo: String::new(),
            api_base: None,
            page_size: 100,
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: None,
            allowed_chat_ids: String::new(),
        }
    }
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            integration: "dev".to_string(),
            mainline: "main".to_string(),
            release: "release".to_string(),
            excluded: vec![
                "dev".to_string(),
                "main".to_string(),
                "release".to_string(),
            ],
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            trigger_secret: String::new(),
            webhook_secret: String::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ValetConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (release-valet.toml)
    /// 3. Environment variables (prefixed with RELEASE_VALET_)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("release-valet.toml").exists() {
            builder = builder.add_source(File::with_name("release-valet"));
        }

        builder = builder.add_source(
            Environment::with_prefix("RELEASE_VALET")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut valet_config: ValetConfig = config.try_deserialize()?;

        // Special handling for tokens - fall back to the conventional env vars
        if valet_config.github.token.is_empty() {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                valet_config.github.token = token;
            }
        }
        if valet_config.telegram.bot_token.is_empty() {
            if let Ok(token) = std::env::var("TELEGRAM_TOKEN") {
                valet_config.telegram.bot_token = token;
            }
        }

        Ok(valet_config)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

impl TelegramConfig {
    /// Parse the comma-separated allow-list into chat ids.
    ///
    /// Entries that do not parse as integers are skipped with a warning so a
    /// single typo does not lock every operator out.
    pub fn allowed_chat_ids(&self) -> Vec<i64> {
        self.allowed_chat_ids
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| match entry.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    tracing::warn!(entry, "ignoring non-numeric chat id in allow-list");
                    None
                }
            })
            .collect()
    }
}
