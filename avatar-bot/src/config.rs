//! Bot configuration.
//!
//! Configuration lives in a JSON file (`~/.avatar-bot/config.json` by
//! default). Every field has a default, so a missing or partial file is
//! fine; the Telegram token can also come from `TELEGRAM_BOT_TOKEN`.

use crate::avatar::DEFAULT_RENDER_BASE_URL;
use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub use crate::util::config_path;

/// Environment variable that overrides `telegram.token`.
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Telegram transport settings.
    pub telegram: TelegramConfig,
    /// Render service settings.
    pub render: RenderConfig,
    /// Dispatch loop settings.
    pub dispatch: DispatchConfig,
}

/// Telegram transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub token: Option<String>,
    /// Skip updates that queued up while the bot was offline.
    pub drop_pending_updates: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            drop_pending_updates: true,
        }
    }
}

/// Render service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Base URL, e.g. `https://api.dicebear.com/8.x`.
    pub base_url: String,
    /// HTTP timeout for image downloads.
    pub timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_RENDER_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Dispatch loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of parallel lanes; one conversation always maps to one lane.
    pub workers: usize,
    /// Capacity of the inbound queue and of each lane.
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
        }
    }
}

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// The bot can run but something looks off.
    Warning,
    /// The bot cannot run.
    Error,
}

/// A problem found by [`BotConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Severity.
    pub level: IssueLevel,
    /// Human readable description.
    pub message: String,
}

impl ConfigIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            message: message.into(),
        }
    }
}

impl BotConfig {
    /// Parse configuration from JSON text.
    pub fn from_json(text: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Apply environment overrides.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        if let Ok(token) = std::env::var(TOKEN_ENV)
            && !token.trim().is_empty()
        {
            debug!("using telegram token from environment");
            self.telegram.token = Some(token);
        }
        self
    }

    /// The Telegram token, or an error if none is configured.
    pub fn token(&self) -> ConfigResult<&str> {
        self.telegram
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::missing(format!("telegram.token (or {TOKEN_ENV})")))
    }

    /// Check the configuration for problems.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.token().is_err() {
            issues.push(ConfigIssue::error(format!(
                "no telegram token; set telegram.token or {TOKEN_ENV}"
            )));
        }
        if reqwest::Url::parse(&self.render.base_url).is_err() {
            issues.push(ConfigIssue::error(format!(
                "render.base_url is not a valid URL: {}",
                self.render.base_url
            )));
        }
        if self.render.timeout_secs == 0 {
            issues.push(ConfigIssue::warning(
                "render.timeout_secs is 0; downloads will fail immediately",
            ));
        }
        if self.dispatch.workers == 0 {
            issues.push(ConfigIssue::error("dispatch.workers must be at least 1"));
        }
        if self.dispatch.queue_capacity == 0 {
            issues.push(ConfigIssue::error("dispatch.queue_capacity must be at least 1"));
        }

        issues
    }

    /// Whether validation found any error-level issue.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.validate()
            .iter()
            .any(|issue| issue.level == IssueLevel::Error)
    }
}

/// Load configuration from `path`, with environment overrides applied.
pub async fn load_config_from(path: &Path) -> ConfigResult<BotConfig> {
    let text = tokio::fs::read_to_string(path).await?;
    let config = BotConfig::from_json(&text)?;
    debug!(path = %path.display(), "configuration loaded");
    Ok(config.with_env())
}

/// Load configuration from the default path.
///
/// A missing file yields the defaults (plus environment overrides).
pub async fn load_config() -> ConfigResult<BotConfig> {
    let path = config_path();
    if !path.exists() {
        debug!(path = %path.display(), "no configuration file, using defaults");
        return Ok(BotConfig::default().with_env());
    }
    load_config_from(&path).await
}

/// Write configuration to `path`, creating parent directories.
pub async fn save_config(config: &BotConfig, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let text = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, text).await?;
    info!(path = %path.display(), "configuration saved");
    Ok(())
}

/// Write a default configuration file to the default path.
pub async fn init_config() -> ConfigResult<()> {
    save_config(&BotConfig::default(), &config_path()).await
}
