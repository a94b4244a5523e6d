//! Application settings and configuration types.
//!
//! Settings are persisted to `~/.config/mailsweep/settings.json` (or the
//! platform equivalent) and loaded at startup. Every section has defaults,
//! so a partial or missing file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write settings {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),

    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level application settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Mailbox API endpoints and limits.
    pub api: ApiSettings,
    /// Outbound unsubscribe request settings.
    pub unsubscribe: UnsubscribeSettings,
    /// Newsletter cleanup settings.
    pub newsletters: NewsletterSettings,
    /// Automated-notification duplicate cleanup settings.
    pub automated: AutomatedSettings,
    /// Old-mail archiving settings.
    pub archive: ArchiveSettings,
    /// Large-attachment listing settings.
    pub attachments: AttachmentSettings,
}

impl Settings {
    /// Default location of the settings file.
    pub fn default_path() -> Result<PathBuf> {
        ProjectDirs::from("io", "mailsweep", "mailsweep")
            .map(|dirs| dirs.config_dir().join("settings.json"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Loads settings from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Loads settings from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let settings: Settings =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Writes settings to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        std::fs::write(path, json).map_err(write_err)
    }

    /// Rejects values the pipelines cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.api.page_size == 0 {
            return Err(ConfigError::Invalid("api.page_size must be positive".into()));
        }
        if self.api.bulk_delete_cap == 0 {
            return Err(ConfigError::Invalid(
                "api.bulk_delete_cap must be positive".into(),
            ));
        }
        if self.unsubscribe.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "unsubscribe.timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Mailbox API endpoints and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// API root for the signed-in user.
    pub base_url: String,
    /// OAuth token endpoint.
    pub token_url: String,
    /// Results requested per list page.
    pub page_size: u32,
    /// Maximum ids per bulk delete call.
    pub bulk_delete_cap: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://gmail.googleapis.com/gmail/v1/users/me".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            page_size: 500,
            bulk_delete_cap: 1000,
        }
    }
}

/// Outbound unsubscribe request settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnsubscribeSettings {
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// User-Agent header sent with the request.
    pub user_agent: String,
}

impl UnsubscribeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for UnsubscribeSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            user_agent: "Mozilla/5.0 (compatible; mailsweep/0.1)".to_string(),
        }
    }
}

/// Newsletter cleanup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsletterSettings {
    /// Search query selecting candidate newsletters.
    pub query: String,
    /// Optional cap on the number of candidates fetched.
    pub max_messages: Option<usize>,
}

impl Default for NewsletterSettings {
    fn default() -> Self {
        Self {
            query: "unsubscribe OR list-unsubscribe".to_string(),
            max_messages: None,
        }
    }
}

/// Automated-notification duplicate cleanup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomatedSettings {
    /// Queries selecting automated notifications.
    pub queries: Vec<String>,
    /// Recency restriction appended to every query.
    pub window: String,
    /// Maximum results fetched per query.
    pub per_query_limit: u32,
}

impl Default for AutomatedSettings {
    fn default() -> Self {
        Self {
            queries: vec![
                r#"subject:"accesso" OR subject:"login" OR subject:"signin""#.to_string(),
                r#"subject:"conferma ordine" OR subject:"order confirmation""#.to_string(),
                r#"subject:"verifica" OR subject:"verification""#.to_string(),
                r#"subject:"codice di sicurezza" OR subject:"security code""#.to_string(),
                r#"subject:"notifica di accesso" OR subject:"new sign-in""#.to_string(),
                "from:noreply OR from:no-reply OR from:donotreply".to_string(),
            ],
            window: "newer_than:7d".to_string(),
            per_query_limit: 100,
        }
    }
}

/// Old-mail archiving settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSettings {
    /// Age in days after which read mail counts as old.
    pub older_than_days: u32,
    /// Maximum messages listed per run.
    pub limit: u32,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            older_than_days: 90,
            limit: 500,
        }
    }
}

/// Large-attachment listing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentSettings {
    /// Minimum message size in megabytes.
    pub min_size_mb: u32,
    /// Maximum messages listed.
    pub limit: u32,
}

impl Default for AttachmentSettings {
    fn default() -> Self {
        Self {
            min_size_mb: 5,
            limit: 100,
        }
    }
}
