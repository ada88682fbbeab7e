//! Configuration loading and store factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lexicard_core::model::UserId;
use lexicard_core::session::SessionConfig;
use lexicard_core::traits::WordStore;

use crate::memory::MemoryStore;
use crate::rest::RestStore;

/// Where tracked words are kept.
///
/// Note: Custom Debug impl masks credentials to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// A JSON file on local disk.
    Local {
        #[serde(default = "default_local_path")]
        path: PathBuf,
    },
    /// A hosted PostgREST-style backend.
    Rest {
        base_url: String,
        api_key: String,
        #[serde(default)]
        access_token: Option<String>,
    },
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Local { path } => f.debug_struct("Local").field("path", path).finish(),
            StoreConfig::Rest {
                base_url,
                api_key: _,
                access_token,
            } => f
                .debug_struct("Rest")
                .field("base_url", base_url)
                .field("api_key", &"***")
                .field("access_token", &access_token.as_ref().map(|_| "***"))
                .finish(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Local {
            path: default_local_path(),
        }
    }
}

fn default_local_path() -> PathBuf {
    PathBuf::from("./lexicard-data.json")
}

/// Top-level lexicard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicardConfig {
    /// The signed-in user. Absent means no session-scoped operation may run.
    #[serde(default)]
    pub user_id: Option<Uuid>,
    /// Storage backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Delay after finishing a review before leaving the review flow.
    #[serde(default = "default_completion_delay")]
    pub completion_delay_ms: u64,
    /// Hours until a newly saved word is first due.
    #[serde(default = "default_new_word_delay")]
    pub new_word_delay_hours: i64,
}

fn default_completion_delay() -> u64 {
    2000
}
fn default_new_word_delay() -> i64 {
    24
}

impl Default for LexicardConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            store: StoreConfig::default(),
            completion_delay_ms: default_completion_delay(),
            new_word_delay_hours: default_new_word_delay(),
        }
    }
}

impl LexicardConfig {
    pub fn user(&self) -> Option<UserId> {
        self.user_id.map(UserId)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            completion_delay: std::time::Duration::from_millis(self.completion_delay_ms),
        }
    }

    /// Delay before a newly saved word is first due.
    ///
    /// Fails for negative values and for delays too large to schedule from now.
    pub fn new_word_delay(&self) -> Result<chrono::Duration> {
        anyhow::ensure!(
            self.new_word_delay_hours >= 0,
            "new_word_delay_hours must not be negative"
        );
        chrono::Duration::try_hours(self.new_word_delay_hours)
            .filter(|delay| chrono::Utc::now().checked_add_signed(*delay).is_some())
            .with_context(|| {
                format!(
                    "new_word_delay_hours is too large: {}",
                    self.new_word_delay_hours
                )
            })
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_store_config(config: &StoreConfig) -> StoreConfig {
    match config {
        StoreConfig::Local { path } => StoreConfig::Local {
            path: PathBuf::from(resolve_env_vars(&path.to_string_lossy())),
        },
        StoreConfig::Rest {
            base_url,
            api_key,
            access_token,
        } => StoreConfig::Rest {
            base_url: resolve_env_vars(base_url),
            api_key: resolve_env_vars(api_key),
            access_token: access_token
                .as_ref()
                .map(|t| resolve_env_vars(t))
                .filter(|t| !t.is_empty()),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `lexicard.toml` in the current directory
/// 2. `~/.config/lexicard/config.toml`
///
/// Environment variable overrides: `LEXICARD_USER_ID`, `LEXICARD_API_KEY`,
/// `LEXICARD_ACCESS_TOKEN`.
pub fn load_config() -> Result<LexicardConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<LexicardConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("lexicard.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<LexicardConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => LexicardConfig::default(),
    };

    if let Ok(user) = std::env::var("LEXICARD_USER_ID") {
        let id = Uuid::parse_str(user.trim())
            .with_context(|| format!("LEXICARD_USER_ID is not a valid UUID: {user}"))?;
        config.user_id = Some(id);
    }

    if let StoreConfig::Rest {
        api_key,
        access_token,
        ..
    } = &mut config.store
    {
        if let Ok(key) = std::env::var("LEXICARD_API_KEY") {
            *api_key = key;
        }
        if let Ok(token) = std::env::var("LEXICARD_ACCESS_TOKEN") {
            *access_token = Some(token);
        }
    }

    config.store = resolve_store_config(&config.store);
    config.new_word_delay()?;

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("lexicard"))
}

/// Create a store instance from its configuration.
///
/// A `local` store writes every change through to its file.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn WordStore>> {
    match config {
        StoreConfig::Local { path } => {
            let store = MemoryStore::open(path)?;
            tracing::debug!(path = %path.display(), "opened local word store");
            Ok(Arc::new(store))
        }
        StoreConfig::Rest {
            base_url,
            api_key,
            access_token,
        } => {
            anyhow::ensure!(!api_key.is_empty(), "rest store requires an api_key");
            let store = RestStore::new(base_url, api_key, access_token.clone())?;
            Ok(Arc::new(store))
        }
    }
}
