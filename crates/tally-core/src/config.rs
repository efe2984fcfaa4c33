//! Runtime configuration
//!
//! Layering, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. TOML file (`~/.config/tally/config.toml` or `--config`)
//! 3. Environment variables (`TALLY_*`, `SUPABASE_JWT_SECRET`, `ANTHROPIC_*`)
//! 4. CLI flags (applied by the caller)
//!
//! ```toml
//! [database]
//! path = "/var/lib/tally/tally.db"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 3000
//! allowed_origins = ["https://tally.example.com"]
//!
//! [auth]
//! jwt_secret = "..."
//! api_keys = ["svc-key-1"]
//!
//! [ai]
//! model = "claude-3-5-haiku-latest"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::ai::{AnthropicSuggester, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::db::DB_KEY_ENV;
use crate::error::{Error, Result};

pub const DEFAULT_DB_PATH: &str = "tally.db";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CURRENCY: &str = "USD";

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    /// SQLCipher passphrase; `None` means the caller must opt out of encryption
    pub db_key: Option<String>,
    pub host: String,
    pub port: u16,
    /// Currency for newly seen users
    pub default_currency: String,
    /// HS256 secret for identity-provider access tokens
    pub jwt_secret: Option<String>,
    /// Service-role API keys
    pub api_keys: Vec<String>,
    /// CORS origins; empty means same-origin only
    pub allowed_origins: Vec<String>,
    pub ai: AiConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            db_key: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            default_currency: DEFAULT_CURRENCY.to_string(),
            jwt_secret: None,
            api_keys: Vec::new(),
            allowed_origins: Vec::new(),
            ai: AiConfig {
                api_key: None,
                model: DEFAULT_MODEL.to_string(),
                base_url: DEFAULT_BASE_URL.to_string(),
            },
        }
    }
}

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tally").join("config.toml"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    database: Option<RawDatabase>,
    server: Option<RawServer>,
    auth: Option<RawAuth>,
    ai: Option<RawAi>,
    default_currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDatabase {
    path: Option<PathBuf>,
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawServer {
    host: Option<String>,
    port: Option<u16>,
    allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAuth {
    jwt_secret: Option<String>,
    api_keys: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAi {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
}

/// Split a comma-separated env value, dropping empty entries
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    /// Load the file (explicit path, else the default location if present)
    /// and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Read one TOML file; a missing explicit path is an error
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml(&content)
    }

    /// Parse TOML content on top of the defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        let mut config = Self::default();

        if let Some(db) = raw.database {
            if let Some(path) = db.path {
                config.db_path = path;
            }
            config.db_key = db.key.or(config.db_key);
        }
        if let Some(server) = raw.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if let Some(origins) = server.allowed_origins {
                config.allowed_origins = origins;
            }
        }
        if let Some(auth) = raw.auth {
            config.jwt_secret = auth.jwt_secret.or(config.jwt_secret);
            if let Some(keys) = auth.api_keys {
                config.api_keys = keys;
            }
        }
        if let Some(ai) = raw.ai {
            config.ai.api_key = ai.api_key.or(config.ai.api_key);
            if let Some(model) = ai.model {
                config.ai.model = model;
            }
            if let Some(base_url) = ai.base_url {
                config.ai.base_url = base_url;
            }
        }
        if let Some(currency) = raw.default_currency {
            config.default_currency = currency.trim().to_uppercase();
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides from a lookup function
    ///
    /// Empty values are ignored. An unparseable `TALLY_PORT` leaves the port
    /// unchanged.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("TALLY_DB") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = get(DB_KEY_ENV) {
            self.db_key = Some(v);
        }
        if let Some(v) = get("TALLY_HOST") {
            self.host = v;
        }
        if let Some(v) = get("TALLY_PORT") {
            match v.trim().parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!(value = %v, "Ignoring invalid TALLY_PORT"),
            }
        }
        if let Some(v) = get("TALLY_DEFAULT_CURRENCY") {
            self.default_currency = v.trim().to_uppercase();
        }
        if let Some(v) = get("SUPABASE_JWT_SECRET") {
            self.jwt_secret = Some(v);
        }
        if let Some(v) = get("TALLY_API_KEYS") {
            self.api_keys = split_list(&v);
        }
        if let Some(v) = get("TALLY_ALLOWED_ORIGINS") {
            self.allowed_origins = split_list(&v);
        }
        if let Some(v) = get("ANTHROPIC_API_KEY") {
            self.ai.api_key = Some(v);
        }
        if let Some(v) = get("ANTHROPIC_MODEL") {
            self.ai.model = v;
        }
        if let Some(v) = get("ANTHROPIC_BASE_URL") {
            self.ai.base_url = v;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.default_currency.len() != 3
            || !self.default_currency.chars().all(|c| c.is_ascii_uppercase())
        {
            return Err(Error::Config(format!(
                "default_currency must be a 3-letter ISO code, got '{}'",
                self.default_currency
            )));
        }
        Ok(())
    }

    /// Build the Claude suggester when an API key is configured
    pub fn suggester(&self) -> Option<AnthropicSuggester> {
        self.ai
            .api_key
            .as_deref()
            .map(|key| AnthropicSuggester::new(key, &self.ai.model, &self.ai.base_url))
    }
}
