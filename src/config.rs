// Configuration loader: reads the three secrets needed to reach the
// deployment once at startup. There is no refresh and no defaulting; a
// missing value stops the program before any UI is drawn.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ConfigError;

pub const API_TOKEN_KEY: &str = "DR_API_TOKEN";
pub const API_URL_KEY: &str = "DR_API_URL";
pub const DEPLOYMENT_ID_KEY: &str = "DEPLOYMENT_ID";

/// Project-local secrets file, checked before the per-user one.
const LOCAL_SECRETS: &str = ".predict/secrets.toml";
const APP_DIR: &str = "predict-demo";

/// Immutable connection settings for the lifetime of the process.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub api_token: String,
    pub api_url: String,
    pub deployment_id: String,
}

// Keep the token out of logs and panic messages.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("deployment_id", &self.deployment_id)
            .finish()
    }
}

/// On-disk shape of `secrets.toml`. Unknown keys are ignored so the file can
/// be shared with other tools.
#[derive(Deserialize, Default, Debug)]
struct SecretsFile {
    #[serde(rename = "DR_API_TOKEN")]
    api_token: Option<String>,
    #[serde(rename = "DR_API_URL")]
    api_url: Option<String>,
    #[serde(rename = "DEPLOYMENT_ID")]
    deployment_id: Option<String>,
}

impl Config {
    /// Load the secrets from `path` (or the default locations when `None`),
    /// letting environment variables of the same name override the file.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let source = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_secrets_path(),
        };
        let file = match &source {
            Some(p) => read_secrets(p)?,
            None => {
                debug!("no secrets file found, using environment only");
                SecretsFile::default()
            }
        };
        let config = resolve(file, |key| std::env::var(key).ok())?;
        info!(api_url = %config.api_url, deployment_id = %config.deployment_id, "configuration loaded");
        Ok(config)
    }

    /// Parse secrets from TOML text without consulting the environment.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: SecretsFile = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        resolve(file, |_| None)
    }
}

/// First existing file among the local and per-user locations.
pub fn default_secrets_path() -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from(LOCAL_SECRETS)];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(APP_DIR).join("secrets.toml"));
    }
    candidates.into_iter().find(|p| p.is_file())
}

fn read_secrets(path: &Path) -> Result<SecretsFile, ConfigError> {
    debug!(path = %path.display(), "reading secrets file");
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve(file: SecretsFile, env: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
    let pick = |key: &'static str, from_file: Option<String>| -> Result<String, ConfigError> {
        let present = |v: String| {
            let v = v.trim().to_string();
            (!v.is_empty()).then_some(v)
        };
        env(key)
            .and_then(present)
            .or_else(|| from_file.and_then(present))
            .ok_or(ConfigError::Missing(key))
    };
    Ok(Config {
        api_token: pick(API_TOKEN_KEY, file.api_token)?,
        api_url: pick(API_URL_KEY, file.api_url)?,
        deployment_id: pick(DEPLOYMENT_ID_KEY, file.deployment_id)?,
    })
}
