use crate::error::{config_error, env_error, CalResult};
use crate::extraction::model::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TIMEOUT};
use crate::extraction::MAX_ENCODED_BYTES;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default location of the optional settings file
pub const DEFAULT_CONFIG_PATH: &str = "config/calvert.toml";
/// Default port for the web interface
pub const DEFAULT_PORT: u16 = 3000;
/// Calendar used when none is configured
pub const DEFAULT_CALENDAR_ID: &str = "primary";
/// Largest upload body accepted by the web interface
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Non-secret settings that may come from `config/calvert.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSettings {
    pub model: Option<String>,
    pub model_timeout_secs: Option<u64>,
    pub model_max_tokens: Option<u64>,
    pub max_image_bytes: Option<usize>,
    pub max_upload_bytes: Option<usize>,
    pub oauth_redirect_uri: Option<String>,
    pub calendar_id: Option<String>,
    pub port: Option<u16>,
    pub upload_dir: Option<PathBuf>,
}

impl FileSettings {
    /// Read settings from a TOML file
    pub fn from_file(path: &Path) -> CalResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    /// Anthropic API key
    pub anthropic_api_key: String,
    /// Model used for extraction
    pub model: String,
    /// Seconds to wait for a model reply
    pub model_timeout_secs: u64,
    /// Maximum tokens in a model reply
    pub model_max_tokens: u64,
    /// Encoded image size above which images are halved
    pub max_image_bytes: usize,
    /// Largest request body the web interface accepts; larger uploads get 413
    pub max_upload_bytes: usize,
    /// Google OAuth client ID
    pub google_client_id: String,
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// Where Google sends the user back after consent
    pub oauth_redirect_uri: String,
    /// Calendar that receives new events
    pub calendar_id: String,
    /// Secret for signing session cookies
    pub session_secret: String,
    /// Port for the web interface
    pub port: u16,
    /// Directory for uploaded images
    pub upload_dir: PathBuf,
}

impl Config {
    /// Load configuration from `.env`, the settings file and the environment
    pub fn load() -> CalResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let path = env::var("CALVERT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = Path::new(&path);
        let file = if path.exists() {
            Some(FileSettings::from_file(path)?)
        } else {
            None
        };

        Self::from_sources(|key| env::var(key).ok(), file.unwrap_or_default())
    }

    /// Assemble a configuration from an environment lookup and file settings.
    /// Environment values take precedence over the file.
    pub fn from_sources(
        lookup: impl Fn(&str) -> Option<String>,
        file: FileSettings,
    ) -> CalResult<Self> {
        let anthropic_api_key = lookup("ANTHROPIC_API_KEY")
            .filter(|key| !key.is_empty())
            .ok_or_else(|| env_error("ANTHROPIC_API_KEY"))?;

        let model = lookup("ANTHROPIC_MODEL")
            .or(file.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let model_timeout_secs = parse_var(&lookup, "MODEL_TIMEOUT_SECS")?
            .or(file.model_timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT.as_secs());

        let model_max_tokens = parse_var(&lookup, "MODEL_MAX_TOKENS")?
            .or(file.model_max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let max_image_bytes = parse_var(&lookup, "MAX_IMAGE_BYTES")?
            .or(file.max_image_bytes)
            .unwrap_or(MAX_ENCODED_BYTES);

        let max_upload_bytes = parse_var(&lookup, "MAX_UPLOAD_BYTES")?
            .or(file.max_upload_bytes)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let port = parse_var(&lookup, "PORT")?
            .or(file.port)
            .unwrap_or(DEFAULT_PORT);

        let oauth_redirect_uri = lookup("OAUTH_REDIRECT_URI")
            .or(file.oauth_redirect_uri)
            .unwrap_or_else(|| format!("http://localhost:{}/oauth2callback", port));

        let calendar_id = lookup("CALENDAR_ID")
            .or(file.calendar_id)
            .unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string());

        let upload_dir = lookup("UPLOAD_DIR")
            .map(PathBuf::from)
            .or(file.upload_dir)
            .unwrap_or_else(|| PathBuf::from("./uploads"));

        // A fresh secret per process invalidates old cookies on restart
        let session_secret = lookup("SESSION_SECRET")
            .filter(|secret| !secret.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(Config {
            anthropic_api_key,
            model,
            model_timeout_secs,
            model_max_tokens,
            max_image_bytes,
            max_upload_bytes,
            google_client_id: lookup("GOOGLE_CLIENT_ID").unwrap_or_default(),
            google_client_secret: lookup("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            oauth_redirect_uri,
            calendar_id,
            session_secret,
            port,
            upload_dir,
        })
    }

    /// Fail unless the Google OAuth client is configured
    pub fn require_google(&self) -> CalResult<()> {
        if self.google_client_id.is_empty() {
            return Err(env_error("GOOGLE_CLIENT_ID"));
        }
        if self.google_client_secret.is_empty() {
            return Err(env_error("GOOGLE_CLIENT_SECRET"));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> CalResult<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| config_error(&format!("Invalid {} value: {}", key, raw))),
    }
}
