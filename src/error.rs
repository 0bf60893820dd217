use miette::Diagnostic;
use thiserror::Error;

use crate::models::SchemaError;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Unsupported file type: {0}")]
    #[diagnostic(
        code(calvert::unsupported_format),
        help("Supported extensions are .jpg, .jpeg, .png, .webp and .gif")
    )]
    UnsupportedFormat(String),

    #[error("Image processing error: {0}")]
    #[diagnostic(code(calvert::image))]
    Image(String),

    #[error("Model invocation error: {0}")]
    #[diagnostic(code(calvert::remote_invocation))]
    RemoteInvocation(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error("Environment error: {0}")]
    #[diagnostic(code(calvert::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(calvert::config))]
    Config(String),

    #[error("Google Calendar API error: {0}")]
    #[diagnostic(code(calvert::google_calendar))]
    GoogleCalendar(String),

    #[error("Authentication error: {0}")]
    #[diagnostic(code(calvert::auth))]
    Auth(String),

    #[error(transparent)]
    #[diagnostic(code(calvert::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(calvert::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(calvert::other))]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type CalResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create model invocation errors
pub fn model_error(message: &str) -> Error {
    Error::RemoteInvocation(message.to_string())
}

/// Helper to create Google Calendar errors
pub fn google_calendar_error(message: &str) -> Error {
    Error::GoogleCalendar(message.to_string())
}

/// Helper to create authentication errors
pub fn auth_error(message: &str) -> Error {
    Error::Auth(message.to_string())
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}
