use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::config::Config;
use crate::error::{auth_error, CalResult};

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Tokens are treated as expired this many seconds early
const EXPIRY_SKEW_SECS: i64 = 60;

/// OAuth credentials kept in a user's session.
///
/// The client secret is deliberately absent; it stays in [`Config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Access token for the Calendar API
    pub token: String,
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    /// Unix timestamp after which `token` is no longer valid
    pub expires_at: Option<i64>,
}

impl Credentials {
    pub fn is_expired(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now + EXPIRY_SKEW_SECS >= expires_at,
            None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

/// Google OAuth 2.0 authorization-code flow
#[derive(Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_url: String,
    token_url: String,
    client: Client,
}

impl OAuthClient {
    pub fn new(client_id: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            client: Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.google_client_id,
            &config.google_client_secret,
            &config.oauth_redirect_uri,
        )
    }

    /// Point the client at different endpoints
    pub fn with_endpoints(mut self, auth_url: &str, token_url: &str) -> Self {
        self.auth_url = auth_url.to_string();
        self.token_url = token_url.to_string();
        self
    }

    /// URL that sends the user to Google's consent screen
    pub fn authorization_url(&self, state: &str) -> CalResult<String> {
        let url = Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("scope", CALENDAR_SCOPE),
                ("state", state),
            ],
        )
        .map_err(|e| auth_error(&format!("Failed to build authorization URL: {}", e)))?;

        Ok(url.into())
    }

    /// Exchange an authorization code for credentials
    pub async fn exchange_code(&self, code: &str) -> CalResult<Credentials> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let token = self.request_token(&params).await?;
        info!("Obtained Google Calendar credentials");

        Ok(self.credentials_from(token, None))
    }

    /// Get a fresh access token, keeping the refresh token when Google
    /// doesn't issue a new one
    pub async fn refresh(&self, credentials: &Credentials) -> CalResult<Credentials> {
        let refresh_token = credentials
            .refresh_token
            .as_deref()
            .ok_or_else(|| auth_error("No refresh token in session credentials"))?;

        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token = self.request_token(&params).await?;
        info!("Refreshed Google Calendar access token");

        let mut refreshed = self.credentials_from(token, Some(refresh_token));
        if refreshed.scopes.is_empty() {
            refreshed.scopes = credentials.scopes.clone();
        }
        Ok(refreshed)
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> CalResult<TokenResponse> {
        let response = self
            .client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| auth_error(&format!("Failed to reach token endpoint: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            warn!("Token request failed with HTTP {}", status);
            return Err(auth_error(&format!(
                "Failed to get token: HTTP {} - {}",
                status, error_body
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| auth_error(&format!("Failed to parse token response: {}", e)))
    }

    fn credentials_from(&self, token: TokenResponse, previous_refresh: Option<&str>) -> Credentials {
        let expires_in = token.expires_in.unwrap_or(3600);

        Credentials {
            token: token.access_token,
            refresh_token: token
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            token_uri: self.token_url.clone(),
            client_id: self.client_id.clone(),
            scopes: token
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            expires_at: Some(Utc::now().timestamp() + expires_in),
        }
    }
}
