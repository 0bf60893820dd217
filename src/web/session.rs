use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, error};
use uuid::Uuid;

use crate::calendar::Credentials;
use crate::error::{auth_error, CalResult};

/// Name of the cookie carrying the signed session id
pub const SESSION_COOKIE: &str = "calvert_session";

/// Sessions live this long without being renewed
const SESSION_TTL_MINUTES: i64 = 60 * 24;

/// JWT claims in the session cookie
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Session id
    pub sub: String,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Issued at (as UTC timestamp)
    pub iat: usize,
}

/// What the server remembers about one browser
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    /// CSRF state of an OAuth flow in progress
    pub oauth_state: Option<String>,
    /// Calendar credentials once the user has logged in
    pub credentials: Option<Credentials>,
}

struct SessionEntry {
    data: SessionData,
    /// Unix timestamp after which the entry is dropped
    expires_at: i64,
}

/// In-memory sessions addressed by signed cookies. Nothing outlives the
/// process, and entries older than the session lifetime are evicted.
pub struct SessionService {
    secret: String,
    ttl: Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionService {
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, Duration::minutes(SESSION_TTL_MINUTES))
    }

    /// Sessions that live for `ttl` instead of a day
    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        Self {
            secret: secret.to_string(),
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start an empty session and return its id. Expired sessions are
    /// pruned first.
    pub async fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.expires_at > now);
        if sessions.len() < before {
            debug!("Evicted {} expired sessions", before - sessions.len());
        }

        sessions.insert(
            id.clone(),
            SessionEntry {
                data: SessionData::default(),
                expires_at: now + self.ttl.num_seconds(),
            },
        );
        debug!("Created session {}", id);
        id
    }

    /// Live session data; an expired entry is removed and reported as absent
    pub async fn get(&self, id: &str) -> Option<SessionData> {
        let now = Utc::now().timestamp();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(id) {
                Some(entry) if entry.expires_at > now => return Some(entry.data.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        self.remove(id).await;
        debug!("Session {} expired", id);
        None
    }

    /// Apply `f` to a live session, returning false if it doesn't exist
    pub async fn update(&self, id: &str, f: impl FnOnce(&mut SessionData)) -> bool {
        let now = Utc::now().timestamp();
        match self.sessions.write().await.get_mut(id) {
            Some(entry) if entry.expires_at > now => {
                f(&mut entry.data);
                true
            }
            _ => false,
        }
    }

    /// Number of sessions held, expired ones included until pruned
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn remove(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }

    /// Sign a session id for the cookie
    pub fn issue_token(&self, session_id: &str) -> CalResult<String> {
        let now = Utc::now();
        let exp = now + self.ttl;

        let claims = SessionClaims {
            sub: session_id.to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| auth_error(&format!("Failed to sign session: {}", e)))
    }

    /// Verify a cookie token and return the session id it names
    pub fn validate_token(&self, token: &str) -> CalResult<String> {
        decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|token_data| token_data.claims.sub)
        .map_err(|e| {
            error!("Session token validation error: {:?}", e);
            auth_error("Invalid session token")
        })
    }

    /// Find the live session referenced by the request cookies
    pub async fn resolve(&self, jar: &CookieJar) -> Option<(String, SessionData)> {
        let token = jar.get(SESSION_COOKIE)?;
        let id = self.validate_token(token.value()).ok()?;
        let data = self.get(&id).await?;
        Some((id, data))
    }

    /// Reuse the request's session or start a new one, returning its id and
    /// the jar with the session cookie set
    pub async fn resolve_or_create(&self, jar: CookieJar) -> CalResult<(String, CookieJar)> {
        if let Some((id, _)) = self.resolve(&jar).await {
            return Ok((id, jar));
        }

        let id = self.create().await;
        let cookie = self.cookie(&id)?;
        Ok((id, jar.add(cookie)))
    }

    /// Session cookie for `session_id`
    pub fn cookie(&self, session_id: &str) -> CalResult<Cookie<'static>> {
        let token = self.issue_token(session_id)?;
        Ok(Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            // Lax so the cookie survives the redirect back from Google
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(self.ttl.num_seconds()))
            .build())
    }

    /// Drop the session referenced by the cookies and clear the cookie
    pub async fn end(&self, jar: CookieJar) -> CookieJar {
        if let Some((id, _)) = self.resolve(&jar).await {
            self.remove(&id).await;
            debug!("Ended session {}", id);
        }
        jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
    }
}
