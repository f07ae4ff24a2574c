use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::config::{BackendMode, Settings};
use crate::models::{AuthSession, AuthUser};
use crate::services::source::{IdentityError, IdentityProvider};

const AUDIENCE: &str = "authenticated";

/// Access-token claims, compatible with the hosted identity service's tokens
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: String,
    exp: i64,
    #[serde(default)]
    iat: i64,
    aud: String,
    #[serde(default)]
    role: String,
}

/// Session-change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(AuthUser),
    SignedOut(String),
}

struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Front for the identity collaborator
///
/// Completes sessions with self-issued tokens when the provider has none
/// (demo mode), verifies bearer tokens, and broadcasts sign-in / sign-out.
pub struct SessionManager {
    identity: Arc<dyn IdentityProvider>,
    keys: Option<TokenKeys>,
    token_ttl: Duration,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(identity: Arc<dyn IdentityProvider>, jwt_secret: Option<&str>, token_ttl: Duration) -> Self {
        let keys = jwt_secret.map(|secret| TokenKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        });
        let (events, _) = broadcast::channel(64);

        Self {
            identity,
            keys,
            token_ttl,
            events,
        }
    }

    pub fn from_settings(settings: &Settings, identity: Arc<dyn IdentityProvider>) -> Self {
        let ttl = Duration::from_secs(settings.local.token_ttl_secs);

        match settings.backend.mode() {
            BackendMode::Remote => Self::new(identity, settings.backend.jwt_secret.as_deref(), ttl),
            BackendMode::Demo => match settings.local.jwt_secret.as_deref() {
                Some(secret) => Self::new(identity, Some(secret), ttl),
                None => {
                    tracing::warn!("No local.jwt_secret configured, demo sessions will not survive a restart");
                    let secret = uuid::Uuid::new_v4().to_string();
                    Self::new(identity, Some(&secret), ttl)
                }
            },
        }
    }

    /// Stream of sign-in / sign-out events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let session = self.identity.sign_up(email, password).await?;
        let session = self.complete(session)?;
        self.notify(SessionEvent::SignedIn(session.user.clone()));
        Ok(session)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let session = self.identity.sign_in(email, password).await?;
        let session = self.complete(session)?;
        tracing::info!("User {} signed in", session.user.id);
        self.notify(SessionEvent::SignedIn(session.user.clone()));
        Ok(session)
    }

    /// Resolve a bearer token to its user
    pub async fn authenticate(&self, access_token: &str) -> Result<AuthUser, IdentityError> {
        match &self.keys {
            Some(keys) => {
                let mut validation = Validation::new(Algorithm::HS256);
                validation.set_audience(&[AUDIENCE]);

                let data = decode::<Claims>(access_token, &keys.decoding, &validation).map_err(|e| {
                    tracing::debug!("Rejected access token: {}", e);
                    IdentityError::Unauthorized
                })?;

                Ok(AuthUser {
                    id: data.claims.sub,
                    email: data.claims.email,
                })
            }
            None => self.identity.get_user(access_token).await,
        }
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<AuthUser, IdentityError> {
        let user = self.authenticate(access_token).await?;
        self.identity.sign_out(access_token).await?;

        tracing::info!("User {} signed out", user.id);
        self.notify(SessionEvent::SignedOut(user.id.clone()));
        Ok(user)
    }

    fn complete(&self, mut session: AuthSession) -> Result<AuthSession, IdentityError> {
        if session.access_token.is_none() && !self.identity.issues_tokens() {
            let (token, expires_at) = self.mint(&session.user)?;
            session.access_token = Some(token);
            session.expires_at = Some(expires_at);
        }
        Ok(session)
    }

    fn mint(&self, user: &AuthUser) -> Result<(String, DateTime<Utc>), IdentityError> {
        let keys = self.keys.as_ref().ok_or(IdentityError::Unauthorized)?;

        let now = Utc::now();
        let ttl = ChronoDuration::from_std(self.token_ttl).unwrap_or_else(|_| ChronoDuration::days(7));
        let expires_at = now + ttl;

        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            aud: AUDIENCE.to_string(),
            role: AUDIENCE.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)?;
        Ok((token, expires_at))
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
