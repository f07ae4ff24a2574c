use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{BackendMode, Settings};
use crate::models::{AuthSession, AuthUser, LikeEvent, LikeInsert, Match, NewLikeEvent, NewSwipe, Profile};
use crate::services::local::{LocalStore, LocalStoreError};
use crate::services::supabase::{SupabaseClient, SupabaseError};

/// Errors surfaced by either store implementation
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("remote store: {0}")]
    Remote(#[from] SupabaseError),

    #[error("local store: {0}")]
    Local(#[from] LocalStoreError),
}

impl DataSourceError {
    /// The table being read does not exist (fresh project without the likes migration)
    pub fn is_missing_table(&self) -> bool {
        matches!(self, DataSourceError::Remote(SupabaseError::MissingTable(_)))
    }
}

/// Errors from the identity collaborator
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid login credentials")]
    InvalidCredentials,

    #[error("user already registered")]
    AlreadyRegistered,

    /// The identity service refused the request, e.g. a weak password
    #[error("{0}")]
    Rejected(String),

    #[error("session is missing or expired")]
    Unauthorized,

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("identity service: {0}")]
    Backend(#[from] DataSourceError),
}

/// Rows, likes, matches and photo storage
///
/// Implemented by the hosted backend client and by the demo-mode local store;
/// one of them is chosen at startup and shared by every component.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn mode(&self) -> BackendMode;

    /// All profiles, newest first
    async fn fetch_profiles(&self) -> Result<Vec<Profile>, DataSourceError>;

    /// Insert a like-event; a duplicate is reported, not failed
    async fn insert_like(
        &self,
        like: &NewLikeEvent,
        access_token: Option<&str>,
    ) -> Result<LikeInsert, DataSourceError>;

    async fn insert_swipe(&self, swipe: &NewSwipe, access_token: &str) -> Result<(), DataSourceError>;

    /// Matches involving `user_id`, newest first, with both profiles joined
    async fn fetch_matches(&self, user_id: &str, access_token: &str) -> Result<Vec<Match>, DataSourceError>;

    /// Like-events for exactly the given profile ids
    async fn likes_for_profiles(&self, profile_ids: &[String]) -> Result<Vec<LikeEvent>, DataSourceError>;

    async fn create_profile(&self, profile: &Profile, access_token: Option<&str>) -> Result<(), DataSourceError>;

    /// Store a photo and return its public URL
    async fn upload_photo(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        access_token: Option<&str>,
    ) -> Result<String, DataSourceError>;
}

/// Sign-up, password sign-in, session lookup and sign-out
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Whether the provider hands out its own access tokens
    fn issues_tokens(&self) -> bool;

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError>;

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, IdentityError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;
}

/// The store and identity collaborator chosen for this process
#[derive(Clone)]
pub struct Backend {
    pub data: Arc<dyn DataSource>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl Backend {
    /// Pick remote or demo mode once, from configuration
    pub async fn from_settings(settings: &Settings) -> Result<Self, DataSourceError> {
        match settings.backend.mode() {
            BackendMode::Remote => {
                let client = Arc::new(SupabaseClient::from_settings(&settings.backend)?);
                tracing::info!("Using hosted backend at {}", client.base_url());
                Ok(Self {
                    data: client.clone(),
                    identity: client,
                })
            }
            BackendMode::Demo => {
                let store = Arc::new(LocalStore::open(&settings.local.data_dir).await?);
                tracing::info!(
                    "Backend not configured, running in demo mode (data dir: {})",
                    settings.local.data_dir
                );
                Ok(Self {
                    data: store.clone(),
                    identity: store,
                })
            }
        }
    }

    pub fn mode(&self) -> BackendMode {
        self.data.mode()
    }
}
