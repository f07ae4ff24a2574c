use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::BackendMode;
use crate::models::{
    sample_profiles, AuthSession, AuthUser, LikeEvent, LikeInsert, Match, NewLikeEvent, NewSwipe,
    Profile, Swipe,
};
use crate::services::source::{DataSource, DataSourceError, IdentityError, IdentityProvider};

const STORE_FILE: &str = "demo_store.json";
const PHOTO_DIR: &str = "photos";

/// Errors that can occur in the demo-mode store
#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MatchRow {
    id: String,
    user1_id: String,
    user2_id: String,
    created_at: DateTime<Utc>,
}

/// Everything demo mode keeps, written as one JSON document
#[derive(Debug, Default, Serialize, Deserialize)]
struct LocalData {
    #[serde(default)]
    profiles: Vec<Profile>,
    #[serde(default)]
    likes: Vec<LikeEvent>,
    #[serde(default)]
    swipes: Vec<Swipe>,
    #[serde(default)]
    matches: Vec<MatchRow>,
    #[serde(default)]
    users: Vec<AuthUser>,
}

/// Demo-mode store
///
/// Stands in for the hosted backend when none is configured. Holds the
/// sample profiles plus whatever demo users create, and persists to a JSON
/// file after every write. Mutual likes produce a match row here, the way the
/// hosted database's trigger does.
pub struct LocalStore {
    file: Option<PathBuf>,
    photo_dir: Option<PathBuf>,
    data: RwLock<LocalData>,
}

impl LocalStore {
    /// Open (or seed) the store under `data_dir`
    pub async fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, LocalStoreError> {
        let dir = data_dir.as_ref();
        tokio::fs::create_dir_all(dir.join(PHOTO_DIR)).await?;

        let file = dir.join(STORE_FILE);
        let data = match tokio::fs::read(&file).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LocalData {
                profiles: sample_profiles(),
                ..LocalData::default()
            },
            Err(e) => return Err(e.into()),
        };

        let store = Self {
            file: Some(file),
            photo_dir: Some(dir.join(PHOTO_DIR)),
            data: RwLock::new(data),
        };
        store.persist(&*store.data.read().await).await?;

        Ok(store)
    }

    /// Non-persistent store seeded with the sample profiles
    pub fn in_memory() -> Self {
        Self::with_profiles(sample_profiles())
    }

    /// Non-persistent store holding exactly `profiles`
    pub fn with_profiles(profiles: Vec<Profile>) -> Self {
        Self {
            file: None,
            photo_dir: None,
            data: RwLock::new(LocalData {
                profiles,
                ..LocalData::default()
            }),
        }
    }

    async fn persist(&self, data: &LocalData) -> Result<(), LocalStoreError> {
        let Some(file) = &self.file else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(data)?;
        let tmp = file.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, file).await?;
        Ok(())
    }

    fn find_user<'a>(data: &'a LocalData, email: &str) -> Option<&'a AuthUser> {
        data.users.iter().find(|u| u.email.eq_ignore_ascii_case(email))
    }

    fn new_user(email: &str) -> AuthUser {
        AuthUser {
            id: format!("demo-user-{}", uuid::Uuid::new_v4().simple()),
            email: email.to_string(),
        }
    }

    fn session_for(user: AuthUser) -> AuthSession {
        AuthSession {
            user,
            access_token: None,
            expires_at: None,
        }
    }
}

#[async_trait]
impl DataSource for LocalStore {
    fn mode(&self) -> BackendMode {
        BackendMode::Demo
    }

    async fn fetch_profiles(&self) -> Result<Vec<Profile>, DataSourceError> {
        let mut profiles = self.data.read().await.profiles.clone();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(profiles)
    }

    async fn insert_like(
        &self,
        like: &NewLikeEvent,
        _access_token: Option<&str>,
    ) -> Result<LikeInsert, DataSourceError> {
        let mut data = self.data.write().await;

        let duplicate = data.likes.iter().any(|l| {
            l.profile_id == like.profile_id
                && l.liker_session_id == like.liker_session_id
                && l.like_type == like.like_type
        });
        if duplicate {
            return Ok(LikeInsert::AlreadyRecorded);
        }

        data.likes.push(LikeEvent {
            profile_id: like.profile_id.clone(),
            like_type: like.like_type,
            liker_session_id: like.liker_session_id.clone(),
            created_at: Utc::now(),
        });
        self.persist(&data).await?;

        Ok(LikeInsert::Recorded)
    }

    async fn insert_swipe(&self, swipe: &NewSwipe, _access_token: &str) -> Result<(), DataSourceError> {
        let mut data = self.data.write().await;

        if data
            .swipes
            .iter()
            .any(|s| s.swiper_id == swipe.swiper_id && s.swiped_id == swipe.swiped_id)
        {
            tracing::debug!("Swipe {} -> {} already recorded", swipe.swiper_id, swipe.swiped_id);
            return Ok(());
        }

        let now = Utc::now();
        data.swipes.push(Swipe {
            swiper_id: swipe.swiper_id.clone(),
            swiped_id: swipe.swiped_id.clone(),
            is_like: swipe.is_like,
            created_at: now,
        });

        let reciprocated = swipe.is_like
            && swipe.swiper_id != swipe.swiped_id
            && data.swipes.iter().any(|s| {
                s.is_like && s.swiper_id == swipe.swiped_id && s.swiped_id == swipe.swiper_id
            });
        let already_matched = data.matches.iter().any(|m| {
            (m.user1_id == swipe.swiper_id && m.user2_id == swipe.swiped_id)
                || (m.user1_id == swipe.swiped_id && m.user2_id == swipe.swiper_id)
        });

        if reciprocated && !already_matched {
            tracing::info!("Mutual like between {} and {}", swipe.swiped_id, swipe.swiper_id);
            data.matches.push(MatchRow {
                id: uuid::Uuid::new_v4().to_string(),
                user1_id: swipe.swiped_id.clone(),
                user2_id: swipe.swiper_id.clone(),
                created_at: now,
            });
        }

        self.persist(&data).await?;
        Ok(())
    }

    async fn fetch_matches(&self, user_id: &str, _access_token: &str) -> Result<Vec<Match>, DataSourceError> {
        let data = self.data.read().await;
        let profile = |id: &str| data.profiles.iter().find(|p| p.id == id).cloned();

        let mut matches: Vec<Match> = data
            .matches
            .iter()
            .filter(|m| m.user1_id == user_id || m.user2_id == user_id)
            .map(|m| Match {
                id: m.id.clone(),
                user1_id: m.user1_id.clone(),
                user2_id: m.user2_id.clone(),
                created_at: m.created_at,
                user1: profile(&m.user1_id),
                user2: profile(&m.user2_id),
            })
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matches)
    }

    async fn likes_for_profiles(&self, profile_ids: &[String]) -> Result<Vec<LikeEvent>, DataSourceError> {
        let data = self.data.read().await;
        Ok(data
            .likes
            .iter()
            .filter(|l| profile_ids.contains(&l.profile_id))
            .cloned()
            .collect())
    }

    async fn create_profile(&self, profile: &Profile, _access_token: Option<&str>) -> Result<(), DataSourceError> {
        let mut data = self.data.write().await;

        match data.profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile.clone(),
            None => data.profiles.push(profile.clone()),
        }
        self.persist(&data).await?;

        Ok(())
    }

    async fn upload_photo(
        &self,
        file_name: &str,
        _content_type: &str,
        bytes: Vec<u8>,
        _access_token: Option<&str>,
    ) -> Result<String, DataSourceError> {
        match &self.photo_dir {
            Some(dir) => {
                let path = dir.join(file_name);
                tokio::fs::write(&path, bytes)
                    .await
                    .map_err(LocalStoreError::from)?;
                Ok(format!("file://{}", path.display()))
            }
            None => Ok(format!("memory://{}/{}", PHOTO_DIR, file_name)),
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalStore {
    fn issues_tokens(&self) -> bool {
        false
    }

    async fn sign_up(&self, email: &str, _password: &str) -> Result<AuthSession, IdentityError> {
        let mut data = self.data.write().await;
        if Self::find_user(&data, email).is_some() {
            return Err(IdentityError::AlreadyRegistered);
        }

        let user = Self::new_user(email);
        data.users.push(user.clone());
        self.persist(&data).await.map_err(DataSourceError::from)?;

        Ok(Self::session_for(user))
    }

    /// Demo sign-in accepts any password and registers unknown emails on the fly
    async fn sign_in(&self, email: &str, _password: &str) -> Result<AuthSession, IdentityError> {
        let mut data = self.data.write().await;
        if let Some(user) = Self::find_user(&data, email) {
            return Ok(Self::session_for(user.clone()));
        }

        let user = Self::new_user(email);
        data.users.push(user.clone());
        self.persist(&data).await.map_err(DataSourceError::from)?;

        Ok(Self::session_for(user))
    }

    async fn get_user(&self, _access_token: &str) -> Result<AuthUser, IdentityError> {
        // Demo tokens are self-issued JWTs, checked by the session manager
        Err(IdentityError::Unauthorized)
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), IdentityError> {
        Ok(())
    }
}
