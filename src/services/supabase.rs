use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::{BackendMode, BackendSettings};
use crate::models::{AuthSession, AuthUser, LikeEvent, LikeInsert, Match, NewLikeEvent, NewSwipe, Profile};
use crate::services::source::{DataSource, DataSourceError, IdentityError, IdentityProvider};

const UNIQUE_VIOLATION: &str = "23505";
const UNDEFINED_TABLE: &str = "42P01";
const SCHEMA_CACHE_MISS: &str = "PGRST205";
const USER_EXISTS_CODES: [&str; 3] = ["user_already_exists", "email_exists", UNIQUE_VIOLATION];

const PROFILE_COLUMNS: &str =
    "id,email,full_name,age,school,bio,photo_urls,created_at,undergrad_school,pre_mba_company,interests";

/// Errors that can occur when interacting with the hosted backend
#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    ApiError {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Duplicate row: {0}")]
    Duplicate(String),

    #[error("Table does not exist: {0}")]
    MissingTable(String),

    #[error("Unauthorized: invalid API key or token")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// PostgREST / GoTrue error body
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<Value>,
    error_code: Option<String>,
    message: Option<String>,
    msg: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Table names in the hosted database
#[derive(Debug, Clone)]
pub struct SupabaseTables {
    pub profiles: String,
    pub profile_likes: String,
    pub swipes: String,
    pub matches: String,
}

impl Default for SupabaseTables {
    fn default() -> Self {
        Self {
            profiles: "profiles".to_string(),
            profile_likes: "profile_likes".to_string(),
            swipes: "swipes".to_string(),
            matches: "matches".to_string(),
        }
    }
}

/// Hosted backend client
///
/// Handles all communication with the backend-as-a-service:
/// - Profile, like, swipe and match rows (PostgREST)
/// - Sign-up, sign-in and session lookup (GoTrue)
/// - Profile photo uploads (object storage)
pub struct SupabaseClient {
    base_url: String,
    anon_key: String,
    photo_bucket: String,
    client: Client,
    tables: SupabaseTables,
}

impl SupabaseClient {
    /// Create a new client
    pub fn new(
        base_url: String,
        anon_key: String,
        photo_bucket: String,
        timeout: Duration,
    ) -> Result<Self, SupabaseError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
            photo_bucket,
            client,
            tables: SupabaseTables::default(),
        })
    }

    pub fn from_settings(settings: &BackendSettings) -> Result<Self, SupabaseError> {
        Self::new(
            settings.url.clone().unwrap_or_default(),
            settings.anon_key.clone().unwrap_or_default(),
            settings.photo_bucket.clone(),
            settings.timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Public URL of an object in the photo bucket
    pub fn public_photo_url(&self, file_name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.photo_bucket, file_name
        )
    }

    fn rest_url(&self, table: &str, params: &[(&str, String)]) -> String {
        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        if query.is_empty() {
            format!("{}/rest/v1/{}", self.base_url, table)
        } else {
            format!("{}/rest/v1/{}?{}", self.base_url, table, query)
        }
    }

    fn authorized(&self, builder: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.anon_key))
    }

    /// Turn a non-success response into a typed error
    async fn error_from(response: Response, context: &str) -> SupabaseError {
        let status = response.status();
        let body: ErrorBody = response.json().await.unwrap_or_default();

        let code = body.code.map(|c| match c {
            Value::String(s) => s,
            other => other.to_string(),
        });
        let message = body
            .message
            .or(body.msg)
            .or(body.error_description)
            .or(body.error)
            .unwrap_or_else(|| status.to_string());

        match code.as_deref() {
            Some(UNIQUE_VIOLATION) => return SupabaseError::Duplicate(message),
            Some(UNDEFINED_TABLE) | Some(SCHEMA_CACHE_MISS) => {
                return SupabaseError::MissingTable(context.to_string())
            }
            _ => {}
        }

        match status {
            StatusCode::CONFLICT => SupabaseError::Duplicate(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SupabaseError::Unauthorized,
            _ => SupabaseError::ApiError {
                status: status.as_u16(),
                code,
                message: format!("{}: {}", context, message),
            },
        }
    }

    /// Sign-up refusals: an existing account, a message for the user, or a
    /// backend failure
    fn sign_up_error(status: StatusCode, body: ErrorBody) -> IdentityError {
        let code = body.error_code.or_else(|| {
            body.code.and_then(|c| match c {
                Value::String(s) => Some(s),
                _ => None,
            })
        });
        let message = body
            .msg
            .or(body.message)
            .or(body.error_description)
            .or(body.error);

        let duplicate_code = code.as_deref().is_some_and(|c| USER_EXISTS_CODES.contains(&c));
        let duplicate_message = message
            .as_deref()
            .is_some_and(|m| m.to_lowercase().contains("already registered"));
        if duplicate_code || duplicate_message || status == StatusCode::CONFLICT {
            return IdentityError::AlreadyRegistered;
        }

        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                IdentityError::Rejected(message.unwrap_or_else(|| status.to_string()))
            }
            _ => DataSourceError::from(SupabaseError::ApiError {
                status: status.as_u16(),
                code,
                message: format!("signup: {}", message.unwrap_or_else(|| status.to_string())),
            })
            .into(),
        }
    }

    async fn get_rows(&self, url: &str, access_token: Option<&str>, context: &str) -> Result<Vec<Value>, SupabaseError> {
        tracing::debug!("Fetching {} from: {}", context, url);

        let response = self
            .authorized(self.client.get(url), access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, context).await);
        }

        let json: Value = response.json().await?;
        match json {
            Value::Array(rows) => Ok(rows),
            _ => Err(SupabaseError::InvalidResponse(format!(
                "Expected an array of {} rows",
                context
            ))),
        }
    }

    async fn insert_row<T: serde::Serialize + ?Sized>(
        &self,
        table: &str,
        row: &T,
        access_token: Option<&str>,
        prefer: &str,
    ) -> Result<(), SupabaseError> {
        let url = self.rest_url(table, &[]);

        let response = self
            .authorized(self.client.post(&url), access_token)
            .header("Prefer", prefer)
            .json(row)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, table).await);
        }

        Ok(())
    }

    fn parse_session(json: Value) -> Result<AuthSession, SupabaseError> {
        let access_token = json
            .get("access_token")
            .and_then(|t| t.as_str())
            .map(String::from);
        let expires_at = json
            .get("expires_in")
            .and_then(|e| e.as_i64())
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs));

        // Sign-up without auto-confirm returns the bare user object
        let user_json = json.get("user").cloned().unwrap_or(json);
        let user = Self::parse_user(user_json)?;

        Ok(AuthSession {
            user,
            access_token,
            expires_at,
        })
    }

    fn parse_user(json: Value) -> Result<AuthUser, SupabaseError> {
        let id = json
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SupabaseError::InvalidResponse("Missing user id".into()))?;
        let email = json
            .get("email")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        Ok(AuthUser {
            id: id.to_string(),
            email: email.to_string(),
        })
    }

    async fn auth_post(&self, path: &str, body: &Value) -> Result<Response, SupabaseError> {
        let url = format!("{}/auth/v1/{}", self.base_url, path);
        Ok(self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(body)
            .send()
            .await?)
    }
}

/// PostgREST `in` list with every value quoted
fn in_list(values: &[String]) -> String {
    let quoted = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({})", quoted)
}

#[async_trait]
impl DataSource for SupabaseClient {
    fn mode(&self) -> BackendMode {
        BackendMode::Remote
    }

    async fn fetch_profiles(&self) -> Result<Vec<Profile>, DataSourceError> {
        let url = self.rest_url(
            &self.tables.profiles,
            &[
                ("select", PROFILE_COLUMNS.to_string()),
                ("order", "created_at.desc".to_string()),
            ],
        );

        let rows = self.get_rows(&url, None, "profiles").await?;
        let total = rows.len();

        let profiles: Vec<Profile> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    tracing::debug!("Skipping malformed profile row: {}", e);
                    None
                }
            })
            .collect();

        tracing::debug!("Fetched {} profiles ({} rows)", profiles.len(), total);

        Ok(profiles)
    }

    async fn insert_like(
        &self,
        like: &NewLikeEvent,
        access_token: Option<&str>,
    ) -> Result<LikeInsert, DataSourceError> {
        match self
            .insert_row(&self.tables.profile_likes, like, access_token, "return=minimal")
            .await
        {
            Ok(()) => Ok(LikeInsert::Recorded),
            Err(SupabaseError::Duplicate(_)) => Ok(LikeInsert::AlreadyRecorded),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_swipe(&self, swipe: &NewSwipe, access_token: &str) -> Result<(), DataSourceError> {
        match self
            .insert_row(&self.tables.swipes, swipe, Some(access_token), "return=minimal")
            .await
        {
            Ok(()) => Ok(()),
            Err(SupabaseError::Duplicate(_)) => {
                tracing::debug!("Swipe {} -> {} already recorded", swipe.swiper_id, swipe.swiped_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_matches(&self, user_id: &str, access_token: &str) -> Result<Vec<Match>, DataSourceError> {
        let url = self.rest_url(
            &self.tables.matches,
            &[
                (
                    "select",
                    "*,user1:profiles!matches_user1_id_fkey(*),user2:profiles!matches_user2_id_fkey(*)"
                        .to_string(),
                ),
                ("or", format!("(user1_id.eq.{},user2_id.eq.{})", user_id, user_id)),
                ("order", "created_at.desc".to_string()),
            ],
        );

        let rows = self.get_rows(&url, Some(access_token), "matches").await?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value::<Match>(row).map_err(|e| {
                    DataSourceError::from(SupabaseError::InvalidResponse(format!(
                        "Failed to parse match: {}",
                        e
                    )))
                })
            })
            .collect()
    }

    async fn likes_for_profiles(&self, profile_ids: &[String]) -> Result<Vec<LikeEvent>, DataSourceError> {
        if profile_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.rest_url(
            &self.tables.profile_likes,
            &[
                ("select", "profile_id,like_type".to_string()),
                ("profile_id", in_list(profile_ids)),
            ],
        );

        let rows = self.get_rows(&url, None, "profile_likes").await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| serde_json::from_value(row).ok())
            .collect())
    }

    async fn create_profile(&self, profile: &Profile, access_token: Option<&str>) -> Result<(), DataSourceError> {
        // Upsert: a signup trigger may already have created a bare row for this user
        self.insert_row(
            &self.tables.profiles,
            profile,
            access_token,
            "resolution=merge-duplicates,return=minimal",
        )
        .await?;

        tracing::debug!("Saved profile {}", profile.id);
        Ok(())
    }

    async fn upload_photo(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        access_token: Option<&str>,
    ) -> Result<String, DataSourceError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.photo_bucket, file_name
        );

        let response = self
            .authorized(self.client.post(&url), access_token)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(SupabaseError::from)?;

        if !response.status().is_success() {
            return Err(Self::error_from(response, "photo upload").await.into());
        }

        Ok(self.public_photo_url(file_name))
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    fn issues_tokens(&self) -> bool {
        true
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let response = self.auth_post("signup", &body).await.map_err(DataSourceError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let body: ErrorBody = response.json().await.unwrap_or_default();
            return Err(Self::sign_up_error(status, body));
        }

        let json: Value = response.json().await.map_err(|e| DataSourceError::from(SupabaseError::from(e)))?;
        Ok(Self::parse_session(json).map_err(DataSourceError::from)?)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let response = self
            .auth_post("token?grant_type=password", &body)
            .await
            .map_err(DataSourceError::from)?;

        match response.status() {
            s if s.is_success() => {
                let json: Value = response
                    .json()
                    .await
                    .map_err(|e| DataSourceError::from(SupabaseError::from(e)))?;
                Ok(Self::parse_session(json).map_err(DataSourceError::from)?)
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Err(IdentityError::InvalidCredentials),
            _ => Err(DataSourceError::from(Self::error_from(response, "sign in").await).into()),
        }
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, IdentityError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .authorized(self.client.get(&url), Some(access_token))
            .send()
            .await
            .map_err(|e| DataSourceError::from(SupabaseError::from(e)))?;

        match response.status() {
            s if s.is_success() => {
                let json: Value = response
                    .json()
                    .await
                    .map_err(|e| DataSourceError::from(SupabaseError::from(e)))?;
                Ok(Self::parse_user(json).map_err(DataSourceError::from)?)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(IdentityError::Unauthorized),
            _ => Err(DataSourceError::from(Self::error_from(response, "session").await).into()),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let response = self
            .authorized(self.client.post(&url), Some(access_token))
            .send()
            .await
            .map_err(|e| DataSourceError::from(SupabaseError::from(e)))?;

        if !response.status().is_success() && response.status() != StatusCode::UNAUTHORIZED {
            return Err(DataSourceError::from(Self::error_from(response, "sign out").await).into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LikeType;
    use mockito::Matcher;

    fn client_for(url: &str) -> SupabaseClient {
        SupabaseClient::new(
            url.to_string(),
            "anon".to_string(),
            "profilepictures".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = client_for("https://project.supabase.co/");
        assert_eq!(client.base_url(), "https://project.supabase.co");
        assert_eq!(
            client.public_photo_url("u1-1.jpg"),
            "https://project.supabase.co/storage/v1/object/public/profilepictures/u1-1.jpg"
        );
    }

    #[test]
    fn test_in_list_quotes_values() {
        let ids = vec!["a".to_string(), "b\"c".to_string()];
        assert_eq!(in_list(&ids), r#"in.("a","b\"c")"#);
    }

    #[tokio::test]
    async fn test_fetch_profiles_skips_malformed_rows() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/profiles")
            .match_query(Matcher::UrlEncoded("order".into(), "created_at.desc".into()))
            .match_header("apikey", "anon")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"id":"u2","email":"b@hbs.edu","full_name":"B","age":29,"school":"Harvard Business School","bio":"","photo_urls":null,"created_at":"2024-02-01T00:00:00Z"},
                    {"id":"broken"}
                ]"#,
            )
            .create_async()
            .await;

        let profiles = client_for(&server.url()).fetch_profiles().await.unwrap();
        mock.assert_async().await;
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].id, "u2");
    }

    #[tokio::test]
    async fn test_duplicate_like_is_already_recorded() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/profile_likes")
            .with_status(409)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#)
            .create_async()
            .await;

        let like = NewLikeEvent {
            profile_id: "1".into(),
            like_type: LikeType::Heart,
            liker_session_id: "anon_1_abc".into(),
        };
        let result = client_for(&server.url()).insert_like(&like, None).await.unwrap();
        assert_eq!(result, LikeInsert::AlreadyRecorded);
    }

    #[tokio::test]
    async fn test_missing_likes_table() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/profile_likes")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":"42P01","message":"relation \"profile_likes\" does not exist"}"#)
            .create_async()
            .await;

        let err = client_for(&server.url())
            .likes_for_profiles(&["1".to_string()])
            .await
            .unwrap_err();
        assert!(err.is_missing_table());
    }

    #[tokio::test]
    async fn test_fetch_matches_filters_on_viewer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/matches")
            .match_query(Matcher::UrlEncoded(
                "or".into(),
                "(user1_id.eq.u1,user2_id.eq.u1)".into(),
            ))
            .match_header("authorization", "Bearer user-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":"m1","user1_id":"u2","user2_id":"u1","created_at":"2024-03-01T00:00:00Z","user1":null,"user2":null}]"#)
            .create_async()
            .await;

        let matches = client_for(&server.url())
            .fetch_matches("u1", "user-token")
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(matches.len(), 1);
        assert!(matches[0].involves("u1"));
    }

    #[tokio::test]
    async fn test_sign_in_with_bad_password() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
            .create_async()
            .await;

        let err = client_for(&server.url())
            .sign_in("a@hbs.edu", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_sign_up_parses_session() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/v1/signup")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"jwt","expires_in":3600,"user":{"id":"u9","email":"n@hbs.edu"}}"#)
            .create_async()
            .await;

        let session = client_for(&server.url())
            .sign_up("n@hbs.edu", "pw")
            .await
            .unwrap();
        assert_eq!(session.user.id, "u9");
        assert_eq!(session.access_token.as_deref(), Some("jwt"));
        assert!(session.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_sign_up_weak_password_is_rejected_with_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/v1/signup")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":"weak_password","msg":"Password should be at least 6 characters."}"#)
            .create_async()
            .await;

        let err = client_for(&server.url())
            .sign_up("n@hbs.edu", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Rejected(_)));
        assert_eq!(err.to_string(), "Password should be at least 6 characters.");
    }

    #[tokio::test]
    async fn test_sign_up_existing_user() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/v1/signup")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":422,"error_code":"user_already_exists","msg":"User already registered"}"#)
            .create_async()
            .await;

        let err = client_for(&server.url())
            .sign_up("n@hbs.edu", "longenough")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::AlreadyRegistered));
    }
}
