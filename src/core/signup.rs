use chrono::Utc;
use thiserror::Error;

use crate::models::{AuthSession, Profile, School, SignUpRequest};
use crate::services::{DataSource, DataSourceError, IdentityError, SessionManager};

pub const MIN_AGE: i64 = 18;
pub const MAX_AGE: i64 = 100;
pub const MAX_BIO_CHARS: usize = 500;
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_DOMAINS: [&str; 2] = ["@stanford.edu", "@hbs.edu"];

/// Why a sign-up did not go through; `Display` is the message shown to the user
#[derive(Debug, Error)]
pub enum SignUpError {
    #[error("{0}")]
    Validation(&'static str),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Failed to upload photo. Please try again.")]
    PhotoUpload(#[source] DataSourceError),

    #[error("Profile created but failed to update photo. Please try again.")]
    ProfileWrite(#[source] DataSourceError),
}

/// Profile photo as uploaded
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    /// Object name in the photo bucket: `<user-id>-<unix-millis>.<ext>`
    ///
    /// The extension comes from the file name, then the content type, and is
    /// kept only when it is plain `[a-z0-9]`; anything else becomes `jpg`.
    pub fn storage_name(&self, user_id: &str, millis: i64) -> String {
        let clean = |ext: &str| {
            let ext = ext.to_ascii_lowercase();
            let plain = !ext.is_empty()
                && ext.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
            plain.then_some(ext)
        };

        let ext = self
            .file_name
            .rsplit_once('.')
            .and_then(|(_, ext)| clean(ext))
            .or_else(|| self.content_type.strip_prefix("image/").and_then(clean))
            .unwrap_or_else(|| "jpg".to_string());

        format!("{}-{}.{}", user_id, millis, ext)
    }
}

/// Sign-up form after transport decoding
#[derive(Debug, Clone)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub age: Option<i64>,
    pub bio: String,
    pub photo: Option<PhotoUpload>,
}

impl TryFrom<SignUpRequest> for SignUpForm {
    type Error = hex::FromHexError;

    fn try_from(req: SignUpRequest) -> Result<Self, Self::Error> {
        let photo = match req.photo {
            Some(payload) => Some(PhotoUpload {
                bytes: hex::decode(payload.data.trim())?,
                file_name: payload.file_name,
                content_type: payload.content_type,
            }),
            None => None,
        };

        Ok(Self {
            email: req.email.trim().to_string(),
            password: req.password,
            full_name: req.full_name,
            age: req.age,
            bio: req.bio,
            photo,
        })
    }
}

impl SignUpForm {
    /// Check fields in form order; the first problem wins
    pub fn validate(&self) -> Result<(), SignUpError> {
        if self.full_name.trim().is_empty() {
            return Err(SignUpError::Validation("Full name is required"));
        }
        match self.age {
            Some(age) if (MIN_AGE..=MAX_AGE).contains(&age) => {}
            _ => return Err(SignUpError::Validation("Please enter a valid age (18-100)")),
        }
        let email = self.email.to_lowercase();
        if !ALLOWED_DOMAINS.iter().any(|domain| email.contains(domain)) {
            return Err(SignUpError::Validation(
                "Please use your Stanford GSB (@stanford.edu) or Harvard Business School (@hbs.edu) email",
            ));
        }
        if self.bio.trim().is_empty() {
            return Err(SignUpError::Validation("Bio is required"));
        }
        if self.bio.chars().count() > MAX_BIO_CHARS {
            return Err(SignUpError::Validation("Bio must be 500 characters or less"));
        }
        let Some(photo) = &self.photo else {
            return Err(SignUpError::Validation("Photo is required"));
        };
        if !photo.content_type.starts_with("image/") {
            return Err(SignUpError::Validation("Please select an image file"));
        }
        if photo.bytes.len() > MAX_PHOTO_BYTES {
            return Err(SignUpError::Validation("Image must be less than 5MB"));
        }
        if self.password.is_empty() {
            return Err(SignUpError::Validation("Password is required"));
        }
        Ok(())
    }
}

/// Account creation: identity, photo, profile row
pub struct SignUpFlow<'a> {
    sessions: &'a SessionManager,
    source: &'a dyn DataSource,
}

impl<'a> SignUpFlow<'a> {
    pub fn new(sessions: &'a SessionManager, source: &'a dyn DataSource) -> Self {
        Self { sessions, source }
    }

    pub async fn submit(&self, form: SignUpForm) -> Result<(AuthSession, Profile), SignUpError> {
        form.validate()?;
        let SignUpForm {
            email,
            password,
            full_name,
            age,
            bio,
            photo,
        } = form;
        let photo = photo.ok_or(SignUpError::Validation("Photo is required"))?;
        let age = age
            .and_then(|a| u8::try_from(a).ok())
            .ok_or(SignUpError::Validation("Please enter a valid age (18-100)"))?;

        let session = self.sessions.sign_up(&email, &password).await?;
        let token = session.access_token.as_deref();
        let now = Utc::now();

        let object_name = photo.storage_name(&session.user.id, now.timestamp_millis());
        let photo_url = self
            .source
            .upload_photo(&object_name, &photo.content_type, photo.bytes, token)
            .await
            .map_err(|e| {
                tracing::error!("Upload error for {}: {}", session.user.id, e);
                SignUpError::PhotoUpload(e)
            })?;

        let profile = Profile {
            id: session.user.id.clone(),
            school: School::from_email(&email),
            email,
            full_name: full_name.trim().to_string(),
            age,
            bio: bio.trim().to_string(),
            undergrad_school: None,
            pre_mba_company: None,
            interests: Vec::new(),
            photo_urls: vec![photo_url],
            created_at: now,
        };

        self.source.create_profile(&profile, token).await.map_err(|e| {
            tracing::error!("Error creating profile for {}: {}", profile.id, e);
            SignUpError::ProfileWrite(e)
        })?;

        tracing::info!("New member {} ({})", profile.id, profile.school.short_name());
        Ok((session, profile))
    }
}
