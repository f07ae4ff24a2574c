// Route exports
pub mod auth;
pub mod leaderboard;
pub mod profiles;
pub mod swipe;

use actix_web::http::{header, StatusCode};
use actix_web::{error, web, HttpRequest, HttpResponse, HttpResponseBuilder};
use rand::Rng;
use std::sync::Arc;

use crate::core::DecisionRecorder;
use crate::models::{ErrorResponse, ViewerSession};
use crate::services::{Backend, IdentityError, SessionManager, ViewerRegistry};

/// Header carrying the anonymous session token
pub const SESSION_HEADER: &str = "X-Session-Id";

/// Room for a 5 MiB photo, hex encoded, plus the rest of the form
pub const JSON_LIMIT: usize = 12 * 1024 * 1024;

const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    pub sessions: Arc<SessionManager>,
    pub viewers: Arc<ViewerRegistry>,
    pub recorder: DecisionRecorder,
}

impl AppState {
    pub fn new(backend: Backend, sessions: Arc<SessionManager>, viewers: Arc<ViewerRegistry>) -> Self {
        let recorder = DecisionRecorder::new(backend.data.clone());
        Self {
            backend,
            sessions,
            viewers,
            recorder,
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(swipe::configure)
            .configure(leaderboard::configure)
            .configure(profiles::configure)
            .configure(auth::configure),
    );
}

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(handle_json_payload_error)
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(handle_query_payload_error)
}

/// `anon_<unix-millis>_<9 base-36 chars>`
pub fn generate_anonymous_token() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect();

    format!("anon_{}_{}", chrono::Utc::now().timestamp_millis(), suffix)
}

pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Who is asking: a signed-in member, else the anonymous session named by
/// `X-Session-Id`, else a new anonymous session
pub async fn resolve_viewer(state: &AppState, req: &HttpRequest) -> Result<ViewerSession, HttpResponse> {
    if let Some(token) = bearer_token(req) {
        return match state.sessions.authenticate(token).await {
            Ok(user) => Ok(ViewerSession::Authenticated {
                user,
                access_token: token.to_string(),
            }),
            Err(e) => Err(identity_error(&e)),
        };
    }

    let existing = req
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match existing {
        Some(token) => Ok(ViewerSession::Anonymous(token.to_string())),
        None => {
            let token = generate_anonymous_token();
            tracing::debug!("Issued anonymous session {}", token);
            Ok(ViewerSession::Anonymous(token))
        }
    }
}

/// Response builder that echoes an anonymous viewer's token
pub fn respond(mut builder: HttpResponseBuilder, viewer: &ViewerSession) -> HttpResponseBuilder {
    if let ViewerSession::Anonymous(token) = viewer {
        builder.insert_header((SESSION_HEADER, token.as_str()));
    }
    builder
}

pub fn identity_error(e: &IdentityError) -> HttpResponse {
    match e {
        IdentityError::InvalidCredentials => {
            HttpResponse::Unauthorized().json(ErrorResponse::new("invalid_credentials", e.to_string(), 401))
        }
        IdentityError::Unauthorized | IdentityError::Token(_) => {
            HttpResponse::Unauthorized().json(ErrorResponse::new("unauthorized", e.to_string(), 401))
        }
        IdentityError::AlreadyRegistered => {
            HttpResponse::Conflict().json(ErrorResponse::new("already_registered", e.to_string(), 409))
        }
        IdentityError::Rejected(_) => {
            HttpResponse::BadRequest().json(ErrorResponse::new("identity_rejected", e.to_string(), 400))
        }
        IdentityError::Backend(_) => {
            tracing::error!("Identity service error: {}", e);
            HttpResponse::BadGateway().json(ErrorResponse::new("identity_unavailable", e.to_string(), 502))
        }
    }
}
