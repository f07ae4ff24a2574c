use actix_web::{web, HttpRequest, HttpResponse, Responder};
use validator::Validate;

use crate::core::signup::{SignUpError, SignUpFlow, SignUpForm};
use crate::models::{
    ErrorResponse, SessionResponse, SignInRequest, SignUpRequest, SignUpResponse, ViewerSession,
};
use crate::routes::{bearer_token, identity_error, resolve_viewer, respond, AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/signup", web::post().to(sign_up))
            .route("/signin", web::post().to(sign_in))
            .route("/signout", web::post().to(sign_out))
            .route("/session", web::get().to(current_session)),
    );
}

/// Create an account, upload its photo and write its profile
///
/// POST /api/v1/auth/signup
///
/// Request body:
/// ```json
/// {
///   "email": "name@stanford.edu",
///   "password": "string",
///   "fullName": "string",
///   "age": 27,
///   "bio": "string",
///   "photo": { "fileName": "me.jpg", "contentType": "image/jpeg", "data": "<hex>" }
/// }
/// ```
async fn sign_up(state: web::Data<AppState>, body: web::Json<SignUpRequest>) -> impl Responder {
    let form = match SignUpForm::try_from(body.into_inner()) {
        Ok(form) => form,
        Err(e) => {
            return HttpResponse::BadRequest().json(ErrorResponse::new(
                "invalid_photo",
                format!("Photo data must be hex encoded: {}", e),
                400,
            ));
        }
    };

    let flow = SignUpFlow::new(&state.sessions, state.backend.data.as_ref());
    match flow.submit(form).await {
        Ok((session, profile)) => HttpResponse::Created().json(SignUpResponse {
            user: session.user,
            access_token: session.access_token,
            expires_at: session.expires_at,
            profile,
        }),
        Err(SignUpError::Validation(message)) => {
            tracing::debug!("Sign-up rejected: {}", message);
            HttpResponse::BadRequest().json(ErrorResponse::new("validation_failed", message, 400))
        }
        Err(SignUpError::Identity(e)) => identity_error(&e),
        Err(e @ (SignUpError::PhotoUpload(_) | SignUpError::ProfileWrite(_))) => {
            HttpResponse::BadGateway().json(ErrorResponse::new("signup_incomplete", e.to_string(), 502))
        }
    }
}

/// Password sign-in
///
/// POST /api/v1/auth/signin
async fn sign_in(state: web::Data<AppState>, body: web::Json<SignInRequest>) -> impl Responder {
    if let Err(errors) = body.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            "validation_failed",
            errors.to_string(),
            400,
        ));
    }

    match state.sessions.sign_in(body.email.trim(), &body.password).await {
        Ok(session) => HttpResponse::Ok().json(SessionResponse {
            user: Some(session.user),
            access_token: session.access_token,
            expires_at: session.expires_at,
            mode: state.backend.mode(),
        }),
        Err(e) => identity_error(&e),
    }
}

/// End the bearer's session
///
/// POST /api/v1/auth/signout
async fn sign_out(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let Some(token) = bearer_token(&req) else {
        return HttpResponse::Unauthorized().json(ErrorResponse::new(
            "unauthorized",
            "No session to sign out of",
            401,
        ));
    };

    match state.sessions.sign_out(token).await {
        Ok(_) => HttpResponse::Ok().json(SessionResponse {
            user: None,
            access_token: None,
            expires_at: None,
            mode: state.backend.mode(),
        }),
        Err(e) => identity_error(&e),
    }
}

/// Who the caller is; anonymous callers get their session token echoed
///
/// GET /api/v1/auth/session
async fn current_session(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let viewer = match resolve_viewer(&state, &req).await {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };

    let user = match &viewer {
        ViewerSession::Authenticated { user, .. } => Some(user.clone()),
        ViewerSession::Anonymous(_) => None,
    };

    respond(HttpResponse::Ok(), &viewer).json(SessionResponse {
        user,
        access_token: None,
        expires_at: None,
        mode: state.backend.mode(),
    })
}
