use actix_web::{web, HttpRequest, HttpResponse, Responder};

use crate::core::{GridLikeError, ProfileGrid};
use crate::models::{ErrorResponse, ProfileGridResponse, ProfileLikeRequest, ProfileLikeResponse};
use crate::routes::{resolve_viewer, respond, AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/profiles", web::get().to(list_profiles))
        .route("/profiles/{id}/likes", web::post().to(like_profile));
}

/// Profile grid with heart and pray counts
///
/// GET /api/v1/profiles
async fn list_profiles(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let viewer = match resolve_viewer(&state, &req).await {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };

    let grid = ProfileGrid::new(state.backend.data.as_ref()).load(&viewer).await;

    respond(HttpResponse::Ok(), &viewer).json(ProfileGridResponse {
        profiles: grid.cards,
        likes_enabled: grid.likes_enabled,
    })
}

/// Give a profile a heart or a pray
///
/// POST /api/v1/profiles/{id}/likes
///
/// Request body:
/// ```json
/// { "likeType": "heart|pray" }
/// ```
///
/// Independent of the swipe feed: the profile is not marked decided.
async fn like_profile(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ProfileLikeRequest>,
    req: HttpRequest,
) -> impl Responder {
    let viewer = match resolve_viewer(&state, &req).await {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };
    let profile_id = path.into_inner();

    let result = ProfileGrid::new(state.backend.data.as_ref())
        .like(&viewer, &profile_id, body.like_type)
        .await;

    match result {
        Ok(status) => respond(HttpResponse::Ok(), &viewer).json(ProfileLikeResponse {
            profile_id,
            like_type: body.like_type,
            status,
        }),
        Err(e) => {
            let (builder, error, code) = match &e {
                GridLikeError::UnknownProfile => (HttpResponse::NotFound(), "profile_not_found", 404),
                GridLikeError::OwnProfile => (HttpResponse::BadRequest(), "own_profile", 400),
                GridLikeError::Unavailable => (HttpResponse::ServiceUnavailable(), "likes_unavailable", 503),
                GridLikeError::Store(_) => (HttpResponse::BadGateway(), "like_failed", 502),
            };
            respond(builder, &viewer).json(ErrorResponse::new(error, e.to_string(), code))
        }
    }
}
