use actix_web::{web, HttpRequest, HttpResponse, Responder};
use validator::Validate;

use crate::core::feed::CandidateFeed;
use crate::models::{
    DecisionKind, DecisionRequest, DecisionResponse, ErrorResponse, FeedResponse, HealthResponse,
    MatchView, MatchesResponse, ViewerSession,
};
use crate::routes::{resolve_viewer, respond, AppState};
use crate::services::ViewerState;

/// Configure feed, decision and match routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/feed", web::get().to(get_feed))
        .route("/feed/reset", web::post().to(reset_feed))
        .route("/decisions", web::post().to(record_decision))
        .route("/matches", web::get().to(get_matches));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: state.backend.mode(),
        timestamp: chrono::Utc::now(),
    })
}

fn feed_response(feed: &CandidateFeed) -> FeedResponse {
    FeedResponse {
        state: feed.state(),
        origin: feed.origin(),
        candidates: feed.candidates().to_vec(),
        remaining: feed.remaining(),
        exhausted: feed.is_exhausted(),
    }
}

/// Candidate feed
///
/// GET /api/v1/feed
///
/// The first request of a session loads the profile set; the viewer's lock is
/// released while the store is read, so a request arriving meanwhile sees the
/// `loading` state instead of starting a second fetch.
async fn get_feed(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let viewer = match resolve_viewer(&state, &req).await {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };
    let handle = state.viewers.get_or_create(&viewer).await;

    let should_load = handle.lock().await.feed.begin_load();
    if should_load {
        let (profiles, origin) = CandidateFeed::fetch(state.backend.data.as_ref()).await;
        let mut viewer_state = handle.lock().await;
        viewer_state.feed.finish_load(profiles, viewer.user(), origin);
        tracing::info!(
            "Loaded {} candidates for {} ({:?})",
            viewer_state.feed.remaining(),
            viewer.liker_id(),
            origin
        );
    }

    let viewer_state = handle.lock().await;
    respond(HttpResponse::Ok(), &viewer).json(feed_response(&viewer_state.feed))
}

/// Forget this session's decisions; the next feed request reloads
///
/// POST /api/v1/feed/reset
async fn reset_feed(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let viewer = match resolve_viewer(&state, &req).await {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };
    let handle = state.viewers.get_or_create(&viewer).await;

    let mut viewer_state = handle.lock().await;
    viewer_state.feed.reset();
    respond(HttpResponse::Ok(), &viewer).json(feed_response(&viewer_state.feed))
}

/// Record a decision
///
/// POST /api/v1/decisions
///
/// Request body:
/// ```json
/// {
///   "candidateId": "string",
///   "decision": "like|friend|pass"
/// }
/// ```
async fn record_decision(
    state: web::Data<AppState>,
    body: web::Json<DecisionRequest>,
    req: HttpRequest,
) -> impl Responder {
    if let Err(errors) = body.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            "validation_failed",
            errors.to_string(),
            400,
        ));
    }

    let kind: DecisionKind = match body.decision.parse() {
        Ok(kind) => kind,
        Err(message) => {
            return HttpResponse::BadRequest().json(ErrorResponse::new(
                "invalid_decision",
                format!("{}; expected one of: like, friend, pass", message),
                400,
            ));
        }
    };

    let viewer = match resolve_viewer(&state, &req).await {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };
    let handle = state.viewers.get_or_create(&viewer).await;

    let mut guard = handle.lock().await;
    let ViewerState { feed, reconciler, .. } = &mut *guard;

    let outcome = state
        .recorder
        .record(feed, &viewer, &body.candidate_id, kind)
        .await;

    if outcome.needs_match_check() {
        if let ViewerSession::Authenticated { user, access_token } = &viewer {
            let generation = reconciler.schedule(&user.id, access_token);
            tracing::debug!("Scheduled match check #{} for {}", generation, user.id);
        }
    }

    respond(HttpResponse::Ok(), &viewer).json(DecisionResponse {
        candidate_id: body.candidate_id.clone(),
        decision: kind,
        outcome,
        remaining: feed.remaining(),
    })
}

/// The viewer's matches
///
/// GET /api/v1/matches
///
/// `newMatches` lists matches formed since the previous call.
async fn get_matches(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let viewer = match resolve_viewer(&state, &req).await {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };
    let Some(user) = viewer.user() else {
        return respond(HttpResponse::Unauthorized(), &viewer).json(ErrorResponse::new(
            "unauthorized",
            "Sign in to see your matches",
            401,
        ));
    };

    let handle = state.viewers.get_or_create(&viewer).await;
    let mut viewer_state = handle.lock().await;
    viewer_state.ensure_matches(&viewer).await;

    let matches: Vec<MatchView> = viewer_state
        .reconciler
        .matches()
        .iter()
        .map(|m| MatchView::from_match(m, &user.id))
        .collect();
    let new_matches: Vec<MatchView> = viewer_state
        .reconciler
        .take_new_matches()
        .iter()
        .map(|m| MatchView::from_match(m, &user.id))
        .collect();

    HttpResponse::Ok().json(MatchesResponse {
        count: matches.len(),
        matches,
        new_matches,
    })
}
