use actix_web::{web, HttpResponse, Responder};

use crate::core::LeaderboardAggregator;
use crate::models::{LeaderboardQuery, LeaderboardResponse};
use crate::routes::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/leaderboard", web::get().to(get_leaderboard));
}

/// Aura leaderboard
///
/// GET /api/v1/leaderboard?includeZero=true
///
/// Store failures produce an empty board rather than an error.
async fn get_leaderboard(state: web::Data<AppState>, query: web::Query<LeaderboardQuery>) -> impl Responder {
    let aggregator = LeaderboardAggregator::new(state.backend.data.as_ref());
    let profiles = aggregator.profiles_of_interest().await;
    let entries = aggregator.build(&profiles, query.include_zero).await;

    tracing::info!(
        "Leaderboard: {} entries from {} profiles",
        entries.len(),
        profiles.len()
    );

    HttpResponse::Ok().json(LeaderboardResponse {
        entries,
        profiles_considered: profiles.len(),
    })
}
