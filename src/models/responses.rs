use serde::{Deserialize, Serialize};

use crate::config::BackendMode;
use crate::core::decisions::DecisionOutcome;
use crate::core::feed::{FeedOrigin, FeedState};
use crate::core::grid::GridCard;
use crate::core::leaderboard::LeaderboardEntry;
use crate::models::domain::{AuthUser, DecisionKind, LikeInsert, LikeType, Match, Profile};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub mode: BackendMode,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl Into<String>, status_code: u16) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            status_code,
        }
    }
}

/// Candidate feed for the current viewer
#[derive(Debug, Clone, Serialize)]
pub struct FeedResponse {
    pub state: FeedState,
    pub origin: Option<FeedOrigin>,
    pub candidates: Vec<Profile>,
    pub remaining: usize,
    /// True once every candidate has been decided ("all caught up")
    pub exhausted: bool,
}

/// Result of recording a decision
#[derive(Debug, Clone, Serialize)]
pub struct DecisionResponse {
    #[serde(rename = "candidateId")]
    pub candidate_id: String,
    pub decision: DecisionKind,
    pub outcome: DecisionOutcome,
    pub remaining: usize,
}

/// One match from the viewer's side
#[derive(Debug, Clone, Serialize)]
pub struct MatchView {
    #[serde(rename = "matchId")]
    pub match_id: String,
    #[serde(rename = "matchedAt")]
    pub matched_at: chrono::DateTime<chrono::Utc>,
    pub profile: Option<Profile>,
}

impl MatchView {
    pub fn from_match(m: &Match, viewer_id: &str) -> Self {
        Self {
            match_id: m.id.clone(),
            matched_at: m.created_at,
            profile: m.other(viewer_id).cloned(),
        }
    }
}

/// The viewer's matches plus any formed since the last poll
#[derive(Debug, Clone, Serialize)]
pub struct MatchesResponse {
    pub matches: Vec<MatchView>,
    pub count: usize,
    #[serde(rename = "newMatches")]
    pub new_matches: Vec<MatchView>,
}

/// Aura leaderboard
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
    #[serde(rename = "profilesConsidered")]
    pub profiles_considered: usize,
}

/// Every profile with its like counts
#[derive(Debug, Clone, Serialize)]
pub struct ProfileGridResponse {
    pub profiles: Vec<GridCard>,
    #[serde(rename = "likesEnabled")]
    pub likes_enabled: bool,
}

/// Result of a like given from the grid
#[derive(Debug, Clone, Serialize)]
pub struct ProfileLikeResponse {
    #[serde(rename = "profileId")]
    pub profile_id: String,
    #[serde(rename = "likeType")]
    pub like_type: LikeType,
    pub status: LikeInsert,
}

/// Current session
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub user: Option<AuthUser>,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(rename = "expiresAt", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub mode: BackendMode,
}

/// New account with its profile
#[derive(Debug, Clone, Serialize)]
pub struct SignUpResponse {
    pub user: AuthUser,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(rename = "expiresAt", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub profile: Profile,
}
