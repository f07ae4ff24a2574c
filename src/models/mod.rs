// Model exports
pub mod domain;
pub mod requests;
pub mod responses;
pub mod sample;

pub use domain::{
    AuthSession, AuthUser, DecisionKind, LikeEvent, LikeInsert, LikeTally, LikeType, Match,
    NewLikeEvent, NewSwipe, Profile, School, Swipe, ViewerSession,
};
pub use requests::{
    DecisionRequest, LeaderboardQuery, PhotoPayload, ProfileLikeRequest, SignInRequest,
    SignUpRequest,
};
pub use responses::{
    DecisionResponse, ErrorResponse, FeedResponse, HealthResponse, LeaderboardResponse,
    MatchView, MatchesResponse, ProfileGridResponse, ProfileLikeResponse, SessionResponse,
    SignUpResponse,
};
pub use sample::sample_profiles;
