// Core feed, decision, match and leaderboard logic
pub mod decisions;
pub mod feed;
pub mod grid;
pub mod leaderboard;
pub mod reconciler;
pub mod signup;

pub use decisions::{DecisionOutcome, DecisionRecorder, WriteStatus};
pub use feed::{filter_candidates, CandidateFeed, FeedOrigin, FeedState};
pub use grid::{build_cards, AuraTier, Grid, GridCard, GridLikeError, ProfileGrid};
pub use leaderboard::{
    aggregate, aura_title, merge_profiles, LeaderboardAggregator, LeaderboardEntry, RankBadge,
};
pub use reconciler::MatchReconciler;
pub use signup::{PhotoUpload, SignUpError, SignUpFlow, SignUpForm};
