//! YachtWeek Match - swipe, match and aura leaderboard service
//!
//! Members of two business schools swipe through each other's profiles.
//! Likes feed a public leaderboard; mutual likes between signed-in members
//! become matches. Runs against a hosted backend or, when none is
//! configured, a local demo store.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{aggregate, filter_candidates, CandidateFeed, DecisionRecorder, MatchReconciler};
pub use models::{DecisionKind, LikeEvent, LikeType, Match, Profile, ViewerSession};
pub use services::{Backend, DataSource, LocalStore, SessionManager, ViewerRegistry};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let profiles = models::sample_profiles();
        let feed = filter_candidates(profiles, None, &Default::default());
        assert_eq!(feed.len(), 5);
        assert!(aggregate(&feed, &[], false).is_empty());
    }
}
