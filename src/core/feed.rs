use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::{sample_profiles, AuthUser, Profile};
use crate::services::DataSource;

/// Load state of a viewer's feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedState {
    Idle,
    Loading,
    Loaded,
}

/// Where the loaded candidates came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedOrigin {
    Store,
    Sample,
}

/// Profiles eligible for `viewer`: everything except the viewer's own
/// profile and any candidate already decided, in input order.
pub fn filter_candidates(
    profiles: Vec<Profile>,
    viewer: Option<&AuthUser>,
    decided: &HashSet<String>,
) -> Vec<Profile> {
    profiles
        .into_iter()
        .filter(|p| !decided.contains(&p.id))
        .filter(|p| viewer.map_or(true, |user| !p.is_owned_by(user)))
        .collect()
}

/// Candidate feed of a single viewer
///
/// Owns the decided set and the idle/loading/loaded state that keeps a
/// second load from starting while one is running or done.
#[derive(Debug)]
pub struct CandidateFeed {
    state: FeedState,
    origin: Option<FeedOrigin>,
    candidates: Vec<Profile>,
    decided: HashSet<String>,
}

impl CandidateFeed {
    pub fn new() -> Self {
        Self {
            state: FeedState::Idle,
            origin: None,
            candidates: Vec::new(),
            decided: HashSet::new(),
        }
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    pub fn origin(&self) -> Option<FeedOrigin> {
        self.origin
    }

    /// Move from `Idle` to `Loading`; false if a load already ran or is running
    pub fn begin_load(&mut self) -> bool {
        if self.state != FeedState::Idle {
            tracing::debug!("Feed load skipped, state is {:?}", self.state);
            return false;
        }
        self.state = FeedState::Loading;
        true
    }

    /// Install fetched profiles, dropping anything decided while the fetch ran
    pub fn finish_load(&mut self, profiles: Vec<Profile>, viewer: Option<&AuthUser>, origin: FeedOrigin) {
        self.candidates = filter_candidates(profiles, viewer, &self.decided);
        self.origin = Some(origin);
        self.state = FeedState::Loaded;
    }

    /// Fetch the profile set: from the store, or the sample set if that fails
    pub async fn fetch(source: &dyn DataSource) -> (Vec<Profile>, FeedOrigin) {
        match source.fetch_profiles().await {
            Ok(profiles) => (profiles, FeedOrigin::Store),
            Err(e) => {
                tracing::warn!("Profile store unavailable, using sample data: {}", e);
                (sample_profiles(), FeedOrigin::Sample)
            }
        }
    }

    /// Load in one step (callers that cannot release a lock mid-load)
    pub async fn load(&mut self, source: &dyn DataSource, viewer: Option<&AuthUser>) -> bool {
        if !self.begin_load() {
            return false;
        }
        let (profiles, origin) = Self::fetch(source).await;
        self.finish_load(profiles, viewer, origin);
        true
    }

    /// Record that `candidate_id` has been decided and drop it from the feed
    ///
    /// Returns false if it was already decided this session.
    pub fn mark_decided(&mut self, candidate_id: &str) -> bool {
        if !self.decided.insert(candidate_id.to_string()) {
            return false;
        }
        self.candidates.retain(|p| p.id != candidate_id);
        true
    }

    pub fn is_decided(&self, candidate_id: &str) -> bool {
        self.decided.contains(candidate_id)
    }

    pub fn candidates(&self) -> &[Profile] {
        &self.candidates
    }

    /// The card on top of the stack
    pub fn current(&self) -> Option<&Profile> {
        self.candidates.first()
    }

    pub fn remaining(&self) -> usize {
        self.candidates.len()
    }

    /// Loaded and nothing left to decide
    pub fn is_exhausted(&self) -> bool {
        self.state == FeedState::Loaded && self.candidates.is_empty()
    }

    /// Forget every decision and return to `Idle` so the next request reloads
    pub fn reset(&mut self) {
        tracing::debug!("Resetting feed ({} decided)", self.decided.len());
        self.state = FeedState::Idle;
        self.origin = None;
        self.candidates.clear();
        self.decided.clear();
    }
}

impl Default for CandidateFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::LocalStore;

    fn viewer(id: &str, email: &str) -> AuthUser {
        AuthUser {
            id: id.to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn test_filter_excludes_self_by_id_and_email() {
        let decided = HashSet::new();
        let by_id = filter_candidates(sample_profiles(), Some(&viewer("1", "x@y.z")), &decided);
        assert!(by_id.iter().all(|p| p.id != "1"));
        assert_eq!(by_id.len(), 4);

        let by_email = filter_candidates(
            sample_profiles(),
            Some(&viewer("uuid-9", "James.Wilson@hbs.edu")),
            &decided,
        );
        assert!(by_email.iter().all(|p| p.id != "2"));
    }

    #[test]
    fn test_filter_excludes_decided() {
        let decided: HashSet<String> = ["3".to_string(), "5".to_string()].into_iter().collect();
        let feed = filter_candidates(sample_profiles(), None, &decided);
        let ids: Vec<_> = feed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "4"]);
    }

    #[test]
    fn test_state_machine_blocks_second_load() {
        let mut feed = CandidateFeed::new();
        assert!(feed.begin_load());
        assert_eq!(feed.state(), FeedState::Loading);
        assert!(!feed.begin_load());

        feed.finish_load(sample_profiles(), None, FeedOrigin::Sample);
        assert_eq!(feed.state(), FeedState::Loaded);
        assert!(!feed.begin_load());

        feed.reset();
        assert_eq!(feed.state(), FeedState::Idle);
        assert!(feed.begin_load());
    }

    #[test]
    fn test_decision_during_load_is_respected() {
        let mut feed = CandidateFeed::new();
        assert!(feed.begin_load());
        assert!(feed.mark_decided("2"));
        feed.finish_load(sample_profiles(), None, FeedOrigin::Store);
        assert!(feed.candidates().iter().all(|p| p.id != "2"));
    }

    #[test]
    fn test_mark_decided_is_idempotent() {
        let mut feed = CandidateFeed::new();
        feed.finish_load(sample_profiles(), None, FeedOrigin::Sample);
        assert!(feed.mark_decided("1"));
        assert!(!feed.mark_decided("1"));
        assert_eq!(feed.remaining(), 4);
        assert_eq!(feed.current().map(|p| p.id.as_str()), Some("2"));
    }

    #[tokio::test]
    async fn test_empty_store_gives_exhausted_feed() {
        let store = LocalStore::with_profiles(Vec::new());
        let mut feed = CandidateFeed::new();
        assert!(feed.load(&store, None).await);
        assert!(feed.is_exhausted());
        assert_eq!(feed.origin(), Some(FeedOrigin::Store));
    }

    #[tokio::test]
    async fn test_reset_restores_decided_candidates() {
        let store = LocalStore::in_memory();
        let mut feed = CandidateFeed::new();
        feed.load(&store, None).await;
        for id in ["1", "2", "3", "4", "5"] {
            feed.mark_decided(id);
        }
        assert!(feed.is_exhausted());

        feed.reset();
        feed.load(&store, None).await;
        assert_eq!(feed.remaining(), 5);
    }
}
