use serde::Serialize;
use std::sync::Arc;

use crate::core::feed::CandidateFeed;
use crate::models::{DecisionKind, LikeInsert, LikeType, NewLikeEvent, NewSwipe, ViewerSession};
use crate::services::DataSource;

/// What happened to one of the writes a decision triggers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    Recorded,
    AlreadyRecorded,
    /// This decision does not produce the write (pass, or anonymous viewer)
    NotApplicable,
    /// Logged and swallowed; the feed is not rolled back
    Failed,
}

/// Result of [`DecisionRecorder::record`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// The pair was already decided this session; nothing was written
    Duplicate,
    /// The candidate is the viewer's own profile; nothing was written
    OwnProfile,
    Recorded {
        like: WriteStatus,
        swipe: WriteStatus,
        /// An authenticated like landed, so a match may have formed
        #[serde(rename = "matchCheck")]
        match_check: bool,
    },
}

impl DecisionOutcome {
    pub fn needs_match_check(&self) -> bool {
        matches!(self, DecisionOutcome::Recorded { match_check: true, .. })
    }
}

/// Records like / friend / pass decisions against the store
#[derive(Clone)]
pub struct DecisionRecorder {
    source: Arc<dyn DataSource>,
}

impl DecisionRecorder {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    /// Record `kind` for (`session`, `candidate_id`)
    ///
    /// The candidate leaves the feed before any write is attempted and stays
    /// out even if the writes fail.
    pub async fn record(
        &self,
        feed: &mut CandidateFeed,
        session: &ViewerSession,
        candidate_id: &str,
        kind: DecisionKind,
    ) -> DecisionOutcome {
        if session.user().is_some_and(|user| user.id == candidate_id) {
            tracing::debug!("{} tried to decide on their own profile, ignoring", candidate_id);
            return DecisionOutcome::OwnProfile;
        }

        if !feed.mark_decided(candidate_id) {
            tracing::debug!("{} already decided {}, ignoring", session.liker_id(), candidate_id);
            return DecisionOutcome::Duplicate;
        }

        let like = match kind.like_type() {
            Some(like_type) => self.write_like(session, candidate_id, like_type).await,
            None => WriteStatus::NotApplicable,
        };

        let swipe = match session {
            ViewerSession::Authenticated { user, access_token } => {
                let swipe = NewSwipe {
                    swiper_id: user.id.clone(),
                    swiped_id: candidate_id.to_string(),
                    is_like: kind.is_like(),
                };
                match self.source.insert_swipe(&swipe, access_token).await {
                    Ok(()) => WriteStatus::Recorded,
                    Err(e) => {
                        tracing::warn!("Failed to record swipe {} -> {}: {}", user.id, candidate_id, e);
                        WriteStatus::Failed
                    }
                }
            }
            ViewerSession::Anonymous(_) => WriteStatus::NotApplicable,
        };

        tracing::debug!(
            "Recorded {:?} by {} on {} (like: {:?}, swipe: {:?})",
            kind,
            session.liker_id(),
            candidate_id,
            like,
            swipe
        );

        DecisionOutcome::Recorded {
            like,
            swipe,
            match_check: kind.is_like() && swipe == WriteStatus::Recorded,
        }
    }

    async fn write_like(&self, session: &ViewerSession, candidate_id: &str, like_type: LikeType) -> WriteStatus {
        let like = NewLikeEvent {
            profile_id: candidate_id.to_string(),
            like_type,
            liker_session_id: session.liker_id().to_string(),
        };

        match self.source.insert_like(&like, session.access_token()).await {
            Ok(LikeInsert::Recorded) => WriteStatus::Recorded,
            Ok(LikeInsert::AlreadyRecorded) => {
                tracing::debug!("{} already gave {} a {}", like.liker_session_id, candidate_id, like_type);
                WriteStatus::AlreadyRecorded
            }
            Err(e) => {
                tracing::warn!("Failed to record {} like on {}: {}", like_type, candidate_id, e);
                WriteStatus::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feed::FeedOrigin;
    use crate::models::{sample_profiles, AuthUser};
    use crate::services::LocalStore;

    fn loaded_feed() -> CandidateFeed {
        let mut feed = CandidateFeed::new();
        feed.finish_load(sample_profiles(), None, FeedOrigin::Sample);
        feed
    }

    fn member(id: &str) -> ViewerSession {
        ViewerSession::Authenticated {
            user: AuthUser {
                id: id.to_string(),
                email: format!("{}@hbs.edu", id),
            },
            access_token: "token".to_string(),
        }
    }

    async fn like_count(store: &LocalStore, id: &str) -> usize {
        store.likes_for_profiles(&[id.to_string()]).await.unwrap().len()
    }

    #[tokio::test]
    async fn test_anonymous_like_feeds_leaderboard_only() {
        let store = Arc::new(LocalStore::in_memory());
        let recorder = DecisionRecorder::new(store.clone());
        let mut feed = loaded_feed();
        let viewer = ViewerSession::Anonymous("anon_1_abcdefghi".into());

        let outcome = recorder.record(&mut feed, &viewer, "1", DecisionKind::Like).await;
        assert_eq!(
            outcome,
            DecisionOutcome::Recorded {
                like: WriteStatus::Recorded,
                swipe: WriteStatus::NotApplicable,
                match_check: false,
            }
        );
        assert_eq!(like_count(&store, "1").await, 1);
        assert!(!feed.candidates().iter().any(|p| p.id == "1"));
    }

    #[tokio::test]
    async fn test_pass_writes_no_like() {
        let store = Arc::new(LocalStore::in_memory());
        let recorder = DecisionRecorder::new(store.clone());
        let mut feed = loaded_feed();

        let outcome = recorder.record(&mut feed, &member("u1"), "2", DecisionKind::Pass).await;
        assert_eq!(
            outcome,
            DecisionOutcome::Recorded {
                like: WriteStatus::NotApplicable,
                swipe: WriteStatus::Recorded,
                match_check: false,
            }
        );
        assert_eq!(like_count(&store, "2").await, 0);
    }

    #[tokio::test]
    async fn test_friend_is_pray_and_no_match_check() {
        let store = Arc::new(LocalStore::in_memory());
        let recorder = DecisionRecorder::new(store.clone());
        let mut feed = loaded_feed();

        let outcome = recorder.record(&mut feed, &member("u1"), "3", DecisionKind::Friend).await;
        assert!(!outcome.needs_match_check());

        let likes = store.likes_for_profiles(&["3".to_string()]).await.unwrap();
        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].like_type, LikeType::Pray);
        assert_eq!(likes[0].liker_session_id, "u1");
    }

    #[tokio::test]
    async fn test_second_decision_is_ignored() {
        let store = Arc::new(LocalStore::in_memory());
        let recorder = DecisionRecorder::new(store.clone());
        let mut feed = loaded_feed();
        let viewer = member("u1");

        let first = recorder.record(&mut feed, &viewer, "4", DecisionKind::Like).await;
        assert!(first.needs_match_check());

        let second = recorder.record(&mut feed, &viewer, "4", DecisionKind::Friend).await;
        assert_eq!(second, DecisionOutcome::Duplicate);
        assert_eq!(like_count(&store, "4").await, 1);
        assert_eq!(feed.remaining(), 4);
    }

    #[tokio::test]
    async fn test_own_profile_is_never_recorded() {
        let store = Arc::new(LocalStore::in_memory());
        let recorder = DecisionRecorder::new(store.clone());
        let mut feed = loaded_feed();

        let outcome = recorder.record(&mut feed, &member("1"), "1", DecisionKind::Like).await;
        assert_eq!(outcome, DecisionOutcome::OwnProfile);
        assert!(!outcome.needs_match_check());
        assert_eq!(like_count(&store, "1").await, 0);
        assert!(store.fetch_matches("1", "token").await.unwrap().is_empty());
        assert!(!feed.is_decided("1"));
    }
}
