use serde::Serialize;
use thiserror::Error;

use crate::core::leaderboard::{tally, LeaderboardAggregator};
use crate::models::{LikeEvent, LikeInsert, LikeType, NewLikeEvent, Profile, ViewerSession};
use crate::services::{DataSource, DataSourceError};

/// Errors from giving a like straight from the profile grid
#[derive(Debug, Error)]
pub enum GridLikeError {
    #[error("Profile not found")]
    UnknownProfile,

    #[error("You can't like your own profile")]
    OwnProfile,

    /// The likes table has not been created yet
    #[error("Like functionality is not available yet. Please contact the administrator.")]
    Unavailable,

    #[error("Unable to like profile. Please try again later.")]
    Store(#[source] DataSourceError),
}

/// Aura icon shown on a grid card, by total like count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuraTier {
    Crown,
    Trophy,
    Medal,
    Award,
}

impl AuraTier {
    pub fn for_total(total: u32) -> Option<Self> {
        match total {
            50.. => Some(AuraTier::Crown),
            25..=49 => Some(AuraTier::Trophy),
            10..=24 => Some(AuraTier::Medal),
            5..=9 => Some(AuraTier::Award),
            _ => None,
        }
    }
}

/// One profile in the grid with its like counts
#[derive(Debug, Clone, Serialize)]
pub struct GridCard {
    pub profile: Profile,
    #[serde(rename = "heartCount")]
    pub heart_count: u32,
    #[serde(rename = "prayCount")]
    pub pray_count: u32,
    #[serde(rename = "totalCount")]
    pub total_count: u32,
    pub aura: Option<AuraTier>,
    /// Like types this viewer has already given the profile
    #[serde(rename = "likedByViewer")]
    pub liked_by_viewer: Vec<LikeType>,
}

/// Cards for `profiles` in input order; `liker_id`'s own likes are flagged
pub fn build_cards(profiles: &[Profile], likes: &[LikeEvent], liker_id: &str) -> Vec<GridCard> {
    let counts = tally(likes);

    profiles
        .iter()
        .map(|profile| {
            let t = counts.get(profile.id.as_str()).copied().unwrap_or_default();
            let mut liked_by_viewer: Vec<LikeType> = Vec::new();
            for like in likes
                .iter()
                .filter(|l| l.profile_id == profile.id && l.liker_session_id == liker_id)
            {
                if !liked_by_viewer.contains(&like.like_type) {
                    liked_by_viewer.push(like.like_type);
                }
            }

            GridCard {
                profile: profile.clone(),
                heart_count: t.hearts,
                pray_count: t.prays,
                total_count: t.total(),
                aura: AuraTier::for_total(t.total()),
                liked_by_viewer,
            }
        })
        .collect()
}

/// Every profile with its counts
#[derive(Debug, Clone)]
pub struct Grid {
    pub cards: Vec<GridCard>,
    /// False when the likes table is missing; counts are then all zero
    pub likes_enabled: bool,
}

/// Browse-and-like surface, independent of swipe decisions
///
/// Likes given here are keyed per (profile, like type), so a viewer can give
/// one profile both a heart and a pray. Nothing is marked decided and no
/// swipe is written.
pub struct ProfileGrid<'a> {
    source: &'a dyn DataSource,
}

impl<'a> ProfileGrid<'a> {
    pub fn new(source: &'a dyn DataSource) -> Self {
        Self { source }
    }

    pub async fn load(&self, viewer: &ViewerSession) -> Grid {
        let profiles = LeaderboardAggregator::new(self.source).profiles_of_interest().await;
        let ids: Vec<String> = profiles.iter().map(|p| p.id.clone()).collect();

        let (likes, likes_enabled) = match self.source.likes_for_profiles(&ids).await {
            Ok(likes) => (likes, true),
            Err(e) if e.is_missing_table() => {
                tracing::warn!("profile_likes table does not exist. Like functionality disabled.");
                (Vec::new(), false)
            }
            Err(e) => {
                tracing::error!("Error loading like counts: {}", e);
                (Vec::new(), true)
            }
        };

        Grid {
            cards: build_cards(&profiles, &likes, viewer.liker_id()),
            likes_enabled,
        }
    }

    /// Give `profile_id` a like of `like_type` from `viewer`
    pub async fn like(
        &self,
        viewer: &ViewerSession,
        profile_id: &str,
        like_type: LikeType,
    ) -> Result<LikeInsert, GridLikeError> {
        if viewer.user().is_some_and(|user| user.id == profile_id) {
            return Err(GridLikeError::OwnProfile);
        }

        let profiles = LeaderboardAggregator::new(self.source).profiles_of_interest().await;
        if !profiles.iter().any(|p| p.id == profile_id) {
            return Err(GridLikeError::UnknownProfile);
        }

        let like = NewLikeEvent {
            profile_id: profile_id.to_string(),
            like_type,
            liker_session_id: viewer.liker_id().to_string(),
        };

        match self.source.insert_like(&like, viewer.access_token()).await {
            Ok(status) => {
                tracing::debug!("{} gave {} a {} ({:?})", like.liker_session_id, profile_id, like_type, status);
                Ok(status)
            }
            Err(e) if e.is_missing_table() => Err(GridLikeError::Unavailable),
            Err(e) => {
                tracing::error!("Error liking profile {}: {}", profile_id, e);
                Err(GridLikeError::Store(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{sample_profiles, AuthUser};
    use crate::services::LocalStore;
    use chrono::Utc;

    fn like(profile: &str, liker: &str, like_type: LikeType) -> LikeEvent {
        LikeEvent {
            profile_id: profile.to_string(),
            like_type,
            liker_session_id: liker.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_aura_tiers() {
        assert_eq!(AuraTier::for_total(0), None);
        assert_eq!(AuraTier::for_total(4), None);
        assert_eq!(AuraTier::for_total(5), Some(AuraTier::Award));
        assert_eq!(AuraTier::for_total(10), Some(AuraTier::Medal));
        assert_eq!(AuraTier::for_total(25), Some(AuraTier::Trophy));
        assert_eq!(AuraTier::for_total(50), Some(AuraTier::Crown));
    }

    #[test]
    fn test_cards_keep_order_and_flag_viewer_likes() {
        let likes = vec![
            like("3", "me", LikeType::Heart),
            like("3", "me", LikeType::Pray),
            like("3", "other", LikeType::Heart),
            like("1", "other", LikeType::Pray),
        ];

        let cards = build_cards(&sample_profiles(), &likes, "me");
        let ids: Vec<&str> = cards.iter().map(|c| c.profile.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);

        assert_eq!(cards[2].heart_count, 2);
        assert_eq!(cards[2].pray_count, 1);
        assert_eq!(cards[2].liked_by_viewer, vec![LikeType::Heart, LikeType::Pray]);
        assert!(cards[0].liked_by_viewer.is_empty());
        assert_eq!(cards[1].total_count, 0);
    }

    #[tokio::test]
    async fn test_heart_and_pray_on_same_profile() {
        let store = LocalStore::in_memory();
        let grid = ProfileGrid::new(&store);
        let viewer = ViewerSession::Anonymous("anon_1_abcdefghi".into());

        assert_eq!(grid.like(&viewer, "2", LikeType::Heart).await.unwrap(), LikeInsert::Recorded);
        assert_eq!(grid.like(&viewer, "2", LikeType::Pray).await.unwrap(), LikeInsert::Recorded);
        assert_eq!(
            grid.like(&viewer, "2", LikeType::Heart).await.unwrap(),
            LikeInsert::AlreadyRecorded
        );

        let loaded = grid.load(&viewer).await;
        assert!(loaded.likes_enabled);
        let card = loaded.cards.iter().find(|c| c.profile.id == "2").unwrap();
        assert_eq!((card.heart_count, card.pray_count), (1, 1));
        assert_eq!(card.liked_by_viewer.len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_own_and_unknown_profiles() {
        let store = LocalStore::in_memory();
        let grid = ProfileGrid::new(&store);
        let member = ViewerSession::Authenticated {
            user: AuthUser {
                id: "4".into(),
                email: "x@hbs.edu".into(),
            },
            access_token: "t".into(),
        };

        assert!(matches!(
            grid.like(&member, "4", LikeType::Heart).await,
            Err(GridLikeError::OwnProfile)
        ));
        assert!(matches!(
            grid.like(&member, "nope", LikeType::Heart).await,
            Err(GridLikeError::UnknownProfile)
        ));
    }
}
