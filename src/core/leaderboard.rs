use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::models::{sample_profiles, LikeEvent, LikeTally, Profile};
use crate::services::DataSource;

/// Display tier of a leaderboard position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RankBadge {
    Gold,
    Silver,
    Bronze,
    Standard,
}

impl RankBadge {
    pub fn for_rank(rank: usize) -> Self {
        match rank {
            1 => RankBadge::Gold,
            2 => RankBadge::Silver,
            3 => RankBadge::Bronze,
            _ => RankBadge::Standard,
        }
    }
}

/// Title shown next to a ranked profile
pub fn aura_title(rank: usize, total: u32) -> &'static str {
    match rank {
        1 => "Yacht Week Royalty",
        2 => "Aura Legend",
        3 => "Charm Champion",
        _ if total >= 25 => "Magnetic Personality",
        _ if total >= 10 => "Rising Star",
        _ => "Crowd Favorite",
    }
}

/// One row of the aura leaderboard
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub profile: Profile,
    #[serde(rename = "heartCount")]
    pub heart_count: u32,
    #[serde(rename = "prayCount")]
    pub pray_count: u32,
    #[serde(rename = "totalCount")]
    pub total_count: u32,
    pub rank: usize,
    pub title: &'static str,
    pub badge: RankBadge,
}

/// Tally like-events per profile id
pub fn tally(likes: &[LikeEvent]) -> HashMap<&str, LikeTally> {
    let mut counts: HashMap<&str, LikeTally> = HashMap::new();
    for like in likes {
        counts
            .entry(like.profile_id.as_str())
            .or_default()
            .add(like.like_type);
    }
    counts
}

/// Rank `profiles` by their like totals
///
/// Highest total first; equal totals keep their input order. Profiles with no
/// likes are left out unless `include_zero` is set.
pub fn aggregate(profiles: &[Profile], likes: &[LikeEvent], include_zero: bool) -> Vec<LeaderboardEntry> {
    let counts = tally(likes);

    let mut scored: Vec<(&Profile, LikeTally)> = profiles
        .iter()
        .map(|p| (p, counts.get(p.id.as_str()).copied().unwrap_or_default()))
        .filter(|(_, t)| include_zero || t.total() > 0)
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.1.total().cmp(&a.1.total()));

    scored
        .into_iter()
        .enumerate()
        .map(|(index, (profile, t))| {
            let rank = index + 1;
            LeaderboardEntry {
                profile: profile.clone(),
                heart_count: t.hearts,
                pray_count: t.prays,
                total_count: t.total(),
                rank,
                title: aura_title(rank, t.total()),
                badge: RankBadge::for_rank(rank),
            }
        })
        .collect()
}

/// `primary` followed by every profile of `extra` whose id is not already present
pub fn merge_profiles(primary: Vec<Profile>, extra: Vec<Profile>) -> Vec<Profile> {
    let mut seen: HashSet<String> = HashSet::new();
    primary
        .into_iter()
        .chain(extra)
        .filter(|p| seen.insert(p.id.clone()))
        .collect()
}

/// Builds the leaderboard from the configured store
pub struct LeaderboardAggregator<'a> {
    source: &'a dyn DataSource,
}

impl<'a> LeaderboardAggregator<'a> {
    pub fn new(source: &'a dyn DataSource) -> Self {
        Self { source }
    }

    /// Profiles of interest: the store's profiles plus the sample set
    pub async fn profiles_of_interest(&self) -> Vec<Profile> {
        let stored = match self.source.fetch_profiles().await {
            Ok(profiles) => profiles,
            Err(e) => {
                tracing::warn!("Profile store unavailable for leaderboard, using sample data: {}", e);
                Vec::new()
            }
        };
        merge_profiles(stored, sample_profiles())
    }

    /// Ranked entries for `profiles`; read failures give an empty board
    pub async fn build(&self, profiles: &[Profile], include_zero: bool) -> Vec<LeaderboardEntry> {
        if profiles.is_empty() {
            tracing::warn!("No profiles provided to leaderboard");
            return Vec::new();
        }

        let ids: Vec<String> = profiles.iter().map(|p| p.id.clone()).collect();
        match self.source.likes_for_profiles(&ids).await {
            Ok(likes) => {
                let entries = aggregate(profiles, &likes, include_zero);
                tracing::debug!(
                    "Leaderboard: {} likes over {} profiles, {} entries",
                    likes.len(),
                    profiles.len(),
                    entries.len()
                );
                entries
            }
            Err(e) if e.is_missing_table() => {
                tracing::warn!("profile_likes table does not exist, leaderboard will be empty");
                Vec::new()
            }
            Err(e) => {
                tracing::error!("Error loading leaderboard: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LikeType;
    use chrono::Utc;

    fn like(profile: &str, like_type: LikeType) -> LikeEvent {
        LikeEvent {
            profile_id: profile.to_string(),
            like_type,
            liker_session_id: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_aggregate_counts_and_orders() {
        let likes = vec![
            like("3", LikeType::Heart),
            like("3", LikeType::Pray),
            like("1", LikeType::Heart),
            like("3", LikeType::Heart),
            like("unknown", LikeType::Heart),
        ];

        let entries = aggregate(&sample_profiles(), &likes, false);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].profile.id, "3");
        assert_eq!((entries[0].heart_count, entries[0].pray_count), (2, 1));
        assert_eq!(entries[0].total_count, 3);
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[0].title, "Yacht Week Royalty");
        assert_eq!(entries[1].profile.id, "1");
        assert_eq!(entries[1].badge, RankBadge::Silver);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let likes = vec![like("4", LikeType::Heart), like("2", LikeType::Pray)];
        let entries = aggregate(&sample_profiles(), &likes, false);
        let ids: Vec<_> = entries.iter().map(|e| e.profile.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "4"]);
        assert_eq!(entries[1].rank, 2);
    }

    #[test]
    fn test_include_zero_view() {
        let likes = vec![like("5", LikeType::Heart)];
        let entries = aggregate(&sample_profiles(), &likes, true);
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].profile.id, "5");
        assert!(entries[1..].iter().all(|e| e.total_count == 0));
    }

    #[test]
    fn test_titles() {
        assert_eq!(aura_title(2, 1), "Aura Legend");
        assert_eq!(aura_title(3, 1), "Charm Champion");
        assert_eq!(aura_title(4, 30), "Magnetic Personality");
        assert_eq!(aura_title(4, 10), "Rising Star");
        assert_eq!(aura_title(9, 2), "Crowd Favorite");
    }

    #[test]
    fn test_merge_profiles_dedupes_by_id() {
        let mut store = sample_profiles();
        store.truncate(2);
        store[0].full_name = "Stored Sarah".into();

        let merged = merge_profiles(store, sample_profiles());
        assert_eq!(merged.len(), 5);
        assert_eq!(merged[0].full_name, "Stored Sarah");
    }
}
