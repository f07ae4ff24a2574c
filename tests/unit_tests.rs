// Unit tests for YachtWeek Match

use std::collections::HashSet;

use chrono::Utc;
use yachtweek_match::core::{
    aggregate, aura_title, filter_candidates, merge_profiles, CandidateFeed, FeedOrigin, FeedState,
    PhotoUpload, RankBadge, SignUpForm,
};
use yachtweek_match::models::{
    sample_profiles, AuthUser, DecisionKind, LikeEvent, LikeType, School, ViewerSession,
};

fn like(profile: &str, liker: &str, like_type: LikeType) -> LikeEvent {
    LikeEvent {
        profile_id: profile.to_string(),
        like_type,
        liker_session_id: liker.to_string(),
        created_at: Utc::now(),
    }
}

fn member(id: &str, email: &str) -> AuthUser {
    AuthUser {
        id: id.to_string(),
        email: email.to_string(),
    }
}

#[test]
fn test_feed_never_contains_self_or_decided() {
    let viewer = member("3", "someone-else@stanford.edu");
    let decided: HashSet<String> = ["1".to_string()].into_iter().collect();

    let feed = filter_candidates(sample_profiles(), Some(&viewer), &decided);
    let ids: Vec<&str> = feed.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["2", "4", "5"]);
}

#[test]
fn test_feed_excludes_own_profile_by_email_case_insensitive() {
    let viewer = member("auth-uuid", "SARAH.CHEN@stanford.edu");
    let feed = filter_candidates(sample_profiles(), Some(&viewer), &HashSet::new());
    assert_eq!(feed.len(), 4);
    assert!(feed.iter().all(|p| p.full_name != "Sarah Chen"));
}

#[test]
fn test_empty_profile_set_is_exhausted() {
    let mut feed = CandidateFeed::new();
    assert_eq!(feed.state(), FeedState::Idle);
    assert!(!feed.is_exhausted());

    feed.finish_load(Vec::new(), None, FeedOrigin::Store);
    assert!(feed.is_exhausted());
    assert!(feed.current().is_none());
}

#[test]
fn test_decision_kinds() {
    assert_eq!("like".parse::<DecisionKind>(), Ok(DecisionKind::Like));
    assert_eq!("FRIEND".parse::<DecisionKind>(), Ok(DecisionKind::Friend));
    assert_eq!("pass".parse::<DecisionKind>(), Ok(DecisionKind::Pass));
    assert!("superlike".parse::<DecisionKind>().is_err());

    assert_eq!(DecisionKind::Like.like_type(), Some(LikeType::Heart));
    assert_eq!(DecisionKind::Friend.like_type(), Some(LikeType::Pray));
    assert_eq!(DecisionKind::Pass.like_type(), None);
}

#[test]
fn test_viewer_attribution() {
    let anon = ViewerSession::Anonymous("anon_1700000000000_abc123xyz".into());
    assert_eq!(anon.liker_id(), "anon_1700000000000_abc123xyz");
    assert_eq!(anon.state_key(), "anon:anon_1700000000000_abc123xyz");
    assert!(anon.access_token().is_none());

    let signed_in = ViewerSession::Authenticated {
        user: member("u-42", "u@hbs.edu"),
        access_token: "jwt".into(),
    };
    assert_eq!(signed_in.liker_id(), "u-42");
    assert_eq!(signed_in.state_key(), "user:u-42");
}

#[test]
fn test_leaderboard_totals_match_like_counts() {
    let likes = vec![
        like("2", "a", LikeType::Heart),
        like("2", "b", LikeType::Heart),
        like("2", "c", LikeType::Pray),
        like("4", "a", LikeType::Pray),
        like("4", "b", LikeType::Pray),
        like("1", "a", LikeType::Heart),
    ];

    let entries = aggregate(&sample_profiles(), &likes, false);
    let total: u32 = entries.iter().map(|e| e.total_count).sum();
    assert_eq!(total as usize, likes.len());

    for entry in &entries {
        assert_eq!(entry.total_count, entry.heart_count + entry.pray_count);
    }
    // Ranking is non-increasing and ranks are positions
    for (i, pair) in entries.windows(2).enumerate() {
        assert!(pair[0].total_count >= pair[1].total_count);
        assert_eq!(pair[0].rank, i + 1);
    }

    assert_eq!(entries[0].profile.id, "2");
    assert_eq!(entries[0].badge, RankBadge::Gold);
    assert_eq!(entries[2].badge, RankBadge::Bronze);
}

#[test]
fn test_leaderboard_no_likes() {
    assert!(aggregate(&sample_profiles(), &[], false).is_empty());

    let all = aggregate(&sample_profiles(), &[], true);
    assert_eq!(all.len(), 5);
    // Stable: input order survives among zero totals
    let ids: Vec<&str> = all.iter().map(|e| e.profile.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
}

#[test]
fn test_leaderboard_titles_by_rank() {
    assert_eq!(aura_title(1, 1), "Yacht Week Royalty");
    assert_eq!(aura_title(5, 12), "Rising Star");
}

#[test]
fn test_merge_profiles_keeps_store_first() {
    let mut stored = sample_profiles();
    stored.truncate(1);
    stored[0].bio = "updated".into();

    let merged = merge_profiles(stored, sample_profiles());
    assert_eq!(merged.len(), 5);
    assert_eq!(merged[0].bio, "updated");
}

#[test]
fn test_school_from_email() {
    assert_eq!(School::from_email("a@stanford.edu"), School::StanfordGsb);
    assert_eq!(School::from_email("a@hbs.edu"), School::HarvardBusinessSchool);
}

#[test]
fn test_signup_validation_order() {
    let form = SignUpForm {
        email: "x@gmail.com".into(),
        password: String::new(),
        full_name: "X".into(),
        age: Some(17),
        bio: String::new(),
        photo: None,
    };
    // Age is checked before the email domain
    assert_eq!(
        form.validate().unwrap_err().to_string(),
        "Please enter a valid age (18-100)"
    );

    let form = SignUpForm {
        age: Some(18),
        email: "x@stanford.edu".into(),
        bio: "hi".into(),
        photo: Some(PhotoUpload {
            file_name: "x.gif".into(),
            content_type: "image/gif".into(),
            bytes: vec![1, 2, 3],
        }),
        ..form
    };
    assert_eq!(form.validate().unwrap_err().to_string(), "Password is required");
}
