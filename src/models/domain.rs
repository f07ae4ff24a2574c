use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Business school a member belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum School {
    #[serde(rename = "Stanford GSB")]
    StanfordGsb,
    #[serde(rename = "Harvard Business School")]
    HarvardBusinessSchool,
}

impl School {
    /// Derive the school from a sign-up email address
    pub fn from_email(email: &str) -> Self {
        if email.to_lowercase().contains("stanford") {
            School::StanfordGsb
        } else {
            School::HarvardBusinessSchool
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            School::StanfordGsb => "Stanford",
            School::HarvardBusinessSchool => "Harvard",
        }
    }
}

/// Member profile as stored in the `profiles` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub age: u8,
    pub school: School,
    #[serde(default)]
    pub bio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undergrad_school: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_mba_company: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub interests: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub photo_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Whether this profile belongs to the given user
    ///
    /// Store rows share the user's id; the built-in sample rows only share the email.
    pub fn is_owned_by(&self, user: &AuthUser) -> bool {
        self.id == user.id || self.email.eq_ignore_ascii_case(&user.email)
    }

    pub fn primary_photo(&self) -> Option<&str> {
        self.photo_urls.first().map(String::as_str)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A viewer's choice about a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Like,
    Friend,
    Pass,
}

impl DecisionKind {
    /// The like-event this decision produces, if any
    pub fn like_type(&self) -> Option<LikeType> {
        match self {
            DecisionKind::Like => Some(LikeType::Heart),
            DecisionKind::Friend => Some(LikeType::Pray),
            DecisionKind::Pass => None,
        }
    }

    pub fn is_like(&self) -> bool {
        matches!(self, DecisionKind::Like)
    }
}

impl std::str::FromStr for DecisionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "like" => Ok(DecisionKind::Like),
            "friend" => Ok(DecisionKind::Friend),
            "pass" => Ok(DecisionKind::Pass),
            other => Err(format!("unknown decision '{}'", other)),
        }
    }
}

/// Tally category of a like-event: romantic (heart) or friendly (pray)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeType {
    Heart,
    Pray,
}

impl fmt::Display for LikeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LikeType::Heart => write!(f, "heart"),
            LikeType::Pray => write!(f, "pray"),
        }
    }
}

/// Row of the `profile_likes` table, feeding the leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeEvent {
    pub profile_id: String,
    pub like_type: LikeType,
    #[serde(default)]
    pub liker_session_id: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Like-event about to be written
#[derive(Debug, Clone, Serialize)]
pub struct NewLikeEvent {
    pub profile_id: String,
    pub like_type: LikeType,
    pub liker_session_id: String,
}

/// Result of a like insert; a duplicate counts as already recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeInsert {
    Recorded,
    AlreadyRecorded,
}

/// Row of the `swipes` table (the decision event used for match detection)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swipe {
    pub swiper_id: String,
    pub swiped_id: String,
    pub is_like: bool,
    pub created_at: DateTime<Utc>,
}

/// Swipe about to be written
#[derive(Debug, Clone, Serialize)]
pub struct NewSwipe {
    pub swiper_id: String,
    pub swiped_id: String,
    pub is_like: bool,
}

/// Mutual like between two members, with the joined profiles when available
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user1: Option<Profile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user2: Option<Profile>,
}

impl Match {
    pub fn involves(&self, user_id: &str) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    /// The matched profile as seen from `viewer_id`
    pub fn other(&self, viewer_id: &str) -> Option<&Profile> {
        if self.user1_id == viewer_id {
            self.user2.as_ref()
        } else {
            self.user1.as_ref()
        }
    }

    /// The two member ids, ordered, so a pair compares equal regardless of who liked first
    pub fn pair(&self) -> (&str, &str) {
        if self.user1_id <= self.user2_id {
            (&self.user1_id, &self.user2_id)
        } else {
            (&self.user2_id, &self.user1_id)
        }
    }
}

/// Authenticated member identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

/// Identity plus the credentials issued for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: AuthUser,
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Who is looking at the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerSession {
    Authenticated {
        user: AuthUser,
        access_token: String,
    },
    Anonymous(String),
}

impl ViewerSession {
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            ViewerSession::Authenticated { user, .. } => Some(user),
            ViewerSession::Anonymous(_) => None,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        match self {
            ViewerSession::Authenticated { access_token, .. } => Some(access_token),
            ViewerSession::Anonymous(_) => None,
        }
    }

    /// Id that like-events are attributed to
    pub fn liker_id(&self) -> &str {
        match self {
            ViewerSession::Authenticated { user, .. } => &user.id,
            ViewerSession::Anonymous(token) => token,
        }
    }

    /// Key of this viewer's state in the registry
    pub fn state_key(&self) -> String {
        match self {
            ViewerSession::Authenticated { user, .. } => format!("user:{}", user.id),
            ViewerSession::Anonymous(token) => format!("anon:{}", token),
        }
    }
}

/// Per-profile like counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeTally {
    pub hearts: u32,
    pub prays: u32,
}

impl LikeTally {
    pub fn add(&mut self, like_type: LikeType) {
        match like_type {
            LikeType::Heart => self.hearts += 1,
            LikeType::Pray => self.prays += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.hearts + self.prays
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_school_from_email() {
        assert_eq!(School::from_email("a@Stanford.edu"), School::StanfordGsb);
        assert_eq!(School::from_email("a@hbs.edu"), School::HarvardBusinessSchool);
    }

    #[test]
    fn test_decision_like_types() {
        assert_eq!(DecisionKind::Like.like_type(), Some(LikeType::Heart));
        assert_eq!(DecisionKind::Friend.like_type(), Some(LikeType::Pray));
        assert_eq!(DecisionKind::Pass.like_type(), None);
        assert_eq!("FRIEND".parse::<DecisionKind>(), Ok(DecisionKind::Friend));
        assert!("superlike".parse::<DecisionKind>().is_err());
    }

    #[test]
    fn test_profile_row_with_null_arrays() {
        let row = serde_json::json!({
            "id": "u1",
            "email": "x@hbs.edu",
            "full_name": "X",
            "age": 30,
            "school": "Harvard Business School",
            "bio": "hi",
            "interests": null,
            "photo_urls": null,
            "created_at": "2024-01-01T00:00:00Z"
        });
        let profile: Profile = serde_json::from_value(row).unwrap();
        assert!(profile.interests.is_empty());
        assert!(profile.primary_photo().is_none());
    }

    #[test]
    fn test_match_other_side() {
        let m = Match {
            id: "m".into(),
            user1_id: "b".into(),
            user2_id: "a".into(),
            created_at: Utc::now(),
            user1: None,
            user2: None,
        };
        assert!(m.involves("a"));
        assert!(!m.involves("c"));
        assert_eq!(m.pair(), ("a", "b"));
    }

    #[test]
    fn test_viewer_attribution() {
        let anon = ViewerSession::Anonymous("anon_1_abc".into());
        assert_eq!(anon.liker_id(), "anon_1_abc");
        assert_eq!(anon.state_key(), "anon:anon_1_abc");

        let authed = ViewerSession::Authenticated {
            user: AuthUser { id: "u1".into(), email: "u@hbs.edu".into() },
            access_token: "t".into(),
        };
        assert_eq!(authed.liker_id(), "u1");
        assert_eq!(authed.state_key(), "user:u1");
    }
}
