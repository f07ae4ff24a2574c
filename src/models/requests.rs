use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::LikeType;

/// Request to record a decision about a candidate
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DecisionRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "candidate_id", rename = "candidateId")]
    pub candidate_id: String,
    #[validate(length(min = 1))]
    pub decision: String,
}

/// Password sign-in
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Sign-up form as submitted by the client
///
/// Field checks happen in [`crate::core::signup`] so that the first failing
/// field produces the message shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(alias = "full_name", rename = "fullName", default)]
    pub full_name: String,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub photo: Option<PhotoPayload>,
}

/// Profile photo carried inline, hex encoded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoPayload {
    #[serde(alias = "file_name", rename = "fileName")]
    pub file_name: String,
    #[serde(alias = "content_type", rename = "contentType")]
    pub content_type: String,
    pub data: String,
}

/// Like given from the profile grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileLikeRequest {
    #[serde(alias = "like_type", rename = "likeType")]
    pub like_type: LikeType,
}

/// Leaderboard query string
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(alias = "include_zero", rename = "includeZero", default)]
    pub include_zero: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_request_validation() {
        let ok: DecisionRequest =
            serde_json::from_str(r#"{"candidateId":"3","decision":"like"}"#).unwrap();
        assert!(ok.validate().is_ok());

        let empty = DecisionRequest {
            candidate_id: String::new(),
            decision: "like".into(),
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_profile_like_request() {
        let req: ProfileLikeRequest = serde_json::from_str(r#"{"likeType":"pray"}"#).unwrap();
        assert_eq!(req.like_type, LikeType::Pray);
        assert!(serde_json::from_str::<ProfileLikeRequest>(r#"{"likeType":"wink"}"#).is_err());
    }

    #[test]
    fn test_sign_in_rejects_bad_email() {
        let req = SignInRequest {
            email: "not-an-email".into(),
            password: "secret".into(),
        };
        assert!(req.validate().is_err());
    }
}
