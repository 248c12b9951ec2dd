use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Identity;

/// Persisted field names of `accounts[userId]`, shared by every writer.
pub mod fields {
    pub const NAME: &str = "name";
    pub const USERNAME: &str = "username";
    pub const AVATAR: &str = "avatar";
    pub const CREDITS: &str = "credits";
    pub const PROMPTS_UNLOCKED: &str = "promptsUnlocked";
    pub const FOLLOWING_IDS: &str = "followingIds";
    pub const FOLLOWER_IDS: &str = "followerIds";
    pub const FOLLOWING_COUNT: &str = "followingCount";
    pub const FOLLOWERS_COUNT: &str = "followersCount";
    pub const LIKED_PROMPTS: &str = "likedPrompts";
    pub const GENERATIONS_USED: &str = "generationsUsed";
}

fn free_plan() -> String {
    "free".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySettings {
    #[serde(default)]
    pub two_factor_enabled: bool,
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

/// `accounts[userId]`.
///
/// Counters are signed: the follow graph and the credit gate are not
/// transactional, so races can push them out of step with their sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default = "free_plan")]
    pub subscription: String,
    #[serde(default)]
    pub credits: i64,
    #[serde(default)]
    pub prompts_unlocked: BTreeSet<String>,
    #[serde(default)]
    pub following_ids: BTreeSet<String>,
    #[serde(default)]
    pub follower_ids: BTreeSet<String>,
    #[serde(default)]
    pub followers_count: i64,
    #[serde(default)]
    pub following_count: i64,
    #[serde(default)]
    pub liked_prompts: BTreeSet<String>,
    #[serde(default)]
    pub generations_used: i64,
    #[serde(default)]
    pub security: SecuritySettings,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserAccount {
    /// Account created at first sign-in.
    pub fn new(identity: &Identity, credits: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: identity.user_id.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            username: identity.username.clone(),
            avatar: identity.avatar.clone(),
            subscription: free_plan(),
            credits,
            prompts_unlocked: BTreeSet::new(),
            following_ids: BTreeSet::new(),
            follower_ids: BTreeSet::new(),
            followers_count: 0,
            following_count: 0,
            liked_prompts: BTreeSet::new(),
            generations_used: 0,
            security: SecuritySettings {
                two_factor_enabled: false,
                last_sign_in_at: Some(now),
            },
            created_at: Some(now),
        }
    }

    pub fn has_unlocked(&self, item_id: &str) -> bool {
        self.prompts_unlocked.contains(item_id)
    }

    pub fn has_liked(&self, item_id: &str) -> bool {
        self.liked_prompts.contains(item_id)
    }

    pub fn is_following(&self, user_id: &str) -> bool {
        self.following_ids.contains(user_id)
    }
}

/// Profile fields a user may edit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.username.is_none() && self.avatar.is_none()
    }
}

/// `accounts[userId]/history[]` - written once, never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub action: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub device: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(action: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            details: details.into(),
            device: None,
            created_at: Utc::now(),
        }
    }

    pub fn on_device(mut self, device: Option<String>) -> Self {
        self.device = device;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_sparse_document() {
        let account: UserAccount = serde_json::from_value(serde_json::json!({
            "email": "ada@example.com",
            "credits": 2,
            "likedPrompts": ["p1"]
        }))
        .unwrap();

        assert_eq!(account.subscription, "free");
        assert_eq!(account.credits, 2);
        assert!(account.has_liked("p1"));
        assert!(account.following_ids.is_empty());
    }

    #[test]
    fn test_new_account_uses_identity() {
        let identity = Identity::new("u1", "ada@example.com").with_name("Ada");
        let account = UserAccount::new(&identity, 3, Utc::now());

        assert_eq!(account.id, "u1");
        assert_eq!(account.name.as_deref(), Some("Ada"));
        assert_eq!(account.credits, 3);
        assert!(account.security.last_sign_in_at.is_some());
    }
}
