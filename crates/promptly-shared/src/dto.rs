//! Data Transfer Objects - request/response types for the API.

use serde::{Deserialize, Serialize};

/// Request to publish a prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePromptRequest {
    pub title: String,
    pub prompt: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_premium: bool,
}

/// Partial edit of a prompt. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePromptRequest {
    pub title: Option<String>,
    pub prompt: Option<String>,
    pub media_url: Option<String>,
    pub category: Option<String>,
    pub model: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_premium: Option<bool>,
    pub is_hidden: Option<bool>,
}

/// Batch lookup of prompts by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdateRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
}

/// `?limit=` on listing endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// `?q=&limit=` on search.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockResponse {
    pub unlocked: bool,
    /// `true` when the prompt was already unlocked and nothing was charged.
    pub already_unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_credits: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowStatusResponse {
    pub following: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSubscriptionResponse {
    pub subscribed: bool,
}
