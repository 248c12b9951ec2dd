use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fallback for author fields missing from a catalog root.
pub const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub likes: u64,
    pub views: u64,
    pub downloads: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A user-submitted prompt, stored inside its author's catalog.
///
/// Items never carry author fields; those are joined at read time by
/// [`project`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub media_ref: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub counters: Counters,
    #[serde(default)]
    pub liked_by: BTreeSet<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl ContentItem {
    /// Build a fresh item with zeroed counters and a new id.
    pub fn new(draft: ItemDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_item_id(now),
            title: draft.title,
            body: draft.body,
            media_ref: draft.media_ref,
            category: draft.category,
            model: draft.model,
            tags: draft.tags,
            is_premium: draft.is_premium,
            is_hidden: false,
            created_at: now,
            counters: Counters::default(),
            liked_by: BTreeSet::new(),
            comments: Vec::new(),
        }
    }

    pub fn apply(&mut self, patch: ItemPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(body) = patch.body {
            self.body = body;
        }
        if let Some(media_ref) = patch.media_ref {
            self.media_ref = Some(media_ref);
        }
        if let Some(category) = patch.category {
            self.category = Some(category);
        }
        if let Some(model) = patch.model {
            self.model = Some(model);
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(is_premium) = patch.is_premium {
            self.is_premium = is_premium;
        }
        if let Some(is_hidden) = patch.is_hidden {
            self.is_hidden = is_hidden;
        }
    }

    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        let hit = |text: &str| text.to_lowercase().contains(&needle);

        hit(&self.title)
            || hit(&self.body)
            || self.tags.iter().any(|t| hit(t))
            || self.category.as_deref().is_some_and(hit)
            || self.model.as_deref().is_some_and(hit)
    }
}

/// Millisecond timestamp followed by random hex. Uniqueness is assumed,
/// never checked.
pub fn generate_item_id(now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}{}", now.timestamp_millis(), &random[..9])
}

/// Input for creating an item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemDraft {
    pub title: String,
    pub body: String,
    pub media_ref: Option<String>,
    pub category: Option<String>,
    pub model: Option<String>,
    pub tags: Vec<String>,
    pub is_premium: bool,
}

/// Partial update of an item; `None` leaves a field alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub media_ref: Option<String>,
    pub category: Option<String>,
    pub model: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_premium: Option<bool>,
    pub is_hidden: Option<bool>,
}

/// Author fields kept once at the catalog root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSnapshot {
    pub id: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
}

/// Per-author aggregate document: `catalog[authorId]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorCatalog {
    #[serde(default)]
    pub author_id: String,
    #[serde(default, rename = "author")]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_username: Option<String>,
    #[serde(default)]
    pub author_avatar: Option<String>,
    #[serde(default)]
    pub author_details: Option<AuthorSnapshot>,
    #[serde(default)]
    pub entries: Vec<ContentItem>,
}

impl AuthorCatalog {
    /// The root snapshot, preferring top-level fields over `authorDetails`.
    pub fn root(&self) -> AuthorSnapshot {
        let details = self.author_details.clone().unwrap_or_default();
        AuthorSnapshot {
            id: if self.author_id.is_empty() {
                details.id
            } else {
                self.author_id.clone()
            },
            name: self.author_name.clone().or(details.name),
            username: self.author_username.clone().or(details.username),
            avatar: self.author_avatar.clone().or(details.avatar),
        }
    }

    pub fn find(&self, item_id: &str) -> Option<&ContentItem> {
        self.entries.iter().find(|item| item.id == item_id)
    }
}

/// An item merged with its author's snapshot, as served to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedItem {
    #[serde(flatten)]
    pub item: ContentItem,
    pub author_id: String,
    pub author_name: String,
    pub author_username: String,
    pub author_avatar: Option<String>,
}

impl ProjectedItem {
    pub fn id(&self) -> &str {
        &self.item.id
    }
}

/// Joins an item with its catalog root. Neither input is modified.
pub fn project(item: &ContentItem, root: &AuthorSnapshot) -> ProjectedItem {
    ProjectedItem {
        item: item.clone(),
        author_id: root.id.clone(),
        author_name: root.name.clone().unwrap_or_else(|| ANONYMOUS.to_string()),
        author_username: root
            .username
            .clone()
            .unwrap_or_else(|| ANONYMOUS.to_string()),
        author_avatar: root.avatar.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str) -> ContentItem {
        ContentItem::new(
            ItemDraft {
                title: title.to_string(),
                body: "a watercolor fox".to_string(),
                tags: vec!["Animals".to_string()],
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_project_falls_back_to_anonymous() {
        let root = AuthorSnapshot {
            id: "a1".to_string(),
            ..Default::default()
        };
        let view = project(&item("Fox"), &root);

        assert_eq!(view.author_id, "a1");
        assert_eq!(view.author_name, ANONYMOUS);
        assert_eq!(view.author_username, ANONYMOUS);
        assert_eq!(view.author_avatar, None);
    }

    #[test]
    fn test_root_prefers_top_level_fields() {
        let catalog = AuthorCatalog {
            author_id: "a1".to_string(),
            author_name: Some("Ada".to_string()),
            author_details: Some(AuthorSnapshot {
                id: "a1".to_string(),
                name: Some("Old".to_string()),
                username: Some("ada".to_string()),
                avatar: None,
            }),
            ..Default::default()
        };

        let root = catalog.root();
        assert_eq!(root.name.as_deref(), Some("Ada"));
        assert_eq!(root.username.as_deref(), Some("ada"));
    }

    #[test]
    fn test_new_item_is_zeroed_and_visible() {
        let item = item("Fox");
        assert_eq!(item.counters, Counters::default());
        assert!(item.liked_by.is_empty());
        assert!(item.comments.is_empty());
        assert!(!item.is_hidden);
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let item = item("Fox");
        assert!(item.matches("WATERCOLOR"));
        assert!(item.matches("animals"));
        assert!(!item.matches("robot"));
    }

    #[test]
    fn test_catalog_schema_field_names() {
        let catalog = AuthorCatalog {
            author_id: "a1".to_string(),
            author_name: Some("Ada".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(json["authorId"], "a1");
        assert_eq!(json["author"], "Ada");
        assert!(json["entries"].is_array());
    }
}
