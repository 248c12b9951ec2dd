mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use promptly_core::DomainError;
use promptly_core::domain::collections::{ACCOUNTS, CATALOG, FEATURES};
use promptly_core::domain::{ActivityEntry, Caller, ProfilePatch};
use promptly_core::ports::{DocPath, DocumentStore, to_fields};
use promptly_core::services::{AccountService, CatalogService, RoadmapService};

use common::{BrokenStore, draft, memory_store, sign_up, user};

#[tokio::test]
async fn test_ensure_account_is_idempotent() {
    let store = memory_store();
    let accounts = AccountService::new(store.clone());
    let alice = user("alice");

    let created = accounts
        .ensure_account(&alice, Some("Firefox".to_string()))
        .await
        .unwrap();
    assert_eq!(created.credits, 3);
    assert_eq!(created.subscription, "free");
    assert_eq!(created.email, "alice@example.com");

    tokio::time::sleep(Duration::from_millis(5)).await;
    let again = accounts
        .ensure_account(&alice, Some("Safari".to_string()))
        .await
        .unwrap();
    assert_eq!(again, created);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let activity = accounts.recent_activity(&alice, 10).await;
    let actions: Vec<&str> = activity.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["sign_in", "sign_in"]);
    assert_eq!(activity[0].device.as_deref(), Some("Safari"));
    assert_eq!(activity[1].device.as_deref(), Some("Firefox"));
}

#[tokio::test]
async fn test_signup_credits_are_configurable() {
    let accounts = AccountService::new(memory_store()).with_signup_credits(10);
    let account = accounts.ensure_account(&user("bob"), None).await.unwrap();
    assert_eq!(account.credits, 10);
}

#[tokio::test]
async fn test_update_profile_refreshes_catalog_root() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    let catalog = CatalogService::new(store.clone());
    let item = catalog.create(&alice, draft("Fox")).await.unwrap();

    let patch = ProfilePatch {
        name: Some("Alice Liddell".to_string()),
        avatar: Some("https://cdn.example.com/a.png".to_string()),
        ..Default::default()
    };
    let account = AccountService::new(store.clone())
        .update_profile(&alice, patch)
        .await
        .unwrap();
    assert_eq!(account.name.as_deref(), Some("Alice Liddell"));
    assert_eq!(account.username.as_deref(), Some("alice"));

    let view = catalog.get_by_id(&item.id).await.unwrap();
    assert_eq!(view.author_name, "Alice Liddell");
    assert_eq!(view.author_username, "alice");
    assert_eq!(
        view.author_avatar.as_deref(),
        Some("https://cdn.example.com/a.png")
    );
}

#[tokio::test]
async fn test_update_profile_without_catalog() {
    let store = memory_store();
    let bob = sign_up(&store, "bob").await;

    let patch = ProfilePatch {
        username: Some("bobby".to_string()),
        ..Default::default()
    };
    AccountService::new(store.clone())
        .update_profile(&bob, patch)
        .await
        .unwrap();

    assert!(
        store
            .get(&DocPath::new(CATALOG, "bob"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_update_profile_rejects_empty_patch() {
    let store = memory_store();
    let bob = sign_up(&store, "bob").await;
    let result = AccountService::new(store)
        .update_profile(&bob, ProfilePatch::default())
        .await;
    assert!(matches!(result, Err(DomainError::Validation(_))));
}

#[tokio::test]
async fn test_delete_account_removes_everything() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    let accounts = AccountService::new(store.clone());
    CatalogService::new(store.clone())
        .create(&alice, draft("Fox"))
        .await
        .unwrap();
    accounts
        .log_activity(&alice, ActivityEntry::new("generate", "Generated an image"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    accounts.delete_account(&alice).await.unwrap();

    assert!(accounts.get_account("alice").await.is_none());
    assert!(accounts.recent_activity(&alice, 10).await.is_empty());
    assert!(
        CatalogService::new(store.clone())
            .get_by_author("alice")
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_record_generation() {
    let store = memory_store();
    let bob = sign_up(&store, "bob").await;
    let accounts = AccountService::new(store.clone());

    accounts.record_generation(&bob).await.unwrap();
    accounts.record_generation(&bob).await.unwrap();
    assert_eq!(accounts.get_account("bob").await.unwrap().generations_used, 2);

    let result = accounts.record_generation(&user("ghost")).await;
    assert!(matches!(result, Err(DomainError::NotFound { .. })));
}

#[tokio::test]
async fn test_recent_activity_is_newest_first_and_limited() {
    let store = memory_store();
    let bob = sign_up(&store, "bob").await;
    let accounts = AccountService::new(store.clone());
    tokio::time::sleep(Duration::from_millis(10)).await;

    for n in 0..3 {
        accounts
            .log_activity(&bob, ActivityEntry::new("generate", format!("run {n}")))
            .await
            .unwrap();
    }

    let activity = accounts.recent_activity(&bob, 2).await;
    let details: Vec<&str> = activity.iter().map(|e| e.details.as_str()).collect();
    assert_eq!(details, vec!["run 2", "run 1"]);
    assert!(
        accounts
            .recent_activity(&Caller::Anonymous, 10)
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_account_reads_fail_soft() {
    let accounts = AccountService::new(Arc::new(BrokenStore));
    assert!(accounts.get_account("alice").await.is_none());
    assert!(accounts.recent_activity(&user("alice"), 5).await.is_empty());
}

#[tokio::test]
async fn test_account_mutations_require_sign_in() {
    let accounts = AccountService::new(memory_store());
    let result = accounts.ensure_account(&Caller::Anonymous, None).await;
    assert!(matches!(result, Err(DomainError::Unauthenticated)));
    let result = accounts.delete_account(&Caller::Anonymous).await;
    assert!(matches!(result, Err(DomainError::Unauthenticated)));
}

#[tokio::test]
async fn test_feature_subscription_toggles_and_counts() {
    let store = memory_store();
    store
        .set(
            &DocPath::new(FEATURES, "dark-mode"),
            to_fields(&json!({ "title": "Dark mode", "status": "planned" })).unwrap(),
        )
        .await
        .unwrap();
    let roadmap = RoadmapService::new(store.clone());
    let bob = user("bob");

    assert!(roadmap.toggle_feature_subscription(&bob, "dark-mode").await.unwrap());
    let features = roadmap.list_features().await;
    assert_eq!(features.len(), 1);
    assert_eq!(features[0].id, "dark-mode");
    assert_eq!(features[0].subscriber_count, 1);

    assert!(!roadmap.toggle_feature_subscription(&bob, "dark-mode").await.unwrap());
    assert_eq!(roadmap.list_features().await[0].subscriber_count, 0);

    let missing = roadmap.toggle_feature_subscription(&bob, "teleport").await;
    assert!(matches!(missing, Err(DomainError::NotFound { .. })));
}

#[tokio::test]
async fn test_list_models() {
    let store = memory_store();
    for (value, label) in [("a-model", "Zeta"), ("b-model", "Alpha")] {
        store
            .set(
                &DocPath::new("models", value),
                to_fields(&json!({ "label": label, "value": value })).unwrap(),
            )
            .await
            .unwrap();
    }

    let models = RoadmapService::new(store).list_models().await;
    let labels: Vec<&str> = models.iter().map(|m| m.label.as_str()).collect();
    assert_eq!(labels, vec!["Alpha", "Zeta"]);
    assert_eq!(models[0].value, "b-model");
}

#[tokio::test]
async fn test_account_document_uses_camel_case_fields() {
    let store = memory_store();
    sign_up(&store, "alice").await;

    let doc = store
        .get(&DocPath::new(ACCOUNTS, "alice"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.data["credits"], 3);
    assert!(doc.data.contains_key("promptsUnlocked"));
    assert!(doc.data.contains_key("followersCount"));
}
