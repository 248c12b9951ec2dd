mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use promptly_core::DomainError;
use promptly_core::domain::Caller;
use promptly_core::domain::collections::{ACCOUNTS, CATALOG, HISTORY};
use promptly_core::domain::UserAccount;
use promptly_core::ports::{DocPath, DocumentStore, FieldOp};
use promptly_core::services::{
    AccountService, CatalogService, CreditService, FollowService, ItemEngagement, LikeService,
    UnlockOutcome,
};

use common::{
    BrokenStore, ConflictingStore, FlakyStore, GatedStore, draft, memory_store, sign_up, user,
};

async fn account(store: &Arc<dyn DocumentStore>, id: &str) -> UserAccount {
    AccountService::new(store.clone()).get_account(id).await.unwrap()
}

async fn likes_of(store: &Arc<dyn DocumentStore>, item_id: &str) -> u64 {
    CatalogService::new(store.clone())
        .get_by_id(item_id)
        .await
        .unwrap()
        .item
        .counters
        .likes
}

#[tokio::test]
async fn test_toggle_like_twice_restores_state() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    let bob = sign_up(&store, "bob").await;
    let item = CatalogService::new(store.clone())
        .create(&alice, draft("Fox"))
        .await
        .unwrap();
    let likes = LikeService::new(store.clone());

    assert!(likes.toggle_like(&bob, &item.id).await.unwrap());
    assert_eq!(likes_of(&store, &item.id).await, 1);
    assert!(account(&store, "bob").await.has_liked(&item.id));

    assert!(!likes.toggle_like(&bob, &item.id).await.unwrap());
    assert_eq!(likes_of(&store, &item.id).await, 0);
    assert!(!account(&store, "bob").await.has_liked(&item.id));

    let view = CatalogService::new(store.clone()).get_by_id(&item.id).await.unwrap();
    assert!(view.item.liked_by.is_empty());
}

#[tokio::test]
async fn test_like_counter_never_goes_negative() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    let bob = sign_up(&store, "bob").await;
    let item = CatalogService::new(store.clone())
        .create(&alice, draft("Fox"))
        .await
        .unwrap();

    // Bob's account claims a like the item never recorded.
    store
        .update(
            &DocPath::new(ACCOUNTS, "bob"),
            vec![("likedPrompts".to_string(), FieldOp::union_str(&item.id))],
        )
        .await
        .unwrap();

    let liked = LikeService::new(store.clone())
        .toggle_like(&bob, &item.id)
        .await
        .unwrap();
    assert!(!liked);
    assert_eq!(likes_of(&store, &item.id).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_likes_from_two_users_both_land() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    let bob = sign_up(&store, "bob").await;
    let carol = sign_up(&store, "carol").await;
    let item = CatalogService::new(store.clone())
        .create(&alice, draft("Fox"))
        .await
        .unwrap();

    // Both transactions read the catalog before either commits.
    let gated: Arc<dyn DocumentStore> = Arc::new(GatedStore::new(store.clone(), CATALOG, 2));
    let likes = LikeService::new(gated);

    let (b, c) = tokio::join!(
        likes.toggle_like(&bob, &item.id),
        likes.toggle_like(&carol, &item.id),
    );
    assert!(b.unwrap());
    assert!(c.unwrap());

    assert_eq!(likes_of(&store, &item.id).await, 2);
    assert!(account(&store, "bob").await.has_liked(&item.id));
    assert!(account(&store, "carol").await.has_liked(&item.id));
}

#[tokio::test]
async fn test_like_retries_through_conflicts() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    let bob = sign_up(&store, "bob").await;
    let item = CatalogService::new(store.clone())
        .create(&alice, draft("Fox"))
        .await
        .unwrap();

    let contended = Arc::new(ConflictingStore::new(store.clone(), CATALOG, 2));
    let likes = LikeService::new(contended.clone());

    assert!(likes.toggle_like(&bob, &item.id).await.unwrap());
    assert_eq!(contended.guarded_commits.load(Ordering::SeqCst), 3);
    assert_eq!(likes_of(&store, &item.id).await, 1);
}

#[tokio::test]
async fn test_like_gives_up_after_bounded_attempts() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    let bob = sign_up(&store, "bob").await;
    let item = CatalogService::new(store.clone())
        .create(&alice, draft("Fox"))
        .await
        .unwrap();

    let contended = Arc::new(ConflictingStore::new(store.clone(), CATALOG, u32::MAX));
    let likes = LikeService::new(contended.clone()).with_max_attempts(3);

    let result = likes.toggle_like(&bob, &item.id).await;
    match result {
        Err(e @ DomainError::TransactionConflict { attempts: 3 }) => assert!(e.is_retryable()),
        other => panic!("expected a transaction conflict, got {other:?}"),
    }
    assert_eq!(contended.guarded_commits.load(Ordering::SeqCst), 3);
    assert_eq!(likes_of(&store, &item.id).await, 0);
}

#[tokio::test]
async fn test_like_requires_both_aggregates() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    let item = CatalogService::new(store.clone())
        .create(&alice, draft("Fox"))
        .await
        .unwrap();
    let likes = LikeService::new(store.clone());

    // No account for the caller.
    let result = likes.toggle_like(&user("ghost"), &item.id).await;
    assert!(matches!(result, Err(DomainError::NotFound { entity_type: "account", .. })));

    let result = likes.toggle_like(&alice, "missing").await;
    assert!(matches!(result, Err(DomainError::NotFound { entity_type: "prompt", .. })));

    let result = likes.toggle_like(&Caller::Anonymous, &item.id).await;
    assert!(matches!(result, Err(DomainError::Unauthenticated)));
}

#[tokio::test]
async fn test_activity_failure_does_not_fail_like() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    let bob = sign_up(&store, "bob").await;
    let item = CatalogService::new(store.clone())
        .create(&alice, draft("Fox"))
        .await
        .unwrap();

    let flaky: Arc<dyn DocumentStore> = Arc::new(FlakyStore::new(store.clone(), |path| {
        path.collection.ends_with(HISTORY)
    }));
    let liked = LikeService::new(flaky)
        .toggle_like(&bob, &item.id)
        .await
        .unwrap();

    assert!(liked);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(likes_of(&store, &item.id).await, 1);
    assert!(
        AccountService::new(store.clone())
            .recent_activity(&bob, 10)
            .await
            .iter()
            .all(|entry| entry.action != "like")
    );
}

#[tokio::test]
async fn test_like_is_logged_as_activity() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    let bob = sign_up(&store, "bob").await;
    let item = CatalogService::new(store.clone())
        .create(&alice, draft("Fox"))
        .await
        .unwrap();

    LikeService::new(store.clone())
        .toggle_like(&bob, &item.id)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let activity = AccountService::new(store.clone())
        .recent_activity(&bob, 10)
        .await;
    assert_eq!(activity[0].action, "like");
}

#[tokio::test]
async fn test_optimistic_like_rolls_back_on_failure() {
    let store = memory_store();
    let bob = sign_up(&store, "bob").await;
    let likes = LikeService::new(store.clone());

    let mut view = ItemEngagement {
        liked: false,
        likes: 4,
    };
    let result = view.toggle_like(&likes, &bob, "missing").await;

    assert!(result.is_err());
    assert_eq!(
        view,
        ItemEngagement {
            liked: false,
            likes: 4
        }
    );
}

#[tokio::test]
async fn test_optimistic_like_keeps_confirmed_state() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    let bob = sign_up(&store, "bob").await;
    let item = CatalogService::new(store.clone())
        .create(&alice, draft("Fox"))
        .await
        .unwrap();
    let likes = LikeService::new(store.clone());

    let mut view = ItemEngagement::default();
    assert!(view.toggle_like(&likes, &bob, &item.id).await.unwrap());
    assert_eq!(
        view,
        ItemEngagement {
            liked: true,
            likes: 1
        }
    );
}

#[tokio::test]
async fn test_stale_view_settles_on_confirmed_count() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    let bob = sign_up(&store, "bob").await;
    let item = CatalogService::new(store.clone())
        .create(&alice, draft("Fox"))
        .await
        .unwrap();
    let likes = LikeService::new(store.clone());
    likes.toggle_like(&bob, &item.id).await.unwrap();

    // Rendered before bob's like showed up as his own.
    let mut view = ItemEngagement {
        liked: false,
        likes: 1,
    };
    assert!(!view.toggle_like(&likes, &bob, &item.id).await.unwrap());
    assert_eq!(
        view,
        ItemEngagement {
            liked: false,
            likes: 0
        }
    );
    assert_eq!(likes_of(&store, &item.id).await, 0);
}

#[tokio::test]
async fn test_follow_and_unfollow() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    sign_up(&store, "bob").await;
    let follows = FollowService::new(store.clone());

    follows.follow(&alice, "bob").await.unwrap();
    assert!(follows.is_following(&alice, "bob").await);
    let (a, b) = (account(&store, "alice").await, account(&store, "bob").await);
    assert_eq!(a.following_count, 1);
    assert!(b.follower_ids.contains("alice"));
    assert_eq!(b.followers_count, 1);

    follows.unfollow(&alice, "bob").await.unwrap();
    assert!(!follows.is_following(&alice, "bob").await);
    let (a, b) = (account(&store, "alice").await, account(&store, "bob").await);
    assert_eq!(a.following_count, 0);
    assert!(b.follower_ids.is_empty());
    assert_eq!(b.followers_count, 0);
}

#[tokio::test]
async fn test_self_follow_is_a_noop() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    let follows = FollowService::new(store.clone());

    follows.follow(&alice, "alice").await.unwrap();

    let a = account(&store, "alice").await;
    assert_eq!(a.following_count, 0);
    assert!(a.following_ids.is_empty());
}

#[tokio::test]
async fn test_follow_counter_drifts_on_repeat() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    sign_up(&store, "bob").await;
    let follows = FollowService::new(store.clone());

    follows.follow(&alice, "bob").await.unwrap();
    follows.follow(&alice, "bob").await.unwrap();

    let b = account(&store, "bob").await;
    assert_eq!(b.follower_ids.len(), 1);
    assert_eq!(b.followers_count, 2);
}

#[tokio::test]
async fn test_follow_second_write_failure_leaves_edge_one_sided() {
    let store = memory_store();
    let alice = sign_up(&store, "alice").await;
    sign_up(&store, "bob").await;

    let flaky: Arc<dyn DocumentStore> = Arc::new(FlakyStore::new(store.clone(), |path| {
        path.collection == ACCOUNTS && path.id == "bob"
    }));
    let result = FollowService::new(flaky).follow(&alice, "bob").await;

    assert!(matches!(result, Err(DomainError::PartialFailure { .. })));
    assert!(account(&store, "alice").await.following_ids.contains("bob"));
    assert!(account(&store, "bob").await.follower_ids.is_empty());
}

#[tokio::test]
async fn test_is_following_fails_soft() {
    let follows = FollowService::new(Arc::new(BrokenStore));
    assert!(!follows.is_following(&user("alice"), "bob").await);
    assert!(!follows.is_following(&Caller::Anonymous, "bob").await);
}

#[tokio::test]
async fn test_unlock_charges_once() {
    let store = memory_store();
    let bob = sign_up(&store, "bob").await;
    let credits = CreditService::new(store.clone());

    let first = credits.unlock(&bob, "p1").await.unwrap();
    assert_eq!(
        first,
        UnlockOutcome::Unlocked {
            remaining_credits: 2
        }
    );
    let second = credits.unlock(&bob, "p1").await.unwrap();
    assert_eq!(second, UnlockOutcome::AlreadyUnlocked);

    let b = account(&store, "bob").await;
    assert_eq!(b.credits, 2);
    assert_eq!(b.prompts_unlocked.iter().collect::<Vec<_>>(), vec!["p1"]);
}

#[tokio::test]
async fn test_unlock_without_credits_fails() {
    let store = memory_store();
    let bob = user("bob");
    AccountService::new(store.clone())
        .with_signup_credits(0)
        .ensure_account(&bob, None)
        .await
        .unwrap();

    let result = CreditService::new(store.clone()).unlock(&bob, "p1").await;

    assert!(matches!(
        result,
        Err(DomainError::InsufficientCredits { available: 0 })
    ));
    assert!(account(&store, "bob").await.prompts_unlocked.is_empty());
}

#[tokio::test]
async fn test_concurrent_unlocks_can_double_spend() {
    let store = memory_store();
    let bob = user("bob");
    AccountService::new(store.clone())
        .with_signup_credits(1)
        .ensure_account(&bob, None)
        .await
        .unwrap();

    // Both unlocks read credits=1 before either writes.
    let gated: Arc<dyn DocumentStore> = Arc::new(GatedStore::new(store.clone(), ACCOUNTS, 2));
    let credits = CreditService::new(gated);
    let (a, b) = tokio::join!(credits.unlock(&bob, "p1"), credits.unlock(&bob, "p2"));

    assert!(a.is_ok());
    assert!(b.is_ok());
    let account = account(&store, "bob").await;
    assert_eq!(account.credits, 0);
    assert_eq!(account.prompts_unlocked.len(), 2);
}
