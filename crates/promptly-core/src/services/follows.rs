//! Follow graph. Each edge is two independent writes with no rollback.

use std::sync::Arc;

use crate::domain::account_fields::{FOLLOWER_IDS, FOLLOWERS_COUNT, FOLLOWING_COUNT, FOLLOWING_IDS};
use crate::domain::collections::ACCOUNTS;
use crate::domain::{Caller, UserAccount};
use crate::error::DomainError;
use crate::ports::{DocPath, DocumentStore, FieldOp};

pub struct FollowService {
    store: Arc<dyn DocumentStore>,
}

impl FollowService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn follow(&self, caller: &Caller, target_id: &str) -> Result<(), DomainError> {
        self.link(caller, target_id, Direction::Follow).await
    }

    pub async fn unfollow(&self, caller: &Caller, target_id: &str) -> Result<(), DomainError> {
        self.link(caller, target_id, Direction::Unfollow).await
    }

    /// Fail-soft: anonymous callers and read failures yield `false`.
    pub async fn is_following(&self, caller: &Caller, target_id: &str) -> bool {
        let Some(user_id) = caller.user_id() else {
            tracing::debug!("Anonymous follow lookup");
            return false;
        };

        match self.store.get(&DocPath::new(ACCOUNTS, user_id)).await {
            Ok(Some(doc)) => doc
                .decode::<UserAccount>()
                .map(|account| account.is_following(target_id))
                .unwrap_or(false),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to read follow state");
                false
            }
        }
    }

    /// Writes the follower's side first, then the target's. If the second
    /// write fails the first one stays and the edge is left one-sided.
    async fn link(
        &self,
        caller: &Caller,
        target_id: &str,
        direction: Direction,
    ) -> Result<(), DomainError> {
        let user_id = &caller.require()?.user_id;
        if user_id == target_id {
            tracing::debug!(user_id = %user_id, "Ignoring self-follow");
            return Ok(());
        }

        self.store
            .update(
                &DocPath::new(ACCOUNTS, user_id),
                vec![
                    (FOLLOWING_IDS.to_string(), direction.set_op(target_id)),
                    (FOLLOWING_COUNT.to_string(), FieldOp::Increment(direction.delta())),
                ],
            )
            .await?;

        if let Err(source) = self
            .store
            .update(
                &DocPath::new(ACCOUNTS, target_id),
                vec![
                    (FOLLOWER_IDS.to_string(), direction.set_op(user_id)),
                    (FOLLOWERS_COUNT.to_string(), FieldOp::Increment(direction.delta())),
                ],
            )
            .await
        {
            tracing::warn!(
                user_id = %user_id,
                target_id = %target_id,
                ?direction,
                error = %source,
                "Follow edge left one-sided"
            );
            return Err(DomainError::PartialFailure {
                completed: "following set",
                failed: "follower set",
                source,
            });
        }

        tracing::info!(
            user_id = %user_id,
            target_id = %target_id,
            ?direction,
            "Follow graph updated"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Follow,
    Unfollow,
}

impl Direction {
    fn set_op(self, id: &str) -> FieldOp {
        match self {
            Direction::Follow => FieldOp::union_str(id),
            Direction::Unfollow => FieldOp::remove_str(id),
        }
    }

    fn delta(self) -> i64 {
        match self {
            Direction::Follow => 1,
            Direction::Unfollow => -1,
        }
    }
}
