//! Apply-commit-rollback for caller-side views.
//!
//! The core never rolls anything back itself. A caller that shows a change
//! before the store confirms it wraps the mutation in
//! [`with_optimistic_update`].

use std::future::Future;

use super::likes::LikeService;
use crate::domain::Caller;
use crate::error::DomainError;

/// Applies `apply` to `view`, awaits `commit` and restores the captured
/// slice with `rollback` if the commit fails.
///
/// `apply` returns whatever the rollback needs, usually the previous value
/// of the fields it touched.
pub async fn with_optimistic_update<S, P, T, E, Fut>(
    view: &mut S,
    apply: impl FnOnce(&mut S) -> P,
    commit: Fut,
    rollback: impl FnOnce(&mut S, P),
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    let captured = apply(view);
    match commit.await {
        Ok(value) => Ok(value),
        Err(e) => {
            rollback(view, captured);
            Err(e)
        }
    }
}

/// Like state of one item as a page displays it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemEngagement {
    pub liked: bool,
    pub likes: u64,
}

impl ItemEngagement {
    /// Flips the like locally, then through `likes`. The view ends at the
    /// confirmed state, or back where it started on failure.
    pub async fn toggle_like(
        &mut self,
        likes: &LikeService,
        caller: &Caller,
        item_id: &str,
    ) -> Result<bool, DomainError> {
        let before = *self;
        let result = with_optimistic_update(
            self,
            |view| {
                *view = before.toggled(!before.liked);
                before
            },
            likes.toggle_like(caller, item_id),
            |view, before| *view = before,
        )
        .await;

        match &result {
            Ok(liked) if *liked != self.liked => *self = before.toggled(*liked),
            Ok(_) => {}
            Err(e) => tracing::info!(item_id = %item_id, error = %e, "Like reverted"),
        }
        result
    }

    /// `self` after one like (`liked`) or unlike landed.
    fn toggled(self, liked: bool) -> Self {
        let likes = if liked {
            self.likes + 1
        } else {
            self.likes.saturating_sub(1)
        };
        Self { liked, likes }
    }
}
