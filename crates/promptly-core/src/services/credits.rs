//! Credit-gated unlocks.

use std::sync::Arc;

use crate::domain::account_fields::{CREDITS, PROMPTS_UNLOCKED};
use crate::domain::collections::ACCOUNTS;
use crate::domain::{Caller, UserAccount};
use crate::error::DomainError;
use crate::ports::{DocPath, DocumentStore, FieldOp};

/// Result of an unlock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// Already unlocked; nothing was charged.
    AlreadyUnlocked,
    Unlocked { remaining_credits: i64 },
}

pub struct CreditService {
    store: Arc<dyn DocumentStore>,
}

impl CreditService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Spends one credit to unlock `item_id`.
    ///
    /// This is a plain read-then-write of the account. Two concurrent
    /// unlocks can both see the same balance and both succeed.
    pub async fn unlock(
        &self,
        caller: &Caller,
        item_id: &str,
    ) -> Result<UnlockOutcome, DomainError> {
        let user_id = &caller.require()?.user_id;
        let path = DocPath::new(ACCOUNTS, user_id);

        let account: UserAccount = self
            .store
            .get(&path)
            .await?
            .ok_or_else(|| DomainError::not_found("account", user_id.as_str()))?
            .decode()?;

        if account.has_unlocked(item_id) {
            return Ok(UnlockOutcome::AlreadyUnlocked);
        }
        if account.credits < 1 {
            return Err(DomainError::InsufficientCredits {
                available: account.credits,
            });
        }

        let remaining_credits = account.credits - 1;
        self.store
            .update(
                &path,
                vec![
                    (CREDITS.to_string(), FieldOp::set(&remaining_credits)?),
                    (PROMPTS_UNLOCKED.to_string(), FieldOp::union_str(item_id)),
                ],
            )
            .await?;

        tracing::info!(
            user_id = %user_id,
            item_id = %item_id,
            remaining_credits,
            "Prompt unlocked"
        );
        Ok(UnlockOutcome::Unlocked { remaining_credits })
    }
}
