//! Account lifecycle, profile edits and activity history.

use std::sync::Arc;

use chrono::Utc;

use super::activity::ActivityLog;
use super::catalog::{CatalogService, author_snapshot};
use crate::domain::account_fields::{AVATAR, GENERATIONS_USED, NAME, USERNAME};
use crate::domain::collections::{ACCOUNTS, CATALOG};
use crate::domain::{ActivityEntry, Caller, ProfilePatch, UserAccount};
use crate::error::{DomainError, StoreError};
use crate::ports::{DocPath, DocumentStore, FieldOp, Write, to_fields};

/// Credits granted at first sign-in unless configured otherwise.
pub const DEFAULT_SIGNUP_CREDITS: i64 = 3;

pub struct AccountService {
    store: Arc<dyn DocumentStore>,
    catalog: CatalogService,
    activity: ActivityLog,
    signup_credits: i64,
}

impl AccountService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            activity: ActivityLog::new(store.clone()),
            store,
            signup_credits: DEFAULT_SIGNUP_CREDITS,
        }
    }

    pub fn with_signup_credits(mut self, credits: i64) -> Self {
        self.signup_credits = credits.max(0);
        self
    }

    /// Returns the caller's account, creating it on first sign-in.
    pub async fn ensure_account(
        &self,
        caller: &Caller,
        device: Option<String>,
    ) -> Result<UserAccount, DomainError> {
        let identity = caller.require()?;
        let path = DocPath::new(ACCOUNTS, &identity.user_id);

        if let Some(doc) = self.store.get(&path).await? {
            let account: UserAccount = doc.decode()?;
            self.activity.append_detached(
                &identity.user_id,
                ActivityEntry::new("sign_in", "Signed in").on_device(device),
            );
            return Ok(account);
        }

        let account = UserAccount::new(identity, self.signup_credits, Utc::now());
        self.store.set(&path, to_fields(&account)?).await?;
        self.activity.append_detached(
            &identity.user_id,
            ActivityEntry::new("sign_in", "Account created").on_device(device),
        );

        tracing::info!(user_id = %identity.user_id, credits = account.credits, "Account created");
        Ok(account)
    }

    /// Fail-soft point read.
    pub async fn get_account(&self, user_id: &str) -> Option<UserAccount> {
        match self.store.get(&DocPath::new(ACCOUNTS, user_id)).await {
            Ok(doc) => doc.and_then(|doc| doc.decode().ok()),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to read account");
                None
            }
        }
    }

    /// Updates profile fields and the author root of the user's catalog.
    pub async fn update_profile(
        &self,
        caller: &Caller,
        patch: ProfilePatch,
    ) -> Result<UserAccount, DomainError> {
        let identity = caller.require()?;
        if patch.is_empty() {
            return Err(DomainError::Validation("nothing to update".to_string()));
        }
        let path = DocPath::new(ACCOUNTS, &identity.user_id);

        let mut updates = Vec::new();
        for (field, value) in [
            (NAME, &patch.name),
            (USERNAME, &patch.username),
            (AVATAR, &patch.avatar),
        ] {
            if let Some(value) = value {
                updates.push((field.to_string(), FieldOp::set(value)?));
            }
        }

        match self.store.update(&path, updates).await {
            Err(StoreError::NotFound(_)) => {
                return Err(DomainError::not_found("account", identity.user_id.as_str()));
            }
            other => other?,
        }

        let account: UserAccount = self
            .store
            .get(&path)
            .await?
            .ok_or_else(|| DomainError::not_found("account", identity.user_id.as_str()))?
            .decode()?;

        let mut root = author_snapshot(identity);
        root.name = account.name.clone();
        root.username = account.username.clone();
        root.avatar = account.avatar.clone();
        if self.catalog.refresh_author(&root).await? {
            tracing::debug!(user_id = %identity.user_id, "Catalog author root refreshed");
        }

        Ok(account)
    }

    /// Full termination: catalog, history and account go in one commit.
    pub async fn delete_account(&self, caller: &Caller) -> Result<(), DomainError> {
        let user_id = &caller.require()?.user_id;

        let mut writes: Vec<Write> = self
            .activity
            .paths(user_id)
            .await?
            .into_iter()
            .map(Write::delete)
            .collect();
        writes.push(Write::delete(DocPath::new(CATALOG, user_id)));
        writes.push(Write::delete(DocPath::new(ACCOUNTS, user_id)));
        self.store.commit(writes).await?;

        tracing::info!(user_id = %user_id, "Account deleted");
        Ok(())
    }

    pub async fn record_generation(&self, caller: &Caller) -> Result<(), DomainError> {
        let user_id = &caller.require()?.user_id;
        match self
            .store
            .update(
                &DocPath::new(ACCOUNTS, user_id),
                vec![(GENERATIONS_USED.to_string(), FieldOp::Increment(1))],
            )
            .await
        {
            Err(StoreError::NotFound(_)) => {
                Err(DomainError::not_found("account", user_id.as_str()))
            }
            other => Ok(other?),
        }
    }

    pub async fn log_activity(
        &self,
        caller: &Caller,
        entry: ActivityEntry,
    ) -> Result<(), DomainError> {
        let user_id = &caller.require()?.user_id;
        self.activity.append(user_id, &entry).await?;
        Ok(())
    }

    /// Newest first; anonymous callers get nothing.
    pub async fn recent_activity(&self, caller: &Caller, limit: usize) -> Vec<ActivityEntry> {
        match caller.user_id() {
            Some(user_id) => self.activity.recent(user_id, limit).await,
            None => {
                tracing::debug!("Anonymous activity lookup");
                Vec::new()
            }
        }
    }
}
