use super::{AccountStore, CreateOutcome, UpdateOutcome};
use crate::accounts::model::{Account, AccountChanges, AccountId, NewAccount, TokenGuard};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    next_id: AccountId,
    accounts: HashMap<AccountId, Account>,
}

/// Process-local store. All mutations run under one write lock, so guarded
/// updates and email uniqueness hold the same way they do in Postgres.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    state: RwLock<State>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.state.read().await.accounts.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|account| account.email == email)
            .cloned())
    }

    async fn find_by_verify_token(&self, digest: &str) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|account| account.verify_token.as_deref() == Some(digest))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Account>> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state.accounts.values().cloned().collect();
        accounts.sort_by_key(|account| account.id);
        Ok(accounts)
    }

    async fn create(&self, account: NewAccount) -> Result<CreateOutcome> {
        let mut state = self.state.write().await;
        if state.accounts.values().any(|a| a.email == account.email) {
            return Ok(CreateOutcome::EmailTaken);
        }

        state.next_id += 1;
        let now = Utc::now();
        let verification = account.verification;
        let created = Account {
            id: state.next_id,
            email: account.email,
            password_hash: account.password_hash,
            is_verified: false,
            verify_token: Some(verification.token),
            verify_short_token: Some(verification.short_token),
            verify_expires: Some(verification.expires),
            verify_changes: verification.changes,
            reset_token: None,
            reset_short_token: None,
            reset_expires: None,
            created_at: now,
            updated_at: now,
        };
        state.accounts.insert(created.id, created.clone());
        Ok(CreateOutcome::Created(created))
    }

    async fn update(
        &self,
        id: AccountId,
        changes: &AccountChanges,
        guard: Option<&TokenGuard>,
    ) -> Result<UpdateOutcome> {
        let mut state = self.state.write().await;

        if let Some(email) = &changes.email {
            if state
                .accounts
                .values()
                .any(|a| a.id != id && &a.email == email)
            {
                return Ok(UpdateOutcome::EmailTaken);
            }
        }

        let Some(account) = state.accounts.get_mut(&id) else {
            return Ok(UpdateOutcome::GuardFailed);
        };
        if guard.is_some_and(|guard| !guard.holds(account)) {
            return Ok(UpdateOutcome::GuardFailed);
        }

        changes.apply(account, Utc::now());
        Ok(UpdateOutcome::Updated(account.clone()))
    }

    async fn remove(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.state.write().await.accounts.remove(&id))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
