//! Account persistence seam.
//!
//! Two backends share the same contract: Postgres for deployments and an
//! in-memory map for tests and local development. Updates can carry a
//! [`TokenGuard`]; a guarded update only applies while the row still holds the
//! expected token digest, which makes token check-and-clear atomic per row.

use super::model::{Account, AccountChanges, AccountId, NewAccount, TokenGuard};
use anyhow::Result;
use async_trait::async_trait;

pub mod memory;
pub mod postgres;

pub use memory::MemoryAccountStore;
pub use postgres::PgAccountStore;

#[derive(Debug)]
pub enum CreateOutcome {
    Created(Account),
    EmailTaken,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(Account),
    /// The row is gone or no longer holds the guarded token.
    GuardFailed,
    EmailTaken,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn find_by_verify_token(&self, digest: &str) -> Result<Option<Account>>;

    async fn list(&self) -> Result<Vec<Account>>;

    async fn create(&self, account: NewAccount) -> Result<CreateOutcome>;

    async fn update(
        &self,
        id: AccountId,
        changes: &AccountChanges,
        guard: Option<&TokenGuard>,
    ) -> Result<UpdateOutcome>;

    async fn remove(&self, id: AccountId) -> Result<Option<Account>>;

    /// Backend reachability, reported by `/health`.
    async fn ping(&self) -> Result<()>;
}
