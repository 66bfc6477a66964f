/*!
Storage collaborator for accounts and their owned resources
*/

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::account::{Account, AccountId, AccountStatus, OwnedResource};
use crate::error::StoreError;

/// Storage operations the controllers depend on.
///
/// `set_status` enforces the monotonic lifecycle guard: a transition
/// that would move an account backward fails with
/// [`StoreError::InvalidTransition`].
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find(&self, id: &AccountId) -> Result<Option<Account>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    async fn insert(&self, account: &Account) -> Result<(), StoreError>;

    async fn update(&self, account: &Account) -> Result<(), StoreError>;

    async fn set_status(&self, id: &AccountId, status: AccountStatus) -> Result<(), StoreError>;

    async fn add_owned_resource(&self, resource: &OwnedResource) -> Result<(), StoreError>;

    /// Remove every resource owned by the account. Returns the number of
    /// records removed. Irreversible.
    async fn delete_owned_resources(&self, id: &AccountId) -> Result<u64, StoreError>;

    async fn list_by_status(
        &self,
        status: AccountStatus,
        limit: usize,
    ) -> Result<Vec<AccountId>, StoreError>;
}

#[derive(Default)]
struct MemoryInner {
    accounts: HashMap<AccountId, Account>,
    resources: HashMap<AccountId, Vec<OwnedResource>>,
}

/// In-memory store used by tests and embedded consumers.
#[derive(Default)]
pub struct MemoryAccountStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.accounts.get(id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .accounts
            .values()
            .find(|a| a.status != AccountStatus::Deleted && a.username == username)
            .cloned())
    }

    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.accounts.contains_key(&account.id) {
            return Err(StoreError::Backend(format!(
                "account {} already exists",
                account.id
            )));
        }
        if inner
            .accounts
            .values()
            .any(|a| a.status != AccountStatus::Deleted && a.username == account.username)
        {
            return Err(StoreError::UsernameTaken(account.username.clone()));
        }
        inner.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn update(&self, account: &Account) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner
            .accounts
            .values()
            .any(|a| {
                a.id != account.id
                    && a.status != AccountStatus::Deleted
                    && a.username == account.username
            })
        {
            return Err(StoreError::UsernameTaken(account.username.clone()));
        }
        match inner.accounts.get_mut(&account.id) {
            Some(existing) => {
                *existing = account.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(account.id.clone())),
        }
    }

    async fn set_status(&self, id: &AccountId, status: AccountStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let account = inner
            .accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if !account.status.can_become(status) {
            return Err(StoreError::InvalidTransition {
                from: account.status,
                to: status,
            });
        }
        account.status = status;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn add_owned_resource(&self, resource: &OwnedResource) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .resources
            .entry(resource.account_id.clone())
            .or_default()
            .push(resource.clone());
        Ok(())
    }

    async fn delete_owned_resources(&self, id: &AccountId) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let removed = inner.resources.remove(id).map(|r| r.len()).unwrap_or(0) as u64;
        debug!("removed {} owned resources for account {}", removed, id);
        Ok(removed)
    }

    async fn list_by_status(
        &self,
        status: AccountStatus,
        limit: usize,
    ) -> Result<Vec<AccountId>, StoreError> {
        let inner = self.inner.read().await;
        let mut ids: Vec<AccountId> = inner
            .accounts
            .values()
            .filter(|a| a.status == status)
            .map(|a| a.id.clone())
            .collect();
        ids.sort();
        ids.truncate(limit);
        Ok(ids)
    }
}
