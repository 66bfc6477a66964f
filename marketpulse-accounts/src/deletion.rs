/*!
Account deletion controller

Orchestrates the removal of an account and everything it owns:
authorize the requester, record deletion intent, clear owned resources,
then tombstone the account. A failure mid-cleanup leaves the account in
`pending_deletion` so a retry (or the sweeper) resumes from where the
previous attempt stopped instead of losing the deletion intent.
*/

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::account::{Account, AccountId, AccountStatus, contact_fingerprint};
use crate::audit::{AuditManager, DeletionAudit};
use crate::auth::{Authorizer, Requester};
use crate::store::AccountStore;

/// Outcome of a deletion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionOutcome {
    Success,
    NotFound,
    Unauthorized,
    Failed,
}

/// Definitive result of one deletion request. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionResult {
    pub outcome: DeletionOutcome,
    pub detail: Option<String>,
}

impl DeletionResult {
    pub fn success() -> Self {
        Self {
            outcome: DeletionOutcome::Success,
            detail: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            outcome: DeletionOutcome::NotFound,
            detail: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            outcome: DeletionOutcome::Unauthorized,
            detail: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            outcome: DeletionOutcome::Failed,
            detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == DeletionOutcome::Success
    }
}

/// Controller for account deletion requests.
///
/// Storage and authorization collaborators are injected at construction
/// time; the controller holds no global state. Deletions for the same
/// account id are serialized through a per-account lock, so cleanup for
/// one account never runs twice concurrently.
pub struct DeletionController {
    store: Arc<dyn AccountStore>,
    authorizer: Arc<dyn Authorizer>,
    audit: Option<Arc<Mutex<AuditManager>>>,
    locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
}

impl DeletionController {
    pub fn new(store: Arc<dyn AccountStore>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            store,
            authorizer,
            audit: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Attach an audit manager that records completed deletions.
    pub fn with_audit(mut self, audit: Arc<Mutex<AuditManager>>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Delete `account_id` and everything it owns on behalf of
    /// `requester`.
    ///
    /// Collaborator faults are reported as a `Failed` result, never
    /// raised; repeating the call on an already-deleted account reports
    /// `NotFound` without touching anything.
    pub async fn delete(&self, requester: &Requester, account_id: &AccountId) -> DeletionResult {
        if !account_id.is_valid() {
            debug!("rejecting malformed account id {:?}", account_id.as_str());
            return DeletionResult::not_found();
        }

        let guard = self.account_lock(account_id).await;
        let held = guard.lock().await;
        let result = self.delete_locked(requester, account_id).await;
        drop(held);
        self.release_lock(account_id).await;

        result
    }

    async fn delete_locked(
        &self,
        requester: &Requester,
        account_id: &AccountId,
    ) -> DeletionResult {
        if !self.authorizer.is_authorized(requester, account_id) {
            warn!(
                "requester {} is not allowed to delete account {}",
                requester.principal, account_id
            );
            return DeletionResult::unauthorized();
        }

        let account = match self.store.find(account_id).await {
            Ok(Some(account)) => account,
            Ok(None) => return DeletionResult::not_found(),
            Err(e) => return DeletionResult::failed(format!("account lookup failed: {e}")),
        };

        match account.status {
            // Terminal: a repeated request is already satisfied
            AccountStatus::Deleted => return DeletionResult::not_found(),
            AccountStatus::Active => {
                if let Err(e) = self
                    .store
                    .set_status(account_id, AccountStatus::PendingDeletion)
                    .await
                {
                    return DeletionResult::failed(format!(
                        "could not record deletion intent: {e}"
                    ));
                }
            }
            AccountStatus::PendingDeletion => {
                debug!("account {} already pending deletion, resuming cleanup", account_id);
            }
        }

        let removed = match self.store.delete_owned_resources(account_id).await {
            Ok(removed) => removed,
            Err(e) => {
                // Stays pending_deletion so a retry resumes the cleanup
                error!("resource cleanup for account {} failed: {}", account_id, e);
                return DeletionResult::failed(format!("resource cleanup failed: {e}"));
            }
        };

        if let Err(e) = self.store.set_status(account_id, AccountStatus::Deleted).await {
            return DeletionResult::failed(format!("could not finalize deletion: {e}"));
        }

        info!(
            "account {} deleted by {} ({} owned resources removed)",
            account_id, requester.principal, removed
        );
        self.record_audit(&account, requester, removed).await;

        DeletionResult::success()
    }

    async fn record_audit(&self, account: &Account, requester: &Requester, removed: u64) {
        if let Some(ref audit) = self.audit {
            let record = DeletionAudit {
                account_id: account.id.to_string(),
                requester: requester.principal.clone(),
                requester_role: requester.role,
                contact_fingerprint: Some(contact_fingerprint(&account.email)),
                resources_removed: removed,
                completed_at: Utc::now().timestamp(),
            };
            audit.lock().await.record(&record).await;
        }
    }

    async fn account_lock(&self, account_id: &AccountId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(account_id.clone()).or_default().clone()
    }

    async fn release_lock(&self, account_id: &AccountId) {
        let mut locks = self.locks.lock().await;
        if let Some(entry) = locks.get(account_id) {
            // Two references left means the table and this caller only
            if Arc::strong_count(entry) <= 2 {
                locks.remove(account_id);
            }
        }
    }
}
