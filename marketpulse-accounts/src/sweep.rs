/*!
Background sweeper that resumes interrupted deletions

Once an account reaches `pending_deletion`, the deletion must run to
completion even if the original caller went away. The sweeper
periodically scans for accounts stuck in that state and drives them
through the controller again under the system principal.
*/

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_stream::{Stream, StreamExt, wrappers::IntervalStream};
use tracing::{error, info};

use crate::account::{AccountId, AccountStatus};
use crate::auth::Requester;
use crate::config::SweepConfig;
use crate::deletion::{DeletionController, DeletionOutcome};
use crate::error::StoreError;
use crate::store::AccountStore;

/// Events emitted by the sweeper.
#[derive(Debug, Clone)]
pub enum SweepEvent {
    /// An interrupted deletion was driven to completion
    Resumed(AccountId),
    /// A resume attempt failed and will be retried next pass
    ResumeFailed(AccountId, String),
    /// A full pass over pending accounts finished
    PassComplete { resumed: usize, failed: usize },
    /// The pass itself could not run
    SweepError(String),
}

/// Result of a single sweep pass.
#[derive(Debug, Default)]
pub struct SweepPass {
    pub resumed: Vec<AccountId>,
    pub failed: Vec<(AccountId, String)>,
}

/// Periodically resumes deletions abandoned in `pending_deletion`.
pub struct DeletionSweeper {
    store: Arc<dyn AccountStore>,
    controller: Arc<DeletionController>,
    config: SweepConfig,
}

impl DeletionSweeper {
    pub fn new(
        store: Arc<dyn AccountStore>,
        controller: Arc<DeletionController>,
        config: SweepConfig,
    ) -> Self {
        Self {
            store,
            controller,
            config,
        }
    }

    /// Run one pass: resume up to `batch_size` pending deletions.
    ///
    /// Resumes run concurrently; the controller's per-account locks keep
    /// each individual account's cleanup single-flight.
    pub async fn run_once(&self) -> Result<SweepPass, StoreError> {
        let pending = self
            .store
            .list_by_status(AccountStatus::PendingDeletion, self.config.batch_size)
            .await?;
        if pending.is_empty() {
            return Ok(SweepPass::default());
        }

        info!("resuming {} interrupted deletions", pending.len());
        let requester = Requester::system();
        let results = join_all(
            pending
                .iter()
                .map(|id| self.controller.delete(&requester, id)),
        )
        .await;

        let mut pass = SweepPass::default();
        for (id, result) in pending.into_iter().zip(results) {
            match result.outcome {
                DeletionOutcome::Success => pass.resumed.push(id),
                // A competing caller finished this one first
                DeletionOutcome::NotFound => {}
                _ => pass
                    .failed
                    .push((id, result.detail.unwrap_or_default())),
            }
        }
        Ok(pass)
    }

    /// Start the periodic sweep and emit an event stream.
    pub fn events(&self) -> impl Stream<Item = SweepEvent> + '_ {
        let interval = Duration::from_millis(self.config.interval_ms);
        let mut ticks = IntervalStream::new(tokio::time::interval(interval));

        async_stream::stream! {
            while let Some(_) = ticks.next().await {
                match self.run_once().await {
                    Ok(pass) => {
                        for id in &pass.resumed {
                            yield SweepEvent::Resumed(id.clone());
                        }
                        for (id, detail) in &pass.failed {
                            yield SweepEvent::ResumeFailed(id.clone(), detail.clone());
                        }
                        yield SweepEvent::PassComplete {
                            resumed: pass.resumed.len(),
                            failed: pass.failed.len(),
                        };
                    }
                    Err(e) => {
                        error!("sweep pass failed: {}", e);
                        yield SweepEvent::SweepError(e.to_string());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::account::{Account, AccountId, hash_password};
    use crate::auth::RoleAuthorizer;
    use crate::store::MemoryAccountStore;

    async fn seed_pending(store: &MemoryAccountStore, id: &str, username: &str) {
        store
            .insert(&Account {
                id: AccountId::new(id),
                username: username.to_string(),
                email: format!("{username}@example.com"),
                phone: None,
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                password_hash: hash_password("testPass123"),
                status: AccountStatus::PendingDeletion,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    fn sweeper(store: Arc<MemoryAccountStore>, batch_size: usize) -> DeletionSweeper {
        let controller = Arc::new(DeletionController::new(
            store.clone(),
            Arc::new(RoleAuthorizer),
        ));
        DeletionSweeper::new(
            store,
            controller,
            SweepConfig {
                interval_ms: 10,
                batch_size,
            },
        )
    }

    #[tokio::test]
    async fn test_run_once_completes_pending_deletions() {
        let store = Arc::new(MemoryAccountStore::new());
        seed_pending(&store, "acct-1", "firstuser").await;
        seed_pending(&store, "acct-2", "seconduser").await;

        let sweeper = sweeper(store.clone(), 25);
        let pass = sweeper.run_once().await.unwrap();

        assert_eq!(pass.resumed.len(), 2);
        assert!(pass.failed.is_empty());
        for id in ["acct-1", "acct-2"] {
            let account = store.find(&AccountId::new(id)).await.unwrap().unwrap();
            assert_eq!(account.status, AccountStatus::Deleted);
        }
    }

    #[tokio::test]
    async fn test_run_once_with_nothing_pending() {
        let store = Arc::new(MemoryAccountStore::new());
        let sweeper = sweeper(store, 25);

        let pass = sweeper.run_once().await.unwrap();
        assert!(pass.resumed.is_empty());
        assert!(pass.failed.is_empty());
    }

    #[tokio::test]
    async fn test_batch_size_limits_a_pass() {
        let store = Arc::new(MemoryAccountStore::new());
        for i in 0..4 {
            seed_pending(&store, &format!("acct-{i}"), &format!("user{i}00")).await;
        }

        let sweeper = sweeper(store.clone(), 2);
        let pass = sweeper.run_once().await.unwrap();
        assert_eq!(pass.resumed.len(), 2);

        let remaining = store
            .list_by_status(AccountStatus::PendingDeletion, 25)
            .await
            .unwrap();
        assert_eq!(remaining.len(), 2);
    }

    #[tokio::test]
    async fn test_event_stream_reports_pass() {
        let store = Arc::new(MemoryAccountStore::new());
        seed_pending(&store, "acct-1", "firstuser").await;

        let sweeper = sweeper(store, 25);
        let mut events = Box::pin(sweeper.events());

        let first = events.next().await.unwrap();
        assert!(matches!(first, SweepEvent::Resumed(ref id) if id.as_str() == "acct-1"));
        let second = events.next().await.unwrap();
        assert!(matches!(second, SweepEvent::PassComplete { resumed: 1, failed: 0 }));
    }
}
