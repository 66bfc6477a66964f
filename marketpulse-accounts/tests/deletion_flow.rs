/*!
End-to-end lifecycle tests over the SQLite store
*/

use std::sync::Arc;

use chrono::Utc;

use marketpulse_accounts::{
    AccountId, AccountStatus, AccountStore, DeletionController, DeletionOutcome, DeletionSweeper,
    NewAccount, OwnedResource, RegistrationController, Requester, ResourceKind, RoleAuthorizer,
    SqliteAccountStore,
    config::{PolicyConfig, SweepConfig},
};

fn new_account(username: &str) -> NewAccount {
    NewAccount {
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        phone: Some("555-0100".to_string()),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password: "testPass123".to_string(),
        confirm_password: "testPass123".to_string(),
    }
}

async fn add_resources(store: &SqliteAccountStore, id: &AccountId, count: usize) {
    for i in 0..count {
        store
            .add_owned_resource(&OwnedResource {
                account_id: id.clone(),
                kind: ResourceKind::SalesUpload,
                path: format!("uploads/report-{i}.csv"),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_full_lifecycle_register_then_delete() {
    let store = Arc::new(SqliteAccountStore::open_in_memory().unwrap());
    let registration = RegistrationController::new(store.clone(), PolicyConfig::default());
    let deletion = DeletionController::new(store.clone(), Arc::new(RoleAuthorizer));

    let account = registration.register(new_account("testuser")).await.unwrap();
    add_resources(&store, &account.id, 3).await;

    let result = deletion
        .delete(&Requester::user(account.id.as_str()), &account.id)
        .await;
    assert!(result.is_success());

    let stored = store.find(&account.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AccountStatus::Deleted);
    assert_eq!(store.delete_owned_resources(&account.id).await.unwrap(), 0);

    // Tombstone keeps repeat requests idempotent
    let again = deletion
        .delete(&Requester::user(account.id.as_str()), &account.id)
        .await;
    assert_eq!(again.outcome, DeletionOutcome::NotFound);

    // The username is free for a new registration
    let successor = registration.register(new_account("testuser")).await.unwrap();
    assert_ne!(successor.id, account.id);
}

#[tokio::test]
async fn test_unauthorized_requester_changes_nothing() {
    let store = Arc::new(SqliteAccountStore::open_in_memory().unwrap());
    let registration = RegistrationController::new(store.clone(), PolicyConfig::default());
    let deletion = DeletionController::new(store.clone(), Arc::new(RoleAuthorizer));

    let account = registration.register(new_account("testuser")).await.unwrap();
    add_resources(&store, &account.id, 1).await;

    let result = deletion
        .delete(&Requester::user("someone-else"), &account.id)
        .await;
    assert_eq!(result.outcome, DeletionOutcome::Unauthorized);

    let stored = store.find(&account.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AccountStatus::Active);
    assert_eq!(store.delete_owned_resources(&account.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_admin_deletes_other_account() {
    let store = Arc::new(SqliteAccountStore::open_in_memory().unwrap());
    let registration = RegistrationController::new(store.clone(), PolicyConfig::default());
    let deletion = DeletionController::new(store.clone(), Arc::new(RoleAuthorizer));

    let account = registration.register(new_account("testuser")).await.unwrap();

    let result = deletion.delete(&Requester::admin("ops"), &account.id).await;
    assert!(result.is_success());
}

#[tokio::test]
async fn test_sweeper_finishes_interrupted_deletion() {
    let store = Arc::new(SqliteAccountStore::open_in_memory().unwrap());
    let registration = RegistrationController::new(store.clone(), PolicyConfig::default());
    let controller = Arc::new(DeletionController::new(
        store.clone(),
        Arc::new(RoleAuthorizer),
    ));

    let account = registration.register(new_account("testuser")).await.unwrap();
    add_resources(&store, &account.id, 2).await;

    // Simulate a deletion that recorded intent but never finished
    store
        .set_status(&account.id, AccountStatus::PendingDeletion)
        .await
        .unwrap();

    let sweeper = DeletionSweeper::new(
        store.clone(),
        controller,
        SweepConfig {
            interval_ms: 10,
            batch_size: 25,
        },
    );
    let pass = sweeper.run_once().await.unwrap();

    assert_eq!(pass.resumed, vec![account.id.clone()]);
    let stored = store.find(&account.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AccountStatus::Deleted);
    assert_eq!(store.delete_owned_resources(&account.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_deletes_over_sqlite() {
    let store = Arc::new(SqliteAccountStore::open_in_memory().unwrap());
    let registration = RegistrationController::new(store.clone(), PolicyConfig::default());
    let controller = Arc::new(DeletionController::new(
        store.clone(),
        Arc::new(RoleAuthorizer),
    ));

    let account = registration.register(new_account("testuser")).await.unwrap();
    add_resources(&store, &account.id, 2).await;

    let a = tokio::spawn({
        let controller = controller.clone();
        let id = account.id.clone();
        async move { controller.delete(&Requester::admin("ops-a"), &id).await }
    });
    let b = tokio::spawn({
        let controller = controller.clone();
        let id = account.id.clone();
        async move { controller.delete(&Requester::admin("ops-b"), &id).await }
    });

    let outcomes = [a.await.unwrap().outcome, b.await.unwrap().outcome];
    assert!(outcomes.contains(&DeletionOutcome::Success));
    assert!(outcomes.contains(&DeletionOutcome::NotFound));

    let stored = store.find(&account.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AccountStatus::Deleted);
}
