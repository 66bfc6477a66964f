/*!
Account lifecycle management for MarketPulse

Provides the controllers behind account registration, profile updates,
and account deletion, together with the storage and authorization
collaborators they depend on. Deletion follows a resumable state
machine (`active -> pending_deletion -> deleted`): intent is recorded
before cleanup starts, so an interrupted deletion is picked up again by
a retry or by the background [`sweep::DeletionSweeper`].
*/

pub mod account;
pub mod audit;
pub mod auth;
pub mod config;
pub mod deletion;
pub mod error;
pub mod registration;
pub mod sqlite;
pub mod store;
pub mod sweep;

pub use account::{Account, AccountId, AccountStatus, OwnedResource, ResourceKind};
pub use audit::{AuditManager, AuditSink, DeletionAudit};
pub use auth::{Authorizer, Requester, RequesterRole, RoleAuthorizer};
pub use config::{AccountsConfig, load_config};
pub use deletion::{DeletionController, DeletionOutcome, DeletionResult};
pub use error::{RegistrationError, StoreError};
pub use registration::{NewAccount, ProfileUpdate, RegistrationController};
pub use sqlite::SqliteAccountStore;
pub use store::{AccountStore, MemoryAccountStore};
pub use sweep::{DeletionSweeper, SweepEvent};
