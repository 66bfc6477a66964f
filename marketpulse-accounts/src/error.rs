/*!
Domain error types for storage and registration
*/

use thiserror::Error;

use crate::account::{AccountId, AccountStatus};

/// Errors surfaced by an [`AccountStore`](crate::store::AccountStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No account exists under the given identifier.
    #[error("account {0} not found")]
    NotFound(AccountId),

    /// Another live account already holds the username.
    #[error("username {0} is already taken")]
    UsernameTaken(String),

    /// The requested status change would move the lifecycle backward.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: AccountStatus,
        to: AccountStatus,
    },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failure reported by a storage backend outside this crate.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the registration controller.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("username must be {min}-{max} characters long and contain only letters and digits")]
    InvalidUsername { min: usize, max: usize },

    #[error(
        "password must be {min}-{max} characters long, contain at least one capital letter and one digit, and only contain letters and digits"
    )]
    InvalidPassword { min: usize, max: usize },

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("username {0} is already taken")]
    UsernameTaken(String),

    #[error("account {0} not found")]
    UnknownAccount(AccountId),

    /// Profile updates only apply to active accounts.
    #[error("account {0} is not active")]
    AccountInactive(AccountId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountId;

    #[test]
    fn test_error_display() {
        let err = StoreError::NotFound(AccountId::new("acct-9"));
        assert_eq!(err.to_string(), "account acct-9 not found");

        let err = StoreError::InvalidTransition {
            from: AccountStatus::Deleted,
            to: AccountStatus::Active,
        };
        assert_eq!(err.to_string(), "invalid status transition: deleted -> active");

        let err = RegistrationError::PasswordMismatch;
        assert_eq!(err.to_string(), "passwords do not match");
    }
}
