/*!
Account registration and profile maintenance
*/

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::account::{Account, AccountId, AccountStatus, hash_password};
use crate::config::PolicyConfig;
use crate::error::{RegistrationError, StoreError};
use crate::store::AccountStore;

/// Input for creating a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Partial profile update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Controller for account creation and profile changes.
pub struct RegistrationController {
    store: Arc<dyn AccountStore>,
    policy: PolicyConfig,
}

impl RegistrationController {
    pub fn new(store: Arc<dyn AccountStore>, policy: PolicyConfig) -> Self {
        Self { store, policy }
    }

    /// Username must sit within the configured length bounds and contain
    /// only letters and digits.
    fn is_username_valid(&self, username: &str) -> bool {
        let len = username.chars().count();
        len >= self.policy.username_min
            && len <= self.policy.username_max
            && !username.is_empty()
            && username.chars().all(|c| c.is_ascii_alphanumeric())
    }

    /// Password must sit within the configured length bounds, contain at
    /// least one capital letter and one digit, and only letters and
    /// digits.
    fn is_password_valid(&self, password: &str) -> bool {
        let len = password.chars().count();
        len >= self.policy.password_min
            && len <= self.policy.password_max
            && password.chars().any(|c| c.is_ascii_uppercase())
            && password.chars().any(|c| c.is_ascii_digit())
            && password.chars().all(|c| c.is_ascii_alphanumeric())
    }

    pub async fn register(&self, data: NewAccount) -> Result<Account, RegistrationError> {
        if data.password != data.confirm_password {
            return Err(RegistrationError::PasswordMismatch);
        }
        if !self.is_username_valid(&data.username) {
            return Err(RegistrationError::InvalidUsername {
                min: self.policy.username_min,
                max: self.policy.username_max,
            });
        }
        if !self.is_password_valid(&data.password) {
            return Err(RegistrationError::InvalidPassword {
                min: self.policy.password_min,
                max: self.policy.password_max,
            });
        }
        if self.store.find_by_username(&data.username).await?.is_some() {
            return Err(RegistrationError::UsernameTaken(data.username));
        }

        let now = Utc::now();
        let account = Account {
            id: AccountId::derive(&data.username, now),
            username: data.username,
            email: data.email,
            phone: data.phone,
            first_name: data.first_name,
            last_name: data.last_name,
            password_hash: hash_password(&data.password),
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        };

        self.store.insert(&account).await?;
        info!("registered account {} for username {}", account.id, account.username);
        Ok(account)
    }

    /// Apply a partial profile update to an active account.
    pub async fn update_profile(
        &self,
        id: &AccountId,
        update: ProfileUpdate,
    ) -> Result<Account, RegistrationError> {
        let mut account = self
            .store
            .find(id)
            .await?
            .ok_or_else(|| RegistrationError::UnknownAccount(id.clone()))?;
        if account.status != AccountStatus::Active {
            return Err(RegistrationError::AccountInactive(id.clone()));
        }

        if let Some(username) = update.username {
            if username != account.username {
                if !self.is_username_valid(&username) {
                    return Err(RegistrationError::InvalidUsername {
                        min: self.policy.username_min,
                        max: self.policy.username_max,
                    });
                }
                if self.store.find_by_username(&username).await?.is_some() {
                    return Err(RegistrationError::UsernameTaken(username));
                }
                account.username = username;
            }
        }
        if let Some(password) = update.password {
            if !self.is_password_valid(&password) {
                return Err(RegistrationError::InvalidPassword {
                    min: self.policy.password_min,
                    max: self.policy.password_max,
                });
            }
            account.password_hash = hash_password(&password);
        }
        if let Some(first_name) = update.first_name {
            account.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            account.last_name = last_name;
        }
        if let Some(phone) = update.phone {
            account.phone = Some(phone);
        }
        if let Some(email) = update.email {
            account.email = email;
        }

        account.updated_at = Utc::now();
        self.store.update(&account).await?;
        info!("updated profile for account {}", account.id);
        Ok(account)
    }

    pub async fn get(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        self.store.find(id).await
    }
}
