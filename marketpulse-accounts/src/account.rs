/*!
Account data model: identifiers, lifecycle status, and owned resources
*/

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest identifier the storage layer accepts.
const MAX_ID_LEN: usize = 64;

/// Unique, immutable account identifier.
///
/// Valid identifiers are non-empty, at most 64 bytes, and contain only
/// ASCII letters, digits, `-`, and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive a fresh identifier for a newly registered username.
    pub fn derive(username: &str, at: DateTime<Utc>) -> Self {
        let nanos = at.timestamp_nanos_opt().unwrap_or_default();
        let digest = blake3::hash(format!("{username}:{nanos}").as_bytes());
        Self(format!("acct-{}", &digest.to_hex().as_str()[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identifier matches the storage layer's format.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= MAX_ID_LEN
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of an account.
///
/// Transitions are monotonic: `Active -> PendingDeletion -> Deleted`.
/// `PendingDeletion` records deletion intent before cleanup runs, so an
/// interrupted deletion can be resumed rather than lost. `Deleted` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    PendingDeletion,
    Deleted,
}

impl AccountStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PendingDeletion => "pending_deletion",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "pending_deletion" => Some(Self::PendingDeletion),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Active => 0,
            Self::PendingDeletion => 1,
            Self::Deleted => 2,
        }
    }

    /// Whether a transition to `next` moves forward in the lifecycle.
    /// Re-asserting the current status is allowed; moving backward is not.
    pub const fn can_become(self, next: Self) -> bool {
        next.rank() >= self.rank()
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A MarketPulse user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Verify a candidate password against the stored hash.
    pub fn verify_password(&self, password: &str) -> bool {
        self.password_hash == hash_password(password)
    }
}

/// Kind of data record owned by an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    SalesUpload,
    Chart,
    Preference,
}

impl ResourceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SalesUpload => "sales_upload",
            Self::Chart => "chart",
            Self::Preference => "preference",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sales_upload" => Some(Self::SalesUpload),
            "chart" => Some(Self::Chart),
            "preference" => Some(Self::Preference),
            _ => None,
        }
    }
}

/// A data record belonging to an account, removed when the account is
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedResource {
    pub account_id: AccountId,
    pub kind: ResourceKind,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

/// Hash a password for storage.
pub fn hash_password(password: &str) -> String {
    blake3::hash(password.as_bytes()).to_hex().to_string()
}

/// Fingerprint a contact field so audit records carry no raw PII.
pub fn contact_fingerprint(value: &str) -> String {
    blake3::hash(value.as_bytes()).to_hex().to_string()
}
