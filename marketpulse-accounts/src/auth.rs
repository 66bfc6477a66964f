/*!
Requester identities and the authorization check for account deletion
*/

use serde::{Deserialize, Serialize};

use crate::account::AccountId;

/// Principal name used for sweeper-initiated deletions.
const SYSTEM_PRINCIPAL: &str = "deletion-sweeper";

/// Role of an authenticated principal. Each role maps to an explicit
/// authorization predicate in [`RoleAuthorizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequesterRole {
    /// A regular user; may only act on their own account.
    User,
    /// An administrative principal; may act on any account.
    Admin,
    /// Internal machinery (the deletion sweeper).
    System,
}

/// An authenticated principal invoking an account operation.
///
/// Authentication itself happens upstream; this crate only receives the
/// already-verified identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub principal: String,
    pub role: RequesterRole,
}

impl Requester {
    /// A regular user acting under their own account id.
    pub fn user(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            role: RequesterRole::User,
        }
    }

    pub fn admin(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            role: RequesterRole::Admin,
        }
    }

    pub fn system() -> Self {
        Self {
            principal: SYSTEM_PRINCIPAL.to_string(),
            role: RequesterRole::System,
        }
    }
}

/// Authorization collaborator consulted before any deletion.
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, requester: &Requester, target: &AccountId) -> bool;
}

/// Default authorizer: owners may delete their own account, admins and
/// the system principal may delete any account.
pub struct RoleAuthorizer;

impl Authorizer for RoleAuthorizer {
    fn is_authorized(&self, requester: &Requester, target: &AccountId) -> bool {
        match requester.role {
            RequesterRole::User => requester.principal == target.as_str(),
            RequesterRole::Admin | RequesterRole::System => true,
        }
    }
}
