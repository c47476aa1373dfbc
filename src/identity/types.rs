//! Types for identity resolution.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authoritative role of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Doctor => write!(f, "doctor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// A registered user row.
///
/// Users are created by explicit registration, never as a side effect of
/// identity resolution. Rows are soft-deactivated, never hard-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Lowercased, unique across all users.
    pub wallet_address: String,
    pub role: Role,
    /// Flipped by an admin once the user's credentials are checked.
    pub verified: bool,
    pub created_at: i64,
    pub deactivated_at: Option<i64>,
}

impl User {
    pub fn new(wallet_address: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_address: normalize_wallet(wallet_address),
            role,
            verified: false,
            created_at: Utc::now().timestamp(),
            deactivated_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deactivated_at.is_none()
    }
}

/// Outcome of identity resolution: one authoritative role, or nothing.
///
/// A session wallet without a matching user row resolves to
/// `Unauthenticated`; default permissions are never granted silently.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Authenticated {
        role: Role,
        wallet_address: String,
        user: User,
    },
    Unauthenticated,
}

impl Identity {
    pub fn authenticated(user: User) -> Self {
        Identity::Authenticated {
            role: user.role,
            wallet_address: user.wallet_address.clone(),
            user,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Identity::Authenticated { role, .. } => Some(*role),
            Identity::Unauthenticated => None,
        }
    }

    pub fn wallet(&self) -> Option<&str> {
        match self {
            Identity::Authenticated { wallet_address, .. } => Some(wallet_address),
            Identity::Unauthenticated => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated { .. })
    }
}

/// Canonical wallet form: trimmed and lowercased.
pub fn normalize_wallet(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
