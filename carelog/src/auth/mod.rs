//! Roles, principals and the authorization guard
//!
//! Every guarded operation receives an explicit [`RequestContext`] and asks
//! the [`AuthGuard`] to resolve it into a [`Principal`]. Roles are re-read
//! from the profiles table on each check so that role changes made by an
//! admin apply to the very next request.

pub mod guard;
pub mod identity;

pub use guard::AuthGuard;
pub use identity::{IdentityProvider, RequestContext, StaticIdentity};

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role.
///
/// `User` and `Guardian` share the bottom rank; they differ only in the
/// records they may see (see [`Role::scope`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    User,
    Guardian,
    Staff,
    Admin,
}

/// Which records a role may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordScope {
    /// Only the principal's own profile
    Own,
    /// Only clients whose guardian is the principal
    LinkedClients,
    /// Everything
    All,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Guardian, Role::Staff, Role::Admin];

    pub fn rank(self) -> u8 {
        match self {
            Role::User | Role::Guardian => 1,
            Role::Staff => 2,
            Role::Admin => 3,
        }
    }

    pub fn at_least(self, minimum: Role) -> bool {
        self.rank() >= minimum.rank()
    }

    pub fn scope(self) -> RecordScope {
        match self {
            Role::User => RecordScope::Own,
            Role::Guardian => RecordScope::LinkedClients,
            Role::Staff | Role::Admin => RecordScope::All,
        }
    }

    /// Accounts staff members are allowed to create and edit
    pub fn is_bottom_tier(self) -> bool {
        self.rank() == Role::User.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guardian => "guardian",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s.trim())
            .ok_or_else(|| AppError::validation(format!("unknown role '{}'", s)))
    }
}

/// An authenticated actor with the role it holds right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_order() {
        assert!(Role::User.rank() < Role::Staff.rank());
        assert!(Role::Staff.rank() < Role::Admin.rank());
        assert_eq!(Role::User.rank(), Role::Guardian.rank());
    }

    #[test]
    fn test_at_least_follows_rank() {
        for actual in Role::ALL {
            for minimum in Role::ALL {
                assert_eq!(actual.at_least(minimum), actual.rank() >= minimum.rank());
            }
        }
        assert!(Role::Guardian.at_least(Role::User));
        assert!(Role::User.at_least(Role::Guardian));
        assert!(!Role::Guardian.at_least(Role::Staff));
    }

    #[test]
    fn test_scopes() {
        assert_eq!(Role::User.scope(), RecordScope::Own);
        assert_eq!(Role::Guardian.scope(), RecordScope::LinkedClients);
        assert_eq!(Role::Staff.scope(), RecordScope::All);
        assert_eq!(Role::Admin.scope(), RecordScope::All);
    }

    #[test]
    fn test_parse_role() {
        assert_eq!("guardian".parse::<Role>().unwrap(), Role::Guardian);
        assert_eq!(" admin ".parse::<Role>().unwrap(), Role::Admin);
        assert!(matches!("root".parse::<Role>(), Err(AppError::Validation(_))));
    }
}
