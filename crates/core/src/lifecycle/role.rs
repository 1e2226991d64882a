//! Caller roles, ordered by privilege.

use std::fmt;

use serde::{Deserialize, Serialize};

/// User role, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Read-only access.
    Viewer = 0,
    /// Creates and edits draft invoices, records payments.
    Clerk = 1,
    /// Clerk plus finance reporting.
    Accountant = 2,
    /// May unlock finalized invoices.
    Admin = 3,
    /// Full access.
    Owner = 4,
}

impl UserRole {
    /// Parse a role from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "viewer" => Some(Self::Viewer),
            "clerk" => Some(Self::Clerk),
            "accountant" => Some(Self::Accountant),
            "admin" => Some(Self::Admin),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }

    /// Returns the string representation of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Clerk => "clerk",
            Self::Accountant => "accountant",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    /// Least role allowed to unlock.
    pub const UNLOCK: Self = Self::Admin;

    /// Least role allowed to mutate anything.
    pub const EDIT: Self = Self::Clerk;

    /// `self` is at least `required`.
    #[must_use]
    pub fn satisfies(self, required: Self) -> bool {
        self >= required
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(UserRole::Viewer, false, false)]
    #[case(UserRole::Clerk, true, false)]
    #[case(UserRole::Accountant, true, false)]
    #[case(UserRole::Admin, true, true)]
    #[case(UserRole::Owner, true, true)]
    fn test_role_gates(#[case] role: UserRole, #[case] can_edit: bool, #[case] can_unlock: bool) {
        assert_eq!(role.satisfies(UserRole::EDIT), can_edit);
        assert_eq!(role.satisfies(UserRole::UNLOCK), can_unlock);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(UserRole::parse("Admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("superuser"), None);
    }
}
