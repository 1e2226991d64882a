//! Identity context carried by access tokens.
//!
//! Token issuance lives with the identity provider; this service only
//! verifies tokens and reads the tenant and role out of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: Uuid,
    /// Tenant the caller is acting for.
    pub org: Uuid,
    /// Caller's role within the tenant.
    pub role: String,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// Creates new claims for a user.
    #[must_use]
    pub fn new(user_id: Uuid, tenant_id: Uuid, role: &str, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            org: tenant_id,
            role: role.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Returns the user ID from claims.
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.sub
    }

    /// Returns the tenant ID from claims.
    #[must_use]
    pub const fn tenant_id(&self) -> Uuid {
        self.org
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_claims_accessors() {
        let user = Uuid::new_v4();
        let tenant = Uuid::new_v4();
        let claims = Claims::new(user, tenant, "clerk", Utc::now() + Duration::minutes(5));

        assert_eq!(claims.user_id(), user);
        assert_eq!(claims.tenant_id(), tenant);
        assert_eq!(claims.role, "clerk");
        assert!(claims.exp > claims.iat);
    }
}
