//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `ParcelId` where an `InvoiceId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(UserId, "Unique identifier for a user.");
typed_id!(TenantId, "Unique identifier for a tenant.");
typed_id!(ClientId, "Unique identifier for a billed client.");
typed_id!(TripId, "Unique identifier for a trip.");
typed_id!(InvoiceId, "Unique identifier for an invoice.");
typed_id!(LineItemId, "Unique identifier for an invoice line item.");
typed_id!(AdjustmentId, "Unique identifier for an invoice adjustment.");
typed_id!(ParcelId, "Unique identifier for a shipped parcel.");
typed_id!(PaymentId, "Unique identifier for a recorded payment.");
