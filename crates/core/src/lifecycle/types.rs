//! Lifecycle domain types.

use std::fmt;

use chrono::{DateTime, Utc};
use freightbill_shared::types::UserId;
use serde::{Deserialize, Serialize};

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// Editable, not yet issued.
    Draft,
    /// Finalized, nothing paid.
    Sent,
    /// Finalized, partly paid.
    Partial,
    /// Finalized, fully paid.
    Paid,
    /// Sent or partial and past due. Derived on read.
    Overdue,
}

impl InvoiceStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Partial => "partial",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "sent" => Some(Self::Sent),
            "partial" => Some(Self::Partial),
            "paid" => Some(Self::Paid),
            "overdue" => Some(Self::Overdue),
            _ => None,
        }
    }

    /// Lines, adjustments and header may change.
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Every status except draft freezes the invoice.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        !self.is_editable()
    }

    /// Still expecting money.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Sent | Self::Partial | Self::Overdue)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An explicit transition with its audit data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Draft issued and locked.
    Finalize {
        /// Status after reconciling existing payments.
        new_status: InvoiceStatus,
        /// Who finalized.
        finalized_by: UserId,
        /// When the lock was taken.
        locked_at: DateTime<Utc>,
    },
    /// Locked invoice reopened for editing.
    Unlock {
        /// Always `Draft`.
        new_status: InvoiceStatus,
        /// Who unlocked.
        unlocked_by: UserId,
        /// When.
        unlocked_at: DateTime<Utc>,
    },
}

impl LifecycleAction {
    /// Returns the new status resulting from this action.
    #[must_use]
    pub const fn new_status(&self) -> InvoiceStatus {
        match self {
            Self::Finalize { new_status, .. } | Self::Unlock { new_status, .. } => *new_status,
        }
    }
}
