pub mod signatures;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::StoreError;
pub use signatures::SignatureSet;

pub const NOT_BROADCAST: &str = "NOT_BROADCAST";
pub const BROADCAST: &str = "BROADCAST";

/// Broadcast progress recorded on a ledger entry. Unknown statuses are
/// kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BroadcastStatus {
    NotBroadcast,
    Broadcast,
    Other(String),
}

impl BroadcastStatus {
    /// Whether this status ends the withdrawal lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BroadcastStatus::Broadcast)
    }

    pub fn as_str(&self) -> &str {
        match self {
            BroadcastStatus::NotBroadcast => NOT_BROADCAST,
            BroadcastStatus::Broadcast => BROADCAST,
            BroadcastStatus::Other(status) => status,
        }
    }
}

impl From<String> for BroadcastStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            NOT_BROADCAST => BroadcastStatus::NotBroadcast,
            BROADCAST => BroadcastStatus::Broadcast,
            _ => BroadcastStatus::Other(status),
        }
    }
}

impl From<&str> for BroadcastStatus {
    fn from(status: &str) -> Self {
        BroadcastStatus::from(status.to_string())
    }
}

impl From<BroadcastStatus> for String {
    fn from(status: BroadcastStatus) -> Self {
        match status {
            BroadcastStatus::Other(status) => status,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for BroadcastStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable signing/broadcast event of a withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub withdrawal_id: Uuid,
    /// Zero-based append order within the withdrawal.
    pub position: i32,
    pub signatures: SignatureSet,
    pub broadcast_status: BroadcastStatus,
    pub tx_hash: Option<String>,
    pub tx_payload: Option<String>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An entry waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub signatures: SignatureSet,
    pub broadcast_status: BroadcastStatus,
    pub tx_hash: Option<String>,
    pub tx_payload: Option<String>,
    pub remarks: Option<String>,
}

impl NewLedgerEntry {
    /// The entry seeded when a withdrawal is created.
    pub fn initial(signatures: SignatureSet) -> Self {
        Self {
            signatures,
            broadcast_status: BroadcastStatus::NotBroadcast,
            tx_hash: None,
            tx_payload: None,
            remarks: None,
        }
    }
}

/// Append-only storage of ledger entries.
///
/// Implemented on transaction-scoped handles, so an append joins whatever
/// atomic unit the caller has open. There is deliberately no way to update
/// or delete an entry.
#[async_trait]
pub trait LedgerStore: Send {
    /// Persists `entry` at the next position of the withdrawal's ledger.
    async fn append(
        &mut self,
        withdrawal_id: Uuid,
        entry: NewLedgerEntry,
    ) -> Result<LedgerEntry, StoreError>;

    /// All entries of the withdrawal in append order.
    async fn entries_for(&mut self, withdrawal_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_status_parsing() {
        assert_eq!(
            BroadcastStatus::from("NOT_BROADCAST"),
            BroadcastStatus::NotBroadcast
        );
        assert_eq!(BroadcastStatus::from("BROADCAST"), BroadcastStatus::Broadcast);
        assert_eq!(
            BroadcastStatus::from("NO"),
            BroadcastStatus::Other("NO".to_string())
        );
        assert_eq!(String::from(BroadcastStatus::from("NO")), "NO");
    }

    #[test]
    fn test_only_broadcast_is_terminal() {
        assert!(BroadcastStatus::Broadcast.is_terminal());
        assert!(!BroadcastStatus::NotBroadcast.is_terminal());
        assert!(!BroadcastStatus::from("SUBMITTED").is_terminal());
    }

    #[test]
    fn test_broadcast_status_serializes_as_plain_string() {
        let json = serde_json::to_string(&BroadcastStatus::NotBroadcast).unwrap();
        assert_eq!(json, "\"NOT_BROADCAST\"");

        let parsed: BroadcastStatus = serde_json::from_str("\"PENDING\"").unwrap();
        assert_eq!(parsed, BroadcastStatus::Other("PENDING".to_string()));
    }
}
