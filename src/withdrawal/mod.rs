pub mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WithdrawalError;
use crate::ledger::{BroadcastStatus, LedgerEntry, SignatureSet};
use crate::store::WithdrawalRecord;

pub use service::WithdrawalService;

pub const MAX_DESTINATION_LEN: usize = 256;
pub const MAX_AMOUNT_LEN: usize = 128;
pub const MAX_BROADCAST_STATUS_LEN: usize = 64;
pub const MAX_TX_HASH_LEN: usize = 256;
pub const MAX_REMARKS_LEN: usize = 256;

/// Lifecycle stage derived from the ledger; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalState {
    Created,
    Signing,
    Ready,
    Broadcast,
}

/// A withdrawal together with its full ledger history. Always holds at
/// least one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Withdrawal {
    #[serde(flatten)]
    record: WithdrawalRecord,
    ledger: Vec<LedgerEntry>,
}

impl Withdrawal {
    pub fn new(record: WithdrawalRecord, ledger: Vec<LedgerEntry>) -> Result<Self, WithdrawalError> {
        if ledger.is_empty() {
            return Err(WithdrawalError::EmptyLedger(record.withdrawal_id));
        }
        Ok(Self { record, ledger })
    }

    pub fn record(&self) -> &WithdrawalRecord {
        &self.record
    }

    pub fn ledger(&self) -> &[LedgerEntry] {
        &self.ledger
    }

    pub fn id(&self) -> Uuid {
        self.record.withdrawal_id
    }

    /// The optimistic-concurrency token callers echo back on update.
    pub fn version(&self) -> DateTime<Utc> {
        self.record.version_timestamp
    }

    /// The most recently appended entry.
    pub fn current_entry(&self) -> &LedgerEntry {
        &self.ledger[self.ledger.len() - 1]
    }

    pub fn signatures(&self) -> &SignatureSet {
        &self.current_entry().signatures
    }

    pub fn broadcast_status(&self) -> &BroadcastStatus {
        &self.current_entry().broadcast_status
    }

    pub fn state(&self) -> WithdrawalState {
        let current = self.current_entry();
        if current.broadcast_status.is_terminal() {
            WithdrawalState::Broadcast
        } else if current.signatures.distinct_count() >= self.record.required_signatures.max(1) as usize {
            WithdrawalState::Ready
        } else if self.ledger.len() == 1 {
            WithdrawalState::Created
        } else {
            WithdrawalState::Signing
        }
    }
}

/// Input of `create_withdrawal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWithdrawal {
    pub destination_address: String,
    pub amount: String,
    pub asset_id: Uuid,
    pub blockchain_id: Uuid,
    pub source_address_id: Uuid,
    #[serde(default)]
    pub initial_signature: Option<String>,
    /// Quorum; 1 when omitted.
    #[serde(default)]
    pub required_signatures: Option<i32>,
}

impl NewWithdrawal {
    pub fn validate(&self) -> Result<(), WithdrawalError> {
        if self.destination_address.trim().is_empty() {
            return Err(invalid("Destination address cannot be empty"));
        }
        if self.destination_address.len() > MAX_DESTINATION_LEN {
            return Err(invalid("Destination address is too long"));
        }
        if self.amount.len() > MAX_AMOUNT_LEN {
            return Err(invalid("Amount is too long"));
        }
        if !is_decimal(&self.amount) {
            return Err(invalid("Amount must be a non-negative decimal"));
        }
        if let Some(required) = self.required_signatures {
            if required < 1 {
                return Err(invalid("Required signatures must be at least 1"));
            }
        }
        Ok(())
    }
}

/// Input of `update_withdrawal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalUpdate {
    pub withdrawal_id: Uuid,
    pub expected_version: DateTime<Utc>,
    pub signatures: Vec<String>,
    pub broadcast_status: BroadcastStatus,
    pub tx_hash: Option<String>,
    pub tx_payload: Option<String>,
    pub remarks: Option<String>,
}

impl WithdrawalUpdate {
    pub fn new(
        withdrawal_id: Uuid,
        expected_version: DateTime<Utc>,
        broadcast_status: impl Into<BroadcastStatus>,
    ) -> Self {
        Self {
            withdrawal_id,
            expected_version,
            signatures: Vec::new(),
            broadcast_status: broadcast_status.into(),
            tx_hash: None,
            tx_payload: None,
            remarks: None,
        }
    }

    pub fn with_signatures<I, S>(mut self, signatures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signatures = signatures.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    pub fn with_tx_payload(mut self, tx_payload: impl Into<String>) -> Self {
        self.tx_payload = Some(tx_payload.into());
        self
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }

    pub fn validate(&self) -> Result<(), WithdrawalError> {
        if self.broadcast_status.as_str().trim().is_empty() {
            return Err(invalid("Broadcast status cannot be empty"));
        }
        if self.broadcast_status.as_str().len() > MAX_BROADCAST_STATUS_LEN {
            return Err(invalid("Broadcast status is too long"));
        }
        if self.tx_hash.as_ref().is_some_and(|hash| hash.len() > MAX_TX_HASH_LEN) {
            return Err(invalid("Transaction hash is too long"));
        }
        if self.remarks.as_ref().is_some_and(|remarks| remarks.len() > MAX_REMARKS_LEN) {
            return Err(invalid("Remarks are too long"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> WithdrawalError {
    WithdrawalError::InvalidInput(message.to_string())
}

/// `digits` or `digits.digits`.
fn is_decimal(amount: &str) -> bool {
    let mut parts = amount.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match parts.next() {
        Some(fraction) => is_digits(whole) && is_digits(fraction),
        None => is_digits(whole),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::NOT_BROADCAST;

    fn record(required_signatures: i32) -> WithdrawalRecord {
        WithdrawalRecord {
            withdrawal_id: Uuid::new_v4(),
            blockchain_id: Uuid::new_v4(),
            source_address_id: Uuid::new_v4(),
            destination_address: "0x123".to_string(),
            amount: "100".to_string(),
            asset_id: Uuid::new_v4(),
            required_signatures,
            version_timestamp: Utc::now(),
            created_at: Utc::now(),
        }
    }

    fn entry(position: i32, signatures: &[&str], status: &str) -> LedgerEntry {
        LedgerEntry {
            withdrawal_id: Uuid::nil(),
            position,
            signatures: SignatureSet::from_submitted(signatures.iter().copied()).unwrap(),
            broadcast_status: BroadcastStatus::from(status),
            tx_hash: None,
            tx_payload: None,
            remarks: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_withdrawal_requires_a_ledger_entry() {
        let result = Withdrawal::new(record(1), Vec::new());
        assert!(matches!(result, Err(WithdrawalError::EmptyLedger(_))));
    }

    #[test]
    fn test_state_follows_signatures_and_broadcast() {
        let created = Withdrawal::new(record(2), vec![entry(0, &["A"], NOT_BROADCAST)]).unwrap();
        assert_eq!(created.state(), WithdrawalState::Created);

        let signing = Withdrawal::new(
            record(3),
            vec![entry(0, &["A"], NOT_BROADCAST), entry(1, &["A", "A"], NOT_BROADCAST)],
        )
        .unwrap();
        assert_eq!(signing.state(), WithdrawalState::Signing);

        let ready = Withdrawal::new(
            record(2),
            vec![entry(0, &["A"], NOT_BROADCAST), entry(1, &["A", "B"], NOT_BROADCAST)],
        )
        .unwrap();
        assert_eq!(ready.state(), WithdrawalState::Ready);

        let broadcast = Withdrawal::new(
            record(2),
            vec![entry(0, &["A"], NOT_BROADCAST), entry(1, &["A"], "BROADCAST")],
        )
        .unwrap();
        assert_eq!(broadcast.state(), WithdrawalState::Broadcast);
    }

    #[test]
    fn test_amount_must_be_decimal_text() {
        assert!(is_decimal("100"));
        assert!(is_decimal("0.000001"));
        assert!(!is_decimal(""));
        assert!(!is_decimal("-1"));
        assert!(!is_decimal("1."));
        assert!(!is_decimal("1e9"));
    }
}
