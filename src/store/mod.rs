pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::ledger::{LedgerEntry, NewLedgerEntry};

pub use memory::{FailPoint, MemoryWithdrawalStore};
pub use postgres::PgWithdrawalStore;

/// Persisted withdrawal row, without its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRecord {
    pub withdrawal_id: Uuid,
    pub blockchain_id: Uuid,
    pub source_address_id: Uuid,
    pub destination_address: String,
    pub amount: String,
    pub asset_id: Uuid,
    pub required_signatures: i32,
    pub version_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Withdrawal row to insert. Timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWithdrawalRecord {
    pub withdrawal_id: Uuid,
    pub blockchain_id: Uuid,
    pub source_address_id: Uuid,
    pub destination_address: String,
    pub amount: String,
    pub asset_id: Uuid,
    pub required_signatures: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Filter for the read path. Empty id lists match every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithdrawalFilter {
    pub withdrawal_ids: Vec<Uuid>,
    pub blockchain_ids: Vec<Uuid>,
    pub asset_ids: Vec<Uuid>,
    pub limit: i64,
    pub offset: i64,
    pub order: SortOrder,
}

impl WithdrawalFilter {
    pub fn matches(&self, record: &WithdrawalRecord) -> bool {
        (self.withdrawal_ids.is_empty() || self.withdrawal_ids.contains(&record.withdrawal_id))
            && (self.blockchain_ids.is_empty()
                || self.blockchain_ids.contains(&record.blockchain_id))
            && (self.asset_ids.is_empty() || self.asset_ids.contains(&record.asset_id))
    }
}

/// Result of a version-conditioned append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended {
        record: WithdrawalRecord,
        entry: LedgerEntry,
    },
    /// The version no longer matched when the write was committed.
    VersionMismatch,
}

/// Storage session used by the withdrawal service.
///
/// Every method is its own atomic unit; backends must never expose a
/// withdrawal without its first ledger entry, nor an appended entry without
/// the matching version bump.
#[async_trait]
pub trait WithdrawalStore: Send + Sync {
    /// Inserts the withdrawal and its first ledger entry together.
    async fn insert_withdrawal(
        &self,
        withdrawal: NewWithdrawalRecord,
        first_entry: NewLedgerEntry,
    ) -> Result<(WithdrawalRecord, LedgerEntry), StoreError>;

    async fn find_withdrawal(
        &self,
        withdrawal_id: Uuid,
    ) -> Result<Option<WithdrawalRecord>, StoreError>;

    /// Conditional read: matches on identity and version together.
    async fn find_withdrawal_at_version(
        &self,
        withdrawal_id: Uuid,
        version: DateTime<Utc>,
    ) -> Result<Option<WithdrawalRecord>, StoreError>;

    async fn entries_for(&self, withdrawal_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Appends `entry` and advances the version, committing only while the
    /// stored version still equals `expected_version`.
    async fn append_if_current(
        &self,
        withdrawal_id: Uuid,
        expected_version: DateTime<Utc>,
        entry: NewLedgerEntry,
    ) -> Result<AppendOutcome, StoreError>;

    /// One page of matching withdrawals and the total match count.
    async fn search_withdrawals(
        &self,
        filter: &WithdrawalFilter,
    ) -> Result<(Vec<WithdrawalRecord>, i64), StoreError>;
}

/// Version token following `previous`: the current time at microsecond
/// precision, forced strictly past `previous`.
pub fn next_version(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(6);
    match previous {
        Some(previous) if now <= previous => previous + Duration::microseconds(1),
        _ => now,
    }
}
