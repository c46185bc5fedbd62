use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{
    next_version, AppendOutcome, NewWithdrawalRecord, SortOrder, WithdrawalFilter,
    WithdrawalRecord, WithdrawalStore,
};
use crate::error::StoreError;
use crate::ledger::{LedgerEntry, LedgerStore, NewLedgerEntry};

/// Points at which the in-memory store can be told to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// After the withdrawal row is staged, before its first entry.
    AfterWithdrawalInsert,
    /// After the version check of an append, before anything is written.
    BeforeAppendCommit,
    /// On the next read.
    OnRead,
}

/// In-memory ledger table, keyed by withdrawal.
#[derive(Debug, Default, Clone)]
pub struct MemoryLedger {
    entries: HashMap<Uuid, Vec<LedgerEntry>>,
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn append(
        &mut self,
        withdrawal_id: Uuid,
        entry: NewLedgerEntry,
    ) -> Result<LedgerEntry, StoreError> {
        let ledger = self.entries.entry(withdrawal_id).or_default();
        let persisted = LedgerEntry {
            withdrawal_id,
            position: ledger.len() as i32,
            signatures: entry.signatures,
            broadcast_status: entry.broadcast_status,
            tx_hash: entry.tx_hash,
            tx_payload: entry.tx_payload,
            remarks: entry.remarks,
            created_at: Utc::now(),
        };
        ledger.push(persisted.clone());
        Ok(persisted)
    }

    async fn entries_for(&mut self, withdrawal_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .entries
            .get(&withdrawal_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    withdrawals: HashMap<Uuid, WithdrawalRecord>,
    // Insertion order, used as the creation-time tiebreak.
    order: Vec<Uuid>,
    ledger: MemoryLedger,
    fail_point: Option<FailPoint>,
}

impl MemoryState {
    fn trip(&mut self, point: FailPoint) -> Result<(), StoreError> {
        if self.fail_point == Some(point) {
            self.fail_point = None;
            return Err(StoreError::Injected(match point {
                FailPoint::AfterWithdrawalInsert => "after withdrawal insert",
                FailPoint::BeforeAppendCommit => "before append commit",
                FailPoint::OnRead => "on read",
            }));
        }
        Ok(())
    }
}

/// Process-local backend for tests and `--in-memory` runs.
///
/// Each operation holds the state lock for its whole critical section with
/// no suspension point inside, which makes every operation atomic.
#[derive(Debug, Default)]
pub struct MemoryWithdrawalStore {
    state: Mutex<MemoryState>,
}

impl MemoryWithdrawalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next operation that reaches `point` fail.
    pub async fn fail_next(&self, point: FailPoint) {
        self.state.lock().await.fail_point = Some(point);
    }

    pub async fn withdrawal_count(&self) -> usize {
        self.state.lock().await.withdrawals.len()
    }
}

#[async_trait]
impl WithdrawalStore for MemoryWithdrawalStore {
    async fn insert_withdrawal(
        &self,
        withdrawal: NewWithdrawalRecord,
        first_entry: NewLedgerEntry,
    ) -> Result<(WithdrawalRecord, LedgerEntry), StoreError> {
        let mut state = self.state.lock().await;

        let now = next_version(None);
        let record = WithdrawalRecord {
            withdrawal_id: withdrawal.withdrawal_id,
            blockchain_id: withdrawal.blockchain_id,
            source_address_id: withdrawal.source_address_id,
            destination_address: withdrawal.destination_address,
            amount: withdrawal.amount,
            asset_id: withdrawal.asset_id,
            required_signatures: withdrawal.required_signatures,
            version_timestamp: now,
            created_at: now,
        };

        // Nothing is published until both the row and the first entry exist.
        state.trip(FailPoint::AfterWithdrawalInsert)?;
        let mut staged = MemoryLedger::default();
        let entry = staged.append(record.withdrawal_id, first_entry).await?;

        state.ledger.entries.extend(staged.entries);
        state
            .withdrawals
            .insert(record.withdrawal_id, record.clone());
        state.order.push(record.withdrawal_id);
        Ok((record, entry))
    }

    async fn find_withdrawal(
        &self,
        withdrawal_id: Uuid,
    ) -> Result<Option<WithdrawalRecord>, StoreError> {
        let mut state = self.state.lock().await;
        state.trip(FailPoint::OnRead)?;
        Ok(state.withdrawals.get(&withdrawal_id).cloned())
    }

    async fn find_withdrawal_at_version(
        &self,
        withdrawal_id: Uuid,
        version: DateTime<Utc>,
    ) -> Result<Option<WithdrawalRecord>, StoreError> {
        let mut state = self.state.lock().await;
        state.trip(FailPoint::OnRead)?;
        Ok(state
            .withdrawals
            .get(&withdrawal_id)
            .filter(|record| record.version_timestamp == version)
            .cloned())
    }

    async fn entries_for(&self, withdrawal_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut state = self.state.lock().await;
        state.trip(FailPoint::OnRead)?;
        state.ledger.entries_for(withdrawal_id).await
    }

    async fn append_if_current(
        &self,
        withdrawal_id: Uuid,
        expected_version: DateTime<Utc>,
        entry: NewLedgerEntry,
    ) -> Result<AppendOutcome, StoreError> {
        let mut state = self.state.lock().await;

        let current = match state.withdrawals.get(&withdrawal_id) {
            Some(record) if record.version_timestamp == expected_version => record.clone(),
            _ => return Ok(AppendOutcome::VersionMismatch),
        };
        state.trip(FailPoint::BeforeAppendCommit)?;

        let entry = state.ledger.append(withdrawal_id, entry).await?;
        let record = WithdrawalRecord {
            version_timestamp: next_version(Some(current.version_timestamp)),
            ..current
        };
        state.withdrawals.insert(withdrawal_id, record.clone());
        debug!(
            "Appended entry {} to withdrawal {} in memory",
            entry.position, withdrawal_id
        );
        Ok(AppendOutcome::Appended { record, entry })
    }

    async fn search_withdrawals(
        &self,
        filter: &WithdrawalFilter,
    ) -> Result<(Vec<WithdrawalRecord>, i64), StoreError> {
        let mut state = self.state.lock().await;
        state.trip(FailPoint::OnRead)?;

        let mut matching: Vec<(usize, &WithdrawalRecord)> = state
            .order
            .iter()
            .enumerate()
            .filter_map(|(index, id)| state.withdrawals.get(id).map(|record| (index, record)))
            .filter(|(_, record)| filter.matches(record))
            .collect();
        matching.sort_by_key(|(index, record)| (record.created_at, *index));
        if filter.order == SortOrder::Desc {
            matching.reverse();
        }

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .map(|(_, record)| record.clone())
            .collect();
        Ok((page, total))
    }
}
