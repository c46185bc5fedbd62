use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{NewWithdrawal, Withdrawal, WithdrawalUpdate};
use crate::config::LedgerConfig;
use crate::error::WithdrawalError;
use crate::ledger::{NewLedgerEntry, SignatureSet};
use crate::store::{
    AppendOutcome, NewWithdrawalRecord, SortOrder, WithdrawalFilter, WithdrawalStore,
};

/// Read-path parameters; unset limit and offset fall back to the configured
/// page size and zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithdrawalQuery {
    pub withdrawal_ids: Vec<Uuid>,
    pub blockchain_ids: Vec<Uuid>,
    pub asset_ids: Vec<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawalPage {
    pub withdrawals: Vec<Withdrawal>,
    /// Matches across all pages.
    pub total: i64,
}

/// Creates withdrawals and appends to their ledgers under optimistic
/// concurrency control. Never retries on its own.
#[derive(Clone)]
pub struct WithdrawalService {
    store: Arc<dyn WithdrawalStore>,
    config: LedgerConfig,
}

impl WithdrawalService {
    pub fn new(store: Arc<dyn WithdrawalStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Persists a new withdrawal together with its first ledger entry.
    pub async fn create_withdrawal(
        &self,
        request: NewWithdrawal,
    ) -> Result<Withdrawal, WithdrawalError> {
        self.with_deadline(self.create(request)).await
    }

    /// Appends one ledger entry, provided `expected_version` is still the
    /// withdrawal's current version.
    pub async fn update_withdrawal(
        &self,
        update: WithdrawalUpdate,
    ) -> Result<Withdrawal, WithdrawalError> {
        self.with_deadline(self.apply_update(update)).await
    }

    pub async fn get_withdrawal(&self, withdrawal_id: Uuid) -> Result<Withdrawal, WithdrawalError> {
        self.with_deadline(self.load(withdrawal_id)).await
    }

    pub async fn search_withdrawals(
        &self,
        query: WithdrawalQuery,
    ) -> Result<WithdrawalPage, WithdrawalError> {
        self.with_deadline(self.search(query)).await
    }

    async fn create(&self, request: NewWithdrawal) -> Result<Withdrawal, WithdrawalError> {
        request.validate()?;
        let initial = SignatureSet::from_submitted(request.initial_signature)?;

        let record = NewWithdrawalRecord {
            withdrawal_id: Uuid::new_v4(),
            blockchain_id: request.blockchain_id,
            source_address_id: request.source_address_id,
            destination_address: request.destination_address,
            amount: request.amount,
            asset_id: request.asset_id,
            required_signatures: request.required_signatures.unwrap_or(1),
        };

        let (record, entry) = self
            .store
            .insert_withdrawal(record, NewLedgerEntry::initial(initial))
            .await
            .map_err(|e| {
                error!("Failed to persist new withdrawal: {:?}", e);
                WithdrawalError::Storage(e)
            })?;

        info!(
            "Created withdrawal {} (quorum {})",
            record.withdrawal_id, record.required_signatures
        );
        Withdrawal::new(record, vec![entry])
    }

    async fn apply_update(&self, update: WithdrawalUpdate) -> Result<Withdrawal, WithdrawalError> {
        update.validate()?;
        let WithdrawalUpdate {
            withdrawal_id,
            expected_version,
            signatures,
            broadcast_status,
            tx_hash,
            tx_payload,
            remarks,
        } = update;
        let submitted = SignatureSet::from_submitted(signatures)?;

        let record = match self
            .store
            .find_withdrawal_at_version(withdrawal_id, expected_version)
            .await?
        {
            Some(record) => record,
            None => return Err(self.classify_miss(withdrawal_id, expected_version).await),
        };

        // The history may already be ahead of `record` here; the append
        // below then fails its version predicate.
        let history = self.store.entries_for(withdrawal_id).await?;
        let prior = history
            .last()
            .ok_or(WithdrawalError::EmptyLedger(withdrawal_id))?;
        let merged = prior.signatures.merged_with(&submitted);

        if self.config.enforce_quorum && broadcast_status.is_terminal() {
            let present = merged.distinct_count();
            if present < record.required_signatures.max(1) as usize {
                warn!(
                    "Rejected broadcast of withdrawal {}: {} of {} signatures",
                    withdrawal_id, present, record.required_signatures
                );
                return Err(WithdrawalError::QuorumNotReached {
                    required: record.required_signatures,
                    present,
                });
            }
        }

        let entry = NewLedgerEntry {
            signatures: merged,
            broadcast_status,
            tx_hash,
            tx_payload,
            remarks,
        };

        match self
            .store
            .append_if_current(withdrawal_id, expected_version, entry)
            .await?
        {
            AppendOutcome::Appended { record, entry } => {
                info!(
                    "Appended ledger entry {} to withdrawal {} ({} signatures, status {})",
                    entry.position,
                    withdrawal_id,
                    entry.signatures.len(),
                    entry.broadcast_status
                );
                let mut ledger = history;
                ledger.push(entry);
                Withdrawal::new(record, ledger)
            }
            AppendOutcome::VersionMismatch => {
                Err(self.classify_miss(withdrawal_id, expected_version).await)
            }
        }
    }

    /// Tells a stale version apart from an unknown withdrawal.
    async fn classify_miss(&self, withdrawal_id: Uuid, expected: DateTime<Utc>) -> WithdrawalError {
        match self.store.find_withdrawal(withdrawal_id).await {
            Ok(Some(current)) => {
                warn!(
                    "Stale update of withdrawal {}: expected version {}, current {}",
                    withdrawal_id, expected, current.version_timestamp
                );
                WithdrawalError::StaleVersion {
                    withdrawal_id,
                    expected,
                }
            }
            Ok(None) => {
                warn!("Update of unknown withdrawal {}", withdrawal_id);
                WithdrawalError::NotFound(withdrawal_id)
            }
            Err(e) => WithdrawalError::Storage(e),
        }
    }

    async fn load(&self, withdrawal_id: Uuid) -> Result<Withdrawal, WithdrawalError> {
        debug!("Loading withdrawal {}", withdrawal_id);
        let record = self
            .store
            .find_withdrawal(withdrawal_id)
            .await?
            .ok_or(WithdrawalError::NotFound(withdrawal_id))?;
        let ledger = self.store.entries_for(withdrawal_id).await?;
        Withdrawal::new(record, ledger)
    }

    async fn search(&self, query: WithdrawalQuery) -> Result<WithdrawalPage, WithdrawalError> {
        let limit = query.limit.unwrap_or(self.config.default_page_size);
        if limit < 1 || limit > self.config.max_page_size {
            return Err(WithdrawalError::InvalidInput(format!(
                "Limit must be between 1 and {}",
                self.config.max_page_size
            )));
        }
        let offset = query.offset.unwrap_or(0);
        if offset < 0 {
            return Err(WithdrawalError::InvalidInput(
                "Offset cannot be negative".to_string(),
            ));
        }

        let filter = WithdrawalFilter {
            withdrawal_ids: query.withdrawal_ids,
            blockchain_ids: query.blockchain_ids,
            asset_ids: query.asset_ids,
            limit,
            offset,
            order: query.order,
        };
        let (records, total) = self.store.search_withdrawals(&filter).await?;
        debug!("Search matched {} withdrawals, returning {}", total, records.len());

        let mut withdrawals = Vec::with_capacity(records.len());
        for record in records {
            let ledger = self.store.entries_for(record.withdrawal_id).await?;
            withdrawals.push(Withdrawal::new(record, ledger)?);
        }

        Ok(WithdrawalPage { withdrawals, total })
    }

    async fn with_deadline<T, F>(&self, operation: F) -> Result<T, WithdrawalError>
    where
        F: Future<Output = Result<T, WithdrawalError>>,
    {
        match self.config.operation_timeout() {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| {
                    warn!("Withdrawal operation exceeded {:?}", limit);
                    WithdrawalError::Timeout(limit)
                })?,
            None => operation.await,
        }
    }
}
