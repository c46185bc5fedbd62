use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{AppendOutcome, NewWithdrawalRecord, WithdrawalFilter, WithdrawalRecord, WithdrawalStore};
use crate::db::database::{
    advance_version, count_withdrawals, fetch_ledger_entries, fetch_withdrawal,
    fetch_withdrawal_at_version, insert_ledger_entry, insert_withdrawal, search_withdrawals,
};
use crate::error::StoreError;
use crate::ledger::{LedgerEntry, LedgerStore, NewLedgerEntry};

/// Ledger access on a single connection, typically one borrowed from an
/// open transaction.
#[async_trait]
impl LedgerStore for PgConnection {
    async fn append(
        &mut self,
        withdrawal_id: Uuid,
        entry: NewLedgerEntry,
    ) -> Result<LedgerEntry, StoreError> {
        let row = insert_ledger_entry(self, withdrawal_id, &entry)
            .await?
            .ok_or(StoreError::UnknownWithdrawal(withdrawal_id))?;
        Ok(row.into())
    }

    async fn entries_for(&mut self, withdrawal_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = fetch_ledger_entries(self, withdrawal_id).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// PostgreSQL backend. Each method runs in its own transaction or single
/// statement.
#[derive(Clone)]
pub struct PgWithdrawalStore {
    db_pool: PgPool,
}

impl PgWithdrawalStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl WithdrawalStore for PgWithdrawalStore {
    async fn insert_withdrawal(
        &self,
        withdrawal: NewWithdrawalRecord,
        first_entry: NewLedgerEntry,
    ) -> Result<(WithdrawalRecord, LedgerEntry), StoreError> {
        let mut tx = self.db_pool.begin().await?;

        let row = insert_withdrawal(&mut *tx, &withdrawal).await?;
        let entry = tx.append(row.withdrawal_id, first_entry).await?;

        tx.commit().await?;
        Ok((row.into(), entry))
    }

    async fn find_withdrawal(
        &self,
        withdrawal_id: Uuid,
    ) -> Result<Option<WithdrawalRecord>, StoreError> {
        let row = fetch_withdrawal(&self.db_pool, withdrawal_id).await?;
        Ok(row.map(Into::into))
    }

    async fn find_withdrawal_at_version(
        &self,
        withdrawal_id: Uuid,
        version: DateTime<Utc>,
    ) -> Result<Option<WithdrawalRecord>, StoreError> {
        let row = fetch_withdrawal_at_version(&self.db_pool, withdrawal_id, version).await?;
        Ok(row.map(Into::into))
    }

    async fn entries_for(&self, withdrawal_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = fetch_ledger_entries(&self.db_pool, withdrawal_id).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn append_if_current(
        &self,
        withdrawal_id: Uuid,
        expected_version: DateTime<Utc>,
        entry: NewLedgerEntry,
    ) -> Result<AppendOutcome, StoreError> {
        let mut tx = self.db_pool.begin().await?;

        // The version check is the commit predicate: it runs inside the same
        // transaction as the insert and locks the row until commit.
        let Some(row) = advance_version(&mut *tx, withdrawal_id, expected_version).await? else {
            tx.rollback().await?;
            warn!(
                "Version {} of withdrawal {} no longer current at commit",
                expected_version, withdrawal_id
            );
            return Ok(AppendOutcome::VersionMismatch);
        };
        let entry = tx.append(withdrawal_id, entry).await?;

        tx.commit().await?;
        debug!(
            "Committed entry {} for withdrawal {}",
            entry.position, withdrawal_id
        );
        Ok(AppendOutcome::Appended {
            record: row.into(),
            entry,
        })
    }

    async fn search_withdrawals(
        &self,
        filter: &WithdrawalFilter,
    ) -> Result<(Vec<WithdrawalRecord>, i64), StoreError> {
        let rows = search_withdrawals(&self.db_pool, filter).await?;
        let total = count_withdrawals(&self.db_pool, filter).await?;
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }
}
