use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::ledger::{BroadcastStatus, LedgerEntry, NewLedgerEntry, SignatureSet};
use crate::store::{NewWithdrawalRecord, SortOrder, WithdrawalFilter, WithdrawalRecord};

#[derive(Debug, FromRow)]
pub struct WithdrawalRow {
    pub id: i64,
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

impl From<WithdrawalRow> for WithdrawalRecord {
    fn from(row: WithdrawalRow) -> Self {
        WithdrawalRecord {
            withdrawal_id: row.withdrawal_id,
            blockchain_id: row.blockchain_id,
            source_address_id: row.source_address_id,
            destination_address: row.destination_address,
            amount: row.amount,
            asset_id: row.asset_id,
            required_signatures: row.required_signatures,
            version_timestamp: row.version_timestamp,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct LedgerEntryRow {
    pub withdrawal_id: Uuid,
    pub position: i32,
    pub signatures: Option<String>, // comma-joined, NULL when none
    pub broadcast_status: String,
    pub tx_hash: Option<String>,
    pub tx_payload: Option<String>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntryRow> for LedgerEntry {
    fn from(row: LedgerEntryRow) -> Self {
        LedgerEntry {
            withdrawal_id: row.withdrawal_id,
            position: row.position,
            signatures: SignatureSet::from_column(row.signatures.as_deref()),
            broadcast_status: BroadcastStatus::from(row.broadcast_status),
            tx_hash: row.tx_hash,
            tx_payload: row.tx_payload,
            remarks: row.remarks,
            created_at: row.created_at,
        }
    }
}

pub async fn insert_withdrawal(
    conn: &mut PgConnection,
    withdrawal: &NewWithdrawalRecord,
) -> Result<WithdrawalRow, sqlx::Error> {
    sqlx::query_as::<_, WithdrawalRow>(
        r#"
        INSERT INTO withdrawals (
            withdrawal_id, blockchain_id, source_address_id,
            destination_address, amount, asset_id, required_signatures
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, withdrawal_id, blockchain_id, source_address_id,
                  destination_address, amount, asset_id, required_signatures,
                  version_timestamp, created_at
        "#,
    )
    .bind(withdrawal.withdrawal_id)
    .bind(withdrawal.blockchain_id)
    .bind(withdrawal.source_address_id)
    .bind(&withdrawal.destination_address)
    .bind(&withdrawal.amount)
    .bind(withdrawal.asset_id)
    .bind(withdrawal.required_signatures)
    .fetch_one(conn)
    .await
}

pub async fn fetch_withdrawal<'e, E>(
    executor: E,
    withdrawal_id: Uuid,
) -> Result<Option<WithdrawalRow>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, WithdrawalRow>(
        r#"
        SELECT id, withdrawal_id, blockchain_id, source_address_id,
               destination_address, amount, asset_id, required_signatures,
               version_timestamp, created_at
        FROM withdrawals
        WHERE withdrawal_id = $1
        "#,
    )
    .bind(withdrawal_id)
    .fetch_optional(executor)
    .await
}

pub async fn fetch_withdrawal_at_version<'e, E>(
    executor: E,
    withdrawal_id: Uuid,
    version: DateTime<Utc>,
) -> Result<Option<WithdrawalRow>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, WithdrawalRow>(
        r#"
        SELECT id, withdrawal_id, blockchain_id, source_address_id,
               destination_address, amount, asset_id, required_signatures,
               version_timestamp, created_at
        FROM withdrawals
        WHERE withdrawal_id = $1 AND version_timestamp = $2
        "#,
    )
    .bind(withdrawal_id)
    .bind(version)
    .fetch_optional(executor)
    .await
}

/// Advances the version only if it still equals `expected`. The matched row
/// stays locked until the surrounding transaction ends.
pub async fn advance_version(
    conn: &mut PgConnection,
    withdrawal_id: Uuid,
    expected: DateTime<Utc>,
) -> Result<Option<WithdrawalRow>, sqlx::Error> {
    sqlx::query_as::<_, WithdrawalRow>(
        r#"
        UPDATE withdrawals
        SET version_timestamp = GREATEST(
            date_trunc('microseconds', clock_timestamp()),
            version_timestamp + INTERVAL '1 microsecond'
        )
        WHERE withdrawal_id = $1 AND version_timestamp = $2
        RETURNING id, withdrawal_id, blockchain_id, source_address_id,
                  destination_address, amount, asset_id, required_signatures,
                  version_timestamp, created_at
        "#,
    )
    .bind(withdrawal_id)
    .bind(expected)
    .fetch_optional(conn)
    .await
}

/// Inserts `entry` at the next position; `None` when the withdrawal is unknown.
pub async fn insert_ledger_entry(
    conn: &mut PgConnection,
    withdrawal_id: Uuid,
    entry: &NewLedgerEntry,
) -> Result<Option<LedgerEntryRow>, sqlx::Error> {
    sqlx::query_as::<_, LedgerEntryRow>(
        r#"
        WITH inserted AS (
            INSERT INTO ledger_entries (
                withdrawal_pk, position, signatures, broadcast_status,
                tx_hash, tx_payload, remarks
            )
            SELECT w.id,
                   COALESCE(
                       (SELECT MAX(l.position) + 1 FROM ledger_entries l WHERE l.withdrawal_pk = w.id),
                       0
                   ),
                   $2, $3, $4, $5, $6
            FROM withdrawals w
            WHERE w.withdrawal_id = $1
            RETURNING position, signatures, broadcast_status, tx_hash,
                      tx_payload, remarks, created_at
        )
        SELECT $1::uuid AS withdrawal_id, position, signatures, broadcast_status,
               tx_hash, tx_payload, remarks, created_at
        FROM inserted
        "#,
    )
    .bind(withdrawal_id)
    .bind(entry.signatures.to_column())
    .bind(entry.broadcast_status.as_str())
    .bind(entry.tx_hash.as_deref())
    .bind(entry.tx_payload.as_deref())
    .bind(entry.remarks.as_deref())
    .fetch_optional(conn)
    .await
}

pub async fn fetch_ledger_entries<'e, E>(
    executor: E,
    withdrawal_id: Uuid,
) -> Result<Vec<LedgerEntryRow>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, LedgerEntryRow>(
        r#"
        SELECT w.withdrawal_id, l.position, l.signatures, l.broadcast_status,
               l.tx_hash, l.tx_payload, l.remarks, l.created_at
        FROM ledger_entries l
        JOIN withdrawals w ON w.id = l.withdrawal_pk
        WHERE w.withdrawal_id = $1
        ORDER BY l.position ASC
        "#,
    )
    .bind(withdrawal_id)
    .fetch_all(executor)
    .await
}

const SEARCH_ASC: &str = r#"
    SELECT id, withdrawal_id, blockchain_id, source_address_id,
           destination_address, amount, asset_id, required_signatures,
           version_timestamp, created_at
    FROM withdrawals
    WHERE (cardinality($1::uuid[]) = 0 OR withdrawal_id = ANY($1))
      AND (cardinality($2::uuid[]) = 0 OR blockchain_id = ANY($2))
      AND (cardinality($3::uuid[]) = 0 OR asset_id = ANY($3))
    ORDER BY created_at ASC, id ASC
    LIMIT $4 OFFSET $5
"#;

const SEARCH_DESC: &str = r#"
    SELECT id, withdrawal_id, blockchain_id, source_address_id,
           destination_address, amount, asset_id, required_signatures,
           version_timestamp, created_at
    FROM withdrawals
    WHERE (cardinality($1::uuid[]) = 0 OR withdrawal_id = ANY($1))
      AND (cardinality($2::uuid[]) = 0 OR blockchain_id = ANY($2))
      AND (cardinality($3::uuid[]) = 0 OR asset_id = ANY($3))
    ORDER BY created_at DESC, id DESC
    LIMIT $4 OFFSET $5
"#;

pub async fn search_withdrawals(
    pool: &PgPool,
    filter: &WithdrawalFilter,
) -> Result<Vec<WithdrawalRow>, sqlx::Error> {
    let sql = match filter.order {
        SortOrder::Asc => SEARCH_ASC,
        SortOrder::Desc => SEARCH_DESC,
    };

    sqlx::query_as::<_, WithdrawalRow>(sql)
        .bind(filter.withdrawal_ids.as_slice())
        .bind(filter.blockchain_ids.as_slice())
        .bind(filter.asset_ids.as_slice())
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(pool)
        .await
}

/// Total rows matching `filter`, ignoring limit and offset.
pub async fn count_withdrawals(pool: &PgPool, filter: &WithdrawalFilter) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM withdrawals
        WHERE (cardinality($1::uuid[]) = 0 OR withdrawal_id = ANY($1))
          AND (cardinality($2::uuid[]) = 0 OR blockchain_id = ANY($2))
          AND (cardinality($3::uuid[]) = 0 OR asset_id = ANY($3))
        "#,
    )
    .bind(filter.withdrawal_ids.as_slice())
    .bind(filter.blockchain_ids.as_slice())
    .bind(filter.asset_ids.as_slice())
    .fetch_one(pool)
    .await
}
