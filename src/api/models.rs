use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::BroadcastStatus;
use crate::store::SortOrder;
use crate::withdrawal::{Withdrawal, WithdrawalState, WithdrawalUpdate};

#[derive(Debug, Deserialize)]
pub struct UpdateWithdrawalRequest {
    /// Version the caller last read.
    pub version_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub signatures: Vec<String>,
    pub broadcast_status: BroadcastStatus,
    pub tx_hash: Option<String>,
    pub tx_payload: Option<String>,
    pub remarks: Option<String>,
}

impl UpdateWithdrawalRequest {
    pub fn into_update(self, withdrawal_id: Uuid) -> WithdrawalUpdate {
        WithdrawalUpdate {
            withdrawal_id,
            expected_version: self.version_timestamp,
            signatures: self.signatures,
            broadcast_status: self.broadcast_status,
            tx_hash: self.tx_hash,
            tx_payload: self.tx_payload,
            remarks: self.remarks,
        }
    }
}

/// Query string of `GET /withdrawals`; id lists are comma-separated.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub withdrawal_ids: Option<String>,
    pub blockchain_ids: Option<String>,
    pub asset_ids: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Serialize)]
pub struct WithdrawalResponse {
    #[serde(flatten)]
    pub withdrawal: Withdrawal,
    pub state: WithdrawalState,
}

impl From<Withdrawal> for WithdrawalResponse {
    fn from(withdrawal: Withdrawal) -> Self {
        let state = withdrawal.state();
        Self { withdrawal, state }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub withdrawals: Vec<WithdrawalResponse>,
    pub total: i64,
}
