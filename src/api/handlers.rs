use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::api::models::{
    SearchParams, SearchResponse, UpdateWithdrawalRequest, WithdrawalResponse,
};
use crate::api::routes::AppState;
use crate::error::WithdrawalError;
use crate::withdrawal::service::WithdrawalQuery;
use crate::withdrawal::NewWithdrawal;

type ApiError = (StatusCode, String);

pub async fn handle_create_withdrawal(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewWithdrawal>,
) -> Result<Json<WithdrawalResponse>, ApiError> {
    let withdrawal = state
        .service
        .create_withdrawal(payload)
        .await
        .map_err(error_response)?;

    Ok(Json(withdrawal.into()))
}

pub async fn handle_get_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(withdrawal_id): Path<Uuid>,
) -> Result<Json<WithdrawalResponse>, ApiError> {
    let withdrawal = state
        .service
        .get_withdrawal(withdrawal_id)
        .await
        .map_err(error_response)?;

    Ok(Json(withdrawal.into()))
}

pub async fn handle_update_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(withdrawal_id): Path<Uuid>,
    Json(payload): Json<UpdateWithdrawalRequest>,
) -> Result<Json<WithdrawalResponse>, ApiError> {
    let withdrawal = state
        .service
        .update_withdrawal(payload.into_update(withdrawal_id))
        .await
        .map_err(error_response)?;

    Ok(Json(withdrawal.into()))
}

pub async fn handle_search_withdrawals(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = WithdrawalQuery {
        withdrawal_ids: parse_id_list(params.withdrawal_ids.as_deref())?,
        blockchain_ids: parse_id_list(params.blockchain_ids.as_deref())?,
        asset_ids: parse_id_list(params.asset_ids.as_deref())?,
        limit: params.limit,
        offset: params.offset,
        order: params.order,
    };

    let page = state
        .service
        .search_withdrawals(query)
        .await
        .map_err(error_response)?;

    Ok(Json(SearchResponse {
        withdrawals: page.withdrawals.into_iter().map(Into::into).collect(),
        total: page.total,
    }))
}

fn parse_id_list(raw: Option<&str>) -> Result<Vec<Uuid>, ApiError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            Uuid::parse_str(id)
                .map_err(|_| (StatusCode::BAD_REQUEST, format!("Invalid identifier: {}", id)))
        })
        .collect()
}

pub fn error_response(e: WithdrawalError) -> ApiError {
    let status = match &e {
        WithdrawalError::NotFound(_) => StatusCode::NOT_FOUND,
        WithdrawalError::StaleVersion { .. } => StatusCode::CONFLICT,
        WithdrawalError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        WithdrawalError::QuorumNotReached { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        WithdrawalError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        WithdrawalError::Storage(_) | WithdrawalError::EmptyLedger(_) => {
            error!("Withdrawal request failed: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}
