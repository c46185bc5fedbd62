use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{
    handle_create_withdrawal, handle_get_withdrawal, handle_search_withdrawals,
    handle_update_withdrawal,
};
use crate::config::AppConfig;
use crate::withdrawal::WithdrawalService;

pub struct AppState {
    pub service: WithdrawalService,
    pub config: AppConfig,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/withdrawals",
            get(handle_search_withdrawals).post(handle_create_withdrawal),
        )
        .route(
            "/withdrawals/{withdrawal_id}",
            get(handle_get_withdrawal).patch(handle_update_withdrawal),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
