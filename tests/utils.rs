#![allow(dead_code)]

use axum::Router;
use std::sync::Arc;
use uuid::Uuid;
use withdrawal_ledger::api::{create_router, AppState};
use withdrawal_ledger::config::{
    AppConfig, DatabaseConfig, LedgerConfig, LoggingConfig, ServerConfig,
};
use withdrawal_ledger::store::{MemoryWithdrawalStore, WithdrawalStore};
use withdrawal_ledger::withdrawal::{NewWithdrawal, WithdrawalService};

// Helper function to create test config
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1:0".to_string(),
        },
        database: DatabaseConfig { max_connections: 5 },
        ledger: LedgerConfig::default(),
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
    }
}

pub fn memory_service(config: LedgerConfig) -> (Arc<MemoryWithdrawalStore>, WithdrawalService) {
    let store = Arc::new(MemoryWithdrawalStore::new());
    let service = WithdrawalService::new(store.clone() as Arc<dyn WithdrawalStore>, config);
    (store, service)
}

pub fn create_test_app() -> (Arc<MemoryWithdrawalStore>, Router) {
    let configuration = create_test_config();
    let (store, service) = memory_service(configuration.ledger.clone());

    let state = Arc::new(AppState {
        service,
        config: configuration,
    });

    (store, create_router(state))
}

pub fn sample_withdrawal(initial_signature: Option<&str>) -> NewWithdrawal {
    NewWithdrawal {
        destination_address: "0x123".to_string(),
        amount: "100".to_string(),
        asset_id: Uuid::new_v4(),
        blockchain_id: Uuid::new_v4(),
        source_address_id: Uuid::new_v4(),
        initial_signature: initial_signature.map(str::to_string),
        required_signatures: None,
    }
}
