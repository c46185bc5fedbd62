pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod store;
pub mod withdrawal;

pub use error::{StoreError, WithdrawalError};
