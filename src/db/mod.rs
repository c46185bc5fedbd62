pub mod client;
pub mod database;

pub use client::{DBClient, DbPool};
