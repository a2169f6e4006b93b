//! PostgreSQL persistence adapters built on Diesel.

pub mod diesel_profile_store;
pub mod models;
pub mod pool;
pub mod schema;

pub use diesel_profile_store::DieselProfileStore;
pub use pool::{DbPool, PoolConfig, PoolError};
