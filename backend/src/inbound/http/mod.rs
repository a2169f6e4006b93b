//! HTTP inbound adapter exposing REST endpoints and the edge resolver.

pub mod auth;
pub mod error;
pub mod health;
pub mod profiles;
pub mod resolver;
pub mod session;
pub mod state;
#[cfg(test)]
pub mod test_utils;

pub use crate::domain::ApiResult;
pub use resolver::{ResolvedUser, SessionResolver};
