//! Outbound adapters implementing domain ports against external systems.

pub mod identity;
pub mod persistence;
