//! HTTP adapter for the external identity service.

pub mod dto;
pub mod http_backend;

pub use http_backend::HttpIdentityBackend;
