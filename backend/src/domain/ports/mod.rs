//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Inbound adapters and domain services depend on these traits instead of the
//! backing infrastructure, so handler and service tests substitute the
//! `Fixture*` doubles instead of wiring persistence or HTTP clients.

mod identity_backend;
mod navigator;
mod profile_store;
mod session_store;

pub use identity_backend::{
    FixtureIdentityBackend, IdentityBackend, IdentityBackendError, IssuedSession, OAuthProvider,
    ResolvedSession,
};
pub use navigator::{FixtureNavigator, Navigator};
pub use profile_store::{FixtureProfileStore, ProfileStore, ProfileStoreError};
pub use session_store::{FixtureSessionStore, SessionStore};
