//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{IdentityBackend, ProfileStore};
use crate::domain::{AuthEventHub, ProfileProvisioner};

/// Parameter object bundling the port implementations for HTTP handlers.
#[derive(Clone)]
pub struct HttpStatePorts {
    pub identity: Arc<dyn IdentityBackend>,
    pub profiles: Arc<dyn ProfileStore>,
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub identity: Arc<dyn IdentityBackend>,
    pub profiles: Arc<dyn ProfileStore>,
    pub provisioner: ProfileProvisioner,
    pub events: AuthEventHub,
    /// Absolute origin of this deployment, used to build OAuth redirect URLs.
    pub site_url: String,
}

impl HttpState {
    /// Construct state from a ports bundle.
    ///
    /// # Examples
    /// ```no_run
    /// use std::sync::Arc;
    ///
    /// use folio_backend::domain::ports::{FixtureIdentityBackend, FixtureProfileStore};
    /// use folio_backend::inbound::http::state::{HttpState, HttpStatePorts};
    ///
    /// let ports = HttpStatePorts {
    ///     identity: Arc::new(FixtureIdentityBackend::new()),
    ///     profiles: Arc::new(FixtureProfileStore::new()),
    /// };
    /// let state = HttpState::new(ports, "http://localhost:8080");
    /// let _provisioner = state.provisioner.clone();
    /// ```
    pub fn new(ports: HttpStatePorts, site_url: impl Into<String>) -> Self {
        let HttpStatePorts { identity, profiles } = ports;
        let events = AuthEventHub::new();
        let provisioner =
            ProfileProvisioner::new(identity.clone(), profiles.clone(), events.clone());
        Self {
            identity,
            profiles,
            provisioner,
            events,
            site_url: site_url.into(),
        }
    }
}
