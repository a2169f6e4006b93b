//! Session-cookie helpers keeping HTTP handlers free of framework logic.
//!
//! The whole session record lives in the signed cookie; the server keeps no
//! session table. Handlers and the resolver middleware read and write it
//! through this wrapper so the storage key stays in one place.

use actix_session::{Session, SessionExt};
use actix_web::dev::{Payload, ServiceRequest};
use actix_web::{FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use tracing::warn;

use crate::domain::{Error, SessionRecord};

pub(crate) const SESSION_RECORD_KEY: &str = "session_record";

/// Newtype wrapper exposing record-level session operations.
#[derive(Clone)]
pub struct SessionCookie(Session);

impl SessionCookie {
    /// Construct a new wrapper from the underlying Actix session.
    pub fn new(session: Session) -> Self {
        Self(session)
    }

    /// Wrap the session attached to a middleware-stage request.
    pub fn from_service_request(req: &ServiceRequest) -> Self {
        Self(req.get_session())
    }

    /// Fetch the stored session record, if any.
    ///
    /// A cookie that fails to decode is dropped and treated as signed out
    /// rather than surfaced as an error.
    pub fn record(&self) -> Option<SessionRecord> {
        match self.0.get::<SessionRecord>(SESSION_RECORD_KEY) {
            Ok(record) => record,
            Err(error) => {
                warn!(%error, "undecodable session cookie, discarding");
                self.0.purge();
                None
            }
        }
    }

    /// Persist a session record in the cookie.
    pub fn persist(&self, record: &SessionRecord) -> Result<(), Error> {
        self.0
            .insert(SESSION_RECORD_KEY, record)
            .map_err(|error| Error::internal(format!("failed to persist session: {error}")))
    }

    /// Remove the stored record and invalidate the cookie.
    pub fn clear(&self) {
        self.0.purge();
    }

    /// Require a stored session record or return `401 Unauthorized`.
    pub fn require_record(&self) -> Result<SessionRecord, Error> {
        self.record()
            .ok_or_else(|| Error::unauthorized("login required"))
    }
}

impl FromRequest for SessionCookie {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Session::from_request(req, payload);
        Box::pin(async move { fut.await.map(SessionCookie::new) })
    }
}
