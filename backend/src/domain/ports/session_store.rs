//! Port over the client-resident session storage (the cookie jar view).
//!
//! The client session context never decodes tokens; it only needs to know
//! whether a session record is present and to clear it on sign-out.

use std::sync::Mutex;

use crate::domain::SessionRecord;

/// Client-side session storage.
pub trait SessionStore: Send + Sync {
    /// Current session record, if any.
    fn load(&self) -> Option<SessionRecord>;

    /// Replace the stored record (sign-in, rotation).
    fn store(&self, record: SessionRecord);

    /// Drop the stored record (sign-out, invalidation).
    fn clear(&self);
}

/// In-memory session store used by tests and local development.
#[derive(Default)]
pub struct FixtureSessionStore {
    record: Mutex<Option<SessionRecord>>,
}

impl FixtureSessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored session.
    pub fn with_record(self, record: SessionRecord) -> Self {
        *self.record.lock().unwrap_or_else(|e| e.into_inner()) = Some(record);
        self
    }
}

impl SessionStore for FixtureSessionStore {
    fn load(&self) -> Option<SessionRecord> {
        self.record.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn store(&self, record: SessionRecord) {
        *self.record.lock().unwrap_or_else(|e| e.into_inner()) = Some(record);
    }

    fn clear(&self) {
        *self.record.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
