//! Port over client-side navigation.
//!
//! The session context redirects after sign-out and needs the current path
//! to decide whether a backend failure may surface as an error. Hosts plug
//! in their router; tests record visits.

use std::sync::Mutex;

/// Client-side navigation surface.
pub trait Navigator: Send + Sync {
    /// Path of the page currently being viewed.
    fn current_path(&self) -> String;

    /// Navigate to the given path.
    fn goto(&self, path: &str);
}

/// Recording navigator used by tests.
pub struct FixtureNavigator {
    path: Mutex<String>,
    visits: Mutex<Vec<String>>,
}

impl FixtureNavigator {
    /// Create a navigator positioned at `path`.
    pub fn at(path: &str) -> Self {
        Self {
            path: Mutex::new(path.to_owned()),
            visits: Mutex::new(Vec::new()),
        }
    }

    /// Paths visited via [`Navigator::goto`], in order.
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Navigator for FixtureNavigator {
    fn current_path(&self) -> String {
        self.path.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn goto(&self, path: &str) {
        *self.path.lock().unwrap_or_else(|e| e.into_inner()) = path.to_owned();
        self.visits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.to_owned());
    }
}
