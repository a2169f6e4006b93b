//! Route-level admission classes.
//!
//! Shared by the edge session resolver and the client session context so the
//! two agree on what "the authenticated area" means.

/// Admission class for a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Requires a resolved user; unauthenticated access redirects to login.
    Protected,
    /// Exclusively for unauthenticated users (login, signup).
    AuthOnly,
    /// Passes through regardless of session state.
    Public,
}

/// Path prefix of the authenticated area.
pub const DASHBOARD_PREFIX: &str = "/dashboard";
/// Login route; unauthenticated protected-area requests land here.
pub const LOGIN_PATH: &str = "/login";
/// Signup route.
pub const SIGNUP_PATH: &str = "/signup";
/// Public landing route used by client-side sign-out redirects.
pub const LANDING_PATH: &str = "/";

impl RouteClass {
    /// Classify a request path.
    pub fn classify(path: &str) -> Self {
        if path == DASHBOARD_PREFIX || path.starts_with("/dashboard/") {
            Self::Protected
        } else if path == LOGIN_PATH || path == SIGNUP_PATH {
            Self::AuthOnly
        } else {
            Self::Public
        }
    }

    /// True for paths inside the authenticated area.
    pub fn is_protected(path: &str) -> bool {
        matches!(Self::classify(path), Self::Protected)
    }
}
