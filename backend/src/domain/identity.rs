//! Identity-backend primitives.
//!
//! Identities are owned by the external identity service and read-only from
//! this core's perspective. Sessions are ephemeral and live in signed
//! cookies; the resolver refreshes them through the backend, never by
//! decoding tokens locally.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Free-form metadata supplied by the identity provider at sign-up or OAuth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderMetadata(Map<String, Value>);

impl ProviderMetadata {
    /// Wrap a raw metadata object.
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// String-valued metadata entry, if present and non-empty.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Provider-supplied handle (GitHub's `user_name`).
    pub fn user_name(&self) -> Option<&str> {
        self.get_str("user_name")
    }

    /// OIDC `preferred_username` claim.
    pub fn preferred_username(&self) -> Option<&str> {
        self.get_str("preferred_username")
    }

    /// Full name, falling back to the bare `name` claim.
    pub fn full_name(&self) -> Option<&str> {
        self.get_str("full_name").or_else(|| self.get_str("name"))
    }

    /// Avatar URL supplied by the provider.
    pub fn avatar_url(&self) -> Option<&str> {
        self.get_str("avatar_url")
    }
}

impl From<Map<String, Value>> for ProviderMetadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Identity record issued by the identity backend.
///
/// ## Invariants
/// - `id` is immutable for the lifetime of the account and doubles as the
///   profile primary key once provisioning completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub metadata: ProviderMetadata,
}

impl Identity {
    /// Local part of the identity's email address, if any.
    pub fn email_local_part(&self) -> Option<&str> {
        self.email.split('@').next().filter(|part| !part.is_empty())
    }
}

/// Session state persisted in the signed cookie.
///
/// The access token authenticates backend calls; the refresh token lets the
/// resolver rotate an expired session transparently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// True when the access token has expired relative to `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Domain error returned when login payload values are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginValidationError {
    /// Email was missing, blank, or not mailbox shaped.
    InvalidEmail,
    /// Password was blank.
    EmptyPassword,
}

impl fmt::Display for LoginValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEmail => write!(f, "email must be a valid address"),
            Self::EmptyPassword => write!(f, "password must not be empty"),
        }
    }
}

impl std::error::Error for LoginValidationError {}

/// Validated email/password credentials used by authentication flows.
///
/// ## Invariants
/// - `email` is trimmed and must contain a non-empty local part and domain.
/// - `password` is required to be non-empty but retains caller-provided
///   whitespace to avoid surprising credential comparisons.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    email: String,
    password: Zeroizing<String>,
}

impl LoginCredentials {
    /// Construct credentials from raw email/password inputs.
    pub fn try_from_parts(email: &str, password: &str) -> Result<Self, LoginValidationError> {
        let normalized = email.trim();
        let mailbox_shaped = normalized
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if !mailbox_shaped {
            return Err(LoginValidationError::InvalidEmail);
        }

        if password.is_empty() {
            return Err(LoginValidationError::EmptyPassword);
        }

        Ok(Self {
            email: normalized.to_owned(),
            password: Zeroizing::new(password.to_owned()),
        })
    }

    /// Email address suitable for identity lookups.
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Password string provided by the caller.
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}
