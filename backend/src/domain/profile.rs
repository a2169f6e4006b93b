//! Public profile data model.
//!
//! A profile is keyed by the identity-service user id (1:1 with identities
//! that completed provisioning) and carries the publicly rendered metadata.
//! `username` is globally unique; the database constraint is the ultimate
//! arbiter, not the validation here.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Validation errors returned by [`Username::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsernameValidationError {
    TooShort { min: usize },
    TooLong { max: usize },
    InvalidCharacters,
}

impl fmt::Display for UsernameValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { min } => {
                write!(f, "username must be at least {min} characters")
            }
            Self::TooLong { max } => {
                write!(f, "username must be at most {max} characters")
            }
            Self::InvalidCharacters => write!(
                f,
                "username can only contain letters, numbers, hyphens, and underscores",
            ),
        }
    }
}

impl std::error::Error for UsernameValidationError {}

/// Minimum allowed length for a username.
pub const USERNAME_MIN: usize = 3;
/// Maximum allowed length for a username.
pub const USERNAME_MAX: usize = 39;

static USERNAME_RE: OnceLock<Regex> = OnceLock::new();
static DERIVED_USERNAME_RE: OnceLock<Regex> = OnceLock::new();

fn username_regex() -> &'static Regex {
    USERNAME_RE.get_or_init(|| {
        // Length is enforced separately; this regex constrains allowed characters.
        Regex::new("^[A-Za-z0-9_-]+$")
            .unwrap_or_else(|error| panic!("username regex failed to compile: {error}"))
    })
}

fn derived_username_regex() -> &'static Regex {
    DERIVED_USERNAME_RE.get_or_init(|| {
        // Provider handles and email local parts may carry dots.
        Regex::new("^[A-Za-z0-9._-]+$")
            .unwrap_or_else(|error| panic!("derived username regex failed to compile: {error}"))
    })
}

/// Globally unique profile handle.
///
/// ## Invariants
/// - 3 to 39 characters.
/// - User-supplied values match `[A-Za-z0-9_-]+`; values derived from
///   provider metadata may additionally contain `.` (see [`Username::derive`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Validate and construct a [`Username`] from user-supplied input.
    pub fn parse(username: impl Into<String>) -> Result<Self, UsernameValidationError> {
        let username = username.into();
        Self::check_length(&username)?;
        if !username_regex().is_match(&username) {
            return Err(UsernameValidationError::InvalidCharacters);
        }
        Ok(Self(username))
    }

    /// Derive a username for an identity that did not choose one.
    ///
    /// `candidates` are tried in priority order; the first that satisfies the
    /// lenient derivation rules wins. When none does, the fallback is `user_`
    /// plus the first eight characters of the identity id, which always
    /// validates. Collisions with existing usernames are left to the atomic
    /// insert's conflict path.
    pub fn derive<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>, id: &Uuid) -> Self {
        for candidate in candidates.into_iter().flatten() {
            if Self::check_length(candidate).is_ok() && derived_username_regex().is_match(candidate)
            {
                return Self(candidate.to_owned());
            }
        }
        let fragment: String = id.simple().to_string().chars().take(8).collect();
        Self(format!("user_{fragment}"))
    }

    /// Reconstruct a username from its stored database form.
    ///
    /// Stored values were validated by [`Username::parse`] or produced by
    /// [`Username::derive`] on the way in; re-validating here would reject
    /// legitimately stored derived values.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    fn check_length(username: &str) -> Result<(), UsernameValidationError> {
        let length = username.chars().count();
        if length < USERNAME_MIN {
            return Err(UsernameValidationError::TooShort { min: USERNAME_MIN });
        }
        if length > USERNAME_MAX {
            return Err(UsernameValidationError::TooLong { max: USERNAME_MAX });
        }
        Ok(())
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Portfolio colour theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Default,
    Dark,
    Light,
}

impl Theme {
    /// Stable string form stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    /// Parse the stored string form, defaulting on unknown values.
    pub fn from_stored(value: &str) -> Self {
        match value {
            "dark" => Self::Dark,
            "light" => Self::Light,
            "default" => Self::Default,
            other => {
                tracing::warn!(value = other, "unrecognised theme value, using default");
                Self::Default
            }
        }
    }
}

/// Public user profile.
///
/// ## Invariants
/// - `id` equals the identity-service user id (1:1 with identities).
/// - `username` is globally unique.
/// - Visible to anonymous readers iff `is_public` is true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[schema(value_type = String, example = "3fa85f64-5717-4562-b3fc-2c963f66afa6")]
    pub id: Uuid,
    pub email: String,
    #[schema(value_type = String, example = "ada")]
    pub username: Username,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_github: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_linkedin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_twitter: Option<String>,
    pub theme: Theme,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for the atomic provisioning step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    pub username: Username,
    pub full_name: String,
}

/// Partial update applied by the owning identity from the settings surface.
///
/// `None` fields are left untouched. `username` changes go through the same
/// uniqueness arbitration as provisioning.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChanges {
    #[schema(value_type = Option<String>)]
    pub username: Option<Username>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub social_github: Option<String>,
    pub social_linkedin: Option<String>,
    pub social_twitter: Option<String>,
    pub theme: Option<Theme>,
    pub is_public: Option<bool>,
}

impl ProfileChanges {
    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// A change set that only sets the avatar URL.
    pub fn avatar(url: impl Into<String>) -> Self {
        Self {
            avatar_url: Some(url.into()),
            ..Self::default()
        }
    }
}
