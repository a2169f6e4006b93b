//! Port abstraction for profile persistence adapters and their errors.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{NewProfile, Profile, ProfileChanges, Theme, Username};

/// Persistence errors raised by profile store adapters.
///
/// The two conflict variants are deliberately distinct: `AlreadyProvisioned`
/// makes provisioning idempotent, `UsernameTaken` is the user-actionable
/// duplicate-username outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileStoreError {
    /// Store connection could not be established.
    #[error("profile store connection failed: {message}")]
    Connection { message: String },
    /// Query or mutation failed during execution.
    #[error("profile store query failed: {message}")]
    Query { message: String },
    /// A profile row already exists for this identity id.
    #[error("profile already provisioned for this identity")]
    AlreadyProvisioned,
    /// The requested username is held by another profile.
    #[error("username {username} is already taken")]
    UsernameTaken { username: String },
    /// No profile row exists for the identity id.
    #[error("profile not found")]
    NotFound,
}

impl ProfileStoreError {
    /// Create a [`ProfileStoreError::Connection`] error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a [`ProfileStoreError::Query`] error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a [`ProfileStoreError::UsernameTaken`] error.
    pub fn username_taken(username: impl Into<String>) -> Self {
        Self::UsernameTaken {
            username: username.into(),
        }
    }
}

/// Port over the relational profile store.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert a profile row in a single atomic statement.
    ///
    /// The store's unique constraints are the arbiter for both conflicts;
    /// adapters must not implement this as check-then-insert.
    async fn insert_atomic(&self, new: &NewProfile) -> Result<Profile, ProfileStoreError>;

    /// Fetch a profile by identity id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, ProfileStoreError>;

    /// Fetch a profile by username, optionally restricted to public rows.
    async fn find_by_username(
        &self,
        username: &Username,
        require_public: bool,
    ) -> Result<Option<Profile>, ProfileStoreError>;

    /// Apply a partial update to the identified profile.
    async fn update(&self, id: Uuid, changes: &ProfileChanges)
        -> Result<Profile, ProfileStoreError>;
}

#[derive(Default)]
struct FixtureProfiles {
    rows: HashMap<Uuid, Profile>,
    outage: Option<ProfileStoreError>,
}

/// In-memory profile store used by tests and local development.
///
/// Mirrors the database contract: one row per identity id, globally unique
/// usernames, and atomic insert semantics under the interior lock.
#[derive(Default)]
pub struct FixtureProfileStore {
    state: Mutex<FixtureProfiles>,
}

impl FixtureProfileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing profile row.
    pub fn with_profile(self, profile: Profile) -> Self {
        {
            let mut state = self.lock();
            state.rows.insert(profile.id, profile);
        }
        self
    }

    /// Make every subsequent call fail with the given error.
    pub fn set_outage(&self, error: ProfileStoreError) {
        self.lock().outage = Some(error);
    }

    /// Number of stored rows, for test assertions.
    pub fn row_count(&self) -> usize {
        self.lock().rows.len()
    }

    /// Build the profile a successful insert would create, for fixtures.
    pub fn profile_from_new(new: &NewProfile) -> Profile {
        let now = Utc::now();
        Profile {
            id: new.id,
            email: new.email.clone(),
            username: new.username.clone(),
            full_name: new.full_name.clone(),
            avatar_url: None,
            bio: None,
            title: None,
            location: None,
            website: None,
            social_github: None,
            social_linkedin: None,
            social_twitter: None,
            theme: Theme::Default,
            is_public: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FixtureProfiles> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_outage(state: &FixtureProfiles) -> Result<(), ProfileStoreError> {
        state.outage.clone().map_or(Ok(()), Err)
    }
}

#[async_trait]
impl ProfileStore for FixtureProfileStore {
    async fn insert_atomic(&self, new: &NewProfile) -> Result<Profile, ProfileStoreError> {
        let mut state = self.lock();
        Self::check_outage(&state)?;
        if state.rows.contains_key(&new.id) {
            return Err(ProfileStoreError::AlreadyProvisioned);
        }
        if state
            .rows
            .values()
            .any(|row| row.username == new.username)
        {
            return Err(ProfileStoreError::username_taken(new.username.as_ref()));
        }
        let profile = Self::profile_from_new(new);
        state.rows.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, ProfileStoreError> {
        let state = self.lock();
        Self::check_outage(&state)?;
        Ok(state.rows.get(&id).cloned())
    }

    async fn find_by_username(
        &self,
        username: &Username,
        require_public: bool,
    ) -> Result<Option<Profile>, ProfileStoreError> {
        let state = self.lock();
        Self::check_outage(&state)?;
        Ok(state
            .rows
            .values()
            .find(|row| &row.username == username && (!require_public || row.is_public))
            .cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Profile, ProfileStoreError> {
        let mut state = self.lock();
        Self::check_outage(&state)?;

        if let Some(username) = &changes.username {
            let held_elsewhere = state
                .rows
                .values()
                .any(|row| row.id != id && &row.username == username);
            if held_elsewhere {
                return Err(ProfileStoreError::username_taken(username.as_ref()));
            }
        }

        let Some(row) = state.rows.get_mut(&id) else {
            return Err(ProfileStoreError::NotFound);
        };

        if let Some(username) = &changes.username {
            row.username = username.clone();
        }
        if let Some(full_name) = &changes.full_name {
            row.full_name = full_name.clone();
        }
        if let Some(avatar_url) = &changes.avatar_url {
            row.avatar_url = Some(avatar_url.clone());
        }
        if let Some(bio) = &changes.bio {
            row.bio = Some(bio.clone());
        }
        if let Some(title) = &changes.title {
            row.title = Some(title.clone());
        }
        if let Some(location) = &changes.location {
            row.location = Some(location.clone());
        }
        if let Some(website) = &changes.website {
            row.website = Some(website.clone());
        }
        if let Some(social_github) = &changes.social_github {
            row.social_github = Some(social_github.clone());
        }
        if let Some(social_linkedin) = &changes.social_linkedin {
            row.social_linkedin = Some(social_linkedin.clone());
        }
        if let Some(social_twitter) = &changes.social_twitter {
            row.social_twitter = Some(social_twitter.clone());
        }
        if let Some(theme) = changes.theme {
            row.theme = theme;
        }
        if let Some(is_public) = changes.is_public {
            row.is_public = is_public;
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}
