//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. They exist solely to satisfy Diesel's
//! type requirements for queries and mutations.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::{NewProfile, Profile, ProfileChanges, Theme, Username};

use super::schema::profiles;

/// Row struct for reading from the profiles table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ProfileRow {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub social_github: Option<String>,
    pub social_linkedin: Option<String>,
    pub social_twitter: Option<String>,
    pub theme: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            username: Username::from_stored(row.username),
            full_name: row.full_name,
            avatar_url: row.avatar_url,
            bio: row.bio,
            title: row.title,
            location: row.location,
            website: row.website,
            social_github: row.social_github,
            social_linkedin: row.social_linkedin,
            social_twitter: row.social_twitter,
            theme: Theme::from_stored(&row.theme),
            is_public: row.is_public,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Insertable struct for the atomic provisioning insert.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = profiles)]
pub(crate) struct NewProfileRow<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub username: &'a str,
    pub full_name: &'a str,
}

impl<'a> From<&'a NewProfile> for NewProfileRow<'a> {
    fn from(new: &'a NewProfile) -> Self {
        Self {
            id: new.id,
            email: &new.email,
            username: new.username.as_ref(),
            full_name: &new.full_name,
        }
    }
}

/// Changeset struct for partial profile updates.
///
/// `None` fields are skipped by Diesel, matching the domain's "untouched"
/// semantics; this path never sets a nullable column back to NULL.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = profiles)]
pub(crate) struct ProfileUpdate<'a> {
    pub username: Option<&'a str>,
    pub full_name: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub title: Option<&'a str>,
    pub location: Option<&'a str>,
    pub website: Option<&'a str>,
    pub social_github: Option<&'a str>,
    pub social_linkedin: Option<&'a str>,
    pub social_twitter: Option<&'a str>,
    pub theme: Option<&'static str>,
    pub is_public: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> ProfileUpdate<'a> {
    pub(crate) fn from_changes(changes: &'a ProfileChanges, updated_at: DateTime<Utc>) -> Self {
        Self {
            username: changes.username.as_ref().map(Username::as_ref),
            full_name: changes.full_name.as_deref(),
            avatar_url: changes.avatar_url.as_deref(),
            bio: changes.bio.as_deref(),
            title: changes.title.as_deref(),
            location: changes.location.as_deref(),
            website: changes.website.as_deref(),
            social_github: changes.social_github.as_deref(),
            social_linkedin: changes.social_linkedin.as_deref(),
            social_twitter: changes.social_twitter.as_deref(),
            theme: changes.theme.map(Theme::as_str),
            is_public: changes.is_public,
            updated_at,
        }
    }
}
