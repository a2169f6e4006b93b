//! PostgreSQL-backed `ProfileStore` implementation using Diesel.
//!
//! The provisioning insert is a single `INSERT ... RETURNING` statement; the
//! database's unique constraints arbitrate concurrent sign-ups. A unique
//! violation is classified by constraint name into the port's two conflict
//! variants, so the saga can tell "this identity already has a profile" from
//! "someone else holds this username".

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{ProfileStore, ProfileStoreError};
use crate::domain::{NewProfile, Profile, ProfileChanges, Username};

use super::models::{NewProfileRow, ProfileRow, ProfileUpdate};
use super::pool::{DbPool, PoolError};
use super::schema::profiles;

/// Primary-key constraint on the profiles table.
const PK_CONSTRAINT: &str = "profiles_pkey";
/// Unique-username constraint on the profiles table.
const USERNAME_CONSTRAINT: &str = "profiles_username_key";

/// Diesel-backed implementation of the `ProfileStore` port.
#[derive(Clone)]
pub struct DieselProfileStore {
    pool: DbPool,
}

impl DieselProfileStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> ProfileStoreError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            ProfileStoreError::connection(message)
        }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> ProfileStoreError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    if let DieselError::DatabaseError(kind, info) = &error {
        debug!(?kind, message = info.message(), "diesel operation failed");
    }

    match error {
        DieselError::NotFound => ProfileStoreError::NotFound,
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            ProfileStoreError::connection("database connection error")
        }
        _ => ProfileStoreError::query("database error"),
    }
}

/// Classify an insert-time unique violation by constraint name.
///
/// An unattributable unique violation is still a query error: guessing a
/// conflict variant here would let the saga mislabel a failure as idempotent
/// success.
fn classify_insert_error(error: diesel::result::Error, username: &Username) -> ProfileStoreError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    if let DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) = &error {
        return match info.constraint_name() {
            Some(PK_CONSTRAINT) => ProfileStoreError::AlreadyProvisioned,
            Some(USERNAME_CONSTRAINT) => ProfileStoreError::username_taken(username.as_ref()),
            other => {
                debug!(constraint = ?other, "unique violation on unexpected constraint");
                ProfileStoreError::query("database error")
            }
        };
    }
    map_diesel_error(error)
}

#[async_trait]
impl ProfileStore for DieselProfileStore {
    async fn insert_atomic(&self, new: &NewProfile) -> Result<Profile, ProfileStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: ProfileRow = diesel::insert_into(profiles::table)
            .values(NewProfileRow::from(new))
            .returning(ProfileRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|error| classify_insert_error(error, &new.username))?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, ProfileStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<ProfileRow> = profiles::table
            .find(id)
            .select(ProfileRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        Ok(row.map(Into::into))
    }

    async fn find_by_username(
        &self,
        username: &Username,
        require_public: bool,
    ) -> Result<Option<Profile>, ProfileStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let mut query = profiles::table
            .filter(profiles::username.eq(username.as_ref()))
            .into_boxed();
        if require_public {
            query = query.filter(profiles::is_public.eq(true));
        }

        let row: Option<ProfileRow> = query
            .select(ProfileRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        Ok(row.map(Into::into))
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Profile, ProfileStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let update = ProfileUpdate::from_changes(changes, Utc::now());
        let row: Option<ProfileRow> = diesel::update(profiles::table.find(id))
            .set(update)
            .returning(ProfileRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(|error| match changes.username.as_ref() {
                Some(username) => classify_insert_error(error, username),
                None => map_diesel_error(error),
            })?;

        row.map(Into::into).ok_or(ProfileStoreError::NotFound)
    }
}
