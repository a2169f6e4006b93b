//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the database migrations exactly. They are
//! used by Diesel for compile-time query validation and type-safe SQL
//! generation; regenerate with `diesel print-schema` when migrations change.

diesel::table! {
    /// Public portfolio profiles, one row per provisioned identity.
    ///
    /// `id` is the identity-service user id (the `profiles_pkey` constraint);
    /// `username` carries the `profiles_username_key` unique constraint. The
    /// two constraint names are load-bearing: the store classifies insert
    /// conflicts by them.
    profiles (id) {
        /// Primary key: identity-service user id.
        id -> Uuid,
        /// Email captured at provisioning time.
        email -> Varchar,
        /// Globally unique profile handle.
        username -> Varchar,
        /// Display name rendered on the portfolio.
        full_name -> Varchar,
        avatar_url -> Nullable<Text>,
        bio -> Nullable<Text>,
        title -> Nullable<Varchar>,
        location -> Nullable<Varchar>,
        website -> Nullable<Text>,
        social_github -> Nullable<Text>,
        social_linkedin -> Nullable<Text>,
        social_twitter -> Nullable<Text>,
        /// Stored theme value; see `Theme::from_stored`.
        theme -> Varchar,
        /// Whether anonymous readers may view this profile.
        is_public -> Bool,
        /// Record creation timestamp.
        created_at -> Timestamptz,
        /// Last modification timestamp.
        updated_at -> Timestamptz,
    }
}
