//! Profile provisioning saga.
//!
//! Identity creation and profile creation live in two systems with no shared
//! transaction. Identity creation is the authoritative first step; the
//! profile insert is a compensable second step. An identity with no profile
//! is a valid-but-incomplete state: lookups detect it and provisioning is
//! retried, never treated as corruption.
//!
//! The profile insert itself is a single atomic statement and the store's
//! unique constraints arbitrate both conflict kinds, so two concurrent
//! sign-ups racing for one username produce exactly one row.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::domain::ports::{
    IdentityBackend, IdentityBackendError, IssuedSession, ProfileStore, ProfileStoreError,
};
use crate::domain::{
    AuthEvent, AuthEventHub, Identity, LoginCredentials, NewProfile, Profile, ProfileChanges,
    ProviderMetadata, SessionRecord, Username,
};

/// Validated sign-up request.
#[derive(Debug, Clone)]
pub struct NewSignUp {
    pub credentials: LoginCredentials,
    pub username: Username,
    pub full_name: String,
}

/// Result of a successful sign-up.
///
/// `session` is `None` when the account and profile were created but the
/// immediate sign-in failed; the caller should ask the user to log in.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub profile: Profile,
    pub session: Option<SessionRecord>,
}

/// Failures surfaced by the direct sign-up flow.
///
/// `UsernameTaken` is user-actionable and distinct from both identity
/// creation failure and provisioning failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignUpError {
    #[error("username is already taken")]
    UsernameTaken,
    #[error("failed to create user account: {message}")]
    Identity { message: String },
    #[error("failed to create user profile: {message}")]
    Provisioning { message: String },
    #[error("authentication service unavailable: {message}")]
    Unavailable { message: String },
}

/// Failures surfaced by the password sign-in flow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignInError {
    #[error("invalid login credentials")]
    InvalidCredentials,
    #[error("failed to repair user profile: {message}")]
    Provisioning { message: String },
    #[error("authentication service unavailable: {message}")]
    Unavailable { message: String },
}

/// Failures surfaced by the OAuth callback flow.
///
/// The HTTP handler maps every variant onto the fixed error route; the
/// variants exist so logs can tell a bad code from an outage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OAuthCallbackError {
    #[error("invalid or expired authorization code")]
    InvalidCode,
    #[error("failed to create user profile: {message}")]
    Provisioning { message: String },
    #[error("authentication service unavailable: {message}")]
    Unavailable { message: String },
}

/// Creates exactly one profile row per identity, idempotently.
///
/// Dependency-injected over the identity backend and profile store ports;
/// publishes [`AuthEvent`]s on the shared hub when sessions are issued or
/// revoked.
#[derive(Clone)]
pub struct ProfileProvisioner {
    identity: Arc<dyn IdentityBackend>,
    profiles: Arc<dyn ProfileStore>,
    events: AuthEventHub,
}

impl ProfileProvisioner {
    /// Create a provisioner over the given ports.
    pub fn new(
        identity: Arc<dyn IdentityBackend>,
        profiles: Arc<dyn ProfileStore>,
        events: AuthEventHub,
    ) -> Self {
        Self {
            identity,
            profiles,
            events,
        }
    }

    /// Direct sign-up: identity creation, atomic profile insert, best-effort
    /// auto sign-in.
    pub async fn sign_up(&self, new: NewSignUp) -> Result<SignUpOutcome, SignUpError> {
        // Pre-check gives the common case a friendly answer; the atomic
        // insert below remains the arbiter under concurrency.
        let taken = self
            .profiles
            .find_by_username(&new.username, false)
            .await
            .map_err(map_store_sign_up)?
            .is_some();
        if taken {
            return Err(SignUpError::UsernameTaken);
        }

        let metadata = sign_up_metadata(&new);
        let identity = self
            .identity
            .sign_up(&new.credentials, &metadata)
            .await
            .map_err(map_identity_sign_up)?;

        let profile = self
            .provision(&NewProfile {
                id: identity.id,
                email: identity.email.clone(),
                username: new.username.clone(),
                full_name: new.full_name.clone(),
            })
            .await
            .map_err(|err| match err {
                ProfileStoreError::UsernameTaken { .. } => SignUpError::UsernameTaken,
                other => map_store_sign_up(other),
            })?;

        let session = match self.identity.sign_in_with_password(&new.credentials).await {
            Ok(issued) => {
                self.events.publish(&AuthEvent::SignedIn(issued.record.clone()));
                Some(issued.record)
            }
            Err(error) => {
                warn!(%error, user_id = %identity.id, "auto sign-in after signup failed");
                None
            }
        };

        Ok(SignUpOutcome { profile, session })
    }

    /// Password sign-in with saga repair: a missing profile is provisioned
    /// from derived values instead of being reported as corruption.
    pub async fn sign_in(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<(Profile, SessionRecord), SignInError> {
        let issued = self
            .identity
            .sign_in_with_password(credentials)
            .await
            .map_err(|err| match err {
                IdentityBackendError::Rejected { .. } => SignInError::InvalidCredentials,
                IdentityBackendError::Unavailable { message }
                | IdentityBackendError::Protocol { message } => {
                    SignInError::Unavailable { message }
                }
            })?;

        let profile = match self
            .profiles
            .find_by_id(issued.identity.id)
            .await
            .map_err(map_store_sign_in)?
        {
            Some(profile) => profile,
            None => self.repair_missing_profile(&issued).await?,
        };

        self.events
            .publish(&AuthEvent::SignedIn(issued.record.clone()));
        Ok((profile, issued.record))
    }

    /// OAuth callback completion: code exchange, first-login provisioning,
    /// best-effort avatar back-fill.
    pub async fn complete_oauth(
        &self,
        code: &str,
    ) -> Result<(Profile, SessionRecord), OAuthCallbackError> {
        let issued = self
            .identity
            .exchange_code_for_session(code)
            .await
            .map_err(|err| match err {
                IdentityBackendError::Rejected { .. } => OAuthCallbackError::InvalidCode,
                IdentityBackendError::Unavailable { message }
                | IdentityBackendError::Protocol { message } => {
                    OAuthCallbackError::Unavailable { message }
                }
            })?;
        let identity = &issued.identity;

        let existing = self
            .profiles
            .find_by_id(identity.id)
            .await
            .map_err(map_store_oauth)?;

        let profile = match existing {
            // Re-invocation after a completed first login is a no-op.
            Some(profile) => profile,
            None => {
                let profile = self
                    .provision(&NewProfile {
                        id: identity.id,
                        email: identity.email.clone(),
                        username: derive_username(identity),
                        full_name: identity
                            .metadata
                            .full_name()
                            .unwrap_or("User")
                            .to_owned(),
                    })
                    .await
                    .map_err(map_store_oauth)?;
                self.backfill_avatar(identity, &profile).await
            }
        };

        self.events
            .publish(&AuthEvent::SignedIn(issued.record.clone()));
        Ok((profile, issued.record))
    }

    /// Sign out: revoke server-side, then publish the local event regardless.
    ///
    /// Sign-out must always take effect for the caller even when the backend
    /// revocation call errors, so failures are logged, not returned.
    pub async fn sign_out(&self, record: &SessionRecord) {
        if let Err(error) = self.identity.sign_out(record).await {
            warn!(%error, user_id = %record.user_id, "server-side sign-out failed");
        }
        self.events.publish(&AuthEvent::SignedOut);
    }

    /// Availability pre-check used by the signup form.
    pub async fn username_available(
        &self,
        username: &Username,
    ) -> Result<bool, ProfileStoreError> {
        Ok(self
            .profiles
            .find_by_username(username, false)
            .await?
            .is_none())
    }

    /// Atomic insert with idempotent resolution of the already-provisioned
    /// conflict. Username conflicts propagate to the caller.
    async fn provision(&self, new: &NewProfile) -> Result<Profile, ProfileStoreError> {
        match self.profiles.insert_atomic(new).await {
            Ok(profile) => Ok(profile),
            Err(ProfileStoreError::AlreadyProvisioned) => self
                .profiles
                .find_by_id(new.id)
                .await?
                .ok_or_else(|| ProfileStoreError::query("provisioned profile not readable")),
            Err(other) => Err(other),
        }
    }

    async fn repair_missing_profile(
        &self,
        issued: &IssuedSession,
    ) -> Result<Profile, SignInError> {
        let identity = &issued.identity;
        info!(user_id = %identity.id, "identity has no profile, re-running provisioning");
        self.provision(&NewProfile {
            id: identity.id,
            email: identity.email.clone(),
            username: derive_username(identity),
            full_name: identity.metadata.full_name().unwrap_or("User").to_owned(),
        })
        .await
        .map_err(|err| match err {
            ProfileStoreError::Connection { message } => SignInError::Unavailable { message },
            other => SignInError::Provisioning {
                message: other.to_string(),
            },
        })
    }

    /// Second, best-effort step: copy the provider avatar onto the fresh
    /// profile. Failure must not fail provisioning as a whole.
    async fn backfill_avatar(&self, identity: &Identity, profile: &Profile) -> Profile {
        let Some(avatar_url) = identity.metadata.avatar_url() else {
            return profile.clone();
        };
        if profile.avatar_url.is_some() {
            return profile.clone();
        }
        match self
            .profiles
            .update(profile.id, &ProfileChanges::avatar(avatar_url))
            .await
        {
            Ok(updated) => updated,
            Err(error) => {
                warn!(%error, user_id = %profile.id, "avatar back-fill failed");
                profile.clone()
            }
        }
    }
}

/// Username derivation for identities that did not choose one, in priority
/// order: provider handle, preferred username, email local part, id fragment.
fn derive_username(identity: &Identity) -> Username {
    Username::derive(
        [
            identity.metadata.user_name(),
            identity.metadata.preferred_username(),
            identity.email_local_part(),
        ],
        &identity.id,
    )
}

fn sign_up_metadata(new: &NewSignUp) -> ProviderMetadata {
    let mut map = Map::new();
    map.insert(
        "full_name".to_owned(),
        Value::String(new.full_name.clone()),
    );
    map.insert(
        "username".to_owned(),
        Value::String(new.username.as_ref().to_owned()),
    );
    ProviderMetadata::new(map)
}

fn map_identity_sign_up(err: IdentityBackendError) -> SignUpError {
    match err {
        IdentityBackendError::Unavailable { message } => SignUpError::Unavailable { message },
        IdentityBackendError::Rejected { message }
        | IdentityBackendError::Protocol { message } => SignUpError::Identity { message },
    }
}

fn map_store_sign_up(err: ProfileStoreError) -> SignUpError {
    match err {
        ProfileStoreError::Connection { message } => SignUpError::Unavailable { message },
        other => SignUpError::Provisioning {
            message: other.to_string(),
        },
    }
}

fn map_store_sign_in(err: ProfileStoreError) -> SignInError {
    match err {
        ProfileStoreError::Connection { message } => SignInError::Unavailable { message },
        other => SignInError::Provisioning {
            message: other.to_string(),
        },
    }
}

fn map_store_oauth(err: ProfileStoreError) -> OAuthCallbackError {
    match err {
        ProfileStoreError::Connection { message } => OAuthCallbackError::Unavailable { message },
        other => OAuthCallbackError::Provisioning {
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for the provisioning saga.
    use super::*;
    use crate::domain::ports::{FixtureIdentityBackend, FixtureProfileStore};
    use crate::domain::Theme;
    use async_trait::async_trait;
    use serde_json::json;
    use uuid::Uuid;

    fn metadata(value: Value) -> ProviderMetadata {
        match value {
            Value::Object(map) => ProviderMetadata::new(map),
            other => panic!("expected object, got {other}"),
        }
    }

    fn sign_up_request(email: &str, username: &str) -> NewSignUp {
        NewSignUp {
            credentials: LoginCredentials::try_from_parts(email, "password1")
                .expect("valid credentials"),
            username: Username::parse(username).expect("valid username"),
            full_name: "Test User".into(),
        }
    }

    fn provisioner(
        identity: Arc<FixtureIdentityBackend>,
        profiles: Arc<FixtureProfileStore>,
    ) -> (ProfileProvisioner, AuthEventHub) {
        let hub = AuthEventHub::new();
        (
            ProfileProvisioner::new(identity, profiles, hub.clone()),
            hub,
        )
    }

    #[tokio::test]
    async fn sign_up_creates_profile_and_signs_in() {
        let identity = Arc::new(FixtureIdentityBackend::new());
        let profiles = Arc::new(FixtureProfileStore::new());
        let (service, hub) = provisioner(identity.clone(), profiles.clone());
        let mut events = hub.subscribe();

        let outcome = service
            .sign_up(sign_up_request("a@x.com", "newuser1"))
            .await
            .expect("sign up succeeds");

        assert_eq!(outcome.profile.username.as_ref(), "newuser1");
        assert_eq!(outcome.profile.full_name, "Test User");
        assert!(outcome.profile.is_public);
        assert_eq!(outcome.profile.theme, Theme::Default);
        assert_eq!(
            Some(outcome.profile.id),
            identity.account_id("a@x.com"),
            "profile is keyed by the identity id"
        );
        assert!(outcome.session.is_some());
        assert!(matches!(events.try_recv(), Some(AuthEvent::SignedIn(_))));
    }

    #[tokio::test]
    async fn sign_up_rejects_taken_username_with_zero_extra_rows() {
        let identity = Arc::new(FixtureIdentityBackend::new());
        let profiles = Arc::new(FixtureProfileStore::new());
        let (service, _hub) = provisioner(identity, profiles.clone());

        service
            .sign_up(sign_up_request("a@x.com", "newuser1"))
            .await
            .expect("first sign up succeeds");
        let err = service
            .sign_up(sign_up_request("b@x.com", "newuser1"))
            .await
            .expect_err("same username conflicts");

        assert_eq!(err, SignUpError::UsernameTaken);
        assert_eq!(profiles.row_count(), 1);
    }

    /// Store whose availability pre-check always lies, so sign-up exercises
    /// the atomic insert's conflict path the way a concurrent race would.
    struct RacyStore(FixtureProfileStore);

    #[async_trait]
    impl ProfileStore for RacyStore {
        async fn insert_atomic(&self, new: &NewProfile) -> Result<Profile, ProfileStoreError> {
            self.0.insert_atomic(new).await
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, ProfileStoreError> {
            self.0.find_by_id(id).await
        }

        async fn find_by_username(
            &self,
            _username: &Username,
            _require_public: bool,
        ) -> Result<Option<Profile>, ProfileStoreError> {
            Ok(None)
        }

        async fn update(
            &self,
            id: Uuid,
            changes: &ProfileChanges,
        ) -> Result<Profile, ProfileStoreError> {
            self.0.update(id, changes).await
        }
    }

    #[tokio::test]
    async fn racing_sign_ups_for_one_username_produce_one_row() {
        let identity = Arc::new(FixtureIdentityBackend::new());
        let racy = Arc::new(RacyStore(FixtureProfileStore::new()));
        let (service, _hub) = provisioner_with(identity, racy.clone());

        let first = service.sign_up(sign_up_request("a@x.com", "newuser1")).await;
        let second = service.sign_up(sign_up_request("b@x.com", "newuser1")).await;

        assert!(first.is_ok(), "first racer wins: {first:?}");
        assert_eq!(
            second.expect_err("second racer conflicts"),
            SignUpError::UsernameTaken
        );
        assert_eq!(racy.0.row_count(), 1);
    }

    fn provisioner_with(
        identity: Arc<FixtureIdentityBackend>,
        profiles: Arc<dyn ProfileStore>,
    ) -> (ProfileProvisioner, AuthEventHub) {
        let hub = AuthEventHub::new();
        (
            ProfileProvisioner::new(identity, profiles, hub.clone()),
            hub,
        )
    }

    #[tokio::test]
    async fn concurrent_distinct_usernames_all_succeed() {
        let identity = Arc::new(FixtureIdentityBackend::new());
        let profiles = Arc::new(FixtureProfileStore::new());
        let (service, _hub) = provisioner(identity, profiles.clone());

        let (a, b, c) = tokio::join!(
            service.sign_up(sign_up_request("a@x.com", "user-a")),
            service.sign_up(sign_up_request("b@x.com", "user-b")),
            service.sign_up(sign_up_request("c@x.com", "user-c")),
        );

        a.expect("a succeeds");
        b.expect("b succeeds");
        c.expect("c succeeds");
        assert_eq!(profiles.row_count(), 3);
    }

    #[tokio::test]
    async fn sign_up_identity_failure_is_distinct_from_conflict() {
        let identity = Arc::new(
            FixtureIdentityBackend::new().with_account(
                "a@x.com",
                "pw",
                ProviderMetadata::default(),
            ),
        );
        let profiles = Arc::new(FixtureProfileStore::new());
        let (service, _hub) = provisioner(identity, profiles.clone());

        let err = service
            .sign_up(sign_up_request("a@x.com", "newuser1"))
            .await
            .expect_err("email already registered");
        assert!(matches!(err, SignUpError::Identity { .. }));
        assert_eq!(profiles.row_count(), 0);
    }

    /// Backend whose session issuance is down while registration still works,
    /// so sign-up exercises the degraded auto-login path.
    struct NoLoginBackend(FixtureIdentityBackend);

    #[async_trait]
    impl IdentityBackend for NoLoginBackend {
        async fn sign_up(
            &self,
            credentials: &LoginCredentials,
            metadata: &ProviderMetadata,
        ) -> Result<Identity, IdentityBackendError> {
            self.0.sign_up(credentials, metadata).await
        }

        async fn sign_in_with_password(
            &self,
            _credentials: &LoginCredentials,
        ) -> Result<IssuedSession, IdentityBackendError> {
            Err(IdentityBackendError::unavailable("token endpoint down"))
        }

        async fn oauth_authorize_url(
            &self,
            provider: crate::domain::ports::OAuthProvider,
            redirect_to: &str,
        ) -> Result<url::Url, IdentityBackendError> {
            self.0.oauth_authorize_url(provider, redirect_to).await
        }

        async fn exchange_code_for_session(
            &self,
            code: &str,
        ) -> Result<IssuedSession, IdentityBackendError> {
            self.0.exchange_code_for_session(code).await
        }

        async fn current_user(
            &self,
            record: &SessionRecord,
        ) -> Result<Option<crate::domain::ports::ResolvedSession>, IdentityBackendError> {
            self.0.current_user(record).await
        }

        async fn sign_out(&self, record: &SessionRecord) -> Result<(), IdentityBackendError> {
            self.0.sign_out(record).await
        }
    }

    #[tokio::test]
    async fn sign_up_survives_auto_login_failure() {
        let identity = Arc::new(NoLoginBackend(FixtureIdentityBackend::new()));
        let profiles = Arc::new(FixtureProfileStore::new());
        let hub = AuthEventHub::new();
        let service = ProfileProvisioner::new(identity, profiles.clone(), hub.clone());
        let mut events = hub.subscribe();

        let outcome = service
            .sign_up(sign_up_request("a@x.com", "newuser1"))
            .await
            .expect("account and profile still created");

        assert!(outcome.session.is_none());
        assert_eq!(profiles.row_count(), 1);
        assert!(events.try_recv().is_none(), "no session, no sign-in event");
    }

    #[tokio::test]
    async fn oauth_first_login_provisions_exactly_once() {
        let meta = metadata(json!({ "user_name": "octocat", "avatar_url": "" }));
        let identity = Arc::new(
            FixtureIdentityBackend::new()
                .with_oauth_code("code-1", "octo@x.com", meta.clone())
                .with_oauth_code("code-2", "octo@x.com", meta),
        );
        let profiles = Arc::new(FixtureProfileStore::new());
        let (service, _hub) = provisioner(identity, profiles.clone());

        let (profile, _session) = service
            .complete_oauth("code-1")
            .await
            .expect("first callback succeeds");
        assert_eq!(profile.username.as_ref(), "octocat");
        assert_eq!(profiles.row_count(), 1);

        let (again, _session) = service
            .complete_oauth("code-2")
            .await
            .expect("re-invocation is a no-op");
        assert_eq!(again.id, profile.id);
        assert_eq!(profiles.row_count(), 1);
    }

    #[tokio::test]
    async fn oauth_derives_username_from_email_local_part() {
        let identity = Arc::new(FixtureIdentityBackend::new().with_oauth_code(
            "code-1",
            "jane.doe@example.com",
            ProviderMetadata::default(),
        ));
        let profiles = Arc::new(FixtureProfileStore::new());
        let (service, _hub) = provisioner(identity, profiles);

        let (profile, _session) = service
            .complete_oauth("code-1")
            .await
            .expect("callback succeeds");
        assert_eq!(profile.username.as_ref(), "jane.doe");
        assert_eq!(profile.full_name, "User");
    }

    #[tokio::test]
    async fn oauth_backfills_avatar_best_effort() {
        let meta = metadata(json!({
            "user_name": "octocat",
            "full_name": "The Octocat",
            "avatar_url": "https://avatars.invalid/octocat.png",
        }));
        let identity =
            Arc::new(FixtureIdentityBackend::new().with_oauth_code("code-1", "octo@x.com", meta));
        let profiles = Arc::new(FixtureProfileStore::new());
        let (service, _hub) = provisioner(identity, profiles);

        let (profile, _session) = service
            .complete_oauth("code-1")
            .await
            .expect("callback succeeds");
        assert_eq!(
            profile.avatar_url.as_deref(),
            Some("https://avatars.invalid/octocat.png")
        );
        assert_eq!(profile.full_name, "The Octocat");
    }

    #[tokio::test]
    async fn oauth_derived_username_conflict_is_a_provisioning_failure() {
        let identity = Arc::new(FixtureIdentityBackend::new().with_oauth_code(
            "code-1",
            "jane.doe@example.com",
            ProviderMetadata::default(),
        ));
        let squatter = NewProfile {
            id: Uuid::new_v4(),
            email: "squatter@x.com".into(),
            username: Username::derive([Some("jane.doe")], &Uuid::new_v4()),
            full_name: "Squatter".into(),
        };
        let profiles = Arc::new(
            FixtureProfileStore::new().with_profile(FixtureProfileStore::profile_from_new(&squatter)),
        );
        let (service, _hub) = provisioner(identity, profiles.clone());

        let err = service
            .complete_oauth("code-1")
            .await
            .expect_err("derived username is taken");
        assert!(matches!(err, OAuthCallbackError::Provisioning { .. }));
        assert_eq!(profiles.row_count(), 1);
    }

    #[tokio::test]
    async fn oauth_invalid_code_is_not_an_outage() {
        let identity = Arc::new(FixtureIdentityBackend::new());
        let profiles = Arc::new(FixtureProfileStore::new());
        let (service, _hub) = provisioner(identity, profiles);

        let err = service
            .complete_oauth("nope")
            .await
            .expect_err("unknown code fails");
        assert_eq!(err, OAuthCallbackError::InvalidCode);
    }

    #[tokio::test]
    async fn sign_in_repairs_missing_profile() {
        let meta = metadata(json!({ "user_name": "octocat", "full_name": "The Octocat" }));
        let identity =
            Arc::new(FixtureIdentityBackend::new().with_account("octo@x.com", "pw", meta));
        let profiles = Arc::new(FixtureProfileStore::new());
        let (service, _hub) = provisioner(identity, profiles.clone());

        let creds = LoginCredentials::try_from_parts("octo@x.com", "pw").expect("valid creds");
        let (profile, _session) = service.sign_in(&creds).await.expect("sign in succeeds");

        assert_eq!(profile.username.as_ref(), "octocat");
        assert_eq!(profiles.row_count(), 1, "incomplete state was repaired");
    }

    #[tokio::test]
    async fn sign_in_rejects_bad_credentials() {
        let identity = Arc::new(FixtureIdentityBackend::new().with_account(
            "a@x.com",
            "pw",
            ProviderMetadata::default(),
        ));
        let profiles = Arc::new(FixtureProfileStore::new());
        let (service, _hub) = provisioner(identity, profiles);

        let creds = LoginCredentials::try_from_parts("a@x.com", "wrong").expect("valid shape");
        let err = service.sign_in(&creds).await.expect_err("must fail");
        assert_eq!(err, SignInError::InvalidCredentials);
    }

    #[tokio::test]
    async fn sign_out_publishes_even_when_backend_fails() {
        let identity = Arc::new(FixtureIdentityBackend::new());
        identity.set_outage(IdentityBackendError::unavailable("connection refused"));
        let profiles = Arc::new(FixtureProfileStore::new());
        let (service, hub) = provisioner(identity, profiles);
        let mut events = hub.subscribe();

        let record = SessionRecord {
            user_id: Uuid::new_v4(),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: chrono::Utc::now(),
        };
        service.sign_out(&record).await;
        assert_eq!(events.try_recv(), Some(AuthEvent::SignedOut));
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_unavailable() {
        let identity = Arc::new(FixtureIdentityBackend::new());
        let profiles = Arc::new(FixtureProfileStore::new());
        profiles.set_outage(ProfileStoreError::connection("database unreachable"));
        let (service, _hub) = provisioner(identity, profiles);

        let err = service
            .sign_up(sign_up_request("a@x.com", "newuser1"))
            .await
            .expect_err("store outage fails sign up");
        assert!(matches!(err, SignUpError::Unavailable { .. }));
    }
}
