//! Driving port for the external identity/session service.
//!
//! The identity backend owns sign-up, session issuance, refresh, and
//! sign-out. This core consumes it; it never creates identities itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use url::Url;
use uuid::Uuid;

use crate::domain::{Identity, LoginCredentials, ProviderMetadata, SessionRecord};

/// Errors raised by identity backend adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityBackendError {
    /// The service could not be reached or is misconfigured.
    #[error("identity backend unavailable: {message}")]
    Unavailable { message: String },
    /// The backend refused the operation (bad credentials, invalid code,
    /// email already registered).
    #[error("identity backend rejected the request: {message}")]
    Rejected { message: String },
    /// The backend answered with something this core cannot interpret.
    #[error("identity backend protocol error: {message}")]
    Protocol { message: String },
}

impl IdentityBackendError {
    /// Create an [`IdentityBackendError::Unavailable`] error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create an [`IdentityBackendError::Rejected`] error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Create an [`IdentityBackendError::Protocol`] error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

/// OAuth providers accepted by the sign-in surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Github,
    Google,
}

impl OAuthProvider {
    /// Provider name as used in authorize URLs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Google => "google",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly issued session together with the identity it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedSession {
    pub identity: Identity,
    pub record: SessionRecord,
}

/// Outcome of validating a session with the backend.
///
/// `rotated` carries the replacement record when the backend refreshed an
/// expired session; callers must persist it so the cookie stays current.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSession {
    pub identity: Identity,
    pub rotated: Option<SessionRecord>,
}

/// Port consumed from the external identity service.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Register a new identity. Does not issue a session.
    async fn sign_up(
        &self,
        credentials: &LoginCredentials,
        metadata: &ProviderMetadata,
    ) -> Result<Identity, IdentityBackendError>;

    /// Authenticate with email and password, issuing a session.
    async fn sign_in_with_password(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<IssuedSession, IdentityBackendError>;

    /// Build the provider authorize URL the browser should be sent to.
    async fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<Url, IdentityBackendError>;

    /// Exchange an OAuth authorization code for a session.
    async fn exchange_code_for_session(
        &self,
        code: &str,
    ) -> Result<IssuedSession, IdentityBackendError>;

    /// Validate a session, refreshing it when expired.
    ///
    /// `Ok(None)` means "no valid session" — the expected state for stale or
    /// revoked cookies, never an error.
    async fn current_user(
        &self,
        record: &SessionRecord,
    ) -> Result<Option<ResolvedSession>, IdentityBackendError>;

    /// Revoke the session server-side.
    async fn sign_out(&self, record: &SessionRecord) -> Result<(), IdentityBackendError>;
}

#[derive(Clone)]
struct FixtureAccount {
    id: Uuid,
    password: Option<String>,
    metadata: ProviderMetadata,
}

#[derive(Default)]
struct FixtureState {
    accounts: HashMap<String, FixtureAccount>,
    sessions: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    codes: HashMap<String, String>,
    outage: Option<IdentityBackendError>,
}

/// In-memory identity backend used by tests and local development.
///
/// Sessions expire after an hour; [`IdentityBackend::current_user`] rotates
/// expired records through the stored refresh token, mirroring the real
/// adapter's transparent refresh.
#[derive(Default)]
pub struct FixtureIdentityBackend {
    state: Mutex<FixtureState>,
}

impl FixtureIdentityBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a password account.
    pub fn with_account(self, email: &str, password: &str, metadata: ProviderMetadata) -> Self {
        {
            let mut state = self.lock();
            state.accounts.insert(
                email.to_owned(),
                FixtureAccount {
                    id: Uuid::new_v4(),
                    password: Some(password.to_owned()),
                    metadata,
                },
            );
        }
        self
    }

    /// Seed an exchangeable OAuth code for a provider-backed account.
    pub fn with_oauth_code(self, code: &str, email: &str, metadata: ProviderMetadata) -> Self {
        {
            let mut state = self.lock();
            state.accounts.entry(email.to_owned()).or_insert_with(|| {
                FixtureAccount {
                    id: Uuid::new_v4(),
                    password: None,
                    metadata,
                }
            });
            state.codes.insert(code.to_owned(), email.to_owned());
        }
        self
    }

    /// Make every subsequent call fail with the given error.
    pub fn set_outage(&self, error: IdentityBackendError) {
        self.lock().outage = Some(error);
    }

    /// Clear a previously configured outage.
    pub fn clear_outage(&self) {
        self.lock().outage = None;
    }

    /// Identity id registered for an email, for test assertions.
    pub fn account_id(&self, email: &str) -> Option<Uuid> {
        self.lock().accounts.get(email).map(|account| account.id)
    }

    /// Number of live sessions, for test assertions.
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FixtureState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_outage(state: &FixtureState) -> Result<(), IdentityBackendError> {
        state.outage.clone().map_or(Ok(()), Err)
    }

    fn issue_locked(state: &mut FixtureState, email: &str) -> Option<IssuedSession> {
        let account = state.accounts.get(email)?.clone();
        let access_token = Uuid::new_v4().simple().to_string();
        let refresh_token = Uuid::new_v4().simple().to_string();
        state
            .sessions
            .insert(access_token.clone(), email.to_owned());
        state
            .refresh_tokens
            .insert(refresh_token.clone(), email.to_owned());
        Some(IssuedSession {
            identity: Identity {
                id: account.id,
                email: email.to_owned(),
                metadata: account.metadata,
            },
            record: SessionRecord {
                user_id: account.id,
                access_token,
                refresh_token,
                expires_at: Utc::now() + Duration::hours(1),
            },
        })
    }
}

#[async_trait]
impl IdentityBackend for FixtureIdentityBackend {
    async fn sign_up(
        &self,
        credentials: &LoginCredentials,
        metadata: &ProviderMetadata,
    ) -> Result<Identity, IdentityBackendError> {
        let mut state = self.lock();
        Self::check_outage(&state)?;
        if state.accounts.contains_key(credentials.email()) {
            return Err(IdentityBackendError::rejected("email already registered"));
        }
        let account = FixtureAccount {
            id: Uuid::new_v4(),
            password: Some(credentials.password().to_owned()),
            metadata: metadata.clone(),
        };
        let identity = Identity {
            id: account.id,
            email: credentials.email().to_owned(),
            metadata: metadata.clone(),
        };
        state
            .accounts
            .insert(credentials.email().to_owned(), account);
        Ok(identity)
    }

    async fn sign_in_with_password(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<IssuedSession, IdentityBackendError> {
        let mut state = self.lock();
        Self::check_outage(&state)?;
        let matches = state
            .accounts
            .get(credentials.email())
            .is_some_and(|account| account.password.as_deref() == Some(credentials.password()));
        if !matches {
            return Err(IdentityBackendError::rejected("invalid login credentials"));
        }
        Self::issue_locked(&mut state, credentials.email())
            .ok_or_else(|| IdentityBackendError::protocol("account vanished during issuance"))
    }

    async fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<Url, IdentityBackendError> {
        let state = self.lock();
        Self::check_outage(&state)?;
        Url::parse_with_params(
            "https://identity.fixture.invalid/authorize",
            &[("provider", provider.as_str()), ("redirect_to", redirect_to)],
        )
        .map_err(|err| IdentityBackendError::protocol(format!("authorize url: {err}")))
    }

    async fn exchange_code_for_session(
        &self,
        code: &str,
    ) -> Result<IssuedSession, IdentityBackendError> {
        let mut state = self.lock();
        Self::check_outage(&state)?;
        let Some(email) = state.codes.remove(code) else {
            return Err(IdentityBackendError::rejected("invalid authorization code"));
        };
        Self::issue_locked(&mut state, &email)
            .ok_or_else(|| IdentityBackendError::protocol("code referenced unknown account"))
    }

    async fn current_user(
        &self,
        record: &SessionRecord,
    ) -> Result<Option<ResolvedSession>, IdentityBackendError> {
        let mut state = self.lock();
        Self::check_outage(&state)?;

        if !record.is_expired(Utc::now()) {
            let Some(email) = state.sessions.get(&record.access_token).cloned() else {
                return Ok(None);
            };
            let Some(account) = state.accounts.get(&email).cloned() else {
                return Ok(None);
            };
            return Ok(Some(ResolvedSession {
                identity: Identity {
                    id: account.id,
                    email,
                    metadata: account.metadata,
                },
                rotated: None,
            }));
        }

        // Expired access token: rotate through the refresh token.
        let Some(email) = state.refresh_tokens.remove(&record.refresh_token) else {
            return Ok(None);
        };
        state.sessions.remove(&record.access_token);
        let Some(issued) = Self::issue_locked(&mut state, &email) else {
            return Ok(None);
        };
        Ok(Some(ResolvedSession {
            identity: issued.identity,
            rotated: Some(issued.record),
        }))
    }

    async fn sign_out(&self, record: &SessionRecord) -> Result<(), IdentityBackendError> {
        let mut state = self.lock();
        Self::check_outage(&state)?;
        state.sessions.remove(&record.access_token);
        state.refresh_tokens.remove(&record.refresh_token);
        Ok(())
    }
}
