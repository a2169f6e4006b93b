//! Client session context.
//!
//! Drives the signed-in snapshot a UI shell renders from: resolve the stored
//! session on startup, follow [`AuthEvent`]s afterwards, and never stay in
//! the loading state longer than the configured bound. Slow resolution
//! degrades to signed-out rather than blocking the page.
//!
//! A monotonically increasing generation stamps every resolution; an apply
//! from a superseded generation is discarded, so a sign-out issued while an
//! initialize is still in flight cannot be overwritten by the late result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::ports::{IdentityBackend, Navigator, ProfileStore, SessionStore};
use crate::domain::routes::{RouteClass, LANDING_PATH};
use crate::domain::{AuthEvent, AuthSubscription, Profile};

/// Immutable view of the authentication state at a point in time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthSnapshot {
    /// Profile of the signed-in user, absent when signed out or while the
    /// profile row has not been provisioned yet.
    pub profile: Option<Profile>,
    /// True only between startup and the first resolution.
    pub loading: bool,
    /// Resolution failure shown on protected pages.
    pub error: Option<String>,
}

impl AuthSnapshot {
    fn loading() -> Self {
        Self {
            profile: None,
            loading: true,
            error: None,
        }
    }
}

/// Tunables for [`SessionContext`].
#[derive(Debug, Clone)]
pub struct SessionContextConfig {
    /// Upper bound on initial session resolution.
    pub init_timeout: Duration,
}

impl Default for SessionContextConfig {
    fn default() -> Self {
        Self {
            init_timeout: Duration::from_secs(5),
        }
    }
}

enum Resolution {
    Ready(Option<Profile>),
    Failed(String),
}

/// Session state machine consumed by the rendering host.
pub struct SessionContext {
    sessions: Arc<dyn SessionStore>,
    identity: Arc<dyn IdentityBackend>,
    profiles: Arc<dyn ProfileStore>,
    navigator: Arc<dyn Navigator>,
    config: SessionContextConfig,
    generation: AtomicU64,
    state: Mutex<AuthSnapshot>,
}

impl SessionContext {
    /// Create a context over the given ports.
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        identity: Arc<dyn IdentityBackend>,
        profiles: Arc<dyn ProfileStore>,
        navigator: Arc<dyn Navigator>,
        config: SessionContextConfig,
    ) -> Self {
        Self {
            sessions,
            identity,
            profiles,
            navigator,
            config,
            generation: AtomicU64::new(0),
            state: Mutex::new(AuthSnapshot::loading()),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.lock().clone()
    }

    /// Resolve the stored session into the first snapshot.
    ///
    /// Resolution slower than the configured bound yields the signed-out
    /// snapshot; the page renders and a later event can still sign the user
    /// in.
    pub async fn initialize(&self) {
        let generation = self.begin_generation();
        *self.lock() = AuthSnapshot::loading();

        let resolution = match tokio::time::timeout(self.config.init_timeout, self.resolve()).await
        {
            Ok(resolution) => resolution,
            Err(_elapsed) => {
                warn!(
                    timeout = ?self.config.init_timeout,
                    "session resolution timed out, rendering signed out"
                );
                Resolution::Ready(None)
            }
        };
        self.apply(generation, resolution);
    }

    /// Re-run resolution after a failure.
    pub async fn retry(&self) {
        self.initialize().await;
    }

    /// End the session: revoke best-effort, then always clear locally and
    /// return to the landing page.
    pub async fn sign_out(&self) {
        if let Some(record) = self.sessions.load() {
            if let Err(error) = self.identity.sign_out(&record).await {
                warn!(%error, "server-side sign-out failed, clearing locally anyway");
            }
        }
        self.sessions.clear();
        let generation = self.begin_generation();
        self.apply(generation, Resolution::Ready(None));
        self.navigator.goto(LANDING_PATH);
    }

    /// Apply a single published [`AuthEvent`].
    pub async fn handle_event(&self, event: &AuthEvent) {
        match event {
            AuthEvent::SignedIn(record) => {
                self.sessions.store(record.clone());
                let generation = self.begin_generation();
                let resolution = self.load_profile(record.user_id).await;
                self.apply(generation, resolution);
            }
            AuthEvent::TokenRefreshed(record) => {
                self.sessions.store(record.clone());
                // A refresh can arrive after startup degraded to signed out
                // (timeout, outage); fetch the profile for the live session.
                let cached = self.lock().profile.is_some();
                if !cached {
                    let generation = self.begin_generation();
                    let resolution = self.load_profile(record.user_id).await;
                    self.apply(generation, resolution);
                }
            }
            AuthEvent::SignedOut => {
                self.sessions.clear();
                let generation = self.begin_generation();
                self.apply(generation, Resolution::Ready(None));
                if RouteClass::is_protected(&self.navigator.current_path()) {
                    self.navigator.goto(LANDING_PATH);
                }
            }
        }
    }

    /// Consume events until the hub is dropped. Hosts spawn this alongside
    /// the UI loop.
    pub async fn run_event_loop(&self, mut events: AuthSubscription) {
        while let Some(event) = events.recv().await {
            self.handle_event(&event).await;
        }
    }

    async fn resolve(&self) -> Resolution {
        let Some(record) = self.sessions.load() else {
            return Resolution::Ready(None);
        };

        match self.identity.current_user(&record).await {
            Ok(Some(resolved)) => {
                if let Some(rotated) = resolved.rotated {
                    debug!(user_id = %resolved.identity.id, "stored session rotated");
                    self.sessions.store(rotated);
                }
                self.load_profile(resolved.identity.id).await
            }
            Ok(None) => {
                // Stale or revoked cookie: expected, not an error.
                self.sessions.clear();
                Resolution::Ready(None)
            }
            Err(error) => Resolution::Failed(error.to_string()),
        }
    }

    async fn load_profile(&self, user_id: uuid::Uuid) -> Resolution {
        match self.profiles.find_by_id(user_id).await {
            Ok(profile) => {
                if profile.is_none() {
                    debug!(%user_id, "signed in without a profile row");
                }
                Resolution::Ready(profile)
            }
            Err(error) => Resolution::Failed(error.to_string()),
        }
    }

    fn begin_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Commit a resolution unless a newer generation has started since.
    fn apply(&self, generation: u64, resolution: Resolution) {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "discarding superseded session resolution");
            return;
        }
        let snapshot = match resolution {
            Resolution::Ready(profile) => AuthSnapshot {
                profile,
                loading: false,
                error: None,
            },
            // Failures only surface where the page cannot render without a
            // session; elsewhere the user sees the signed-out state.
            Resolution::Failed(message) => {
                if RouteClass::is_protected(&self.navigator.current_path()) {
                    AuthSnapshot {
                        profile: None,
                        loading: false,
                        error: Some(message),
                    }
                } else {
                    warn!(%message, "session resolution failed on public page");
                    AuthSnapshot {
                        profile: None,
                        loading: false,
                        error: None,
                    }
                }
            }
        };
        *self.lock() = snapshot;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AuthSnapshot> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
