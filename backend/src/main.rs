//! Backend entry-point: wires the session resolver, auth and profile
//! endpoints, and OpenAPI docs.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::cookie::Key;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

use folio_backend::domain::ports::{
    FixtureIdentityBackend, FixtureProfileStore, IdentityBackend, ProfileStore,
};
use folio_backend::inbound::http::state::HttpStatePorts;
use folio_backend::outbound::identity::HttpIdentityBackend;
use folio_backend::outbound::persistence::{DbPool, DieselProfileStore, PoolConfig};
use folio_backend::server::{ServerConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let key = load_session_key()?;
    let cookie_secure = env::var("SESSION_COOKIE_SECURE")
        .map(|v| v != "0")
        .unwrap_or(true);
    let bind_addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".into())
        .parse()
        .map_err(|e| std::io::Error::other(format!("invalid BIND_ADDR: {e}")))?;
    let site_url = env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:8080".into());

    let profiles = build_profile_store().await?;
    let identity = build_identity_backend()?;

    let config = ServerConfig::new(
        key,
        cookie_secure,
        bind_addr,
        site_url,
        HttpStatePorts { identity, profiles },
    );
    info!(addr = %config.bind_addr(), "starting server");
    create_server(config)?.await
}

fn load_session_key() -> std::io::Result<Key> {
    let key_path =
        env::var("SESSION_KEY_FILE").unwrap_or_else(|_| "/var/run/secrets/session_key".into());
    match std::fs::read(&key_path) {
        Ok(bytes) => Ok(Key::derive_from(&bytes)),
        Err(e) => {
            let allow_dev = env::var("SESSION_ALLOW_EPHEMERAL").ok().as_deref() == Some("1");
            if cfg!(debug_assertions) || allow_dev {
                warn!(path = %key_path, error = %e, "using temporary session key (dev only)");
                Ok(Key::generate())
            } else {
                Err(std::io::Error::other(format!(
                    "failed to read session key at {key_path}: {e}"
                )))
            }
        }
    }
}

/// Database-backed store when `DATABASE_URL` is set, fixture otherwise.
async fn build_profile_store() -> std::io::Result<Arc<dyn ProfileStore>> {
    match env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = DbPool::new(PoolConfig::new(database_url))
                .await
                .map_err(|e| std::io::Error::other(format!("database pool: {e}")))?;
            Ok(Arc::new(DieselProfileStore::new(pool)))
        }
        Err(_) => {
            warn!("DATABASE_URL not set, using in-memory profile store (dev only)");
            Ok(Arc::new(FixtureProfileStore::new()))
        }
    }
}

/// HTTP identity backend when `IDENTITY_BASE_URL` is set, fixture otherwise.
fn build_identity_backend() -> std::io::Result<Arc<dyn IdentityBackend>> {
    match env::var("IDENTITY_BASE_URL") {
        Ok(base_url) => {
            let base_url = Url::parse(&base_url)
                .map_err(|e| std::io::Error::other(format!("invalid IDENTITY_BASE_URL: {e}")))?;
            let timeout = env::var("IDENTITY_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map_or(Duration::from_secs(10), Duration::from_secs);
            let backend = HttpIdentityBackend::with_timeout(base_url, timeout)
                .map_err(|e| std::io::Error::other(format!("identity client: {e}")))?;
            Ok(Arc::new(backend))
        }
        Err(_) => {
            warn!("IDENTITY_BASE_URL not set, using in-memory identity backend (dev only)");
            Ok(Arc::new(FixtureIdentityBackend::new()))
        }
    }
}
