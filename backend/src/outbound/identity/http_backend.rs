//! Reqwest-backed identity service adapter.
//!
//! This adapter owns transport details only: request serialisation, timeout
//! and HTTP error mapping, and JSON decoding into domain identities and
//! session records. Token refresh is performed here so callers see a single
//! `current_user` call that either resolves or reports "no session".

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode, Url};
use serde_json::json;
use tracing::debug;

use super::dto::{ErrorBodyDto, TokenDto, UserDto};
use crate::domain::ports::{
    IdentityBackend, IdentityBackendError, IssuedSession, OAuthProvider, ResolvedSession,
};
use crate::domain::{Identity, LoginCredentials, ProviderMetadata, SessionRecord};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity adapter speaking the service's JSON API over HTTPS.
pub struct HttpIdentityBackend {
    client: Client,
    base_url: Url,
}

impl HttpIdentityBackend {
    /// Build an adapter with the default request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base_url: Url) -> Result<Self, reqwest::Error> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Build an adapter with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn with_timeout(base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, IdentityBackendError> {
        self.base_url
            .join(path)
            .map_err(|err| IdentityBackendError::protocol(format!("endpoint {path}: {err}")))
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<IssuedSession, IdentityBackendError> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, bytes.as_ref()));
        }

        let token: TokenDto = serde_json::from_slice(bytes.as_ref())
            .map_err(|err| IdentityBackendError::protocol(format!("token response: {err}")))?;
        Ok(token.into_issued_session(Utc::now()))
    }

    async fn refresh(
        &self,
        record: &SessionRecord,
    ) -> Result<Option<ResolvedSession>, IdentityBackendError> {
        let refreshed = self
            .token_grant(
                "refresh_token",
                json!({ "refresh_token": record.refresh_token }),
            )
            .await;
        match refreshed {
            Ok(issued) => Ok(Some(ResolvedSession {
                identity: issued.identity,
                rotated: Some(issued.record),
            })),
            // A refused refresh is the normal fate of a stale cookie.
            Err(IdentityBackendError::Rejected { message }) => {
                debug!(%message, "refresh token rejected");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn fetch_user(&self, access_token: &str) -> Result<UserDto, IdentityBackendError> {
        let response = self
            .client
            .get(self.endpoint("user")?)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, bytes.as_ref()));
        }

        serde_json::from_slice(bytes.as_ref())
            .map_err(|err| IdentityBackendError::protocol(format!("user response: {err}")))
    }
}

#[async_trait]
impl IdentityBackend for HttpIdentityBackend {
    async fn sign_up(
        &self,
        credentials: &LoginCredentials,
        metadata: &ProviderMetadata,
    ) -> Result<Identity, IdentityBackendError> {
        let response = self
            .client
            .post(self.endpoint("signup")?)
            .json(&json!({
                "email": credentials.email(),
                "password": credentials.password(),
                "data": metadata,
            }))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, bytes.as_ref()));
        }

        let user: UserDto = serde_json::from_slice(bytes.as_ref())
            .map_err(|err| IdentityBackendError::protocol(format!("signup response: {err}")))?;
        Ok(user.into())
    }

    async fn sign_in_with_password(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<IssuedSession, IdentityBackendError> {
        self.token_grant(
            "password",
            json!({
                "email": credentials.email(),
                "password": credentials.password(),
            }),
        )
        .await
    }

    async fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<Url, IdentityBackendError> {
        // Built locally; the browser follows it to the identity service.
        let mut url = self.endpoint("authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", redirect_to);
        Ok(url)
    }

    async fn exchange_code_for_session(
        &self,
        code: &str,
    ) -> Result<IssuedSession, IdentityBackendError> {
        self.token_grant("authorization_code", json!({ "auth_code": code }))
            .await
    }

    async fn current_user(
        &self,
        record: &SessionRecord,
    ) -> Result<Option<ResolvedSession>, IdentityBackendError> {
        if record.is_expired(Utc::now()) {
            return self.refresh(record).await;
        }

        match self.fetch_user(&record.access_token).await {
            Ok(user) => Ok(Some(ResolvedSession {
                identity: user.into(),
                rotated: None,
            })),
            // The access token can be revoked before it expires; the refresh
            // token decides whether the session survives.
            Err(IdentityBackendError::Rejected { message }) => {
                debug!(%message, "access token rejected, attempting refresh");
                self.refresh(record).await
            }
            Err(err) => Err(err),
        }
    }

    async fn sign_out(&self, record: &SessionRecord) -> Result<(), IdentityBackendError> {
        let response = self
            .client
            .post(self.endpoint("logout")?)
            .bearer_auth(&record.access_token)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let bytes = response.bytes().await.map_err(map_transport_error)?;
        Err(map_status_error(status, bytes.as_ref()))
    }
}

fn map_transport_error(error: reqwest::Error) -> IdentityBackendError {
    if error.is_timeout() {
        IdentityBackendError::unavailable(format!("request timed out: {error}"))
    } else {
        IdentityBackendError::unavailable(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> IdentityBackendError {
    let message = serde_json::from_slice::<ErrorBodyDto>(body)
        .ok()
        .and_then(ErrorBodyDto::into_message)
        .unwrap_or_else(|| body_preview(body));
    let message = if message.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {message}", status.as_u16())
    };

    if status.is_client_error() {
        IdentityBackendError::rejected(message)
    } else {
        IdentityBackendError::unavailable(message)
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for non-network mapping helpers.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::bad_request(StatusCode::BAD_REQUEST, true)]
    #[case::unauthorized(StatusCode::UNAUTHORIZED, true)]
    #[case::unprocessable(StatusCode::UNPROCESSABLE_ENTITY, true)]
    #[case::server_error(StatusCode::INTERNAL_SERVER_ERROR, false)]
    #[case::bad_gateway(StatusCode::BAD_GATEWAY, false)]
    fn maps_statuses_by_class(#[case] status: StatusCode, #[case] rejected: bool) {
        let error = map_status_error(status, b"{\"msg\":\"nope\"}");
        if rejected {
            assert!(
                matches!(error, IdentityBackendError::Rejected { .. }),
                "client statuses should map to Rejected"
            );
        } else {
            assert!(
                matches!(error, IdentityBackendError::Unavailable { .. }),
                "server statuses should map to Unavailable"
            );
        }
    }

    #[test]
    fn status_errors_carry_the_service_message() {
        let error = map_status_error(
            StatusCode::BAD_REQUEST,
            b"{\"error_description\":\"Invalid login credentials\"}",
        );
        assert!(error.to_string().contains("Invalid login credentials"));
        assert!(error.to_string().contains("400"));
    }

    #[test]
    fn unparseable_error_bodies_fall_back_to_a_preview() {
        let error = map_status_error(StatusCode::BAD_GATEWAY, b"<html>upstream down</html>");
        assert!(error.to_string().contains("upstream down"));
    }

    #[test]
    fn empty_error_bodies_still_name_the_status() {
        let error = map_status_error(StatusCode::SERVICE_UNAVAILABLE, b"");
        assert_eq!(
            error,
            IdentityBackendError::unavailable("status 503")
        );
    }

    #[test]
    fn long_bodies_are_truncated_in_previews() {
        let body = "x".repeat(500);
        let preview = body_preview(body.as_bytes());
        assert!(preview.ends_with("..."));
        assert!(preview.chars().count() <= 163);
    }

    #[tokio::test]
    async fn authorize_url_carries_provider_and_redirect() {
        let backend = HttpIdentityBackend::new(
            Url::parse("https://identity.example.com/auth/v1/").expect("valid base url"),
        )
        .expect("client builds");

        let url = backend
            .oauth_authorize_url(OAuthProvider::Github, "https://folio.example.com/auth/callback")
            .await
            .expect("authorize url builds");

        assert!(url.path().ends_with("/authorize"));
        assert!(url
            .query_pairs()
            .any(|(key, value)| key == "provider" && value == "github"));
        assert!(url
            .query_pairs()
            .any(|(key, value)| key == "redirect_to"
                && value == "https://folio.example.com/auth/callback"));
    }
}
