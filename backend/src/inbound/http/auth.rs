//! Authentication API handlers.
//!
//! ```text
//! POST /api/v1/auth/signup               {"email","password","username","fullName"}
//! POST /api/v1/auth/login                {"email","password"}
//! POST /api/v1/auth/logout
//! GET  /api/v1/auth/oauth/{provider}     start an OAuth sign-in
//! GET  /api/v1/auth/username-availability?username=ada
//! GET  /auth/callback?code=...&next=/dashboard
//! ```
//!
//! The callback endpoint is page-level rather than under `/api/v1`: the
//! provider sends the browser there directly, so failures redirect to an
//! error page instead of returning JSON.

use actix_web::{HttpResponse, get, http::header, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use url::Url;

use crate::domain::ports::{IdentityBackendError, OAuthProvider, ProfileStoreError};
use crate::domain::provisioning::{OAuthCallbackError, SignInError, SignUpError};
use crate::domain::routes::DASHBOARD_PREFIX;
use crate::domain::{
    Error, LoginCredentials, LoginValidationError, NewSignUp, Profile, Username,
    UsernameValidationError,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionCookie;
use crate::inbound::http::state::HttpState;

/// Where failed OAuth callbacks send the browser.
pub const AUTH_CODE_ERROR_PATH: &str = "/auth/auth-code-error";

/// Sign-up request body.
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    pub full_name: String,
}

/// Login request body.
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for successful sign-up and login.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub profile: Profile,
    /// False when the account exists but no session could be issued; the
    /// caller should send the user to the login page.
    pub session_established: bool,
}

/// Username availability answer.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub username: String,
    pub available: bool,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub next: Option<String>,
}

fn map_login_validation_error(err: LoginValidationError) -> Error {
    match err {
        LoginValidationError::InvalidEmail => Error::invalid_request(
            "email must be a valid address",
        )
        .with_details(json!({ "field": "email", "code": "invalid_email" })),
        LoginValidationError::EmptyPassword => Error::invalid_request(
            "password must not be empty",
        )
        .with_details(json!({ "field": "password", "code": "empty_password" })),
    }
}

fn map_username_validation_error(err: UsernameValidationError) -> Error {
    Error::invalid_request(err.to_string())
        .with_details(json!({ "field": "username", "code": "invalid_username" }))
}

fn map_sign_up_error(err: SignUpError) -> Error {
    match err {
        SignUpError::UsernameTaken => Error::conflict("Username is already taken")
            .with_details(json!({ "field": "username", "code": "username_taken" })),
        SignUpError::Identity { message } => Error::invalid_request(message),
        SignUpError::Provisioning { message } => {
            Error::internal(format!("profile provisioning failed: {message}"))
        }
        SignUpError::Unavailable { message } => Error::service_unavailable(message),
    }
}

fn map_sign_in_error(err: SignInError) -> Error {
    match err {
        SignInError::InvalidCredentials => Error::unauthorized("invalid login credentials"),
        SignInError::Provisioning { message } => {
            Error::internal(format!("profile repair failed: {message}"))
        }
        SignInError::Unavailable { message } => Error::service_unavailable(message),
    }
}

pub(crate) fn map_store_error(err: ProfileStoreError) -> Error {
    match err {
        ProfileStoreError::Connection { message } => Error::service_unavailable(message),
        ProfileStoreError::UsernameTaken { .. } => Error::conflict("Username is already taken")
            .with_details(json!({ "field": "username", "code": "username_taken" })),
        ProfileStoreError::NotFound => Error::not_found("profile not found"),
        other => Error::internal(other.to_string()),
    }
}

fn map_backend_error(err: IdentityBackendError) -> Error {
    match err {
        IdentityBackendError::Unavailable { message } => Error::service_unavailable(message),
        IdentityBackendError::Rejected { message } => Error::invalid_request(message),
        IdentityBackendError::Protocol { message } => {
            Error::internal(format!("identity backend protocol error: {message}"))
        }
    }
}

/// Register an account, provision its profile, and sign the caller in.
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid request", body = Error),
        (status = 409, description = "Username taken", body = Error),
        (status = 503, description = "Backend unavailable", body = Error)
    ),
    tags = ["auth"],
    operation_id = "signUp"
)]
#[post("/auth/signup")]
pub async fn sign_up(
    state: web::Data<HttpState>,
    session: SessionCookie,
    payload: web::Json<SignUpRequest>,
) -> ApiResult<HttpResponse> {
    let payload = payload.into_inner();
    let credentials = LoginCredentials::try_from_parts(&payload.email, &payload.password)
        .map_err(map_login_validation_error)?;
    let username = Username::parse(payload.username).map_err(map_username_validation_error)?;

    let outcome = state
        .provisioner
        .sign_up(NewSignUp {
            credentials,
            username,
            full_name: payload.full_name,
        })
        .await
        .map_err(map_sign_up_error)?;

    let session_established = match &outcome.session {
        Some(record) => {
            session.persist(record)?;
            true
        }
        None => false,
    };
    info!(user_id = %outcome.profile.id, session_established, "account created");
    Ok(HttpResponse::Created().json(AuthResponse {
        profile: outcome.profile,
        session_established,
    }))
}

/// Authenticate with email and password and establish a session.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login success", body = AuthResponse,
            headers(("Set-Cookie" = String, description = "Session cookie"))),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "Invalid credentials", body = Error),
        (status = 503, description = "Backend unavailable", body = Error)
    ),
    tags = ["auth"],
    operation_id = "login"
)]
#[post("/auth/login")]
pub async fn login(
    state: web::Data<HttpState>,
    session: SessionCookie,
    payload: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let credentials = LoginCredentials::try_from_parts(&payload.email, &payload.password)
        .map_err(map_login_validation_error)?;

    let (profile, record) = state
        .provisioner
        .sign_in(&credentials)
        .await
        .map_err(map_sign_in_error)?;
    session.persist(&record)?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        profile,
        session_established: true,
    }))
}

/// End the session.
///
/// Always clears the cookie, even when server-side revocation fails.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 204, description = "Signed out")
    ),
    tags = ["auth"],
    operation_id = "logout"
)]
#[post("/auth/logout")]
pub async fn logout(state: web::Data<HttpState>, session: SessionCookie) -> HttpResponse {
    if let Some(record) = session.record() {
        state.provisioner.sign_out(&record).await;
    }
    session.clear();
    HttpResponse::NoContent().finish()
}

/// Start an OAuth sign-in by redirecting to the provider's authorize URL.
#[utoipa::path(
    get,
    path = "/api/v1/auth/oauth/{provider}",
    responses(
        (status = 307, description = "Redirect to the provider"),
        (status = 400, description = "Unknown provider", body = Error),
        (status = 503, description = "Backend unavailable", body = Error)
    ),
    params(
        ("provider" = String, Path, description = "OAuth provider (github or google)")
    ),
    tags = ["auth"],
    operation_id = "oauthStart"
)]
#[get("/auth/oauth/{provider}")]
pub async fn oauth_start(
    state: web::Data<HttpState>,
    provider: web::Path<OAuthProvider>,
) -> ApiResult<HttpResponse> {
    let redirect_to = callback_url(&state.site_url)?;
    let authorize = state
        .identity
        .oauth_authorize_url(provider.into_inner(), redirect_to.as_str())
        .await
        .map_err(map_backend_error)?;

    Ok(HttpResponse::TemporaryRedirect()
        .insert_header((header::LOCATION, authorize.to_string()))
        .finish())
}

fn callback_url(site_url: &str) -> Result<Url, Error> {
    Url::parse(site_url)
        .and_then(|base| base.join("/auth/callback"))
        .map_err(|error| Error::internal(format!("invalid site url: {error}")))
}

/// Keep `next` targets on this origin; anything else lands on the dashboard.
fn sanitize_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => DASHBOARD_PREFIX,
    }
}

/// Complete an OAuth sign-in: exchange the code, provision on first login,
/// and redirect into the app.
#[utoipa::path(
    get,
    path = "/auth/callback",
    responses(
        (status = 307, description = "Redirect into the app, or to the error page on failure")
    ),
    params(
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("next" = Option<String>, Query, description = "Post-login path on this origin")
    ),
    tags = ["auth"],
    operation_id = "oauthCallback"
)]
#[get("/auth/callback")]
pub async fn oauth_callback(
    state: web::Data<HttpState>,
    session: SessionCookie,
    query: web::Query<CallbackQuery>,
) -> HttpResponse {
    let next = sanitize_next(query.next.as_deref()).to_owned();
    let Some(code) = query.code.as_deref() else {
        warn!("oauth callback without a code");
        return redirect_to(AUTH_CODE_ERROR_PATH);
    };

    match state.provisioner.complete_oauth(code).await {
        Ok((profile, record)) => {
            if let Err(error) = session.persist(&record) {
                warn!(%error, "failed to persist session after oauth callback");
                return redirect_to(AUTH_CODE_ERROR_PATH);
            }
            info!(user_id = %profile.id, "oauth sign-in completed");
            redirect_to(&next)
        }
        Err(OAuthCallbackError::InvalidCode) => {
            warn!("oauth callback with an invalid or expired code");
            redirect_to(AUTH_CODE_ERROR_PATH)
        }
        Err(error) => {
            warn!(%error, "oauth callback failed");
            redirect_to(AUTH_CODE_ERROR_PATH)
        }
    }
}

fn redirect_to(location: &str) -> HttpResponse {
    HttpResponse::TemporaryRedirect()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// Answer the signup form's username pre-check.
#[utoipa::path(
    get,
    path = "/api/v1/auth/username-availability",
    responses(
        (status = 200, description = "Availability answer", body = AvailabilityResponse),
        (status = 400, description = "Invalid username", body = Error),
        (status = 503, description = "Store unavailable", body = Error)
    ),
    params(
        ("username" = String, Query, description = "Candidate username")
    ),
    tags = ["auth"],
    operation_id = "usernameAvailability"
)]
#[get("/auth/username-availability")]
pub async fn username_availability(
    state: web::Data<HttpState>,
    query: web::Query<AvailabilityQuery>,
) -> ApiResult<web::Json<AvailabilityResponse>> {
    let username =
        Username::parse(query.username.clone()).map_err(map_username_validation_error)?;
    let available = state
        .provisioner
        .username_available(&username)
        .await
        .map_err(map_store_error)?;
    Ok(web::Json(AvailabilityResponse {
        username: username.to_string(),
        available,
    }))
}
