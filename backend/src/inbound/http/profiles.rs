//! Profile API handlers.
//!
//! ```text
//! GET   /api/v1/profiles/{username}   public portfolio lookup
//! GET   /api/v1/me                    owner's profile
//! PATCH /api/v1/me                    partial profile update
//! ```

use actix_web::{HttpResponse, get, patch, web};
use tracing::warn;

use crate::domain::ports::IdentityBackendError;
use crate::domain::{Error, Identity, Profile, ProfileChanges, Username};
use crate::inbound::http::ApiResult;
use crate::inbound::http::auth::map_store_error;
use crate::inbound::http::session::SessionCookie;
use crate::inbound::http::state::HttpState;

/// Resolve the cookie session to an identity for API calls.
///
/// The page-level resolver middleware only covers page routes; API handlers
/// authenticate here, with the same transparent rotation.
async fn require_identity(state: &HttpState, session: &SessionCookie) -> Result<Identity, Error> {
    let record = session.require_record()?;
    let resolved = state
        .identity
        .current_user(&record)
        .await
        .map_err(|err| match err {
            IdentityBackendError::Unavailable { message } => Error::service_unavailable(message),
            other => Error::internal(other.to_string()),
        })?
        .ok_or_else(|| {
            session.clear();
            Error::unauthorized("session expired")
        })?;
    if let Some(rotated) = resolved.rotated {
        if let Err(error) = session.persist(&rotated) {
            warn!(%error, "failed to persist rotated session");
        }
    }
    Ok(resolved.identity)
}

/// Fetch a public portfolio profile by username.
///
/// Hidden profiles are indistinguishable from missing ones.
#[utoipa::path(
    get,
    path = "/api/v1/profiles/{username}",
    responses(
        (status = 200, description = "Public profile", body = Profile),
        (status = 400, description = "Invalid username", body = Error),
        (status = 404, description = "No public profile with this username", body = Error),
        (status = 503, description = "Store unavailable", body = Error)
    ),
    params(
        ("username" = String, Path, description = "Profile username")
    ),
    tags = ["profiles"],
    operation_id = "getPublicProfile"
)]
#[get("/profiles/{username}")]
pub async fn get_public_profile(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<Profile>> {
    let username = Username::parse(path.into_inner())
        .map_err(|err| Error::invalid_request(err.to_string()))?;
    let profile = state
        .profiles
        .find_by_username(&username, true)
        .await
        .map_err(map_store_error)?
        .ok_or_else(|| Error::not_found("profile not found"))?;
    Ok(web::Json(profile))
}

/// Fetch the signed-in user's own profile.
///
/// `404 Not Found` here means the identity exists but provisioning has not
/// completed; the next sign-in repairs it.
#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Own profile", body = Profile),
        (status = 401, description = "No valid session", body = Error),
        (status = 404, description = "Profile not provisioned", body = Error),
        (status = 503, description = "Backend unavailable", body = Error)
    ),
    tags = ["profiles"],
    operation_id = "getOwnProfile"
)]
#[get("/me")]
pub async fn get_own_profile(
    state: web::Data<HttpState>,
    session: SessionCookie,
) -> ApiResult<web::Json<Profile>> {
    let identity = require_identity(&state, &session).await?;
    let profile = state
        .profiles
        .find_by_id(identity.id)
        .await
        .map_err(map_store_error)?
        .ok_or_else(|| Error::not_found("profile not provisioned yet"))?;
    Ok(web::Json(profile))
}

/// Apply a partial update to the signed-in user's profile.
#[utoipa::path(
    patch,
    path = "/api/v1/me",
    request_body = ProfileChanges,
    responses(
        (status = 200, description = "Updated profile", body = Profile),
        (status = 400, description = "Empty or invalid change set", body = Error),
        (status = 401, description = "No valid session", body = Error),
        (status = 404, description = "Profile not provisioned", body = Error),
        (status = 409, description = "Username taken", body = Error),
        (status = 503, description = "Backend unavailable", body = Error)
    ),
    tags = ["profiles"],
    operation_id = "updateOwnProfile"
)]
#[patch("/me")]
pub async fn update_own_profile(
    state: web::Data<HttpState>,
    session: SessionCookie,
    payload: web::Json<ProfileChanges>,
) -> ApiResult<HttpResponse> {
    let identity = require_identity(&state, &session).await?;
    let changes = payload.into_inner();
    if changes.is_empty() {
        return Err(Error::invalid_request("no fields to update"));
    }
    let profile = state
        .profiles
        .update(identity.id, &changes)
        .await
        .map_err(map_store_error)?;
    Ok(HttpResponse::Ok().json(profile))
}

#[cfg(test)]
mod tests {
    //! Coverage for profile lookup, visibility, and owner updates.
    use super::*;
    use crate::domain::ports::{FixtureIdentityBackend, FixtureProfileStore};
    use crate::inbound::http::auth::{SignUpRequest, sign_up};
    use crate::inbound::http::state::HttpStatePorts;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn test_app(
        state: HttpState,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(web::Data::new(state))
            .wrap(crate::inbound::http::test_utils::test_session_middleware())
            .service(
                web::scope("/api/v1")
                    .service(sign_up)
                    .service(get_public_profile)
                    .service(get_own_profile)
                    .service(update_own_profile),
            )
    }

    fn fixture_state() -> HttpState {
        HttpState::new(
            HttpStatePorts {
                identity: Arc::new(FixtureIdentityBackend::new()),
                profiles: Arc::new(FixtureProfileStore::new()),
            },
            "http://localhost:8080",
        )
    }

    /// Sign up through the API and return the session cookie.
    async fn signed_up_cookie<S>(
        app: &S,
        email: &str,
        username: &str,
    ) -> actix_web::cookie::Cookie<'static>
    where
        S: actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
    {
        let res = test::call_service(
            app,
            test::TestRequest::post()
                .uri("/api/v1/auth/signup")
                .set_json(SignUpRequest {
                    email: email.into(),
                    password: "password1".into(),
                    username: username.into(),
                    full_name: "Test User".into(),
                })
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        res.response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("session cookie set")
            .into_owned()
    }

    #[actix_web::test]
    async fn public_profile_is_readable_anonymously() {
        let app = test::init_service(test_app(fixture_state())).await;
        signed_up_cookie(&app, "a@x.com", "newuser1").await;

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/v1/profiles/newuser1")
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(
            body.get("username").and_then(Value::as_str),
            Some("newuser1")
        );
    }

    #[actix_web::test]
    async fn hidden_profile_reads_as_not_found() {
        let app = test::init_service(test_app(fixture_state())).await;
        let cookie = signed_up_cookie(&app, "a@x.com", "newuser1").await;

        let res = test::call_service(
            &app,
            test::TestRequest::patch()
                .uri("/api/v1/me")
                .cookie(cookie)
                .set_json(json!({ "isPublic": false }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/v1/profiles/newuser1")
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn own_profile_requires_a_session() {
        let app = test::init_service(test_app(fixture_state())).await;
        let res =
            test::call_service(&app, test::TestRequest::get().uri("/api/v1/me").to_request())
                .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn owner_reads_and_updates_their_profile() {
        let app = test::init_service(test_app(fixture_state())).await;
        let cookie = signed_up_cookie(&app, "a@x.com", "newuser1").await;

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/v1/me")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = test::call_service(
            &app,
            test::TestRequest::patch()
                .uri("/api/v1/me")
                .cookie(cookie)
                .set_json(json!({ "bio": "Hello", "theme": "dark" }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body.get("bio").and_then(Value::as_str), Some("Hello"));
        assert_eq!(body.get("theme").and_then(Value::as_str), Some("dark"));
    }

    #[actix_web::test]
    async fn empty_update_is_rejected() {
        let app = test::init_service(test_app(fixture_state())).await;
        let cookie = signed_up_cookie(&app, "a@x.com", "newuser1").await;

        let res = test::call_service(
            &app,
            test::TestRequest::patch()
                .uri("/api/v1/me")
                .cookie(cookie)
                .set_json(json!({}))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn username_change_collision_is_a_conflict() {
        let app = test::init_service(test_app(fixture_state())).await;
        signed_up_cookie(&app, "a@x.com", "first-user").await;
        let cookie = signed_up_cookie(&app, "b@x.com", "second-user").await;

        let res = test::call_service(
            &app,
            test::TestRequest::patch()
                .uri("/api/v1/me")
                .cookie(cookie)
                .set_json(json!({ "username": "first-user" }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }
}
