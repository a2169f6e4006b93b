//! OpenAPI documentation configuration.
//!
//! Defines the [`ApiDoc`] struct which generates the OpenAPI specification
//! for the REST API: the auth endpoints, the profile endpoints, the health
//! probe, and the session cookie security scheme. Swagger UI serves the
//! document in debug builds.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::domain::{Error, ErrorCode, Profile, ProfileChanges, Theme};
use crate::inbound::http::auth::{
    AuthResponse, AvailabilityResponse, LoginRequest, SignUpRequest,
};
use crate::inbound::http::health::HealthResponse;

/// Enrich the generated document with the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Session cookie issued by POST /api/v1/auth/login or signup.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
/// Swagger UI is enabled in debug builds only and used by tooling.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Folio backend API",
        description = "Session, provisioning, and profile interface for the folio portfolio platform."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("SessionCookie" = [])),
    paths(
        crate::inbound::http::auth::sign_up,
        crate::inbound::http::auth::login,
        crate::inbound::http::auth::logout,
        crate::inbound::http::auth::oauth_start,
        crate::inbound::http::auth::oauth_callback,
        crate::inbound::http::auth::username_availability,
        crate::inbound::http::profiles::get_public_profile,
        crate::inbound::http::profiles::get_own_profile,
        crate::inbound::http::profiles::update_own_profile,
        crate::inbound::http::health::healthz,
    ),
    components(schemas(
        Error,
        ErrorCode,
        Profile,
        ProfileChanges,
        Theme,
        SignUpRequest,
        LoginRequest,
        AuthResponse,
        AvailabilityResponse,
        HealthResponse,
    )),
    tags(
        (name = "auth", description = "Sign-up, sign-in, OAuth, and session lifecycle"),
        (name = "profiles", description = "Public and owner-facing profile operations"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
