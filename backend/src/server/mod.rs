//! Server construction and middleware wiring.
//!
//! Middleware executes outermost first: `Trace` stamps the request, the
//! session middleware decodes the cookie, and the session resolver classifies
//! the route and admits or redirects. Handlers therefore always run with a
//! trace id in scope and, on protected routes, a resolved user in request
//! extensions.

mod config;

pub use config::ServerConfig;

use actix_session::{
    SessionMiddleware,
    config::{CookieContentSecurity, PersistentSession},
    storage::CookieSessionStore,
};
use actix_web::body::{BoxBody, EitherBody};
use actix_web::cookie::{Key, SameSite};
use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};

#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[cfg(debug_assertions)]
use crate::doc::ApiDoc;
use crate::inbound::http::SessionResolver;
use crate::inbound::http::auth::{
    login, logout, oauth_callback, oauth_start, sign_up, username_availability,
};
use crate::inbound::http::health::healthz;
use crate::inbound::http::profiles::{get_own_profile, get_public_profile, update_own_profile};
use crate::inbound::http::state::HttpState;
use crate::middleware::trace::Trace;

#[derive(Clone)]
struct AppDependencies {
    http_state: web::Data<HttpState>,
    resolver: SessionResolver,
    key: Key,
    cookie_secure: bool,
    same_site: SameSite,
}

fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<EitherBody<BoxBody>>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        http_state,
        resolver,
        key,
        cookie_secure,
        same_site,
    } = deps;

    // The cookie holds the session record for every surface (API, OAuth
    // callback, page-route resolution), so the session middleware wraps the
    // whole app rather than a single scope.
    let session = SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name("session".into())
        .cookie_path("/".into())
        .cookie_secure(cookie_secure)
        .cookie_http_only(true)
        .cookie_content_security(CookieContentSecurity::Private)
        .cookie_same_site(same_site)
        .session_lifecycle(
            PersistentSession::default().session_ttl(actix_web::cookie::time::Duration::days(7)),
        )
        .build();

    let api = web::scope("/api/v1")
        .service(sign_up)
        .service(login)
        .service(logout)
        .service(oauth_start)
        .service(username_availability)
        .service(get_own_profile)
        .service(update_own_profile)
        .service(get_public_profile);

    let app = App::new()
        .app_data(http_state)
        .wrap(resolver)
        .wrap(session)
        .wrap(Trace)
        .service(api)
        .service(oauth_callback)
        .service(healthz);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    #[cfg(not(debug_assertions))]
    let app = app;

    app
}

/// Construct an Actix HTTP server from the provided configuration.
///
/// # Errors
///
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(config: ServerConfig) -> std::io::Result<Server> {
    let ServerConfig {
        key,
        cookie_secure,
        same_site,
        bind_addr,
        site_url,
        ports,
    } = config;

    let http_state = web::Data::new(HttpState::new(ports, site_url));
    let resolver = SessionResolver::new(http_state.identity.clone());

    let server = HttpServer::new(move || {
        build_app(AppDependencies {
            http_state: http_state.clone(),
            resolver: resolver.clone(),
            key: key.clone(),
            cookie_secure,
            same_site,
        })
    })
    .bind(bind_addr)?
    .run();

    Ok(server)
}
