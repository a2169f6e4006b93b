//! Edge session resolver.
//!
//! Runs on every page request before the handlers: resolves the cookie
//! session against the identity backend, rotates expired records, and
//! enforces route admission. Protected paths redirect anonymous visitors to
//! the login page; auth-only paths bounce signed-in users to the dashboard.
//!
//! When the backend cannot be reached the resolver fails open: the request
//! passes through unredirected and downstream data fetches surface their own
//! errors. A broken identity service must not take the public pages down
//! with it.

use std::future::{Ready, ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::http::header;
use actix_web::{FromRequest, HttpMessage, HttpRequest, HttpResponse};
use futures_util::future::LocalBoxFuture;
use tracing::{debug, warn};

use crate::domain::ports::IdentityBackend;
use crate::domain::routes::{DASHBOARD_PREFIX, LOGIN_PATH, RouteClass};
use crate::domain::{Error, Identity};
use crate::inbound::http::session::SessionCookie;

/// Identity attached to the request by the resolver.
///
/// Extracting it in a handler yields `401 Unauthorized` when the request did
/// not carry a valid session.
#[derive(Debug, Clone)]
pub struct ResolvedUser(pub Identity);

impl FromRequest for ResolvedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<ResolvedUser>()
                .cloned()
                .ok_or_else(|| Error::unauthorized("login required")),
        )
    }
}

/// What the resolver learned about the request's session.
enum Admission {
    Anonymous,
    Authenticated(Identity),
    /// Backend unreachable; session state unknown.
    Degraded,
}

/// Transform factory wiring [`SessionResolverMiddleware`] into the app.
#[derive(Clone)]
pub struct SessionResolver {
    identity: Arc<dyn IdentityBackend>,
}

impl SessionResolver {
    /// Create a resolver over the given identity backend.
    pub fn new(identity: Arc<dyn IdentityBackend>) -> Self {
        Self { identity }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionResolver
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Transform = SessionResolverMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionResolverMiddleware {
            service: Rc::new(service),
            identity: self.identity.clone(),
        }))
    }
}

/// Middleware service produced by [`SessionResolver`].
pub struct SessionResolverMiddleware<S> {
    service: Rc<S>,
    identity: Arc<dyn IdentityBackend>,
}

impl<S> SessionResolverMiddleware<S> {
    /// Resolve the cookie session, rotating and purging as needed.
    async fn admit(identity: &dyn IdentityBackend, cookie: &SessionCookie) -> Admission {
        let Some(record) = cookie.record() else {
            return Admission::Anonymous;
        };

        match identity.current_user(&record).await {
            Ok(Some(resolved)) => {
                if let Some(rotated) = resolved.rotated {
                    debug!(user_id = %resolved.identity.id, "session rotated at the edge");
                    if let Err(error) = cookie.persist(&rotated) {
                        warn!(%error, "failed to persist rotated session");
                    }
                }
                Admission::Authenticated(resolved.identity)
            }
            Ok(None) => {
                // Stale or revoked cookie: drop it so we stop asking.
                cookie.clear();
                Admission::Anonymous
            }
            Err(error) => {
                warn!(%error, "session resolution degraded, admitting without redirect");
                Admission::Degraded
            }
        }
    }
}

fn redirect<B>(req: ServiceRequest, location: &str) -> ServiceResponse<EitherBody<B>> {
    let (request, _payload) = req.into_parts();
    let response = HttpResponse::TemporaryRedirect()
        .insert_header((header::LOCATION, location))
        .finish()
        .map_into_right_body();
    ServiceResponse::new(request, response)
}

impl<S, B> Service<ServiceRequest> for SessionResolverMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let identity = Arc::clone(&self.identity);

        Box::pin(async move {
            let route = RouteClass::classify(req.path());
            let cookie = SessionCookie::from_service_request(&req);
            let admission = Self::admit(identity.as_ref(), &cookie).await;

            match (route, admission) {
                (RouteClass::Protected, Admission::Anonymous) => Ok(redirect(req, LOGIN_PATH)),
                (RouteClass::AuthOnly, Admission::Authenticated(_)) => {
                    Ok(redirect(req, DASHBOARD_PREFIX))
                }
                (_, Admission::Authenticated(identity)) => {
                    req.extensions_mut().insert(ResolvedUser(identity));
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                (_, Admission::Anonymous | Admission::Degraded) => {
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    //! Admission matrix and degradation coverage for the resolver.
    use super::*;
    use crate::domain::ports::{FixtureIdentityBackend, IdentityBackendError};
    use crate::domain::{LoginCredentials, ProviderMetadata, SessionRecord};
    use actix_web::http::StatusCode;
    use actix_web::{App, test, web};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    async fn page(user: Option<ResolvedUser>) -> HttpResponse {
        let body = match user {
            Some(ResolvedUser(identity)) => identity.id.to_string(),
            None => "anonymous".to_owned(),
        };
        HttpResponse::Ok().body(body)
    }

    async fn seed_session(
        session: SessionCookie,
        record: web::Json<SessionRecord>,
    ) -> Result<HttpResponse, Error> {
        session.persist(&record)?;
        Ok(HttpResponse::Ok().finish())
    }

    fn resolver_app(
        identity: Arc<FixtureIdentityBackend>,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse<
                EitherBody<actix_web::body::BoxBody>,
            >,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .wrap(SessionResolver::new(identity))
            .wrap(crate::inbound::http::test_utils::test_session_middleware())
            .route("/test/session", web::post().to(seed_session))
            .route("/", web::get().to(page))
            .route("/login", web::get().to(page))
            .route("/dashboard", web::get().to(page))
            .route("/dashboard/settings", web::get().to(page))
    }

    /// Sign in against the fixture backend and return a cookie carrying the
    /// issued record.
    async fn signed_in_cookie<S>(
        app: &S,
        backend: &FixtureIdentityBackend,
        email: &str,
    ) -> (actix_web::cookie::Cookie<'static>, SessionRecord)
    where
        S: actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse<EitherBody<actix_web::body::BoxBody>>,
            Error = actix_web::Error,
        >,
    {
        let creds = LoginCredentials::try_from_parts(email, "pw").expect("valid creds");
        let issued = backend
            .sign_in_with_password(&creds)
            .await
            .expect("sign in");
        let record = issued.record.clone();

        let res = test::call_service(
            app,
            test::TestRequest::post()
                .uri("/test/session")
                .set_json(&record)
                .to_request(),
        )
        .await;
        assert!(res.status().is_success());
        let cookie = res
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("session cookie set")
            .into_owned();
        (cookie, record)
    }

    #[actix_web::test]
    async fn anonymous_protected_request_redirects_to_login() {
        let backend = Arc::new(FixtureIdentityBackend::new());
        let app = test::init_service(resolver_app(backend)).await;

        let res =
            test::call_service(&app, test::TestRequest::get().uri("/dashboard").to_request())
                .await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            res.headers().get(header::LOCATION).map(|v| v.as_bytes()),
            Some(LOGIN_PATH.as_bytes())
        );
    }

    #[actix_web::test]
    async fn anonymous_public_and_auth_only_requests_pass() {
        let backend = Arc::new(FixtureIdentityBackend::new());
        let app = test::init_service(resolver_app(backend)).await;

        for uri in ["/", "/login"] {
            let res = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(res.status(), StatusCode::OK, "{uri} should pass");
            let body = test::read_body(res).await;
            assert_eq!(body, "anonymous");
        }
    }

    #[actix_web::test]
    async fn authenticated_protected_request_carries_the_identity() {
        let backend = Arc::new(
            FixtureIdentityBackend::new().with_account("a@x.com", "pw", ProviderMetadata::default()),
        );
        let app = test::init_service(resolver_app(backend.clone())).await;
        let (cookie, record) = signed_in_cookie(&app, &backend, "a@x.com").await;

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/dashboard/settings")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = test::read_body(res).await;
        assert_eq!(body, record.user_id.to_string());
    }

    #[actix_web::test]
    async fn authenticated_auth_only_request_redirects_to_dashboard() {
        let backend = Arc::new(
            FixtureIdentityBackend::new().with_account("a@x.com", "pw", ProviderMetadata::default()),
        );
        let app = test::init_service(resolver_app(backend.clone())).await;
        let (cookie, _record) = signed_in_cookie(&app, &backend, "a@x.com").await;

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/login")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            res.headers().get(header::LOCATION).map(|v| v.as_bytes()),
            Some(DASHBOARD_PREFIX.as_bytes())
        );
    }

    #[actix_web::test]
    async fn stale_session_redirects_like_anonymous() {
        let backend = Arc::new(FixtureIdentityBackend::new());
        let app = test::init_service(resolver_app(backend)).await;

        let revoked = SessionRecord {
            user_id: Uuid::new_v4(),
            access_token: "revoked".into(),
            refresh_token: "revoked".into(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        let seed = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/test/session")
                .set_json(&revoked)
                .to_request(),
        )
        .await;
        let cookie = seed
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("session cookie set")
            .into_owned();

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/dashboard")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    }

    #[actix_web::test]
    async fn expired_session_is_rotated_and_admitted() {
        let backend = Arc::new(
            FixtureIdentityBackend::new().with_account("a@x.com", "pw", ProviderMetadata::default()),
        );
        let app = test::init_service(resolver_app(backend.clone())).await;

        let creds = LoginCredentials::try_from_parts("a@x.com", "pw").expect("valid creds");
        let issued = backend
            .sign_in_with_password(&creds)
            .await
            .expect("sign in");
        let mut expired = issued.record.clone();
        expired.expires_at = Utc::now() - Duration::minutes(1);

        let seed = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/test/session")
                .set_json(&expired)
                .to_request(),
        )
        .await;
        let cookie = seed
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("session cookie set")
            .into_owned();

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/dashboard")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = test::read_body(res).await;
        assert_eq!(body, issued.record.user_id.to_string());
    }

    #[actix_web::test]
    async fn backend_outage_fails_open_everywhere() {
        let backend = Arc::new(
            FixtureIdentityBackend::new().with_account("a@x.com", "pw", ProviderMetadata::default()),
        );
        let app = test::init_service(resolver_app(backend.clone())).await;
        let (cookie, _record) = signed_in_cookie(&app, &backend, "a@x.com").await;
        backend.set_outage(IdentityBackendError::unavailable("connection refused"));

        for uri in ["/dashboard", "/login", "/"] {
            let res = test::call_service(
                &app,
                test::TestRequest::get()
                    .uri(uri)
                    .cookie(cookie.clone())
                    .to_request(),
            )
            .await;
            assert_eq!(res.status(), StatusCode::OK, "{uri} should fail open");
            let body = test::read_body(res).await;
            assert_eq!(body, "anonymous", "{uri} must not claim a resolved user");
        }
    }
}
