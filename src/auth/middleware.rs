use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use super::repo_types::User;
use crate::{error::ModelError, state::AppState};

pub const REMEMBER_COOKIE: &str = "remember_token";
pub const LOGIN_PATH: &str = "/login";
const SESSION_TTL: Duration = Duration::hours(1);

/// Paths that never need an identity lookup.
const PUBLIC_PREFIXES: &[&str] = &["/assets/", "/images/"];

/// Identity resolved from the remember cookie, valid for one request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((REMEMBER_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .expires(OffsetDateTime::now_utc() + SESSION_TTL)
        .build()
}

pub fn cleared_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((REMEMBER_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

fn redirect_to_login() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, LOGIN_PATH)]).into_response()
}

fn sets_remember_cookie(res: &Response) -> bool {
    let prefix = format!("{REMEMBER_COOKIE}=");
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// Attach the caller's identity when the remember cookie resolves.
///
/// Never rejects: a missing, unknown or failing token leaves the request
/// anonymous. A resolved session gets its cookie expiry pushed out by an hour.
pub async fn resolve_user(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path();
    if PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return next.run(req).await;
    }

    let token = match jar.get(REMEMBER_COOKIE).map(|c| c.value()) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => return next.run(req).await,
    };

    let user = match state.users.by_remember(&token).await {
        Ok(u) => u,
        Err(ModelError::NotFound) => {
            debug!("remember token matched no user");
            return next.run(req).await;
        }
        Err(e) => {
            warn!(error = %e, "remember token lookup failed");
            return next.run(req).await;
        }
    };

    debug!(user_id = user.id, "request identified");
    req.extensions_mut().insert(CurrentUser(user));
    let res = next.run(req).await;

    // login/logout already decided what the cookie should be
    if sets_remember_cookie(&res) {
        return res;
    }
    let jar = jar.add(session_cookie(token, state.config.in_prod()));
    (jar, res).into_response()
}

/// Gate for routes that need an identity. Must run after `resolve_user`.
pub async fn require_user(req: Request, next: Next) -> Response {
    if req.extensions().get::<CurrentUser>().is_none() {
        debug!(path = %req.uri().path(), "anonymous request to gated route");
        return redirect_to_login();
    }
    next.run(req).await
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(redirect_to_login)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::Request as HttpRequest,
        middleware::{from_fn, from_fn_with_state},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn whoami(user: Option<CurrentUser>) -> String {
        match user {
            Some(CurrentUser(u)) => format!("user:{}", u.id),
            None => "anonymous".into(),
        }
    }

    fn app(state: AppState) -> Router {
        let gated = Router::new()
            .route("/private", get(whoami))
            .route_layer(from_fn(require_user));
        Router::new()
            .route("/", get(whoami))
            .route("/assets/app.css", get(whoami))
            .merge(gated)
            .layer(from_fn_with_state(state.clone(), resolve_user))
            .with_state(state)
    }

    async fn signed_in(state: &AppState) -> (User, String) {
        let mut u = User {
            email: "ann@x.com".into(),
            password: "password123".into(),
            ..User::default()
        };
        state.users.create(&mut u).await.expect("create");
        let token = state.users.sign_in(&mut u).await.expect("sign in");
        (u, token)
    }

    fn get_with_cookie(uri: &str, token: Option<&str>) -> HttpRequest<Body> {
        let mut b = HttpRequest::builder().uri(uri);
        if let Some(t) = token {
            b = b.header(header::COOKIE, format!("{REMEMBER_COOKIE}={t}"));
        }
        b.body(Body::empty()).expect("request")
    }

    async fn body_string(res: Response) -> String {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[tokio::test]
    async fn no_cookie_is_anonymous() {
        let res = app(AppState::fake())
            .oneshot(get_with_cookie("/", None))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(body_string(res).await, "anonymous");
    }

    #[tokio::test]
    async fn known_cookie_attaches_identity_and_refreshes_expiry() {
        let state = AppState::fake();
        let (user, token) = signed_in(&state).await;
        let res = app(state)
            .oneshot(get_with_cookie("/", Some(&token)))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::OK);
        let set_cookie = res
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("refreshed cookie")
            .to_string();
        assert!(set_cookie.starts_with(&format!("{REMEMBER_COOKIE}={token}")));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Expires="));
        assert_eq!(body_string(res).await, format!("user:{}", user.id));
    }

    #[tokio::test]
    async fn unknown_cookie_proceeds_anonymously() {
        let state = AppState::fake();
        signed_in(&state).await;
        let res = app(state)
            .oneshot(get_with_cookie("/", Some("bm90LWEtcmVhbC10b2tlbg==")))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(body_string(res).await, "anonymous");
    }

    #[tokio::test]
    async fn static_paths_skip_lookup() {
        let state = AppState::fake();
        let (_, token) = signed_in(&state).await;
        let res = app(state)
            .oneshot(get_with_cookie("/assets/app.css", Some(&token)))
            .await
            .expect("response");
        assert!(res.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(body_string(res).await, "anonymous");
    }

    #[tokio::test]
    async fn gate_redirects_anonymous_to_login() {
        let res = app(AppState::fake())
            .oneshot(get_with_cookie("/private", None))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], LOGIN_PATH);
    }

    #[tokio::test]
    async fn gate_forwards_identified_requests() {
        let state = AppState::fake();
        let (user, token) = signed_in(&state).await;
        let res = app(state)
            .oneshot(get_with_cookie("/private", Some(&token)))
            .await
            .expect("response");
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_string(res).await, format!("user:{}", user.id));
    }

    #[test]
    fn set_cookie_carries_the_token_verbatim() {
        let token = crate::auth::token::remember_token().expect("token");
        let res = CookieJar::new()
            .add(session_cookie(token.clone(), false))
            .into_response();
        let header = res
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("set-cookie");
        assert!(header.starts_with(&format!("{REMEMBER_COOKIE}={token};")));
    }

    #[test]
    fn cleared_cookie_is_empty_and_expired() {
        let c = cleared_cookie(false);
        assert_eq!(c.value(), "");
        assert!(c.http_only().unwrap_or(false));
        let expires = c.expires_datetime().expect("expiry");
        assert!(expires < OffsetDateTime::now_utc());
    }

    #[test]
    fn session_cookie_lasts_an_hour() {
        let c = session_cookie("tok".into(), true);
        assert_eq!(c.secure(), Some(true));
        let left = c.expires_datetime().expect("expiry") - OffsetDateTime::now_utc();
        assert!(left > Duration::minutes(59) && left <= SESSION_TTL);
    }
}
