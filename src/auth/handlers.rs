use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, PublicUser, SignupRequest},
        middleware::{cleared_cookie, require_user, session_cookie, CurrentUser},
        repo_types::User,
    },
    error::{http_error, ModelError},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_me))
        .route("/account/delete", post(delete_account))
        .route_layer(from_fn(require_user))
}

#[instrument(skip(state, jar, payload))]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, CookieJar, Json<PublicUser>), (StatusCode, String)> {
    let mut user = User {
        name: payload.name,
        email: payload.email,
        password: payload.password,
        ..User::default()
    };

    if let Err(e) = state.users.create(&mut user).await {
        warn!(error = %e, "signup rejected");
        return Err(http_error(e));
    }

    let token = state.users.sign_in(&mut user).await.map_err(|e| {
        error!(error = %e, user_id = user.id, "sign in after signup failed");
        http_error(e)
    })?;

    info!(user_id = user.id, email = %user.email, "user registered");
    let jar = jar.add(session_cookie(token, state.config.in_prod()));
    Ok((StatusCode::CREATED, jar, Json(PublicUser::from(&user))))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<PublicUser>), (StatusCode, String)> {
    let mut user = match state.users.authenticate(&payload.email, &payload.password).await {
        Ok(u) => u,
        Err(ModelError::NotFound) => {
            warn!("login unknown email");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Err(ModelError::PasswordIncorrect) => {
            warn!("login invalid password");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Err(e) => return Err(http_error(e)),
    };

    let token = state.users.sign_in(&mut user).await.map_err(http_error)?;

    info!(user_id = user.id, "user logged in");
    let jar = jar.add(session_cookie(token, state.config.in_prod()));
    Ok((jar, Json(PublicUser::from(&user))))
}

/// Clears the cookie and rotates the stored token so the old one is dead
/// even if a copy survives client-side.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    CurrentUser(mut user): CurrentUser,
) -> Response {
    if let Err(e) = state.users.rotate_remember(&mut user).await {
        error!(error = %e, user_id = user.id, "rotate remember token failed");
    } else {
        info!(user_id = user.id, "user logged out");
    }
    let jar = jar.add(cleared_cookie(state.config.in_prod()));
    (StatusCode::FOUND, jar, [(header::LOCATION, "/")]).into_response()
}

/// Removes the account and its galleries, then ends the session.
#[instrument(skip_all)]
pub async fn delete_account(
    State(state): State<AppState>,
    jar: CookieJar,
    CurrentUser(user): CurrentUser,
) -> Result<Response, (StatusCode, String)> {
    let galleries = state
        .galleries
        .by_user_id(user.id)
        .await
        .map_err(http_error)?;
    for gallery in galleries {
        match state.galleries.delete(gallery.id).await {
            Ok(()) | Err(ModelError::NotFound) => {}
            Err(e) => return Err(http_error(e)),
        }
    }
    state.users.delete(user.id).await.map_err(http_error)?;

    info!(user_id = user.id, "account deleted");
    let jar = jar.add(cleared_cookie(state.config.in_prod()));
    Ok((StatusCode::FOUND, jar, [(header::LOCATION, "/")]).into_response())
}

#[instrument(skip_all)]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(PublicUser::from(&user))
}
