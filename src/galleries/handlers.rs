use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::repo_types::Gallery;
use crate::{
    auth::{
        middleware::{require_user, CurrentUser},
        repo_types::User,
    },
    error::{http_error, ModelError},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct GalleryForm {
    pub title: String,
}

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/galleries/:id", get(show))
}

pub fn owner_routes() -> Router<AppState> {
    Router::new()
        .route("/galleries", get(index).post(create))
        .route("/galleries/:id/edit", get(edit))
        .route("/galleries/:id/update", post(update))
        .route("/galleries/:id/delete", post(delete))
        .route_layer(from_fn(require_user))
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Gallery not found".into())
}

async fn gallery_by_id(state: &AppState, id: i64) -> Result<Gallery, (StatusCode, String)> {
    match state.galleries.by_id(id).await {
        Ok(g) => Ok(g),
        Err(ModelError::NotFound) => Err(not_found()),
        Err(e) => Err(http_error(e)),
    }
}

/// Someone else's gallery looks exactly like a missing one.
fn ensure_owner(user: &User, gallery: &Gallery) -> Result<(), (StatusCode, String)> {
    if gallery.user_id != user.id {
        warn!(user_id = user.id, gallery_id = gallery.id, "gallery access by non-owner");
        return Err(not_found());
    }
    Ok(())
}

async fn owned_gallery(
    state: &AppState,
    user: &User,
    id: i64,
) -> Result<Gallery, (StatusCode, String)> {
    let gallery = gallery_by_id(state, id).await?;
    ensure_owner(user, &gallery)?;
    Ok(gallery)
}

#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Gallery>>, (StatusCode, String)> {
    let galleries = state
        .galleries
        .by_user_id(user.id)
        .await
        .map_err(http_error)?;
    Ok(Json(galleries))
}

#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(form): Json<GalleryForm>,
) -> Result<Response, (StatusCode, String)> {
    let mut gallery = Gallery {
        user_id: user.id,
        title: form.title,
        ..Gallery::default()
    };
    state
        .galleries
        .create(&mut gallery)
        .await
        .map_err(http_error)?;
    info!(user_id = user.id, gallery_id = gallery.id, "gallery created");
    let location = format!("/galleries/{}/edit", gallery.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(gallery),
    )
        .into_response())
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Gallery>, (StatusCode, String)> {
    gallery_by_id(&state, id).await.map(Json)
}

#[instrument(skip(state, user))]
pub async fn edit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Gallery>, (StatusCode, String)> {
    owned_gallery(&state, &user, id).await.map(Json)
}

#[instrument(skip(state, user, form))]
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(form): Json<GalleryForm>,
) -> Result<Json<Gallery>, (StatusCode, String)> {
    let mut gallery = owned_gallery(&state, &user, id).await?;
    gallery.title = form.title;
    state
        .galleries
        .update(&mut gallery)
        .await
        .map_err(http_error)?;
    Ok(Json(gallery))
}

#[instrument(skip(state, user))]
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, (StatusCode, String)> {
    let gallery = owned_gallery(&state, &user, id).await?;
    state
        .galleries
        .delete(gallery.id)
        .await
        .map_err(http_error)?;
    info!(user_id = user.id, gallery_id = id, "gallery deleted");
    Ok((StatusCode::FOUND, [(header::LOCATION, "/galleries")]).into_response())
}
