use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod hash;
pub mod middleware;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod store;
pub mod token;
pub mod validator;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::session_routes())
}
