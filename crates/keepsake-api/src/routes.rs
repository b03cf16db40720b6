use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use serde_json::json;

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{content, share, tags, users};

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Full HTTP surface. Transport layers (tracing, CORS) are added by the
/// binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        .route("/users/refresh", post(users::refresh))
        .route("/content/{id}", get(share::shared_content));

    let protected_routes = Router::new()
        .route("/users/me", get(users::me))
        .route("/users/logout", post(users::logout))
        .route("/users/update", patch(users::update_profile))
        .route("/users", delete(users::delete_account))
        .route("/content/add", post(content::add_content))
        .route("/content/user-content", get(content::user_content))
        .route("/content/share", post(share::share))
        .route("/content/my-link", get(share::my_link))
        .route("/content/{id}", delete(content::delete_content))
        .route("/tags/add", post(tags::add_tag))
        .route("/tags/user-tags", get(tags::user_tags))
        .route("/tags/content/tags", post(tags::add_tags_to_content))
        .route("/tags/content/search", get(tags::search_content))
        .route("/tags/content/{content_id}/tags/{tag_id}", delete(tags::remove_tag))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
