//! Public share links: one opaque hash per user granting anonymous,
//! read-only access to everything that user has saved.

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use rand::{Rng, distr::Alphanumeric};
use tracing::info;
use uuid::Uuid;

use keepsake_db::Database;
use keepsake_types::api::{ShareRequest, ShareResponse, ShareStatus, SharedContentResponse};
use keepsake_types::models::Content;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::{AppState, blocking};
use crate::views;

/// 16 alphanumeric characters, about 95 bits.
pub const HASH_LEN: usize = 16;

pub fn generate_hash() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(HASH_LEN)
        .map(char::from)
        .collect()
}

/// Enabling returns the user's existing hash, minting one only if none
/// exists. Disabling drops the link and returns `None`.
pub fn set_sharing(db: &Database, user_id: &str, enabled: bool) -> anyhow::Result<Option<String>> {
    if !enabled {
        if db.delete_link_for_user(user_id)? {
            info!("Sharing disabled for {}", user_id);
        }
        return Ok(None);
    }

    if let Some(link) = db.get_link_for_user(user_id)? {
        return Ok(Some(link.hash));
    }

    let link = db.get_or_create_link(&Uuid::new_v4().to_string(), user_id, &generate_hash())?;
    info!("Sharing enabled for {}", user_id);
    Ok(Some(link.hash))
}

/// Owner's username and a live read of all their content.
pub fn resolve_share(db: &Database, hash: &str) -> Result<(String, Vec<Content>), ApiError> {
    let link = db
        .get_link_by_hash(hash)?
        .ok_or_else(|| ApiError::NotFound("Invalid share link".into()))?;

    // Links outlive deleted accounts.
    let owner = db
        .get_user_by_id(&link.user_id)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let rows = db.list_content_for_user(&link.user_id)?;
    Ok((owner.username, views::contents(db, rows)?))
}

pub fn share_status(db: &Database, user_id: &str) -> anyhow::Result<ShareStatus> {
    Ok(match db.get_link_for_user(user_id)? {
        Some(link) => ShareStatus {
            share: true,
            hash: Some(link.hash),
        },
        None => ShareStatus {
            share: false,
            hash: None,
        },
    })
}

// -- Handlers --

/// POST /content/share takes `{ "share": bool }`.
pub async fn share(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<ShareRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let enabled = req
        .share
        .ok_or_else(|| ApiError::BadRequest("'share' boolean flag is required".into()))?;

    let user_id = auth.key();
    let hash = blocking(&state, move |app| Ok(set_sharing(&app.db, &user_id, enabled)?)).await?;

    Ok(Json(match hash {
        Some(hash) => ShareResponse::Enabled { hash },
        None => ShareResponse::Disabled {
            message: "Removed link".into(),
        },
    }))
}

/// GET /content/my-link
pub async fn my_link(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.key();
    let status = blocking(&state, move |app| Ok(share_status(&app.db, &user_id)?)).await?;
    Ok(Json(status))
}

/// GET /content/{hash} is unauthenticated.
pub async fn shared_content(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (username, content) = blocking(&state, move |app| resolve_share(&app.db, &hash)).await?;
    Ok(Json(SharedContentResponse { username, content }))
}
