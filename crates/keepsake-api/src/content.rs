use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use keepsake_types::api::{AddContentRequest, ContentListResponse, ContentResponse, MessageResponse};
use keepsake_types::models::ContentType;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::{AppState, blocking};
use crate::validation::Validate;
use crate::views;

/// POST /content/add
pub async fn add_content(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<AddContentRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let kind = req
        .kind
        .parse::<ContentType>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let user_id = auth.key();
    let content = blocking(&state, move |app| {
        let row = app.db.insert_content(
            &Uuid::new_v4().to_string(),
            &user_id,
            &req.link,
            &req.title,
            kind.as_str(),
        )?;
        Ok(views::content(&app.db, row)?)
    })
    .await?;

    info!("User {} saved {} '{}'", auth.user.username, kind, content.title);

    Ok((
        StatusCode::CREATED,
        Json(ContentResponse {
            message: "Content created successfully".into(),
            content,
        }),
    ))
}

/// GET /content/user-content
pub async fn user_content(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.key();
    let content = blocking(&state, move |app| {
        let rows = app.db.list_content_for_user(&user_id)?;
        Ok(views::contents(&app.db, rows)?)
    })
    .await?;

    Ok(Json(ContentListResponse {
        message: "User's content fetched successfully".into(),
        content,
    }))
}

/// DELETE /content/{id}: someone else's content is reported as missing.
pub async fn delete_content(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(content_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.key();
    let deleted =
        blocking(&state, move |app| Ok(app.db.delete_owned_content(&content_id, &user_id)?)).await?;

    if !deleted {
        return Err(ApiError::NotFound("Content not found or unauthorized".into()));
    }

    Ok(Json(MessageResponse::new("Content deleted successfully")))
}
