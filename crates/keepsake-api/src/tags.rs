use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use keepsake_types::api::{
    AddTagRequest, AddTagsToContentRequest, ContentResponse, SearchQuery, SearchResponse,
    TagListResponse, TagResponse,
};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::{AppState, blocking};
use crate::validation::Validate;
use crate::views;

fn content_not_found() -> ApiError {
    ApiError::NotFound("Content not found or unauthorized".into())
}

/// Comma-separated ids, blanks dropped.
fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accepts RFC 3339 or a bare date (midnight UTC) and renders it in the
/// stored timestamp format.
fn parse_before_date(raw: &str) -> Option<String> {
    let instant = raw
        .parse::<DateTime<Utc>>()
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|ndt| ndt.and_utc())
        })?;
    Some(instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

/// POST /tags/add
pub async fn add_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<AddTagRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let user_id = auth.key();
    let row = blocking(&state, move |app| {
        Ok(app.db.insert_tag(&Uuid::new_v4().to_string(), &user_id, req.title.trim())?)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(TagResponse {
            message: "Tag created successfully".into(),
            tag: views::tag(row),
        }),
    ))
}

/// GET /tags/user-tags
pub async fn user_tags(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.key();
    let rows = blocking(&state, move |app| Ok(app.db.list_tags_for_user(&user_id)?)).await?;

    Ok(Json(TagListResponse {
        tags: rows.into_iter().map(views::tag).collect(),
    }))
}

/// POST /tags/content/tags merges tags onto the caller's content.
pub async fn add_tags_to_content(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<AddTagsToContentRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let user_id = auth.key();
    let content = blocking(&state, move |app| {
        let row = app
            .db
            .get_owned_content(&req.content_id, &user_id)?
            .ok_or_else(content_not_found)?;

        if !app.db.attach_tags(&row.id, &user_id, &req.tag_ids)? {
            return Err(ApiError::NotFound("Tag not found or unauthorized".into()));
        }
        Ok(views::content(&app.db, row)?)
    })
    .await?;

    Ok(Json(ContentResponse {
        message: "Tags added successfully".into(),
        content,
    }))
}

/// DELETE /tags/content/{content_id}/tags/{tag_id}
pub async fn remove_tag(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((content_id, tag_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.key();
    let content = blocking(&state, move |app| {
        let row = app
            .db
            .get_owned_content(&content_id, &user_id)?
            .ok_or_else(content_not_found)?;

        app.db.detach_tag(&row.id, &tag_id)?;
        Ok(views::content(&app.db, row)?)
    })
    .await?;

    Ok(Json(ContentResponse {
        message: "Tag removed from content successfully".into(),
        content,
    }))
}

/// GET /tags/content/search?tagIds=a,b&beforeDate=2026-01-01
pub async fn search_content(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    WithRejection(Query(query), _): WithRejection<Query<SearchQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let tag_ids = query.tag_ids.as_deref().map(split_ids).unwrap_or_default();
    let before = query
        .before_date
        .as_deref()
        .map(|raw| parse_before_date(raw).ok_or_else(|| ApiError::BadRequest("Invalid date format".into())))
        .transpose()?;

    let user_id = auth.key();
    let contents = blocking(&state, move |app| {
        let rows = app.db.search_content(&user_id, &tag_ids, before.as_deref())?;
        Ok(views::contents(&app.db, rows)?)
    })
    .await?;

    Ok(Json(SearchResponse {
        message: "Contents fetched based on search criteria".into(),
        contents,
    }))
}
