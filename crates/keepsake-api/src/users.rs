use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::{WithRejection, cookie::CookieJar};
use tracing::info;

use keepsake_types::api::{
    LoginRequest, LoginResponse, MeResponse, MessageResponse, ProfileResponse, RefreshRequest,
    RegisterRequest, RegisterResponse, TokenPairResponse, UpdateProfileRequest,
};

use crate::credentials;
use crate::error::ApiError;
use crate::middleware::{AuthUser, access_cookie, expired_access_cookie};
use crate::state::{AppState, blocking};
use crate::validation::Validate;
use crate::views;

/// POST /users/register
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let row = blocking(&state, move |app| credentials::register(&app.db, &req)).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".into(),
            user: views::user(&row),
        }),
    ))
}

/// POST /users/login returns both tokens and sets the access cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let (row, pair) = blocking(&state, move |app| {
        let user = credentials::authenticate(&app.db, &req.identifier, &req.password)?;
        let pair = app.tokens.issue_token_pair(&app.db, &user.id)?;
        Ok((user, pair))
    })
    .await?;

    info!("User {} logged in", row.username);

    let jar = jar.add(access_cookie(&state, pair.access_token.clone()));
    Ok((
        jar,
        Json(LoginResponse {
            message: "User logged in successfully".into(),
            user: views::user(&row),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    ))
}

/// POST /users/refresh takes `{ "refreshToken": "..." }` in the body.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<RefreshRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let presented = req
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthenticated("No refresh token provided".into()))?;

    let pair = blocking(&state, move |app| app.tokens.rotate_on_refresh(&app.db, &presented)).await?;

    let jar = jar.add(access_cookie(&state, pair.access_token.clone()));
    Ok((
        jar,
        Json(TokenPairResponse {
            message: "Access token refreshed successfully".into(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    ))
}

/// POST /users/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.key();
    blocking(&state, move |app| app.tokens.revoke(&app.db, &user_id)).await?;

    info!("User {} logged out", auth.user.username);
    Ok((
        jar.remove(expired_access_cookie()),
        Json(MessageResponse::new("User logged out successfully")),
    ))
}

/// GET /users/me
pub async fn me(Extension(auth): Extension<AuthUser>) -> impl IntoResponse {
    Json(MeResponse { user: auth.user })
}

/// PATCH /users/update
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateProfileRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let user_id = auth.key();
    let row = blocking(&state, move |app| credentials::update_profile(&app.db, &user_id, req)).await?;

    Ok(Json(ProfileResponse {
        message: "Profile updated".into(),
        user: views::user(&row),
    }))
}

/// DELETE /users leaves content, tags and share link in place.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.key();
    let deleted = blocking(&state, move |app| Ok(app.db.delete_user(&user_id)?)).await?;
    if !deleted {
        return Err(ApiError::NotFound("User not found".into()));
    }

    info!("User {} deleted their account", auth.user.username);
    Ok((
        jar.remove(expired_access_cookie()),
        Json(MessageResponse::new("User account deleted successfully")),
    ))
}
