use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::debug;
use uuid::Uuid;

use keepsake_types::models::User;

use crate::error::ApiError;
use crate::state::{AppState, AppStateInner, blocking};
use crate::views;

/// Cookie carrying the access token for browser clients.
pub const ACCESS_COOKIE: &str = "accessToken";

/// Identity resolved by [`require_auth`], attached to the request extensions
/// for downstream handlers.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub user: User,
}

impl AuthUser {
    /// Store key of the authenticated user.
    pub fn key(&self) -> String {
        self.id.to_string()
    }
}

/// Bearer header first, then the access-token cookie.
fn extract_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    match bearer {
        Some(token) => Some(token.to_string()),
        None => jar
            .get(ACCESS_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty()),
    }
}

/// Validate the access token and resolve the live account behind it.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(req.headers(), &jar).ok_or_else(ApiError::unauthenticated)?;
    let claims = state.tokens.verify_access(&token)?;

    let user_id = claims.sub;
    let row = blocking(&state, move |app| Ok(app.db.get_user_by_id(&user_id.to_string())?)).await?;
    let Some(row) = row else {
        debug!("Access token for deleted user {}", user_id);
        return Err(ApiError::Unauthenticated("Invalid access token".into()));
    };

    req.extensions_mut().insert(AuthUser {
        id: user_id,
        user: views::user(&row),
    });
    Ok(next.run(req).await)
}

pub fn access_cookie(state: &AppStateInner, token: String) -> Cookie<'static> {
    Cookie::build((ACCESS_COOKIE, token))
        .http_only(true)
        .secure(state.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

pub fn expired_access_cookie() -> Cookie<'static> {
    Cookie::build((ACCESS_COOKIE, "")).path("/").build()
}
