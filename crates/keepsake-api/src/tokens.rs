//! Access/refresh token issuance, verification and rotation.
//!
//! Each user holds at most one live refresh token: issuing a pair overwrites
//! the stored value, so signing in elsewhere or rotating invalidates every
//! earlier refresh token for that user.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{debug, warn};
use uuid::Uuid;

use keepsake_db::Database;
use keepsake_db::models::UserRow;
use keepsake_types::api::{AccessClaims, RefreshClaims};

use crate::error::ApiError;

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs access and refresh tokens with distinct secrets.
pub struct TokenService {
    access: Keys,
    refresh: Keys,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access: Keys::from_secret(access_secret),
            refresh: Keys::from_secret(refresh_secret),
            access_ttl,
            refresh_ttl,
        }
    }

    fn sign_access(&self, user_id: Uuid, username: &str, email: &str) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id,
            username: username.to_string(),
            email: email.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.access_ttl).timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.access.encoding)?)
    }

    fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user_id,
            jti: Uuid::new_v4(),
            iat: now.timestamp() as usize,
            exp: (now + self.refresh_ttl).timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.refresh.encoding)?)
    }

    fn sign_pair(&self, user: &UserRow) -> Result<TokenPair, ApiError> {
        let user_id: Uuid = user
            .id
            .parse()
            .map_err(|e| anyhow::anyhow!("Corrupt user id '{}': {}", user.id, e))?;

        Ok(TokenPair {
            access_token: self.sign_access(user_id, &user.username, &user.email)?,
            refresh_token: self.sign_refresh(user_id)?,
        })
    }

    /// Fails on a bad signature, expiry or malformed token.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, ApiError> {
        decode::<AccessClaims>(token, &self.access.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Access token rejected: {}", e);
                ApiError::InvalidToken
            })
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, ApiError> {
        decode::<RefreshClaims>(token, &self.refresh.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Refresh token rejected: {}", e);
                ApiError::InvalidRefreshToken
            })
    }

    /// Mints a new pair for `user_id` and stores the refresh half, replacing
    /// whatever was stored before.
    pub fn issue_token_pair(&self, db: &Database, user_id: &str) -> Result<TokenPair, ApiError> {
        let user = db
            .get_user_by_id(user_id)?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

        let pair = self.sign_pair(&user)?;
        if !db.set_refresh_token(&user.id, Some(&pair.refresh_token))? {
            return Err(ApiError::NotFound("User not found".into()));
        }
        Ok(pair)
    }

    /// Exchanges the caller's current refresh token for a fresh pair.
    ///
    /// The presented token must be the one currently stored on some user,
    /// carry a valid signature, and name that same user as its subject. The
    /// swap itself is a compare-and-set, so of two concurrent rotations of
    /// the same token only one succeeds.
    pub fn rotate_on_refresh(&self, db: &Database, presented: &str) -> Result<TokenPair, ApiError> {
        let user = db.get_user_by_refresh_token(presented)?.ok_or_else(|| {
            debug!("Refresh token not held by any user");
            ApiError::InvalidRefreshToken
        })?;

        let claims = self.verify_refresh(presented)?;
        if claims.sub.to_string() != user.id {
            warn!("Refresh token subject {} does not match holder {}", claims.sub, user.id);
            return Err(ApiError::InvalidRefreshToken);
        }

        let pair = self.sign_pair(&user)?;
        if !db.rotate_refresh_token(&user.id, presented, &pair.refresh_token)? {
            debug!("Refresh token for {} superseded during rotation", user.id);
            return Err(ApiError::InvalidRefreshToken);
        }
        Ok(pair)
    }

    /// Clears the stored refresh token so no outstanding one can be used.
    pub fn revoke(&self, db: &Database, user_id: &str) -> Result<(), ApiError> {
        db.set_refresh_token(user_id, None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_db::models::NewUser;

    fn service() -> TokenService {
        TokenService::new(
            "access-secret",
            "refresh-secret",
            Duration::minutes(15),
            Duration::days(7),
        )
    }

    fn seeded_db() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4().to_string();
        db.create_user(&NewUser {
            id: &id,
            name: "Alice",
            username: "alice_1234",
            email: "a@x.com",
            password_hash: "unused",
        })
        .unwrap();
        (db, id)
    }

    #[test]
    fn issued_access_token_resolves_to_user() {
        let (db, id) = seeded_db();
        let tokens = service();

        let pair = tokens.issue_token_pair(&db, &id).unwrap();
        let claims = tokens.verify_access(&pair.access_token).unwrap();
        assert_eq!(claims.sub.to_string(), id);
        assert_eq!(claims.username, "alice_1234");
        assert_eq!(claims.email, "a@x.com");

        let stored = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(pair.refresh_token.as_str()));
    }

    #[test]
    fn tokens_are_not_interchangeable() {
        let (db, id) = seeded_db();
        let tokens = service();
        let pair = tokens.issue_token_pair(&db, &id).unwrap();

        assert!(matches!(tokens.verify_access(&pair.refresh_token), Err(ApiError::InvalidToken)));
        assert!(matches!(
            tokens.verify_refresh(&pair.access_token),
            Err(ApiError::InvalidRefreshToken)
        ));
    }

    #[test]
    fn expired_and_malformed_access_tokens_fail() {
        let tokens = service();
        let expired = AccessClaims {
            sub: Uuid::new_v4(),
            username: "alice_1234".into(),
            email: "a@x.com".into(),
            iat: 1_000,
            exp: 2_000,
        };
        let token = encode(
            &Header::default(),
            &expired,
            &EncodingKey::from_secret(b"access-secret"),
        )
        .unwrap();

        assert!(matches!(tokens.verify_access(&token), Err(ApiError::InvalidToken)));
        assert!(matches!(tokens.verify_access("not.a.jwt"), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn rotation_invalidates_the_previous_refresh_token() {
        let (db, id) = seeded_db();
        let tokens = service();

        let first = tokens.issue_token_pair(&db, &id).unwrap();
        let second = tokens.rotate_on_refresh(&db, &first.refresh_token).unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        assert!(matches!(
            tokens.rotate_on_refresh(&db, &first.refresh_token),
            Err(ApiError::InvalidRefreshToken)
        ));
        assert!(tokens.rotate_on_refresh(&db, &second.refresh_token).is_ok());
    }

    #[test]
    fn new_login_supersedes_earlier_session() {
        let (db, id) = seeded_db();
        let tokens = service();

        let laptop = tokens.issue_token_pair(&db, &id).unwrap();
        let _phone = tokens.issue_token_pair(&db, &id).unwrap();

        assert!(matches!(
            tokens.rotate_on_refresh(&db, &laptop.refresh_token),
            Err(ApiError::InvalidRefreshToken)
        ));
    }

    #[test]
    fn revoked_refresh_token_cannot_rotate() {
        let (db, id) = seeded_db();
        let tokens = service();

        let pair = tokens.issue_token_pair(&db, &id).unwrap();
        tokens.revoke(&db, &id).unwrap();

        assert!(matches!(
            tokens.rotate_on_refresh(&db, &pair.refresh_token),
            Err(ApiError::InvalidRefreshToken)
        ));
    }

    #[test]
    fn stored_token_with_foreign_subject_is_rejected() {
        let (db, id) = seeded_db();
        let tokens = service();

        // A validly signed token naming some other user, planted on this record.
        let foreign = tokens.sign_refresh(Uuid::new_v4()).unwrap();
        db.set_refresh_token(&id, Some(&foreign)).unwrap();

        assert!(matches!(
            tokens.rotate_on_refresh(&db, &foreign),
            Err(ApiError::InvalidRefreshToken)
        ));
    }

    #[test]
    fn expired_stored_refresh_token_is_rejected() {
        let (db, id) = seeded_db();
        let tokens = service();

        let expired = RefreshClaims {
            sub: id.parse().unwrap(),
            jti: Uuid::new_v4(),
            iat: 1_000,
            exp: 2_000,
        };
        let token = encode(
            &Header::default(),
            &expired,
            &EncodingKey::from_secret(b"refresh-secret"),
        )
        .unwrap();
        db.set_refresh_token(&id, Some(&token)).unwrap();

        assert!(matches!(
            tokens.rotate_on_refresh(&db, &token),
            Err(ApiError::InvalidRefreshToken)
        ));
        let stored = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some(token.as_str()));
    }
}
