//! Account records: registration, password checks and profile edits.
//! Passwords are stored only as Argon2id PHC strings.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use tracing::{debug, info};
use uuid::Uuid;

use keepsake_db::models::{NewUser, UserRow, UserUpdate};
use keepsake_db::{Database, is_constraint_violation};
use keepsake_types::api::{RegisterRequest, UpdateProfileRequest};

use crate::error::ApiError;

const DUPLICATE_IDENTITY: &str = "User already exists with username or email";

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("Corrupt password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Creates an account. Username and email must both be unused.
pub fn register(db: &Database, req: &RegisterRequest) -> Result<UserRow, ApiError> {
    if db.identity_taken(Some(req.username.as_str()), Some(req.email.as_str()), None)? {
        return Err(ApiError::Conflict(DUPLICATE_IDENTITY.into()));
    }

    let password_hash = hash_password(&req.password)?;
    let id = Uuid::new_v4().to_string();

    db.create_user(&NewUser {
        id: &id,
        name: &req.name,
        username: &req.username,
        email: &req.email,
        password_hash: &password_hash,
    })
    .map_err(conflict_or_internal)?;

    info!("Registered user {} ({})", req.username, id);

    db.get_user_by_id(&id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("User {} vanished after insert", id)))
}

/// Checks `password` for the account whose username or email is
/// `identifier`. Unknown accounts and wrong passwords fail identically.
pub fn authenticate(db: &Database, identifier: &str, password: &str) -> Result<UserRow, ApiError> {
    let Some(user) = db.get_user_by_identifier(identifier)? else {
        debug!("Login for unknown identifier");
        return Err(ApiError::InvalidCredentials);
    };

    if !verify_password(password, &user.password)? {
        debug!("Wrong password for {}", user.id);
        return Err(ApiError::InvalidCredentials);
    }

    Ok(user)
}

/// Persists only the supplied fields. A new password is hashed first.
pub fn update_profile(
    db: &Database,
    user_id: &str,
    req: UpdateProfileRequest,
) -> Result<UserRow, ApiError> {
    if req.is_empty() {
        return Err(ApiError::BadRequest("No fields provided to update".into()));
    }

    if (req.username.is_some() || req.email.is_some())
        && db.identity_taken(req.username.as_deref(), req.email.as_deref(), Some(user_id))?
    {
        return Err(ApiError::Conflict(DUPLICATE_IDENTITY.into()));
    }

    let password_hash = req.password.as_deref().map(hash_password).transpose()?;
    let update = UserUpdate {
        name: req.name,
        username: req.username,
        email: req.email,
        password_hash,
    };

    db.update_user(user_id, &update)
        .map_err(conflict_or_internal)?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))
}

/// A concurrent registration can slip past the pre-check; the UNIQUE index
/// still catches it.
fn conflict_or_internal(err: anyhow::Error) -> ApiError {
    if is_constraint_violation(&err) {
        ApiError::Conflict(DUPLICATE_IDENTITY.into())
    } else {
        ApiError::Internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Alice".into(),
            username: username.into(),
            email: email.into(),
            password: "pw123456".into(),
            confirm: "pw123456".into(),
        }
    }

    #[test]
    fn password_is_stored_hashed() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, &request("alice_1234", "a@x.com")).unwrap();

        assert_ne!(user.password, "pw123456");
        assert!(user.password.starts_with("$argon2"));
        assert!(user.refresh_token.is_none());
    }

    #[test]
    fn duplicate_username_or_email_conflicts() {
        let db = Database::open_in_memory().unwrap();
        register(&db, &request("alice_1234", "a@x.com")).unwrap();

        assert!(matches!(
            register(&db, &request("alice_1234", "other@x.com")),
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            register(&db, &request("someone_else", "a@x.com")),
            Err(ApiError::Conflict(_))
        ));
        assert!(register(&db, &request("someone_else", "b@x.com")).is_ok());
    }

    #[test]
    fn authenticate_accepts_username_or_email() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, &request("alice_1234", "a@x.com")).unwrap();

        assert_eq!(authenticate(&db, "alice_1234", "pw123456").unwrap().id, user.id);
        assert_eq!(authenticate(&db, "a@x.com", "pw123456").unwrap().id, user.id);
    }

    #[test]
    fn authenticate_failures_are_uniform() {
        let db = Database::open_in_memory().unwrap();
        register(&db, &request("alice_1234", "a@x.com")).unwrap();

        let wrong_password = authenticate(&db, "alice_1234", "nope-nope").unwrap_err();
        let unknown_user = authenticate(&db, "mallory_99", "pw123456").unwrap_err();
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert!(matches!(wrong_password, ApiError::InvalidCredentials));
    }

    #[test]
    fn update_profile_rules() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, &request("alice_1234", "a@x.com")).unwrap();
        register(&db, &request("bobby_1234", "b@x.com")).unwrap();

        assert!(matches!(
            update_profile(&db, &alice.id, UpdateProfileRequest::default()),
            Err(ApiError::BadRequest(_))
        ));

        let steal = UpdateProfileRequest {
            email: Some("b@x.com".into()),
            ..Default::default()
        };
        assert!(matches!(update_profile(&db, &alice.id, steal), Err(ApiError::Conflict(_))));

        let missing = UpdateProfileRequest {
            name: Some("Ghost".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_profile(&db, &Uuid::new_v4().to_string(), missing),
            Err(ApiError::NotFound(_))
        ));

        let change_password = UpdateProfileRequest {
            password: Some("new-password".into()),
            ..Default::default()
        };
        update_profile(&db, &alice.id, change_password).unwrap();
        assert!(authenticate(&db, "alice_1234", "new-password").is_ok());
        assert!(authenticate(&db, "alice_1234", "pw123456").is_err());
    }
}
