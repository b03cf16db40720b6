//! Database row types, mapped directly from SQLite rows.
//! Kept separate from keepsake-types so the store has no wire concerns.

#[derive(Debug)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub refresh_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewUser<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

/// Partial profile update. `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.username.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
    }
}

#[derive(Debug)]
pub struct ContentRow {
    pub id: String,
    pub link: String,
    pub title: String,
    pub kind: String,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug)]
pub struct TagRow {
    pub id: String,
    pub title: String,
    pub user_id: String,
    pub created_at: String,
}

/// A tag attached to a content item, as returned by the join query.
#[derive(Debug)]
pub struct ContentTagRow {
    pub content_id: String,
    pub tag: TagRow,
}

#[derive(Debug)]
pub struct LinkRow {
    pub id: String,
    pub hash: String,
    pub user_id: String,
    pub created_at: String,
}
