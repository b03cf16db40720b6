use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::Database;
use crate::migrations::NOW;
use crate::models::{ContentRow, ContentTagRow, LinkRow, NewUser, TagRow, UserRow, UserUpdate};

const USER_COLUMNS: &str =
    "id, name, username, email, password, refresh_token, created_at, updated_at";
const CONTENT_COLUMNS: &str = "id, link, title, kind, user_id, created_at, updated_at";
const LINK_COLUMNS: &str = "id, hash, user_id, created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, username, email, password) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user.id, user.name, user.username, user.email, user.password_hash],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    /// Looks a user up by username or email.
    pub fn get_user_by_identifier(&self, identifier: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1 OR email = ?1", identifier))
    }

    pub fn get_user_by_refresh_token(&self, token: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "refresh_token = ?1", token))
    }

    /// Whether `username` or `email` already belongs to an account other than
    /// `exclude_id`.
    pub fn identity_taken(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        exclude_id: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users
                 WHERE (username = ?1 OR email = ?2) AND (?3 IS NULL OR id != ?3)",
                params![username, email, exclude_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Overwrites the stored refresh token. `None` signs the user out.
    /// Returns false if no such user exists.
    pub fn set_refresh_token(&self, user_id: &str, token: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET refresh_token = ?2 WHERE id = ?1",
                params![user_id, token],
            )?;
            Ok(changed > 0)
        })
    }

    /// Swaps `current` for `next` only if `current` is still the stored value.
    /// Returns false when another rotation or a logout got there first.
    pub fn rotate_refresh_token(&self, user_id: &str, current: &str, next: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET refresh_token = ?3 WHERE id = ?1 AND refresh_token = ?2",
                params![user_id, current, next],
            )?;
            Ok(changed == 1)
        })
    }

    /// Applies the supplied fields and returns the updated row, or `None` if
    /// the user does not exist.
    pub fn update_user(&self, id: &str, update: &UserUpdate) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut sets = Vec::new();
            let mut values: Vec<&str> = Vec::new();
            let fields = [
                ("name", update.name.as_deref()),
                ("username", update.username.as_deref()),
                ("email", update.email.as_deref()),
                ("password", update.password_hash.as_deref()),
            ];
            for (column, value) in fields {
                if let Some(value) = value {
                    values.push(value);
                    sets.push(format!("{} = ?{}", column, values.len()));
                }
            }
            sets.push(format!("updated_at = {NOW}"));
            values.push(id);

            let sql = format!(
                "UPDATE users SET {} WHERE id = ?{}",
                sets.join(", "),
                values.len()
            );
            if conn.execute(&sql, params_from_iter(values))? == 0 {
                return Ok(None);
            }
            query_user(conn, "id = ?1", id)
        })
    }

    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])? > 0))
    }

    // -- Content --

    pub fn insert_content(
        &self,
        id: &str,
        user_id: &str,
        link: &str,
        title: &str,
        kind: &str,
    ) -> Result<ContentRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO content (id, link, title, kind, user_id) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, link, title, kind, user_id],
            )?;
            query_content(conn, id, None)?
                .ok_or_else(|| anyhow::anyhow!("Content {} vanished after insert", id))
        })
    }

    /// Returns the content item only if `user_id` owns it.
    pub fn get_owned_content(&self, id: &str, user_id: &str) -> Result<Option<ContentRow>> {
        self.with_conn(|conn| query_content(conn, id, Some(user_id)))
    }

    /// All content owned by `user_id`, oldest first.
    pub fn list_content_for_user(&self, user_id: &str) -> Result<Vec<ContentRow>> {
        self.search_content(user_id, &[], None)
    }

    /// Content owned by `user_id` tagged with any of `tag_ids` (no tag filter
    /// when empty) and created strictly before `before`, oldest first.
    pub fn search_content(
        &self,
        user_id: &str,
        tag_ids: &[String],
        before: Option<&str>,
    ) -> Result<Vec<ContentRow>> {
        self.with_conn(|conn| {
            let mut values: Vec<&str> = vec![user_id];
            let mut sql = format!("SELECT {CONTENT_COLUMNS} FROM content WHERE user_id = ?1");

            if !tag_ids.is_empty() {
                let placeholders: Vec<String> = tag_ids
                    .iter()
                    .map(|id| {
                        values.push(id);
                        format!("?{}", values.len())
                    })
                    .collect();
                sql.push_str(&format!(
                    " AND id IN (SELECT content_id FROM content_tags WHERE tag_id IN ({}))",
                    placeholders.join(", ")
                ));
            }
            if let Some(before) = before {
                values.push(before);
                sql.push_str(&format!(" AND created_at < ?{}", values.len()));
            }
            sql.push_str(" ORDER BY created_at, rowid");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), content_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Deletes the content item only if `user_id` owns it.
    pub fn delete_owned_content(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM content WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Batch-fetch the tags attached to a set of content ids.
    pub fn get_tags_for_content(&self, content_ids: &[String]) -> Result<Vec<ContentTagRow>> {
        if content_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=content_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT ct.content_id, t.id, t.title, t.user_id, t.created_at
                 FROM content_tags ct
                 JOIN tags t ON t.id = ct.tag_id
                 WHERE ct.content_id IN ({})
                 ORDER BY t.created_at, t.rowid",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(content_ids), |row| {
                    Ok(ContentTagRow {
                        content_id: row.get(0)?,
                        tag: TagRow {
                            id: row.get(1)?,
                            title: row.get(2)?,
                            user_id: row.get(3)?,
                            created_at: row.get(4)?,
                        },
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Tags --

    pub fn insert_tag(&self, id: &str, user_id: &str, title: &str) -> Result<TagRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tags (id, title, user_id) VALUES (?1, ?2, ?3)",
                params![id, title, user_id],
            )?;
            let tag = conn.query_row(
                "SELECT id, title, user_id, created_at FROM tags WHERE id = ?1",
                [id],
                tag_from_row,
            )?;
            Ok(tag)
        })
    }

    pub fn list_tags_for_user(&self, user_id: &str) -> Result<Vec<TagRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, user_id, created_at FROM tags
                 WHERE user_id = ?1 ORDER BY created_at, rowid",
            )?;
            let rows = stmt
                .query_map([user_id], tag_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Attaches `tag_ids` to `content_id` in one transaction, provided every
    /// tag belongs to `user_id`. Already-attached tags are left alone.
    /// Returns false, changing nothing, if any tag is foreign or missing.
    pub fn attach_tags(&self, content_id: &str, user_id: &str, tag_ids: &[String]) -> Result<bool> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            {
                let mut owned =
                    tx.prepare("SELECT COUNT(*) FROM tags WHERE id = ?1 AND user_id = ?2")?;
                let mut insert = tx.prepare(
                    "INSERT OR IGNORE INTO content_tags (content_id, tag_id) VALUES (?1, ?2)",
                )?;
                for tag_id in tag_ids {
                    let count: i64 = owned.query_row(params![tag_id, user_id], |r| r.get(0))?;
                    if count == 0 {
                        return Ok(false);
                    }
                    insert.execute(params![content_id, tag_id])?;
                }
            }
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn detach_tag(&self, content_id: &str, tag_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM content_tags WHERE content_id = ?1 AND tag_id = ?2",
                params![content_id, tag_id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Share links --

    pub fn get_link_for_user(&self, user_id: &str) -> Result<Option<LinkRow>> {
        self.with_conn(|conn| query_link(conn, "user_id = ?1", user_id))
    }

    pub fn get_link_by_hash(&self, hash: &str) -> Result<Option<LinkRow>> {
        self.with_conn(|conn| query_link(conn, "hash = ?1", hash))
    }

    /// Inserts a link for `user_id` unless one exists, then returns whichever
    /// row is stored. Concurrent callers all observe the same hash.
    pub fn get_or_create_link(&self, id: &str, user_id: &str, hash: &str) -> Result<LinkRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO links (id, hash, user_id) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO NOTHING",
                params![id, hash, user_id],
            )?;
            query_link(conn, "user_id = ?1", user_id)?
                .ok_or_else(|| anyhow::anyhow!("Share link for {} vanished after insert", user_id))
        })
    }

    pub fn delete_link_for_user(&self, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM links WHERE user_id = ?1", [user_id])? > 0))
    }
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}");
    let row = conn
        .query_row(&sql, [value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                username: row.get(2)?,
                email: row.get(3)?,
                password: row.get(4)?,
                refresh_token: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_content(conn: &Connection, id: &str, owner: Option<&str>) -> Result<Option<ContentRow>> {
    let sql = format!(
        "SELECT {CONTENT_COLUMNS} FROM content WHERE id = ?1 AND (?2 IS NULL OR user_id = ?2)"
    );
    let row = conn.query_row(&sql, params![id, owner], content_from_row).optional()?;
    Ok(row)
}

fn query_link(conn: &Connection, predicate: &str, value: &str) -> Result<Option<LinkRow>> {
    let sql = format!("SELECT {LINK_COLUMNS} FROM links WHERE {predicate}");
    let row = conn
        .query_row(&sql, [value], |row| {
            Ok(LinkRow {
                id: row.get(0)?,
                hash: row.get(1)?,
                user_id: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn content_from_row(row: &Row<'_>) -> rusqlite::Result<ContentRow> {
    Ok(ContentRow {
        id: row.get(0)?,
        link: row.get(1)?,
        title: row.get(2)?,
        kind: row.get(3)?,
        user_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<TagRow> {
    Ok(TagRow {
        id: row.get(0)?,
        title: row.get(1)?,
        user_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}
