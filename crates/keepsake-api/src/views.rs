use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use keepsake_db::Database;
use keepsake_db::models::{ContentRow, TagRow, UserRow};
use keepsake_types::models::{Content, ContentType, Tag, User};

fn parse_id(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand may use SQLite's "YYYY-MM-DD HH:MM:SS".
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

/// Public view of a user row; credentials are dropped here.
pub fn user(row: &UserRow) -> User {
    User {
        id: parse_id(&row.id, "user id"),
        name: row.name.clone(),
        username: row.username.clone(),
        email: row.email.clone(),
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    }
}

pub fn tag(row: TagRow) -> Tag {
    Tag {
        id: parse_id(&row.id, "tag id"),
        user_id: parse_id(&row.user_id, "tag owner"),
        created_at: parse_timestamp(&row.created_at),
        title: row.title,
    }
}

/// Converts content rows, populating each item's tags with one batch query.
/// Rows with an unrecognised kind are skipped.
pub fn contents(db: &Database, rows: Vec<ContentRow>) -> anyhow::Result<Vec<Content>> {
    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

    let mut tags_by_content: HashMap<String, Vec<Tag>> = HashMap::new();
    for row in db.get_tags_for_content(&ids)? {
        tags_by_content.entry(row.content_id).or_default().push(tag(row.tag));
    }

    let items = rows
        .into_iter()
        .filter_map(|row| {
            let kind = match row.kind.parse::<ContentType>() {
                Ok(kind) => kind,
                Err(e) => {
                    warn!("Skipping content '{}': {}", row.id, e);
                    return None;
                }
            };

            Some(Content {
                id: parse_id(&row.id, "content id"),
                user_id: parse_id(&row.user_id, "content owner"),
                tags: tags_by_content.remove(&row.id).unwrap_or_default(),
                created_at: parse_timestamp(&row.created_at),
                updated_at: parse_timestamp(&row.updated_at),
                link: row.link,
                title: row.title,
                kind,
            })
        })
        .collect();

    Ok(items)
}

/// Single-item form of [`contents`].
pub fn content(db: &Database, row: ContentRow) -> anyhow::Result<Content> {
    contents(db, vec![row])?
        .pop()
        .ok_or_else(|| anyhow::anyhow!("Content row has an unrecognised kind"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_and_legacy_timestamps() {
        let stored = parse_timestamp("2026-10-19T08:30:00.250Z");
        assert_eq!(stored.timestamp_millis() % 1000, 250);

        let legacy = parse_timestamp("2026-10-19 08:30:00");
        assert_eq!(legacy.timestamp(), stored.timestamp());
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        assert_eq!(parse_timestamp("yesterday"), DateTime::<Utc>::default());
        assert_eq!(parse_id("not-a-uuid", "test id"), Uuid::nil());
    }
}
