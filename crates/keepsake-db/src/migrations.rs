use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// SQL expression producing an RFC 3339 UTC timestamp with millisecond
/// precision. Stored timestamps compare correctly as strings.
pub const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // Owner columns are soft references: deleting a user leaves their
        // content, tags and link behind.
        conn.execute_batch(&format!(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                password        TEXT NOT NULL,
                refresh_token   TEXT,
                created_at      TEXT NOT NULL DEFAULT ({NOW}),
                updated_at      TEXT NOT NULL DEFAULT ({NOW})
            );

            CREATE INDEX idx_users_refresh_token ON users(refresh_token);

            CREATE TABLE content (
                id          TEXT PRIMARY KEY,
                link        TEXT NOT NULL,
                title       TEXT NOT NULL,
                kind        TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT ({NOW}),
                updated_at  TEXT NOT NULL DEFAULT ({NOW})
            );

            CREATE INDEX idx_content_user ON content(user_id, created_at);

            CREATE TABLE tags (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                user_id     TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT ({NOW})
            );

            CREATE INDEX idx_tags_user ON tags(user_id);

            CREATE TABLE content_tags (
                content_id  TEXT NOT NULL REFERENCES content(id) ON DELETE CASCADE,
                tag_id      TEXT NOT NULL,
                PRIMARY KEY (content_id, tag_id)
            );

            CREATE TABLE links (
                id          TEXT PRIMARY KEY,
                hash        TEXT NOT NULL UNIQUE,
                user_id     TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL DEFAULT ({NOW})
            );

            INSERT INTO schema_version (version) VALUES (1);
            "
        ))?;
    }

    info!("Database migrations complete");
    Ok(())
}
