use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Duration;

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_secret = secret(&lookup, "ACCESS_TOKEN_SECRET")?;
        let refresh_secret = secret(&lookup, "REFRESH_TOKEN_SECRET")?;
        if access_secret == refresh_secret {
            bail!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        }

        let access_minutes: i64 = parsed(&lookup, "ACCESS_TOKEN_EXPIRY_MINUTES", 15)?;
        let refresh_days: i64 = parsed(&lookup, "REFRESH_TOKEN_EXPIRY_DAYS", 7)?;
        if access_minutes <= 0 || refresh_days <= 0 {
            bail!("Token expiries must be positive");
        }

        Ok(Self {
            host: lookup("KEEPSAKE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&lookup, "KEEPSAKE_PORT", 3000)?,
            db_path: lookup("KEEPSAKE_DB_PATH")
                .unwrap_or_else(|| "keepsake.db".into())
                .into(),
            access_secret,
            refresh_secret,
            access_ttl: Duration::minutes(access_minutes),
            refresh_ttl: Duration::days(refresh_days),
            secure_cookies: parsed(&lookup, "KEEPSAKE_SECURE_COOKIES", false)?,
        })
    }
}

fn secret<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).unwrap_or_default();
    if value.is_empty() || PLACEHOLDER_SECRETS.contains(&value.as_str()) {
        bail!("{} is unset or still a placeholder; set it in your .env file", key);
    }
    Ok(value)
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.parse().with_context(|| format!("Invalid {}: '{}'", key, raw)),
        None => Ok(default),
    }
}
