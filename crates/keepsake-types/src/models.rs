use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of saved item. Stored as its lowercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Image,
    Video,
    Article,
    Audio,
    Document,
    Tweet,
}

impl ContentType {
    pub const ALL: [ContentType; 6] = [
        ContentType::Image,
        ContentType::Video,
        ContentType::Article,
        ContentType::Audio,
        ContentType::Document,
        ContentType::Tweet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Article => "article",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Tweet => "tweet",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownContentType(pub String);

impl fmt::Display for UnknownContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown content type '{}'", self.0)
    }
}

impl std::error::Error for UnknownContentType {}

impl FromStr for ContentType {
    type Err = UnknownContentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownContentType(s.to_string()))
    }
}

/// Public view of an account. The password hash and refresh token never
/// leave the store layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: Uuid,
    pub title: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub id: Uuid,
    pub link: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ContentType,
    pub tags: Vec<Tag>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_parses_every_variant() {
        for kind in ContentType::ALL {
            assert_eq!(kind.as_str().parse::<ContentType>(), Ok(kind));
        }
    }

    #[test]
    fn content_type_rejects_unknown_names() {
        assert!("podcast".parse::<ContentType>().is_err());
        assert!("Article".parse::<ContentType>().is_err());
    }

    #[test]
    fn content_serializes_kind_as_type() {
        let now = Utc::now();
        let content = Content {
            id: Uuid::new_v4(),
            link: "https://example.com".into(),
            title: "Example".into(),
            kind: ContentType::Tweet,
            tags: vec![],
            user_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["type"], "tweet");
        assert!(json.get("userId").is_some());
    }
}
