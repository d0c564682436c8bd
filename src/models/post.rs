use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub account: String,
    pub email: String,
    pub created_at: i64,
}

/// Network a post is published to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Instagram,
    Facebook,
    Twitter,
    Threads,
}

impl PostType {
    pub const fn as_str(self) -> &'static str {
        match self {
            PostType::Instagram => "instagram",
            PostType::Facebook => "facebook",
            PostType::Twitter => "twitter",
            PostType::Threads => "threads",
        }
    }
}

impl std::str::FromStr for PostType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "instagram" => Ok(PostType::Instagram),
            "facebook" => Ok(PostType::Facebook),
            "twitter" => Ok(PostType::Twitter),
            "threads" => Ok(PostType::Threads),
            other => anyhow::bail!(
                "unknown post type '{other}', expected instagram, facebook, twitter or threads"
            ),
        }
    }
}

impl TryFrom<String> for PostType {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    #[sqlx(try_from = "String")]
    pub post_type: PostType,
    pub title: String,
    pub content: String,
    pub created_at: i64,
    #[sqlx(skip)]
    pub hashtags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub author_id: i64,
    pub post_type: PostType,
    pub title: String,
    pub content: String,
    pub hashtags: Vec<String>,
    /// Creation time (Unix timestamp, UTC)
    pub created_at: i64,
}

/// Author edit of an existing post; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    /// Replaces the whole hashtag set when present
    pub hashtags: Option<Vec<String>>,
}

/// Engagement events a caller can record against an existing post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Like,
    View,
    Share,
}

impl InteractionKind {
    pub const fn table(self) -> &'static str {
        match self {
            InteractionKind::Like => "post_likes",
            InteractionKind::View => "post_views",
            InteractionKind::Share => "post_shares",
        }
    }
}

/// Timestamped event types that can be counted per bucket.
///
/// `Post` counts post creations; the rest count rows of the matching
/// interaction table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Post,
    Like,
    View,
    Share,
}

impl EventKind {
    pub const fn table(self) -> &'static str {
        match self {
            EventKind::Post => "posts",
            EventKind::Like => InteractionKind::Like.table(),
            EventKind::View => InteractionKind::View.table(),
            EventKind::Share => InteractionKind::Share.table(),
        }
    }

    /// Column holding the post identifier in `table()`
    pub const fn post_column(self) -> &'static str {
        match self {
            EventKind::Post => "id",
            EventKind::Like | EventKind::View | EventKind::Share => "post_id",
        }
    }
}

impl From<InteractionKind> for EventKind {
    fn from(kind: InteractionKind) -> Self {
        match kind {
            InteractionKind::Like => EventKind::Like,
            InteractionKind::View => EventKind::View,
            InteractionKind::Share => EventKind::Share,
        }
    }
}

impl std::str::FromStr for InteractionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "like" => Ok(InteractionKind::Like),
            "view" => Ok(InteractionKind::View),
            "share" => Ok(InteractionKind::Share),
            other => anyhow::bail!("unknown interaction '{other}', expected like, view or share"),
        }
    }
}

/// Canonical stored form of a hashtag: surrounding whitespace and one leading `#` removed
pub fn normalize_hashtag(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_prefix('#').unwrap_or(trimmed).trim().to_string()
}

/// Normalized, de-duplicated, sorted hashtag set; blank tags are dropped
pub fn normalize_hashtags(raw: &[String]) -> BTreeSet<String> {
    raw.iter()
        .map(|tag| normalize_hashtag(tag))
        .filter(|tag| !tag.is_empty())
        .collect()
}
