use crate::models::{
    DateRange, EventKind, Granularity, InteractionKind, NewPost, Post, PostUpdate, SparseCount,
    User,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("account already exists")]
    Conflict,
    #[error("user {0} does not exist")]
    UserNotFound(i64),
    #[error("post {0} does not exist")]
    PostNotFound(i64),
    #[error("only the author can modify post {0}")]
    NotOwner(i64),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Other(err.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Post/hashtag index
#[async_trait]
pub trait HashtagResolver: Send + Sync {
    /// Identifiers of posts tagged with `hashtag`.
    ///
    /// An unknown or unused hashtag yields an empty set, not an error.
    async fn resolve(&self, hashtag: &str) -> Result<BTreeSet<i64>>;
}

/// Timestamped event store that can count events per time bucket
#[async_trait]
pub trait EventCountBackend: Send + Sync {
    /// Count `kind` events for `post_ids` inside `range`, grouped by the bucket
    /// label of `granularity`.
    ///
    /// Only labels with at least one event are returned, in ascending label order.
    async fn count_by_bucket(
        &self,
        kind: EventKind,
        post_ids: &BTreeSet<i64>,
        range: &DateRange,
        granularity: Granularity,
    ) -> Result<Vec<SparseCount>>;
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Register a user; fails with `Conflict` when the account is taken
    async fn create_user(&self, account: &str, email: &str) -> StorageResult<User>;

    async fn get_user(&self, account: &str) -> Result<Option<User>>;

    /// Store a post together with its (normalized, de-duplicated) hashtags.
    ///
    /// Fails with `UserNotFound` when the author is not registered.
    async fn create_post(&self, post: &NewPost) -> StorageResult<Post>;

    async fn get_post(&self, id: i64) -> Result<Option<Post>>;

    /// Apply an author's edit; `PostNotFound` / `NotOwner` otherwise
    async fn update_post(&self, id: i64, editor_id: i64, update: &PostUpdate)
        -> StorageResult<Post>;

    /// Delete a post with its hashtags and recorded interactions; author only
    async fn delete_post(&self, id: i64, requester_id: i64) -> StorageResult<()>;

    /// Record a like/view/share of `post_id` at `at` (Unix timestamp).
    ///
    /// Fails with `PostNotFound` when the post does not exist.
    async fn record_interaction(
        &self,
        kind: InteractionKind,
        post_id: i64,
        user_id: Option<i64>,
        at: i64,
    ) -> StorageResult<()>;
}
