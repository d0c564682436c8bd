use crate::models::{
    normalize_hashtag, normalize_hashtags, DateRange, EventKind, Granularity, InteractionKind,
    NewPost, Post, PostUpdate, SparseCount, User,
};
use crate::storage::{EventCountBackend, HashtagResolver, Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;

/// Post ids bound per counting statement, well under SQLite's host-parameter
/// limit (999 on old builds, 32766 since 3.32)
const MAX_IDS_PER_STATEMENT: usize = 900;

const POST_COLUMNS: &str = "id, author_id, post_type, title, content, created_at";

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn load_hashtags(&self, post_id: i64) -> Result<Vec<String>> {
        let hashtags = sqlx::query_scalar::<_, String>(
            "SELECT hashtag FROM post_hashtags WHERE post_id = ? ORDER BY hashtag",
        )
        .bind(post_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(hashtags)
    }
}

/// SQL expression truncating `created_at` to a bucket label
fn label_expr(granularity: Granularity) -> String {
    format!(
        "strftime('{}', created_at, 'unixepoch')",
        granularity.label_format()
    )
}

/// Fail unless `post_id` exists and was written by `user_id`
async fn ensure_author(
    conn: &mut SqliteConnection,
    post_id: i64,
    user_id: i64,
) -> StorageResult<()> {
    let author = sqlx::query_scalar::<_, i64>("SELECT author_id FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(&mut *conn)
        .await?;

    match author {
        None => Err(StorageError::PostNotFound(post_id)),
        Some(author) if author != user_id => Err(StorageError::NotOwner(post_id)),
        Some(_) => Ok(()),
    }
}

async fn insert_hashtags(
    conn: &mut SqliteConnection,
    post_id: i64,
    hashtags: &BTreeSet<String>,
) -> StorageResult<()> {
    for tag in hashtags {
        sqlx::query("INSERT INTO post_hashtags (post_id, hashtag) VALUES (?, ?)")
            .bind(post_id)
            .bind(tag)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

fn now_unix() -> Result<i64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs() as i64)
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL,
                post_type TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS post_hashtags (
                post_id INTEGER NOT NULL,
                hashtag TEXT NOT NULL,
                PRIMARY KEY (post_id, hashtag)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_post_hashtags_tag ON post_hashtags(hashtag)")
            .execute(self.pool.as_ref())
            .await?;

        for kind in [InteractionKind::Like, InteractionKind::View, InteractionKind::Share] {
            let table = kind.table();
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    post_id INTEGER NOT NULL,
                    user_id INTEGER,
                    created_at INTEGER NOT NULL
                )
                "#
            ))
            .execute(self.pool.as_ref())
            .await?;

            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_post_time ON {table}(post_id, created_at)"
            ))
            .execute(self.pool.as_ref())
            .await?;
        }

        Ok(())
    }

    async fn create_user(&self, account: &str, email: &str) -> StorageResult<User> {
        let created_at = now_unix()?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (account, email, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(account) DO NOTHING
            "#,
        )
        .bind(account)
        .bind(email)
        .bind(created_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        self.get_user(account)
            .await?
            .ok_or_else(|| StorageError::Other(anyhow::anyhow!("user '{account}' vanished after insert")))
    }

    async fn get_user(&self, account: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, account, email, created_at FROM users WHERE account = ?",
        )
        .bind(account)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn create_post(&self, post: &NewPost) -> StorageResult<Post> {
        let hashtags = normalize_hashtags(&post.hashtags);

        let mut tx = self.pool.begin().await?;

        let author = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = ?")
            .bind(post.author_id)
            .fetch_optional(&mut *tx)
            .await?;
        if author.is_none() {
            return Err(StorageError::UserNotFound(post.author_id));
        }

        let mut created = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (author_id, post_type, title, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(post.author_id)
        .bind(post.post_type.as_str())
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.created_at)
        .fetch_one(&mut *tx)
        .await?;

        insert_hashtags(&mut tx, created.id, &hashtags).await?;

        tx.commit().await?;

        created.hashtags = hashtags.into_iter().collect();
        Ok(created)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        match post {
            Some(mut post) => {
                post.hashtags = self.load_hashtags(post.id).await?;
                Ok(Some(post))
            }
            None => Ok(None),
        }
    }

    async fn update_post(
        &self,
        id: i64,
        editor_id: i64,
        update: &PostUpdate,
    ) -> StorageResult<Post> {
        let mut tx = self.pool.begin().await?;
        ensure_author(&mut tx, id, editor_id).await?;

        sqlx::query(
            r#"
            UPDATE posts
            SET title = COALESCE(?, title),
                content = COALESCE(?, content)
            WHERE id = ?
            "#,
        )
        .bind(update.title.as_deref())
        .bind(update.content.as_deref())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(raw) = &update.hashtags {
            sqlx::query("DELETE FROM post_hashtags WHERE post_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_hashtags(&mut tx, id, &normalize_hashtags(raw)).await?;
        }

        tx.commit().await?;

        self.get_post(id)
            .await?
            .ok_or(StorageError::PostNotFound(id))
    }

    async fn delete_post(&self, id: i64, requester_id: i64) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        ensure_author(&mut tx, id, requester_id).await?;

        for table in [
            InteractionKind::Like.table(),
            InteractionKind::View.table(),
            InteractionKind::Share.table(),
            "post_hashtags",
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE post_id = ?"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn record_interaction(
        &self,
        kind: InteractionKind,
        post_id: i64,
        user_id: Option<i64>,
        at: i64,
    ) -> StorageResult<()> {
        // INSERT ... SELECT writes nothing when the post is missing
        let result = sqlx::query(&format!(
            "INSERT INTO {} (post_id, user_id, created_at) SELECT id, ?, ? FROM posts WHERE id = ?",
            kind.table()
        ))
        .bind(user_id)
        .bind(at)
        .bind(post_id)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::PostNotFound(post_id));
        }

        Ok(())
    }
}

#[async_trait]
impl HashtagResolver for SqliteStorage {
    async fn resolve(&self, hashtag: &str) -> Result<BTreeSet<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT DISTINCT post_id FROM post_hashtags WHERE hashtag = ?",
        )
        .bind(normalize_hashtag(hashtag))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl EventCountBackend for SqliteStorage {
    async fn count_by_bucket(
        &self,
        kind: EventKind,
        post_ids: &BTreeSet<i64>,
        range: &DateRange,
        granularity: Granularity,
    ) -> Result<Vec<SparseCount>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let (from, until) = range.unix_bounds();
        let ids: Vec<i64> = post_ids.iter().copied().collect();
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();

        // Id chunks are disjoint, so per-label counts add up exactly
        for chunk in ids.chunks(MAX_IDS_PER_STATEMENT) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {} AS label, COUNT(*) AS value FROM {} WHERE {} IN (",
                label_expr(granularity),
                kind.table(),
                kind.post_column()
            ));
            let mut bound = query.separated(", ");
            for id in chunk {
                bound.push_bind(*id);
            }
            bound.push_unseparated(") AND created_at >= ");
            query
                .push_bind(from)
                .push(" AND created_at < ")
                .push_bind(until)
                .push(" GROUP BY label");

            let rows: Vec<(String, i64)> = query
                .build_query_as()
                .fetch_all(self.pool.as_ref())
                .await?;

            for (label, count) in rows {
                *counts.entry(label).or_insert(0) += u64::try_from(count).unwrap_or(0);
            }
        }

        Ok(counts
            .into_iter()
            .map(|(label, value)| SparseCount::new(label, value))
            .collect())
    }
}
