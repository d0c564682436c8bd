use crate::models::{
    normalize_hashtag, normalize_hashtags, DateRange, EventKind, Granularity, InteractionKind,
    NewPost, Post, PostUpdate, SparseCount, User,
};
use crate::storage::{EventCountBackend, HashtagResolver, Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use std::collections::BTreeSet;
use std::sync::Arc;

const POST_COLUMNS: &str = "id, author_id, post_type, title, content, created_at";

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

/// `to_char` pattern producing the same labels as `Granularity::label_format`
const fn pg_label_format(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Day => "YYYY-MM-DD",
        Granularity::Hour => "YYYY-MM-DD HH24:00",
    }
}

/// Fail unless `post_id` exists and was written by `user_id`; locks the post row
async fn ensure_author(conn: &mut PgConnection, post_id: i64, user_id: i64) -> StorageResult<()> {
    let author =
        sqlx::query_scalar::<_, i64>("SELECT author_id FROM posts WHERE id = $1 FOR UPDATE")
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
    conn: &mut PgConnection,
    post_id: i64,
    hashtags: &[String],
) -> StorageResult<()> {
    sqlx::query(
        r#"
        INSERT INTO post_hashtags (post_id, hashtag)
        SELECT $1, tag FROM UNNEST($2::TEXT[]) AS tag
        "#,
    )
    .bind(post_id)
    .bind(hashtags)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                account TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id BIGSERIAL PRIMARY KEY,
                author_id BIGINT NOT NULL,
                post_type TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at BIGINT NOT NULL
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
                post_id BIGINT NOT NULL,
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
                    id BIGSERIAL PRIMARY KEY,
                    post_id BIGINT NOT NULL,
                    user_id BIGINT,
                    created_at BIGINT NOT NULL
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
        let created_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| StorageError::Other(e.into()))?
            .as_secs() as i64;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (account, email, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (account) DO NOTHING
            RETURNING id, account, email, created_at
            "#,
        )
        .bind(account)
        .bind(email)
        .bind(created_at)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        user.ok_or(StorageError::Conflict)
    }

    async fn get_user(&self, account: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, account, email, created_at FROM users WHERE account = $1",
        )
        .bind(account)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn create_post(&self, post: &NewPost) -> StorageResult<Post> {
        let hashtags: Vec<String> = normalize_hashtags(&post.hashtags).into_iter().collect();

        let mut tx = self.pool.begin().await?;

        let author = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1")
            .bind(post.author_id)
            .fetch_optional(&mut *tx)
            .await?;
        if author.is_none() {
            return Err(StorageError::UserNotFound(post.author_id));
        }

        let mut created = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (author_id, post_type, title, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
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

        created.hashtags = hashtags;
        Ok(created)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        let Some(mut post) = post else {
            return Ok(None);
        };

        post.hashtags = sqlx::query_scalar::<_, String>(
            "SELECT hashtag FROM post_hashtags WHERE post_id = $1 ORDER BY hashtag",
        )
        .bind(post.id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(Some(post))
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
            SET title = COALESCE($1, title),
                content = COALESCE($2, content)
            WHERE id = $3
            "#,
        )
        .bind(update.title.as_deref())
        .bind(update.content.as_deref())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(raw) = &update.hashtags {
            sqlx::query("DELETE FROM post_hashtags WHERE post_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            let hashtags: Vec<String> = normalize_hashtags(raw).into_iter().collect();
            insert_hashtags(&mut tx, id, &hashtags).await?;
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
            sqlx::query(&format!("DELETE FROM {table} WHERE post_id = $1"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM posts WHERE id = $1")
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
        let result = sqlx::query(&format!(
            "INSERT INTO {} (post_id, user_id, created_at) SELECT id, $1, $2 FROM posts WHERE id = $3",
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
impl HashtagResolver for PostgresStorage {
    async fn resolve(&self, hashtag: &str) -> Result<BTreeSet<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT DISTINCT post_id FROM post_hashtags WHERE hashtag = $1",
        )
        .bind(normalize_hashtag(hashtag))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl EventCountBackend for PostgresStorage {
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

        let sql = format!(
            r#"
            SELECT to_char(to_timestamp(created_at) AT TIME ZONE 'UTC', '{format}') AS label,
                   COUNT(*) AS value
            FROM {table}
            WHERE {column} = ANY($1)
              AND created_at >= $2
              AND created_at < $3
            GROUP BY label
            ORDER BY label ASC
            "#,
            format = pg_label_format(granularity),
            table = kind.table(),
            column = kind.post_column(),
        );

        let rows = sqlx::query_as::<_, (String, i64)>(&sql)
            .bind(&ids)
            .bind(from)
            .bind(until)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(label, count)| SparseCount::new(label, u64::try_from(count).unwrap_or(0)))
            .collect())
    }
}
