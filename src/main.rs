use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use socialhub::config::{Config, DatabaseBackend};
use socialhub::models::{
    Granularity, InteractionKind, MetricKind, NewPost, PostType, PostUpdate, StatisticsRequest,
};
use socialhub::statistics::StatisticsService;
use socialhub::storage::{PostgresStorage, SqliteStorage, Storage, StorageError};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "socialhub-stats")]
#[command(about = "Hashtag engagement statistics for SocialHub", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,
    /// Manage users
    #[command(subcommand)]
    User(UserCommands),
    /// Manage posts
    #[command(subcommand)]
    Post(PostCommands),
    /// Record a like, view or share of a post
    Event {
        /// like, view or share
        kind: InteractionKind,
        post_id: i64,
        /// Acting user id
        #[arg(long)]
        user: Option<i64>,
        /// Event time (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<FixedOffset>>,
    },
    /// Print a statistics series as JSON
    Stats {
        /// Hashtag to aggregate; defaults to --as-user
        #[arg(long)]
        hashtag: Option<String>,
        /// Account of the caller
        #[arg(long = "as-user")]
        as_user: Option<String>,
        /// count, like_count, view_count or share_count
        #[arg(long, default_value = "count")]
        metric: MetricKind,
        /// date or hour
        #[arg(long = "type", default_value = "date")]
        granularity: Granularity,
        /// First day (YYYY-MM-DD), inclusive
        #[arg(long)]
        start: NaiveDate,
        /// Last day (YYYY-MM-DD), inclusive
        #[arg(long)]
        end: NaiveDate,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a user
    Create { account: String, email: String },
}

#[derive(Subcommand)]
enum PostCommands {
    /// Create a post
    Create {
        #[arg(long)]
        author: i64,
        /// instagram, facebook, twitter or threads
        #[arg(long = "type")]
        post_type: PostType,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        /// Hashtag, repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Creation time (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<DateTime<FixedOffset>>,
    },
    /// Show a post with its hashtags
    Show { id: i64 },
    /// Edit a post; only its author may do this
    Update {
        id: i64,
        /// Id of the editing user
        #[arg(long = "as")]
        editor: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        /// Replacement hashtags, repeatable
        #[arg(long = "tag")]
        tags: Option<Vec<String>>,
    },
    /// Delete a post with its interactions; only its author may do this
    Delete {
        id: i64,
        /// Id of the requesting user
        #[arg(long = "as")]
        requester: i64,
    },
}

async fn open_storage(config: &Config) -> Result<(Arc<dyn Storage>, StatisticsService)> {
    let url = &config.database.url;
    let max_connections = config.database.max_connections;

    match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", url);
            let store = Arc::new(SqliteStorage::new(url, max_connections).await?);
            let storage: Arc<dyn Storage> = store.clone();
            Ok((storage, StatisticsService::from_store(store, config.statistics)))
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", url);
            let store = Arc::new(PostgresStorage::new(url, max_connections).await?);
            let storage: Arc<dyn Storage> = store.clone();
            Ok((storage, StatisticsService::from_store(store, config.statistics)))
        }
    }
}

fn unix_or_now(at: Option<DateTime<FixedOffset>>) -> i64 {
    at.map(|t| t.timestamp())
        .unwrap_or_else(|| Utc::now().timestamp())
}

/// Account the stats request runs as; a blank hashtag counts as absent
fn caller_account(hashtag: Option<&str>, as_user: Option<String>) -> Result<String> {
    let has_hashtag = hashtag.is_some_and(|tag| !tag.trim().is_empty());
    match as_user {
        Some(account) => Ok(account),
        None if has_hashtag => Ok(String::new()),
        None => anyhow::bail!("either --hashtag or --as-user is required"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!("Loaded configuration");

    let (storage, statistics) = open_storage(&config).await?;

    // Schema creation is idempotent, so every command can rely on it
    storage.init().await?;

    match cli.command {
        Commands::Init => {
            println!("✓ Database initialized");
        }
        Commands::User(UserCommands::Create { account, email }) => {
            match storage.create_user(&account, &email).await {
                Ok(user) => println!("{}", serde_json::to_string_pretty(&user)?),
                Err(StorageError::Conflict) => {
                    anyhow::bail!("account '{account}' already exists")
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Post(PostCommands::Create {
            author,
            post_type,
            title,
            content,
            tags,
            at,
        }) => {
            let post = storage
                .create_post(&NewPost {
                    author_id: author,
                    post_type,
                    title,
                    content,
                    hashtags: tags,
                    created_at: unix_or_now(at),
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&post)?);
        }
        Commands::Post(PostCommands::Show { id }) => match storage.get_post(id).await? {
            Some(post) => println!("{}", serde_json::to_string_pretty(&post)?),
            None => anyhow::bail!("post {id} not found"),
        },
        Commands::Post(PostCommands::Update {
            id,
            editor,
            title,
            content,
            tags,
        }) => {
            let update = PostUpdate {
                title,
                content,
                hashtags: tags,
            };
            let post = storage.update_post(id, editor, &update).await?;
            println!("{}", serde_json::to_string_pretty(&post)?);
        }
        Commands::Post(PostCommands::Delete { id, requester }) => {
            storage.delete_post(id, requester).await?;
            println!("✓ Deleted post {}", id);
        }
        Commands::Event {
            kind,
            post_id,
            user,
            at,
        } => {
            storage
                .record_interaction(kind, post_id, user, unix_or_now(at))
                .await?;
            println!("✓ Recorded {:?} for post {}", kind, post_id);
        }
        Commands::Stats {
            hashtag,
            as_user,
            metric,
            granularity,
            start,
            end,
        } => {
            let caller = caller_account(hashtag.as_deref(), as_user)?;
            let request = StatisticsRequest {
                hashtag,
                metric,
                granularity,
                start,
                end,
            };

            match statistics.handle(&request, &caller).await {
                Ok(series) => println!("{}", serde_json::to_string_pretty(&series)?),
                Err(err) if err.is_client_error() => {
                    error!(code = err.code(), "rejected statistics request: {}", err);
                    println!(
                        "{}",
                        serde_json::json!({ "code": err.code(), "message": err.to_string() })
                    );
                    std::process::exit(2);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(())
}
