use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use sn_core::identity::{self, UserRole};
use sn_core::kv_store::{load_flag, DynamicConfigStore, SqliteConfigStore, KV_REINDEX_KEY};
use sqlx::SqlitePool;

const CLI_NAME: &str = "sn-cli";

#[derive(Parser)]
#[command(name = "sn", version, about = "Settings node CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Api,
    /// Apply database migrations
    Migrate,
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
    /// Raise, clear or show the pending-reindex flag
    Reindex {
        #[command(subcommand)]
        command: ReindexCommand,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    Create {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "basic")]
        role: String,
    },
}

#[derive(Subcommand)]
enum SessionCommand {
    Issue {
        #[arg(long)]
        user_id: String,
        #[arg(long, env = "SN_SESSION_TTL_HOURS", default_value_t = 24)]
        ttl_hours: i64,
    },
}

#[derive(Subcommand)]
enum ReindexCommand {
    Request,
    Clear,
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Api => {
            let config = sn_api::load_config()?;
            sn_api::run(config).await?;
        }
        Commands::Migrate => {
            sn_core::logging::init(CLI_NAME);
            let pool = connect().await?;
            sn_core::migrations::run(&pool).await?;
            tracing::info!("migrations applied");
        }
        Commands::User { command } => {
            sn_core::logging::init(CLI_NAME);
            let pool = connect().await?;
            match command {
                UserCommand::Create { email, role } => {
                    let role = role.parse::<UserRole>()?;
                    let user = identity::create_user(&pool, &email, role).await?;
                    println!("{}", serde_json::to_string(&user)?);
                }
            }
        }
        Commands::Session { command } => {
            sn_core::logging::init(CLI_NAME);
            let pool = connect().await?;
            match command {
                SessionCommand::Issue { user_id, ttl_hours } => {
                    let session_id = identity::issue_session(
                        &pool,
                        &user_id,
                        chrono::Duration::hours(ttl_hours.max(1)),
                    )
                    .await?;
                    println!("{}", json!({ "session_id": session_id, "ttl_hours": ttl_hours }));
                }
            }
        }
        Commands::Reindex { command } => {
            sn_core::logging::init(CLI_NAME);
            let pool = connect().await?;
            let store = SqliteConfigStore::new(pool);
            match command {
                ReindexCommand::Request => {
                    store.store(KV_REINDEX_KEY, json!(true)).await?;
                    tracing::info!("reindex requested");
                }
                ReindexCommand::Clear => {
                    store.store(KV_REINDEX_KEY, json!(false)).await?;
                    tracing::info!("reindex flag cleared");
                }
                ReindexCommand::Show => {
                    let value = match load_flag(&store, KV_REINDEX_KEY).await {
                        Ok(value) => json!(value),
                        Err(err) if err.is_not_found() => json!(null),
                        Err(err) => return Err(err.into()),
                    };
                    println!("{}", json!({ KV_REINDEX_KEY: value }));
                }
            }
        }
    }

    Ok(())
}

/// Opens the database and brings the schema up to date so operator commands
/// work against a fresh file.
async fn connect() -> Result<SqlitePool> {
    let database_url = sn_core::config::env_or("DATABASE_URL", "sqlite:settings-node.db");
    let pool = sn_core::db::connect(&database_url).await?;
    sn_core::migrations::run(&pool).await?;
    Ok(pool)
}
