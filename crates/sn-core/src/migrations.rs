use anyhow::Result;
use sqlx::migrate::Migrator;
use sqlx::SqlitePool;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run(pool: &SqlitePool) -> Result<()> {
    MIGRATOR.run(pool).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) async fn migrated_pool() -> SqlitePool {
    let pool = crate::db::connect_in_memory().await.expect("in-memory pool");
    run(&pool).await.expect("run migrations");
    pool
}
