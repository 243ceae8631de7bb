use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connects the Postgres pool. The URL is passed in from the startup config
/// rather than read from the environment here, so the pool's lifecycle is
/// owned by `main`.
pub async fn get_db_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}
