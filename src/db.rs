use sqlx::{postgres::PgPoolOptions, PgPool};

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        // Fail fast if the subscriptions table is missing
        sqlx::query("SELECT 1 FROM subscriptions LIMIT 1")
            .execute(&pool)
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "subscriptions table unavailable (apply migrations/0001_create_subscriptions.sql): {}",
                    e
                )
            })?;

        Ok(Self { pool })
    }
}
