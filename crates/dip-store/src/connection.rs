use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

/// Thin wrapper over a `sqlx::PgPool`, mirroring the teacher's
/// `DatabaseConnection` — pooling itself is `sqlx`'s job, this just owns the
/// `connect()` call and the pool's lifetime.
#[derive(Clone)]
pub struct DatabaseConnection {
    pool: Pool<Postgres>,
}

impl DatabaseConnection {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}
