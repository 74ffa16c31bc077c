//! Forward-only schema migrations, tracked in a `schema_migrations` table.
//!
//! Mirrors the teacher's `MigrationManager`: each migration is a numbered,
//! named chunk of SQL applied inside its own transaction, with the version
//! recorded in the same transaction so a crash between steps can't produce
//! a half-applied, half-recorded migration.

use sqlx::{Pool, Postgres, Row};
use tracing::info;

pub struct Migration {
    pub version: i32,
    pub name: &'static str,
    pub sql: &'static str,
}

fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        name: "init",
        sql: include_str!("../migrations/0001_init.sql"),
    }]
}

pub struct MigrationRunner {
    pool: Pool<Postgres>,
}

impl MigrationRunner {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn ensure_tracking_table(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn current_version(&self) -> Result<i32, sqlx::Error> {
        let row = sqlx::query("SELECT COALESCE(MAX(version), 0) AS version FROM schema_migrations")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i32, _>("version"))
    }

    /// Applies every migration with a version greater than what's recorded.
    /// A failure here is a startup error (spec.md §6: "process exits with
    /// non-zero on unrecoverable startup errors").
    pub async fn run(&self) -> Result<(), sqlx::Error> {
        self.ensure_tracking_table().await?;
        let current = self.current_version().await?;
        info!(current_version = current, "running pending migrations");

        for migration in all_migrations().into_iter().filter(|m| m.version > current) {
            info!(version = migration.version, name = migration.name, "applying migration");
            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(migration.sql).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_migrations (version, name) VALUES ($1, $2)")
                .bind(migration.version)
                .bind(migration.name)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }

        info!("schema up to date");
        Ok(())
    }
}
